// src/core/search.rs — Beam-bounded stochastic tree search over drafts

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::decode::StructuredDecoder;
use crate::evaluator::EvaluationPipeline;
use crate::infra::config::{Config, SearchConfig};
use crate::provider::Oracle;

use super::actions::ActionPipeline;
use super::frontier::{Frontier, ScoredNode};
use super::types::{hash_text, DraftNode, DraftState};

pub struct SearchEngine {
    actions: ActionPipeline,
    evaluator: EvaluationPipeline,
    config: SearchConfig,
    rng: StdRng,
}

impl SearchEngine {
    pub fn new(oracle: Arc<dyn Oracle>, config: &Config, lang: &str) -> Self {
        let decoder = StructuredDecoder::new(
            oracle,
            config.decode.max_retries,
            config.models.max_tokens,
        );
        Self::with_pipelines(
            ActionPipeline::new(decoder.clone(), lang),
            EvaluationPipeline::new(decoder, lang),
            config.search.clone(),
        )
    }

    pub fn with_pipelines(
        actions: ActionPipeline,
        evaluator: EvaluationPipeline,
        config: SearchConfig,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            actions,
            evaluator,
            config,
            rng,
        }
    }

    pub fn actions(&self) -> &ActionPipeline {
        &self.actions
    }

    /// Refine an initial draft state and return the best node found.
    ///
    /// Never errors: every failure mode inside degrades to a score, and the
    /// worst case is getting the scored initial draft back unchanged.
    pub async fn refine(
        &mut self,
        initial: DraftState,
        directive: &str,
        allowed: &str,
        forbidden: &str,
    ) -> DraftNode {
        let (root_score, root_metrics) = self
            .evaluator
            .evaluate(&initial, directive, allowed, forbidden)
            .await;
        let root = DraftNode::root(initial, root_metrics);

        let mut frontier = Frontier::new();
        frontier.push(ScoredNode::new(root_score, root.clone()));

        let mut best_node = root;
        let mut best_score = root_score;
        let mut visited: HashSet<String> = HashSet::new();

        tracing::info!(
            max_depth = self.config.max_depth,
            beam_width = self.config.beam_width,
            max_trials = self.config.max_trials,
            "starting tree search"
        );

        let mut trials = 0u32;
        while !frontier.is_empty() && trials < self.config.max_trials {
            let Some(current) = frontier.pop_explore(
                self.config.epsilon,
                self.config.explore_top_k,
                self.config.revisit_penalty,
                &mut self.rng,
            ) else {
                break;
            };
            let current = current.node;

            if current.depth >= self.config.max_depth {
                trials += 1;
                continue;
            }

            let current_hash = current.content_hash();
            if !visited.insert(current_hash.clone()) {
                // already expanded this exact draft
                trials += 1;
                continue;
            }

            tracing::info!(
                depth = current.depth,
                score = current.metrics.score,
                "expanding node"
            );

            let children = self
                .actions
                .expand(&current, directive, allowed, forbidden)
                .await;

            for state in children {
                if state.draft.is_empty() {
                    continue;
                }
                if visited.contains(&hash_text(&state.draft)) {
                    continue;
                }

                let (score, metrics) = self
                    .evaluator
                    .evaluate(&state, directive, allowed, forbidden)
                    .await;
                let node = DraftNode::child_of(&current_hash, current.depth + 1, state, metrics);

                if score > best_score {
                    tracing::info!(score, "best score updated");
                    best_score = score;
                    best_node = node.clone();
                }

                frontier.push(ScoredNode::new(score, node));
            }

            frontier.truncate_to_beam(self.config.beam_width);
            trials += 1;
        }

        tracing::info!(best_score, depth = best_node.depth, "tree search finished");
        best_node
    }
}
