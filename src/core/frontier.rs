// src/core/frontier.rs — Bounded best-first frontier with epsilon-greedy pops
//
// Priority is the NEGATED score, so the numerically smallest priority is the
// best draft. Ordering reads the priority field only; node contents never
// participate in comparison.

use std::collections::BinaryHeap;

use rand::Rng;

use super::types::DraftNode;

#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub priority: f64,
    pub node: DraftNode,
}

impl ScoredNode {
    pub fn new(score: f64, node: DraftNode) -> Self {
        Self {
            priority: -score,
            node,
        }
    }

    pub fn score(&self) -> f64 {
        -self.priority
    }
}

impl PartialEq for ScoredNode {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for ScoredNode {}

impl PartialOrd for ScoredNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredNode {
    // Reversed so the max-heap surfaces the LOWEST priority (best score).
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.priority.total_cmp(&self.priority)
    }
}

#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<ScoredNode>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn push(&mut self, entry: ScoredNode) {
        self.heap.push(entry);
    }

    /// Epsilon-greedy pop. Exploit (probability 1 - epsilon): take the best
    /// entry. Explore: take the top K, pick one uniformly, put the rest back.
    ///
    /// Either way, a clone of the chosen node stays behind at degraded
    /// priority with its revisit counter bumped, so the lineage can be
    /// revisited later without one lucky pop monopolizing the search. The
    /// echo competes in beam truncation like any other entry.
    pub fn pop_explore<R: Rng>(
        &mut self,
        epsilon: f64,
        explore_top_k: usize,
        revisit_penalty: f64,
        rng: &mut R,
    ) -> Option<ScoredNode> {
        if self.heap.is_empty() {
            return None;
        }

        let choice = if rng.gen::<f64>() > epsilon {
            self.heap.pop()?
        } else {
            let k = explore_top_k.min(self.heap.len()).max(1);
            let mut buf: Vec<ScoredNode> = Vec::with_capacity(k);
            for _ in 0..k {
                if let Some(entry) = self.heap.pop() {
                    buf.push(entry);
                }
            }
            let chosen = buf.swap_remove(rng.gen_range(0..buf.len()));
            for entry in buf {
                self.heap.push(entry);
            }
            chosen
        };

        let mut echo = choice.node.clone();
        echo.revisit_count += 1;
        self.heap.push(ScoredNode {
            priority: choice.priority + revisit_penalty,
            node: echo,
        });

        Some(choice)
    }

    /// Keep only the best `beam_width` entries, rebuilding the heap order.
    pub fn truncate_to_beam(&mut self, beam_width: usize) {
        if self.heap.len() <= beam_width {
            return;
        }
        let mut all = std::mem::take(&mut self.heap).into_vec();
        all.sort_by(|a, b| a.priority.total_cmp(&b.priority));
        all.truncate(beam_width);
        self.heap = BinaryHeap::from(all);
    }
}
