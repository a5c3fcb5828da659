// src/cli/mod.rs — Command-line interface

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;

use crate::core::search::SearchEngine;
use crate::core::types::DraftNode;
use crate::infra::config::Config;
use crate::provider;

#[derive(Parser, Debug)]
#[command(name = "redraft", version, about = "Security-aware document refinement agent")]
pub struct Cli {
    /// The user directive to answer
    #[arg(long)]
    pub question: Option<String>,

    /// Read the directive from a file instead
    #[arg(long, conflicts_with = "question")]
    pub question_file: Option<PathBuf>,

    /// File with the allowed context blob
    #[arg(long)]
    pub allowed: PathBuf,

    /// File with the forbidden context blob (omit for none)
    #[arg(long)]
    pub forbidden: Option<PathBuf>,

    /// Where to write the refined result record
    #[arg(long, default_value = "outputs/refined.json")]
    pub out: PathBuf,

    /// Output language for the drafts and critic summaries
    #[arg(long, default_value = "English")]
    pub lang: String,

    /// Oracle override as "provider/model"
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Path to a redraft.toml (defaults to ./redraft.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn directive(&self) -> anyhow::Result<String> {
        if let Some(ref question) = self.question {
            return Ok(question.trim().to_string());
        }
        if let Some(ref path) = self.question_file {
            let text = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
            return Ok(text.trim().to_string());
        }
        anyhow::bail!("either --question or --question-file must be specified")
    }
}

/// The record written to disk: the best node plus run provenance.
#[derive(Debug, Serialize)]
pub struct RunRecord {
    pub directive: String,
    pub oracle: String,
    pub generated_at: DateTime<Utc>,
    pub best: DraftNode,
}

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let directive = cli.directive()?;
    let allowed = std::fs::read_to_string(&cli.allowed)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", cli.allowed.display()))?;
    let forbidden = match cli.forbidden {
        Some(ref path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?,
        None => String::new(),
    };

    let oracle = provider::resolve(&config, cli.model.as_deref())?;
    let oracle_id = oracle.id().to_string();

    let mut engine = SearchEngine::new(oracle, &config, &cli.lang);

    let initial = engine
        .actions()
        .initial_draft(&directive, &allowed, &forbidden)
        .await;
    let best = engine.refine(initial, &directive, &allowed, &forbidden).await;

    println!(
        "refined: score {:.2}, depth {}, leak {}",
        best.metrics.score, best.depth, best.metrics.leak_detected
    );

    let record = RunRecord {
        directive,
        oracle: oracle_id,
        generated_at: Utc::now(),
        best,
    };

    if let Some(parent) = cli.out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&cli.out, serde_json::to_string_pretty(&record)?)?;
    println!("wrote {}", cli.out.display());

    Ok(())
}
