use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

use factcheck_common::{Claim, Config, PipelineEvent, SourceCard};
use factcheck_pipeline::{orchestrator_from_config, telemetry};

/// Fact-check a claim against web sources using the configured SearXNG and
/// Ollama instances.
#[derive(Parser, Debug)]
#[command(name = "factcheck", version)]
struct Cli {
    /// The claim to check
    claim: String,

    /// Number of sources to base the verdict on
    #[arg(short = 'n', long = "sources")]
    sources: Option<i64>,

    /// Print the raw NDJSON event stream instead of readable output
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    telemetry::init_tracing();
    config.log_summary();

    let claim = Claim::parse(&cli.claim, cli.sources, &config.source_limits)?;
    info!(num_sources = claim.num_sources(), "Fact check requested");

    let orchestrator = Arc::new(orchestrator_from_config(&config)?);
    let mut events = orchestrator.spawn(claim);

    let mut stdout = std::io::stdout();
    let mut printed = String::new();
    let mut sources: Vec<SourceCard> = Vec::new();
    let mut failure = None;

    while let Some(event) = events.recv().await {
        let terminal = event.is_terminal();
        if cli.json {
            stdout.write_all(event.to_ndjson()?.as_bytes())?;
            stdout.flush()?;
        }

        match event {
            PipelineEvent::Status(status) if !cli.json => eprintln!("... {status}"),
            PipelineEvent::PartialResult { text, sources: cards } => {
                if let Some(cards) = cards {
                    sources = cards;
                }
                if !cli.json {
                    // Each event carries the full text so far; print only what's new.
                    match text.strip_prefix(printed.as_str()) {
                        Some(delta) => write!(stdout, "{delta}")?,
                        None => write!(stdout, "\n{text}")?,
                    }
                    stdout.flush()?;
                }
                printed = text;
            }
            PipelineEvent::Error(error) => failure = Some(error),
            _ => {}
        }
        if terminal {
            break;
        }
    }

    if let Some(error) = failure {
        bail!(error);
    }

    if !cli.json {
        println!("\n\nSources:");
        for (i, card) in sources.iter().enumerate() {
            println!(
                "  {}. {} ({}) [relevance {}/10]",
                i + 1,
                card.title,
                card.url,
                card.relevance.score
            );
        }
    }

    Ok(())
}
