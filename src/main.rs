use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info};

use data_actors::actor::{run_aiml, run_edgar, ActorRun, PlatformEnv, RunOutcome};
use data_actors::api::Endpoints;
use data_actors::storage::LocalStorage;
use data_actors::utils::init_logging;

/// Data-fetching actors for AI/ML research and SEC filings
#[derive(Parser)]
#[command(name = "data-actors")]
#[command(version)]
#[command(about = "Fetch HuggingFace models, arXiv and HF Daily papers, or SEC EDGAR data into a local dataset")]
#[command(long_about = "
Runs one actor against its public upstream APIs and writes the results as
numbered JSON items under the local storage directory.

Run input is a JSON object read from --input, --input-json, or the INPUT
record of the default key-value store (storage/key_value_stores/default/INPUT.json).

A local run starts fresh: the default dataset and every key-value record
except INPUT are cleared first. Pass --resume to continue an interrupted run
from its STATE record instead. Runs on the Apify platform always resume.

Examples:
  data-actors aiml --input-json '{\"query\": \"bert\", \"maxResults\": 10}'
  data-actors aiml --input-json '{\"mode\": \"search_papers\", \"arxivCategory\": \"cs.CL\"}'
  data-actors edgar --input-json '{\"mode\": \"company_facts\", \"ticker\": \"AAPL\", \"concept\": \"Assets\"}'
")]
struct Cli {
    #[command(subcommand)]
    actor: Actor,
}

#[derive(Subcommand)]
enum Actor {
    /// HuggingFace Hub models, arXiv papers, HF Daily Papers
    Aiml(RunArgs),
    /// SEC EDGAR entities, filings, and XBRL facts
    Edgar(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path to a JSON input file
    #[arg(long, short = 'i', conflicts_with = "input_json")]
    input: Option<PathBuf>,

    /// Inline JSON input
    #[arg(long)]
    input_json: Option<String>,

    /// Storage root (defaults to $APIFY_LOCAL_STORAGE_DIR or ./storage)
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Items per dataset push
    #[arg(long, short = 'b', default_value_t = data_actors::actor::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Keep the dataset and STATE of an earlier run and continue it
    #[arg(long)]
    resume: bool,
}

async fn resolve_input(args: &RunArgs, run: &ActorRun) -> Result<Value> {
    if let Some(path) = &args.input {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read input file {}", path.display()))?;
        return serde_json::from_str(&text).context("Input file is not valid JSON");
    }
    if let Some(json) = &args.input_json {
        return serde_json::from_str(json).context("--input-json is not valid JSON");
    }
    Ok(run
        .load_input()
        .await?
        .unwrap_or_else(|| Value::Object(Default::default())))
}

async fn run(cli: Cli) -> Result<RunOutcome> {
    let (args, is_edgar) = match &cli.actor {
        Actor::Aiml(args) => (args, false),
        Actor::Edgar(args) => (args, true),
    };

    let storage = match &args.storage_dir {
        Some(dir) => LocalStorage::new(dir),
        None => LocalStorage::from_env(),
    };
    info!("💾 Local storage at {}", storage.root().display());

    let env = PlatformEnv::from_env();
    let resume = args.resume || env.is_at_home;
    if resume {
        info!("♻️ Keeping existing storage for resume");
    }
    let (dataset, store) = storage
        .open_for_run(resume)
        .await
        .context("Failed to open local storage")?;
    let mut actor_run = ActorRun::new(Arc::new(dataset), Arc::new(store), env)
        .with_batch_size(args.batch_size);

    let input = resolve_input(args, &actor_run).await?;
    if is_edgar {
        run_edgar(&mut actor_run, &input, Endpoints::default()).await
    } else {
        run_aiml(&mut actor_run, &input, Endpoints::default()).await
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_logging();

    match run(Cli::parse()).await {
        Ok(RunOutcome::Completed(summary)) => {
            println!("✅ {}", summary.message);
        }
        Ok(RunOutcome::Failed(message)) => {
            eprintln!("❌ {}", message);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    }
}
