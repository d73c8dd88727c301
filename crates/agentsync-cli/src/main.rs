//! `agentsync`: push creator, contributor, and publisher metadata to the
//! relational store and the registry, in that order.
//!
//! # Usage
//!
//! ```
//! agentsync sync --category contributors --input batch.json --audit-log audit.jsonl
//! agentsync --config /etc/agentsync.toml probe
//! ```
//!
//! Credentials come from the config file or `AGENTSYNC__REGISTRY__PRINCIPAL`
//! and `AGENTSYNC__REGISTRY__SECRET`.

mod input;
mod report;
mod settings;

use std::{path::PathBuf, process::ExitCode};

use agentsync_core::{
  client::{MetadataRegistry, RelationalStore},
  record::Category,
};
use agentsync_engine::{Orchestrator, StoreRequirement, spawn_batch};
use agentsync_registry::RegistryClient;
use agentsync_store_sqlite::SqliteStore;
use anyhow::Context as _;
use clap::{Parser, Subcommand};
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "agentsync", version, about = "Synchronize agent metadata to store and registry")]
struct Cli {
  /// Path to a TOML settings file (default: ./agentsync.toml if present).
  #[arg(short, long, value_name = "FILE", env = "AGENTSYNC_CONFIG")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run one batch of updates for a single category.
  Sync {
    /// creators, contributors, or publisher.
    #[arg(long)]
    category: Category,

    /// JSON batch file.
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// Compare only; report what would change.
    #[arg(long)]
    dry_run: bool,

    /// Append one JSON line per record to this file.
    #[arg(long, value_name = "FILE")]
    audit_log: Option<PathBuf>,
  },
  /// Check that the registry and the store are reachable.
  Probe,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let mut settings = Settings::load(cli.config)?;
  tracing::debug!(?settings, "settings loaded");

  match cli.command {
    Command::Sync {
      category,
      input,
      dry_run,
      audit_log,
    } => {
      settings.engine.dry_run |= dry_run;
      sync(settings, category, input, audit_log).await
    }
    Command::Probe => probe(settings).await,
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn sync(
  settings: Settings,
  category: Category,
  input: PathBuf,
  audit_log: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
  let raw = std::fs::read_to_string(&input)
    .with_context(|| format!("failed to read batch {}", input.display()))?;
  let records = input::parse_batch(category, &raw)?;
  tracing::info!(records = records.len(), %category, "batch loaded");

  let registry =
    RegistryClient::new(settings.registry_config()).context("failed to build registry client")?;
  let store = open_store(&settings).await?;
  let orchestrator = Orchestrator::new(registry, store, settings.engine);

  let mut handle = spawn_batch(orchestrator, category, records);

  let cancel = handle.cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::warn!("interrupt received; finishing the current record");
      cancel.cancel();
    }
  });

  while let Some(event) = handle.events.recv().await {
    if let Some(line) = report::progress_line(&event) {
      println!("{line}");
    }
  }
  let result = handle.finish().await.context("batch worker failed")?;

  print!("{}", result.summary());
  if let Some(path) = audit_log {
    report::append_audit(&path, &result)?;
  }

  let clean = !result.is_aborted() && result.failed == 0 && result.inconsistent == 0;
  Ok(if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn probe(settings: Settings) -> anyhow::Result<ExitCode> {
  let registry =
    RegistryClient::new(settings.registry_config()).context("failed to build registry client")?;
  let registry_ok = registry.probe().await;
  println!("registry: {}", if registry_ok { "ok" } else { "unreachable" });

  let store_ok = match open_store(&settings).await? {
    Some(store) => {
      let ok = store.probe().await;
      println!("store:    {}", if ok { "ok" } else { "unreachable" });
      ok
    }
    None => {
      println!("store:    not configured");
      settings.store.requirement != StoreRequirement::Mandatory
    }
  };

  Ok(if registry_ok && store_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Open the configured store. A failure to open is fatal only when the store
/// is mandatory; otherwise the run proceeds registry-only.
async fn open_store(settings: &Settings) -> anyhow::Result<Option<SqliteStore>> {
  let requirement = settings.store.requirement;
  let Some(path) = settings.store.path.as_ref() else {
    return Ok(None);
  };
  if requirement == StoreRequirement::Disabled {
    return Ok(None);
  }

  match SqliteStore::open(path, settings.busy_timeout()).await {
    Ok(store) => Ok(Some(store)),
    Err(e) if requirement == StoreRequirement::BestEffort => {
      tracing::warn!(path = %path.display(), error = %e, "could not open store; continuing registry-only");
      Ok(None)
    }
    Err(e) => Err(e).with_context(|| format!("failed to open store at {}", path.display())),
  }
}
