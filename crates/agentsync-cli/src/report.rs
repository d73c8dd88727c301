//! Terminal progress lines and the append-only audit log.

use std::{fs::OpenOptions, io::Write as _, path::Path};

use agentsync_core::{event::SyncEvent, outcome::BatchResult};
use anyhow::Context as _;

/// One progress line per event worth showing; stage transitions stay in the
/// debug log.
pub fn progress_line(event: &SyncEvent) -> Option<String> {
  match event {
    SyncEvent::PreflightStarted => Some("checking registry and store...".into()),
    SyncEvent::PreflightPassed { store_active } => Some(if *store_active {
      "pre-flight ok".into()
    } else {
      "pre-flight ok (registry only)".into()
    }),
    SyncEvent::Aborted { reason } => Some(format!("aborted: {reason}")),
    SyncEvent::RecordResolved {
      index,
      total,
      identifier,
      outcome,
    } => Some(format!("[{}/{total}] {identifier}: {}", index + 1, outcome.label())),
    SyncEvent::RemoteRetry {
      identifier,
      attempt,
      cause,
    } => Some(format!("  {identifier}: registry attempt {attempt} failed ({cause}); retrying")),
    SyncEvent::Cancelled { remaining } => Some(format!("cancelled; {remaining} record(s) skipped")),
    SyncEvent::RecordStarted { .. }
    | SyncEvent::StageEntered { .. }
    | SyncEvent::ChangesDetected { .. }
    | SyncEvent::BatchCompleted { .. } => None,
  }
}

/// Append the batch's per-record JSON lines to `path`.
pub fn append_audit(path: &Path, result: &BatchResult) -> anyhow::Result<()> {
  let lines = result.to_json_lines().context("failed to render audit lines")?;
  let mut file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .with_context(|| format!("failed to open audit log {}", path.display()))?;
  file
    .write_all(lines.as_bytes())
    .with_context(|| format!("failed to write audit log {}", path.display()))?;
  tracing::info!(path = %path.display(), records = result.total(), "audit log appended");
  Ok(())
}
