//! Per-record outcomes and the aggregated batch result.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::{
  error::{Result, SyncError},
  identifier::Identifier,
  record::Category,
};

// ─── Stages ──────────────────────────────────────────────────────────────────

/// The per-record states a record passes through before resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Stage {
  Fetching,
  Comparing,
  DbCommitting,
  RemoteCommitting,
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum SkipReason {
  /// Desired state equals current state; neither system was written.
  Unchanged,
  /// Dry-run mode; the listed changes would have been written.
  DryRun { changes: Vec<String> },
  /// The batch was cancelled before this record started.
  Cancelled,
}

/// Terminal result of processing one record. Produced exactly once per record
/// per batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SyncOutcome {
  Skipped(SkipReason),
  Succeeded {
    changes: Vec<String>,
  },
  Failed {
    stage: Stage,
    error: SyncError,
  },
  /// The database holds the new state but the registry does not; manual
  /// reconciliation is owed.
  Inconsistent {
    error: SyncError,
  },
}

impl SyncOutcome {
  /// Compact label such as `Skipped(unchanged)` or `Failed(notFound)`.
  pub fn label(&self) -> String {
    match self {
      Self::Skipped(SkipReason::Unchanged) => "Skipped(unchanged)".into(),
      Self::Skipped(SkipReason::DryRun { .. }) => "Skipped(dryRun)".into(),
      Self::Skipped(SkipReason::Cancelled) => "Skipped(cancelled)".into(),
      Self::Succeeded { .. } => "Succeeded".into(),
      Self::Failed { error, .. } => format!("Failed({})", error.label()),
      Self::Inconsistent { .. } => "Inconsistent".into(),
    }
  }

  pub fn is_skipped(&self) -> bool { matches!(self, Self::Skipped(_)) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
  pub identifier: Identifier,
  #[serde(flatten)]
  pub outcome:    SyncOutcome,
}

// ─── Batch result ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BatchStatus {
  Completed,
  /// Pre-flight failed; no record was processed.
  Aborted { reason: String },
  /// Cancellation was observed between records.
  Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
  pub run_id:       Uuid,
  pub category:     Category,
  pub started_at:   DateTime<Utc>,
  pub finished_at:  DateTime<Utc>,
  pub status:       BatchStatus,
  pub succeeded:    usize,
  pub skipped:      usize,
  pub failed:       usize,
  pub inconsistent: usize,
  pub outcomes:     Vec<RecordOutcome>,
}

impl BatchResult {
  pub fn new(run_id: Uuid, category: Category, started_at: DateTime<Utc>) -> Self {
    Self {
      run_id,
      category,
      started_at,
      finished_at: started_at,
      status: BatchStatus::Completed,
      succeeded: 0,
      skipped: 0,
      failed: 0,
      inconsistent: 0,
      outcomes: Vec::new(),
    }
  }

  /// Append one record's terminal outcome and bump the matching counter.
  pub fn push(&mut self, identifier: Identifier, outcome: SyncOutcome) {
    match &outcome {
      SyncOutcome::Skipped(_) => self.skipped += 1,
      SyncOutcome::Succeeded { .. } => self.succeeded += 1,
      SyncOutcome::Failed { .. } => self.failed += 1,
      SyncOutcome::Inconsistent { .. } => self.inconsistent += 1,
    }
    self.outcomes.push(RecordOutcome {
      identifier,
      outcome,
    });
  }

  pub fn finish(mut self, status: BatchStatus) -> Self {
    self.status = status;
    self.finished_at = Utc::now();
    self
  }

  pub fn total(&self) -> usize { self.outcomes.len() }

  pub fn is_aborted(&self) -> bool { matches!(self.status, BatchStatus::Aborted { .. }) }

  /// Records needing manual reconciliation.
  pub fn inconsistent_identifiers(&self) -> impl Iterator<Item = &Identifier> {
    self
      .outcomes
      .iter()
      .filter(|o| matches!(o.outcome, SyncOutcome::Inconsistent { .. }))
      .map(|o| &o.identifier)
  }

  // ── Rendering ─────────────────────────────────────────────────────────

  /// Human-readable report.
  pub fn summary(&self) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "run {} ({})", self.run_id, self.category);
    match &self.status {
      BatchStatus::Completed => {}
      BatchStatus::Aborted { reason } => {
        let _ = writeln!(out, "ABORTED before any write: {reason}");
      }
      BatchStatus::Cancelled => {
        let _ = writeln!(out, "cancelled; remaining records skipped");
      }
    }
    let _ = writeln!(
      out,
      "succeeded: {}  skipped: {}  failed: {}  inconsistent: {}",
      self.succeeded, self.skipped, self.failed, self.inconsistent
    );
    for rec in &self.outcomes {
      let _ = writeln!(out, "  {:<40} {}", rec.identifier.as_str(), rec.outcome.label());
      match &rec.outcome {
        SyncOutcome::Skipped(SkipReason::DryRun { changes }) | SyncOutcome::Succeeded { changes } => {
          for c in changes {
            let _ = writeln!(out, "      - {c}");
          }
        }
        SyncOutcome::Failed { error, .. } | SyncOutcome::Inconsistent { error } => {
          let _ = writeln!(out, "      ! {error}");
        }
        SyncOutcome::Skipped(_) => {}
      }
    }
    if self.inconsistent > 0 {
      let _ = writeln!(out, "manual reconciliation required for:");
      for id in self.inconsistent_identifiers() {
        let _ = writeln!(out, "  {id}");
      }
    }
    out
  }

  /// One JSON object per record, newline-separated, for the audit log.
  pub fn to_json_lines(&self) -> Result<String> {
    let mut out = String::new();
    for rec in &self.outcomes {
      let line = serde_json::json!({
        "runId": self.run_id,
        "category": self.category,
        "finishedAt": self.finished_at,
        "record": rec,
      });
      out.push_str(&serde_json::to_string(&line)?);
      out.push('\n');
    }
    Ok(out)
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> BatchResult {
    let mut r = BatchResult::new(Uuid::new_v4(), Category::Creators, Utc::now());
    r.push(Identifier::new("a"), SyncOutcome::Skipped(SkipReason::Unchanged));
    r.push(
      Identifier::new("b"),
      SyncOutcome::Succeeded {
        changes: vec!["creator 1: name changed".into()],
      },
    );
    r.push(
      Identifier::new("c"),
      SyncOutcome::Failed {
        stage: Stage::DbCommitting,
        error: SyncError::Transaction {
          identifier: Identifier::new("c"),
          cause:      "constraint".into(),
        },
      },
    );
    r.finish(BatchStatus::Completed)
  }

  #[test]
  fn push_tallies_outcomes() {
    let r = sample();
    assert_eq!((r.succeeded, r.skipped, r.failed, r.inconsistent), (1, 1, 1, 0));
    assert_eq!(r.total(), 3);
  }

  #[test]
  fn labels_name_failure_kind() {
    let r = sample();
    assert_eq!(r.outcomes[2].outcome.label(), "Failed(databaseRolledBack)");
    assert_eq!(r.outcomes[0].outcome.label(), "Skipped(unchanged)");
  }

  #[test]
  fn json_lines_has_one_line_per_record() {
    let r = sample();
    let text = r.to_json_lines().unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    let v: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(v["record"]["identifier"], "b");
    assert_eq!(v["record"]["outcome"], "succeeded");
  }

  #[test]
  fn summary_lists_each_record() {
    let s = sample().summary();
    assert!(s.contains("succeeded: 1  skipped: 1  failed: 1  inconsistent: 0"));
    assert!(s.contains("creator 1: name changed"));
  }
}
