//! Progress events emitted by the orchestrator, and the sink they go to.
//!
//! The engine emits one event per state transition and never depends on how
//! events are rendered. Sinks must not block.

use serde::{Deserialize, Serialize};

use crate::{
  identifier::Identifier,
  outcome::{BatchResult, Stage, SyncOutcome},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SyncEvent {
  PreflightStarted,
  PreflightPassed {
    /// `false` when the run continues registry-only.
    store_active: bool,
  },
  Aborted {
    reason: String,
  },
  RecordStarted {
    index:      usize,
    total:      usize,
    identifier: Identifier,
  },
  StageEntered {
    identifier: Identifier,
    stage:      Stage,
  },
  ChangesDetected {
    identifier: Identifier,
    changes:    Vec<String>,
  },
  RemoteRetry {
    identifier: Identifier,
    attempt:    u32,
    cause:      String,
  },
  RecordResolved {
    index:      usize,
    total:      usize,
    identifier: Identifier,
    outcome:    SyncOutcome,
  },
  Cancelled {
    remaining: usize,
  },
  BatchCompleted {
    succeeded:    usize,
    skipped:      usize,
    failed:       usize,
    inconsistent: usize,
  },
}

impl SyncEvent {
  pub fn completed(result: &BatchResult) -> Self {
    Self::BatchCompleted {
      succeeded:    result.succeeded,
      skipped:      result.skipped,
      failed:       result.failed,
      inconsistent: result.inconsistent,
    }
  }
}

/// Receiver of [`SyncEvent`]s.
pub trait ProgressSink: Send + Sync {
  fn emit(&self, event: SyncEvent);
}

/// Discards every event.
impl ProgressSink for () {
  fn emit(&self, _event: SyncEvent) {}
}

impl<S: ProgressSink + ?Sized> ProgressSink for std::sync::Arc<S> {
  fn emit(&self, event: SyncEvent) { (**self).emit(event) }
}
