//! Background batch execution.
//!
//! A batch runs on its own tokio task so a caller stays responsive. Progress
//! arrives over an unbounded channel; cancellation is a shared flag the
//! orchestrator checks between records.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use agentsync_core::{
  client::{MetadataRegistry, RelationalStore},
  event::{ProgressSink, SyncEvent},
  outcome::BatchResult,
  record::{Category, UpdateRecord},
};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{Orchestrator, Result};

// ─── Cancellation ────────────────────────────────────────────────────────────

/// Cooperative cancellation. The record in flight always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  pub fn new() -> Self { Self::default() }

  pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }

  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

// ─── Channel sink ────────────────────────────────────────────────────────────

/// Forwards events into an mpsc channel. A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink(mpsc::UnboundedSender<SyncEvent>);

impl ChannelSink {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self(tx), rx)
  }
}

impl ProgressSink for ChannelSink {
  fn emit(&self, event: SyncEvent) { let _ = self.0.send(event); }
}

// ─── Handle ──────────────────────────────────────────────────────────────────

pub struct BatchHandle {
  pub events: mpsc::UnboundedReceiver<SyncEvent>,
  pub cancel: CancelFlag,
  task:       JoinHandle<BatchResult>,
}

impl BatchHandle {
  /// Wait for the batch to resolve.
  pub async fn finish(self) -> Result<BatchResult> { Ok(self.task.await?) }
}

/// Run a batch on a new tokio task.
pub fn spawn_batch<R, S>(
  orchestrator: Orchestrator<R, S>,
  category: Category,
  records: Vec<UpdateRecord>,
) -> BatchHandle
where
  R: MetadataRegistry + 'static,
  S: RelationalStore + 'static,
{
  let (sink, events) = ChannelSink::new();
  let cancel = CancelFlag::new();
  let flag = cancel.clone();
  let task = tokio::spawn(async move {
    orchestrator.run(category, records, &sink, &flag).await
  });
  BatchHandle {
    events,
    cancel,
    task,
  }
}
