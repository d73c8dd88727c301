//! The synchronization orchestrator.
//!
//! Per batch: pre-flight probes, then every record in order, then the
//! aggregated [`BatchResult`]. Per record the state machine is
//!
//! ```text
//! Fetching -> Comparing -> Skipped
//!                       -> DbCommitting -> Failed
//!                                       -> RemoteCommitting(1..=n) -> Succeeded
//!                                                                  -> Inconsistent
//! ```
//!
//! The store is always written before the registry. A store failure rolls
//! back and the registry is never contacted for that record. A registry
//! failure after a committed store write is retried a bounded number of
//! times and then reported as inconsistent.

use std::collections::{BTreeSet, HashMap};

use agentsync_core::{
  agent::{Agent, IdentityKey, Role},
  client::{MetadataRegistry, RelationalStore},
  error::SyncError,
  event::{ProgressSink, SyncEvent},
  identifier::{Identifier, ResourceKey},
  outcome::{BatchResult, BatchStatus, SkipReason, Stage, SyncOutcome},
  record::{Category, CategoryState, UpdateRecord},
};
use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use crate::{CancelFlag, EngineConfig, Error, StoreRequirement, diff};

// ─── Record state machine ────────────────────────────────────────────────────

enum RecordState {
  Fetching,
  Comparing {
    current: CategoryState,
    stored:  Option<CategoryState>,
    key:     Option<ResourceKey>,
  },
  DbCommitting {
    key:     ResourceKey,
    desired: CategoryState,
    changes: Vec<String>,
  },
  RemoteCommitting {
    desired:      CategoryState,
    changes:      Vec<String>,
    attempt:      u32,
    db_committed: bool,
  },
  Done(SyncOutcome),
}

/// Everything a single record run needs besides the record itself.
struct RecordCtx<'a, P: ?Sized> {
  sink:         &'a P,
  store_active: bool,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Drives one batch at a time against one registry and an optional store.
pub struct Orchestrator<R, S> {
  registry: R,
  store:    Option<S>,
  config:   EngineConfig,
}

impl<R, S> Orchestrator<R, S>
where
  R: MetadataRegistry,
  S: RelationalStore,
{
  /// `store` may be `None` only when the requirement is
  /// [`StoreRequirement::Disabled`] or [`StoreRequirement::BestEffort`];
  /// a mandatory requirement without a store aborts every batch.
  pub fn new(registry: R, store: Option<S>, config: EngineConfig) -> Self {
    Self {
      registry,
      store,
      config,
    }
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  /// Probe both systems. `Ok(store_active)` when the batch may proceed.
  pub async fn preflight(&self) -> Result<bool, String> {
    let requirement = self.config.store_requirement;
    let store = self
      .store
      .as_ref()
      .filter(|_| requirement != StoreRequirement::Disabled);

    let (registry_ok, store_ok) = match store {
      Some(s) => {
        let (r, s) = tokio::join!(self.registry.probe(), s.probe());
        (r, Some(s))
      }
      None => (self.registry.probe().await, None),
    };

    if !registry_ok {
      return Err("registry unreachable".into());
    }
    match (requirement, store_ok) {
      (StoreRequirement::Disabled, _) => Ok(false),
      (_, Some(true)) => Ok(true),
      (StoreRequirement::Mandatory, Some(false)) => Err("relational store unreachable".into()),
      (StoreRequirement::Mandatory, None) => {
        Err("relational store required but not configured".into())
      }
      (StoreRequirement::BestEffort, _) => {
        tracing::warn!("relational store unavailable; continuing registry-only");
        Ok(false)
      }
    }
  }

  /// Run one batch to completion. Never fails: every record resolves to
  /// exactly one outcome, and pre-flight failure yields an aborted result
  /// with no outcomes.
  pub async fn run<P>(
    &self,
    category: Category,
    records: Vec<UpdateRecord>,
    sink: &P,
    cancel: &CancelFlag,
  ) -> BatchResult
  where
    P: ProgressSink + ?Sized,
  {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("batch", %run_id, %category, records = records.len());
    self
      .run_batch(run_id, category, records, sink, cancel)
      .instrument(span)
      .await
  }

  async fn run_batch<P>(
    &self,
    run_id: Uuid,
    category: Category,
    records: Vec<UpdateRecord>,
    sink: &P,
    cancel: &CancelFlag,
  ) -> BatchResult
  where
    P: ProgressSink + ?Sized,
  {
    let mut result = BatchResult::new(run_id, category, Utc::now());
    sink.emit(SyncEvent::PreflightStarted);
    let store_active = match self.preflight().await {
      Ok(active) => active,
      Err(reason) => {
        tracing::error!(%reason, "pre-flight failed; batch aborted with no writes");
        sink.emit(SyncEvent::Aborted {
          reason: reason.clone(),
        });
        return result.finish(BatchStatus::Aborted { reason });
      }
    };
    sink.emit(SyncEvent::PreflightPassed { store_active });
    if self.config.dry_run {
      tracing::info!("dry run: nothing will be written");
    }

    let ctx = RecordCtx { sink, store_active };
    let total = records.len();
    let mut records = records.into_iter().enumerate();
    let mut status = BatchStatus::Completed;

    while let Some((index, record)) = records.next() {
      if cancel.is_cancelled() {
        let remaining = total - index;
        tracing::warn!(remaining, "cancelled; skipping remaining records");
        sink.emit(SyncEvent::Cancelled { remaining });
        result.push(record.identifier, SyncOutcome::Skipped(SkipReason::Cancelled));
        for (_, rest) in records.by_ref() {
          result.push(rest.identifier, SyncOutcome::Skipped(SkipReason::Cancelled));
        }
        status = BatchStatus::Cancelled;
        break;
      }

      sink.emit(SyncEvent::RecordStarted {
        index,
        total,
        identifier: record.identifier.clone(),
      });
      let outcome = self.process(&record, category, &ctx).await;
      tracing::info!(identifier = %record.identifier, outcome = %outcome.label(), "record resolved");
      sink.emit(SyncEvent::RecordResolved {
        index,
        total,
        identifier: record.identifier.clone(),
        outcome: outcome.clone(),
      });
      result.push(record.identifier, outcome);
    }

    let result = result.finish(status);
    sink.emit(SyncEvent::completed(&result));
    tracing::info!(
      succeeded = result.succeeded,
      skipped = result.skipped,
      failed = result.failed,
      inconsistent = result.inconsistent,
      "batch finished"
    );
    result
  }

  // ── Per record ────────────────────────────────────────────────────────

  async fn process<P>(
    &self,
    record: &UpdateRecord,
    category: Category,
    ctx: &RecordCtx<'_, P>,
  ) -> SyncOutcome
  where
    P: ProgressSink + ?Sized,
  {
    let id = &record.identifier;
    let store = self.store.as_ref().filter(|_| ctx.store_active);
    let max_attempts = self.config.attempts();
    let mut state = RecordState::Fetching;

    loop {
      state = match state {
        RecordState::Done(outcome) => return outcome,

        RecordState::Fetching => {
          self.enter(ctx, id, Stage::Fetching);
          match self.fetch(record, category, store).await {
            Ok((current, stored, key)) => RecordState::Comparing {
              current,
              stored,
              key,
            },
            Err(error) => failed(Stage::Fetching, error),
          }
        }

        RecordState::Comparing {
          current,
          stored,
          key,
        } => {
          self.enter(ctx, id, Stage::Comparing);
          match self.compare(record, category, current, stored, ctx.store_active) {
            Err(error) => failed(Stage::Comparing, error),
            Ok((_, changes)) if changes.is_empty() => {
              tracing::debug!(identifier = %id, "unchanged");
              RecordState::Done(SyncOutcome::Skipped(SkipReason::Unchanged))
            }
            Ok((desired, changes)) => {
              ctx.sink.emit(SyncEvent::ChangesDetected {
                identifier: id.clone(),
                changes:    changes.clone(),
              });
              if self.config.dry_run {
                RecordState::Done(SyncOutcome::Skipped(SkipReason::DryRun { changes }))
              } else if let Some(key) = key {
                RecordState::DbCommitting {
                  key,
                  desired,
                  changes,
                }
              } else {
                RecordState::RemoteCommitting {
                  desired,
                  changes,
                  attempt: 1,
                  db_committed: false,
                }
              }
            }
          }
        }

        RecordState::DbCommitting {
          key,
          desired,
          changes,
        } => {
          self.enter(ctx, id, Stage::DbCommitting);
          // `key` is only ever set when the store is active.
          let Some(store) = store else {
            return SyncOutcome::Failed {
              stage: Stage::DbCommitting,
              error: SyncError::Connectivity {
                identifier: id.clone(),
                system:     agentsync_core::error::System::Store,
                cause:      "store not active".into(),
              },
            };
          };
          match store.write_category_transactional(key, desired.clone()).await {
            Ok(()) => {
              tracing::info!(identifier = %id, %key, "database committed");
              RecordState::RemoteCommitting {
                desired,
                changes,
                attempt: 1,
                db_committed: true,
              }
            }
            Err(e) => {
              let error = SyncError::from_store(id, e);
              tracing::error!(identifier = %id, %error, "database write rolled back; registry untouched");
              failed(Stage::DbCommitting, error)
            }
          }
        }

        RecordState::RemoteCommitting {
          desired,
          changes,
          attempt,
          db_committed,
        } => {
          if attempt == 1 {
            self.enter(ctx, id, Stage::RemoteCommitting);
          }
          match self.registry.replace_all(id.clone(), desired.clone()).await {
            Ok(()) => RecordState::Done(SyncOutcome::Succeeded { changes }),
            Err(e) if attempt < max_attempts => {
              tracing::warn!(identifier = %id, attempt, error = %e, "registry write failed; retrying");
              ctx.sink.emit(SyncEvent::RemoteRetry {
                identifier: id.clone(),
                attempt,
                cause: e.to_string(),
              });
              tokio::time::sleep(self.config.retry_delay()).await;
              RecordState::RemoteCommitting {
                desired,
                changes,
                attempt: attempt + 1,
                db_committed,
              }
            }
            Err(e) => {
              let error = SyncError::RemoteUpdate {
                identifier: id.clone(),
                attempts:   attempt,
                cause:      e.to_string(),
              };
              if db_committed {
                tracing::error!(identifier = %id, %error, "INCONSISTENT: database committed, registry not updated");
                RecordState::Done(SyncOutcome::Inconsistent { error })
              } else {
                tracing::error!(identifier = %id, %error, "registry write failed");
                failed(Stage::RemoteCommitting, error)
              }
            }
          }
        }
      };
    }
  }

  fn enter<P>(&self, ctx: &RecordCtx<'_, P>, id: &Identifier, stage: Stage)
  where
    P: ProgressSink + ?Sized,
  {
    tracing::debug!(identifier = %id, %stage, "entering stage");
    ctx.sink.emit(SyncEvent::StageEntered {
      identifier: id.clone(),
      stage,
    });
  }

  /// Resolve the resource, fetch the registry's current state, and for
  /// contributors the store's rows (the only home of contact info).
  async fn fetch(
    &self,
    record: &UpdateRecord,
    category: Category,
    store: Option<&S>,
  ) -> Result<(CategoryState, Option<CategoryState>, Option<ResourceKey>), SyncError> {
    let id = &record.identifier;

    let key = match store {
      Some(s) => Some(
        s.resolve_resource(id.clone())
          .await
          .map_err(|e| SyncError::from_store(id, e))?,
      ),
      None => None,
    };

    let current = self
      .registry
      .fetch_current(id.clone(), category)
      .await
      .map_err(|e| SyncError::from_registry(id, e))?;

    let stored = match (store, key) {
      (Some(s), Some(key)) if category == Category::Contributors => Some(
        s.fetch_category(key, category)
          .await
          .map_err(|e| SyncError::from_store(id, e))?,
      ),
      _ => None,
    };

    Ok((current, stored, key))
  }

  /// Normalize the desired state, enrich the current one, and diff.
  fn compare(
    &self,
    record: &UpdateRecord,
    category: Category,
    mut current: CategoryState,
    stored: Option<CategoryState>,
    store_active: bool,
  ) -> Result<(CategoryState, Vec<String>), SyncError> {
    let id = &record.identifier;
    let validation = |detail: String| SyncError::Validation {
      identifier: id.clone(),
      detail,
    };

    if record.category() != category {
      return Err(validation(format!(
        "record is {} but batch is {category}",
        record.category()
      )));
    }

    let mut desired = record.desired.normalized().with_projected_roles();
    if !store_active {
      // Without the store only what the registry can hold is written.
      desired = desired.registry_view();
    }

    if let (Some(stored), Some(agents)) = (stored, current.agents_mut()) {
      enrich_from_store(category, agents, stored.agents());
    }

    let changes = diff::detect(&current, &desired).map_err(|e| match e {
      Error::Core(core) => validation(core.to_string()),
      other => validation(other.to_string()),
    })?;
    Ok((desired, changes.changes))
  }
}

fn failed(stage: Stage, error: SyncError) -> RecordState {
  RecordState::Done(SyncOutcome::Failed { stage, error })
}

/// Fill in what only the store keeps onto the registry's agents, pairing by
/// identity. Store-only roles are adopted when the store's roles project onto
/// exactly the registry's; contact info is copied for contact-role holders.
fn enrich_from_store(category: Category, agents: &mut [Agent], stored: &[Agent]) {
  let by_key: HashMap<IdentityKey, &Agent> =
    stored.iter().map(|a| (a.identity_key(), a)).collect();
  for agent in agents.iter_mut() {
    let Some(row) = by_key.get(&agent.identity_key()) else {
      continue;
    };
    let projected: BTreeSet<Role> = category.registry_roles(&row.roles).into_iter().collect();
    if projected == agent.canonical_roles() {
      agent.roles = row.roles.clone();
    }
    if agent.holds_contact_role() {
      agent.contact = row.contact.clone();
    }
  }
}
