//! Engine settings.

use std::time::Duration;

use serde::Deserialize;

/// How the relational store participates in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreRequirement {
  /// Store probe failure aborts the batch.
  #[default]
  Mandatory,
  /// Store probe failure degrades the run to registry-only.
  BestEffort,
  /// Registry-only; the store is never touched.
  Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Total registry write attempts per record, including the first.
  pub remote_attempts:   u32,
  pub retry_delay_ms:    u64,
  pub dry_run:           bool,
  #[serde(skip)]
  pub store_requirement: StoreRequirement,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      remote_attempts:   2,
      retry_delay_ms:    250,
      dry_run:           false,
      store_requirement: StoreRequirement::Mandatory,
    }
  }
}

impl EngineConfig {
  pub const MAX_REMOTE_ATTEMPTS: u32 = 3;

  /// `remote_attempts` clamped to `1..=3`.
  pub fn attempts(&self) -> u32 { self.remote_attempts.clamp(1, Self::MAX_REMOTE_ATTEMPTS) }

  pub fn retry_delay(&self) -> Duration { Duration::from_millis(self.retry_delay_ms) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn attempts_are_clamped() {
    let mut c = EngineConfig::default();
    assert_eq!(c.attempts(), 2);
    c.remote_attempts = 0;
    assert_eq!(c.attempts(), 1);
    c.remote_attempts = 10;
    assert_eq!(c.attempts(), 3);
  }
}
