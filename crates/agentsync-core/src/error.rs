//! Error types for `agentsync-core`.
//!
//! [`RegistryError`] and [`StoreError`] are the boundary errors of the two
//! client traits. [`SyncError`] is the per-record taxonomy the orchestrator
//! reports; every variant carries the originating identifier.

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use crate::identifier::Identifier;

#[derive(Debug, Error)]
pub enum Error {
  #[error("duplicate agent identity in desired state: {0:?}")]
  DuplicateIdentity(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Client boundary errors ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  #[error("identifier not found in registry")]
  NotFound,

  #[error("registry rejected credentials")]
  Unauthorized,

  #[error("registry unavailable: {0}")]
  Unavailable(String),

  #[error("registry rejected request ({status}): {body}")]
  Rejected { status: u16, body: String },

  #[error("malformed registry document: {0}")]
  Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
  #[error("identifier not found in store")]
  NotFound,

  /// The transactional unit rolled back; nothing was written.
  #[error("transaction rolled back: {0}")]
  Transaction(String),

  #[error("store unavailable: {0}")]
  Connectivity(String),

  #[error("query failed: {0}")]
  Query(String),
}

// ─── Per-record taxonomy ─────────────────────────────────────────────────────

/// Which backing system an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum System {
  Registry,
  Store,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SyncError {
  #[error("{identifier}: invalid desired state: {detail}")]
  Validation { identifier: Identifier, detail: String },

  #[error("{identifier}: not found in {system}")]
  NotFound { identifier: Identifier, system: System },

  #[error("{identifier}: {system} unreachable: {cause}")]
  Connectivity {
    identifier: Identifier,
    system:     System,
    cause:      String,
  },

  /// The store was reachable but rejected a read.
  #[error("{identifier}: store query failed: {cause}")]
  StoreQuery { identifier: Identifier, cause: String },

  #[error("{identifier}: database write rolled back: {cause}")]
  Transaction { identifier: Identifier, cause: String },

  #[error("{identifier}: registry write failed after {attempts} attempt(s): {cause}")]
  RemoteUpdate {
    identifier: Identifier,
    attempts:   u32,
    cause:      String,
  },
}

impl SyncError {
  pub fn identifier(&self) -> &Identifier {
    match self {
      Self::Validation { identifier, .. }
      | Self::NotFound { identifier, .. }
      | Self::Connectivity { identifier, .. }
      | Self::StoreQuery { identifier, .. }
      | Self::Transaction { identifier, .. }
      | Self::RemoteUpdate { identifier, .. } => identifier,
    }
  }

  /// Short label used in reports, e.g. `Failed(notFound)`.
  pub fn label(&self) -> &'static str {
    match self {
      Self::Validation { .. } => "validation",
      Self::NotFound { .. } => "notFound",
      Self::Connectivity { .. } => "connectivity",
      Self::StoreQuery { .. } => "storeQuery",
      Self::Transaction { .. } => "databaseRolledBack",
      Self::RemoteUpdate { .. } => "remote",
    }
  }

  /// Classify a registry error raised while reading.
  pub fn from_registry(identifier: &Identifier, err: RegistryError) -> Self {
    match err {
      RegistryError::NotFound => Self::NotFound {
        identifier: identifier.clone(),
        system:     System::Registry,
      },
      RegistryError::Malformed(detail) => Self::Validation {
        identifier: identifier.clone(),
        detail:     format!("registry document: {detail}"),
      },
      other => Self::Connectivity {
        identifier: identifier.clone(),
        system:     System::Registry,
        cause:      other.to_string(),
      },
    }
  }

  /// Classify a store error raised while resolving, reading, or writing.
  pub fn from_store(identifier: &Identifier, err: StoreError) -> Self {
    match err {
      StoreError::NotFound => Self::NotFound {
        identifier: identifier.clone(),
        system:     System::Store,
      },
      StoreError::Transaction(cause) => Self::Transaction {
        identifier: identifier.clone(),
        cause,
      },
      StoreError::Connectivity(cause) => Self::Connectivity {
        identifier: identifier.clone(),
        system: System::Store,
        cause,
      },
      StoreError::Query(cause) => Self::StoreQuery {
        identifier: identifier.clone(),
        cause,
      },
    }
  }
}
