//! Error type for `agentsync-store-sqlite`.

use agentsync_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("no resource with identifier {0:?}")]
  ResourceNotFound(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Whether the failure means the database itself is unreachable rather
  /// than a single statement failing.
  pub fn is_connectivity(&self) -> bool {
    use rusqlite::ErrorCode;
    match self {
      Self::Database(tokio_rusqlite::Error::ConnectionClosed) => true,
      Self::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))) => {
        matches!(
          e.code,
          ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
        )
      }
      _ => false,
    }
  }
}

impl From<Error> for StoreError {
  fn from(err: Error) -> Self {
    match err {
      Error::ResourceNotFound(_) => Self::NotFound,
      e if e.is_connectivity() => Self::Connectivity(e.to_string()),
      e => Self::Query(e.to_string()),
    }
  }
}
