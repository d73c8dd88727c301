//! Error type for `agentsync-engine`.

use agentsync_core::record::Category;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] agentsync_core::Error),

  #[error("cannot compare {current} against {desired}")]
  CategoryMismatch { current: Category, desired: Category },

  #[error("batch worker failed: {0}")]
  Worker(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
