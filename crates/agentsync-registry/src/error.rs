//! Error type for `agentsync-registry`.

use agentsync_core::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("registry returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("unexpected document shape: {0}")]
  Document(String),

  #[error("invalid request url: {0}")]
  Url(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for RegistryError {
  fn from(err: Error) -> Self {
    match err {
      Error::Status { status: 404, .. } => Self::NotFound,
      Error::Status {
        status: 401 | 403, ..
      } => Self::Unauthorized,
      Error::Status { status, body } => Self::Rejected { status, body },
      Error::Http(e) if e.is_decode() => Self::Malformed(e.to_string()),
      Error::Http(e) => Self::Unavailable(e.to_string()),
      Error::Json(e) => Self::Malformed(e.to_string()),
      Error::Document(detail) => Self::Malformed(detail),
      e @ Error::Url(_) => Self::Unavailable(e.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_codes_map_to_taxonomy() {
    let status = |status| Error::Status {
      status,
      body: String::new(),
    };
    assert_eq!(RegistryError::from(status(404)), RegistryError::NotFound);
    assert_eq!(RegistryError::from(status(401)), RegistryError::Unauthorized);
    assert_eq!(RegistryError::from(status(403)), RegistryError::Unauthorized);
    assert!(matches!(
      RegistryError::from(status(422)),
      RegistryError::Rejected { status: 422, .. }
    ));
  }

  #[test]
  fn bad_base_url_is_unavailable() {
    let err = RegistryError::from(Error::Url("not a url".into()));
    assert_eq!(err, RegistryError::Unavailable("invalid request url: not a url".into()));
  }
}
