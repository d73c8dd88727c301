//! Async HTTP client for the registry's JSON:API.

use std::{fmt, sync::Mutex, time::Duration};

use agentsync_core::{
  RegistryError,
  client::MetadataRegistry,
  identifier::Identifier,
  record::{Category, CategoryState},
};
use reqwest::{Client, RequestBuilder, Response, Url, header};
use serde_json::Value;

use crate::{Error, Result, document};

pub const PRODUCTION_URL: &str = "https://api.datacite.org";
pub const TEST_URL: &str = "https://api.test.datacite.org";

const JSON_API: &str = "application/vnd.api+json";

/// Connection settings for the registry.
#[derive(Clone)]
pub struct RegistryConfig {
  pub base_url:      String,
  pub principal:     String,
  pub secret:        String,
  pub timeout:       Duration,
  pub probe_timeout: Duration,
}

impl fmt::Debug for RegistryConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegistryConfig")
      .field("base_url", &self.base_url)
      .field("principal", &self.principal)
      .field("secret", &"<redacted>")
      .field("timeout", &self.timeout)
      .field("probe_timeout", &self.probe_timeout)
      .finish()
  }
}

/// Registry client.
///
/// Holds the document from the most recent successful fetch so that
/// `replace_all` for the same identifier merges into exactly what was
/// compared against. Nothing is cached across identifiers.
pub struct RegistryClient {
  client: Client,
  config: RegistryConfig,
  last:   Mutex<Option<(Identifier, Value)>>,
}

impl RegistryClient {
  pub fn new(config: RegistryConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .user_agent(concat!("agentsync/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self {
      client,
      config,
      last: Mutex::new(None),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  /// `{base}/dois/{id}` with every identifier segment percent-encoded; the
  /// identifier's own slashes stay path separators.
  fn doi_url(&self, identifier: &Identifier) -> Result<Url> {
    let base = &self.config.base_url;
    let mut url = Url::parse(base).map_err(|e| Error::Url(format!("{base}: {e}")))?;
    url
      .path_segments_mut()
      .map_err(|()| Error::Url(format!("{base}: cannot hold a path")))?
      .pop_if_empty()
      .push("dois")
      .extend(identifier.as_str().split('/'));
    Ok(url)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    let req = req.header(header::ACCEPT, JSON_API);
    if self.config.principal.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.principal, Some(&self.config.secret))
    }
  }

  async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Status {
      status: status.as_u16(),
      body,
    })
  }

  // ── Documents ─────────────────────────────────────────────────────────

  /// `GET /dois/{id}`; remembers the document for a following merge.
  pub async fn fetch_document(&self, identifier: &Identifier) -> Result<Value> {
    let resp = self
      .auth(self.client.get(self.doi_url(identifier)?))
      .send()
      .await?;
    let doc: Value = Self::check(resp).await?.json().await?;
    document::attributes(&doc)?;

    self.remember(identifier, &doc);
    Ok(doc)
  }

  /// `PUT /dois/{id}` with `desired` merged into the last fetched document.
  pub async fn put_category(&self, identifier: &Identifier, desired: &CategoryState) -> Result<()> {
    let base = match self.recall(identifier) {
      Some(doc) => doc,
      None => {
        tracing::debug!(%identifier, "no cached document; fetching before write");
        self.fetch_document(identifier).await?
      }
    };
    let payload = document::merge(&base, desired)?;

    let resp = self
      .auth(self.client.put(self.doi_url(identifier)?))
      .header(header::CONTENT_TYPE, JSON_API)
      .body(serde_json::to_vec(&payload)?)
      .send()
      .await?;
    Self::check(resp).await?;

    // The registry now holds the merged document.
    self.remember(identifier, &payload);
    tracing::info!(%identifier, category = %desired.category(), "registry updated");
    Ok(())
  }

  fn remember(&self, identifier: &Identifier, doc: &Value) {
    if let Ok(mut slot) = self.last.lock() {
      *slot = Some((identifier.clone(), doc.clone()));
    }
  }

  fn recall(&self, identifier: &Identifier) -> Option<Value> {
    let slot = self.last.lock().ok()?;
    match slot.as_ref() {
      Some((id, doc)) if id == identifier => Some(doc.clone()),
      _ => None,
    }
  }
}

// ─── MetadataRegistry impl ───────────────────────────────────────────────────

impl MetadataRegistry for RegistryClient {
  async fn fetch_current(
    &self,
    identifier: Identifier,
    category: Category,
  ) -> Result<CategoryState, RegistryError> {
    let doc = self.fetch_document(&identifier).await.map_err(|e| {
      tracing::warn!(%identifier, error = %e, "registry fetch failed");
      RegistryError::from(e)
    })?;
    Ok(document::read_category(&doc, category)?)
  }

  async fn replace_all(
    &self,
    identifier: Identifier,
    desired: CategoryState,
  ) -> Result<(), RegistryError> {
    self
      .put_category(&identifier, &desired)
      .await
      .map_err(RegistryError::from)
  }

  async fn probe(&self) -> bool {
    let result = self
      .client
      .get(self.url("/heartbeat"))
      .timeout(self.config.probe_timeout)
      .send()
      .await;
    match result {
      Ok(resp) if resp.status().is_success() => true,
      Ok(resp) => {
        tracing::warn!(status = %resp.status(), "registry heartbeat unhealthy");
        false
      }
      Err(e) => {
        tracing::warn!(error = %e, "registry unreachable");
        false
      }
    }
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use agentsync_core::agent::{Agent, Role};
  use serde_json::json;
  use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
  };

  use super::*;

  const DOI: &str = "10.5880/GFZ.TEST.1";

  fn client(server: &MockServer) -> RegistryClient {
    RegistryClient::new(RegistryConfig {
      base_url:      server.uri(),
      principal:     "GFZ.TEST".into(),
      secret:        "hunter2".into(),
      timeout:       Duration::from_secs(5),
      probe_timeout: Duration::from_secs(1),
    })
    .unwrap()
  }

  fn document() -> Value {
    json!({
      "data": {
        "id": DOI,
        "type": "dois",
        "attributes": {
          "doi": DOI,
          "titles": [{ "title": "Seismic data" }],
          "creators": [{ "name": "Lovelace, Ada", "nameType": "Personal" }],
          "contributors": [
            { "name": "Hopper, Grace", "contributorType": "Editor",
              "affiliation": [{ "name": "Navy" }] }
          ],
          "publisher": "GFZ Data Services"
        }
      }
    })
  }

  async fn mount_get(server: &MockServer) {
    Mock::given(method("GET"))
      .and(path(format!("/dois/{DOI}")))
      .and(header("accept", JSON_API))
      .respond_with(ResponseTemplate::new(200).set_body_json(document()))
      .mount(server)
      .await;
  }

  #[tokio::test]
  async fn fetch_current_reads_category() {
    let server = MockServer::start().await;
    mount_get(&server).await;

    let state = client(&server)
      .fetch_current(Identifier::new(DOI), Category::Contributors)
      .await
      .unwrap();
    assert_eq!(state.agents().len(), 1);
    assert_eq!(state.agents()[0].roles, vec![Role::Editor]);
  }

  #[tokio::test]
  async fn status_codes_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/dois/10.1/missing"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/dois/10.1/locked"))
      .respond_with(ResponseTemplate::new(401))
      .mount(&server)
      .await;

    let c = client(&server);
    let missing = c
      .fetch_current(Identifier::new("10.1/missing"), Category::Creators)
      .await
      .unwrap_err();
    assert_eq!(missing, RegistryError::NotFound);

    let locked = c
      .fetch_current(Identifier::new("10.1/locked"), Category::Creators)
      .await
      .unwrap_err();
    assert_eq!(locked, RegistryError::Unauthorized);
  }

  #[tokio::test]
  async fn reserved_characters_in_identifier_are_escaped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;

    let err = client(&server)
      .fetch_current(Identifier::new("10.1/odd#name?v=2"), Category::Creators)
      .await
      .unwrap_err();
    assert_eq!(err, RegistryError::NotFound);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/dois/10.1/odd%23name%3Fv=2");
    assert!(requests[0].url.query().is_none());
  }

  #[tokio::test]
  async fn replace_all_merges_into_fetched_document() {
    let server = MockServer::start().await;
    mount_get(&server).await;
    Mock::given(method("PUT"))
      .and(path(format!("/dois/{DOI}")))
      .and(header("content-type", JSON_API))
      .respond_with(ResponseTemplate::new(200).set_body_json(document()))
      .expect(1)
      .mount(&server)
      .await;

    let c = client(&server);
    let id = Identifier::new(DOI);
    c.fetch_current(id.clone(), Category::Contributors).await.unwrap();

    let desired = CategoryState::Contributors(vec![
      Agent::personal("Grace", "Hopper").with_roles([Role::Editor, Role::DataCurator]),
    ]);
    c.replace_all(id, desired).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let put = requests
      .iter()
      .find(|r| r.method.as_str() == "PUT")
      .expect("a PUT was sent");
    let body: Value = put.body_json().unwrap();
    let attrs = &body["data"]["attributes"];

    assert_eq!(attrs["titles"][0]["title"], "Seismic data");
    assert_eq!(attrs["creators"][0]["name"], "Lovelace, Ada");
    assert_eq!(attrs["publisher"], "GFZ Data Services");
    let contributors = attrs["contributors"].as_array().unwrap();
    assert_eq!(contributors.len(), 2);
    assert_eq!(contributors[1]["contributorType"], "DataCurator");
    assert_eq!(contributors[1]["affiliation"][0]["name"], "Navy");

    // Exactly one GET: the write reused the fetched document.
    assert_eq!(requests.iter().filter(|r| r.method.as_str() == "GET").count(), 1);
  }

  #[tokio::test]
  async fn rejected_write_surfaces_status_and_body() {
    let server = MockServer::start().await;
    mount_get(&server).await;
    Mock::given(method("PUT"))
      .respond_with(ResponseTemplate::new(422).set_body_string("invalid nameType"))
      .mount(&server)
      .await;

    let c = client(&server);
    let err = c
      .replace_all(Identifier::new(DOI), CategoryState::Creators(vec![]))
      .await
      .unwrap_err();
    assert_eq!(err, RegistryError::Rejected {
      status: 422,
      body:   "invalid nameType".into(),
    });
  }

  #[tokio::test]
  async fn probe_uses_heartbeat() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/heartbeat"))
      .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
      .mount(&server)
      .await;
    assert!(client(&server).probe().await);
  }

  #[tokio::test]
  async fn probe_fails_when_unreachable() {
    let server = MockServer::start().await;
    let c = client(&server);
    drop(server);
    assert!(!c.probe().await);
  }

  #[test]
  fn debug_redacts_secret() {
    let cfg = RegistryConfig {
      base_url:      TEST_URL.into(),
      principal:     "GFZ.TEST".into(),
      secret:        "hunter2".into(),
      timeout:       Duration::from_secs(30),
      probe_timeout: Duration::from_secs(5),
    };
    let shown = format!("{cfg:?}");
    assert!(!shown.contains("hunter2"));
  }
}
