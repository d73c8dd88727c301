//! Integration tests for `SqliteStore` against an in-memory database.

use agentsync_core::{
  StoreError,
  agent::{Agent, ContactInfo, NameKind, Publisher, Role},
  client::RelationalStore,
  identifier::{Identifier, IdentifierScheme, NameIdentifier, ResourceKey},
  record::{Category, CategoryState},
};

use crate::SqliteStore;

const DOI: &str = "10.5880/GFZ.TEST.2024.001";

async fn store() -> (SqliteStore, ResourceKey) {
  let s = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  let key = s
    .ensure_resource(&Identifier::new(DOI), Some("GFZ Data Services"))
    .await
    .expect("seed resource");
  (s, key)
}

fn orcid(raw: &str) -> Option<NameIdentifier> {
  NameIdentifier::new(raw, Some(IdentifierScheme::Orcid))
}

fn contact(email: &str) -> ContactInfo {
  ContactInfo {
    email:    Some(email.into()),
    website:  None,
    position: Some("Data steward".into()),
  }
}

/// `(order, name, roles)` for every agent row, ordered.
async fn raw_rows(s: &SqliteStore, key: ResourceKey) -> Vec<(i64, String, String)> {
  s.connection()
    .call(move |conn| {
      let mut stmt = conn.prepare(
        r#"SELECT ra."order", ra.name, group_concat(r.role, ',')
           FROM resourceagent ra
           JOIN role r
             ON r.resourceagent_resource_id = ra.resource_id
            AND r.resourceagent_order       = ra."order"
           WHERE ra.resource_id = ?1
           GROUP BY ra."order", ra.name
           ORDER BY ra."order""#,
      )?;
      let rows = stmt
        .query_map(rusqlite::params![key.0], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await
    .unwrap()
}

async fn contactinfo_count(s: &SqliteStore, key: ResourceKey) -> i64 {
  s.connection()
    .call(move |conn| {
      Ok(conn.query_row(
        "SELECT count(*) FROM contactinfo WHERE resourceagent_resource_id = ?1",
        rusqlite::params![key.0],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap()
}

fn creators() -> CategoryState {
  CategoryState::Creators(vec![
    Agent::personal("Ada", "Lovelace").with_identifier(orcid("https://orcid.org/0000-0001-5000-0007")),
    Agent::organizational("GFZ German Research Centre for Geosciences"),
  ])
}

fn contributors() -> CategoryState {
  CategoryState::Contributors(vec![
    Agent::personal("Grace", "Hopper").with_roles([Role::Editor, Role::DataCurator]),
    Agent::personal("Alan", "Turing")
      .with_roles([Role::ContactPerson])
      .with_contact(contact("turing@example.org")),
  ])
}

// ─── Resolve ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_is_case_insensitive() {
  let (s, key) = store().await;
  let found = s
    .resolve_resource(Identifier::new(&DOI.to_lowercase()))
    .await
    .unwrap();
  assert_eq!(found, key);
}

#[tokio::test]
async fn resolve_missing_is_not_found() {
  let (s, _) = store().await;
  let err = s
    .resolve_resource(Identifier::new("10.0000/nope"))
    .await
    .unwrap_err();
  assert_eq!(err, StoreError::NotFound);
}

// ─── Creators ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn creators_round_trip_in_order() {
  let (s, key) = store().await;
  s.write_category_transactional(key, creators()).await.unwrap();

  let fetched = s.fetch_category(key, Category::Creators).await.unwrap();
  let agents = fetched.agents();
  assert_eq!(agents.len(), 2);
  assert_eq!(agents[0].name, "Lovelace, Ada");
  assert_eq!(agents[0].order, 1);
  assert_eq!(agents[0].roles, vec![Role::Creator]);
  assert_eq!(
    agents[0].identifier.as_ref().map(|i| i.value.as_str()),
    Some("0000-0001-5000-0007")
  );
  assert_eq!(agents[1].kind, NameKind::Organizational);
  assert!(agents[1].given_name.is_none());
  assert!(agents[1].family_name.is_none());
}

#[tokio::test]
async fn identifiers_are_stored_without_scheme_prefix() {
  let (s, key) = store().await;
  s.write_category_transactional(key, creators()).await.unwrap();

  let stored: Option<String> = s
    .connection()
    .call(move |conn| {
      Ok(conn.query_row(
        r#"SELECT identifier FROM resourceagent WHERE resource_id = ?1 AND "order" = 1"#,
        rusqlite::params![key.0],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap();
  assert_eq!(stored.as_deref(), Some("0000-0001-5000-0007"));
}

#[tokio::test]
async fn rewriting_creators_replaces_the_whole_list() {
  let (s, key) = store().await;
  s.write_category_transactional(key, creators()).await.unwrap();
  s.write_category_transactional(
    key,
    CategoryState::Creators(vec![Agent::personal("Marie", "Curie")]),
  )
  .await
  .unwrap();

  let rows = raw_rows(&s, key).await;
  assert_eq!(rows, vec![(1, "Curie, Marie".to_owned(), "Creator".to_owned())]);
}

// ─── Contributors ────────────────────────────────────────────────────────────

#[tokio::test]
async fn contributors_keep_role_sets_and_contact_info() {
  let (s, key) = store().await;
  s.write_category_transactional(key, contributors()).await.unwrap();

  let fetched = s.fetch_category(key, Category::Contributors).await.unwrap();
  let agents = fetched.agents();
  assert_eq!(agents.len(), 2);
  assert_eq!(agents[0].roles, vec![Role::Editor, Role::DataCurator]);
  assert!(agents[0].contact.is_none());
  assert_eq!(agents[1].roles, vec![Role::ContactPerson]);
  assert_eq!(
    agents[1].contact.as_ref().and_then(|c| c.email.as_deref()),
    Some("turing@example.org")
  );
}

#[tokio::test]
async fn contact_info_is_not_written_for_other_roles() {
  let (s, key) = store().await;
  let state = CategoryState::Contributors(vec![
    Agent::personal("Grace", "Hopper")
      .with_roles([Role::Editor])
      .with_contact(contact("hopper@example.org")),
  ]);
  s.write_category_transactional(key, state).await.unwrap();
  assert_eq!(contactinfo_count(&s, key).await, 0);
}

#[tokio::test]
async fn contributor_without_admissible_role_is_stored_as_other() {
  let (s, key) = store().await;
  let state = CategoryState::Contributors(vec![
    Agent::organizational("Helmholtz").with_roles([Role::Creator]),
  ]);
  s.write_category_transactional(key, state).await.unwrap();

  let rows = raw_rows(&s, key).await;
  assert_eq!(rows, vec![(1, "Helmholtz".to_owned(), "Other".to_owned())]);
}

#[tokio::test]
async fn categories_never_overwrite_each_other() {
  let (s, key) = store().await;
  s.write_category_transactional(key, creators()).await.unwrap();
  s.write_category_transactional(key, contributors()).await.unwrap();

  // Shrink the creators; contributors must come through untouched and
  // slide down so both ranges stay contiguous.
  s.write_category_transactional(
    key,
    CategoryState::Creators(vec![Agent::personal("Marie", "Curie")]),
  )
  .await
  .unwrap();

  let orders: Vec<i64> = raw_rows(&s, key).await.into_iter().map(|r| r.0).collect();
  assert_eq!(orders, vec![1, 2, 3]);

  let contributors_after = s.fetch_category(key, Category::Contributors).await.unwrap();
  assert_eq!(contributors_after.agents().len(), 2);
  assert_eq!(contributors_after.agents()[1].name, "Turing, Alan");
  assert!(contributors_after.agents()[1].contact.is_some());
  assert_eq!(contactinfo_count(&s, key).await, 1);

  // And the other way round.
  s.write_category_transactional(key, CategoryState::Contributors(vec![]))
    .await
    .unwrap();
  let creators_after = s.fetch_category(key, Category::Creators).await.unwrap();
  assert_eq!(creators_after.agents().len(), 1);
  assert_eq!(contactinfo_count(&s, key).await, 0);
}

#[tokio::test]
async fn shared_agent_loses_only_the_rewritten_roles() {
  let (s, key) = store().await;
  s.connection()
    .call(move |conn| {
      conn.execute_batch(&format!(
        r#"INSERT INTO resourceagent (resource_id, "order", name, firstname, lastname, nametype)
             VALUES ({id}, 1, 'Lovelace, Ada', 'Ada', 'Lovelace', 'Personal');
           INSERT INTO role VALUES ('Creator', {id}, 1);
           INSERT INTO role VALUES ('ContactPerson', {id}, 1);
           INSERT INTO contactinfo VALUES ({id}, 1, 'ada@example.org', NULL, NULL);"#,
        id = key.0
      ))?;
      Ok(())
    })
    .await
    .unwrap();

  let before = s.fetch_category(key, Category::Contributors).await.unwrap();
  assert_eq!(before.agents().len(), 1);
  assert_eq!(before.agents()[0].roles, vec![Role::ContactPerson]);

  s.write_category_transactional(key, CategoryState::Contributors(vec![]))
    .await
    .unwrap();

  let rows = raw_rows(&s, key).await;
  assert_eq!(rows, vec![(1, "Lovelace, Ada".to_owned(), "Creator".to_owned())]);
  assert_eq!(contactinfo_count(&s, key).await, 0);
}

// ─── Rollback ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_write_leaves_store_untouched() {
  let (s, key) = store().await;
  s.write_category_transactional(key, creators()).await.unwrap();
  let before = raw_rows(&s, key).await;

  // The second agent violates the non-empty name check after the deletes
  // have already run inside the transaction.
  let bad = CategoryState::Creators(vec![
    Agent::personal("Marie", "Curie"),
    Agent::organizational("   "),
  ]);
  let err = s.write_category_transactional(key, bad).await.unwrap_err();
  assert!(matches!(err, StoreError::Transaction(_)));

  assert_eq!(raw_rows(&s, key).await, before);
  let fetched = s.fetch_category(key, Category::Creators).await.unwrap();
  assert_eq!(fetched, creators().normalized().with_creator_roles());
}

// ─── Publisher ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn publisher_round_trips_by_name() {
  let (s, key) = store().await;
  let before = s.fetch_category(key, Category::Publisher).await.unwrap();
  assert_eq!(before, CategoryState::Publisher(Publisher::named("GFZ Data Services")));

  let mut desired = Publisher::named("  Helmholtz Open Science ");
  desired.lang = Some("en".into());
  s.write_category_transactional(key, CategoryState::Publisher(desired))
    .await
    .unwrap();

  let after = s.fetch_category(key, Category::Publisher).await.unwrap();
  assert_eq!(after, CategoryState::Publisher(Publisher::named("Helmholtz Open Science")));
}

#[tokio::test]
async fn probe_reports_reachable() {
  let (s, _) = store().await;
  assert!(s.probe().await);
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

trait WithCreatorRoles {
  fn with_creator_roles(self) -> Self;
}

impl WithCreatorRoles for CategoryState {
  /// What a creators fetch reports: every agent holds exactly the authorship
  /// role and no contact info.
  fn with_creator_roles(mut self) -> Self {
    if let Some(agents) = self.agents_mut() {
      for a in agents {
        a.roles = vec![Role::Creator];
        a.contact = None;
      }
    }
    self
  }
}
