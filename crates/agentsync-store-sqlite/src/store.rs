//! [`SqliteStore`]: the SQLite implementation of [`RelationalStore`].

use std::{collections::HashMap, path::Path, time::Duration};

use agentsync_core::{
  StoreError,
  agent::{Agent, Publisher, Role},
  client::RelationalStore,
  identifier::{Identifier, ResourceKey},
  record::{Category, CategoryState},
};
use rusqlite::{OptionalExtension as _, Transaction};

use crate::{
  Error, Result,
  encode::{RawAgent, encode_name_kind, persisted_roles, role_predicate},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The relational store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// share one connection, so a record's transaction always resolves before
/// the next statement runs.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init(busy_timeout).await?;
    Ok(store)
  }

  /// Open a private in-memory database with the schema applied.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init(Duration::from_secs(5)).await?;
    Ok(store)
  }

  async fn init(&self, busy_timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a resource row if none exists for `identifier` and return its
  /// key. Resources are normally created by other tooling; this is the seam
  /// for seeding.
  pub async fn ensure_resource(
    &self,
    identifier: &Identifier,
    publisher: Option<&str>,
  ) -> Result<ResourceKey> {
    let ident = identifier.as_str().to_owned();
    let publisher = publisher.map(str::to_owned);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO resource (identifier, publisher) VALUES (?1, ?2)
           ON CONFLICT (identifier) DO NOTHING",
          rusqlite::params![ident, publisher],
        )?;
        let id: i64 = conn.query_row(
          "SELECT id FROM resource WHERE identifier = ?1",
          rusqlite::params![ident],
          |r| r.get(0),
        )?;
        Ok(id)
      })
      .await?;

    Ok(ResourceKey(id))
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  // ── Inherent operations ───────────────────────────────────────────────

  async fn resolve(&self, identifier: Identifier) -> Result<ResourceKey> {
    let ident = identifier.as_str().to_owned();

    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT id FROM resource WHERE identifier = ?1",
            rusqlite::params![ident],
            |r| r.get(0),
          )
          .optional()?)
      })
      .await?;

    id.map(ResourceKey)
      .ok_or_else(|| Error::ResourceNotFound(identifier.as_str().to_owned()))
  }

  async fn fetch(&self, key: ResourceKey, category: Category) -> Result<CategoryState> {
    let resource_id = key.0;

    if category == Category::Publisher {
      let name: Option<Option<String>> = self
        .conn
        .call(move |conn| {
          Ok(conn
            .query_row(
              "SELECT publisher FROM resource WHERE id = ?1",
              rusqlite::params![resource_id],
              |r| r.get(0),
            )
            .optional()?)
        })
        .await?;
      let Some(name) = name else {
        return Err(Error::ResourceNotFound(key.to_string()));
      };
      return Ok(CategoryState::Publisher(Publisher::named(
        name.as_deref().unwrap_or_default(),
      )));
    }

    let pred = role_predicate(category);
    let (raws, roles): (Vec<RawAgent>, Vec<(i64, String)>) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          r#"SELECT
               ra."order", ra.name, ra.firstname, ra.lastname,
               ra.identifier, ra.identifiertype, ra.nametype,
               ci.email, ci.website, ci.position
             FROM resourceagent ra
             LEFT JOIN contactinfo ci
               ON ci.resourceagent_resource_id = ra.resource_id
              AND ci.resourceagent_order       = ra."order"
             WHERE ra.resource_id = ?1
               AND EXISTS (
                 SELECT 1 FROM role
                 WHERE role.resourceagent_resource_id = ra.resource_id
                   AND role.resourceagent_order       = ra."order"
                   AND {pred})
             ORDER BY ra."order""#
        ))?;
        let raws = stmt
          .query_map(rusqlite::params![resource_id], |row| {
            Ok(RawAgent {
              order:          row.get(0)?,
              name:           row.get(1)?,
              firstname:      row.get(2)?,
              lastname:       row.get(3)?,
              identifier:     row.get(4)?,
              identifiertype: row.get(5)?,
              nametype:       row.get(6)?,
              email:          row.get(7)?,
              website:        row.get(8)?,
              position:       row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT resourceagent_order, role FROM role
           WHERE resourceagent_resource_id = ?1
           ORDER BY rowid",
        )?;
        let roles = stmt
          .query_map(rusqlite::params![resource_id], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((raws, roles))
      })
      .await?;

    let mut by_order: HashMap<i64, Vec<String>> = HashMap::new();
    for (order, role) in roles {
      by_order.entry(order).or_default().push(role);
    }

    let agents: Vec<Agent> = raws
      .into_iter()
      .enumerate()
      .map(|(i, raw)| {
        let labels = by_order.get(&raw.order).map(Vec::as_slice).unwrap_or_default();
        raw.into_agent(category, i as u32 + 1, labels)
      })
      .collect();

    tracing::debug!(%key, %category, count = agents.len(), "fetched category rows");
    Ok(CategoryState::from_agents(category, agents))
  }

  async fn write(&self, key: ResourceKey, desired: CategoryState) -> Result<()> {
    let resource_id = key.0;
    let desired = desired.normalized();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        match &desired {
          CategoryState::Publisher(p) => {
            let n = tx.execute(
              "UPDATE resource SET publisher = ?1 WHERE id = ?2",
              rusqlite::params![p.name, resource_id],
            )?;
            if n == 0 {
              return Err(rusqlite::Error::QueryReturnedNoRows.into());
            }
          }
          agents_state => {
            rewrite_agents(&tx, resource_id, agents_state.category(), agents_state.agents())?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(())
  }
}

// ─── Category rewrite ────────────────────────────────────────────────────────

/// Replace one agent category of a resource inside `tx`.
///
/// Role rows owned by the category are dropped, agents left without roles are
/// dropped with their contact info, survivors are renumbered, and the desired
/// agents are inserted. Creators take orders `1..=n` and everything else
/// follows, so both categories stay contiguous.
fn rewrite_agents(
  tx: &Transaction<'_>,
  resource_id: i64,
  category: Category,
  desired: &[Agent],
) -> rusqlite::Result<()> {
  let pred = role_predicate(category);

  let dropped = tx.execute(
    &format!("DELETE FROM role WHERE resourceagent_resource_id = ?1 AND {pred}"),
    rusqlite::params![resource_id],
  )?;
  let orphaned = tx.execute(
    r#"DELETE FROM resourceagent
       WHERE resource_id = ?1
         AND NOT EXISTS (
           SELECT 1 FROM role
           WHERE role.resourceagent_resource_id = resourceagent.resource_id
             AND role.resourceagent_order       = resourceagent."order")"#,
    rusqlite::params![resource_id],
  )?;
  // Contact info only survives on agents still holding the contact role.
  tx.execute(
    "DELETE FROM contactinfo
     WHERE resourceagent_resource_id = ?1
       AND NOT EXISTS (
         SELECT 1 FROM role
         WHERE role.resourceagent_resource_id = contactinfo.resourceagent_resource_id
           AND role.resourceagent_order       = contactinfo.resourceagent_order
           AND lower(role.role) = 'contactperson')",
    rusqlite::params![resource_id],
  )?;

  let survivors: Vec<i64> = {
    let mut stmt = tx.prepare(
      r#"SELECT "order" FROM resourceagent WHERE resource_id = ?1 ORDER BY "order""#,
    )?;
    stmt
      .query_map(rusqlite::params![resource_id], |r| r.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };

  let (survivor_base, insert_base) = match category {
    Category::Creators => (desired.len() as i64, 0),
    _ => (0, survivors.len() as i64),
  };

  // Two passes so no intermediate state collides on the primary key.
  tx.execute(
    r#"UPDATE resourceagent SET "order" = -"order" WHERE resource_id = ?1"#,
    rusqlite::params![resource_id],
  )?;
  for (rank, old) in survivors.iter().enumerate() {
    tx.execute(
      r#"UPDATE resourceagent SET "order" = ?1 WHERE resource_id = ?2 AND "order" = ?3"#,
      rusqlite::params![survivor_base + rank as i64 + 1, resource_id, -old],
    )?;
  }

  for (i, agent) in desired.iter().enumerate() {
    let order = insert_base + i as i64 + 1;
    tx.execute(
      r#"INSERT INTO resourceagent
           (resource_id, "order", name, firstname, lastname,
            identifier, identifiertype, nametype)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
      rusqlite::params![
        resource_id,
        order,
        agent.name,
        agent.given_name,
        agent.family_name,
        agent.identifier.as_ref().map(|id| id.value.as_str()),
        agent.identifier.as_ref().map(|id| id.scheme.label()),
        encode_name_kind(agent.kind),
      ],
    )?;

    let roles = persisted_roles(category, agent);
    for role in &roles {
      tx.execute(
        "INSERT INTO role (role, resourceagent_resource_id, resourceagent_order)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![role.as_str(), resource_id, order],
      )?;
    }

    let contact = agent.contact.as_ref().filter(|_| roles.contains(&Role::ContactPerson));
    if let Some(ci) = contact {
      tx.execute(
        "INSERT INTO contactinfo
           (resourceagent_resource_id, resourceagent_order, email, website, position)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![resource_id, order, ci.email, ci.website, ci.position],
      )?;
    }
  }

  tracing::debug!(
    resource_id,
    %category,
    dropped_roles = dropped,
    dropped_agents = orphaned,
    kept = survivors.len(),
    inserted = desired.len(),
    "rewrote category"
  );
  Ok(())
}

// ─── RelationalStore impl ────────────────────────────────────────────────────

impl RelationalStore for SqliteStore {
  async fn resolve_resource(&self, identifier: Identifier) -> Result<ResourceKey, StoreError> {
    self.resolve(identifier).await.map_err(StoreError::from)
  }

  async fn fetch_category(
    &self,
    key: ResourceKey,
    category: Category,
  ) -> Result<CategoryState, StoreError> {
    self.fetch(key, category).await.map_err(StoreError::from)
  }

  async fn write_category_transactional(
    &self,
    key: ResourceKey,
    desired: CategoryState,
  ) -> Result<(), StoreError> {
    let category = desired.category();
    self.write(key, desired).await.map_err(|e| {
      tracing::error!(%key, %category, error = %e, "category write rolled back");
      StoreError::Transaction(e.to_string())
    })
  }

  async fn probe(&self) -> bool {
    let result = self
      .conn
      .call(|conn| {
        let v: String = conn.query_row("SELECT sqlite_version()", [], |r| r.get(0))?;
        Ok(v)
      })
      .await;
    match result {
      Ok(version) => {
        tracing::debug!(%version, "store probe ok");
        true
      }
      Err(e) => {
        tracing::warn!(error = %e, "store probe failed");
        false
      }
    }
  }
}
