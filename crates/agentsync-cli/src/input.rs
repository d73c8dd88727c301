//! Batch input files.
//!
//! A batch is a JSON array of `{ "identifier": "...", "value": ... }`. The
//! value is an agent list for creators and contributors and a publisher
//! object (or bare name) for the publisher category.

use agentsync_core::{
  agent::{Agent, Publisher},
  record::{Category, CategoryState, UpdateRecord},
};
use anyhow::Context as _;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct InputRecord {
  identifier: String,
  value:      Value,
}

pub fn parse_batch(category: Category, raw: &str) -> anyhow::Result<Vec<UpdateRecord>> {
  let records: Vec<InputRecord> =
    serde_json::from_str(raw).context("batch is not a JSON array of records")?;

  records
    .into_iter()
    .enumerate()
    .map(|(i, rec)| -> anyhow::Result<UpdateRecord> {
      let desired = desired_state(category, rec.value)
        .with_context(|| format!("record {} ({})", i + 1, rec.identifier))?;
      Ok(UpdateRecord::new(rec.identifier, desired))
    })
    .collect()
}

fn desired_state(category: Category, value: Value) -> anyhow::Result<CategoryState> {
  if category == Category::Publisher {
    let publisher = match value {
      Value::String(name) => Publisher::named(&name),
      other => serde_json::from_value(other).context("invalid publisher")?,
    };
    return Ok(CategoryState::Publisher(publisher));
  }
  let agents: Vec<Agent> = serde_json::from_value(value).context("invalid agent list")?;
  Ok(CategoryState::from_agents(category, agents))
}
