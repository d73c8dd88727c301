//! Mapping between registry documents and agentsync category state.
//!
//! Agent identifiers travel in URI form here and are normalized on the way
//! in. Contributor entries carry a single `contributorType`, so one agent
//! with several roles occupies several entries.

use std::collections::HashMap;

use agentsync_core::{
  agent::{Agent, IdentityKey, NameKind, Publisher, Role},
  identifier::{IdentifierScheme, NameIdentifier},
  record::{Category, CategoryState},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteAgent {
  #[serde(default)]
  name:             Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  name_type:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  given_name:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  family_name:      Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  name_identifiers: Vec<RemoteNameIdentifier>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  contributor_type: Option<String>,
  /// Opaque; carried over from the current entry of the same agent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  affiliation:      Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteNameIdentifier {
  #[serde(default)]
  name_identifier:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  name_identifier_scheme: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  scheme_uri:             Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemotePublisher {
  #[serde(default)]
  name:                        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  publisher_identifier:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  publisher_identifier_scheme: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  scheme_uri:                  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  lang:                        Option<String>,
}

/// JSON key under `data.attributes` holding `category`.
fn attribute_key(category: Category) -> &'static str {
  match category {
    Category::Creators => "creators",
    Category::Contributors => "contributors",
    Category::Publisher => "publisher",
  }
}

/// `data.attributes` of a registry document.
pub fn attributes(document: &Value) -> Result<&Map<String, Value>> {
  document
    .get("data")
    .and_then(|d| d.get("attributes"))
    .and_then(Value::as_object)
    .ok_or_else(|| Error::Document("missing data.attributes".into()))
}

// ─── Reading ─────────────────────────────────────────────────────────────────

/// Extract one category from a registry document.
pub fn read_category(document: &Value, category: Category) -> Result<CategoryState> {
  let attrs = attributes(document)?;
  let raw = attrs.get(attribute_key(category)).cloned().unwrap_or(Value::Null);

  if category == Category::Publisher {
    return Ok(CategoryState::Publisher(read_publisher(raw)?));
  }

  let entries: Vec<RemoteAgent> = match raw {
    Value::Null => Vec::new(),
    other => serde_json::from_value(other)?,
  };

  let mut agents: Vec<Agent> = Vec::with_capacity(entries.len());
  let mut index: HashMap<IdentityKey, usize> = HashMap::new();

  for entry in entries {
    let role = match category {
      Category::Creators => Role::Creator,
      _ => entry
        .contributor_type
        .as_deref()
        .map(Role::parse_lenient)
        .unwrap_or(Role::Other),
    };
    let agent = agent_from_remote(entry);
    let key = agent.identity_key();

    match (category, index.get(&key)) {
      // Repeated contributor entries are the same agent under another role.
      (Category::Contributors, Some(&i)) => {
        if !agents[i].roles.contains(&role) {
          agents[i].roles.push(role);
        }
      }
      _ => {
        index.entry(key).or_insert(agents.len());
        agents.push(Agent {
          order: agents.len() as u32 + 1,
          roles: vec![role],
          ..agent
        });
      }
    }
  }

  Ok(CategoryState::from_agents(category, agents))
}

fn agent_from_remote(entry: RemoteAgent) -> Agent {
  let kind = entry
    .name_type
    .as_deref()
    .and_then(|s| s.parse().ok())
    .unwrap_or(NameKind::Personal);

  let identifier = entry.name_identifiers.iter().find_map(|ni| {
    let raw = ni.name_identifier.as_deref()?;
    let hint = ni
      .name_identifier_scheme
      .as_deref()
      .filter(|s| !s.trim().is_empty())
      .map(IdentifierScheme::parse);
    NameIdentifier::new(raw, hint)
  });

  let agent = Agent {
    name: entry.name.unwrap_or_default(),
    kind,
    given_name: entry.given_name,
    family_name: entry.family_name,
    identifier,
    order: 0,
    roles: Vec::new(),
    contact: None,
  };
  agent.sanitized()
}

fn read_publisher(raw: Value) -> Result<Publisher> {
  Ok(match raw {
    Value::Null => Publisher::default(),
    Value::String(name) => Publisher::named(&name),
    other => {
      let p: RemotePublisher = serde_json::from_value(other)?;
      Publisher {
        name:              p.name.unwrap_or_default().trim().to_owned(),
        identifier:        p.publisher_identifier,
        identifier_scheme: p.publisher_identifier_scheme,
        scheme_uri:        p.scheme_uri,
        lang:              p.lang,
      }
    }
  })
}

// ─── Writing ─────────────────────────────────────────────────────────────────

/// Render `desired` as the registry value for its category. `previous` is the
/// category's current raw value; affiliations of agents that appear in both
/// are carried over.
pub fn render_category(desired: &CategoryState, previous: Option<&Value>) -> Result<Value> {
  let agents = match desired {
    CategoryState::Publisher(p) => return Ok(render_publisher(p)),
    other => other.agents(),
  };
  let category = desired.category();

  let previous: Vec<RemoteAgent> = match previous {
    Some(v @ Value::Array(_)) => serde_json::from_value(v.clone())?,
    _ => Vec::new(),
  };
  let mut affiliations: HashMap<IdentityKey, Value> = HashMap::new();
  for entry in previous {
    let Some(aff) = entry.affiliation.clone() else { continue };
    affiliations
      .entry(agent_from_remote(entry).identity_key())
      .or_insert(aff);
  }

  let mut out = Vec::with_capacity(agents.len());
  for agent in agents {
    let agent = agent.sanitized();
    let base = RemoteAgent {
      name:             Some(agent.name.clone()),
      name_type:        Some(agent.kind.to_string()),
      given_name:       agent.given_name.clone(),
      family_name:      agent.family_name.clone(),
      name_identifiers: agent
        .identifier
        .iter()
        .map(|id| RemoteNameIdentifier {
          name_identifier:        Some(id.uri()),
          name_identifier_scheme: Some(id.scheme.label().to_owned()),
          scheme_uri:             id.scheme.scheme_uri().map(str::to_owned),
        })
        .collect(),
      contributor_type: None,
      affiliation:      affiliations.get(&agent.identity_key()).cloned(),
    };

    match category {
      Category::Contributors => {
        for role in Category::Contributors.registry_roles(&agent.roles) {
          let mut entry = base.clone();
          entry.contributor_type = Some(role.as_str().to_owned());
          out.push(serde_json::to_value(entry)?);
        }
      }
      _ => out.push(serde_json::to_value(base)?),
    }
  }
  Ok(Value::Array(out))
}

fn render_publisher(p: &Publisher) -> Value {
  if !p.is_extended() {
    return Value::String(p.name.clone());
  }
  let remote = RemotePublisher {
    name:                        Some(p.name.clone()),
    publisher_identifier:        p.identifier.clone(),
    publisher_identifier_scheme: p.identifier_scheme.clone(),
    scheme_uri:                  p.scheme_uri.clone(),
    lang:                        p.lang.clone(),
  };
  serde_json::to_value(remote).unwrap_or_else(|_| Value::String(p.name.clone()))
}

/// Build the `PUT` payload: the fetched document's attributes with only the
/// target category replaced.
pub fn merge(document: &Value, desired: &CategoryState) -> Result<Value> {
  let mut attrs = attributes(document)?.clone();
  let key = attribute_key(desired.category());
  let rendered = render_category(desired, attrs.get(key))?;
  attrs.insert(key.to_owned(), rendered);

  Ok(serde_json::json!({
    "data": {
      "type": "dois",
      "attributes": attrs,
    }
  }))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
