//! Conversions between agentsync domain types and the plain-text columns of
//! the relational schema.

use std::collections::BTreeSet;

use agentsync_core::{
  agent::{Agent, ContactInfo, NameKind, Role},
  identifier::{IdentifierScheme, NameIdentifier},
  record::Category,
};

// ─── NameKind ────────────────────────────────────────────────────────────────

pub fn encode_name_kind(k: NameKind) -> &'static str {
  match k {
    NameKind::Personal => "Personal",
    NameKind::Organizational => "Organizational",
  }
}

/// Unknown or missing values read as personal.
pub fn decode_name_kind(s: Option<&str>) -> NameKind {
  s.and_then(|s| s.trim().parse().ok()).unwrap_or_default()
}

// ─── Role filter ─────────────────────────────────────────────────────────────

/// SQL predicate over a `role` column selecting the rows owned by `category`.
pub fn role_predicate(category: Category) -> &'static str {
  match category {
    Category::Creators => "lower(role) = 'creator'",
    Category::Contributors => "lower(role) <> 'creator'",
    Category::Publisher => "0",
  }
}

/// The role rows a category write persists for `agent`; see
/// [`Category::project_roles`].
pub fn persisted_roles(category: Category, agent: &Agent) -> Vec<Role> {
  category.project_roles(&agent.roles)
}

// ─── Raw row ─────────────────────────────────────────────────────────────────

/// A `resourceagent` row joined with its optional `contactinfo` row.
pub struct RawAgent {
  pub order:          i64,
  pub name:           String,
  pub firstname:      Option<String>,
  pub lastname:       Option<String>,
  pub identifier:     Option<String>,
  pub identifiertype: Option<String>,
  pub nametype:       Option<String>,
  pub email:          Option<String>,
  pub website:        Option<String>,
  pub position:       Option<String>,
}

impl RawAgent {
  /// Build the domain agent. `roles` are the raw labels attached to this
  /// row; only those `category` admits are kept.
  pub fn into_agent(self, category: Category, position: u32, roles: &[String]) -> Agent {
    let kind = decode_name_kind(self.nametype.as_deref());
    let scheme = self
      .identifiertype
      .as_deref()
      .filter(|s| !s.trim().is_empty())
      .map(IdentifierScheme::parse);
    let identifier = self
      .identifier
      .as_deref()
      .and_then(|raw| NameIdentifier::new(raw, scheme));

    let mut seen = BTreeSet::new();
    let roles: Vec<Role> = roles
      .iter()
      .map(|r| Role::parse_lenient(r))
      .filter(|r| category.admits(*r) && seen.insert(*r))
      .collect();

    let contact = ContactInfo {
      email:    self.email,
      website:  self.website,
      position: self.position,
    };

    let agent = Agent {
      name: self.name,
      kind,
      given_name: self.firstname,
      family_name: self.lastname,
      identifier,
      order: position,
      roles,
      contact: Some(contact),
    };
    agent.sanitized()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn creators_persist_only_authorship() {
    let a = Agent::personal("Ada", "Lovelace").with_roles([Role::ContactPerson]);
    assert_eq!(persisted_roles(Category::Creators, &a), vec![Role::Creator]);
  }

  #[test]
  fn contributor_without_admissible_role_becomes_other() {
    let a = Agent::personal("Ada", "Lovelace").with_roles([Role::Creator]);
    assert_eq!(persisted_roles(Category::Contributors, &a), vec![Role::Other]);

    let b = Agent::personal("Ada", "Lovelace").with_roles([
      Role::Editor,
      Role::Creator,
      Role::Editor,
      Role::DataCurator,
    ]);
    assert_eq!(persisted_roles(Category::Contributors, &b), vec![
      Role::Editor,
      Role::DataCurator
    ]);
  }

  #[test]
  fn decode_name_kind_defaults_to_personal() {
    assert_eq!(decode_name_kind(None), NameKind::Personal);
    assert_eq!(decode_name_kind(Some("organizational")), NameKind::Organizational);
    assert_eq!(decode_name_kind(Some("Robot")), NameKind::Personal);
  }
}
