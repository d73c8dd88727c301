//! Agents (the people and organisations attached to a resource) and the
//! publisher value.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::identifier::NameIdentifier;

// ─── Name kind ───────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum NameKind {
  #[default]
  Personal,
  Organizational,
}

// ─── Roles ───────────────────────────────────────────────────────────────────

/// The closed role vocabulary. [`Role::Creator`] denotes authorship; every
/// other label denotes contributorship.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Role {
  Creator,
  ContactPerson,
  DataCollector,
  DataCurator,
  DataManager,
  Distributor,
  Editor,
  HostingInstitution,
  Producer,
  ProjectLeader,
  ProjectManager,
  ProjectMember,
  RegistrationAgency,
  RegistrationAuthority,
  RelatedPerson,
  Researcher,
  ResearchGroup,
  RightsHolder,
  Sponsor,
  Supervisor,
  Translator,
  WorkPackageLeader,
  Other,
  /// Institution-internal point-of-contact label; never sent to the registry.
  #[serde(rename = "pointOfContact")]
  #[strum(serialize = "pointOfContact")]
  PointOfContact,
}

impl Role {
  pub fn is_authorship(self) -> bool { self == Self::Creator }

  /// Whether agents holding this role carry [`ContactInfo`].
  pub fn is_contact(self) -> bool { self == Self::ContactPerson }

  /// Whether the registry has a contributor type for this role.
  pub fn is_registry_visible(self) -> bool { self != Self::PointOfContact }

  pub fn as_str(self) -> &'static str { self.into() }

  /// Parse a stored label; unknown labels fall back to [`Role::Other`].
  pub fn parse_lenient(label: &str) -> Self { label.trim().parse().unwrap_or(Self::Other) }
}

// ─── Contact info ────────────────────────────────────────────────────────────

/// Side record for agents holding the contact role. Lives only in the
/// relational store; the registry has no field for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
  pub email:    Option<String>,
  pub website:  Option<String>,
  pub position: Option<String>,
}

impl ContactInfo {
  /// Trim every field and drop empty ones; `None` when nothing is left.
  pub fn normalized(&self) -> Option<Self> {
    let clean = |v: &Option<String>| {
      v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
    };
    let ci = Self {
      email:    clean(&self.email),
      website:  clean(&self.website),
      position: clean(&self.position),
    };
    (!ci.is_empty()).then_some(ci)
  }

  pub fn is_empty(&self) -> bool {
    self.email.is_none() && self.website.is_none() && self.position.is_none()
  }
}

// ─── Agent ───────────────────────────────────────────────────────────────────

/// A person or organisation attached to a resource in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
  /// Display name; `Family, Given` for personal agents by convention.
  pub name:        String,
  #[serde(default)]
  pub kind:        NameKind,
  /// Always `None` for organisational agents.
  #[serde(default)]
  pub given_name:  Option<String>,
  /// Always `None` for organisational agents.
  #[serde(default)]
  pub family_name: Option<String>,
  #[serde(default)]
  pub identifier:  Option<NameIdentifier>,
  /// 1-based position within the category; the display sequence.
  #[serde(default)]
  pub order:       u32,
  /// Role labels in the order they were supplied.
  #[serde(default)]
  pub roles:       Vec<Role>,
  #[serde(default)]
  pub contact:     Option<ContactInfo>,
}

impl Agent {
  pub fn personal(given: &str, family: &str) -> Self {
    let given = given.trim();
    let family = family.trim();
    let name = if given.is_empty() {
      family.to_owned()
    } else {
      format!("{family}, {given}")
    };
    Self {
      name,
      kind: NameKind::Personal,
      given_name: (!given.is_empty()).then(|| given.to_owned()),
      family_name: (!family.is_empty()).then(|| family.to_owned()),
      identifier: None,
      order: 0,
      roles: Vec::new(),
      contact: None,
    }
  }

  pub fn organizational(name: &str) -> Self {
    Self {
      name:        name.trim().to_owned(),
      kind:        NameKind::Organizational,
      given_name:  None,
      family_name: None,
      identifier:  None,
      order:       0,
      roles:       Vec::new(),
      contact:     None,
    }
  }

  pub fn with_identifier(mut self, identifier: Option<NameIdentifier>) -> Self {
    self.identifier = identifier;
    self
  }

  pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
    self.roles = roles.into_iter().collect();
    self
  }

  pub fn with_contact(mut self, contact: ContactInfo) -> Self {
    self.contact = Some(contact);
    self
  }

  /// Case-insensitive, deduplicated, order-free view of the role labels.
  pub fn canonical_roles(&self) -> BTreeSet<Role> { self.roles.iter().copied().collect() }

  pub fn has_role(&self, role: Role) -> bool { self.roles.contains(&role) }

  pub fn holds_contact_role(&self) -> bool { self.roles.iter().any(|r| r.is_contact()) }

  /// The key used to pair agents across systems: the normalized identifier
  /// when present, otherwise the lower-cased, whitespace-collapsed name.
  pub fn identity_key(&self) -> IdentityKey {
    match &self.identifier {
      Some(id) => IdentityKey::Identifier(id.value.to_lowercase()),
      None => IdentityKey::Name(normalize_name(&self.name)),
    }
  }

  /// Enforce the data-model invariants before persisting: organisational
  /// agents lose given/family names, roles are deduplicated keeping first
  /// occurrence, contact info is kept only for holders of the contact role.
  pub fn sanitized(&self) -> Self {
    let mut out = self.clone();
    out.name = out.name.trim().to_owned();
    if out.kind == NameKind::Organizational {
      out.given_name = None;
      out.family_name = None;
    } else {
      out.given_name = trimmed(&out.given_name);
      out.family_name = trimmed(&out.family_name);
    }
    let mut seen = BTreeSet::new();
    out.roles.retain(|r| seen.insert(*r));
    out.contact = if out.holds_contact_role() {
      out.contact.as_ref().and_then(ContactInfo::normalized)
    } else {
      None
    };
    out
  }
}

/// See [`Agent::identity_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityKey {
  Identifier(String),
  Name(String),
}

pub fn normalize_name(name: &str) -> String {
  name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn trimmed(v: &Option<String>) -> Option<String> {
  v.as_deref()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
}

// ─── Publisher ───────────────────────────────────────────────────────────────

/// The degenerate single-value category. The relational store keeps only the
/// name; the registry keeps the extended form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
  pub name:              String,
  #[serde(default)]
  pub identifier:        Option<String>,
  #[serde(default)]
  pub identifier_scheme: Option<String>,
  #[serde(default)]
  pub scheme_uri:        Option<String>,
  #[serde(default)]
  pub lang:              Option<String>,
}

impl Publisher {
  pub fn named(name: &str) -> Self {
    Self {
      name: name.trim().to_owned(),
      ..Self::default()
    }
  }

  /// Whether any extended field is set; decides between the string and the
  /// object form on the registry side.
  pub fn is_extended(&self) -> bool {
    self.identifier.is_some()
      || self.identifier_scheme.is_some()
      || self.scheme_uri.is_some()
      || self.lang.is_some()
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::identifier::IdentifierScheme;

  #[test]
  fn role_parse_is_case_insensitive() {
    assert_eq!("contactperson".parse::<Role>().unwrap(), Role::ContactPerson);
    assert_eq!("CREATOR".parse::<Role>().unwrap(), Role::Creator);
    assert_eq!("pointOfContact".parse::<Role>().unwrap(), Role::PointOfContact);
    assert_eq!(Role::parse_lenient("Astronaut"), Role::Other);
  }

  #[test]
  fn role_labels_round_trip_through_as_str() {
    assert_eq!(Role::WorkPackageLeader.as_str(), "WorkPackageLeader");
    assert_eq!(Role::PointOfContact.as_str(), "pointOfContact");
  }

  #[test]
  fn personal_builds_display_name() {
    let a = Agent::personal("Ada", "Lovelace");
    assert_eq!(a.name, "Lovelace, Ada");
    assert_eq!(a.given_name.as_deref(), Some("Ada"));

    let b = Agent::personal("", "Plato");
    assert_eq!(b.name, "Plato");
    assert!(b.given_name.is_none());
  }

  #[test]
  fn sanitized_clears_names_on_organizations() {
    let mut org = Agent::organizational("GFZ Data Services");
    org.given_name = Some("stray".into());
    let clean = org.sanitized();
    assert!(clean.given_name.is_none());
    assert!(clean.family_name.is_none());
  }

  #[test]
  fn sanitized_drops_contact_without_contact_role() {
    let a = Agent::personal("Ada", "Lovelace")
      .with_roles([Role::Editor])
      .with_contact(ContactInfo {
        email: Some("ada@example.org".into()),
        ..ContactInfo::default()
      });
    assert!(a.sanitized().contact.is_none());

    let b = a.clone().with_roles([Role::ContactPerson, Role::Editor, Role::ContactPerson]);
    let clean = b.sanitized();
    assert_eq!(clean.roles, vec![Role::ContactPerson, Role::Editor]);
    assert!(clean.contact.is_some());
  }

  #[test]
  fn identity_key_prefers_identifier() {
    let id = NameIdentifier::new("0000-0001-5000-0007", Some(IdentifierScheme::Orcid));
    let a = Agent::personal("Ada", "Lovelace").with_identifier(id);
    assert!(matches!(a.identity_key(), IdentityKey::Identifier(_)));

    let b = Agent::organizational("  GFZ   Data Services ");
    assert_eq!(b.identity_key(), IdentityKey::Name("gfz data services".into()));
  }
}
