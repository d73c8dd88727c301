//! Identifiers: resource identifiers, internal resource keys, and the
//! external person/organisation identifiers attached to agents.
//!
//! Agent identifiers exist in two forms. The relational store keeps the bare
//! ID (`0000-0001-5000-0007`); the registry exposes the full URI
//! (`https://orcid.org/0000-0001-5000-0007`). [`normalize`] maps either form to
//! the bare ID and [`NameIdentifier::uri`] maps back.

use std::{
  fmt,
  hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

// ─── Identifier ──────────────────────────────────────────────────────────────

/// The external key naming one resource (a DOI-like string).
///
/// Equality and hashing are case-insensitive; the original spelling is kept
/// for display and for requests against the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
  pub fn new(value: impl Into<String>) -> Self { Self(value.into().trim().to_owned()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl PartialEq for Identifier {
  fn eq(&self, other: &Self) -> bool { self.0.eq_ignore_ascii_case(&other.0) }
}

impl Eq for Identifier {}

impl Hash for Identifier {
  fn hash<H: Hasher>(&self, state: &mut H) {
    for b in self.0.bytes() {
      state.write_u8(b.to_ascii_lowercase());
    }
  }
}

impl fmt::Display for Identifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for Identifier {
  fn from(value: &str) -> Self { Self::new(value) }
}

impl From<String> for Identifier {
  fn from(value: String) -> Self { Self::new(value) }
}

impl From<Identifier> for String {
  fn from(value: Identifier) -> Self { value.0 }
}

// ─── ResourceKey ─────────────────────────────────────────────────────────────

/// Internal integer key of a resource row in the relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(pub i64);

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

// ─── Agent identifiers ───────────────────────────────────────────────────────

/// The scheme of an agent's external identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IdentifierScheme {
  Orcid,
  Ror,
  Isni,
  Other(String),
}

impl From<String> for IdentifierScheme {
  fn from(label: String) -> Self { Self::parse(&label) }
}

impl From<IdentifierScheme> for String {
  fn from(scheme: IdentifierScheme) -> Self { scheme.label().to_owned() }
}

/// Known scheme prefixes with their scheme label, matched case-insensitively.
const SCHEME_PREFIXES: &[(&str, &str)] = &[
  ("https://orcid.org/", "ORCID"),
  ("http://orcid.org/", "ORCID"),
  ("orcid.org/", "ORCID"),
  ("https://ror.org/", "ROR"),
  ("http://ror.org/", "ROR"),
  ("ror.org/", "ROR"),
  ("https://isni.org/isni/", "ISNI"),
  ("http://isni.org/isni/", "ISNI"),
  ("https://www.isni.org/isni/", "ISNI"),
  ("http://www.isni.org/isni/", "ISNI"),
  ("isni.org/isni/", "ISNI"),
];

impl IdentifierScheme {
  /// Parse a scheme label as stored in the registry or the relational store.
  pub fn parse(label: &str) -> Self {
    match label.trim().to_ascii_uppercase().as_str() {
      "ORCID" => Self::Orcid,
      "ROR" => Self::Ror,
      "ISNI" => Self::Isni,
      _ => Self::Other(label.trim().to_owned()),
    }
  }

  pub fn label(&self) -> &str {
    match self {
      Self::Orcid => "ORCID",
      Self::Ror => "ROR",
      Self::Isni => "ISNI",
      Self::Other(s) => s,
    }
  }

  /// The registry's `schemeUri` value, if the scheme has one.
  pub fn scheme_uri(&self) -> Option<&'static str> {
    match self {
      Self::Orcid => Some("https://orcid.org"),
      Self::Ror => Some("https://ror.org"),
      Self::Isni => Some("https://isni.org/isni"),
      Self::Other(_) => None,
    }
  }

  /// Guess the scheme of a raw value by its URI prefix.
  pub fn detect(raw: &str) -> Option<Self> {
    let lower = raw.trim().to_ascii_lowercase();
    SCHEME_PREFIXES
      .iter()
      .find(|(prefix, _)| lower.starts_with(prefix))
      .map(|(_, label)| Self::parse(label))
  }
}

/// Strip any known URI scheme prefix. Idempotent; values without a known
/// prefix are returned trimmed and otherwise unchanged.
pub fn normalize(raw: &str) -> String {
  let trimmed = raw.trim();
  let lower = trimmed.to_ascii_lowercase();
  for (prefix, _) in SCHEME_PREFIXES {
    if lower.starts_with(prefix) {
      return trimmed[prefix.len()..].trim_matches('/').to_owned();
    }
  }
  trimmed.to_owned()
}

/// An agent's external identifier. `value` is always held in normalized
/// (bare) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameIdentifier {
  pub value:  String,
  pub scheme: IdentifierScheme,
}

impl NameIdentifier {
  /// Build from either the URI or the bare form. The scheme is taken from the
  /// URI prefix when present, otherwise from `scheme_hint`, otherwise ORCID.
  pub fn new(raw: &str, scheme_hint: Option<IdentifierScheme>) -> Option<Self> {
    let value = normalize(raw);
    if value.is_empty() {
      return None;
    }
    let scheme = IdentifierScheme::detect(raw)
      .or(scheme_hint)
      .unwrap_or(IdentifierScheme::Orcid);
    Some(Self { value, scheme })
  }

  /// The full URI form exposed through the registry.
  pub fn uri(&self) -> String {
    match self.scheme.scheme_uri() {
      Some(base) => format!("{base}/{}", self.value),
      None => self.value.clone(),
    }
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
