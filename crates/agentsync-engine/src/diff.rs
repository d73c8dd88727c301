//! Change detection: current category state vs desired state.
//!
//! Produces a list of human-readable change descriptions; an empty list
//! means nothing user-visible differs and the record can be skipped. When in
//! doubt the detector reports a change. Reporting "unchanged" for a real
//! difference would silently drop an edit.

use std::collections::BTreeSet;

use agentsync_core::{
  agent::{Agent, ContactInfo, Publisher, Role, normalize_name},
  identifier::{self, NameIdentifier},
  record::{Category, CategoryState},
};

use crate::{Error, Result};

/// The differences found between two states of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
  pub changes: Vec<String>,
}

impl ChangeSet {
  pub fn has_changes(&self) -> bool { !self.changes.is_empty() }

  fn push(&mut self, change: String) { self.changes.push(change); }
}

/// Shorthand for `detect(..)?.has_changes()`.
pub fn has_changes(current: &CategoryState, desired: &CategoryState) -> Result<bool> {
  Ok(detect(current, desired)?.has_changes())
}

/// Compare `current` against `desired`. Both must be the same category.
///
/// Rejects contributor lists with duplicate identities.
pub fn detect(current: &CategoryState, desired: &CategoryState) -> Result<ChangeSet> {
  if current.category() != desired.category() {
    return Err(Error::CategoryMismatch {
      current: current.category(),
      desired: desired.category(),
    });
  }
  desired.check_identities()?;

  let mut set = ChangeSet::default();
  match desired {
    CategoryState::Creators(des) => diff_positional(current.agents(), des, &mut set),
    CategoryState::Contributors(des) => diff_paired(current.agents(), des, &mut set),
    CategoryState::Publisher(des) => {
      if let CategoryState::Publisher(cur) = current {
        diff_publisher(cur, des, &mut set);
      }
    }
  }
  Ok(set)
}

// ─── Creators: order-sensitive ───────────────────────────────────────────────

fn diff_positional(current: &[Agent], desired: &[Agent], set: &mut ChangeSet) {
  let noun = Category::Creators.noun();
  if current.len() != desired.len() {
    set.push(format!("{noun} count {} -> {}", current.len(), desired.len()));
  }
  for (i, (cur, des)) in current.iter().zip(desired).enumerate() {
    let label = format!("{noun} {}", i + 1);
    diff_fields(&label, cur, des, set);
  }
  for (i, extra) in desired.iter().enumerate().skip(current.len()) {
    set.push(format!("{noun} {} added: {}", i + 1, extra.name));
  }
  for (i, gone) in current.iter().enumerate().skip(desired.len()) {
    set.push(format!("{noun} {} removed: {}", i + 1, gone.name));
  }
}

// ─── Contributors: identity-paired, order-insensitive ────────────────────────

fn diff_paired(current: &[Agent], desired: &[Agent], set: &mut ChangeSet) {
  let noun = Category::Contributors.noun();
  let mut taken = vec![false; current.len()];
  let mut pairs: Vec<(usize, Option<usize>)> = Vec::with_capacity(desired.len());

  // Identifier matches take precedence over name matches.
  for (d, des) in desired.iter().enumerate() {
    let found = des.identifier.as_ref().and_then(|id| {
      (0..current.len())
        .find(|&c| !taken[c] && same_identifier(current[c].identifier.as_ref(), Some(id)))
    });
    if let Some(c) = found {
      taken[c] = true;
    }
    pairs.push((d, found));
  }
  for (d, slot) in pairs.iter_mut() {
    if slot.is_some() {
      continue;
    }
    let des = &desired[*d];
    let key = normalize_name(&des.name);
    *slot = (0..current.len()).find(|&c| {
      let cur = &current[c];
      // Two differing identifiers never pair by name.
      !taken[c]
        && !(cur.identifier.is_some() && des.identifier.is_some())
        && normalize_name(&cur.name) == key
    });
    if let Some(c) = *slot {
      taken[c] = true;
    }
  }

  for (d, slot) in pairs {
    let des = &desired[d];
    match slot {
      Some(c) => {
        let cur = &current[c];
        let label = format!("{noun} {:?}", des.name);
        diff_fields(&label, cur, des, set);

        let (cr, dr) = (cur.canonical_roles(), des.canonical_roles());
        if cr != dr {
          set.push(format!("{label}: roles {} -> {}", role_list(&cr), role_list(&dr)));
        }
        if (cur.holds_contact_role() || des.holds_contact_role())
          && !same_contact(cur.contact.as_ref(), des.contact.as_ref())
        {
          set.push(format!("{label}: contact info changed"));
        }
      }
      None => set.push(format!("{noun} added: {}", des.name)),
    }
  }
  for (c, cur) in current.iter().enumerate() {
    if !taken[c] {
      set.push(format!("{noun} removed: {}", cur.name));
    }
  }
}

// ─── Shared field rules ──────────────────────────────────────────────────────

fn diff_fields(label: &str, cur: &Agent, des: &Agent, set: &mut ChangeSet) {
  if cur.name.trim() != des.name.trim() {
    set.push(format!("{label}: name {:?} -> {:?}", cur.name, des.name));
  }
  if cur.kind != des.kind {
    set.push(format!("{label}: name type {} -> {}", cur.kind, des.kind));
  }
  if opt_trim(&cur.given_name) != opt_trim(&des.given_name) {
    set.push(format!("{label}: given name changed"));
  }
  if opt_trim(&cur.family_name) != opt_trim(&des.family_name) {
    set.push(format!("{label}: family name changed"));
  }
  if !same_identifier(cur.identifier.as_ref(), des.identifier.as_ref()) {
    set.push(format!(
      "{label}: identifier {} -> {}",
      show_identifier(cur.identifier.as_ref()),
      show_identifier(des.identifier.as_ref())
    ));
  }
}

/// Equal when both are absent, or both normalize to the same value under the
/// same scheme.
fn same_identifier(a: Option<&NameIdentifier>, b: Option<&NameIdentifier>) -> bool {
  match (a, b) {
    (None, None) => true,
    (Some(a), Some(b)) => {
      identifier::normalize(&a.value) == identifier::normalize(&b.value)
        && a.scheme.label().eq_ignore_ascii_case(b.scheme.label())
    }
    _ => false,
  }
}

fn same_contact(a: Option<&ContactInfo>, b: Option<&ContactInfo>) -> bool {
  a.and_then(ContactInfo::normalized) == b.and_then(ContactInfo::normalized)
}

fn role_list(roles: &BTreeSet<Role>) -> String {
  roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(",")
}

fn show_identifier(id: Option<&NameIdentifier>) -> String {
  id.map(|i| i.value.clone()).unwrap_or_else(|| "none".into())
}

fn opt_trim(v: &Option<String>) -> Option<&str> {
  v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ─── Publisher ───────────────────────────────────────────────────────────────

fn diff_publisher(cur: &Publisher, des: &Publisher, set: &mut ChangeSet) {
  if cur.name.trim() != des.name.trim() {
    set.push(format!("publisher name {:?} -> {:?}", cur.name, des.name));
  }
  let ident = |p: &Publisher| p.identifier.as_deref().map(identifier::normalize);
  if ident(cur) != ident(des) {
    set.push("publisher identifier changed".into());
  }
  let folded = |v: &Option<String>| v.as_deref().map(|s| s.trim().to_ascii_lowercase());
  if folded(&cur.identifier_scheme) != folded(&des.identifier_scheme) {
    set.push("publisher identifier scheme changed".into());
  }
  let uri = |v: &Option<String>| v.as_deref().map(|s| s.trim().trim_end_matches('/').to_owned());
  if uri(&cur.scheme_uri) != uri(&des.scheme_uri) {
    set.push("publisher scheme URI changed".into());
  }
  if folded(&cur.lang) != folded(&des.lang) {
    set.push("publisher language changed".into());
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
