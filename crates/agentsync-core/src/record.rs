//! Categories, per-category state, and the [`UpdateRecord`] input unit.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  agent::{Agent, Publisher, Role},
  error::{Error, Result},
  identifier::Identifier,
};

// ─── Category ────────────────────────────────────────────────────────────────

/// The unit of wholesale rewrite. Each category carries its own role filter
/// predicate; see [`Category::admits`].
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
  Creators,
  Contributors,
  Publisher,
}

impl Category {
  /// Whether a role row belongs to this category.
  pub fn admits(self, role: Role) -> bool {
    match self {
      Self::Creators => role.is_authorship(),
      Self::Contributors => !role.is_authorship(),
      Self::Publisher => false,
    }
  }

  /// The roles an agent keeps once written under this category: creators
  /// always carry authorship, contributors keep admitted roles deduplicated
  /// in first-seen order and fall back to `Other`.
  pub fn project_roles(self, roles: &[Role]) -> Vec<Role> {
    match self {
      Self::Creators => vec![Role::Creator],
      Self::Publisher => Vec::new(),
      Self::Contributors => {
        let mut seen = BTreeSet::new();
        let kept: Vec<Role> = roles
          .iter()
          .copied()
          .filter(|r| self.admits(*r) && seen.insert(*r))
          .collect();
        if kept.is_empty() { vec![Role::Other] } else { kept }
      }
    }
  }

  /// [`Category::project_roles`] minus the labels the registry cannot hold.
  pub fn registry_roles(self, roles: &[Role]) -> Vec<Role> {
    let mut kept = self.project_roles(roles);
    kept.retain(|r| r.is_registry_visible());
    if kept.is_empty() && self == Self::Contributors {
      kept.push(Role::Other);
    }
    kept
  }

  pub fn is_agent_shaped(self) -> bool { self != Self::Publisher }

  /// Singular noun used in change descriptions.
  pub fn noun(self) -> &'static str {
    match self {
      Self::Creators => "creator",
      Self::Contributors => "contributor",
      Self::Publisher => "publisher",
    }
  }
}

// ─── Category state ──────────────────────────────────────────────────────────

/// The full content of one category for one resource, as held by either
/// system or as desired by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", content = "value", rename_all = "lowercase")]
pub enum CategoryState {
  Creators(Vec<Agent>),
  Contributors(Vec<Agent>),
  Publisher(Publisher),
}

impl CategoryState {
  pub fn empty(category: Category) -> Self {
    match category {
      Category::Creators => Self::Creators(Vec::new()),
      Category::Contributors => Self::Contributors(Vec::new()),
      Category::Publisher => Self::Publisher(Publisher::default()),
    }
  }

  /// Wrap an agent list in the variant for `category`. A publisher category
  /// takes the first agent's name.
  pub fn from_agents(category: Category, agents: Vec<Agent>) -> Self {
    match category {
      Category::Creators => Self::Creators(agents),
      Category::Contributors => Self::Contributors(agents),
      Category::Publisher => Self::Publisher(
        agents
          .first()
          .map(|a| Publisher::named(&a.name))
          .unwrap_or_default(),
      ),
    }
  }

  pub fn category(&self) -> Category {
    match self {
      Self::Creators(_) => Category::Creators,
      Self::Contributors(_) => Category::Contributors,
      Self::Publisher(_) => Category::Publisher,
    }
  }

  pub fn agents(&self) -> &[Agent] {
    match self {
      Self::Creators(a) | Self::Contributors(a) => a,
      Self::Publisher(_) => &[],
    }
  }

  pub fn agents_mut(&mut self) -> Option<&mut Vec<Agent>> {
    match self {
      Self::Creators(a) | Self::Contributors(a) => Some(a),
      Self::Publisher(_) => None,
    }
  }

  /// Assign contiguous 1-based orders following list position and apply
  /// [`Agent::sanitized`] to every agent.
  pub fn normalized(&self) -> Self {
    let mut out = self.clone();
    if let Some(agents) = out.agents_mut() {
      for (i, agent) in agents.iter_mut().enumerate() {
        *agent = agent.sanitized();
        agent.order = i as u32 + 1;
      }
    }
    if let Self::Publisher(p) = &mut out {
      p.name = p.name.trim().to_owned();
    }
    out
  }

  /// Replace every agent's roles with what this category persists.
  pub fn with_projected_roles(&self) -> Self {
    let category = self.category();
    let mut out = self.clone();
    if let Some(agents) = out.agents_mut() {
      for agent in agents {
        agent.roles = category.project_roles(&agent.roles);
      }
    }
    out
  }

  /// The state as the registry holds it: registry-visible roles only and no
  /// contact info.
  pub fn registry_view(&self) -> Self {
    let category = self.category();
    let mut out = self.without_contact();
    if let Some(agents) = out.agents_mut() {
      for agent in agents {
        agent.roles = category.registry_roles(&agent.roles);
      }
    }
    out
  }

  /// Drop every agent's contact info.
  pub fn without_contact(&self) -> Self {
    let mut out = self.clone();
    if let Some(agents) = out.agents_mut() {
      for agent in agents {
        agent.contact = None;
      }
    }
    out
  }

  /// Reject contributor lists where two agents share an identity key.
  /// Creators are positional, so repeated identities there are left alone.
  pub fn check_identities(&self) -> Result<()> {
    let Self::Contributors(agents) = self else {
      return Ok(());
    };
    let mut seen = HashSet::new();
    for agent in agents {
      if !seen.insert(agent.identity_key()) {
        return Err(Error::DuplicateIdentity(agent.name.clone()));
      }
    }
    Ok(())
  }
}

// ─── Update record ───────────────────────────────────────────────────────────

/// One identifier plus the desired content of one category. Immutable once
/// handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
  pub identifier: Identifier,
  pub desired:    CategoryState,
}

impl UpdateRecord {
  pub fn new(identifier: impl Into<Identifier>, desired: CategoryState) -> Self {
    Self {
      identifier: identifier.into(),
      desired,
    }
  }

  pub fn category(&self) -> Category { self.desired.category() }
}
