//! Layered settings: optional TOML file, then `AGENTSYNC__*` environment
//! variables, then command-line flags (applied by the caller).

use std::{fmt, path::PathBuf, time::Duration};

use agentsync_engine::{EngineConfig, StoreRequirement};
use agentsync_registry::{PRODUCTION_URL, RegistryConfig, TEST_URL};
use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub registry: RegistrySettings,
  pub store:    StoreSettings,
  pub engine:   EngineConfig,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
  /// Overrides the endpoint chosen by `test_mode`.
  pub base_url:           Option<String>,
  pub test_mode:          bool,
  pub principal:          String,
  pub secret:             String,
  pub timeout_secs:       u64,
  pub probe_timeout_secs: u64,
}

impl Default for RegistrySettings {
  fn default() -> Self {
    Self {
      base_url:           None,
      test_mode:          false,
      principal:          String::new(),
      secret:             String::new(),
      timeout_secs:       30,
      probe_timeout_secs: 5,
    }
  }
}

impl fmt::Debug for RegistrySettings {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegistrySettings")
      .field("base_url", &self.base_url)
      .field("test_mode", &self.test_mode)
      .field("principal", &self.principal)
      .field("secret", &"<redacted>")
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
  pub path:            Option<PathBuf>,
  pub requirement:     StoreRequirement,
  pub busy_timeout_ms: u64,
}

impl Default for StoreSettings {
  fn default() -> Self {
    Self {
      path:            None,
      requirement:     StoreRequirement::Mandatory,
      busy_timeout_ms: 5000,
    }
  }
}

impl Settings {
  /// Read `file` (required only when given explicitly) and the environment.
  pub fn load(file: Option<PathBuf>) -> anyhow::Result<Self> {
    let (path, required) = match file {
      Some(p) => (p, true),
      None => (PathBuf::from("agentsync.toml"), false),
    };
    let built = config::Config::builder()
      .add_source(config::File::from(path.clone()).required(required))
      .add_source(
        config::Environment::with_prefix("AGENTSYNC")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .with_context(|| format!("failed to read settings from {}", path.display()))?;

    let mut settings: Settings = built
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.engine.store_requirement = settings.store.requirement;
    Ok(settings)
  }

  pub fn registry_config(&self) -> RegistryConfig {
    let r = &self.registry;
    let default_url = if r.test_mode { TEST_URL } else { PRODUCTION_URL };
    let base_url = r.base_url.clone().unwrap_or_else(|| default_url.to_owned());
    RegistryConfig {
      base_url,
      principal: r.principal.clone(),
      secret: r.secret.clone(),
      timeout: Duration::from_secs(r.timeout_secs),
      probe_timeout: Duration::from_secs(r.probe_timeout_secs),
    }
  }

  pub fn busy_timeout(&self) -> Duration { Duration::from_millis(self.store.busy_timeout_ms) }
}
