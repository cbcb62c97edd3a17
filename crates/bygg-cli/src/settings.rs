//! Layered configuration: an optional TOML file, then `BYGG_*` environment
//! variables.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use bygg_fusion::{
  FusionConfig,
  config::{HeuristicConfig, MatcherConfig, ReferencePoint, SourceProfile},
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub store_path: PathBuf,
  pub reference:  ReferencePoint,
  pub matcher:    MatcherConfig,
  pub heuristic:  HeuristicConfig,
  pub sources:    BTreeMap<String, SourceProfile>,
}

impl Default for Settings {
  fn default() -> Self {
    let fusion = FusionConfig::default();
    Self {
      store_path: PathBuf::from("bygg.db"),
      reference:  fusion.reference,
      matcher:    fusion.matcher,
      heuristic:  fusion.heuristic,
      sources:    fusion.sources,
    }
  }
}

impl Settings {
  /// Read `path` if it exists, then apply the environment. Nested keys use
  /// `__`, e.g. `BYGG_MATCHER__MAX_DISTANCE_M=25`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::from_builder(
      config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
          config::Environment::with_prefix("BYGG")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
        ),
    )
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> anyhow::Result<Self> {
    builder
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise Settings")
  }

  pub fn fusion(&self) -> FusionConfig {
    FusionConfig {
      reference: self.reference,
      matcher:   self.matcher,
      heuristic: self.heuristic.clone(),
      sources:   self.sources.clone(),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
