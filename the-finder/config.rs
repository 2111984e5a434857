use std::{
  collections::BTreeMap,
  path::{
    Path,
    PathBuf,
  },
  time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
  animation::{
    COLUMN_WIDTH,
    Easing,
    SLIDE_DURATION,
  },
  input::{
    CHORD_TIMEOUT,
    FinderAction,
    Keymap,
    ParseKeyBindingError,
  },
  preview::PREVIEW_DEBOUNCE,
  tab::DEFAULT_RETAINED_COLUMNS,
  tabs::TabSettings,
};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io {
    path:   PathBuf,
    source: std::io::Error,
  },
  #[error("invalid config: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("invalid key binding '{sequence}': {source}")]
  Binding {
    sequence: String,
    source:   ParseKeyBindingError,
  },
  #[error("{0}")]
  Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct FinderConfig {
  /// Width of one column in logical pixels.
  pub column_width:         f32,
  pub slide_duration_ms:    u64,
  pub easing:               Easing,
  /// Snap every depth change instead of sliding.
  pub reduced_motion:       bool,
  pub chord_timeout_ms:     u64,
  pub preview_debounce_ms:  u64,
  /// Prefix of every persisted slot key.
  pub storage_prefix:       String,
  pub max_retained_columns: usize,
  pub root_title:           String,
  /// Extra bindings layered over the defaults, e.g. `"g h" = "shallower"`.
  pub keys:                 BTreeMap<String, FinderAction>,
}

impl Default for FinderConfig {
  fn default() -> Self {
    Self {
      column_width:         COLUMN_WIDTH,
      slide_duration_ms:    SLIDE_DURATION.as_millis() as u64,
      easing:               Easing::default(),
      reduced_motion:       false,
      chord_timeout_ms:     CHORD_TIMEOUT.as_millis() as u64,
      preview_debounce_ms:  PREVIEW_DEBOUNCE.as_millis() as u64,
      storage_prefix:       "finder".to_string(),
      max_retained_columns: DEFAULT_RETAINED_COLUMNS,
      root_title:           "Home".to_string(),
      keys:                 BTreeMap::new(),
    }
  }
}

impl FinderConfig {
  pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
  }

  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let source = std::fs::read_to_string(path).map_err(|source| {
      ConfigError::Io {
        path: path.to_path_buf(),
        source,
      }
    })?;
    Self::from_toml(&source)
  }

  /// Loads `path` if it exists, falling back to the defaults otherwise.
  pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
    if !path.exists() {
      tracing::debug!(path = %path.display(), "no config file, using defaults");
      return Ok(Self::default());
    }
    Self::load(path)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.column_width.is_finite() || self.column_width <= 0.0 {
      return Err(ConfigError::Invalid(format!(
        "column-width must be positive, got {}",
        self.column_width
      )));
    }
    if self.storage_prefix.is_empty() {
      return Err(ConfigError::Invalid("storage-prefix must not be empty".into()));
    }
    Ok(())
  }

  pub fn slide_duration(&self) -> Duration {
    Duration::from_millis(self.slide_duration_ms)
  }

  pub fn chord_timeout(&self) -> Duration {
    Duration::from_millis(self.chord_timeout_ms)
  }

  pub fn preview_debounce(&self) -> Duration {
    Duration::from_millis(self.preview_debounce_ms)
  }

  pub fn tab_settings(&self) -> TabSettings {
    TabSettings {
      column_width:     self.column_width,
      slide_duration:   self.slide_duration(),
      easing:           self.easing,
      reduced_motion:   self.reduced_motion,
      retained_columns: self.max_retained_columns,
      preview_debounce: self.preview_debounce(),
    }
  }

  /// Default keymap with the configured bindings applied on top.
  pub fn keymap(&self) -> Result<Keymap, ConfigError> {
    let mut keymap = Keymap::default();
    for (sequence, action) in &self.keys {
      keymap.bind(sequence, *action).map_err(|source| {
        ConfigError::Binding {
          sequence: sequence.clone(),
          source,
        }
      })?;
    }
    Ok(keymap)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_document_yields_defaults() {
    let config = FinderConfig::from_toml("").unwrap();
    assert_eq!(config, FinderConfig::default());
    assert_eq!(config.slide_duration(), SLIDE_DURATION);
    assert_eq!(config.tab_settings().retained_columns, DEFAULT_RETAINED_COLUMNS);
  }

  #[test]
  fn parses_kebab_case_fields() {
    let config = FinderConfig::from_toml(
      r#"
        column-width = 320
        easing = "ease-in-out-cubic"
        reduced-motion = true
        storage-prefix = "kb"

        [keys]
        "g h" = "shallower"
        "C-n" = { switch-tab = 1 }
      "#,
    )
    .unwrap();
    assert_eq!(config.column_width, 320.0);
    assert_eq!(config.easing, Easing::EaseInOutCubic);
    assert!(config.tab_settings().reduced_motion);
    assert_eq!(config.keys.get("C-n"), Some(&FinderAction::SwitchTab(1)));
    assert!(config.keymap().is_ok());
  }

  #[test]
  fn rejects_unknown_fields_and_bad_values() {
    assert!(matches!(
      FinderConfig::from_toml("colum-width = 3"),
      Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
      FinderConfig::from_toml("column-width = 0"),
      Err(ConfigError::Invalid(_))
    ));
  }

  #[test]
  fn bad_binding_is_reported() {
    let config = FinderConfig::from_toml("[keys]\n\"hyper-x\" = \"activate\"").unwrap();
    assert!(matches!(config.keymap(), Err(ConfigError::Binding { .. })));
  }

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let config = FinderConfig::load_or_default(Path::new("/nonexistent/finder.toml")).unwrap();
    assert_eq!(config.root_title, "Home");
  }
}
