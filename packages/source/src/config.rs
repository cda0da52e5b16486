//! TOML dataset configuration.
//!
//! ```toml
//! progress_interval = 500
//!
//! [events]
//! type = "url"
//! url = "https://example.org/api/events"
//!
//! [names]
//! type = "file"
//! path = "data/names.json"
//! ```
//!
//! `settlements`, `districts`, and `regions` follow the same shape.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::SourceError;
use crate::location::JsonLocation;

/// Environment variable consulted for the config path when none is given.
pub const CONFIG_ENV_VAR: &str = "INCIDENT_MAP_CONFIG";

/// Config path used when neither a flag nor the environment provides one.
pub const DEFAULT_CONFIG_PATH: &str = "incident_map.toml";

/// Locations of every document the engine needs, plus loader tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Event dataset (group key -> array of raw events).
    pub events: JsonLocation,
    /// Name dictionary (single-element array).
    pub names: JsonLocation,
    /// Settlement table.
    pub settlements: JsonLocation,
    /// District (ADM2) table.
    pub districts: JsonLocation,
    /// Region (ADM1) table.
    pub regions: JsonLocation,
    /// Emit a geocoding progress update every this many events.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

const fn default_progress_interval() -> usize {
    500
}

impl DatasetConfig {
    /// Parses a config document. Relative file paths are left as-is.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the document is malformed.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, SourceError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Reads a config file and resolves relative file paths against the
    /// file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, SourceError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let config = Self::from_toml_str(&contents)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        log::info!("Loaded dataset config from {}", path.display());

        Ok(config.resolved_against(base))
    }

    /// Rebases every relative file location onto `base`.
    #[must_use]
    pub fn resolved_against(self, base: &Path) -> Self {
        Self {
            events: self.events.resolved_against(base),
            names: self.names.resolved_against(base),
            settlements: self.settlements.resolved_against(base),
            districts: self.districts.resolved_against(base),
            regions: self.regions.resolved_against(base),
            progress_interval: self.progress_interval,
        }
    }
}

/// Picks the config path: explicit value, then [`CONFIG_ENV_VAR`], then
/// [`DEFAULT_CONFIG_PATH`].
#[must_use]
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
