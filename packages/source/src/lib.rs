#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data loading for the incident map.
//!
//! The aggregation engine consumes an event dataset and a name dictionary
//! through the [`EventSource`] and [`NameSource`] traits. [`DatasetSource`]
//! implements both on top of a [`config::DatasetConfig`], fetching each
//! JSON document from a URL or a local file, and also loads the static
//! settlement/district/region reference tables.
//!
//! Failures are returned to the caller as-is; nothing is retried here.

pub mod config;
pub mod location;
pub mod progress;

use async_trait::async_trait;
use incident_map_geography_models::{AdminAreaRecord, ReferenceData, SettlementRecord};
use incident_map_incident_models::{EventDataset, NameDictionary};

use crate::config::DatasetConfig;

/// Errors that can occur while loading data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// A document parsed but did not have the expected shape.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },
}

/// Provides the raw event dataset.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Loads every event group.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the dataset cannot be fetched or parsed.
    async fn load_events(&self) -> Result<EventDataset, SourceError>;
}

/// Provides the code -> display name dictionary.
#[async_trait]
pub trait NameSource: Send + Sync {
    /// Loads the name dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the dictionary cannot be fetched or
    /// parsed.
    async fn load_names(&self) -> Result<NameDictionary, SourceError>;
}

/// Parses the names document, a single-element array of dictionaries.
///
/// # Errors
///
/// Returns [`SourceError::Normalization`] if the array is empty.
pub fn first_dictionary(documents: Vec<NameDictionary>) -> Result<NameDictionary, SourceError> {
    if documents.len() > 1 {
        log::warn!(
            "Name dictionary has {} entries, using the first",
            documents.len()
        );
    }

    documents
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::Normalization {
            message: "name dictionary array is empty".to_string(),
        })
}

/// Loads every document described by a [`DatasetConfig`].
pub struct DatasetSource {
    client: reqwest::Client,
    config: DatasetConfig,
}

impl DatasetSource {
    /// Creates a source with a fresh HTTP client.
    #[must_use]
    pub fn new(config: DatasetConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// The configuration this source reads from.
    #[must_use]
    pub const fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Loads the settlement, district, and region tables.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if any table cannot be fetched or parsed.
    pub async fn load_reference(&self) -> Result<ReferenceData, SourceError> {
        let settlements: Vec<SettlementRecord> =
            self.config.settlements.fetch_json(&self.client).await?;
        let districts: Vec<AdminAreaRecord> =
            self.config.districts.fetch_json(&self.client).await?;
        let regions: Vec<AdminAreaRecord> = self.config.regions.fetch_json(&self.client).await?;

        log::info!(
            "Loaded reference tables: {} settlements, {} districts, {} regions",
            settlements.len(),
            districts.len(),
            regions.len()
        );

        Ok(ReferenceData::from_records(settlements, &districts, &regions))
    }
}

#[async_trait]
impl EventSource for DatasetSource {
    async fn load_events(&self) -> Result<EventDataset, SourceError> {
        let dataset: EventDataset = self.config.events.fetch_json(&self.client).await?;
        log::info!(
            "Loaded {} events in {} groups from {}",
            dataset.values().map(Vec::len).sum::<usize>(),
            dataset.len(),
            self.config.events
        );
        Ok(dataset)
    }
}

#[async_trait]
impl NameSource for DatasetSource {
    async fn load_names(&self) -> Result<NameDictionary, SourceError> {
        let documents: Vec<NameDictionary> = self.config.names.fetch_json(&self.client).await?;
        first_dictionary(documents)
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use incident_map_incident_models::IncidentType;

    use super::*;
    use crate::location::JsonLocation;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "incident_map_source_{name}_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, file: &str, contents: &str) -> JsonLocation {
        let path = dir.join(file);
        std::fs::write(&path, contents).unwrap();
        JsonLocation::File { path }
    }

    fn config(dir: &Path, names: &str) -> DatasetConfig {
        DatasetConfig {
            events: write(
                dir,
                "events.json",
                r#"{"Luganska": [{"lat": 48.57, "lon": 39.30, "affected_type": 32, "event": 55}],
                    "CHernigivska": [{"lat": 51.49, "lon": 31.26, "event": 48}]}"#,
            ),
            names: write(dir, "names.json", names),
            settlements: write(
                dir,
                "settlements.json",
                r#"[{"name": "Luhansk", "lat": 48.57, "lon": 39.31, "ADM2Code": "D1", "ADM1Code": "R1"}]"#,
            ),
            districts: write(dir, "adm2.json", r#"[{"name": "District1", "ADM2Code": "D1"}]"#),
            regions: write(dir, "adm1.json", r#"[{"name": "Region1", "ADM1Code": "R1"}]"#),
            progress_interval: 10,
        }
    }

    #[tokio::test]
    async fn loads_everything_from_files() {
        let dir = scratch_dir("files");
        let source = DatasetSource::new(config(
            &dir,
            r#"[{"affected_type": {"32": "Civilians"}, "event": {"55": "Shelling"}}]"#,
        ));

        let events = source.load_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events["Luganska"][0].incident_type(), IncidentType::new(32));

        let names = source.load_names().await.unwrap();
        assert_eq!(names.event_name(55), "Shelling");

        let reference = source.load_reference().await.unwrap();
        assert_eq!(reference.settlements.len(), 1);
        assert_eq!(
            reference.lookup.region(Some("R1")).unwrap().name,
            "Region1"
        );
    }

    #[tokio::test]
    async fn empty_name_array_is_an_error() {
        let dir = scratch_dir("empty_names");
        let source = DatasetSource::new(config(&dir, "[]"));

        let err = source.load_names().await.unwrap_err();
        assert!(matches!(err, SourceError::Normalization { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let source = DatasetSource::new(DatasetConfig {
            events: JsonLocation::File {
                path: PathBuf::from("/nonexistent/incident_map/events.json"),
            },
            ..config(&scratch_dir("missing"), "[]")
        });

        let err = source.load_events().await.unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }

    #[tokio::test]
    async fn malformed_json_is_a_json_error() {
        let dir = scratch_dir("malformed");
        let source = DatasetSource::new(DatasetConfig {
            events: write(&dir, "broken.json", "{\"Luganska\": ["),
            ..config(&dir, "[]")
        });

        let err = source.load_events().await.unwrap_err();
        assert!(matches!(err, SourceError::Json(_)));
    }
}
