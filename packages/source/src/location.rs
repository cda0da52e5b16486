//! Where a JSON document lives: a remote URL or a local file.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::SourceError;

/// Location of a JSON document, tagged by `type` in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonLocation {
    /// Fetched with an HTTP GET.
    Url {
        /// Absolute URL of the document.
        url: String,
    },
    /// Read from disk.
    File {
        /// Path to the document. Relative paths are resolved against the
        /// config file's directory when the config is loaded.
        path: PathBuf,
    },
}

impl JsonLocation {
    /// Rebases a relative file path onto `base`. URLs and absolute paths
    /// are returned unchanged.
    #[must_use]
    pub fn resolved_against(self, base: &Path) -> Self {
        match self {
            Self::File { path } if path.is_relative() => Self::File {
                path: base.join(path),
            },
            other => other,
        }
    }

    /// Fetches and deserializes the document.
    ///
    /// Non-2xx HTTP responses are errors.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request or read fails, or if the body
    /// is not valid JSON for `T`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        client: &reqwest::Client,
    ) -> Result<T, SourceError> {
        let body = match self {
            Self::Url { url } => {
                log::debug!("Fetching {url}");
                client
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?
                    .to_vec()
            }
            Self::File { path } => {
                log::debug!("Reading {}", path.display());
                tokio::fs::read(path).await?
            }
        };

        Ok(serde_json::from_slice(&body)?)
    }
}

impl std::fmt::Display for JsonLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url { url } => write!(f, "{url}"),
            Self::File { path } => write!(f, "{}", path.display()),
        }
    }
}
