//! Loading progress values and the progress reporting trait.
//!
//! The engine publishes [`LoadingProgress`] values while it geocodes and
//! groups the dataset. [`ProgressCallback`] decouples rendering from the
//! pipeline: a CLI maps the values onto an `indicatif` bar.

use serde::{Deserialize, Serialize};

/// One update on the loading-progress stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LoadingProgress {
    /// A new loading phase started.
    Phase {
        /// Human-readable phase description.
        message: String,
    },
    /// Geocoding advanced.
    Count {
        /// Events geocoded so far.
        processed: u64,
        /// Total events to geocode.
        total: u64,
    },
    /// Loading completed.
    Done,
}

impl LoadingProgress {
    /// Convenience constructor for [`Self::Phase`].
    #[must_use]
    pub fn phase(message: impl Into<String>) -> Self {
        Self::Phase {
            message: message.into(),
        }
    }

    /// Forwards this update to a progress renderer.
    pub fn report_to(&self, progress: &dyn ProgressCallback) {
        match self {
            Self::Phase { message } => progress.set_message(message.clone()),
            Self::Count { processed, total } => {
                progress.set_total(*total);
                progress.set_position(*processed);
            }
            Self::Done => progress.finish("Loaded".to_string()),
        }
    }
}

/// Trait for rendering progress of long-running loads.
///
/// Implementations must be `Send + Sync` so they can be captured by stream
/// observers.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Set the current position (absolute, not delta).
    fn set_position(&self, pos: u64);

    /// Update the message displayed alongside the indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);

    /// Mark progress as complete and remove the indicator.
    fn finish_and_clear(&self);
}
