//! Offloaded reverse-geocoding and hierarchy build.
//!
//! The job owns its inputs outright and runs on tokio's blocking pool.
//! It talks to the engine only through [`WorkerMessage`]s: any number of
//! progress updates followed by exactly one terminal message, either the
//! built [`Hierarchy`] or a failure description.

use std::panic::{AssertUnwindSafe, catch_unwind};

use incident_map_geography_models::{ReferenceData, Settlement};
use incident_map_hierarchy::Hierarchy;
use incident_map_incident_models::{GeocodedEvent, NameDictionary, RawEvent};
use incident_map_source::progress::LoadingProgress;
use incident_map_spatial::SpatialIndex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::EngineError;

/// Messages sent from the worker to the engine.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Phase change or geocoding count.
    Progress(LoadingProgress),
    /// The finished result. Always the last message on success.
    Finished(Box<Hierarchy>),
    /// The job failed. Always the last message on failure.
    Failed {
        /// Description of what went wrong.
        message: String,
    },
}

/// Everything the worker needs, moved into it at spawn time.
pub struct GeocodeJob {
    /// Flattened raw events.
    pub events: Vec<RawEvent>,
    /// Code -> name tables.
    pub names: NameDictionary,
    /// Settlements and administrative lookup tables.
    pub reference: ReferenceData,
    /// Emit a count update every this many events (and on the last one).
    pub progress_interval: usize,
}

/// Starts `job` on the blocking pool and returns its message stream.
///
/// Must be called from within a tokio runtime.
pub fn spawn(job: GeocodeJob) -> (JoinHandle<()>, mpsc::UnboundedReceiver<WorkerMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::task::spawn_blocking(move || run(job, &tx));
    (handle, rx)
}

/// Runs `job` to completion on the current thread, reporting through `tx`.
///
/// A panic inside the job is caught and reported as
/// [`WorkerMessage::Failed`].
pub fn run(job: GeocodeJob, tx: &mpsc::UnboundedSender<WorkerMessage>) {
    finish(tx, || geocode_and_group(job, tx));
}

/// Runs `task` and sends its outcome as the terminal message.
fn finish(tx: &mpsc::UnboundedSender<WorkerMessage>, task: impl FnOnce() -> Hierarchy) {
    let outcome = catch_unwind(AssertUnwindSafe(task));

    let message = match outcome {
        Ok(hierarchy) => WorkerMessage::Finished(Box::new(hierarchy)),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "geocoding worker panicked".to_string());
            log::error!("Geocoding worker failed: {message}");
            WorkerMessage::Failed { message }
        }
    };

    // The engine may have stopped listening; nothing else to do then.
    let _ = tx.send(message);
}

/// Consumes worker messages until the terminal one, forwarding progress
/// updates to `on_progress`.
///
/// # Errors
///
/// Returns [`EngineError::Worker`] when the worker reports a failure and
/// [`EngineError::WorkerAborted`] when the channel closes first.
pub async fn collect(
    rx: &mut mpsc::UnboundedReceiver<WorkerMessage>,
    on_progress: impl Fn(LoadingProgress),
) -> Result<Hierarchy, EngineError> {
    while let Some(message) = rx.recv().await {
        match message {
            WorkerMessage::Progress(update) => on_progress(update),
            WorkerMessage::Finished(hierarchy) => return Ok(*hierarchy),
            WorkerMessage::Failed { message } => return Err(EngineError::Worker { message }),
        }
    }

    Err(EngineError::WorkerAborted)
}

fn geocode_and_group(job: GeocodeJob, tx: &mpsc::UnboundedSender<WorkerMessage>) -> Hierarchy {
    let progress = |update: LoadingProgress| {
        let _ = tx.send(WorkerMessage::Progress(update));
    };

    let GeocodeJob {
        events,
        names,
        reference,
        progress_interval,
    } = job;
    let ReferenceData {
        settlements,
        lookup,
    } = reference;

    progress(LoadingProgress::phase("Building settlements index..."));
    let index = SpatialIndex::build(settlements);

    let received = events.len();
    let located: Vec<(f64, f64, RawEvent)> = events
        .into_iter()
        .filter_map(|event| event.coordinates().map(|(lon, lat)| (lon, lat, event)))
        .collect();
    if located.len() < received {
        log::warn!(
            "Dropped {} of {received} events without coordinates",
            received - located.len()
        );
    }

    progress(LoadingProgress::phase("Geocoding events..."));
    let total = located.len() as u64;
    let interval = progress_interval.max(1);
    let mut geocoded = Vec::with_capacity(located.len());

    for (i, (lon, lat, event)) in located.iter().enumerate() {
        if let Some(settlement) = index.nearest(*lon, *lat) {
            geocoded.push(resolve(event, *lon, *lat, settlement, &names));
        }

        let processed = i + 1;
        if processed % interval == 0 || processed == located.len() {
            progress(LoadingProgress::Count {
                processed: processed as u64,
                total,
            });
        }
    }

    if geocoded.len() < located.len() {
        log::warn!(
            "Dropped {} events with no resolvable settlement",
            located.len() - geocoded.len()
        );
    }

    progress(LoadingProgress::phase("Grouping events..."));
    incident_map_hierarchy::build(geocoded, &lookup)
}

/// Combines a raw event with its nearest settlement and display names.
#[must_use]
pub fn resolve(
    event: &RawEvent,
    lon: f64,
    lat: f64,
    settlement: &Settlement,
    names: &NameDictionary,
) -> GeocodedEvent {
    let incident_type = event.incident_type();

    GeocodedEvent {
        lat,
        lon,
        incident_type,
        incident_type_name: names.affected_type_name(incident_type).map(str::to_string),
        event_code: event.event,
        event_name: names.event_name(event.event).to_string(),
        settlement_id: settlement.id,
        settlement_name: settlement.name.clone(),
        settlement_lat: settlement.lat,
        settlement_lon: settlement.lon,
        district_code: settlement.district_code.clone(),
        region_code: settlement.region_code.clone(),
        region_name: None,
    }
}
