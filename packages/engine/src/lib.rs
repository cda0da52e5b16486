#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reactive aggregation engine for geolocated incidents.
//!
//! [`AggregationEngine`] owns the loaded dataset, the current
//! [`ScaleLevel`], and the current [`Filter`]. Loading geocodes every event
//! to its nearest settlement and builds the region -> district -> city tree
//! on a blocking worker ([`worker`]). Every state change then synchronously
//! recomputes two outputs and pushes them to subscribers:
//!
//! - **shown groups**: one record per incident type per visible node at the
//!   effective scale level
//! - **individual events**: the flat event list with every filter applied
//!
//! The engine expects a single owner driving it; mutations take
//! `&mut self` and run to completion.

pub mod observable;
pub mod worker;

use incident_map_analytics_models::{AffectedTypeEntry, Filter, ScaleLevel, ShownGroup, StatsMap};
use incident_map_geography_models::ReferenceData;
use incident_map_hierarchy::{CityNode, DistrictNode, Hierarchy, RegionNode};
use incident_map_incident_models::{GeocodedEvent, NameDictionary, flatten_dataset};
use incident_map_source::progress::LoadingProgress;
use incident_map_source::{EventSource, NameSource, SourceError};

use crate::observable::Observable;
use crate::worker::GeocodeJob;

/// Geocoding progress is reported every this many events by default.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 500;

/// Errors that abort [`AggregationEngine::init`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The dataset or name dictionary could not be loaded.
    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    /// The geocoding worker reported a failure.
    #[error("Geocoding worker failed: {message}")]
    Worker {
        /// Description reported by the worker.
        message: String,
    },

    /// The geocoding worker task could not be joined.
    #[error("Geocoding worker panicked: {0}")]
    WorkerPanicked(#[from] tokio::task::JoinError),

    /// The worker stopped without sending a result.
    #[error("Geocoding worker exited without a result")]
    WorkerAborted,
}

/// Output streams published by the engine.
#[derive(Default)]
pub struct EngineStreams {
    /// Per-type markers at the effective scale level.
    pub shown_groups: Observable<Vec<ShownGroup>>,
    /// Incident types present in the data.
    pub affected_types: Observable<Vec<AffectedTypeEntry>>,
    /// The full region tree, for selection controls.
    pub regions: Observable<Vec<RegionNode>>,
    /// Events passing the current filter.
    pub individual_events: Observable<Vec<GeocodedEvent>>,
    /// Loading phases, geocoding counts, and completion.
    pub loading_progress: Observable<LoadingProgress>,
}

/// Owns the hierarchy and recomputes the visible outputs on every change.
pub struct AggregationEngine {
    streams: EngineStreams,
    hierarchy: Hierarchy,
    names: NameDictionary,
    scale_level: ScaleLevel,
    filter: Filter,
    progress_interval: usize,
    loaded: bool,
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregationEngine {
    /// Creates an empty engine at [`ScaleLevel::Region`] with no filter.
    #[must_use]
    pub fn new() -> Self {
        Self::with_progress_interval(DEFAULT_PROGRESS_INTERVAL)
    }

    /// Creates an empty engine reporting geocoding progress every
    /// `progress_interval` events.
    #[must_use]
    pub fn with_progress_interval(progress_interval: usize) -> Self {
        Self {
            streams: EngineStreams::default(),
            hierarchy: Hierarchy::default(),
            names: NameDictionary::default(),
            scale_level: ScaleLevel::default(),
            filter: Filter::default(),
            progress_interval,
            loaded: false,
        }
    }

    /// The output streams, for subscribing.
    #[must_use]
    pub const fn streams(&self) -> &EngineStreams {
        &self.streams
    }

    /// Loads names and events, geocodes and groups them off-thread, then
    /// publishes the affected types, the region tree, and both outputs.
    ///
    /// Nothing but progress is published unless every step succeeds, and
    /// a failed load leaves any previously loaded data in place.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if loading fails or the worker does not
    /// deliver a result.
    pub async fn init(
        &mut self,
        events: &dyn EventSource,
        names: &dyn NameSource,
        reference: ReferenceData,
    ) -> Result<(), EngineError> {
        let progress = &self.streams.loading_progress;

        progress.next(LoadingProgress::phase("Loading names..."));
        let names = names.load_names().await?;

        progress.next(LoadingProgress::phase("Loading events..."));
        let raw_events = flatten_dataset(events.load_events().await?);
        log::info!("Geocoding {} raw events", raw_events.len());

        let (handle, mut rx) = worker::spawn(GeocodeJob {
            events: raw_events,
            names: names.clone(),
            reference,
            progress_interval: self.progress_interval,
        });

        let outcome = worker::collect(&mut rx, |update| progress.next(update)).await;
        handle.await?;

        self.install(outcome, names)
    }

    /// Adopts a collected worker result and publishes every output.
    /// Errors leave the engine and its streams untouched.
    fn install(
        &mut self,
        outcome: Result<Hierarchy, EngineError>,
        names: NameDictionary,
    ) -> Result<(), EngineError> {
        let hierarchy = outcome?;

        self.hierarchy = hierarchy;
        self.names = names;
        self.loaded = true;

        self.streams.affected_types.next(self.affected_types());
        self.streams.regions.next(self.hierarchy.regions.clone());
        self.recompute();
        self.streams.loading_progress.next(LoadingProgress::Done);

        Ok(())
    }

    /// Changes the scale level and recomputes both outputs.
    pub fn set_scale_level(&mut self, level: ScaleLevel) {
        self.scale_level = level;
        self.recompute();
    }

    /// Replaces the filter wholesale and recomputes both outputs.
    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.recompute();
    }

    /// The requested scale level.
    #[must_use]
    pub const fn scale_level(&self) -> ScaleLevel {
        self.scale_level
    }

    /// The current filter.
    #[must_use]
    pub const fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Whether [`Self::init`] has completed.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The loaded region tree.
    #[must_use]
    pub fn regions(&self) -> &[RegionNode] {
        &self.hierarchy.regions
    }

    /// Every geocoded event, unfiltered.
    #[must_use]
    pub fn events(&self) -> &[GeocodedEvent] {
        &self.hierarchy.events
    }

    /// The scale level actually shown after filter-aware downgrade.
    #[must_use]
    pub fn effective_scale(&self) -> ScaleLevel {
        effective_scale(self.scale_level, &self.filter)
    }

    /// Incident types present in the data, with display names.
    #[must_use]
    pub fn affected_types(&self) -> Vec<AffectedTypeEntry> {
        let mut entries: Vec<AffectedTypeEntry> = self
            .hierarchy
            .total_stats()
            .keys()
            .map(|key| AffectedTypeEntry {
                affected_type: key.to_string(),
                name: self.names.affected_type.get(key).cloned(),
            })
            .collect();
        entries.sort_by_key(|e| (e.affected_type.parse::<i64>().ok(), e.affected_type.clone()));
        entries
    }

    fn recompute(&self) {
        let scale = self.effective_scale();
        let groups = shown_groups(&self.hierarchy.regions, scale, &self.filter);
        let events = individual_events(&self.hierarchy.events, &self.filter);

        log::debug!(
            "Recomputed at {scale} scale: {} groups, {} events",
            groups.len(),
            events.len()
        );

        self.streams.shown_groups.next(groups);
        self.streams.individual_events.next(events);
    }
}

/// Downgrades the requested scale when the filter already pins the
/// coarser tier: a pinned region shows its districts, and a pinned
/// settlement at district scale shows cities.
#[must_use]
pub fn effective_scale(requested: ScaleLevel, filter: &Filter) -> ScaleLevel {
    match requested {
        ScaleLevel::Region if filter.region_code.is_some() => ScaleLevel::District,
        ScaleLevel::District if filter.settlement_id.is_some() => ScaleLevel::City,
        other => other,
    }
}

/// Collects the per-type markers for every node at `scale`.
///
/// Filter fields only apply to tiers that are walked: region-level
/// results ignore district and settlement restrictions.
#[must_use]
pub fn shown_groups(regions: &[RegionNode], scale: ScaleLevel, filter: &Filter) -> Vec<ShownGroup> {
    let mut groups = Vec::new();

    let regions = regions
        .iter()
        .filter(|r| filter.allows_region(r.region_code.as_deref()));

    for region in regions {
        if scale == ScaleLevel::Region {
            if let Some(position) = region_position(region) {
                explode(position, &region.stats, filter, &mut groups);
            }
            continue;
        }

        let districts = region
            .districts
            .iter()
            .filter(|d| filter.allows_district(d.district_code.as_deref()));

        for district in districts {
            if scale == ScaleLevel::District {
                if let Some(position) = district_position(district) {
                    explode(position, &district.stats, filter, &mut groups);
                }
                continue;
            }

            let cities = district
                .cities
                .iter()
                .filter(|c| filter.allows_settlement(c.settlement_id));

            for city in cities {
                explode(city_position(city), &city.stats, filter, &mut groups);
            }
        }
    }

    groups
}

/// Applies every filter field to the flat event list.
#[must_use]
pub fn individual_events(events: &[GeocodedEvent], filter: &Filter) -> Vec<GeocodedEvent> {
    events
        .iter()
        .filter(|e| {
            filter.allows_type(&e.incident_type.key())
                && filter.allows_region(e.region_code.as_deref())
                && filter.allows_district(e.district_code.as_deref())
                && filter.allows_settlement(e.settlement_id)
        })
        .cloned()
        .collect()
}

fn explode(
    (lat, lon): (f64, f64),
    stats: &StatsMap,
    filter: &Filter,
    groups: &mut Vec<ShownGroup>,
) {
    groups.extend(
        stats
            .iter()
            .filter(|(key, _)| filter.allows_type(key))
            .map(|(key, amount)| ShownGroup {
                lat,
                lon,
                incident_type: key.to_string(),
                amount,
            }),
    );
}

const fn city_position(city: &CityNode) -> (f64, f64) {
    (city.lat, city.lon)
}

/// Lookup centroid, else the first settlement's position.
fn district_position(district: &DistrictNode) -> Option<(f64, f64)> {
    district
        .lat
        .zip(district.lon)
        .or_else(|| district.cities.first().map(city_position))
}

/// Lookup centroid, else the first district's position.
fn region_position(region: &RegionNode) -> Option<(f64, f64)> {
    region
        .lat
        .zip(region.lon)
        .or_else(|| region.districts.first().and_then(district_position))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use incident_map_geography_models::{AdminAreaRecord, SettlementRecord};
    use incident_map_incident_models::{EventDataset, RawEvent};

    use super::*;
    use crate::observable::SubscribeOptions;
    use crate::worker::WorkerMessage;

    struct StaticSource {
        events: EventDataset,
        names: NameDictionary,
    }

    #[async_trait]
    impl EventSource for StaticSource {
        async fn load_events(&self) -> Result<EventDataset, SourceError> {
            Ok(self.events.clone())
        }
    }

    #[async_trait]
    impl NameSource for StaticSource {
        async fn load_names(&self) -> Result<NameDictionary, SourceError> {
            Ok(self.names.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl EventSource for FailingSource {
        async fn load_events(&self) -> Result<EventDataset, SourceError> {
            Err(SourceError::Normalization {
                message: "unreachable dataset".to_string(),
            })
        }
    }

    fn raw(lat: f64, lon: f64, kind: Option<i64>, event: i64) -> RawEvent {
        RawEvent {
            lat: Some(lat),
            lon: Some(lon),
            affected_type: kind,
            event,
        }
    }

    fn settlement(
        name: &str,
        lat: f64,
        lon: f64,
        district: &str,
        region: &str,
    ) -> SettlementRecord {
        SettlementRecord {
            name: name.to_string(),
            lat,
            lon,
            district_code: Some(district.to_string()),
            region_code: Some(region.to_string()),
        }
    }

    fn area(
        name: &str,
        coords: Option<(f64, f64)>,
        district: Option<&str>,
        region: Option<&str>,
    ) -> AdminAreaRecord {
        AdminAreaRecord {
            name: name.to_string(),
            lat: coords.map(|c| c.0),
            lon: coords.map(|c| c.1),
            district_code: district.map(str::to_string),
            region_code: region.map(str::to_string),
        }
    }

    fn names() -> NameDictionary {
        NameDictionary {
            affected_type: [
                ("30".to_string(), "Infrastructure".to_string()),
                ("32".to_string(), "Civilians".to_string()),
            ]
            .into(),
            event: [("55".to_string(), "Shelling".to_string())].into(),
        }
    }

    fn luhansk_only() -> (StaticSource, ReferenceData) {
        let mut events = EventDataset::new();
        events.insert("Luganska".to_string(), vec![raw(48.57, 39.30, Some(32), 55)]);

        let reference = ReferenceData::from_records(
            vec![settlement("Luhansk", 48.574, 39.308, "D1", "R1")],
            &[area("District1", None, Some("D1"), None)],
            &[area("Region1", None, None, Some("R1"))],
        );

        (StaticSource { events, names: names() }, reference)
    }

    /// Two regions; "UA-05" has two districts with their own centroids.
    fn multi_region() -> (StaticSource, ReferenceData) {
        let mut events = EventDataset::new();
        events.insert(
            "east".to_string(),
            vec![
                raw(49.23, 28.47, Some(32), 55),
                raw(49.23, 28.48, Some(30), 55),
                raw(48.72, 29.20, Some(32), 55),
                raw(48.72, 29.21, None, 55),
            ],
        );
        events.insert("north".to_string(), vec![raw(51.49, 31.28, Some(32), 55)]);

        let reference = ReferenceData::from_records(
            vec![
                settlement("Vinnytsia", 49.233, 28.468, "UA-05-01", "UA-05"),
                settlement("Haisyn", 48.720, 29.200, "UA-05-02", "UA-05"),
                settlement("Chernihiv", 51.494, 31.289, "UA-74-01", "UA-74"),
            ],
            &[
                area("Vinnytskyi", Some((49.1, 28.4)), Some("UA-05-01"), None),
                area("Haisynskyi", Some((48.8, 29.4)), Some("UA-05-02"), None),
                area("Chernihivskyi", Some((51.5, 31.3)), Some("UA-74-01"), None),
            ],
            &[
                area("Vinnytska", Some((49.0, 28.7)), None, Some("UA-05")),
                area("Chernihivska", Some((51.2, 31.9)), None, Some("UA-74")),
            ],
        );

        (StaticSource { events, names: names() }, reference)
    }

    async fn loaded(fixture: (StaticSource, ReferenceData)) -> AggregationEngine {
        let (source, reference) = fixture;
        let mut engine = AggregationEngine::with_progress_interval(1);
        engine.init(&source, &source, reference).await.unwrap();
        engine
    }

    fn latest_groups(engine: &AggregationEngine) -> Vec<ShownGroup> {
        engine.streams().shown_groups.latest().unwrap()
    }

    fn latest_events(engine: &AggregationEngine) -> Vec<GeocodedEvent> {
        engine.streams().individual_events.latest().unwrap()
    }

    #[tokio::test]
    async fn single_event_end_to_end() {
        let engine = loaded(luhansk_only()).await;

        assert_eq!(
            latest_groups(&engine),
            vec![ShownGroup {
                lat: 48.574,
                lon: 39.308,
                incident_type: "32".to_string(),
                amount: 1,
            }]
        );
        assert_eq!(
            engine.streams().affected_types.latest().unwrap(),
            vec![AffectedTypeEntry {
                affected_type: "32".to_string(),
                name: Some("Civilians".to_string()),
            }]
        );

        let events = latest_events(&engine);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].region_name.as_deref(), Some("Region1"));
        assert_eq!(events[0].settlement_name, "Luhansk");
        assert_eq!(events[0].event_name, "Shelling");

        let regions = engine.streams().regions.latest().unwrap();
        assert_eq!(regions[0].name.as_deref(), Some("Region1"));
        assert_eq!(regions[0].lat, None);
    }

    #[tokio::test]
    async fn region_filter_downgrades_to_district_groups() {
        let mut engine = loaded(multi_region()).await;
        engine.set_filter(Filter {
            region_code: Some("UA-05".to_string()),
            ..Filter::default()
        });

        assert_eq!(engine.scale_level(), ScaleLevel::Region);
        assert_eq!(engine.effective_scale(), ScaleLevel::District);

        let positions: Vec<(f64, f64)> = latest_groups(&engine)
            .iter()
            .map(|g| (g.lat, g.lon))
            .collect();
        assert_eq!(positions, vec![(49.1, 28.4), (49.1, 28.4), (48.8, 29.4)]);
    }

    #[tokio::test]
    async fn region_scale_without_filter_uses_region_centroids() {
        let engine = loaded(multi_region()).await;
        let groups = latest_groups(&engine);

        assert_eq!(
            groups,
            vec![
                ShownGroup {
                    lat: 49.0,
                    lon: 28.7,
                    incident_type: "30".to_string(),
                    amount: 1,
                },
                ShownGroup {
                    lat: 49.0,
                    lon: 28.7,
                    incident_type: "32".to_string(),
                    amount: 2,
                },
                ShownGroup {
                    lat: 51.2,
                    lon: 31.9,
                    incident_type: "32".to_string(),
                    amount: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn settlement_filter_at_district_scale_shows_cities() {
        let mut engine = loaded(multi_region()).await;
        engine.set_scale_level(ScaleLevel::District);
        engine.set_filter(Filter {
            settlement_id: Some(1),
            ..Filter::default()
        });

        assert_eq!(engine.effective_scale(), ScaleLevel::City);
        assert_eq!(
            latest_groups(&engine),
            vec![ShownGroup {
                lat: 48.720,
                lon: 29.200,
                incident_type: "32".to_string(),
                amount: 1,
            }]
        );

        let events = latest_events(&engine);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.settlement_name == "Haisyn"));
    }

    #[tokio::test]
    async fn absent_type_filter_empties_both_outputs() {
        let mut engine = loaded(luhansk_only()).await;
        engine.set_filter(Filter {
            incident_types: vec!["99".to_string()],
            ..Filter::default()
        });

        assert!(latest_groups(&engine).is_empty());
        assert!(latest_events(&engine).is_empty());
    }

    #[tokio::test]
    async fn unknown_region_matches_nothing() {
        let mut engine = loaded(multi_region()).await;
        engine.set_scale_level(ScaleLevel::City);
        engine.set_filter(Filter {
            region_code: Some("UA-99".to_string()),
            ..Filter::default()
        });

        assert!(latest_groups(&engine).is_empty());
        assert!(latest_events(&engine).is_empty());
    }

    #[tokio::test]
    async fn filter_is_replaced_not_merged() {
        let mut engine = loaded(multi_region()).await;
        engine.set_filter(Filter {
            region_code: Some("UA-74".to_string()),
            ..Filter::default()
        });
        assert_eq!(latest_events(&engine).len(), 1);

        engine.set_filter(Filter {
            incident_types: vec!["32".to_string()],
            ..Filter::default()
        });
        assert_eq!(engine.filter().region_code, None);
        assert_eq!(latest_events(&engine).len(), 3);
    }

    #[tokio::test]
    async fn individual_events_ignore_scale_level() {
        let mut engine = loaded(multi_region()).await;
        let before = latest_events(&engine);

        for level in ScaleLevel::all() {
            engine.set_scale_level(*level);
            assert_eq!(latest_events(&engine), before);
        }
        assert_eq!(before.len(), 5);
    }

    #[tokio::test]
    async fn city_scale_counts_unknown_types_only_in_events() {
        let mut engine = loaded(multi_region()).await;
        engine.set_scale_level(ScaleLevel::City);

        let total: u64 = latest_groups(&engine).iter().map(|g| g.amount).sum();
        assert_eq!(total, 4);
        assert_eq!(latest_events(&engine).len(), 5);
    }

    #[tokio::test]
    async fn progress_stream_ends_with_done() {
        let (source, reference) = luhansk_only();
        let mut engine = AggregationEngine::with_progress_interval(1);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.streams().loading_progress.subscribe(
            move |p: &LoadingProgress| sink.lock().unwrap().push(p.clone()),
            SubscribeOptions::default(),
        );

        engine.init(&source, &source, reference).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&LoadingProgress::phase("Loading names...")));
        assert!(seen.contains(&LoadingProgress::Count {
            processed: 1,
            total: 1
        }));
        assert_eq!(seen.last(), Some(&LoadingProgress::Done));
    }

    #[tokio::test]
    async fn failed_load_publishes_nothing() {
        let (source, reference) = luhansk_only();
        let mut engine = AggregationEngine::new();

        let emitted = Arc::new(Mutex::new(0_usize));
        let counter = emitted.clone();
        engine.streams().regions.subscribe(
            move |_: &Vec<RegionNode>| *counter.lock().unwrap() += 1,
            SubscribeOptions::default(),
        );

        let err = engine.init(&FailingSource, &source, reference).await.unwrap_err();

        assert!(matches!(err, EngineError::Source(_)));
        assert!(!engine.is_loaded());
        assert_eq!(*emitted.lock().unwrap(), 0);
        assert!(engine.streams().shown_groups.latest().is_none());
    }

    fn count_emissions<T: Clone + 'static>(observable: &Observable<T>) -> Arc<Mutex<usize>> {
        let emitted = Arc::new(Mutex::new(0_usize));
        let counter = emitted.clone();
        observable.subscribe(
            move |_: &T| *counter.lock().unwrap() += 1,
            SubscribeOptions::default(),
        );
        emitted
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_data() {
        let mut engine = loaded(multi_region()).await;
        let (source, reference) = luhansk_only();
        let regions_before = engine.regions().to_vec();
        let emitted = count_emissions(&engine.streams().shown_groups);

        let err = engine.init(&FailingSource, &source, reference).await.unwrap_err();

        assert!(matches!(err, EngineError::Source(_)));
        assert!(engine.is_loaded());
        assert_eq!(engine.regions(), regions_before.as_slice());
        assert_eq!(engine.events().len(), 5);
        assert_eq!(*emitted.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn worker_failure_leaves_state_untouched() {
        let mut engine = loaded(luhansk_only()).await;
        let regions_before = engine.regions().to_vec();
        let emitted = count_emissions(&engine.streams().regions);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(WorkerMessage::Failed {
            message: "settlement index unavailable".to_string(),
        })
        .unwrap();
        let outcome = worker::collect(&mut rx, |_| {}).await;

        let err = engine.install(outcome, NameDictionary::default()).unwrap_err();

        assert!(matches!(err, EngineError::Worker { .. }));
        assert!(engine.is_loaded());
        assert_eq!(engine.regions(), regions_before.as_slice());
        assert_eq!(engine.affected_types()[0].name.as_deref(), Some("Civilians"));
        assert_eq!(*emitted.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn aborted_worker_leaves_fresh_engine_unloaded() {
        let mut engine = AggregationEngine::new();
        let emitted = count_emissions(&engine.streams().individual_events);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<WorkerMessage>();
        drop(tx);
        let outcome = worker::collect(&mut rx, |_| {}).await;

        let err = engine.install(outcome, names()).unwrap_err();

        assert!(matches!(err, EngineError::WorkerAborted));
        assert!(!engine.is_loaded());
        assert!(engine.regions().is_empty());
        assert_eq!(*emitted.lock().unwrap(), 0);
        assert!(engine.streams().loading_progress.latest().is_none());
    }

    #[tokio::test]
    async fn district_filter_restricts_both_outputs() {
        let mut engine = loaded(multi_region()).await;
        engine.set_scale_level(ScaleLevel::District);
        engine.set_filter(Filter {
            district_code: Some("UA-05-02".to_string()),
            ..Filter::default()
        });

        assert_eq!(
            latest_groups(&engine),
            vec![ShownGroup {
                lat: 48.8,
                lon: 29.4,
                incident_type: "32".to_string(),
                amount: 1,
            }]
        );

        let events = latest_events(&engine);
        assert_eq!(events.len(), 2);
        assert!(
            events
                .iter()
                .all(|e| e.district_code.as_deref() == Some("UA-05-02"))
        );
    }

    #[tokio::test]
    async fn tree_order_follows_dataset_order() {
        let (mut source, reference) = multi_region();
        let north = source.events.shift_remove("north").unwrap();
        let mut reordered = EventDataset::new();
        reordered.insert("north".to_string(), north);
        reordered.extend(source.events.drain(..));
        source.events = reordered;

        let engine = loaded((source, reference)).await;

        let codes: Vec<Option<&str>> = engine
            .regions()
            .iter()
            .map(|r| r.region_code.as_deref())
            .collect();
        assert_eq!(codes, vec![Some("UA-74"), Some("UA-05")]);
        assert_eq!(engine.events()[0].settlement_name, "Chernihiv");
    }

    #[tokio::test]
    async fn late_subscriber_can_replay_groups() {
        let engine = loaded(luhansk_only()).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.streams().shown_groups.subscribe(
            move |groups: &Vec<ShownGroup>| sink.lock().unwrap().push(groups.len()),
            SubscribeOptions::replay(),
        );

        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn effective_scale_rules() {
        let pinned_region = Filter {
            region_code: Some("UA-05".to_string()),
            ..Filter::default()
        };
        let pinned_settlement = Filter {
            settlement_id: Some(3),
            ..Filter::default()
        };

        assert_eq!(effective_scale(ScaleLevel::Region, &pinned_region), ScaleLevel::District);
        assert_eq!(effective_scale(ScaleLevel::District, &pinned_region), ScaleLevel::District);
        assert_eq!(effective_scale(ScaleLevel::District, &pinned_settlement), ScaleLevel::City);
        assert_eq!(effective_scale(ScaleLevel::Region, &pinned_settlement), ScaleLevel::Region);
        assert_eq!(effective_scale(ScaleLevel::City, &Filter::default()), ScaleLevel::City);
    }

    #[test]
    fn unloaded_engine_emits_empty_outputs() {
        let mut engine = AggregationEngine::new();
        engine.set_scale_level(ScaleLevel::City);

        assert!(latest_groups(&engine).is_empty());
        assert!(latest_events(&engine).is_empty());
    }
}
