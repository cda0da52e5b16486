#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident record types shared across the incident-map system.
//!
//! Raw events arrive from the data source grouped under arbitrary keys.
//! They are flattened, validated, and reverse-geocoded to the nearest
//! settlement, producing [`GeocodedEvent`]s that the hierarchy builder
//! rolls up into regions, districts, and cities.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Display name used when an event code has no dictionary entry.
pub const UNKNOWN_EVENT_NAME: &str = "UNKNOWN";

/// Numeric incident (affected) type code.
///
/// Records without a type are assigned [`IncidentType::UNKNOWN`]. Every
/// other value, including `0`, is a real type and is counted in stats.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IncidentType(i64);

impl IncidentType {
    /// Sentinel for records that carry no incident type.
    pub const UNKNOWN: Self = Self(-1);

    /// Wraps a raw type code.
    #[must_use]
    pub const fn new(code: i64) -> Self {
        Self(code)
    }

    /// Resolves an optional code from a raw record, falling back to
    /// [`Self::UNKNOWN`].
    #[must_use]
    pub const fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(code) => Self(code),
            None => Self::UNKNOWN,
        }
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn code(self) -> i64 {
        self.0
    }

    /// Whether this is a real type rather than the unknown sentinel.
    #[must_use]
    pub const fn is_known(self) -> bool {
        self.0 != Self::UNKNOWN.0
    }

    /// String key used in stats maps and filters (e.g. `"32"`).
    #[must_use]
    pub fn key(self) -> String {
        self.0.to_string()
    }
}

impl std::fmt::Display for IncidentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single incident as delivered by the data source.
///
/// Coordinates are optional on the wire; records missing either one are
/// dropped before geocoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Latitude (WGS84 degrees).
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude (WGS84 degrees).
    #[serde(default)]
    pub lon: Option<f64>,
    /// Incident (affected) type code.
    #[serde(default)]
    pub affected_type: Option<i64>,
    /// Event code, translated through [`NameDictionary::event`].
    pub event: i64,
}

impl RawEvent {
    /// Returns `(lon, lat)` when both coordinates are present and finite.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lon, self.lat) {
            (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite() => Some((lon, lat)),
            _ => None,
        }
    }

    /// The resolved incident type.
    #[must_use]
    pub const fn incident_type(&self) -> IncidentType {
        IncidentType::from_code(self.affected_type)
    }
}

/// Event dataset as published by the source: arbitrary group keys (e.g.
/// a source region label) mapped to arrays of raw events, in document
/// order.
pub type EventDataset = IndexMap<String, Vec<RawEvent>>;

/// Flattens all groups of a dataset into one list, in document order.
#[must_use]
pub fn flatten_dataset(dataset: EventDataset) -> Vec<RawEvent> {
    dataset.into_values().flatten().collect()
}

/// Translation tables from numeric codes to display strings.
///
/// Keys are the stringified codes exactly as they appear in the names
/// JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameDictionary {
    /// Incident type code -> display name.
    #[serde(default)]
    pub affected_type: BTreeMap<String, String>,
    /// Event code -> display name.
    #[serde(default)]
    pub event: BTreeMap<String, String>,
}

impl NameDictionary {
    /// Display name for an incident type, if the dictionary has one.
    #[must_use]
    pub fn affected_type_name(&self, incident_type: IncidentType) -> Option<&str> {
        self.affected_type
            .get(&incident_type.key())
            .map(String::as_str)
    }

    /// Display name for an event code, or [`UNKNOWN_EVENT_NAME`].
    #[must_use]
    pub fn event_name(&self, event: i64) -> &str {
        self.event
            .get(&event.to_string())
            .map_or(UNKNOWN_EVENT_NAME, String::as_str)
    }
}

/// A raw event resolved to its nearest settlement.
///
/// `region_name` is only known once the full hierarchy has been built and
/// is back-filled by the hierarchy builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodedEvent {
    /// Original latitude.
    pub lat: f64,
    /// Original longitude.
    pub lon: f64,
    /// Incident type ([`IncidentType::UNKNOWN`] when absent).
    pub incident_type: IncidentType,
    /// Display name of the incident type.
    pub incident_type_name: Option<String>,
    /// Raw event code.
    pub event_code: i64,
    /// Display name of the event code.
    pub event_name: String,
    /// Position of the resolved settlement in the settlement table.
    pub settlement_id: usize,
    /// Name of the resolved settlement.
    pub settlement_name: String,
    /// Settlement latitude.
    pub settlement_lat: f64,
    /// Settlement longitude.
    pub settlement_lon: f64,
    /// Second-level administrative code (ADM2) of the settlement.
    pub district_code: Option<String>,
    /// First-level administrative code (ADM1) of the settlement.
    pub region_code: Option<String>,
    /// Display name of the region, filled in after grouping.
    pub region_name: Option<String>,
}
