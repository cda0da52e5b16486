#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation statistics and view-state types.
//!
//! Defines the per-incident-type counter ([`StatsMap`]) carried by every
//! node of the administrative hierarchy, the [`ScaleLevel`] and [`Filter`]
//! that drive recomputation, and the records pushed to the map and list
//! views.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Occurrence count per incident type, keyed by the stringified type code.
///
/// The sum of all values equals the number of contributing events with a
/// known incident type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsMap(BTreeMap<String, u64>);

impl StatsMap {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds one occurrence of `key`.
    pub fn increment(&mut self, key: &str) {
        *self.0.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Adds every count of `other` into `self`.
    pub fn absorb(&mut self, other: &Self) {
        for (key, count) in &other.0 {
            *self.0.entry(key.clone()).or_insert(0) += count;
        }
    }

    /// Count for `key`, zero when absent.
    #[must_use]
    pub fn get(&self, key: &str) -> u64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// Whether no type has been counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates `(type key, count)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(key, count)| (key.as_str(), *count))
    }

    /// Type keys in key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for StatsMap {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, count) in iter {
            *map.0.entry(key.into()).or_insert(0) += count;
        }
        map
    }
}

/// Merges two optional stats maps into a new one.
///
/// For every key in either input the result holds the sum of both counts,
/// absent keys counting as zero. An absent map is treated as empty.
/// Neither input is modified.
#[must_use]
pub fn merge_stats(a: Option<&StatsMap>, b: Option<&StatsMap>) -> StatsMap {
    let mut result = a.cloned().unwrap_or_default();
    if let Some(b) = b {
        result.absorb(b);
    }
    result
}

/// Granularity at which aggregated stats are displayed, coarse to fine.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScaleLevel {
    /// First-level administrative areas.
    #[default]
    Region = 1,
    /// Second-level administrative areas.
    District = 2,
    /// Individual settlements.
    City = 3,
}

impl ScaleLevel {
    /// Returns all variants, coarse to fine.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Region, Self::District, Self::City]
    }
}

/// Drill-down filter applied to both the grouped and the individual views.
///
/// Unset fields pass everything through; an empty `incident_types` list
/// places no restriction on types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Region (ADM1) code to restrict to.
    #[serde(default)]
    pub region_code: Option<String>,
    /// District (ADM2) code to restrict to.
    #[serde(default)]
    pub district_code: Option<String>,
    /// Settlement id to restrict to.
    #[serde(default)]
    pub settlement_id: Option<usize>,
    /// Incident type keys to keep.
    #[serde(default)]
    pub incident_types: Vec<String>,
}

impl Filter {
    /// Whether `key` passes the incident type restriction.
    #[must_use]
    pub fn allows_type(&self, key: &str) -> bool {
        self.incident_types.is_empty() || self.incident_types.iter().any(|t| t == key)
    }

    /// Whether `code` passes the region restriction.
    #[must_use]
    pub fn allows_region(&self, code: Option<&str>) -> bool {
        self.region_code
            .as_deref()
            .is_none_or(|wanted| code == Some(wanted))
    }

    /// Whether `code` passes the district restriction.
    #[must_use]
    pub fn allows_district(&self, code: Option<&str>) -> bool {
        self.district_code
            .as_deref()
            .is_none_or(|wanted| code == Some(wanted))
    }

    /// Whether `id` passes the settlement restriction.
    #[must_use]
    pub fn allows_settlement(&self, id: usize) -> bool {
        self.settlement_id.is_none_or(|wanted| wanted == id)
    }
}

/// One map marker: the count of a single incident type at a node.
///
/// Areas without lookup coordinates are placed at their first settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShownGroup {
    /// Marker latitude.
    pub lat: f64,
    /// Marker longitude.
    pub lon: f64,
    /// Incident type key.
    pub incident_type: String,
    /// Number of events of that type.
    pub amount: u64,
}

/// An incident type present in the loaded data, with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedTypeEntry {
    /// Incident type key.
    pub affected_type: String,
    /// Display name from the name dictionary.
    pub name: Option<String>,
}
