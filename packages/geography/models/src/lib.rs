#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Settlement and administrative area reference types.
//!
//! Two administrative tiers are modeled: regions (ADM1) contain districts
//! (ADM2), which contain settlements. The reference tables are loaded once
//! per session and handed to the aggregation engine as a [`ReferenceData`]
//! value; nothing here is global.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A settlement row as it appears in the settlements reference JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Settlement name.
    pub name: String,
    /// Latitude (WGS84 degrees).
    pub lat: f64,
    /// Longitude (WGS84 degrees).
    pub lon: f64,
    /// District (ADM2) code.
    #[serde(rename = "ADM2Code", default)]
    pub district_code: Option<String>,
    /// Region (ADM1) code.
    #[serde(rename = "ADM1Code", default)]
    pub region_code: Option<String>,
}

/// A district or region row as it appears in the `ADM2`/`ADM1` JSON.
///
/// District tables are keyed by `ADM2Code`, region tables by `ADM1Code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAreaRecord {
    /// Display name.
    pub name: String,
    /// Centroid latitude.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Centroid longitude.
    #[serde(default)]
    pub lon: Option<f64>,
    /// District (ADM2) code.
    #[serde(rename = "ADM2Code", default)]
    pub district_code: Option<String>,
    /// Region (ADM1) code.
    #[serde(rename = "ADM1Code", default)]
    pub region_code: Option<String>,
}

/// A settlement: the target set for nearest-neighbor search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    /// Position in the settlement table.
    pub id: usize,
    /// Settlement name.
    pub name: String,
    /// Latitude (WGS84 degrees).
    pub lat: f64,
    /// Longitude (WGS84 degrees).
    pub lon: f64,
    /// District (ADM2) code.
    pub district_code: Option<String>,
    /// Region (ADM1) code.
    pub region_code: Option<String>,
}

/// Display metadata for a district or region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminArea {
    /// Display name.
    pub name: String,
    /// Centroid latitude.
    pub lat: Option<f64>,
    /// Centroid longitude.
    pub lon: Option<f64>,
}

impl From<&AdminAreaRecord> for AdminArea {
    fn from(record: &AdminAreaRecord) -> Self {
        Self {
            name: record.name.clone(),
            lat: record.lat,
            lon: record.lon,
        }
    }
}

/// Lookup tables from district/region codes to display metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdministrativeLookup {
    districts: BTreeMap<String, AdminArea>,
    regions: BTreeMap<String, AdminArea>,
}

impl AdministrativeLookup {
    /// Builds the lookup from raw district and region rows.
    ///
    /// Rows without the relevant code are skipped. When a code appears
    /// more than once the first row wins.
    #[must_use]
    pub fn new(districts: &[AdminAreaRecord], regions: &[AdminAreaRecord]) -> Self {
        Self {
            districts: index_by(districts, |r| r.district_code.as_deref()),
            regions: index_by(regions, |r| r.region_code.as_deref()),
        }
    }

    /// Metadata for a district code. Missing codes yield `None`.
    #[must_use]
    pub fn district(&self, code: Option<&str>) -> Option<&AdminArea> {
        code.and_then(|code| self.districts.get(code))
    }

    /// Metadata for a region code. Missing codes yield `None`.
    #[must_use]
    pub fn region(&self, code: Option<&str>) -> Option<&AdminArea> {
        code.and_then(|code| self.regions.get(code))
    }

    /// Number of known districts.
    #[must_use]
    pub fn district_count(&self) -> usize {
        self.districts.len()
    }

    /// Number of known regions.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

fn index_by(
    records: &[AdminAreaRecord],
    key: impl Fn(&AdminAreaRecord) -> Option<&str>,
) -> BTreeMap<String, AdminArea> {
    let mut map = BTreeMap::new();
    for record in records {
        let Some(code) = key(record) else {
            continue;
        };
        map.entry(code.to_string())
            .or_insert_with(|| AdminArea::from(record));
    }
    map
}

/// All static reference data consumed by the aggregation pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceData {
    /// Settlements, indexed by [`Settlement::id`].
    pub settlements: Vec<Settlement>,
    /// District and region metadata.
    pub lookup: AdministrativeLookup,
}

impl ReferenceData {
    /// Assembles reference data from the three raw tables.
    ///
    /// Settlement ids are assigned from table position.
    #[must_use]
    pub fn from_records(
        settlements: Vec<SettlementRecord>,
        districts: &[AdminAreaRecord],
        regions: &[AdminAreaRecord],
    ) -> Self {
        let settlements: Vec<Settlement> = settlements
            .into_iter()
            .enumerate()
            .map(|(id, record)| Settlement {
                id,
                name: record.name,
                lat: record.lat,
                lon: record.lon,
                district_code: record.district_code,
                region_code: record.region_code,
            })
            .collect();

        let lookup = AdministrativeLookup::new(districts, regions);

        log::debug!(
            "Reference data: {} settlements, {} districts, {} regions",
            settlements.len(),
            lookup.district_count(),
            lookup.region_count()
        );

        Self {
            settlements,
            lookup,
        }
    }
}
