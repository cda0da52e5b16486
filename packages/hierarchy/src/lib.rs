#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Three-level administrative roll-up of geocoded incidents.
//!
//! Events are grouped into settlements, settlements into districts, and
//! districts into regions. Every node carries the merged per-type stats of
//! its children, computed once bottom-up at build time.
//!
//! Each grouping pass keeps nodes in first-seen order and uses a code ->
//! position index for find-or-create, so a pass is `O(n log k)` in the
//! number of inputs `n` and distinct keys `k` rather than the `O(n * k)` of
//! a linear search per input.

use std::collections::BTreeMap;

use incident_map_analytics_models::StatsMap;
use incident_map_geography_models::AdministrativeLookup;
use incident_map_incident_models::GeocodedEvent;
use serde::{Deserialize, Serialize};

/// A settlement with at least one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityNode {
    /// Settlement table position.
    pub settlement_id: usize,
    /// Settlement name.
    pub name: String,
    /// Settlement latitude.
    pub lat: f64,
    /// Settlement longitude.
    pub lon: f64,
    /// District (ADM2) code of the settlement.
    pub district_code: Option<String>,
    /// Region (ADM1) code of the settlement.
    pub region_code: Option<String>,
    /// Per-type counts of the events below.
    pub stats: StatsMap,
    /// Events resolved to this settlement, in input order.
    pub events: Vec<GeocodedEvent>,
}

/// A district and the settlements it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictNode {
    /// District (ADM2) code.
    pub district_code: Option<String>,
    /// Region (ADM1) code, taken from the first settlement seen.
    pub region_code: Option<String>,
    /// Display name, absent when the lookup has no entry.
    pub name: Option<String>,
    /// Centroid latitude.
    pub lat: Option<f64>,
    /// Centroid longitude.
    pub lon: Option<f64>,
    /// Merged stats of all cities.
    pub stats: StatsMap,
    /// Contained settlements, in first-seen order.
    pub cities: Vec<CityNode>,
}

/// A region and the districts it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionNode {
    /// Region (ADM1) code.
    pub region_code: Option<String>,
    /// Display name, absent when the lookup has no entry.
    pub name: Option<String>,
    /// Centroid latitude.
    pub lat: Option<f64>,
    /// Centroid longitude.
    pub lon: Option<f64>,
    /// Merged stats of all districts.
    pub stats: StatsMap,
    /// Contained districts, in first-seen order.
    pub districts: Vec<DistrictNode>,
}

/// The built tree plus the flat event list it was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hierarchy {
    /// All geocoded events in input order, with region names filled in.
    pub events: Vec<GeocodedEvent>,
    /// Regions in first-seen order.
    pub regions: Vec<RegionNode>,
}

impl Hierarchy {
    /// Merged stats over every region.
    #[must_use]
    pub fn total_stats(&self) -> StatsMap {
        let mut stats = StatsMap::new();
        for region in &self.regions {
            stats.absorb(&region.stats);
        }
        stats
    }
}

/// Builds the full region -> district -> city tree.
///
/// Nodes whose district or region code has no lookup entry are kept with
/// empty display fields.
#[must_use]
pub fn build(mut events: Vec<GeocodedEvent>, lookup: &AdministrativeLookup) -> Hierarchy {
    let cities = group_events_by_city(&events);
    let city_count = cities.len();
    let districts = group_cities_by_district(cities, lookup);
    let district_count = districts.len();
    let regions = group_districts_by_region(districts, lookup);

    let region_names: BTreeMap<Option<&str>, Option<&str>> = regions
        .iter()
        .map(|r| (r.region_code.as_deref(), r.name.as_deref()))
        .collect();

    for event in &mut events {
        event.region_name = region_names
            .get(&event.region_code.as_deref())
            .copied()
            .flatten()
            .map(str::to_string);
    }

    log::info!(
        "Grouped {} events into {city_count} cities, {district_count} districts, {} regions",
        events.len(),
        regions.len()
    );

    Hierarchy { events, regions }
}

/// First pass: one [`CityNode`] per distinct settlement.
///
/// Events with the unknown incident type are attached but not counted.
#[must_use]
pub fn group_events_by_city(events: &[GeocodedEvent]) -> Vec<CityNode> {
    let mut positions: BTreeMap<usize, usize> = BTreeMap::new();
    let mut cities: Vec<CityNode> = Vec::new();

    for event in events {
        let idx = *positions.entry(event.settlement_id).or_insert_with(|| {
            cities.push(CityNode {
                settlement_id: event.settlement_id,
                name: event.settlement_name.clone(),
                lat: event.settlement_lat,
                lon: event.settlement_lon,
                district_code: event.district_code.clone(),
                region_code: event.region_code.clone(),
                stats: StatsMap::new(),
                events: Vec::new(),
            });
            cities.len() - 1
        });

        let city = &mut cities[idx];
        if event.incident_type.is_known() {
            city.stats.increment(&event.incident_type.key());
        }
        city.events.push(event.clone());
    }

    cities
}

/// Second pass: one [`DistrictNode`] per distinct district code.
#[must_use]
pub fn group_cities_by_district(
    cities: Vec<CityNode>,
    lookup: &AdministrativeLookup,
) -> Vec<DistrictNode> {
    let mut positions: BTreeMap<Option<String>, usize> = BTreeMap::new();
    let mut districts: Vec<DistrictNode> = Vec::new();

    for city in cities {
        let idx = *positions
            .entry(city.district_code.clone())
            .or_insert_with(|| {
                let meta = lookup.district(city.district_code.as_deref());
                districts.push(DistrictNode {
                    district_code: city.district_code.clone(),
                    region_code: city.region_code.clone(),
                    name: meta.map(|m| m.name.clone()),
                    lat: meta.and_then(|m| m.lat),
                    lon: meta.and_then(|m| m.lon),
                    stats: StatsMap::new(),
                    cities: Vec::new(),
                });
                districts.len() - 1
            });

        let district = &mut districts[idx];
        district.stats.absorb(&city.stats);
        district.cities.push(city);
    }

    districts
}

/// Third pass: one [`RegionNode`] per distinct region code, back-filling
/// the region name onto every contained event.
#[must_use]
pub fn group_districts_by_region(
    districts: Vec<DistrictNode>,
    lookup: &AdministrativeLookup,
) -> Vec<RegionNode> {
    let mut positions: BTreeMap<Option<String>, usize> = BTreeMap::new();
    let mut regions: Vec<RegionNode> = Vec::new();

    for district in districts {
        let idx = *positions
            .entry(district.region_code.clone())
            .or_insert_with(|| {
                let meta = lookup.region(district.region_code.as_deref());
                regions.push(RegionNode {
                    region_code: district.region_code.clone(),
                    name: meta.map(|m| m.name.clone()),
                    lat: meta.and_then(|m| m.lat),
                    lon: meta.and_then(|m| m.lon),
                    stats: StatsMap::new(),
                    districts: Vec::new(),
                });
                regions.len() - 1
            });

        let region = &mut regions[idx];
        region.stats.absorb(&district.stats);
        region.districts.push(district);
    }

    for region in &mut regions {
        let name = region.name.clone();
        region
            .districts
            .iter_mut()
            .flat_map(|d| d.cities.iter_mut())
            .flat_map(|c| c.events.iter_mut())
            .for_each(|event| event.region_name.clone_from(&name));
    }

    regions
}
