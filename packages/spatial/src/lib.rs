#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory nearest-settlement index for reverse geocoding.
//!
//! Builds a balanced 2D k-d tree over the settlement table once at
//! startup, alternating the split axis between longitude and latitude by
//! depth. Queries return the settlement with the smallest great-circle
//! (Haversine) distance to a point.

use geo::Point;
use incident_map_geography_models::Settlement;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two `(lon, lat)` points in kilometers.
#[must_use]
pub fn haversine_km(a: Point<f64>, b: Point<f64>) -> f64 {
    let d_lat = (b.y() - a.y()).to_radians();
    let d_lon = (b.x() - a.x()).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.y().to_radians().cos() * b.y().to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Lon,
    Lat,
}

impl Axis {
    const fn for_depth(depth: usize) -> Self {
        if depth % 2 == 0 { Self::Lon } else { Self::Lat }
    }

    fn of(self, point: Point<f64>) -> f64 {
        match self {
            Self::Lon => point.x(),
            Self::Lat => point.y(),
        }
    }
}

struct KdNode {
    /// Index into [`SpatialIndex::settlements`].
    settlement: usize,
    axis: Axis,
    split: f64,
    left: Option<usize>,
    right: Option<usize>,
}

/// Static nearest-neighbor index over a fixed settlement list.
pub struct SpatialIndex {
    settlements: Vec<Settlement>,
    nodes: Vec<KdNode>,
    root: Option<usize>,
}

impl SpatialIndex {
    /// Builds the tree over `settlements`.
    ///
    /// Each node holds the median point along its axis; the points below
    /// it go left and the points above it go right.
    #[must_use]
    pub fn build(settlements: Vec<Settlement>) -> Self {
        let mut order: Vec<usize> = (0..settlements.len()).collect();
        let mut nodes = Vec::with_capacity(settlements.len());
        let root = build_subtree(&settlements, &mut order, 0, &mut nodes);

        log::info!("Built settlement index over {} settlements", settlements.len());

        Self {
            settlements,
            nodes,
            root,
        }
    }

    /// Number of indexed settlements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.settlements.len()
    }

    /// Whether the index holds no settlements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settlements.is_empty()
    }

    /// Nearest settlement to `(lon, lat)`, or `None` for an empty index.
    #[must_use]
    pub fn nearest(&self, lon: f64, lat: f64) -> Option<&Settlement> {
        self.nearest_with_distance(Point::new(lon, lat))
            .map(|(settlement, _)| settlement)
    }

    /// Nearest settlement to `point` together with its distance in km.
    ///
    /// Among equidistant settlements the first one visited wins, so
    /// repeated queries resolve identically.
    #[must_use]
    pub fn nearest_with_distance(&self, point: Point<f64>) -> Option<(&Settlement, f64)> {
        let mut best = None;
        self.search(self.root, point, &mut best);
        best.map(|(idx, distance)| (&self.settlements[idx], distance))
    }

    fn search(&self, node: Option<usize>, query: Point<f64>, best: &mut Option<(usize, f64)>) {
        let Some(node) = node.map(|idx| &self.nodes[idx]) else {
            return;
        };

        let candidate = &self.settlements[node.settlement];
        let distance = haversine_km(query, Point::new(candidate.lon, candidate.lat));
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            *best = Some((node.settlement, distance));
        }

        let (near, far) = if node.axis.of(query) < node.split {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        self.search(near, query, best);

        let bound = plane_distance_km(query, node.axis, node.split);
        if best.is_none_or(|(_, best_distance)| bound < best_distance) {
            self.search(far, query, best);
        }
    }
}

fn build_subtree(
    settlements: &[Settlement],
    order: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> Option<usize> {
    if order.is_empty() {
        return None;
    }

    let axis = Axis::for_depth(depth);
    let coord = |idx: usize| axis.of(Point::new(settlements[idx].lon, settlements[idx].lat));
    order.sort_by(|a, b| coord(*a).total_cmp(&coord(*b)));

    let median = order.len() / 2;
    let settlement = order[median];
    let (below, rest) = order.split_at_mut(median);
    let above = &mut rest[1..];

    let left = build_subtree(settlements, below, depth + 1, nodes);
    let right = build_subtree(settlements, above, depth + 1, nodes);

    nodes.push(KdNode {
        settlement,
        axis,
        split: coord(settlement),
        left,
        right,
    });

    Some(nodes.len() - 1)
}

/// Lower bound on the great-circle distance from `query` to any point on
/// the far side of a split plane.
///
/// Latitude planes are parallels, so the bound is the meridional gap.
/// Longitude planes are meridians; the bound is the cross-track distance
/// to that meridian.
fn plane_distance_km(query: Point<f64>, axis: Axis, split: f64) -> f64 {
    match axis {
        Axis::Lat => EARTH_RADIUS_KM * (query.y() - split).abs().to_radians(),
        Axis::Lon => {
            let d_lon = (query.x() - split).abs().min(90.0).to_radians();
            let sin_cross = (d_lon.sin() * query.y().to_radians().cos()).clamp(0.0, 1.0);
            EARTH_RADIUS_KM * sin_cross.asin()
        }
    }
}
