//! R-tree based proximity index using the rstar crate.
//!
//! Provides O(log n) spatial queries for:
//! - Nearest neighbor
//! - Nearest neighbor within a radius
//! - Point-in-radius

use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Result for a query with no reference point within the radius.
pub const NO_MATCH: [f64; 3] = [-1.0, -1.0, -1.0];

/// A reference point with its position in the input slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedPoint {
    /// Position in the reference slice.
    pub index: usize,
    /// Coordinates.
    pub xyz: [f64; 3],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xyz)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.xyz[0] - point[0];
        let dy = self.xyz[1] - point[1];
        let dz = self.xyz[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }

    fn contains_point(&self, point: &[f64; 3]) -> bool {
        self.xyz == *point
    }
}

/// A reference point found by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityMatch {
    /// Position of the matched point in the reference slice.
    pub index: usize,
    /// Coordinates of the matched point.
    pub xyz: [f64; 3],
    /// Euclidean distance from the query.
    pub distance: f64,
}

/// Static spatial index over a set of reference points.
///
/// Uses a bulk-loaded R*-tree.
pub struct ProximityIndex {
    tree: RTree<IndexedPoint>,
}

impl ProximityIndex {
    /// Index `points`; match indices refer to positions in this slice.
    pub fn new(points: &[[f64; 3]]) -> Self {
        let indexed: Vec<_> = points
            .iter()
            .enumerate()
            .map(|(index, &xyz)| IndexedPoint { index, xyz })
            .collect();

        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Nearest reference point to `query`.
    pub fn nearest(&self, query: [f64; 3]) -> Option<ProximityMatch> {
        self.tree.nearest_neighbor(&query).map(|point| ProximityMatch {
            index: point.index,
            xyz: point.xyz,
            distance: point.distance_2(&query).sqrt(),
        })
    }

    /// Nearest reference point if it is no farther than `radius`.
    ///
    /// A negative or NaN radius never matches.
    pub fn nearest_within(&self, query: [f64; 3], radius: f64) -> Option<ProximityMatch> {
        if !(radius >= 0.0) {
            return None;
        }
        let radius_sq = radius * radius;
        self.tree
            .nearest_neighbor(&query)
            .filter(|point| point.distance_2(&query) <= radius_sq)
            .map(|point| ProximityMatch {
                index: point.index,
                xyz: point.xyz,
                distance: point.distance_2(&query).sqrt(),
            })
    }

    /// Indices of all reference points within `radius` of `query`.
    pub fn within_radius(&self, query: [f64; 3], radius: f64) -> Vec<usize> {
        if !(radius >= 0.0) {
            return Vec::new();
        }
        self.tree
            .locate_within_distance(query, radius * radius)
            .map(|point| point.index)
            .collect()
    }

    /// Get the number of points in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// For each query, the nearest reference point within `radius`, or
/// [`NO_MATCH`] when there is none.
///
/// `result[i]` belongs to `queries[i]`. Both sets must use the same units.
pub fn nearest_within_radius(
    reference: &[[f64; 3]],
    queries: &[[f64; 3]],
    radius: f64,
) -> Vec<[f64; 3]> {
    let index = ProximityIndex::new(reference);
    queries
        .iter()
        .map(|&query| {
            index
                .nearest_within(query, radius)
                .map_or(NO_MATCH, |m| m.xyz)
        })
        .collect()
}
