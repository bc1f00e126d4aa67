use crate::types::{BoundaryCollection, LookupOutcome, QueryPoint};
use geo::algorithm::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{BoundingRect, MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

/// Point-in-region predicate used by the locator.
pub trait ContainmentTest {
    fn contains(&self, region: &MultiPolygon<f64>, point: &Point<f64>) -> bool;
}

impl<C: ContainmentTest + ?Sized> ContainmentTest for Box<C> {
    fn contains(&self, region: &MultiPolygon<f64>, point: &Point<f64>) -> bool {
        (**self).contains(region, point)
    }
}

/// Containment via `geo`. Points on an edge or vertex count as inside;
/// points inside a hole do not.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoContainment;

impl ContainmentTest for GeoContainment {
    fn contains(&self, region: &MultiPolygon<f64>, point: &Point<f64>) -> bool {
        region.coordinate_position(&point.0) != CoordPos::Outside
    }
}

// Wrapper for RTree indexing
struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// A boundary collection with a bounding-box index over its features.
pub struct IndexedBoundaries {
    collection: BoundaryCollection,
    tree: RTree<AreaIndex>,
}

impl IndexedBoundaries {
    pub fn new(collection: BoundaryCollection) -> Self {
        let tree_items: Vec<AreaIndex> = collection
            .features
            .iter()
            .enumerate()
            .filter_map(|(i, feature)| {
                let rect = feature.geometry.bounding_rect()?;
                Some(AreaIndex {
                    index: i,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        Self {
            collection,
            tree: RTree::bulk_load(tree_items),
        }
    }

    pub fn collection(&self) -> &BoundaryCollection {
        &self.collection
    }

    /// Feature indices whose bounding box touches the point, ascending.
    fn candidates(&self, point: &Point<f64>) -> Vec<usize> {
        let envelope = AABB::from_point([point.x(), point.y()]);
        let mut indices: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|c| c.index)
            .collect();
        indices.sort_unstable();
        indices
    }
}

pub struct PointLocator<C = GeoContainment> {
    containment: C,
}

impl Default for PointLocator<GeoContainment> {
    fn default() -> Self {
        Self::new(GeoContainment)
    }
}

impl<C: ContainmentTest> PointLocator<C> {
    pub fn new(containment: C) -> Self {
        Self { containment }
    }

    /// Label of the first feature, in source order, that contains the point.
    pub fn locate(&self, point: QueryPoint, boundaries: Option<&IndexedBoundaries>) -> LookupOutcome {
        let Some(boundaries) = boundaries else {
            return LookupOutcome::NoData;
        };
        let target = point.to_point();

        // Candidates come back in feature order, so the first hit is the
        // same one a full scan would find.
        let hit = boundaries
            .candidates(&target)
            .into_iter()
            .map(|i| &boundaries.collection.features[i])
            .find(|feature| self.containment.contains(&feature.geometry, &target));

        match hit {
            Some(feature) => {
                let label = feature.label();
                debug!("({}, {}) is in {}", point.lat(), point.lon(), label);
                LookupOutcome::Found(label)
            }
            None => {
                debug!("({}, {}) is outside every ward", point.lat(), point.lon());
                LookupOutcome::NotFound
            }
        }
    }
}
