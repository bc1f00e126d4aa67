use crate::locator::IndexedBoundaries;
use crate::map::{LayerId, MapView, MarkerId, ShapeStyle};
use crate::types::{BoundaryCollection, QueryPoint};
use geo::Rect;

/// The active boundary collection plus the map handles that belong to it.
///
/// Each slot is swapped by removing the old rendering from the view first
/// and installing the new one straight after. A new collection is indexed
/// before anything already installed is touched.
#[derive(Default)]
pub struct Session {
    boundaries: Option<IndexedBoundaries>,
    boundary_layer: Option<LayerId>,
    marker: Option<MarkerId>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boundaries(&self) -> Option<&IndexedBoundaries> {
        self.boundaries.as_ref()
    }

    pub fn has_data(&self) -> bool {
        self.boundaries.is_some()
    }

    pub fn boundary_layer(&self) -> Option<LayerId> {
        self.boundary_layer
    }

    pub fn marker(&self) -> Option<MarkerId> {
        self.marker
    }

    /// Replaces the active collection and its rendering. Returns the new
    /// collection's extent, if it has one.
    pub fn install(
        &mut self,
        collection: BoundaryCollection,
        styles: Vec<ShapeStyle>,
        view: &mut dyn MapView,
    ) -> Option<Rect<f64>> {
        let extent = collection.extent();
        let indexed = IndexedBoundaries::new(collection);

        if let Some(layer) = self.boundary_layer.take() {
            view.remove_layer(layer);
        }
        self.boundary_layer = Some(view.add_boundaries(indexed.collection(), styles));
        self.boundaries = Some(indexed);
        extent
    }

    pub fn place_marker(&mut self, point: QueryPoint, view: &mut dyn MapView) {
        if let Some(marker) = self.marker.take() {
            view.remove_marker(marker);
        }
        self.marker = Some(view.add_marker(point));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RasterMapView;
    use crate::types::{Properties, WardFeature};
    use geo::{polygon, MultiPolygon};

    fn collection(n: usize) -> BoundaryCollection {
        BoundaryCollection {
            kind: "FeatureCollection".into(),
            features: (0..n)
                .map(|i| WardFeature {
                    geometry: MultiPolygon::new(vec![polygon![
                        (x: i as f64, y: 0.0),
                        (x: i as f64 + 1.0, y: 0.0),
                        (x: i as f64, y: 1.0),
                    ]]),
                    properties: Properties::new(),
                })
                .collect(),
            skipped: 0,
        }
    }

    fn styles(n: usize) -> Vec<ShapeStyle> {
        vec![
            ShapeStyle {
                color: "#FF6B6B".into(),
                weight: 2.0,
                opacity: 0.7,
                fill_opacity: 0.3,
            };
            n
        ]
    }

    fn view() -> RasterMapView {
        RasterMapView::new(64, 64, QueryPoint::new(0.0, 0.0).unwrap(), 3)
    }

    #[test]
    fn install_replaces_collection_and_layer() {
        let mut session = Session::new();
        let mut view = view();
        assert!(!session.has_data());

        session.install(collection(2), styles(2), &mut view);
        let first_layer = session.boundary_layer().unwrap();
        assert_eq!(session.boundaries().unwrap().collection().len(), 2);

        let extent = session.install(collection(3), styles(3), &mut view);
        assert_eq!(view.layer_count(), 1);
        assert_ne!(session.boundary_layer(), Some(first_layer));
        assert_eq!(session.boundaries().unwrap().collection().len(), 3);
        assert_eq!(extent.unwrap().max().x, 3.0);
    }

    #[test]
    fn only_one_marker_exists() {
        let mut session = Session::new();
        let mut view = view();
        session.place_marker(QueryPoint::new(1.0, 1.0).unwrap(), &mut view);
        let second = QueryPoint::new(2.0, 2.0).unwrap();
        session.place_marker(second, &mut view);
        assert_eq!(view.marker_positions(), vec![second]);
        assert!(session.marker().is_some());
    }
}
