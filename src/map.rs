use crate::types::{BoundaryCollection, QueryPoint};
use geo::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(pub u64);

/// How one ward is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeStyle {
    pub color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
}

/// The display surface the controller drives: a basemap, boundary layers, a
/// position marker and a viewport. It holds no ward data beyond what it was
/// handed to draw.
pub trait MapView {
    fn add_tile_layer(&mut self, url_template: &str, attribution: &str);

    /// Draws every feature of the collection; `styles` is parallel to
    /// `collection.features`.
    fn add_boundaries(&mut self, collection: &BoundaryCollection, styles: Vec<ShapeStyle>) -> LayerId;

    fn remove_layer(&mut self, layer: LayerId);

    fn add_marker(&mut self, point: QueryPoint) -> MarkerId;

    fn remove_marker(&mut self, marker: MarkerId);

    /// Extent is in lon/lat.
    fn fit_bounds(&mut self, extent: Rect<f64>);

    fn set_view(&mut self, center: QueryPoint, zoom: u8);
}
