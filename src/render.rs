use crate::map::{LayerId, MapView, MarkerId, ShapeStyle};
use crate::palette::hex_to_rgba;
use crate::types::{BoundaryCollection, QueryPoint};
use anyhow::{Context, Result};
use geo::algorithm::contains::Contains;
use geo::{BoundingRect, Coord, MapCoords, MultiPolygon, Point, Rect};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use std::f64::consts::PI;
use std::path::Path;
use tracing::info;

// Constants for Web Mercator
const TILE_SIZE: f64 = 256.0;
const MAX_LAT: f64 = 85.051_128_78;
pub const MAX_ZOOM: u8 = 18;

const BACKGROUND: Rgba<u8> = Rgba([242, 239, 233, 255]);
const MARKER_FILL: Rgba<u8> = Rgba([42, 129, 203, 255]);
const MARKER_EDGE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const MARKER_RADIUS: f64 = 7.0;

#[derive(Debug, Clone)]
pub struct TileLayer {
    pub url_template: String,
    pub attribution: String,
}

struct DrawnShape {
    geometry: MultiPolygon<f64>,
    style: ShapeStyle,
}

/// A map view that keeps its state in memory and rasterises it to PNG on
/// demand. The basemap is a flat background; the tile layer is recorded but
/// never fetched.
pub struct RasterMapView {
    width: u32,
    height: u32,
    tiles: Option<TileLayer>,
    layers: Vec<(LayerId, Vec<DrawnShape>)>,
    markers: Vec<(MarkerId, QueryPoint)>,
    center: (f64, f64),
    zoom: u8,
    next_id: u64,
}

impl RasterMapView {
    pub fn new(width: u32, height: u32, center: QueryPoint, zoom: u8) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            tiles: None,
            layers: Vec::new(),
            markers: Vec::new(),
            center: (center.lat(), center.lon()),
            zoom: zoom.min(MAX_ZOOM),
            next_id: 0,
        }
    }

    /// Current view centre as (lat, lon).
    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn tile_layer(&self) -> Option<&TileLayer> {
        self.tiles.as_ref()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn marker_positions(&self) -> Vec<QueryPoint> {
        self.markers.iter().map(|(_, p)| *p).collect()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn snapshot(&self, path: &Path) -> Result<()> {
        let img = self.render();
        img.save(path)
            .with_context(|| format!("Failed to write map snapshot: {:?}", path))?;
        info!("Wrote {}x{} map snapshot to {:?}", self.width, self.height, path);
        Ok(())
    }

    pub fn render(&self) -> RgbaImage {
        let (cx, cy) = project(self.center.0, self.center.1, self.zoom);
        let left = cx - self.width as f64 / 2.0;
        let top = cy - self.height as f64 / 2.0;
        let zoom = self.zoom;

        // Wards in screen pixels, in draw order.
        let shapes: Vec<(MultiPolygon<f64>, Option<Rect<f64>>, &ShapeStyle)> = self
            .layers
            .iter()
            .flat_map(|(_, shapes)| shapes.iter())
            .map(|shape| {
                let screen = shape.geometry.map_coords(move |c| {
                    let (x, y) = project(c.y, c.x, zoom);
                    Coord {
                        x: x - left,
                        y: y - top,
                    }
                });
                let bbox = screen.bounding_rect();
                (screen, bbox, &shape.style)
            })
            .collect();

        let width = self.width;
        let rows: Vec<Vec<Rgba<u8>>> = (0..self.height)
            .into_par_iter()
            .map(|py| {
                let mut row = vec![BACKGROUND; width as usize];
                let y = py as f64 + 0.5;
                for (px, pixel) in row.iter_mut().enumerate() {
                    let sample = Point::new(px as f64 + 0.5, y);
                    for (screen, bbox, style) in &shapes {
                        let Some(bbox) = bbox else { continue };
                        if sample.x() < bbox.min().x
                            || sample.x() > bbox.max().x
                            || sample.y() < bbox.min().y
                            || sample.y() > bbox.max().y
                        {
                            continue;
                        }
                        if screen.contains(&sample) {
                            blend(pixel, hex_to_rgba(&style.color), style.fill_opacity);
                        }
                    }
                }
                row
            })
            .collect();

        let mut img = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        for (py, row) in rows.into_iter().enumerate() {
            for (px, pixel) in row.into_iter().enumerate() {
                img.put_pixel(px as u32, py as u32, pixel);
            }
        }

        for (screen, _, style) in &shapes {
            self.stroke(&mut img, screen, style);
        }

        for (_, marker) in &self.markers {
            let (mx, my) = project(marker.lat(), marker.lon(), zoom);
            self.draw_marker(&mut img, mx - left, my - top);
        }

        img
    }

    fn stroke(&self, img: &mut RgbaImage, shape: &MultiPolygon<f64>, style: &ShapeStyle) {
        let (w, h) = (self.width as i64, self.height as i64);
        let mut mask = vec![false; (w * h) as usize];
        let half = (style.weight / 2.0).max(0.5);

        let rings = shape
            .0
            .iter()
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors().iter()));
        for ring in rings {
            for line in ring.lines() {
                let (dx, dy) = (line.end.x - line.start.x, line.end.y - line.start.y);
                let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
                // Long off-screen edges at high zoom are not worth walking.
                if steps > 1_000_000 {
                    continue;
                }
                for i in 0..=steps {
                    let t = i as f64 / steps as f64;
                    let (x, y) = (line.start.x + dx * t, line.start.y + dy * t);
                    let (x0, x1) = ((x - half).floor() as i64, (x + half).ceil() as i64);
                    let (y0, y1) = ((y - half).floor() as i64, (y + half).ceil() as i64);
                    for sy in y0.max(0)..y1.min(h) {
                        for sx in x0.max(0)..x1.min(w) {
                            mask[(sy * w + sx) as usize] = true;
                        }
                    }
                }
            }
        }

        let color = hex_to_rgba(&style.color);
        for (i, set) in mask.into_iter().enumerate() {
            if set {
                let (x, y) = ((i as i64 % w) as u32, (i as i64 / w) as u32);
                blend(img.get_pixel_mut(x, y), color, style.opacity);
            }
        }
    }

    fn draw_marker(&self, img: &mut RgbaImage, x: f64, y: f64) {
        let r = MARKER_RADIUS;
        let (x0, x1) = ((x - r - 2.0).floor() as i64, (x + r + 2.0).ceil() as i64);
        let (y0, y1) = ((y - r - 2.0).floor() as i64, (y + r + 2.0).ceil() as i64);
        for py in y0.max(0)..y1.min(self.height as i64) {
            for px in x0.max(0)..x1.min(self.width as i64) {
                let d = ((px as f64 + 0.5 - x).powi(2) + (py as f64 + 0.5 - y).powi(2)).sqrt();
                let pixel = img.get_pixel_mut(px as u32, py as u32);
                if d <= r {
                    *pixel = MARKER_FILL;
                } else if d <= r + 2.0 {
                    *pixel = MARKER_EDGE;
                }
            }
        }
    }
}

impl MapView for RasterMapView {
    fn add_tile_layer(&mut self, url_template: &str, attribution: &str) {
        self.tiles = Some(TileLayer {
            url_template: url_template.to_string(),
            attribution: attribution.to_string(),
        });
    }

    fn add_boundaries(&mut self, collection: &BoundaryCollection, styles: Vec<ShapeStyle>) -> LayerId {
        let id = LayerId(self.next_id());
        let shapes = collection
            .features
            .iter()
            .zip(styles)
            .map(|(feature, style)| DrawnShape {
                geometry: feature.geometry.clone(),
                style,
            })
            .collect();
        self.layers.push((id, shapes));
        id
    }

    fn remove_layer(&mut self, layer: LayerId) {
        self.layers.retain(|(id, _)| *id != layer);
    }

    fn add_marker(&mut self, point: QueryPoint) -> MarkerId {
        let id = MarkerId(self.next_id());
        self.markers.push((id, point));
        id
    }

    fn remove_marker(&mut self, marker: MarkerId) {
        self.markers.retain(|(id, _)| *id != marker);
    }

    fn fit_bounds(&mut self, extent: Rect<f64>) {
        let (min, max) = (extent.min(), extent.max());
        let zoom = (0..=MAX_ZOOM)
            .rev()
            .find(|&z| {
                let (x0, y0) = project(max.y, min.x, z);
                let (x1, y1) = project(min.y, max.x, z);
                (x1 - x0).abs() <= self.width as f64 && (y1 - y0).abs() <= self.height as f64
            })
            .unwrap_or(0);

        let (x0, y0) = project(max.y, min.x, zoom);
        let (x1, y1) = project(min.y, max.x, zoom);
        self.center = unproject((x0 + x1) / 2.0, (y0 + y1) / 2.0, zoom);
        self.zoom = zoom;
    }

    fn set_view(&mut self, center: QueryPoint, zoom: u8) {
        self.center = (center.lat(), center.lon());
        self.zoom = zoom.min(MAX_ZOOM);
    }
}

fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>, alpha: f64) {
    let a = alpha.clamp(0.0, 1.0);
    for c in 0..3 {
        let mixed = src.0[c] as f64 * a + dst.0[c] as f64 * (1.0 - a);
        dst.0[c] = mixed.round() as u8;
    }
    dst.0[3] = 255;
}

// Coordinate conversions
/// World pixel position of a lat/lon at `zoom`.
pub fn project(lat: f64, lon: f64, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32) * TILE_SIZE;
    let x = (lon + 180.0) / 360.0 * n;
    let lat_rad = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    let y = (1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0 * n;
    (x, y)
}

/// Inverse of [`project`], returning (lat, lon).
pub fn unproject(x: f64, y: f64, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32) * TILE_SIZE;
    let lon = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    (lat, lon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Properties, WardFeature};
    use geo::polygon;

    fn style(color: &str) -> ShapeStyle {
        ShapeStyle {
            color: color.to_string(),
            weight: 2.0,
            opacity: 0.7,
            fill_opacity: 0.3,
        }
    }

    fn wards() -> BoundaryCollection {
        BoundaryCollection {
            kind: "FeatureCollection".into(),
            features: vec![WardFeature {
                geometry: MultiPolygon::new(vec![polygon![
                    (x: 78.0, y: 27.8),
                    (x: 78.2, y: 27.8),
                    (x: 78.2, y: 28.0),
                    (x: 78.0, y: 28.0),
                ]]),
                properties: Properties::new(),
            }],
            skipped: 0,
        }
    }

    fn view() -> RasterMapView {
        RasterMapView::new(200, 100, QueryPoint::new(20.5937, 78.9629).unwrap(), 5)
    }

    #[test]
    fn projection_round_trips_the_equator() {
        let (x, y) = project(0.0, 0.0, 1);
        assert!((x - 256.0).abs() < 1e-9);
        assert!((y - 256.0).abs() < 1e-9);
        let (lat, lon) = unproject(x, y, 1);
        assert!(lat.abs() < 1e-9 && lon.abs() < 1e-9);
    }

    #[test]
    fn fit_bounds_centres_and_zooms_in() {
        let mut v = view();
        let extent = wards().extent().unwrap();
        v.fit_bounds(extent);
        let (lat, lon) = v.center();
        assert!((lon - 78.1).abs() < 1e-6);
        assert!((lat - 27.9).abs() < 0.01);
        assert!(v.zoom() > 5);

        // One more zoom level would overflow the 100 px height.
        let (_, y0) = project(28.0, 78.0, v.zoom() + 1);
        let (_, y1) = project(27.8, 78.0, v.zoom() + 1);
        assert!((y1 - y0).abs() > 100.0);
    }

    #[test]
    fn fit_bounds_on_a_point_uses_max_zoom() {
        let mut v = view();
        let p = Coord { x: 78.0, y: 27.0 };
        v.fit_bounds(Rect::new(p, p));
        assert_eq!(v.zoom(), MAX_ZOOM);
    }

    #[test]
    fn layers_and_markers_are_tracked() {
        let mut v = view();
        let layer = v.add_boundaries(&wards(), vec![style("#FF6B6B")]);
        assert_eq!(v.layer_count(), 1);
        v.remove_layer(layer);
        assert_eq!(v.layer_count(), 0);

        let p = QueryPoint::new(27.9, 78.1).unwrap();
        let m = v.add_marker(p);
        assert_eq!(v.marker_positions(), vec![p]);
        v.remove_marker(m);
        assert!(v.marker_positions().is_empty());
    }

    #[test]
    fn render_fills_wards_and_marks_the_point() {
        let mut v = view();
        v.add_tile_layer("https://tile.example/{z}/{x}/{y}.png", "test");
        v.add_boundaries(&wards(), vec![style("#FF0000")]);
        v.fit_bounds(wards().extent().unwrap());
        let img = v.render();
        assert_eq!(img.dimensions(), (200, 100));
        assert_eq!(*img.get_pixel(0, 0), BACKGROUND);

        // Middle of the ward, away from the outline: 30% red over background.
        let mid = *img.get_pixel(100, 50);
        assert!(mid.0[0] > BACKGROUND.0[0] - 1);
        assert!(mid.0[1] < BACKGROUND.0[1]);

        v.add_marker(QueryPoint::new(27.9, 78.1).unwrap());
        let img = v.render();
        assert_eq!(*img.get_pixel(100, 50), MARKER_FILL);
    }

    #[test]
    fn snapshot_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        let mut v = view();
        v.add_boundaries(&wards(), vec![style("#4ECDC4")]);
        v.snapshot(&path).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), 200);
    }
}
