use crate::error::CoordinateError;
use geo::{BoundingRect, MultiPolygon, Point, Rect};
use serde_json::{Map, Value};

pub type Properties = Map<String, Value>;

/// A latitude/longitude pair that has passed range validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint {
    lat: f64,
    lon: f64,
}

impl QueryPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if lat.is_nan() || lon.is_nan() {
            return Err(CoordinateError::NotANumber);
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::OutOfRange { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Parses the raw text of the two coordinate inputs.
    pub fn parse(lat: &str, lon: &str) -> Result<Self, CoordinateError> {
        let lat = parse_coordinate(lat)?;
        let lon = parse_coordinate(lon)?;
        Self::new(lat, lon)
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    // geo works in (x, y) = (lon, lat)
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

fn parse_coordinate(text: &str) -> Result<f64, CoordinateError> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| CoordinateError::NotANumber)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoordinateError::NotANumber)
    }
}

#[derive(Debug, Clone)]
pub struct WardFeature {
    pub geometry: MultiPolygon<f64>,
    pub properties: Properties,
}

impl WardFeature {
    pub fn label(&self) -> String {
        crate::label::derive_label(&self.properties)
    }
}

/// The set of ward polygons from one load, in source-file order.
#[derive(Debug, Clone)]
pub struct BoundaryCollection {
    pub kind: String,
    pub features: Vec<WardFeature>,
    pub skipped: usize,
}

impl BoundaryCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Combined bounding box of every feature, `None` when nothing has an extent.
    pub fn extent(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.bounding_rect())
            .reduce(|acc, r| {
                Rect::new(
                    geo::Coord {
                        x: acc.min().x.min(r.min().x),
                        y: acc.min().y.min(r.min().y),
                    },
                    geo::Coord {
                        x: acc.max().x.max(r.max().x),
                        y: acc.max().y.max(r.max().y),
                    },
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(String),
    NotFound,
    NoData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn query_point_rejects_out_of_range() {
        assert!(matches!(
            QueryPoint::new(95.0, 10.0),
            Err(CoordinateError::OutOfRange { .. })
        ));
        assert!(matches!(
            QueryPoint::new(10.0, -180.5),
            Err(CoordinateError::OutOfRange { .. })
        ));
        assert!(QueryPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn query_point_parse_requires_numbers() {
        assert_eq!(
            QueryPoint::parse("abc", "78.0"),
            Err(CoordinateError::NotANumber)
        );
        assert_eq!(QueryPoint::parse("", "78.0"), Err(CoordinateError::NotANumber));
        assert_eq!(QueryPoint::parse("NaN", "1"), Err(CoordinateError::NotANumber));
        let p = QueryPoint::parse(" 27.8974 ", "78.0880").unwrap();
        assert_eq!(p.lat(), 27.8974);
        assert_eq!(p.to_point(), Point::new(78.0880, 27.8974));
    }

    #[test]
    fn extent_covers_all_features() {
        let square = |x0: f64, y0: f64| WardFeature {
            geometry: MultiPolygon::new(vec![polygon![
                (x: x0, y: y0),
                (x: x0 + 1.0, y: y0),
                (x: x0 + 1.0, y: y0 + 1.0),
                (x: x0, y: y0 + 1.0),
            ]]),
            properties: Properties::new(),
        };
        let collection = BoundaryCollection {
            kind: "FeatureCollection".into(),
            features: vec![square(0.0, 0.0), square(5.0, -3.0)],
            skipped: 0,
        };
        let extent = collection.extent().unwrap();
        assert_eq!(extent.min(), geo::Coord { x: 0.0, y: -3.0 });
        assert_eq!(extent.max(), geo::Coord { x: 6.0, y: 1.0 });

        let empty = BoundaryCollection {
            kind: "FeatureCollection".into(),
            features: Vec::new(),
            skipped: 0,
        };
        assert!(empty.extent().is_none());
    }
}
