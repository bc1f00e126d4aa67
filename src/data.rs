use crate::error::LoadError;
use crate::kml::KmlConverter;
use crate::types::{BoundaryCollection, Properties, WardFeature};
use geo::{Geometry, MultiPolygon};
use geojson::{FeatureCollection, GeoJson};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryFormat {
    Kml,
    GeoJson,
}

impl BoundaryFormat {
    /// `.kml` (any case) is KML; everything else is read as GeoJSON.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s: &str| s.to_lowercase());

        match extension.as_deref() {
            Some("kml") => BoundaryFormat::Kml,
            _ => BoundaryFormat::GeoJson,
        }
    }
}

pub fn load_boundaries(
    content: &str,
    format: BoundaryFormat,
    kml: &dyn KmlConverter,
) -> Result<BoundaryCollection, LoadError> {
    let (kind, collection) = match format {
        BoundaryFormat::Kml => ("FeatureCollection".to_string(), kml.convert(content)?),
        BoundaryFormat::GeoJson => parse_geojson(content)?,
    };

    let collection = into_boundaries(kind, collection)?;
    info!(
        "Loaded {} ward polygons ({} features skipped)",
        collection.len(),
        collection.skipped
    );
    Ok(collection)
}

fn parse_geojson(content: &str) -> Result<(String, FeatureCollection), LoadError> {
    let value: serde_json::Value = serde_json::from_str(content)?;

    // The shape check comes before any GeoJSON decoding.
    let kind = match value.get("type") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(LoadError::malformed("missing 'type' member")),
    };
    if value.get("features").map_or(true, |f| f.is_null()) {
        return Err(LoadError::malformed("missing 'features' member"));
    }

    match GeoJson::from_json_value(value)? {
        GeoJson::FeatureCollection(fc) => Ok((kind, fc)),
        _ => Err(LoadError::malformed("GeoJSON must be a FeatureCollection")),
    }
}

fn into_boundaries(kind: String, collection: FeatureCollection) -> Result<BoundaryCollection, LoadError> {
    let mut features = Vec::new();
    let mut skipped = 0;

    for (index, feature) in collection.features.into_iter().enumerate() {
        let properties: Properties = feature.properties.unwrap_or_default();

        let geometry = match feature.geometry {
            Some(geo) => {
                let valid_geo: Geometry<f64> = geo.value.try_into().map_err(|e| {
                    LoadError::malformed(format!("feature {}: bad geometry: {}", index, e))
                })?;
                polygonal(valid_geo)
            }
            None => None,
        };

        match geometry {
            Some(geometry) => features.push(WardFeature {
                geometry,
                properties,
            }),
            None => {
                warn!("Skipping feature {} without polygon geometry", index);
                skipped += 1;
            }
        }
    }

    Ok(BoundaryCollection {
        kind,
        features,
        skipped,
    })
}

/// Keeps the polygonal part of a geometry. Collections contribute all of
/// their polygons; anything without area yields `None`.
fn polygonal(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    collect_polygons(geometry, &mut polygons);
    if polygons.is_empty() {
        None
    } else {
        Some(MultiPolygon::new(polygons))
    }
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<geo::Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}
