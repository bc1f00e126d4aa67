use crate::error::LoadError;
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Converts KML text into the feature-collection shape the loader expects.
pub trait KmlConverter {
    fn convert(&self, text: &str) -> Result<FeatureCollection, LoadError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XmlKmlConverter;

impl KmlConverter for XmlKmlConverter {
    fn convert(&self, text: &str) -> Result<FeatureCollection, LoadError> {
        kml_to_geojson(text)
    }
}

#[derive(Default)]
struct PlacemarkBuilder {
    id: Option<String>,
    properties: JsonObject,
    geometries: Vec<Geometry>,
}

impl PlacemarkBuilder {
    fn finish(self) -> Feature {
        let mut geometries = self.geometries;
        let geometry = match geometries.len() {
            0 => None,
            1 => geometries.pop(),
            _ => Some(Geometry::new(Value::GeometryCollection(geometries))),
        };
        Feature {
            bbox: None,
            geometry,
            id: self.id.map(Id::String),
            properties: Some(self.properties),
            foreign_members: None,
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Ring {
    Outer,
    Inner,
}

struct PolygonBuilder {
    outer: Option<Vec<Vec<f64>>>,
    inner: Vec<Vec<Vec<f64>>>,
    ring: Option<Ring>,
}

/// Every `Placemark` becomes one feature, in document order, whatever
/// `Document`/`Folder` nesting surrounds it. Properties carry the placemark's
/// `name`, `description`, `styleUrl` and any `ExtendedData` entries. A
/// placemark holding several geometries (directly or through `MultiGeometry`)
/// gets a `GeometryCollection`.
pub fn kml_to_geojson(text: &str) -> Result<FeatureCollection, LoadError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut text_buf = String::new();
    let mut saw_root = false;

    let mut features = Vec::new();
    let mut placemark: Option<PlacemarkBuilder> = None;
    let mut polygon: Option<PolygonBuilder> = None;
    let mut data_name: Option<String> = None;

    loop {
        let (start, end) = match reader.read_event()? {
            Event::Start(e) => (Some(e.into_owned()), false),
            Event::Empty(e) => (Some(e.into_owned()), true),
            Event::End(_) => (None, true),
            Event::Text(e) => {
                text_buf.push_str(&e.unescape()?);
                continue;
            }
            Event::CData(e) => {
                text_buf.push_str(&String::from_utf8_lossy(&e));
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        if let Some(e) = start {
            let name = local_name(&e);
            if stack.is_empty() {
                if name != "kml" {
                    return Err(LoadError::malformed(format!(
                        "expected a <kml> root element, found <{}>",
                        name
                    )));
                }
                saw_root = true;
            }
            text_buf.clear();

            match name.as_str() {
                "Placemark" => {
                    placemark = Some(PlacemarkBuilder {
                        id: attribute(&e, "id")?,
                        ..Default::default()
                    });
                }
                "Polygon" if placemark.is_some() => {
                    polygon = Some(PolygonBuilder {
                        outer: None,
                        inner: Vec::new(),
                        ring: None,
                    });
                }
                "outerBoundaryIs" => {
                    if let Some(p) = polygon.as_mut() {
                        p.ring = Some(Ring::Outer);
                    }
                }
                "innerBoundaryIs" => {
                    if let Some(p) = polygon.as_mut() {
                        p.ring = Some(Ring::Inner);
                    }
                }
                "Data" | "SimpleData" => data_name = attribute(&e, "name")?,
                _ => {}
            }
            stack.push(name);
            if !end {
                continue;
            }
        }

        // Closing tag (or the second half of an empty element).
        let Some(name) = stack.pop() else {
            return Err(LoadError::malformed("unbalanced closing tag"));
        };
        let content = std::mem::take(&mut text_buf);
        let content = content.trim();
        let parent = stack.last().map(String::as_str);

        match name.as_str() {
            "Placemark" => {
                if let Some(builder) = placemark.take() {
                    features.push(builder.finish());
                }
            }
            "coordinates" => {
                let positions = parse_coordinates(content)?;
                handle_coordinates(parent, &stack, positions, &mut placemark, &mut polygon)?;
            }
            "Polygon" => {
                if let (Some(p), Some(builder)) = (polygon.take(), placemark.as_mut()) {
                    let Some(outer) = p.outer else {
                        return Err(LoadError::malformed("Polygon without an outer boundary"));
                    };
                    let mut rings = vec![outer];
                    rings.extend(p.inner);
                    builder.geometries.push(Geometry::new(Value::Polygon(rings)));
                }
            }
            "outerBoundaryIs" | "innerBoundaryIs" => {
                if let Some(p) = polygon.as_mut() {
                    p.ring = None;
                }
            }
            "name" | "description" | "styleUrl" if parent == Some("Placemark") => {
                if let Some(builder) = placemark.as_mut() {
                    builder
                        .properties
                        .insert(name.clone(), serde_json::Value::String(content.to_string()));
                }
            }
            "value" if parent == Some("Data") => {
                if let (Some(key), Some(builder)) = (data_name.as_ref(), placemark.as_mut()) {
                    builder
                        .properties
                        .insert(key.clone(), serde_json::Value::String(content.to_string()));
                }
            }
            "SimpleData" => {
                if let (Some(key), Some(builder)) = (data_name.take(), placemark.as_mut()) {
                    builder
                        .properties
                        .insert(key, serde_json::Value::String(content.to_string()));
                }
            }
            "Data" => data_name = None,
            _ => {}
        }
    }

    if !saw_root {
        return Err(LoadError::malformed("document has no <kml> root element"));
    }
    if !stack.is_empty() {
        return Err(LoadError::malformed(format!(
            "unexpected end of document inside <{}>",
            stack.join("/")
        )));
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn handle_coordinates(
    parent: Option<&str>,
    stack: &[String],
    positions: Vec<Vec<f64>>,
    placemark: &mut Option<PlacemarkBuilder>,
    polygon: &mut Option<PolygonBuilder>,
) -> Result<(), LoadError> {
    let Some(builder) = placemark.as_mut() else {
        return Ok(());
    };
    match parent {
        Some("LinearRing") if stack.iter().any(|s| s == "Polygon") => {
            let Some(p) = polygon.as_mut() else {
                return Ok(());
            };
            match p.ring {
                Some(Ring::Outer) => p.outer = Some(positions),
                Some(Ring::Inner) => p.inner.push(positions),
                None => return Err(LoadError::malformed("LinearRing outside a boundary")),
            }
        }
        Some("LinearRing") | Some("LineString") => {
            builder
                .geometries
                .push(Geometry::new(Value::LineString(positions)));
        }
        Some("Point") => {
            let Some(first) = positions.into_iter().next() else {
                return Err(LoadError::malformed("Point without coordinates"));
            };
            builder.geometries.push(Geometry::new(Value::Point(first)));
        }
        _ => {}
    }
    Ok(())
}

/// Parses a KML `<coordinates>` body: whitespace separated `lon,lat[,alt]` tuples.
fn parse_coordinates(text: &str) -> Result<Vec<Vec<f64>>, LoadError> {
    text.split_whitespace()
        .map(|tuple| {
            let position = tuple
                .split(',')
                .filter(|part| !part.is_empty())
                .map(|part| part.parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|_| LoadError::malformed(format!("bad coordinate tuple '{}'", tuple)))?;
            // f64 parsing accepts NaN and inf.
            if position.iter().any(|v| !v.is_finite()) {
                return Err(LoadError::malformed(format!(
                    "non-finite coordinate in '{}'",
                    tuple
                )));
            }
            if position.len() < 2 {
                return Err(LoadError::malformed(format!(
                    "coordinate tuple '{}' needs at least lon,lat",
                    tuple
                )));
            }
            Ok(position)
        })
        .collect()
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attribute(e: &BytesStart, key: &str) -> Result<Option<String>, LoadError> {
    let attr = e.try_get_attribute(key).map_err(quick_xml::Error::from)?;
    match attr {
        Some(a) => Ok(Some(a.unescape_value()?.to_string())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WARDS: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>Test wards</name>
    <Folder>
      <Placemark id="w5">
        <name>Ward 5</name>
        <ExtendedData>
          <Data name="population"><value>1200</value></Data>
          <SchemaData schemaUrl="#s"><SimpleData name="zone">North</SimpleData></SchemaData>
        </ExtendedData>
        <Polygon>
          <outerBoundaryIs>
            <LinearRing>
              <coordinates>
                78.0,27.8,0 78.2,27.8,0 78.2,28.0,0 78.0,28.0,0 78.0,27.8,0
              </coordinates>
            </LinearRing>
          </outerBoundaryIs>
          <innerBoundaryIs>
            <LinearRing>
              <coordinates>78.05,27.85 78.06,27.85 78.06,27.86 78.05,27.85</coordinates>
            </LinearRing>
          </innerBoundaryIs>
        </Polygon>
      </Placemark>
    </Folder>
    <Placemark>
      <name><![CDATA[Ward & Co]]></name>
      <MultiGeometry>
        <Polygon><outerBoundaryIs><LinearRing><coordinates>1,1 2,1 2,2 1,1</coordinates></LinearRing></outerBoundaryIs></Polygon>
        <Point><coordinates>1.5,1.5</coordinates></Point>
      </MultiGeometry>
    </Placemark>
  </Document>
</kml>"##;

    #[test]
    fn converts_placemarks_in_document_order() {
        let fc = kml_to_geojson(WARDS).unwrap();
        assert_eq!(fc.features.len(), 2);

        let first = &fc.features[0];
        let props = first.properties.as_ref().unwrap();
        assert_eq!(props["name"], "Ward 5");
        assert_eq!(props["population"], "1200");
        assert_eq!(props["zone"], "North");
        assert_eq!(first.id, Some(Id::String("w5".into())));

        match &first.geometry.as_ref().unwrap().value {
            Value::Polygon(rings) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[0][1], vec![78.2, 27.8, 0.0]);
            }
            other => panic!("expected polygon, got {:?}", other),
        }

        let second = &fc.features[1];
        assert_eq!(second.properties.as_ref().unwrap()["name"], "Ward & Co");
        match &second.geometry.as_ref().unwrap().value {
            Value::GeometryCollection(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected geometry collection, got {:?}", other),
        }
    }

    #[test]
    fn document_name_is_not_a_feature_property() {
        let fc = kml_to_geojson(WARDS).unwrap();
        let document_name = serde_json::Value::from("Test wards");
        assert!(fc
            .features
            .iter()
            .all(|f| f.properties.as_ref().unwrap().get("name") != Some(&document_name)));
    }

    #[test]
    fn rejects_non_kml_root() {
        let err = kml_to_geojson("<gpx><trk/></gpx>").unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn rejects_broken_xml() {
        assert!(kml_to_geojson("<kml><Placemark></kml>").is_err());
        assert!(kml_to_geojson("").is_err());
    }

    #[test]
    fn rejects_bad_coordinates() {
        let text = "<kml><Placemark><Point><coordinates>abc,1</coordinates></Point></Placemark></kml>";
        assert!(matches!(
            kml_to_geojson(text),
            Err(LoadError::Malformed { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        for coords in ["NaN,NaN", "78.0,inf", "-infinity,27.9"] {
            let text = format!(
                "<kml><Placemark><Polygon><outerBoundaryIs><LinearRing>\
                 <coordinates>0,0 1,0 {} 0,0</coordinates>\
                 </LinearRing></outerBoundaryIs></Polygon></Placemark></kml>",
                coords
            );
            assert!(
                matches!(kml_to_geojson(&text), Err(LoadError::Malformed { .. })),
                "{}",
                coords
            );
        }
    }

    #[test]
    fn placemark_without_geometry_has_none() {
        let text = "<kml><Placemark><name>Empty</name></Placemark></kml>";
        let fc = XmlKmlConverter.convert(text).unwrap();
        assert_eq!(fc.features.len(), 1);
        assert!(fc.features[0].geometry.is_none());
    }
}
