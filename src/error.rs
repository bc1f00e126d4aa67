use thiserror::Error;

/// Reasons a boundary file is rejected. A failed load never touches the
/// active collection.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read boundary file: {0}")]
    Io(#[from] std::io::Error),

    #[error("KML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The document parsed but does not have the feature-collection shape.
    #[error("malformed input: {message}")]
    Malformed { message: String },
}

impl LoadError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("coordinates must be numbers")]
    NotANumber,

    #[error("coordinates out of range: lat {lat}, lon {lon}")]
    OutOfRange { lat: f64, lon: f64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("permission to read the device position was denied")]
    PermissionDenied,

    #[error("device position unavailable")]
    PositionUnavailable,

    #[error("timed out after {0} ms waiting for the device position")]
    Timeout(u64),

    #[error("geolocation failed: {0}")]
    Other(String),
}
