use crate::config::{GeolocationConfig, Permission};
use crate::error::GeolocationError;
use crate::types::QueryPoint;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Source of the device's current position.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self, options: PositionOptions) -> Result<QueryPoint, GeolocationError>;
}

/// Reports the position written in the `[geolocation]` config section.
pub struct ConfiguredGeolocator {
    permission: Permission,
    position: Option<(f64, f64)>,
}

impl ConfiguredGeolocator {
    pub fn from_config(config: &GeolocationConfig) -> Self {
        Self {
            permission: config.permission,
            position: config.position.map(|p| (p.lat, p.lon)),
        }
    }
}

#[async_trait]
impl Geolocator for ConfiguredGeolocator {
    async fn current_position(&self, _options: PositionOptions) -> Result<QueryPoint, GeolocationError> {
        if self.permission == Permission::Denied {
            return Err(GeolocationError::PermissionDenied);
        }
        let (lat, lon) = self.position.ok_or(GeolocationError::PositionUnavailable)?;
        QueryPoint::new(lat, lon).map_err(|e| GeolocationError::Other(e.to_string()))
    }
}
