use crate::palette::DEFAULT_PALETTE;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub boundaries: BoundariesConfig,
    pub map: MapConfig,
    pub geolocation: GeolocationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BoundariesConfig {
    pub default_file: PathBuf,
}

impl Default for BoundariesConfig {
    fn default() -> Self {
        Self {
            default_file: PathBuf::from("data/wards.kml"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub tile_url: String,
    pub attribution: String,
    pub initial_center: [f64; 2], // lat, lon
    pub initial_zoom: u8,
    pub locate_zoom: u8,
    pub palette: Vec<String>, // Hex codes
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
    pub snapshot_width: u32,
    pub snapshot_height: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            initial_center: [20.5937, 78.9629],
            initial_zoom: 5,
            locate_zoom: 14,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            weight: 2.0,
            opacity: 0.7,
            fill_opacity: 0.3,
            snapshot_width: 1024,
            snapshot_height: 768,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Granted,
    Denied,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ConfiguredPosition {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeolocationConfig {
    pub timeout_secs: u64,
    pub enable_high_accuracy: bool,
    pub permission: Permission,
    pub position: Option<ConfiguredPosition>,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            enable_high_accuracy: true,
            permission: Permission::Granted,
            position: None,
        }
    }
}

impl GeolocationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Like [`AppConfig::load_from_file`], but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            info!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }
}
