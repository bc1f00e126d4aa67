use crate::config::AppConfig;
use crate::data::{load_boundaries, BoundaryFormat};
use crate::error::{CoordinateError, GeolocationError, LoadError};
use crate::geolocation::{Geolocator, PositionOptions};
use crate::kml::{KmlConverter, XmlKmlConverter};
use crate::locator::{ContainmentTest, GeoContainment, PointLocator};
use crate::map::{MapView, ShapeStyle};
use crate::palette::{PalettePicker, RandomPalette};
use crate::session::Session;
use crate::types::{BoundaryCollection, LookupOutcome, QueryPoint};
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const LOADED: &str = "Ward boundaries loaded successfully";
pub const DEFAULT_LOAD_FAILED: &str = "Error loading default boundaries";
pub const UPLOAD_FAILED: &str = "Error loading GeoJSON file. Please ensure it's a valid GeoJSON format.";
pub const NO_DATA: &str = "Please upload ward boundary data first";
pub const LOCATING: &str = "Getting your location...";
pub const NOT_IN_WARD_SELF: &str = "You are not within any defined ward boundary.";
pub const NOT_IN_WARD_COORDS: &str = "These coordinates are not within any defined ward boundary.";
pub const PERMISSION_DENIED: &str = "Location access denied. Please enable location services.";
pub const POSITION_UNAVAILABLE: &str = "Location unavailable. Please try again.";
pub const LOCATION_FAILED: &str = "Error getting location. Please try again.";
pub const INVALID_COORDINATES: &str = "Please enter valid coordinates";
pub const INVALID_RANGE: &str = "Invalid coordinates range";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Normal,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub kind: StatusKind,
}

/// Which actions a front end should currently offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub locate: bool,
    pub check: bool,
}

#[derive(Debug, Clone)]
struct StyleTemplate {
    weight: f64,
    opacity: f64,
    fill_opacity: f64,
}

/// Wires user actions to the loader, the locator and the map view, and keeps
/// the status line and control state a front end displays.
pub struct Controller<V: MapView> {
    view: V,
    session: Session,
    locator: PointLocator<Box<dyn ContainmentTest>>,
    kml: Box<dyn KmlConverter>,
    palette: Box<dyn PalettePicker>,
    geolocator: Box<dyn Geolocator>,
    default_file: PathBuf,
    style: StyleTemplate,
    locate_zoom: u8,
    position_options: PositionOptions,
    status: Status,
    controls: Controls,
    // Cleared by a failed manual load even though the old collection stays.
    data_usable: bool,
    lat_input: String,
    lon_input: String,
}

impl<V: MapView> Controller<V> {
    pub fn new(config: &AppConfig, mut view: V, geolocator: Box<dyn Geolocator>) -> Self {
        view.add_tile_layer(&config.map.tile_url, &config.map.attribution);
        Self {
            view,
            session: Session::new(),
            locator: PointLocator::new(Box::new(GeoContainment)),
            kml: Box::new(XmlKmlConverter),
            palette: Box::new(RandomPalette::new(config.map.palette.clone())),
            geolocator,
            default_file: config.boundaries.default_file.clone(),
            style: StyleTemplate {
                weight: config.map.weight,
                opacity: config.map.opacity,
                fill_opacity: config.map.fill_opacity,
            },
            locate_zoom: config.map.locate_zoom,
            position_options: PositionOptions {
                enable_high_accuracy: config.geolocation.enable_high_accuracy,
                timeout: config.geolocation.timeout(),
            },
            status: Status {
                message: String::new(),
                kind: StatusKind::Normal,
            },
            controls: Controls::default(),
            data_usable: false,
            lat_input: String::new(),
            lon_input: String::new(),
        }
    }

    pub fn with_palette(mut self, palette: Box<dyn PalettePicker>) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_kml_converter(mut self, kml: Box<dyn KmlConverter>) -> Self {
        self.kml = kml;
        self
    }

    pub fn with_containment(mut self, containment: Box<dyn ContainmentTest>) -> Self {
        self.locator = PointLocator::new(containment);
        self
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn controls(&self) -> Controls {
        self.controls
    }

    /// Queries the active collection without touching the map or status.
    pub fn lookup(&self, point: QueryPoint) -> LookupOutcome {
        self.locator.locate(point, self.session.boundaries())
    }

    /// Startup load of the configured default file. A failure is reported
    /// but leaves the controls as they were.
    pub async fn load_default(&mut self) -> bool {
        let path = self.default_file.clone();
        let result = match tokio::fs::read_to_string(&path).await {
            Ok(text) => self.parse(&path, &text),
            Err(e) => Err(LoadError::Io(e)),
        };

        match result {
            Ok(collection) => {
                self.install(collection);
                true
            }
            Err(e) => {
                error!("Error loading default boundaries from {:?}: {}", path, e);
                self.set_status(DEFAULT_LOAD_FAILED, StatusKind::Error);
                false
            }
        }
    }

    /// User-selected boundary file.
    pub async fn load_file(&mut self, path: &Path) -> bool {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => self.load_content(path, &text),
            Err(e) => {
                self.reject_upload(path, LoadError::Io(e));
                false
            }
        }
    }

    /// Loads already-read file content; the format comes from `name`.
    pub fn load_content(&mut self, name: &Path, text: &str) -> bool {
        match self.parse(name, text) {
            Ok(collection) => {
                self.install(collection);
                true
            }
            Err(e) => {
                self.reject_upload(name, e);
                false
            }
        }
    }

    pub async fn locate_me(&mut self) -> Option<LookupOutcome> {
        if !self.session.has_data() {
            self.set_status(NO_DATA, StatusKind::Error);
            return None;
        }

        self.set_status(LOCATING, StatusKind::Normal);

        let options = self.position_options;
        let position = match tokio::time::timeout(
            options.timeout,
            self.geolocator.current_position(options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GeolocationError::Timeout(options.timeout.as_millis() as u64)),
        };

        match position {
            Ok(point) => {
                let outcome = self.show_point(point);
                match &outcome {
                    LookupOutcome::Found(label) => {
                        self.set_status(format!("You are in {}", label), StatusKind::Normal)
                    }
                    LookupOutcome::NotFound => self.set_status(NOT_IN_WARD_SELF, StatusKind::Error),
                    LookupOutcome::NoData => self.set_status(NO_DATA, StatusKind::Error),
                }
                Some(outcome)
            }
            Err(e) => {
                error!("Geolocation error: {}", e);
                let message = match e {
                    GeolocationError::PermissionDenied => PERMISSION_DENIED,
                    GeolocationError::PositionUnavailable => POSITION_UNAVAILABLE,
                    GeolocationError::Timeout(_) | GeolocationError::Other(_) => LOCATION_FAILED,
                };
                self.set_status(message, StatusKind::Error);
                None
            }
        }
    }

    pub fn set_latitude_input(&mut self, text: impl Into<String>) {
        self.lat_input = text.into();
        self.refresh_controls();
    }

    pub fn set_longitude_input(&mut self, text: impl Into<String>) {
        self.lon_input = text.into();
        self.refresh_controls();
    }

    pub fn check_coordinates(&mut self) -> Option<LookupOutcome> {
        let point = match QueryPoint::parse(&self.lat_input, &self.lon_input) {
            Ok(point) => point,
            Err(e) => {
                error!(
                    "Rejected coordinates ({:?}, {:?}): {}",
                    self.lat_input, self.lon_input, e
                );
                let message = match e {
                    CoordinateError::NotANumber => INVALID_COORDINATES,
                    CoordinateError::OutOfRange { .. } => INVALID_RANGE,
                };
                self.set_status(message, StatusKind::Error);
                return None;
            }
        };

        if !self.session.has_data() {
            self.set_status(NO_DATA, StatusKind::Error);
            return None;
        }

        let outcome = self.show_point(point);
        match &outcome {
            LookupOutcome::Found(label) => {
                self.set_status(format!("The coordinates are in {}", label), StatusKind::Normal)
            }
            LookupOutcome::NotFound => self.set_status(NOT_IN_WARD_COORDS, StatusKind::Error),
            LookupOutcome::NoData => self.set_status(NO_DATA, StatusKind::Error),
        }
        Some(outcome)
    }

    fn parse(&self, name: &Path, text: &str) -> Result<BoundaryCollection, LoadError> {
        load_boundaries(text, BoundaryFormat::from_path(name), self.kml.as_ref())
    }

    fn install(&mut self, collection: BoundaryCollection) {
        let styles: Vec<ShapeStyle> = (0..collection.len())
            .map(|_| ShapeStyle {
                color: self.palette.pick(),
                weight: self.style.weight,
                opacity: self.style.opacity,
                fill_opacity: self.style.fill_opacity,
            })
            .collect();

        let count = collection.len();
        if let Some(extent) = self.session.install(collection, styles, &mut self.view) {
            self.view.fit_bounds(extent);
        }
        info!("Installed {} ward boundaries", count);

        self.data_usable = true;
        self.refresh_controls();
        self.set_status(LOADED, StatusKind::Normal);
    }

    fn reject_upload(&mut self, name: &Path, e: LoadError) {
        error!("Error loading boundaries from {:?}: {}", name, e);
        self.data_usable = false;
        self.refresh_controls();
        self.set_status(UPLOAD_FAILED, StatusKind::Error);
    }

    fn show_point(&mut self, point: QueryPoint) -> LookupOutcome {
        self.session.place_marker(point, &mut self.view);
        self.view.set_view(point, self.locate_zoom);
        self.lookup(point)
    }

    fn refresh_controls(&mut self) {
        let inputs_valid = QueryPoint::parse(&self.lat_input, &self.lon_input).is_ok();
        self.controls = Controls {
            locate: self.data_usable,
            check: self.data_usable && inputs_valid,
        };
    }

    fn set_status(&mut self, message: impl Into<String>, kind: StatusKind) {
        self.status = Status {
            message: message.into(),
            kind,
        };
    }
}
