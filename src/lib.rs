pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod geolocation;
pub mod kml;
pub mod label;
pub mod locator;
pub mod map;
pub mod palette;
pub mod render;
pub mod session;
pub mod types;
