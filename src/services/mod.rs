//! Service layer
//!
//! This module provides the GeoIP lookup service consumed by the outer
//! interfaces (HTTP layer, CLI).

pub mod geoip;

pub use geoip::{CountryInfo, GeoIpService, MaxMindGeoIpService, MockGeoIpService};
