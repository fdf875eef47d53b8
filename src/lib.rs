//! micro-geoip - IP to country lookups backed by a MaxMind DB
//!
//! The database is downloaded from MaxMind (with a license key) or DB-IP,
//! validated, swapped in without blocking readers, and refreshed on a
//! fixed schedule.
//!
//! # Architecture
//! - `services`: GeoIP service, acquisition and hot-swap store
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging setup

pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod system;
pub mod utils;
