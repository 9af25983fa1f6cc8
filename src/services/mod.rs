//! Service layer
//!
//! Geo lookup backends shared by the HTTP API and the database updater.

pub mod geoip;

pub use geoip::{DatabaseOpener, GeoIpLookup, GeoRecord, MaxMindOpener, MaxMindProvider};
