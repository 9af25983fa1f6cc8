//! ipgeo - IP geolocation service
//!
//! Answers "where is this IP" from a local MaxMind GeoLite2-City database and
//! keeps that database current: weekly freshness checks, authenticated
//! download, extraction, atomic publish and a hot swap that never leaves
//! in-flight queries without a handle.
//!
//! # Architecture
//! - `database`: fetch, extract, swap, update orchestration and scheduling
//! - `services`: geo lookup backends (MaxMind reader)
//! - `api`: HTTP services and middleware
//! - `interfaces`: CLI commands
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging

pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod errors;
pub mod interfaces;
pub mod runtime;
pub mod services;
pub mod system;
pub mod utils;
