//! # Pollen Common Library
//!
//! Shared code for the pollen collector and the pollen API including:
//! - Domain model (pollen types, locations, samples)
//! - The SQLite time-series store and its merge contract
//! - TOML configuration loading and logging setup
//! - Calendar-day helpers

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod time;

pub use error::{Error, Result};
pub use model::{Location, PollenSample, PollenType, SampleKey};
