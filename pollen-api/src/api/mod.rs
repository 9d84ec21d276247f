//! HTTP API handlers for pollen-api

pub mod health;
pub mod locations;
pub mod pollen;
pub mod pollen_types;

pub use health::health_routes;
pub use locations::location_routes;
pub use pollen::pollen_routes;
pub use pollen_types::pollen_type_routes;
