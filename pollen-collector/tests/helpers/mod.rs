//! Test Helper Utilities
//!
//! Shared utilities for testing pollen-collector

#![allow(dead_code)]

pub mod db_utils;
pub mod mock_sources;
pub mod upstream;

// Re-export commonly used items
pub use db_utils::{create_test_db, day, fetch_all_rows, SampleRow};
pub use mock_sources::{MockFeed, MockPrediction, MockScrape};
pub use upstream::{chart_page, rss_document, spawn_upstream};
