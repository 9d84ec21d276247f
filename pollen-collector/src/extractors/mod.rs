//! Extraction stages for upstream documents that are not machine-readable
//! as delivered

pub mod chart_script;

pub use chart_script::{extract_series, ChartSeries};
