//! SQLite time-series store
//!
//! - [`init`]: connection pools and idempotent schema creation
//! - [`samples`]: the merge (upsert) contract and sample lookups
//! - [`locations`]: location reference data

pub mod init;
pub mod locations;
pub mod samples;

pub use init::{connect_readonly, init_database, init_schema};
