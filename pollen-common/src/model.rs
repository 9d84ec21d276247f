//! Domain model shared by the collector and the API
//!
//! A [`PollenSample`] is identified by its [`SampleKey`]: the triple of
//! calendar day, pollen type and location. The observed and predicted counts
//! are written independently by different ingestion paths, so both are optional.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Pollen types tracked by the store
///
/// The discriminant is the value persisted in the `pollen_type` column and
/// exposed as `pollenid` by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollenType {
    Grass = 0,
    Birch = 1,
}

impl PollenType {
    /// Every supported pollen type, in id order
    pub const ALL: [PollenType; 2] = [PollenType::Grass, PollenType::Birch];

    /// Numeric id used by the store and the API
    pub fn id(self) -> i64 {
        self as i64
    }

    /// Look up a pollen type by its numeric id
    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    /// Lower-case name (`"grass"`, `"birch"`)
    pub fn key(self) -> &'static str {
        match self {
            PollenType::Grass => "grass",
            PollenType::Birch => "birch",
        }
    }
}

impl fmt::Display for PollenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollenType::Grass => write!(f, "Grass"),
            PollenType::Birch => write!(f, "Birch"),
        }
    }
}

impl FromStr for PollenType {
    type Err = Error;

    /// Parses the lower-case key. Case-sensitive on purpose: upstream sources
    /// that send anything else are treated as unknown.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.key() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown pollen type: {}", s)))
    }
}

/// A location where pollen is measured and predicted
///
/// Locations are reference data. Ingestion never creates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub city: String,
    pub country: String,
}

/// Identity of a sample row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleKey {
    pub date: NaiveDate,
    pub pollen_type: PollenType,
    pub location_id: i64,
}

impl SampleKey {
    pub fn new(date: NaiveDate, pollen_type: PollenType, location_id: i64) -> Self {
        Self { date, pollen_type, location_id }
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/location {}", self.date, self.pollen_type.key(), self.location_id)
    }
}

/// Canonical per-day, per-location, per-pollen-type sample
#[derive(Debug, Clone, PartialEq)]
pub struct PollenSample {
    pub date: NaiveDate,
    pub pollen_type: PollenType,
    pub location: Location,
    /// `None` until a measurement has been recorded
    pub observed_count: Option<i32>,
    /// `None` until a prediction has been recorded
    pub predicted_count: Option<f32>,
}

impl PollenSample {
    pub fn key(&self) -> SampleKey {
        SampleKey::new(self.date, self.pollen_type, self.location.id)
    }
}
