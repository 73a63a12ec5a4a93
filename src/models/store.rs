use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status reported by a single poll of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Active,
    Inactive,
}

impl StoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreStatus::Active => "active",
            StoreStatus::Inactive => "inactive",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, StoreStatus::Active)
    }
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(StoreStatus::Active),
            "inactive" => Ok(StoreStatus::Inactive),
            other => Err(format!("unknown store status '{other}'")),
        }
    }
}

/// A timestamped status poll for one store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub store_id: String,
    pub status: StoreStatus,
    pub timestamp: DateTime<Utc>,
}

/// One row of a store's weekly business-hours table.
///
/// `day_of_week` is 0 for Monday through 6 for Sunday, and both times are
/// wall-clock times in the store's own zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHourRule {
    pub store_id: String,
    pub day_of_week: u8,
    pub start_local: NaiveTime,
    pub end_local: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeZoneAssignment {
    pub store_id: String,
    /// IANA identifier, e.g. `America/New_York`
    pub zone: String,
}

/// Read-only snapshot of all three input feeds.
///
/// A report run owns its own copy, so the cache can be reloaded while a
/// report is being computed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub observations: Vec<Observation>,
    pub business_hours: Vec<BusinessHourRule>,
    pub timezones: Vec<TimeZoneAssignment>,
}

impl Dataset {
    /// The instant every report window ends at: the latest observation seen
    pub fn reference_instant(&self) -> Option<DateTime<Utc>> {
        self.observations.iter().map(|o| o.timestamp).max()
    }

    /// Distinct store ids present in the observation feed, sorted
    pub fn store_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .observations
            .iter()
            .map(|o| o.store_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty() && self.business_hours.is_empty() && self.timezones.is_empty()
    }
}

/// Row counts of a loaded dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub observations: u64,
    pub business_hours: u64,
    pub timezones: u64,
    pub stores: u64,
}
