//! Loading of the three CSV feeds into the relational cache
//!
//! The status feed is required. The business-hours and time-zone feeds are
//! optional: without them every store is treated as 24/7 in the default zone.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::engine::time::{parse_local_time, parse_timestamp};
use crate::models::{
    BusinessHourRule, Dataset, DatasetCounts, Observation, StoreStatus, TimeZoneAssignment,
};
use crate::storage::Storage;

pub const STATUS_FILE: &str = "store_status.csv";
pub const BUSINESS_HOURS_FILE: &str = "menu_hours.csv";
pub const TIMEZONES_FILE: &str = "timezones.csv";

#[derive(Debug, Deserialize)]
struct StatusRecord {
    store_id: String,
    status: String,
    timestamp_utc: String,
}

#[derive(Debug, Deserialize)]
struct BusinessHoursRecord {
    store_id: String,
    #[serde(rename = "dayOfWeek", alias = "day_of_week", alias = "day")]
    day_of_week: i64,
    start_time_local: String,
    end_time_local: String,
}

#[derive(Debug, Deserialize)]
struct TimezoneRecord {
    store_id: String,
    timezone_str: String,
}

/// Read `store_status.csv`, `menu_hours.csv` and `timezones.csv` from `dir`
pub fn read_dataset(dir: &Path) -> Result<Dataset> {
    let status_path = dir.join(STATUS_FILE);
    let file = std::fs::File::open(&status_path)
        .with_context(|| format!("failed to open {}", status_path.display()))?;
    let observations = read_observations(file)
        .with_context(|| format!("failed to read {}", status_path.display()))?;

    let hours_path = dir.join(BUSINESS_HOURS_FILE);
    let business_hours = if hours_path.exists() {
        let file = std::fs::File::open(&hours_path)
            .with_context(|| format!("failed to open {}", hours_path.display()))?;
        read_business_hours(file)
            .with_context(|| format!("failed to read {}", hours_path.display()))?
    } else {
        warn!("{} not found, treating every store as open 24/7", hours_path.display());
        Vec::new()
    };

    let zones_path = dir.join(TIMEZONES_FILE);
    let timezones = if zones_path.exists() {
        let file = std::fs::File::open(&zones_path)
            .with_context(|| format!("failed to open {}", zones_path.display()))?;
        read_timezones(file)
            .with_context(|| format!("failed to read {}", zones_path.display()))?
    } else {
        warn!("{} not found, every store uses the default zone", zones_path.display());
        Vec::new()
    };

    Ok(Dataset {
        observations,
        business_hours,
        timezones,
    })
}

/// Line number of the data row at `index`, counting the header as line 1
fn line(index: usize) -> usize {
    index + 2
}

pub fn read_observations<R: Read>(reader: R) -> Result<Vec<Observation>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut observations = Vec::new();

    for (i, record) in csv.deserialize::<StatusRecord>().enumerate() {
        let record = record.with_context(|| format!("line {}", line(i)))?;
        let status: StoreStatus = record
            .status
            .parse()
            .map_err(|e: String| anyhow!("line {}: {e}", line(i)))?;
        let timestamp = parse_timestamp(&record.timestamp_utc).ok_or_else(|| {
            anyhow!("line {}: invalid timestamp '{}'", line(i), record.timestamp_utc)
        })?;

        observations.push(Observation {
            store_id: record.store_id,
            status,
            timestamp,
        });
    }

    Ok(observations)
}

pub fn read_business_hours<R: Read>(reader: R) -> Result<Vec<BusinessHourRule>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rules = Vec::new();

    for (i, record) in csv.deserialize::<BusinessHoursRecord>().enumerate() {
        let record = record.with_context(|| format!("line {}", line(i)))?;
        let day_of_week = u8::try_from(record.day_of_week)
            .ok()
            .filter(|d| *d <= 6)
            .ok_or_else(|| anyhow!("line {}: day of week {} outside 0..6", line(i), record.day_of_week))?;
        let start_local = parse_local_time(&record.start_time_local).ok_or_else(|| {
            anyhow!("line {}: invalid start time '{}'", line(i), record.start_time_local)
        })?;
        let end_local = parse_local_time(&record.end_time_local).ok_or_else(|| {
            anyhow!("line {}: invalid end time '{}'", line(i), record.end_time_local)
        })?;

        rules.push(BusinessHourRule {
            store_id: record.store_id,
            day_of_week,
            start_local,
            end_local,
        });
    }

    Ok(rules)
}

pub fn read_timezones<R: Read>(reader: R) -> Result<Vec<TimeZoneAssignment>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut zones = Vec::new();

    for (i, record) in csv.deserialize::<TimezoneRecord>().enumerate() {
        let record = record.with_context(|| format!("line {}", line(i)))?;
        zones.push(TimeZoneAssignment {
            store_id: record.store_id,
            zone: record.timezone_str,
        });
    }

    Ok(zones)
}

/// Parse the CSV feeds in `dir` and replace the cached dataset with them
pub async fn load_directory(storage: &dyn Storage, dir: &Path) -> Result<DatasetCounts> {
    info!("Loading CSV data from {}", dir.display());

    let owned_dir = dir.to_path_buf();
    let dataset = tokio::task::spawn_blocking(move || read_dataset(&owned_dir))
        .await
        .context("CSV reader task failed")??;

    let counts = storage
        .replace_dataset(&dataset)
        .await
        .context("failed to store loaded dataset")?;

    if let Some(reference) = dataset.reference_instant() {
        info!("Reference instant set to {}", reference);
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone, Utc};

    #[test]
    fn test_read_observations() {
        let data = "\
store_id,status,timestamp_utc
store_1,active,2024-10-14 10:00:00 UTC
store_1,inactive,2023-01-22 12:09:39.388884 UTC
";
        let observations = read_observations(data.as_bytes()).unwrap();

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].status, StoreStatus::Active);
        assert_eq!(
            observations[0].timestamp,
            Utc.with_ymd_and_hms(2024, 10, 14, 10, 0, 0).unwrap()
        );
        assert_eq!(observations[1].status, StoreStatus::Inactive);
    }

    #[test]
    fn test_columns_in_any_order() {
        let data = "\
timestamp_utc,store_id,status
2024-10-14 10:00:00 UTC,s,active
";
        let observations = read_observations(data.as_bytes()).unwrap();
        assert_eq!(observations[0].store_id, "s");
    }

    #[test]
    fn test_bad_status_reports_line() {
        let data = "\
store_id,status,timestamp_utc
store_1,active,2024-10-14 10:00:00 UTC
store_1,sleeping,2024-10-14 11:00:00 UTC
";
        let err = read_observations(data.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
    }

    #[test]
    fn test_read_business_hours() {
        let data = "\
store_id,dayOfWeek,start_time_local,end_time_local
store_1,0,09:00:00,17:00:00
store_1,6,10:30:00,14:00:00
";
        let rules = read_business_hours(data.as_bytes()).unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].day_of_week, 6);
        assert_eq!(rules[1].start_local, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    }

    #[test]
    fn test_day_of_week_out_of_range() {
        let data = "\
store_id,dayOfWeek,start_time_local,end_time_local
store_1,7,09:00:00,17:00:00
";
        let err = read_business_hours(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("outside 0..6"));
    }

    #[test]
    fn test_read_timezones() {
        let data = "\
store_id,timezone_str
store_1,America/New_York
";
        let zones = read_timezones(data.as_bytes()).unwrap();
        assert_eq!(zones[0].zone, "America/New_York");
    }
}
