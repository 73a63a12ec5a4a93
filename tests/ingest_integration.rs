//! Integration tests for loading CSV feeds into storage and reporting on them

use chrono::{TimeZone, Utc};
use chrono_tz::America::Chicago;
use std::path::Path;
use std::sync::Arc;
use storewatch::engine::ReportEngine;
use storewatch::ingest::{load_directory, BUSINESS_HOURS_FILE, STATUS_FILE, TIMEZONES_FILE};
use storewatch::storage::{SqliteStorage, Storage};
use tempfile::TempDir;

const STATUS_CSV: &str = "\
store_id,status,timestamp_utc
store_1,active,2024-10-14 17:00:00 UTC
store_1,inactive,2024-10-14 18:00:00.512 UTC
store_2,active,2024-10-14 18:00:00 UTC
store_2,active,2024-10-14 19:00:00 UTC
";

const HOURS_CSV: &str = "\
store_id,dayOfWeek,start_time_local,end_time_local
store_1,0,09:00:00,17:00:00
store_1,1,09:00:00,17:00:00
";

const ZONES_CSV: &str = "\
store_id,timezone_str
store_1,America/New_York
";

/// Helper to create SQLite test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

#[tokio::test]
async fn test_load_all_feeds() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), STATUS_FILE, STATUS_CSV);
    write(dir.path(), BUSINESS_HOURS_FILE, HOURS_CSV);
    write(dir.path(), TIMEZONES_FILE, ZONES_CSV);

    let storage = create_test_storage().await;
    let counts = load_directory(storage.as_ref(), dir.path()).await.unwrap();

    assert_eq!(counts.observations, 4);
    assert_eq!(counts.business_hours, 2);
    assert_eq!(counts.timezones, 1);
    assert_eq!(counts.stores, 2);
    assert_eq!(
        storage.reference_instant().await.unwrap(),
        Some(Utc.with_ymd_and_hms(2024, 10, 14, 19, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_optional_feeds_may_be_missing() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), STATUS_FILE, STATUS_CSV);

    let storage = create_test_storage().await;
    let counts = load_directory(storage.as_ref(), dir.path()).await.unwrap();

    assert_eq!(counts.observations, 4);
    assert_eq!(counts.business_hours, 0);
    assert_eq!(counts.timezones, 0);

    // Without hours every store is open around the clock
    let dataset = storage.snapshot().await.unwrap();
    let report = ReportEngine::new(Chicago).build_report(&dataset).unwrap();
    let store_2 = &report.rows[1];
    assert_eq!(store_2.store_id, "store_2");
    assert_eq!(store_2.uptime_last_hour, 2.0);
    assert_eq!(store_2.downtime_last_hour, 0.0);
}

#[tokio::test]
async fn test_missing_status_feed_is_an_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), BUSINESS_HOURS_FILE, HOURS_CSV);

    let storage = create_test_storage().await;
    let err = load_directory(storage.as_ref(), dir.path()).await.unwrap_err();

    assert!(format!("{err:#}").contains(STATUS_FILE));
    assert_eq!(storage.counts().await.unwrap().observations, 0);
}

#[tokio::test]
async fn test_bad_row_leaves_previous_data_in_place() {
    let good = TempDir::new().unwrap();
    write(good.path(), STATUS_FILE, STATUS_CSV);

    let storage = create_test_storage().await;
    load_directory(storage.as_ref(), good.path()).await.unwrap();

    let bad = TempDir::new().unwrap();
    write(
        bad.path(),
        STATUS_FILE,
        "store_id,status,timestamp_utc\nstore_9,active,yesterday\n",
    );

    let err = load_directory(storage.as_ref(), bad.path()).await.unwrap_err();
    assert!(format!("{err:#}").contains("line 2"));
    assert_eq!(storage.counts().await.unwrap().observations, 4);
}

#[tokio::test]
async fn test_reload_replaces_dataset() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), STATUS_FILE, STATUS_CSV);
    write(dir.path(), TIMEZONES_FILE, ZONES_CSV);

    let storage = create_test_storage().await;
    load_directory(storage.as_ref(), dir.path()).await.unwrap();

    write(
        dir.path(),
        STATUS_FILE,
        "store_id,status,timestamp_utc\nstore_3,inactive,2024-10-15 08:00:00 UTC\n",
    );
    std::fs::remove_file(dir.path().join(TIMEZONES_FILE)).unwrap();

    let counts = load_directory(storage.as_ref(), dir.path()).await.unwrap();
    assert_eq!(counts.observations, 1);
    assert_eq!(counts.timezones, 0);
    assert_eq!(storage.store_ids().await.unwrap(), vec!["store_3"]);
}

#[tokio::test]
async fn test_loaded_data_reports_in_local_time() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), STATUS_FILE, STATUS_CSV);
    write(dir.path(), BUSINESS_HOURS_FILE, HOURS_CSV);
    write(dir.path(), TIMEZONES_FILE, ZONES_CSV);

    let storage = create_test_storage().await;
    load_directory(storage.as_ref(), dir.path()).await.unwrap();

    let dataset = storage.snapshot().await.unwrap();
    let report = ReportEngine::new(Chicago).build_report(&dataset).unwrap();

    // store_1 is open 13:00-21:00 UTC on Monday in New York
    let store_1 = &report.rows[0];
    assert_eq!(store_1.uptime_last_day, 1.0);
    assert_eq!(store_1.downtime_last_day, 1.0);
    assert_eq!(store_1.uptime_last_hour, 0.0);
}
