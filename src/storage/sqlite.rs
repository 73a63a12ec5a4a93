use crate::engine::time::parse_local_time;
use crate::models::{
    BusinessHourRule, Dataset, DatasetCounts, Observation, StoreStatus, TimeZoneAssignment,
};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Rows per multi-value INSERT, well under SQLite's bind parameter limit
const INSERT_CHUNK: usize = 5_000;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn corrupt(table: &'static str, reason: impl Into<String>) -> StorageError {
    StorageError::CorruptRow {
        table,
        reason: reason.into(),
    }
}

async fn read_observations(conn: &mut SqliteConnection) -> StorageResult<Vec<Observation>> {
    let rows = sqlx::query_as::<_, (String, String, i64)>(
        r#"
        SELECT store_id, status, observed_at_us
        FROM store_status
        ORDER BY store_id, observed_at_us, id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(store_id, status, observed_at_us)| -> StorageResult<Observation> {
            let status = StoreStatus::from_str(&status).map_err(|e| corrupt("store_status", e))?;
            let timestamp = DateTime::from_timestamp_micros(observed_at_us).ok_or_else(|| {
                corrupt("store_status", format!("timestamp {observed_at_us} out of range"))
            })?;
            Ok(Observation {
                store_id,
                status,
                timestamp,
            })
        })
        .collect()
}

async fn read_business_hours(conn: &mut SqliteConnection) -> StorageResult<Vec<BusinessHourRule>> {
    let rows = sqlx::query_as::<_, (String, i64, String, String)>(
        r#"
        SELECT store_id, day_of_week, start_time_local, end_time_local
        FROM business_hours
        ORDER BY store_id, day_of_week, start_time_local, id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(store_id, day_of_week, start, end)| -> StorageResult<BusinessHourRule> {
            let day_of_week = u8::try_from(day_of_week)
                .ok()
                .filter(|d| *d <= 6)
                .ok_or_else(|| corrupt("business_hours", format!("day {day_of_week}")))?;
            let start_local = parse_local_time(&start)
                .ok_or_else(|| corrupt("business_hours", format!("start time '{start}'")))?;
            let end_local = parse_local_time(&end)
                .ok_or_else(|| corrupt("business_hours", format!("end time '{end}'")))?;
            Ok(BusinessHourRule {
                store_id,
                day_of_week,
                start_local,
                end_local,
            })
        })
        .collect()
}

async fn read_timezones(conn: &mut SqliteConnection) -> StorageResult<Vec<TimeZoneAssignment>> {
    let zones = sqlx::query_as::<_, (String, String)>(
        "SELECT store_id, timezone_str FROM timezones ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|(store_id, zone)| TimeZoneAssignment { store_id, zone })
    .collect();

    Ok(zones)
}

async fn read_counts(conn: &mut SqliteConnection) -> StorageResult<DatasetCounts> {
    let (observations, business_hours, timezones, stores) =
        sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM store_status),
                (SELECT COUNT(*) FROM business_hours),
                (SELECT COUNT(*) FROM timezones),
                (SELECT COUNT(DISTINCT store_id) FROM store_status)
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;

    Ok(DatasetCounts {
        observations: observations as u64,
        business_hours: business_hours as u64,
        timezones: timezones as u64,
        stores: stores as u64,
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS store_status (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                store_id TEXT NOT NULL,
                status TEXT NOT NULL,
                observed_at_us INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS business_hours (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                store_id TEXT NOT NULL,
                day_of_week INTEGER NOT NULL,
                start_time_local TEXT NOT NULL,
                end_time_local TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS timezones (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                store_id TEXT NOT NULL,
                timezone_str TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_store_status_store_time ON store_status(store_id, observed_at_us)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_store_status_time ON store_status(observed_at_us)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_business_hours_store_id ON business_hours(store_id)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_timezones_store_id ON timezones(store_id)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn replace_dataset(&self, dataset: &Dataset) -> StorageResult<DatasetCounts> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM store_status").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM business_hours").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM timezones").execute(&mut *tx).await?;

        for chunk in dataset.observations.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO store_status (store_id, status, observed_at_us) ");
            builder.push_values(chunk, |mut row, observation| {
                row.push_bind(observation.store_id.as_str())
                    .push_bind(observation.status.as_str())
                    .push_bind(observation.timestamp.timestamp_micros());
            });
            builder.build().execute(&mut *tx).await?;
        }

        for chunk in dataset.business_hours.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO business_hours (store_id, day_of_week, start_time_local, end_time_local) ",
            );
            builder.push_values(chunk, |mut row, rule| {
                row.push_bind(rule.store_id.as_str())
                    .push_bind(i64::from(rule.day_of_week))
                    .push_bind(rule.start_local.format("%H:%M:%S").to_string())
                    .push_bind(rule.end_local.format("%H:%M:%S").to_string());
            });
            builder.build().execute(&mut *tx).await?;
        }

        for chunk in dataset.timezones.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO timezones (store_id, timezone_str) ");
            builder.push_values(chunk, |mut row, assignment| {
                row.push_bind(assignment.store_id.as_str())
                    .push_bind(assignment.zone.as_str());
            });
            builder.build().execute(&mut *tx).await?;
        }

        let counts = read_counts(&mut *tx).await?;
        tx.commit().await?;

        info!(
            observations = counts.observations,
            business_hours = counts.business_hours,
            timezones = counts.timezones,
            stores = counts.stores,
            "Replaced cached dataset"
        );
        Ok(counts)
    }

    async fn store_ids(&self) -> StorageResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT store_id FROM store_status ORDER BY store_id",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(ids)
    }

    async fn counts(&self) -> StorageResult<DatasetCounts> {
        let mut conn = self.pool.acquire().await?;
        read_counts(&mut *conn).await
    }

    async fn reference_instant(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let latest = sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(observed_at_us) FROM store_status")
            .fetch_one(self.pool.as_ref())
            .await?;

        latest
            .map(|us| {
                DateTime::from_timestamp_micros(us)
                    .ok_or_else(|| corrupt("store_status", format!("timestamp {us} out of range")))
            })
            .transpose()
    }

    async fn snapshot(&self) -> StorageResult<Dataset> {
        // One read transaction; WAL keeps it from blocking a concurrent load
        let mut tx = self.pool.begin().await?;

        let observations = read_observations(&mut *tx).await?;
        let business_hours = read_business_hours(&mut *tx).await?;
        let timezones = read_timezones(&mut *tx).await?;

        tx.commit().await?;

        Ok(Dataset {
            observations,
            business_hours,
            timezones,
        })
    }
}
