//! Uptime/downtime extrapolation engine
//!
//! Turns sparse status polls, a weekly local-time business-hours table and a
//! store time zone into the six uptime/downtime metrics of the store report.
//! Everything in here is synchronous and side-effect free apart from logging,
//! so it can run on a blocking worker or be called directly from tests.

pub mod assembler;
pub mod extrapolate;
pub mod intervals;
pub mod time;

use chrono::NaiveTime;
use thiserror::Error;

pub use assembler::{Report, ReportEngine, ReportWindow, StoreInputs};
pub use extrapolate::{ExtrapolationPolicy, Tally, MINUTES_PER_OBSERVATION};
pub use intervals::{generate, BusinessInterval, WeeklySchedule};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store {store_id} has invalid time zone '{zone}'")]
    Configuration { store_id: String, zone: String },
    #[error("store {store_id} has malformed business hours on day {day_of_week}: {start} - {end}")]
    MalformedSchedule {
        store_id: String,
        day_of_week: u8,
        start: NaiveTime,
        end: NaiveTime,
    },
}
