mod report;
mod store;

pub use report::{MetricRow, REPORT_COLUMNS};
pub use store::{
    BusinessHourRule, Dataset, DatasetCounts, Observation, StoreStatus, TimeZoneAssignment,
};
