//! Per-store, per-window aggregation into report rows

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::extrapolate::{observations_within, ExtrapolationPolicy, Tally};
use super::intervals::{generate, WeeklySchedule};
use super::time::parse_zone;
use super::EngineError;
use crate::models::{BusinessHourRule, Dataset, MetricRow, Observation};

/// Trailing windows reported for every store, all ending at the reference instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportWindow {
    LastHour,
    LastDay,
    LastWeek,
}

impl ReportWindow {
    pub const ALL: [ReportWindow; 3] = [Self::LastHour, Self::LastDay, Self::LastWeek];

    pub fn length(&self) -> TimeDelta {
        match self {
            Self::LastHour => TimeDelta::hours(1),
            Self::LastDay => TimeDelta::days(1),
            Self::LastWeek => TimeDelta::weeks(1),
        }
    }

    pub fn bounds(&self, reference: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (reference - self.length(), reference)
    }
}

/// Everything the engine knows about one store, grouped once per report
#[derive(Debug, Clone)]
pub struct StoreInputs<'a> {
    /// Ordered by timestamp
    pub observations: &'a [Observation],
    pub schedule: WeeklySchedule,
    pub zone: Tz,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub reference_instant: Option<DateTime<Utc>>,
    pub rows: Vec<MetricRow>,
}

#[derive(Debug, Clone)]
pub struct ReportEngine {
    default_zone: Tz,
    strict_zones: bool,
    policy: ExtrapolationPolicy,
}

impl ReportEngine {
    pub fn new(default_zone: Tz) -> Self {
        Self {
            default_zone,
            strict_zones: false,
            policy: ExtrapolationPolicy::default(),
        }
    }

    /// Fail the whole report on an unknown store zone instead of falling back
    pub fn with_strict_zones(mut self, strict: bool) -> Self {
        self.strict_zones = strict;
        self
    }

    pub fn with_policy(mut self, policy: ExtrapolationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report every store present in the observation feed, ending at the
    /// latest observation in the dataset
    pub fn build_report(&self, dataset: &Dataset) -> Result<Report, EngineError> {
        let Some(reference) = dataset.reference_instant() else {
            info!("No observations loaded, report is empty");
            return Ok(Report {
                reference_instant: None,
                rows: Vec::new(),
            });
        };

        let store_ids = dataset.store_ids();
        let rows = self.build(&store_ids, dataset, reference)?;

        Ok(Report {
            reference_instant: Some(reference),
            rows,
        })
    }

    /// One row per requested store, in the order given
    pub fn build(
        &self,
        store_ids: &[String],
        dataset: &Dataset,
        reference: DateTime<Utc>,
    ) -> Result<Vec<MetricRow>, EngineError> {
        let index = StoreIndex::new(dataset);
        info!(
            stores = store_ids.len(),
            reference = %reference,
            policy = ?self.policy,
            "Building uptime report"
        );

        store_ids
            .iter()
            .map(|store_id| {
                let inputs = self.store_inputs(store_id, &index)?;
                let row = self.store_row(store_id, &inputs, reference);
                debug!(store_id = %store_id, "Computed store metrics");
                Ok(row)
            })
            .collect()
    }

    /// The six metrics for one store
    pub fn store_row(
        &self,
        store_id: &str,
        inputs: &StoreInputs<'_>,
        reference: DateTime<Utc>,
    ) -> MetricRow {
        let [hour, day, week] =
            ReportWindow::ALL.map(|window| self.window_tally(inputs, window, reference));

        MetricRow {
            store_id: store_id.to_string(),
            uptime_last_hour: hour.uptime_hours(),
            uptime_last_day: day.uptime_hours(),
            uptime_last_week: week.uptime_hours(),
            downtime_last_hour: hour.downtime_hours(),
            downtime_last_day: day.downtime_hours(),
            downtime_last_week: week.downtime_hours(),
        }
    }

    pub fn window_tally(
        &self,
        inputs: &StoreInputs<'_>,
        window: ReportWindow,
        reference: DateTime<Utc>,
    ) -> Tally {
        let (from, to) = window.bounds(reference);
        let mut total = Tally::default();

        for interval in generate(&inputs.schedule, from, to, inputs.zone) {
            let inside = observations_within(inputs.observations, &interval);
            total += self.policy.extrapolate(&interval, inside);
        }

        total
    }

    /// Resolve a store's zone, falling back to the default when unassigned
    pub fn resolve_zone(&self, store_id: &str, assigned: Option<&str>) -> Result<Tz, EngineError> {
        let Some(raw) = assigned else {
            return Ok(self.default_zone);
        };

        match parse_zone(raw) {
            Some(zone) => Ok(zone),
            None if self.strict_zones => Err(EngineError::Configuration {
                store_id: store_id.to_string(),
                zone: raw.to_string(),
            }),
            None => {
                warn!(
                    store_id = %store_id,
                    "Unknown time zone '{}', using {}", raw, self.default_zone
                );
                Ok(self.default_zone)
            }
        }
    }

    fn store_inputs<'a>(
        &self,
        store_id: &str,
        index: &'a StoreIndex<'_>,
    ) -> Result<StoreInputs<'a>, EngineError> {
        let zone = self.resolve_zone(store_id, index.zones.get(store_id).copied())?;
        let schedule = index
            .rules
            .get(store_id)
            .map(|rules| WeeklySchedule::from_rules(rules.iter().copied()))
            .unwrap_or_else(WeeklySchedule::always_open);
        let observations = index
            .observations
            .get(store_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        Ok(StoreInputs {
            observations,
            schedule,
            zone,
        })
    }
}

/// Dataset grouped by store id
struct StoreIndex<'a> {
    observations: HashMap<&'a str, Vec<Observation>>,
    rules: HashMap<&'a str, Vec<&'a BusinessHourRule>>,
    zones: HashMap<&'a str, &'a str>,
}

impl<'a> StoreIndex<'a> {
    fn new(dataset: &'a Dataset) -> Self {
        let mut observations: HashMap<&str, Vec<Observation>> = HashMap::new();
        for observation in &dataset.observations {
            observations
                .entry(observation.store_id.as_str())
                .or_default()
                .push(observation.clone());
        }
        for polls in observations.values_mut() {
            polls.sort_by_key(|o| o.timestamp);
        }

        let mut rules: HashMap<&str, Vec<&BusinessHourRule>> = HashMap::new();
        for rule in &dataset.business_hours {
            rules.entry(rule.store_id.as_str()).or_default().push(rule);
        }

        // First assignment wins
        let mut zones = HashMap::new();
        for assignment in &dataset.timezones {
            zones
                .entry(assignment.store_id.as_str())
                .or_insert(assignment.zone.as_str());
        }

        Self {
            observations,
            rules,
            zones,
        }
    }
}
