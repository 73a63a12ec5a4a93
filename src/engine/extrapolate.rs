//! Uptime/downtime estimation for a single business interval

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

use super::intervals::BusinessInterval;
use super::time::minutes_between;
use crate::models::Observation;

/// Weight given to every poll by the fixed-weight policy
pub const MINUTES_PER_OBSERVATION: f64 = 60.0;

/// Accumulated uptime and downtime, in minutes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub uptime_minutes: f64,
    pub downtime_minutes: f64,
}

impl Tally {
    pub fn uptime_hours(&self) -> f64 {
        self.uptime_minutes / 60.0
    }

    pub fn downtime_hours(&self) -> f64 {
        self.downtime_minutes / 60.0
    }

    fn credit(&mut self, observation: &Observation, minutes: f64) {
        if observation.status.is_active() {
            self.uptime_minutes += minutes;
        } else {
            self.downtime_minutes += minutes;
        }
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Self) {
        self.uptime_minutes += rhs.uptime_minutes;
        self.downtime_minutes += rhs.downtime_minutes;
    }
}

/// How the polls inside an interval are turned into minutes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationPolicy {
    /// Every poll stands for a full hour, regardless of spacing or interval
    /// length. The published reports are computed this way.
    #[default]
    FixedWeight,
    /// Each poll covers the span between the midpoints to its neighbours,
    /// clipped to the interval, so the tally always sums to the interval length.
    TimeWeighted,
}

impl ExtrapolationPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "fixed" | "fixed_weight" => Some(Self::FixedWeight),
            "time_weighted" | "interpolate" => Some(Self::TimeWeighted),
            _ => None,
        }
    }

    /// Estimate the interval's uptime and downtime.
    ///
    /// `observations` must be ordered by time and already restricted to the
    /// interval. An interval nobody polled is all downtime.
    pub fn extrapolate(&self, interval: &BusinessInterval, observations: &[Observation]) -> Tally {
        if observations.is_empty() {
            return Tally {
                uptime_minutes: 0.0,
                downtime_minutes: interval.minutes(),
            };
        }

        match self {
            Self::FixedWeight => fixed_weight(observations),
            Self::TimeWeighted => time_weighted(interval, observations),
        }
    }
}

fn fixed_weight(observations: &[Observation]) -> Tally {
    let mut tally = Tally::default();
    for observation in observations {
        tally.credit(observation, MINUTES_PER_OBSERVATION);
    }
    tally
}

fn time_weighted(interval: &BusinessInterval, observations: &[Observation]) -> Tally {
    let mut tally = Tally::default();
    let mut span_start = interval.start;

    for (i, observation) in observations.iter().enumerate() {
        let span_end = match observations.get(i + 1) {
            Some(next) => midpoint(observation.timestamp, next.timestamp),
            None => interval.end,
        }
        .clamp(interval.start, interval.end);

        if span_end > span_start {
            tally.credit(observation, minutes_between(span_start, span_end));
            span_start = span_end;
        }
    }

    tally
}

fn midpoint(a: DateTime<Utc>, b: DateTime<Utc>) -> DateTime<Utc> {
    a + (b - a) / 2
}

/// The sub-slice of time-ordered `observations` that falls inside `interval`
pub fn observations_within<'a>(
    observations: &'a [Observation],
    interval: &BusinessInterval,
) -> &'a [Observation] {
    let lo = observations.partition_point(|o| o.timestamp < interval.start);
    let hi = observations.partition_point(|o| o.timestamp <= interval.end);
    &observations[lo..hi.max(lo)]
}
