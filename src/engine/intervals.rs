//! Expansion of a weekly local-time schedule into concrete UTC intervals

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

use super::time::{local_to_utc, minutes_between, weekday_index};
use super::EngineError;
use crate::models::BusinessHourRule;

/// A span of business time, `start < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusinessInterval {
    pub fn minutes(&self) -> f64 {
        minutes_between(self.start, self.end)
    }

    /// Observations are attributed to an interval inclusively at both ends
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// One store's business hours grouped by local weekday.
///
/// A schedule built from no rules at all means the store never closes.
#[derive(Debug, Clone, Default)]
pub struct WeeklySchedule {
    days: [Vec<(NaiveTime, NaiveTime)>; 7],
    always_open: bool,
}

impl WeeklySchedule {
    pub fn always_open() -> Self {
        Self {
            days: Default::default(),
            always_open: true,
        }
    }

    /// Build a schedule, dropping malformed rules with a warning.
    ///
    /// Rejected rules still count as "a schedule exists", so a store whose
    /// every rule is malformed is closed rather than 24/7.
    pub fn from_rules<'a, I>(rules: I) -> Self
    where
        I: IntoIterator<Item = &'a BusinessHourRule>,
    {
        let mut schedule = Self::default();
        let mut seen_any = false;

        for rule in rules {
            seen_any = true;
            if let Err(e) = schedule.insert(rule) {
                warn!(store_id = %rule.store_id, "Skipping business-hours rule: {}", e);
            }
        }

        schedule.always_open = !seen_any;
        schedule
    }

    /// Add a rule to its weekday, keeping each day ordered by start time
    pub fn insert(&mut self, rule: &BusinessHourRule) -> Result<(), EngineError> {
        if rule.day_of_week > 6 || rule.end_local <= rule.start_local {
            return Err(EngineError::MalformedSchedule {
                store_id: rule.store_id.clone(),
                day_of_week: rule.day_of_week,
                start: rule.start_local,
                end: rule.end_local,
            });
        }

        let day = &mut self.days[usize::from(rule.day_of_week)];
        day.push((rule.start_local, rule.end_local));
        day.sort();
        self.always_open = false;
        Ok(())
    }

    pub fn is_always_open(&self) -> bool {
        self.always_open
    }

    pub fn rules_for(&self, day_of_week: u8) -> &[(NaiveTime, NaiveTime)] {
        self.days
            .get(usize::from(day_of_week))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Business intervals overlapping `[from, to)`, in `zone`, ordered by start.
///
/// The window is walked one local calendar day at a time and each day's rules
/// are converted to UTC separately, so DST transitions inside the window move
/// the boundaries they should.
pub fn generate(
    schedule: &WeeklySchedule,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    zone: Tz,
) -> Vec<BusinessInterval> {
    if from >= to {
        return Vec::new();
    }

    if schedule.is_always_open() {
        return vec![BusinessInterval { start: from, end: to }];
    }

    let mut intervals = Vec::new();
    let mut cursor = from;

    while cursor < to {
        let local_date = cursor.with_timezone(&zone).date_naive();
        let day = weekday_index(local_date.weekday());

        for &(start_local, end_local) in schedule.rules_for(day) {
            let start = local_to_utc(zone, local_date.and_time(start_local)).max(from);
            let end = local_to_utc(zone, local_date.and_time(end_local)).min(to);

            if start < end {
                intervals.push(BusinessInterval { start, end });
            }
        }

        let Some(next_date) = local_date.succ_opt() else {
            break;
        };
        let next = local_to_utc(zone, next_date.and_time(NaiveTime::MIN));
        if next <= cursor {
            break;
        }
        cursor = next;
    }

    intervals
}
