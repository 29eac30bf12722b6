// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron-like schedules: validated field sets, canonical stringification,
//! and pure next-fire computation.

use chrono::{Datelike, NaiveDateTime};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// How a schedule constrains the day: unconstrained, specific days of the
/// month, or specific weekdays (Monday = 0). The two set forms are
/// mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DayRule {
    #[default]
    Any,
    Days(BTreeSet<u32>),
    Weekdays(BTreeSet<u32>),
}

/// Errors raised at schedule construction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("{field} value {value} out of range [{lo}, {hi})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        lo: u32,
        hi: u32,
    },
    #[error("cannot combine days of the month with weekdays")]
    MixedDayRules,
    #[error("'after' must precede 'before': {before} <= {after}")]
    BoundsOrder {
        after: NaiveDateTime,
        before: NaiveDateTime,
    },
}

/// A validated fire-time specification.
///
/// Empty sets mean "any value". The canonical `Display` form doubles as
/// the cron event id.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days: DayRule,
    months: BTreeSet<u32>,
    after: Option<NaiveDateTime>,
    before: Option<NaiveDateTime>,
}

impl Schedule {
    pub fn builder() -> ScheduleBuilder {
        ScheduleBuilder::default()
    }

    /// First fire time strictly after `now`, or `None` when the schedule
    /// can never fire again (exhausted `before` bound, or no matching
    /// calendar date within the search horizon).
    ///
    /// Pure: same inputs, same answer.
    pub fn next_from(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if let Some(after) = self.after {
            if now < after {
                return self.next_from(after);
            }
        }

        let months: Vec<u32> = set_or_range(&self.months, 1..13);
        let hours: Vec<u32> = set_or_range(&self.hours, 0..24);
        let minutes: Vec<u32> = set_or_range(&self.minutes, 0..60);
        let days: Vec<u32> = match &self.days {
            DayRule::Days(set) if !set.is_empty() => set.iter().copied().collect(),
            _ => (1..32).collect(),
        };

        for year in now.year()..now.year().saturating_add(4) {
            for &month in &months {
                for &day in &days {
                    let Some(date) = chrono::NaiveDate::from_ymd_opt(year, month, day) else {
                        // invalid calendar date, e.g. Feb 31
                        continue;
                    };
                    if let DayRule::Weekdays(set) = &self.days {
                        if !set.is_empty()
                            && !set.contains(&date.weekday().num_days_from_monday())
                        {
                            continue;
                        }
                    }
                    if date < now.date() {
                        continue;
                    }
                    for &hour in &hours {
                        for &minute in &minutes {
                            let Some(dt) = date.and_hms_opt(hour, minute, 0) else {
                                continue;
                            };
                            if dt <= now {
                                continue;
                            }
                            if let Some(before) = self.before {
                                if dt > before {
                                    return None;
                                }
                            }
                            return Some(dt);
                        }
                    }
                }
            }
        }
        None
    }
}

fn set_or_range(set: &BTreeSet<u32>, range: std::ops::Range<u32>) -> Vec<u32> {
    if set.is_empty() {
        range.collect()
    } else {
        set.iter().copied().collect()
    }
}

/// Print a field set as `*` or a comma list grouping consecutive values
/// into `a-b` ranges, e.g. `0,5-9,42`.
fn fmt_field(f: &mut fmt::Formatter<'_>, set: &BTreeSet<u32>) -> fmt::Result {
    if set.is_empty() {
        return f.write_str("*");
    }
    let mut iter = set.iter().copied().peekable();
    let mut first = true;
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if !first {
            f.write_str(",")?;
        }
        first = false;
        if start == end {
            write!(f, "{start}")?;
        } else {
            write!(f, "{start}-{end}")?;
        }
    }
    Ok(())
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(after) = self.after {
            write!(f, "{after} <= ")?;
        }
        fmt_field(f, &self.minutes)?;
        f.write_str(" ")?;
        fmt_field(f, &self.hours)?;
        f.write_str(" ")?;
        match &self.days {
            DayRule::Days(set) if !set.is_empty() => fmt_field(f, set)?,
            _ => f.write_str("*")?,
        }
        f.write_str(" ")?;
        fmt_field(f, &self.months)?;
        if let DayRule::Weekdays(set) = &self.days {
            if !set.is_empty() {
                let names: Vec<&str> = set
                    .iter()
                    .filter_map(|&d| WEEKDAY_NAMES.get(d as usize).copied())
                    .collect();
                write!(f, " {}", names.join(","))?;
            }
        }
        if let Some(before) = self.before {
            write!(f, " <= {before}")?;
        }
        Ok(())
    }
}

/// Accumulates schedule fields, validated as a whole by [`ScheduleBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct ScheduleBuilder {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days: Vec<u32>,
    weekdays: Vec<u32>,
    months: Vec<u32>,
    after: Option<NaiveDateTime>,
    before: Option<NaiveDateTime>,
}

impl ScheduleBuilder {
    pub fn minutes(mut self, values: impl IntoIterator<Item = u32>) -> Self {
        self.minutes.extend(values);
        self
    }

    pub fn hours(mut self, values: impl IntoIterator<Item = u32>) -> Self {
        self.hours.extend(values);
        self
    }

    /// Days of the month, 1-based. Exclusive with [`ScheduleBuilder::weekdays`].
    pub fn days(mut self, values: impl IntoIterator<Item = u32>) -> Self {
        self.days.extend(values);
        self
    }

    /// Weekdays, Monday = 0. Exclusive with [`ScheduleBuilder::days`].
    pub fn weekdays(mut self, values: impl IntoIterator<Item = u32>) -> Self {
        self.weekdays.extend(values);
        self
    }

    pub fn months(mut self, values: impl IntoIterator<Item = u32>) -> Self {
        self.months.extend(values);
        self
    }

    /// Never fire before this point in time.
    pub fn after(mut self, bound: NaiveDateTime) -> Self {
        self.after = Some(bound);
        self
    }

    /// Never fire past this point in time.
    pub fn before(mut self, bound: NaiveDateTime) -> Self {
        self.before = Some(bound);
        self
    }

    pub fn build(self) -> Result<Schedule, ScheduleError> {
        if !self.days.is_empty() && !self.weekdays.is_empty() {
            return Err(ScheduleError::MixedDayRules);
        }
        if let (Some(after), Some(before)) = (self.after, self.before) {
            if before <= after {
                return Err(ScheduleError::BoundsOrder { after, before });
            }
        }

        let minutes = checked_set("minute", self.minutes, 0, 60)?;
        let hours = checked_set("hour", self.hours, 0, 24)?;
        let months = checked_set("month", self.months, 1, 13)?;
        let days = if !self.weekdays.is_empty() {
            DayRule::Weekdays(checked_set("weekday", self.weekdays, 0, 7)?)
        } else if !self.days.is_empty() {
            DayRule::Days(checked_set("day", self.days, 1, 32)?)
        } else {
            DayRule::Any
        };

        Ok(Schedule {
            minutes,
            hours,
            days,
            months,
            after: self.after,
            before: self.before,
        })
    }
}

fn checked_set(
    field: &'static str,
    values: Vec<u32>,
    lo: u32,
    hi: u32,
) -> Result<BTreeSet<u32>, ScheduleError> {
    let mut set = BTreeSet::new();
    for value in values {
        if value < lo || value >= hi {
            return Err(ScheduleError::OutOfRange {
                field,
                value,
                lo,
                hi,
            });
        }
        set.insert(value);
    }
    Ok(set)
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
