// Calendar and time-of-day rule schedules (spec §4.6)

//! # Time Descriptors
//!
//! A `TimeDescriptor` gates a rule on wall-clock time rather than events or
//! state. It's evaluated once per tick delivered by the Time Manager port,
//! using half-open `(last_tick, current_tick]` windows so a tick that lands
//! exactly on a boundary fires exactly once, never twice.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// How a `CalendarItem`/`TimeEventItem` repeats beyond its first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatingMode {
    None,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Sparse repeat constraints layered on top of `RepeatingMode`. Empty sets
/// mean "every" value for that unit, matching nymea's `RepeatingOption`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepeatingOption {
    pub mode: Option<RepeatingMode>,
    pub weekdays: Vec<u8>,
    pub month_days: Vec<u8>,
}

impl RepeatingOption {
    pub fn none() -> Self {
        Self {
            mode: Some(RepeatingMode::None),
            weekdays: vec![],
            month_days: vec![],
        }
    }

    pub fn weekly(weekdays: Vec<u8>) -> Self {
        Self {
            mode: Some(RepeatingMode::Weekly),
            weekdays,
            month_days: vec![],
        }
    }

    pub fn monthly(month_days: Vec<u8>) -> Self {
        Self {
            mode: Some(RepeatingMode::Monthly),
            weekdays: vec![],
            month_days,
        }
    }

    fn mode(&self) -> RepeatingMode {
        self.mode.unwrap_or(RepeatingMode::None)
    }

    pub fn is_empty(&self) -> bool {
        self.weekdays.is_empty() && self.month_days.is_empty()
    }

    /// Structural validity per spec §4.1 step 5: weekdays are ISO 1-7,
    /// month days are 1-31, mirroring nymea's `RepeatingOption::isValid()`.
    pub fn is_valid(&self) -> bool {
        self.weekdays.iter().all(|&d| (1..=7).contains(&d))
            && self.month_days.iter().all(|&d| (1..=31).contains(&d))
    }

    /// Whether `when` is a day this option permits, independent of the
    /// exact time-of-day match. `RepeatingMode::None` matches only the
    /// single instant carried by the owning item, so it always returns
    /// `true` here -- the owning item does the date comparison itself.
    fn matches_day(&self, when: DateTime<Utc>) -> bool {
        match self.mode() {
            RepeatingMode::None | RepeatingMode::Hourly | RepeatingMode::Daily => true,
            RepeatingMode::Weekly => {
                self.weekdays.is_empty() || self.weekdays.contains(&weekday_index(when.weekday()))
            }
            RepeatingMode::Monthly => {
                self.month_days.is_empty() || self.month_days.contains(&(when.day() as u8))
            }
            RepeatingMode::Yearly => true,
        }
    }
}

fn weekday_index(w: Weekday) -> u8 {
    // ISO weekday, Monday = 1 .. Sunday = 7, matching nymea's Qt::DayOfWeek convention.
    w.number_from_monday() as u8
}

/// A single calendar-triggered time window: active for `duration` starting
/// at each occurrence `datetime` produces, per `repeating`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarItem {
    pub datetime: DateTime<Utc>,
    pub duration: chrono::Duration,
    pub repeating: RepeatingOption,
}

impl CalendarItem {
    /// True if `when` falls within an active window of this item.
    pub fn is_active_at(&self, when: DateTime<Utc>) -> bool {
        if when < self.datetime {
            return false;
        }
        match self.repeating.mode() {
            RepeatingMode::None => when < self.datetime + self.duration,
            RepeatingMode::Hourly => {
                let elapsed = when - self.datetime;
                let offset_in_hour = chrono::Duration::minutes(
                    elapsed.num_minutes().rem_euclid(60),
                );
                offset_in_hour < self.duration
            }
            RepeatingMode::Daily => self.time_of_day_active(when),
            RepeatingMode::Weekly | RepeatingMode::Monthly => {
                self.repeating.matches_day(when) && self.time_of_day_active(when)
            }
            RepeatingMode::Yearly => {
                when.month() == self.datetime.month()
                    && when.day() == self.datetime.day()
                    && self.time_of_day_active(when)
            }
        }
    }

    fn time_of_day_active(&self, when: DateTime<Utc>) -> bool {
        let start_seconds = self.datetime.num_seconds_from_midnight() as i64;
        let now_seconds = when.num_seconds_from_midnight() as i64;
        let elapsed = now_seconds - start_seconds;
        elapsed >= 0 && chrono::Duration::seconds(elapsed) < self.duration
    }
}

/// A single instantaneous time event: fires exactly at `datetime`, or at
/// each of its repeats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEventItem {
    pub datetime: DateTime<Utc>,
    pub repeating: RepeatingOption,
}

impl TimeEventItem {
    /// True if an occurrence of this item falls strictly inside
    /// `(last_tick, current_tick]`.
    pub fn fires_between(&self, last_tick: DateTime<Utc>, current_tick: DateTime<Utc>) -> bool {
        if current_tick <= last_tick {
            return false;
        }
        match self.repeating.mode() {
            RepeatingMode::None => self.datetime > last_tick && self.datetime <= current_tick,
            RepeatingMode::Hourly => {
                if current_tick < self.datetime {
                    return false;
                }
                self.minute_second_occurs_in_window(last_tick, current_tick, |dt| {
                    (dt.minute(), dt.second())
                })
            }
            RepeatingMode::Daily => {
                if current_tick < self.datetime {
                    return false;
                }
                self.time_of_day_occurs_in_window(last_tick, current_tick)
            }
            RepeatingMode::Weekly => {
                if current_tick < self.datetime {
                    return false;
                }
                self.repeating.matches_day(current_tick)
                    && self.time_of_day_occurs_in_window(last_tick, current_tick)
            }
            RepeatingMode::Monthly => {
                if current_tick < self.datetime {
                    return false;
                }
                self.repeating.matches_day(current_tick)
                    && self.time_of_day_occurs_in_window(last_tick, current_tick)
            }
            RepeatingMode::Yearly => {
                if current_tick < self.datetime {
                    return false;
                }
                current_tick.month() == self.datetime.month()
                    && current_tick.day() == self.datetime.day()
                    && self.time_of_day_occurs_in_window(last_tick, current_tick)
            }
        }
    }

    fn time_of_day_occurs_in_window(
        &self,
        last_tick: DateTime<Utc>,
        current_tick: DateTime<Utc>,
    ) -> bool {
        let target = self.datetime.num_seconds_from_midnight();
        let window_spans_day = last_tick.date_naive() != current_tick.date_naive();
        let last_seconds = last_tick.num_seconds_from_midnight();
        let now_seconds = current_tick.num_seconds_from_midnight();
        if window_spans_day {
            target > last_seconds || target <= now_seconds
        } else {
            target > last_seconds && target <= now_seconds
        }
    }

    fn minute_second_occurs_in_window(
        &self,
        last_tick: DateTime<Utc>,
        current_tick: DateTime<Utc>,
        key: impl Fn(DateTime<Utc>) -> (u32, u32),
    ) -> bool {
        let target = key(self.datetime);
        let last = key(last_tick);
        let now = key(current_tick);
        let window_spans_hour = last_tick.hour() != current_tick.hour()
            || last_tick.date_naive() != current_tick.date_naive();
        if window_spans_hour {
            target > last || target <= now
        } else {
            target > last && target <= now
        }
    }
}

/// Ties together zero or more calendar windows (state-like, long-lived) and
/// zero or more instantaneous time events (edge-triggered), per spec §4.6.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeDescriptor {
    pub calendar_items: Vec<CalendarItem>,
    pub time_event_items: Vec<TimeEventItem>,
}

/// Result of evaluating a `TimeDescriptor` against one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeEvaluation {
    /// Whether any calendar window is active as of `current_tick`.
    pub calendar_active: bool,
    /// Whether any time event fired during `(last_tick, current_tick]`.
    pub event_fired: bool,
}

impl TimeDescriptor {
    pub fn is_empty(&self) -> bool {
        self.calendar_items.is_empty() && self.time_event_items.is_empty()
    }

    pub fn evaluate(
        &self,
        last_tick: DateTime<Utc>,
        current_tick: DateTime<Utc>,
    ) -> TimeEvaluation {
        TimeEvaluation {
            calendar_active: self
                .calendar_items
                .iter()
                .any(|item| item.is_active_at(current_tick)),
            event_fired: self
                .time_event_items
                .iter()
                .any(|item| item.fires_between(last_tick, current_tick)),
        }
    }
}
