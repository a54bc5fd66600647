//! Trigger cadences and their next-fire computation.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, TimeZone, Weekday};
use std::fmt;

/// How often a trigger rule fires, in local wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Every day at the given time
    Daily(NaiveTime),

    /// Once a week on the given day and time
    Weekly(Weekday, NaiveTime),
}

impl Cadence {
    pub fn time_of_day(&self) -> NaiveTime {
        match *self {
            Cadence::Daily(time) | Cadence::Weekly(_, time) => time,
        }
    }

    fn fires_on(&self, date: NaiveDate) -> bool {
        match *self {
            Cadence::Daily(_) => true,
            Cadence::Weekly(day, _) => date.weekday() == day,
        }
    }

    /// First fire time strictly after `now`
    ///
    /// Wall-clock times skipped by a DST jump move to the next matching day;
    /// ambiguous times resolve to the earlier instant.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let local_now = now.naive_local();
        let time = self.time_of_day();
        let mut date = local_now.date();

        // Two weeks covers any weekday plus a DST gap
        for _ in 0..15 {
            if self.fires_on(date) {
                let candidate = date.and_time(time);
                if candidate > local_now {
                    if let Some(fire) = tz.from_local_datetime(&candidate).earliest() {
                        return fire;
                    }
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }

        now.clone() + TimeDelta::days(1)
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Daily(time) => write!(f, "daily at {}", time.format("%H:%M")),
            Cadence::Weekly(day, time) => write!(f, "weekly on {day} at {}", time.format("%H:%M")),
        }
    }
}
