//! Time source for refresh-day checks and token expiry.
//!
//! The refresh day is evaluated against the *server-local* calendar date.
//! The chart provider publishes on its own schedule in its own time zone;
//! a deployment far from it should adjust the configured refresh day rather
//! than expect this to be reconciled automatically.

use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Wall clock used by the decision engine and token minting.
pub trait Clock: Send + Sync {
    /// Current instant, for token `iat`/`exp` claims.
    fn now(&self) -> DateTime<Utc>;

    /// Server-local calendar date, for the refresh-day rule.
    fn today(&self) -> NaiveDate;
}

/// The host's clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Manually driven clock for tests and replay.
///
/// `today()` is the UTC date of the stored instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock pinned to midday UTC on `date`.
    pub fn on_date(date: NaiveDate) -> Self {
        let midday = date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc();
        Self::new(midday)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc());
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Weekday};

    #[test]
    fn fixed_clock_reports_its_date() {
        let date = NaiveDate::from_ymd_opt(2023, 4, 4).unwrap();
        let clock = FixedClock::on_date(date);
        assert_eq!(clock.today(), date);
        assert_eq!(clock.today().weekday(), Weekday::Tue);
    }

    #[test]
    fn fixed_clock_can_be_moved() {
        let clock = FixedClock::on_date(NaiveDate::from_ymd_opt(2023, 4, 4).unwrap());
        clock.set_date(NaiveDate::from_ymd_opt(2023, 4, 5).unwrap());
        assert_eq!(clock.today().weekday(), Weekday::Wed);
    }
}
