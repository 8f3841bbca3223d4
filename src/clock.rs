use chrono::Local;

use crate::model::Day;

/// Source of "today" for the window rules.
pub trait Clock: Send + Sync {
    fn today(&self) -> Day;
}

/// Local calendar date of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Day {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date. Used by tests and dry runs against a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub Day);

impl Clock for FixedClock {
    fn today(&self) -> Day {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_returns_its_day() {
        let day: Day = "2026-06-01".parse().unwrap();
        assert_eq!(FixedClock(day).today(), day);
    }

    #[test]
    fn system_clock_is_after_epoch() {
        assert!(SystemClock.today() > "2020-01-01".parse::<Day>().unwrap());
    }
}
