use chrono::{Days, NaiveDate};

use crate::model::{Day, StayRange};

use super::violation::{Field, Reason, Violation};

pub const DEFAULT_LEAD_TIME_DAYS: u32 = 1;
pub const DEFAULT_MAX_ADVANCE_DAYS: u32 = 30;
pub const DEFAULT_MAX_STAY_DAYS: u32 = 3;

/// Fixed calendar-window rules, evaluated against an injected `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    /// Check-in must be at least this many days after today.
    pub lead_time_days: u32,
    /// Check-out may be at most this many days after today (inclusive).
    pub max_advance_days: u32,
    /// Exclusive bound on `check_out - check_in` in days.
    pub max_stay_days: u32,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            lead_time_days: DEFAULT_LEAD_TIME_DAYS,
            max_advance_days: DEFAULT_MAX_ADVANCE_DAYS,
            max_stay_days: DEFAULT_MAX_STAY_DAYS,
        }
    }
}

fn add_days(day: Day, n: u32) -> Day {
    day.checked_add_days(Days::new(n.into()))
        .unwrap_or(NaiveDate::MAX)
}

impl WindowPolicy {
    /// Earliest acceptable check-in for the given `today`.
    pub fn earliest_check_in(&self, today: Day) -> Day {
        add_days(today, self.lead_time_days)
    }

    /// Latest acceptable check-out for the given `today`.
    pub fn latest_check_out(&self, today: Day) -> Day {
        add_days(today, self.max_advance_days)
    }

    /// Run all four window checks. Every failing rule is reported.
    pub fn check(&self, stay: &StayRange, today: Day) -> Vec<Violation> {
        let mut violations = Vec::new();

        if stay.check_in < self.earliest_check_in(today) {
            violations.push(Violation::new(
                Field::CheckInDate,
                Reason::LeadTime,
                if self.lead_time_days <= 1 {
                    "check-in date must be after today".to_string()
                } else {
                    format!(
                        "check-in date must be at least {} days after today",
                        self.lead_time_days
                    )
                },
            ));
        }

        if stay.check_out < stay.check_in {
            violations.push(Violation::new(
                Field::CheckOutDate,
                Reason::CheckOutBeforeCheckIn,
                "check-out date must be on or after the check-in date",
            ));
        }

        if stay.check_out > self.latest_check_out(today) {
            violations.push(Violation::new(
                Field::CheckOutDate,
                Reason::BeyondAdvanceWindow,
                format!(
                    "stays can't be reserved more than {} days in advance",
                    self.max_advance_days
                ),
            ));
        }

        if stay.length_days() >= i64::from(self.max_stay_days) {
            violations.push(Violation::new(
                Field::CheckOutDate,
                Reason::StayTooLong,
                format!("a stay can't be longer than {} days", self.max_stay_days),
            ));
        }

        violations
    }
}
