use serde::Serialize;

/// The input field a violation is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    RoomName,
    CustomerEmail,
    CheckInDate,
    CheckOutDate,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::RoomName => "room_name",
            Field::CustomerEmail => "customer_email",
            Field::CheckInDate => "check_in_date",
            Field::CheckOutDate => "check_out_date",
        }
    }
}

/// Stable machine-readable reason codes. Clients match on these, never on
/// the human message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Required,
    TooLong,
    InvalidEmail,
    LeadTime,
    CheckOutBeforeCheckIn,
    BeyondAdvanceWindow,
    StayTooLong,
    Overlapping,
    NoGapBetweenStays,
}

impl Reason {
    pub fn code(&self) -> &'static str {
        match self {
            Reason::Required => "required",
            Reason::TooLong => "too_long",
            Reason::InvalidEmail => "invalid_email",
            Reason::LeadTime => "lead_time",
            Reason::CheckOutBeforeCheckIn => "check_out_before_check_in",
            Reason::BeyondAdvanceWindow => "beyond_advance_window",
            Reason::StayTooLong => "stay_too_long",
            Reason::Overlapping => "overlapping",
            Reason::NoGapBetweenStays => "no_gap_between_stays",
        }
    }
}

/// One broken business rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: Field,
    pub reason: Reason,
    pub message: String,
}

impl Violation {
    pub fn new(field: Field, reason: Reason, message: impl Into<String>) -> Self {
        Self {
            field,
            reason,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}: {}", self.field.as_str(), self.reason.code(), self.message)
    }
}

/// Outcome of running an admission pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Vec<Violation>),
}

impl Verdict {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            Verdict::Accepted
        } else {
            Verdict::Rejected(violations)
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Verdict::Accepted => &[],
            Verdict::Rejected(v) => v,
        }
    }

    pub fn has(&self, reason: Reason) -> bool {
        self.violations().iter().any(|v| v.reason == reason)
    }

    pub fn into_result(self) -> Result<(), Vec<Violation>> {
        match self {
            Verdict::Accepted => Ok(()),
            Verdict::Rejected(v) => Err(v),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::Rejected(_) => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_violations_accept() {
        assert_eq!(Verdict::from_violations(vec![]), Verdict::Accepted);
        assert!(Verdict::Accepted.violations().is_empty());
    }

    #[test]
    fn rejected_keeps_every_violation() {
        let verdict = Verdict::from_violations(vec![
            Violation::new(Field::CheckInDate, Reason::LeadTime, "too soon"),
            Violation::new(Field::CheckOutDate, Reason::StayTooLong, "too long"),
        ]);
        assert!(!verdict.is_accepted());
        assert!(verdict.has(Reason::LeadTime));
        assert!(verdict.has(Reason::StayTooLong));
        assert_eq!(verdict.into_result().unwrap_err().len(), 2);
    }

    #[test]
    fn violation_serializes_with_codes() {
        let v = Violation::new(Field::CheckInDate, Reason::NoGapBetweenStays, "msg");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["field"], "check_in_date");
        assert_eq!(json["reason"], "no_gap_between_stays");
        assert_eq!(json["message"], "msg");
    }

    #[test]
    fn display_is_field_reason_message() {
        let v = Violation::new(Field::CustomerEmail, Reason::Required, "missing");
        assert_eq!(v.to_string(), "customer_email/required: missing");
    }
}
