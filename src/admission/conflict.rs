//! Overlap and same-customer gap detection against the relevant set.
//!
//! The relevant set for a candidate `[b, e]` is every reservation on the same
//! room (other than the excluded one) intersecting `[b - 1, e + 1]`. The extra
//! day on each side is what lets the gap rule see stays that end the day
//! before check-in or start the day after check-out.

use ulid::Ulid;

use crate::model::{Reservation, StayRange, same_customer};

use super::Candidate;
use super::violation::{Field, Reason, Violation};

/// Days of visibility the gap rule needs beyond direct overlap.
pub const GAP_BUFFER_DAYS: u64 = 1;

/// The date window a storage backend must search for `stay`.
pub fn relevant_window(stay: &StayRange) -> StayRange {
    stay.widened(GAP_BUFFER_DAYS)
}

pub fn overlaps(a: &StayRange, b: &StayRange) -> bool {
    a.overlaps(b)
}

fn is_excluded(r: &Reservation, candidate: &Candidate, exclude_id: Option<Ulid>) -> bool {
    Some(r.id) == exclude_id || Some(r.id) == candidate.id
}

/// Whether `r` belongs to the relevant set of `candidate`.
pub fn is_relevant(r: &Reservation, candidate: &Candidate, exclude_id: Option<Ulid>) -> bool {
    if r.room_id != candidate.room_id || is_excluded(r, candidate, exclude_id) {
        return false;
    }
    let window = relevant_window(&candidate.stay);
    r.stay.check_in <= window.check_out && r.stay.check_out >= window.check_in
}

/// Run both conflict rules. `existing` may be wider than the relevant set;
/// it is narrowed here so far-away stays never count against the customer.
pub fn detect(
    candidate: &Candidate,
    exclude_id: Option<Ulid>,
    existing: &[Reservation],
) -> Vec<Violation> {
    let mut overlapping = None;
    let mut too_close = None;

    for r in existing.iter().filter(|r| is_relevant(r, candidate, exclude_id)) {
        if overlapping.is_none() && overlaps(&r.stay, &candidate.stay) {
            overlapping = Some(r.id);
        }
        if too_close.is_none()
            && candidate
                .customer_email
                .as_deref()
                .is_some_and(|email| same_customer(&r.customer_email, email))
            && r.stay.is_disjoint(&candidate.stay)
        {
            too_close = Some(r.id);
        }
        if overlapping.is_some() && too_close.is_some() {
            break;
        }
    }

    let mut violations = Vec::new();
    if let Some(id) = overlapping {
        tracing::debug!(%id, stay = %candidate.stay, "candidate overlaps existing reservation");
        violations.push(Violation::new(
            Field::CheckInDate,
            Reason::Overlapping,
            "the chosen check-in/check-out dates are not available: they overlap another reservation",
        ));
    }
    if let Some(id) = too_close {
        tracing::debug!(%id, stay = %candidate.stay, "candidate is adjacent to the customer's own stay");
        violations.push(Violation::new(
            Field::CheckInDate,
            Reason::NoGapBetweenStays,
            "consecutive reservations need at least one full free day between them",
        ));
    }
    violations
}
