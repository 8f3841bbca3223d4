use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A calendar date. Time of day never matters for a stay.
pub type Day = NaiveDate;

/// Closed interval `[check_in, check_out]` of calendar days.
///
/// A stay from D to D occupies exactly one day. `check_out < check_in` is
/// representable on purpose: a candidate may arrive inverted and the window
/// policy reports it instead of the constructor panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayRange {
    pub check_in: Day,
    pub check_out: Day,
}

impl StayRange {
    pub fn new(check_in: Day, check_out: Day) -> Self {
        Self { check_in, check_out }
    }

    /// Whole days between check-in and check-out (0 for a same-day stay).
    pub fn length_days(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in <= other.check_out && other.check_in <= self.check_out
    }

    /// One stay lies entirely before or after the other.
    pub fn is_disjoint(&self, other: &StayRange) -> bool {
        other.check_in > self.check_out || self.check_in > other.check_out
    }

    /// Extend both ends by `days`, saturating at the calendar limits.
    pub fn widened(&self, days: u64) -> StayRange {
        let check_in = self
            .check_in
            .checked_sub_days(Days::new(days))
            .unwrap_or(NaiveDate::MIN);
        let check_out = self
            .check_out
            .checked_add_days(Days::new(days))
            .unwrap_or(NaiveDate::MAX);
        StayRange { check_in, check_out }
    }
}

impl std::fmt::Display for StayRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.check_in, self.check_out)
    }
}

/// Customer identity comparison: emails match regardless of case.
pub fn same_customer(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// A persisted reservation: the unit the admission engine reasons about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub room_id: Ulid,
    pub customer_email: String,
    pub stay: StayRange,
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub name: String,
    /// Reservations on this room, sorted by `stay.check_in`.
    pub reservations: Vec<Reservation>,
}

impl RoomState {
    pub fn new(id: Ulid, name: String) -> Self {
        Self {
            id,
            name,
            reservations: Vec::new(),
        }
    }

    /// Insert reservation maintaining sort order by check-in.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .partition_point(|r| r.stay.check_in <= reservation.stay.check_in);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == *id)
    }

    /// Reservations whose occupied range intersects `window`.
    /// Binary search skips everything checking in after `window.check_out`.
    pub fn overlapping(&self, window: &StayRange) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.stay.check_in <= window.check_out);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.stay.check_out >= window.check_in)
    }
}

/// The event types, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: Ulid,
        name: String,
    },
    RoomRenamed {
        id: Ulid,
        name: String,
    },
    RoomDeleted {
        id: Ulid,
    },
    ReservationPlaced {
        id: Ulid,
        room_id: Ulid,
        customer_email: String,
        stay: StayRange,
    },
    ReservationRescheduled {
        id: Ulid,
        room_id: Ulid,
        stay: StayRange,
    },
    ReservationCancelled {
        id: Ulid,
        room_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: Ulid,
    pub name: String,
    pub reservation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationInfo {
    pub id: Ulid,
    pub room_id: Ulid,
    pub customer_email: String,
    pub check_in: Day,
    pub check_out: Day,
}

impl From<&Reservation> for ReservationInfo {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id,
            room_id: r.room_id,
            customer_email: r.customer_email.clone(),
            check_in: r.stay.check_in,
            check_out: r.stay.check_out,
        }
    }
}
