//! Reservation admissibility: pure, synchronous, no I/O.
//!
//! Callers hand in a candidate plus a [`ReservationSource`] and get back a
//! [`Verdict`]. Business-rule failures are data (`Verdict::Rejected`);
//! only a structurally broken request is an error ([`MalformedInput`]).

pub mod conflict;
pub mod fields;
mod pipeline;
mod violation;
pub mod window;

pub use pipeline::{Pipeline, PipelineState, StageKind};
pub use violation::{Field, Reason, Verdict, Violation};
pub use window::WindowPolicy;

use ulid::Ulid;

use crate::model::{Day, Reservation, RoomState, StayRange};

/// Stages for a brand-new reservation.
pub const CREATE_STAGES: &[StageKind] = &[StageKind::Fields, StageKind::Window, StageKind::Conflicts];

/// Stages for moving an existing reservation: the customer is not touched,
/// so its fields are not re-validated.
pub const RESCHEDULE_STAGES: &[StageKind] = &[StageKind::Window, StageKind::Conflicts];

/// Raw, possibly incomplete reservation input as it arrives from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationRequest {
    pub room_id: Option<Ulid>,
    pub customer_email: Option<String>,
    pub check_in: Option<Day>,
    pub check_out: Option<Day>,
}

/// The caller broke the input contract; not a business violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedInput {
    MissingRoom,
    MissingCheckIn,
    MissingCheckOut,
}

impl std::fmt::Display for MalformedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedInput::MissingRoom => write!(f, "room id is missing"),
            MalformedInput::MissingCheckIn => write!(f, "check-in date is missing"),
            MalformedInput::MissingCheckOut => write!(f, "check-out date is missing"),
        }
    }
}

impl std::error::Error for MalformedInput {}

/// A reservation under evaluation. `id` is set when it replaces a stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: Option<Ulid>,
    pub room_id: Ulid,
    pub customer_email: Option<String>,
    pub stay: StayRange,
}

impl Candidate {
    pub fn from_request(id: Option<Ulid>, request: ReservationRequest) -> Result<Self, MalformedInput> {
        let room_id = request.room_id.ok_or(MalformedInput::MissingRoom)?;
        let check_in = request.check_in.ok_or(MalformedInput::MissingCheckIn)?;
        let check_out = request.check_out.ok_or(MalformedInput::MissingCheckOut)?;
        Ok(Self {
            id,
            room_id,
            customer_email: request.customer_email,
            stay: StayRange::new(check_in, check_out),
        })
    }

    /// Candidate for moving `existing` to new dates.
    pub fn rescheduling(existing: &Reservation, stay: StayRange) -> Self {
        Self {
            id: Some(existing.id),
            room_id: existing.room_id,
            customer_email: Some(existing.customer_email.clone()),
            stay,
        }
    }
}

/// Anything that can answer the buffered range query the conflict rules need.
///
/// Implementations must return at least every reservation on `room_id`, other
/// than `exclude_id`, whose occupied range intersects `window`. Returning
/// more is allowed.
pub trait ReservationSource {
    fn find_relevant(&self, room_id: Ulid, window: StayRange, exclude_id: Option<Ulid>) -> Vec<Reservation>;
}

impl ReservationSource for [Reservation] {
    fn find_relevant(&self, room_id: Ulid, window: StayRange, exclude_id: Option<Ulid>) -> Vec<Reservation> {
        self.iter()
            .filter(|r| r.room_id == room_id && Some(r.id) != exclude_id && r.stay.overlaps(&window))
            .cloned()
            .collect()
    }
}

impl ReservationSource for Vec<Reservation> {
    fn find_relevant(&self, room_id: Ulid, window: StayRange, exclude_id: Option<Ulid>) -> Vec<Reservation> {
        self.as_slice().find_relevant(room_id, window, exclude_id)
    }
}

impl ReservationSource for RoomState {
    fn find_relevant(&self, room_id: Ulid, window: StayRange, exclude_id: Option<Ulid>) -> Vec<Reservation> {
        if room_id != self.id {
            return Vec::new();
        }
        self.overlapping(&window)
            .filter(|r| Some(r.id) != exclude_id)
            .cloned()
            .collect()
    }
}

/// Room create/rename validation.
pub fn validate_room_name(name: &str) -> Verdict {
    Pipeline::new()
        .gate(StageKind::Fields, fields::room_name)
        .run(name)
}

/// The admission engine, bound to a policy and a reference date.
#[derive(Debug, Clone, Copy)]
pub struct Admission {
    policy: WindowPolicy,
    today: Day,
}

impl Admission {
    pub fn new(policy: WindowPolicy, today: Day) -> Self {
        Self { policy, today }
    }

    pub fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    pub fn today(&self) -> Day {
        self.today
    }

    pub fn check_fields(&self, candidate: &Candidate) -> Vec<Violation> {
        fields::customer_email(candidate.customer_email.as_deref())
    }

    pub fn check_window(&self, candidate: &Candidate) -> Vec<Violation> {
        self.policy.check(&candidate.stay, self.today)
    }

    pub fn check_conflicts(
        &self,
        candidate: &Candidate,
        exclude_id: Option<Ulid>,
        relevant: &[Reservation],
    ) -> Vec<Violation> {
        conflict::detect(candidate, exclude_id, relevant)
    }

    /// Build the pipeline for `stages`, with `relevant` already fetched.
    pub fn pipeline<'a>(
        &'a self,
        stages: &[StageKind],
        exclude_id: Option<Ulid>,
        relevant: &'a [Reservation],
    ) -> Pipeline<'a, Candidate> {
        stages.iter().fold(Pipeline::new(), |p, kind| match kind {
            StageKind::Fields => p.gate(*kind, move |c| self.check_fields(c)),
            StageKind::Window => p.stage(*kind, move |c| self.check_window(c)),
            StageKind::Conflicts => {
                p.stage(*kind, move |c| self.check_conflicts(c, exclude_id, relevant))
            }
        })
    }

    /// The validation entry point: every stage, create semantics.
    pub fn admit<S>(&self, candidate: &Candidate, exclude_id: Option<Ulid>, source: &S) -> Verdict
    where
        S: ReservationSource + ?Sized,
    {
        self.admit_with(CREATE_STAGES, candidate, exclude_id, source)
    }

    pub fn admit_with<S>(
        &self,
        stages: &[StageKind],
        candidate: &Candidate,
        exclude_id: Option<Ulid>,
        source: &S,
    ) -> Verdict
    where
        S: ReservationSource + ?Sized,
    {
        let exclude_id = exclude_id.or(candidate.id);
        let relevant = if stages.contains(&StageKind::Conflicts) {
            source.find_relevant(
                candidate.room_id,
                conflict::relevant_window(&candidate.stay),
                exclude_id,
            )
        } else {
            Vec::new()
        };
        self.pipeline(stages, exclude_id, &relevant).run(candidate)
    }
}
