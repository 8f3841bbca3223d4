use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use tokio::sync::{RwLock, oneshot};
use ulid::Ulid;

use crate::admission::{self, Candidate, RESCHEDULE_STAGES, ReservationRequest, Verdict};
use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError, WalCommand};

impl Engine {
    pub async fn create_room(&self, id: Ulid, name: String) -> Result<(), EngineError> {
        if self.rooms.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        admission::validate_room_name(&name)
            .into_result()
            .map_err(EngineError::Rejected)?;
        // Exclusive: the existence check and the insert must not interleave
        // with another create of the same id.
        let _catalog = self.catalog.write().await;
        if self.rooms.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::RoomCreated { id, name: name.clone() };
        self.wal_append(&event).await?;
        self.rooms.insert(id, Arc::new(RwLock::new(RoomState::new(id, name))));
        tracing::info!("room {id} created");
        Ok(())
    }

    pub async fn rename_room(&self, id: Ulid, name: String) -> Result<(), EngineError> {
        admission::validate_room_name(&name)
            .into_result()
            .map_err(EngineError::Rejected)?;
        let mut guard = self.lock_room(id).await?;
        let event = Event::RoomRenamed { id, name };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Delete a room together with every reservation on it.
    pub async fn delete_room(&self, id: Ulid) -> Result<usize, EngineError> {
        let _catalog = self.catalog.read().await;
        let guard = self.lock_room(id).await?;
        let event = Event::RoomDeleted { id };
        self.wal_append(&event).await?;
        for r in &guard.reservations {
            self.reservation_to_room.remove(&r.id);
        }
        self.rooms.remove(&id);
        let cascaded = guard.reservations.len();
        tracing::info!("room {id} deleted with {cascaded} reservations");
        Ok(cascaded)
    }

    /// Seed one room when the store holds none. Returns the new room's id.
    pub async fn ensure_default_room(&self, name: &str) -> Result<Option<Ulid>, EngineError> {
        if !self.rooms.is_empty() {
            return Ok(None);
        }
        let id = Ulid::new();
        self.create_room(id, name.to_string()).await?;
        Ok(Some(id))
    }

    /// Admit and store a new reservation. The room's write lock is held from
    /// the relevant-set fetch until the event is applied, so two requests for
    /// the same room can never both see a free calendar.
    pub async fn place_reservation(
        &self,
        id: Ulid,
        request: ReservationRequest,
    ) -> Result<ReservationInfo, EngineError> {
        let candidate = Candidate::from_request(None, request)?;
        if self.reservation_to_room.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let mut guard = self.lock_room(candidate.room_id).await?;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many reservations on room"));
        }

        let verdict = self.admission().admit(&candidate, None, &*guard);
        self.record_verdict("place", &verdict);
        verdict.into_result().map_err(EngineError::Rejected)?;

        // Claim the id across all rooms before logging anything.
        match self.reservation_to_room.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(candidate.room_id);
            }
        }

        // An accepted candidate always carries an address; the field stage gates on it.
        let customer_email = candidate.customer_email.unwrap_or_default();
        let event = Event::ReservationPlaced {
            id,
            room_id: candidate.room_id,
            customer_email: customer_email.clone(),
            stay: candidate.stay,
        };
        if let Err(e) = self.persist_and_apply(&mut guard, &event).await {
            self.reservation_to_room.remove(&id);
            return Err(e);
        }
        Ok(ReservationInfo {
            id,
            room_id: candidate.room_id,
            customer_email,
            check_in: candidate.stay.check_in,
            check_out: candidate.stay.check_out,
        })
    }

    /// Move a reservation to new dates. Missing dates keep their current value.
    pub async fn reschedule_reservation(
        &self,
        id: Ulid,
        check_in: Option<Day>,
        check_out: Option<Day>,
    ) -> Result<ReservationInfo, EngineError> {
        let mut guard = self.resolve_reservation_write(&id).await?;
        let existing = guard
            .reservation(&id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;
        let stay = StayRange::new(
            check_in.unwrap_or(existing.stay.check_in),
            check_out.unwrap_or(existing.stay.check_out),
        );

        let candidate = Candidate::rescheduling(&existing, stay);
        let verdict = self
            .admission()
            .admit_with(RESCHEDULE_STAGES, &candidate, Some(id), &*guard);
        self.record_verdict("reschedule", &verdict);
        verdict.into_result().map_err(EngineError::Rejected)?;

        let event = Event::ReservationRescheduled {
            id,
            room_id: existing.room_id,
            stay,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(ReservationInfo {
            check_in: stay.check_in,
            check_out: stay.check_out,
            ..ReservationInfo::from(&existing)
        })
    }

    pub async fn cancel_reservation(&self, id: Ulid) -> Result<ReservationInfo, EngineError> {
        let mut guard = self.resolve_reservation_write(&id).await?;
        let existing = guard
            .reservation(&id)
            .map(ReservationInfo::from)
            .ok_or(EngineError::NotFound(id))?;
        let event = Event::ReservationCancelled {
            id,
            room_id: existing.room_id,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(existing)
    }

    /// Dry run: evaluate `request` with create semantics and return the
    /// verdict without storing anything.
    pub async fn check_reservation(
        &self,
        request: ReservationRequest,
        exclude_id: Option<Ulid>,
    ) -> Result<Verdict, EngineError> {
        let candidate = Candidate::from_request(None, request)?;
        let room = self
            .get_room_state(&candidate.room_id)
            .ok_or(EngineError::NotFound(candidate.room_id))?;
        let guard = room.read().await;
        let verdict = self.admission().admit(&candidate, exclude_id, &*guard);
        tracing::debug!(verdict = verdict.label(), "dry-run admission for room {}", candidate.room_id);
        Ok(verdict)
    }

    fn record_verdict(&self, operation: &'static str, verdict: &Verdict) {
        metrics::counter!(
            crate::observability::ADMISSIONS_TOTAL,
            "operation" => operation,
            "verdict" => verdict.label()
        )
        .increment(1);

        let violations = verdict.violations();
        for v in violations {
            metrics::counter!(crate::observability::VIOLATIONS_TOTAL, "reason" => v.reason.code())
                .increment(1);
            tracing::warn!(field = v.field.as_str(), reason = v.reason.code(), "{}", v.message);
        }
        if !violations.is_empty() {
            match serde_json::to_string(violations) {
                Ok(json) => tracing::debug!("{operation} rejected: {json}"),
                Err(e) => tracing::debug!("{operation} rejected; violations not serializable: {e}"),
            }
        }
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    /// Every room stays read-locked until the rewrite lands, so no append can
    /// slip in between the snapshot and the swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog.write().await;
        let rooms: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut guards = Vec::with_capacity(rooms.len());
        let mut events = Vec::new();
        for room in rooms {
            let guard = room.read_owned().await;
            events.push(Event::RoomCreated {
                id: guard.id,
                name: guard.name.clone(),
            });
            events.extend(guard.reservations.iter().map(|r| Event::ReservationPlaced {
                id: r.id,
                room_id: r.room_id,
                customer_email: r.customer_email.clone(),
                stay: r.stay,
            }));
            guards.push(guard);
        }
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        drop(guards);
        tracing::info!("WAL compacted to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
