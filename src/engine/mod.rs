mod error;
mod mutations;
mod queries;

pub use error::EngineError;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::admission::{Admission, WindowPolicy};
use crate::clock::Clock;
use crate::model::*;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

type Batch = Vec<(Event, oneshot::Sender<io::Result<()>>)>;

fn commit_batch(wal: &mut Wal, batch: &mut Batch) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed for {} events: {e}", batch.len());
    }
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so half-buffered bytes don't ride
    // along with the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: &mut Batch, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

/// The room calendar store: rooms in memory, every change logged first.
pub struct Engine {
    pub(super) rooms: DashMap<Ulid, SharedRoomState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Reverse lookup: reservation id → room id
    pub(super) reservation_to_room: DashMap<Ulid, Ulid>,
    /// Shared by room deletes, exclusive for room creates and compaction snapshots.
    pub(super) catalog: RwLock<()>,
    policy: WindowPolicy,
    clock: Arc<dyn Clock>,
}

/// Apply an event to a room (no locking, the caller holds the lock).
fn apply_to_room(room: &mut RoomState, event: &Event, index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::RoomRenamed { name, .. } => room.name = name.clone(),
        Event::ReservationPlaced {
            id,
            room_id,
            customer_email,
            stay,
        } => {
            room.insert_reservation(Reservation {
                id: *id,
                room_id: *room_id,
                customer_email: customer_email.clone(),
                stay: *stay,
            });
            index.insert(*id, *room_id);
        }
        Event::ReservationRescheduled { id, stay, .. } => {
            if let Some(mut r) = room.remove_reservation(*id) {
                r.stay = *stay;
                room.insert_reservation(r);
            }
        }
        Event::ReservationCancelled { id, .. } => {
            room.remove_reservation(*id);
            index.remove(id);
        }
        // Room creation and deletion touch the room map, not a room.
        Event::RoomCreated { .. } | Event::RoomDeleted { .. } => {}
    }
}

/// The room an event mutates, for events applied inside a room.
fn event_room_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::RoomRenamed { id, .. } => Some(*id),
        Event::ReservationPlaced { room_id, .. }
        | Event::ReservationRescheduled { room_id, .. }
        | Event::ReservationCancelled { room_id, .. } => Some(*room_id),
        Event::RoomCreated { .. } | Event::RoomDeleted { .. } => None,
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, policy: WindowPolicy, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let reservation_to_room = DashMap::new();
        let mut rooms: HashMap<Ulid, RoomState> = HashMap::new();
        for event in &events {
            match event {
                Event::RoomCreated { id, name } => {
                    // A repeated create never resets a live room.
                    rooms
                        .entry(*id)
                        .or_insert_with(|| RoomState::new(*id, name.clone()));
                }
                Event::RoomDeleted { id } => {
                    if let Some(room) = rooms.remove(id) {
                        for r in &room.reservations {
                            reservation_to_room.remove(&r.id);
                        }
                    }
                }
                other => {
                    if let Some(room_id) = event_room_id(other)
                        && let Some(room) = rooms.get_mut(&room_id)
                    {
                        apply_to_room(room, other, &reservation_to_room);
                    }
                }
            }
        }
        tracing::info!(
            "replayed {} events: {} rooms, {} reservations",
            events.len(),
            rooms.len(),
            reservation_to_room.len()
        );

        Ok(Self {
            rooms: rooms
                .into_iter()
                .map(|(id, room)| (id, Arc::new(RwLock::new(room))))
                .collect(),
            wal_tx,
            reservation_to_room,
            catalog: RwLock::new(()),
            policy,
            clock,
        })
    }

    pub fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    /// An admission engine bound to the current policy and today's date.
    pub fn admission(&self) -> Admission {
        Admission::new(self.policy, self.clock.today())
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_room_state(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn room_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_to_room.get(reservation_id).map(|e| *e.value())
    }

    /// WAL-append then apply, under the caller's room lock.
    pub(super) async fn persist_and_apply(
        &self,
        room: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(room, event, &self.reservation_to_room);
        Ok(())
    }

    /// Acquire a room's write lock. A room deleted while we waited is
    /// reported as missing.
    pub(super) async fn lock_room(
        &self,
        room_id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let room = self
            .get_room_state(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = room.write_owned().await;
        if !self.rooms.contains_key(&room_id) {
            return Err(EngineError::NotFound(room_id));
        }
        Ok(guard)
    }

    /// Lookup reservation → room, then lock the room for writing.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let room_id = self
            .room_for_reservation(reservation_id)
            .ok_or(EngineError::NotFound(*reservation_id))?;
        let guard = self.lock_room(room_id).await?;
        if guard.reservation(reservation_id).is_none() {
            return Err(EngineError::NotFound(*reservation_id));
        }
        Ok(guard)
    }
}
