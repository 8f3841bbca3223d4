use ulid::Ulid;

use crate::limits::MAX_LIST_ROWS;
use crate::model::*;

use super::Engine;

impl Engine {
    pub async fn get_room(&self, id: &Ulid) -> Option<RoomInfo> {
        let room = self.get_room_state(id)?;
        let guard = room.read().await;
        Some(RoomInfo {
            id: guard.id,
            name: guard.name.clone(),
            reservation_count: guard.reservations.len(),
        })
    }

    /// All rooms in creation (ULID) order.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut ids: Vec<Ulid> = self.rooms.iter().map(|e| *e.key()).collect();
        ids.sort();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(info) = self.get_room(&id).await {
                out.push(info);
            }
        }
        out
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub async fn get_reservation(&self, id: &Ulid) -> Option<ReservationInfo> {
        let room_id = self.room_for_reservation(id)?;
        let room = self.get_room_state(&room_id)?;
        let guard = room.read().await;
        guard.reservation(id).map(ReservationInfo::from)
    }

    /// Reservations ordered by room, then check-in. An unknown room yields
    /// nothing.
    pub async fn list_reservations(&self, room_filter: Option<Ulid>) -> Vec<ReservationInfo> {
        let room_ids: Vec<Ulid> = match room_filter {
            Some(id) => vec![id],
            None => {
                let mut ids: Vec<Ulid> = self.rooms.iter().map(|e| *e.key()).collect();
                ids.sort();
                ids
            }
        };

        let mut out = Vec::new();
        for room_id in room_ids {
            let Some(room) = self.get_room_state(&room_id) else {
                continue;
            };
            let guard = room.read().await;
            let remaining = MAX_LIST_ROWS.saturating_sub(out.len());
            out.extend(guard.reservations.iter().take(remaining).map(ReservationInfo::from));
            if out.len() >= MAX_LIST_ROWS {
                tracing::warn!("reservation listing truncated at {MAX_LIST_ROWS} rows");
                break;
            }
        }
        out
    }
}
