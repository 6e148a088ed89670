use ulid::Ulid;

use crate::model::*;

use super::availability::{collect_busy, collect_busy_all, free_ranges, merged_busy};
use super::conflict::validate_window;
use super::{Engine, EngineError};

impl Engine {
    /// Is the whole range free for the target? For a room: no counted
    /// booking or block on the room and no homestay-wide block. For a
    /// homestay: every room free and no block anywhere.
    pub async fn is_available(
        &self,
        target: TargetId,
        range: DateRange,
    ) -> Result<bool, EngineError> {
        validate_window(&range)?;
        let busy = self.collect_busy_for_target(target, Some(&range)).await?;
        Ok(busy.is_empty())
    }

    /// Merged busy ranges for calendar rendering, optionally clamped to
    /// a window. Adjacent ranges coalesce.
    pub async fn unavailable_ranges(
        &self,
        target: TargetId,
        window: Option<DateRange>,
    ) -> Result<Vec<DateRange>, EngineError> {
        if let Some(w) = &window {
            validate_window(w)?;
        }
        let busy = self.collect_busy_for_target(target, window.as_ref()).await?;
        Ok(merged_busy(busy))
    }

    /// Free ranges inside the window, optionally dropping gaps shorter
    /// than `min_nights`.
    pub async fn availability(
        &self,
        target: TargetId,
        window: DateRange,
        min_nights: Option<i64>,
    ) -> Result<Vec<DateRange>, EngineError> {
        validate_window(&window)?;
        let busy = self.collect_busy_for_target(target, Some(&window)).await?;
        Ok(free_ranges(&window, busy, min_nights))
    }

    /// Busy ranges for a target, collected under short-lived read guards.
    /// Homestay-level collection snapshots one calendar at a time so no
    /// two locks are ever held together.
    async fn collect_busy_for_target(
        &self,
        target: TargetId,
        window: Option<&DateRange>,
    ) -> Result<Vec<DateRange>, EngineError> {
        let mut busy = Vec::new();
        match target {
            TargetId::Room(id) => {
                let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
                let homestay_id = {
                    let guard = rs.read().await;
                    collect(&guard.cal, window, &mut busy);
                    guard.homestay_id
                };
                let hs = self
                    .get_homestay(&homestay_id)
                    .ok_or(EngineError::NotFound(homestay_id))?;
                let guard = hs.read().await;
                collect(&guard.cal, window, &mut busy);
            }
            TargetId::Homestay(id) => {
                let hs = self.get_homestay(&id).ok_or(EngineError::NotFound(id))?;
                {
                    let guard = hs.read().await;
                    collect(&guard.cal, window, &mut busy);
                }
                for rid in self.rooms_of(&id) {
                    let Some(rs) = self.get_room(&rid) else {
                        continue;
                    };
                    let guard = rs.read().await;
                    collect(&guard.cal, window, &mut busy);
                }
            }
        }
        Ok(busy)
    }

    pub(super) fn rooms_of(&self, homestay_id: &Ulid) -> Vec<Ulid> {
        self.homestay_rooms
            .get(homestay_id)
            .map(|kids| kids.clone())
            .unwrap_or_default()
    }

    pub async fn list_homestays(&self) -> Vec<HomestayInfo> {
        let shared: Vec<_> = self.homestays.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(shared.len());
        for hs in shared {
            let guard = hs.read().await;
            out.push(HomestayInfo {
                id: guard.id,
                name: guard.name.clone(),
            });
        }
        out.sort_by_key(|h| h.id);
        out
    }

    pub async fn list_rooms(
        &self,
        homestay_id: Option<Ulid>,
    ) -> Result<Vec<RoomInfo>, EngineError> {
        let room_ids: Vec<Ulid> = match homestay_id {
            Some(hid) => {
                if !self.homestays.contains_key(&hid) {
                    return Err(EngineError::NotFound(hid));
                }
                self.rooms_of(&hid)
            }
            None => self.rooms.iter().map(|e| *e.key()).collect(),
        };
        let mut out = Vec::with_capacity(room_ids.len());
        for rid in room_ids {
            let Some(rs) = self.get_room(&rid) else {
                continue;
            };
            let guard = rs.read().await;
            out.push(RoomInfo {
                id: guard.id,
                homestay_id: guard.homestay_id,
                name: guard.name.clone(),
            });
        }
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    /// Bookings of a room, or of every room in a homestay, with an
    /// optional status filter. Sorted by check-in then id.
    pub async fn list_bookings(
        &self,
        target: TargetId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<BookingInfo>, EngineError> {
        let room_ids: Vec<Ulid> = match target {
            TargetId::Room(id) => {
                if !self.rooms.contains_key(&id) {
                    return Err(EngineError::NotFound(id));
                }
                vec![id]
            }
            TargetId::Homestay(id) => {
                if !self.homestays.contains_key(&id) {
                    return Err(EngineError::NotFound(id));
                }
                self.rooms_of(&id)
            }
        };

        let mut out = Vec::new();
        for rid in room_ids {
            let Some(rs) = self.get_room(&rid) else {
                continue;
            };
            let guard = rs.read().await;
            for e in &guard.cal.entries {
                if let EntryKind::Booking { status: s, guest } = &e.kind {
                    if let Some(want) = status
                        && *s != want
                    {
                        continue;
                    }
                    out.push(BookingInfo {
                        id: e.id,
                        room_id: rid,
                        check_in: e.range.start,
                        check_out: e.range.end,
                        status: *s,
                        guest: guest.clone(),
                    });
                }
            }
        }
        out.sort_by_key(|b| (b.check_in, b.id));
        Ok(out)
    }

    /// Blocks of a target. A homestay listing covers its homestay-wide
    /// blocks and the room-scoped blocks of its rooms; a room listing
    /// covers only that room's blocks.
    pub async fn list_blocks(&self, target: TargetId) -> Result<Vec<BlockInfo>, EngineError> {
        let mut out = Vec::new();
        match target {
            TargetId::Room(id) => {
                let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
                let guard = rs.read().await;
                push_room_blocks(&guard, &mut out);
            }
            TargetId::Homestay(id) => {
                let hs = self.get_homestay(&id).ok_or(EngineError::NotFound(id))?;
                {
                    let guard = hs.read().await;
                    for e in &guard.cal.entries {
                        if let EntryKind::Block { reason } = &e.kind {
                            out.push(BlockInfo {
                                id: e.id,
                                homestay_id: id,
                                room_id: None,
                                start: e.range.start,
                                end: e.range.end,
                                reason: reason.clone(),
                            });
                        }
                    }
                }
                for rid in self.rooms_of(&id) {
                    let Some(rs) = self.get_room(&rid) else {
                        continue;
                    };
                    let guard = rs.read().await;
                    push_room_blocks(&guard, &mut out);
                }
            }
        }
        out.sort_by_key(|b| (b.start, b.id));
        Ok(out)
    }
}

fn collect(cal: &Calendar, window: Option<&DateRange>, busy: &mut Vec<DateRange>) {
    match window {
        Some(w) => collect_busy(cal, w, busy),
        None => collect_busy_all(cal, busy),
    }
}

fn push_room_blocks(room: &RoomState, out: &mut Vec<BlockInfo>) {
    for e in &room.cal.entries {
        if let EntryKind::Block { reason } = &e.kind {
            out.push(BlockInfo {
                id: e.id,
                homestay_id: room.homestay_id,
                room_id: Some(room.id),
                start: e.range.start,
                end: e.range.end,
                reason: reason.clone(),
            });
        }
    }
}
