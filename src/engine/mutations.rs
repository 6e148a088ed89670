use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{oneshot, RwLock};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_stay};
use super::{apply_entry, Engine, EngineError, WalCommand};

impl Engine {
    pub async fn create_homestay(&self, id: Ulid, name: Option<String>) -> Result<(), EngineError> {
        let _quiesce = self.maintenance.read().await;
        if self.homestays.len() >= MAX_HOMESTAYS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many homestays"));
        }
        validate_name(&name)?;
        if self.homestays.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::HomestayCreated {
            id,
            name: name.clone(),
        };
        self.wal_append(&event).await?;
        let hs = HomestayState::new(id, name);
        self.homestays.insert(id, Arc::new(RwLock::new(hs)));
        self.homestay_rooms.entry(id).or_default();
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn update_homestay(&self, id: Ulid, name: Option<String>) -> Result<(), EngineError> {
        let _quiesce = self.maintenance.read().await;
        validate_name(&name)?;
        let hs = self.get_homestay(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = hs.write().await;

        let event = Event::HomestayUpdated {
            id,
            name: name.clone(),
        };
        self.wal_append(&event).await?;
        guard.name = name;
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn delete_homestay(&self, id: Ulid) -> Result<(), EngineError> {
        let _quiesce = self.maintenance.read().await;
        if !self.homestays.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        if let Some(kids) = self.homestay_rooms.get(&id)
            && !kids.is_empty()
        {
            return Err(EngineError::HasRooms(id));
        }

        let event = Event::HomestayDeleted { id };
        self.wal_append(&event).await?;
        if let Some((_, hs)) = self.homestays.remove(&id) {
            let guard = hs.read().await;
            for e in &guard.cal.entries {
                self.entry_owner.remove(&e.id);
            }
        }
        self.homestay_rooms.remove(&id);
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn create_room(
        &self,
        id: Ulid,
        homestay_id: Ulid,
        name: Option<String>,
    ) -> Result<(), EngineError> {
        let _quiesce = self.maintenance.read().await;
        validate_name(&name)?;
        if self.rooms.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if !self.homestays.contains_key(&homestay_id) {
            return Err(EngineError::NotFound(homestay_id));
        }
        if let Some(kids) = self.homestay_rooms.get(&homestay_id)
            && kids.len() >= MAX_ROOMS_PER_HOMESTAY
        {
            return Err(EngineError::LimitExceeded("too many rooms in homestay"));
        }

        let event = Event::RoomCreated {
            id,
            homestay_id,
            name: name.clone(),
        };
        self.wal_append(&event).await?;
        let rs = RoomState::new(id, homestay_id, name);
        self.rooms.insert(id, Arc::new(RwLock::new(rs)));
        self.homestay_rooms.entry(homestay_id).or_default().push(id);
        self.notify.send(id, &event);
        self.notify.send(homestay_id, &event);
        Ok(())
    }

    pub async fn update_room(&self, id: Ulid, name: Option<String>) -> Result<(), EngineError> {
        let _quiesce = self.maintenance.read().await;
        validate_name(&name)?;
        let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;
        let homestay_id = guard.homestay_id;

        let event = Event::RoomUpdated {
            id,
            name: name.clone(),
        };
        self.wal_append(&event).await?;
        guard.name = name;
        self.notify.send(id, &event);
        self.notify.send(homestay_id, &event);
        Ok(())
    }

    /// Delete a room. Refused while counted bookings remain so history
    /// cannot vanish by accident; blocks and settled bookings go with it.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let _quiesce = self.maintenance.read().await;
        let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.read().await;
        let has_counted = guard.cal.entries.iter().any(|e| {
            matches!(&e.kind, EntryKind::Booking { status, .. } if status.occupies())
        });
        if has_counted {
            return Err(EngineError::HasBookings(id));
        }
        let homestay_id = guard.homestay_id;
        drop(guard);

        let event = Event::RoomDeleted { id };
        self.wal_append(&event).await?;
        if let Some((_, rs)) = self.rooms.remove(&id) {
            let guard = rs.read().await;
            for e in &guard.cal.entries {
                self.entry_owner.remove(&e.id);
            }
        }
        if let Some(mut kids) = self.homestay_rooms.get_mut(&homestay_id) {
            kids.retain(|r| r != &id);
        }
        self.notify.send(id, &event);
        self.notify.send(homestay_id, &event);
        Ok(())
    }

    /// Guest requests a stay. The booking starts out pending (which
    /// already counts toward occupancy) and is rejected if it overlaps
    /// any counted booking, room block, or homestay-wide block.
    pub async fn request_booking(
        &self,
        id: Ulid,
        room_id: Ulid,
        range: DateRange,
        guest: Option<String>,
    ) -> Result<(), EngineError> {
        let _quiesce = self.maintenance.read().await;
        validate_stay(&range)?;
        validate_guest(&guest)?;
        let rs = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let mut guard = rs.write().await;
        if guard.cal.len() >= MAX_ENTRIES_PER_CALENDAR {
            return Err(EngineError::LimitExceeded("too many entries on calendar"));
        }
        let homestay_id = guard.homestay_id;

        // Room lock is held; homestay read comes second, always in that order.
        let hs = self
            .get_homestay(&homestay_id)
            .ok_or(EngineError::NotFound(homestay_id))?;
        {
            let hguard = hs.read().await;
            check_no_conflict(&guard.cal, &hguard.cal, &range)?;
        }

        let event = Event::BookingRequested {
            id,
            room_id,
            range,
            guest,
        };
        self.persist_and_apply_room(room_id, homestay_id, &mut guard, &event)
            .await
    }

    /// Atomically request several bookings (the multi-row INSERT). All
    /// rows are validated — against live state and against each other —
    /// before any is committed. Room locks are taken in sorted id order.
    pub async fn batch_request_bookings(
        &self,
        bookings: Vec<(Ulid, Ulid, DateRange, Option<String>)>,
    ) -> Result<(), EngineError> {
        if bookings.is_empty() {
            return Ok(());
        }
        let _quiesce = self.maintenance.read().await;
        if bookings.len() > MAX_BATCH_SIZE {
            return Err(EngineError::LimitExceeded("batch too large"));
        }
        for (_, _, range, guest) in &bookings {
            validate_stay(range)?;
            validate_guest(guest)?;
        }

        let mut room_ids: Vec<Ulid> = bookings.iter().map(|(_, rid, _, _)| *rid).collect();
        room_ids.sort();
        room_ids.dedup();

        let mut guards = Vec::with_capacity(room_ids.len());
        let mut guard_idx = HashMap::new();
        for rid in &room_ids {
            let rs = self.get_room(rid).ok_or(EngineError::NotFound(*rid))?;
            let guard = rs.write_owned().await;
            if guard.cal.len() >= MAX_ENTRIES_PER_CALENDAR {
                return Err(EngineError::LimitExceeded("too many entries on calendar"));
            }
            guard_idx.insert(*rid, guards.len());
            guards.push(guard);
        }

        // Snapshot the block calendars of the homestays involved. Room
        // write locks are already held; homestay reads follow, keeping
        // the room-then-homestay order.
        let mut homestay_cals: HashMap<Ulid, Calendar> = HashMap::new();
        for guard in &guards {
            let hid = guard.homestay_id;
            if !homestay_cals.contains_key(&hid) {
                let hs = self.get_homestay(&hid).ok_or(EngineError::NotFound(hid))?;
                let cal = hs.read().await.cal.clone();
                homestay_cals.insert(hid, cal);
            }
        }

        // Phase 1: validate every row against current state + intra-batch.
        let mut by_room: HashMap<Ulid, Vec<(Ulid, DateRange)>> = HashMap::new();
        for (id, rid, range, _) in &bookings {
            by_room.entry(*rid).or_default().push((*id, *range));
        }

        for (rid, batch) in &by_room {
            let guard = &guards[guard_idx[rid]];
            let homestay_cal = &homestay_cals[&guard.homestay_id];

            for (_, range) in batch {
                check_no_conflict(&guard.cal, homestay_cal, range)?;
            }

            for i in 0..batch.len() {
                for j in (i + 1)..batch.len() {
                    if batch[i].1.overlaps(&batch[j].1) {
                        return Err(EngineError::Conflict(batch[i].0));
                    }
                }
            }
        }

        // Phase 2: all validated — commit every row.
        for (id, room_id, range, guest) in bookings {
            let event = Event::BookingRequested {
                id,
                room_id,
                range,
                guest,
            };
            self.wal_append(&event).await?;
            let idx = guard_idx[&room_id];
            let homestay_id = guards[idx].homestay_id;
            apply_entry(&mut guards[idx].cal, room_id, &event, &self.entry_owner);
            self.notify.send(room_id, &event);
            self.notify.send(homestay_id, &event);
        }

        Ok(())
    }

    /// Drive the booking lifecycle. Only the transitions of the status
    /// table are accepted; everything else is an error.
    pub async fn set_booking_status(
        &self,
        id: Ulid,
        status: BookingStatus,
    ) -> Result<Ulid, EngineError> {
        let _quiesce = self.maintenance.read().await;
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let current = match guard.cal.get(id) {
            Some(CalendarEntry {
                kind: EntryKind::Booking { status, .. },
                ..
            }) => *status,
            _ => return Err(EngineError::NotFound(id)),
        };
        if !current.can_transition_to(status) {
            return Err(EngineError::IllegalTransition {
                from: current,
                to: status,
            });
        }
        let homestay_id = guard.homestay_id;

        let event = Event::BookingStatusChanged {
            id,
            room_id,
            status,
        };
        self.persist_and_apply_room(room_id, homestay_id, &mut guard, &event)
            .await?;
        Ok(room_id)
    }

    /// Hard-remove a booking regardless of status.
    pub async fn remove_booking(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let _quiesce = self.maintenance.read().await;
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        if !matches!(
            guard.cal.get(id),
            Some(CalendarEntry {
                kind: EntryKind::Booking { .. },
                ..
            })
        ) {
            return Err(EngineError::NotFound(id));
        }
        let homestay_id = guard.homestay_id;

        let event = Event::BookingRemoved { id, room_id };
        self.persist_and_apply_room(room_id, homestay_id, &mut guard, &event)
            .await?;
        Ok(room_id)
    }

    /// Host marks dates unavailable, homestay-wide or pinned to a room.
    /// Blocks are additive: overlapping existing bookings or blocks is
    /// never an error.
    pub async fn add_block(
        &self,
        id: Ulid,
        homestay_id: Ulid,
        room_id: Option<Ulid>,
        range: DateRange,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        let _quiesce = self.maintenance.read().await;
        validate_stay(&range)?;
        validate_reason(&reason)?;
        if !self.homestays.contains_key(&homestay_id) {
            return Err(EngineError::NotFound(homestay_id));
        }

        let event = Event::BlockAdded {
            id,
            homestay_id,
            room_id,
            range,
            reason,
        };

        match room_id {
            Some(rid) => {
                let rs = self.get_room(&rid).ok_or(EngineError::NotFound(rid))?;
                let mut guard = rs.write().await;
                if guard.homestay_id != homestay_id {
                    return Err(EngineError::WrongHomestay {
                        room_id: rid,
                        homestay_id,
                    });
                }
                if guard.cal.len() >= MAX_ENTRIES_PER_CALENDAR {
                    return Err(EngineError::LimitExceeded("too many entries on calendar"));
                }
                self.persist_and_apply_room(rid, homestay_id, &mut guard, &event)
                    .await
            }
            None => {
                let hs = self
                    .get_homestay(&homestay_id)
                    .ok_or(EngineError::NotFound(homestay_id))?;
                let mut guard = hs.write().await;
                if guard.cal.len() >= MAX_ENTRIES_PER_CALENDAR {
                    return Err(EngineError::LimitExceeded("too many entries on calendar"));
                }
                self.persist_and_apply_homestay(homestay_id, &mut guard, &event)
                    .await
            }
        }
    }

    /// Re-date a block; the reason is preserved.
    pub async fn update_block(&self, id: Ulid, range: DateRange) -> Result<(), EngineError> {
        let _quiesce = self.maintenance.read().await;
        validate_stay(&range)?;
        let owner = self.owner_of_entry(&id).ok_or(EngineError::NotFound(id))?;

        if let Some(rs) = self.get_room(&owner) {
            let mut guard = rs.write().await;
            let reason = match guard.cal.get(id) {
                Some(CalendarEntry {
                    kind: EntryKind::Block { reason },
                    ..
                }) => reason.clone(),
                _ => return Err(EngineError::NotFound(id)),
            };
            let homestay_id = guard.homestay_id;
            let event = Event::BlockUpdated {
                id,
                homestay_id,
                room_id: Some(owner),
                range,
                reason,
            };
            self.persist_and_apply_room(owner, homestay_id, &mut guard, &event)
                .await
        } else {
            let hs = self.get_homestay(&owner).ok_or(EngineError::NotFound(id))?;
            let mut guard = hs.write().await;
            let reason = match guard.cal.get(id) {
                Some(CalendarEntry {
                    kind: EntryKind::Block { reason },
                    ..
                }) => reason.clone(),
                _ => return Err(EngineError::NotFound(id)),
            };
            let event = Event::BlockUpdated {
                id,
                homestay_id: owner,
                room_id: None,
                range,
                reason,
            };
            self.persist_and_apply_homestay(owner, &mut guard, &event)
                .await
        }
    }

    pub async fn remove_block(&self, id: Ulid) -> Result<(), EngineError> {
        let _quiesce = self.maintenance.read().await;
        let owner = self.owner_of_entry(&id).ok_or(EngineError::NotFound(id))?;

        if let Some(rs) = self.get_room(&owner) {
            let mut guard = rs.write().await;
            if !matches!(
                guard.cal.get(id),
                Some(CalendarEntry {
                    kind: EntryKind::Block { .. },
                    ..
                })
            ) {
                return Err(EngineError::NotFound(id));
            }
            let homestay_id = guard.homestay_id;
            let event = Event::BlockRemoved {
                id,
                homestay_id,
                room_id: Some(owner),
            };
            self.persist_and_apply_room(owner, homestay_id, &mut guard, &event)
                .await
        } else {
            let hs = self.get_homestay(&owner).ok_or(EngineError::NotFound(id))?;
            let mut guard = hs.write().await;
            if !matches!(
                guard.cal.get(id),
                Some(CalendarEntry {
                    kind: EntryKind::Block { .. },
                    ..
                })
            ) {
                return Err(EngineError::NotFound(id));
            }
            let event = Event::BlockRemoved {
                id,
                homestay_id: owner,
                room_id: None,
            };
            self.persist_and_apply_homestay(owner, &mut guard, &event)
                .await
        }
    }

    /// Settled bookings whose checkout is before `horizon`, for the
    /// retention sweeper. Returns (booking_id, room_id) pairs.
    pub fn collect_settled_bookings(&self, horizon: NaiveDate) -> Vec<(Ulid, Ulid)> {
        let mut settled = Vec::new();
        for entry in self.rooms.iter() {
            let rs = entry.value().clone();
            if let Ok(guard) = rs.try_read() {
                for e in &guard.cal.entries {
                    if let EntryKind::Booking { status, .. } = &e.kind
                        && status.is_settled()
                        && e.range.end < horizon
                    {
                        settled.push((e.id, guard.id));
                    }
                }
            }
        }
        settled
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state. The maintenance lock is held exclusively
    /// until the writer task has swapped the file, so the snapshot below
    /// cannot miss a write racing into the old WAL.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _quiesce = self.maintenance.write().await;
        let mut events = Vec::new();

        let homestay_ids: Vec<Ulid> = self.homestays.iter().map(|e| *e.key()).collect();
        for hid in homestay_ids {
            let Some(hs) = self.get_homestay(&hid) else {
                continue;
            };
            let hguard = hs.read().await;
            events.push(Event::HomestayCreated {
                id: hguard.id,
                name: hguard.name.clone(),
            });
            for e in &hguard.cal.entries {
                if let EntryKind::Block { reason } = &e.kind {
                    events.push(Event::BlockAdded {
                        id: e.id,
                        homestay_id: hguard.id,
                        room_id: None,
                        range: e.range,
                        reason: reason.clone(),
                    });
                }
            }
            drop(hguard);

            let room_ids: Vec<Ulid> = self
                .homestay_rooms
                .get(&hid)
                .map(|kids| kids.clone())
                .unwrap_or_default();
            for rid in room_ids {
                let Some(rs) = self.get_room(&rid) else {
                    continue;
                };
                let rguard = rs.read().await;
                events.push(Event::RoomCreated {
                    id: rguard.id,
                    homestay_id: rguard.homestay_id,
                    name: rguard.name.clone(),
                });
                for e in &rguard.cal.entries {
                    match &e.kind {
                        EntryKind::Booking { status, guest } => {
                            events.push(Event::BookingRequested {
                                id: e.id,
                                room_id: rguard.id,
                                range: e.range,
                                guest: guest.clone(),
                            });
                            if *status != BookingStatus::Pending {
                                events.push(Event::BookingStatusChanged {
                                    id: e.id,
                                    room_id: rguard.id,
                                    status: *status,
                                });
                            }
                        }
                        EntryKind::Block { reason } => {
                            events.push(Event::BlockAdded {
                                id: e.id,
                                homestay_id: rguard.homestay_id,
                                room_id: Some(rguard.id),
                                range: e.range,
                                reason: reason.clone(),
                            });
                        }
                    }
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
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

fn validate_name(name: &Option<String>) -> Result<(), EngineError> {
    if let Some(n) = name
        && n.len() > MAX_NAME_LEN
    {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

fn validate_guest(guest: &Option<String>) -> Result<(), EngineError> {
    if let Some(g) = guest
        && g.len() > MAX_GUEST_LEN
    {
        return Err(EngineError::LimitExceeded("guest too long"));
    }
    Ok(())
}

fn validate_reason(reason: &Option<String>) -> Result<(), EngineError> {
    if let Some(r) = reason
        && r.len() > MAX_REASON_LEN
    {
        return Err(EngineError::LimitExceeded("reason too long"));
    }
    Ok(())
}
