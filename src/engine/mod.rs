mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::{
    collect_busy, collect_busy_all, free_ranges, merge_overlapping, merged_busy, subtract_ranges,
};
pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedHomestayState = Arc<RwLock<HomestayState>>;
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
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &mut batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &mut batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
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
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// Per-tenant booking state: homestays, their rooms, and the calendars
/// of bookings and blocks. Rebuilt from the WAL on open; every write is
/// validated, appended, applied, then broadcast.
pub struct Engine {
    pub homestays: DashMap<Ulid, SharedHomestayState>,
    pub rooms: DashMap<Ulid, SharedRoomState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reverse lookup: booking/block id → id of the calendar that holds it
    /// (a room id, or a homestay id for homestay-wide blocks).
    pub(super) entry_owner: DashMap<Ulid, Ulid>,
    /// Homestay → room ids, for homestay-level queries.
    pub(super) homestay_rooms: DashMap<Ulid, Vec<Ulid>>,
    /// Compaction quiesce lock. Every mutation holds it shared across its
    /// append-then-apply sequence; `compact_wal` holds it exclusively so no
    /// event can land in the old WAL between the snapshot and the rewrite.
    pub(super) maintenance: RwLock<()>,
}

/// Apply an entry-level event to a calendar (no locking — caller holds
/// the owner's lock). Replay and live writes both come through here so
/// state is built one way only.
fn apply_entry(cal: &mut Calendar, owner: Ulid, event: &Event, entry_owner: &DashMap<Ulid, Ulid>) {
    match event {
        Event::BookingRequested {
            id, range, guest, ..
        } => {
            cal.insert(CalendarEntry {
                id: *id,
                range: *range,
                kind: EntryKind::Booking {
                    status: BookingStatus::Pending,
                    guest: guest.clone(),
                },
            });
            entry_owner.insert(*id, owner);
        }
        Event::BookingStatusChanged { id, status, .. } => {
            if let Some(entry) = cal.get_mut(*id)
                && let EntryKind::Booking { status: s, .. } = &mut entry.kind
            {
                *s = *status;
            }
        }
        Event::BookingRemoved { id, .. } => {
            cal.remove(*id);
            entry_owner.remove(id);
        }
        Event::BlockAdded {
            id, range, reason, ..
        } => {
            cal.insert(CalendarEntry {
                id: *id,
                range: *range,
                kind: EntryKind::Block {
                    reason: reason.clone(),
                },
            });
            entry_owner.insert(*id, owner);
        }
        Event::BlockUpdated {
            id, range, reason, ..
        } => {
            // Re-insert so the sort order follows the new start date
            cal.remove(*id);
            cal.insert(CalendarEntry {
                id: *id,
                range: *range,
                kind: EntryKind::Block {
                    reason: reason.clone(),
                },
            });
        }
        Event::BlockRemoved { id, .. } => {
            cal.remove(*id);
            entry_owner.remove(id);
        }
        _ => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> std::io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            homestays: DashMap::new(),
            rooms: DashMap::new(),
            wal_tx,
            notify,
            entry_owner: DashMap::new(),
            homestay_rooms: DashMap::new(),
            maintenance: RwLock::new(()),
        };

        // Replay — we're the sole owner of these Arcs, so try_read/try_write
        // always succeed instantly. Never use blocking_read/blocking_write
        // here because this may run inside an async context (lazy tenant open).
        for event in &events {
            match event {
                Event::HomestayCreated { id, name } => {
                    let hs = HomestayState::new(*id, name.clone());
                    engine.homestays.insert(*id, Arc::new(RwLock::new(hs)));
                    engine.homestay_rooms.entry(*id).or_default();
                }
                Event::HomestayUpdated { id, name } => {
                    if let Some(entry) = engine.homestays.get(id) {
                        let hs = entry.value().clone();
                        hs.try_write().expect("replay: uncontended write").name = name.clone();
                    }
                }
                Event::HomestayDeleted { id } => {
                    if let Some((_, hs)) = engine.homestays.remove(id) {
                        let guard = hs.try_read().expect("replay: uncontended read");
                        for e in &guard.cal.entries {
                            engine.entry_owner.remove(&e.id);
                        }
                    }
                    engine.homestay_rooms.remove(id);
                }
                Event::RoomCreated {
                    id,
                    homestay_id,
                    name,
                } => {
                    let rs = RoomState::new(*id, *homestay_id, name.clone());
                    engine.rooms.insert(*id, Arc::new(RwLock::new(rs)));
                    engine.homestay_rooms.entry(*homestay_id).or_default().push(*id);
                }
                Event::RoomUpdated { id, name } => {
                    if let Some(entry) = engine.rooms.get(id) {
                        let rs = entry.value().clone();
                        rs.try_write().expect("replay: uncontended write").name = name.clone();
                    }
                }
                Event::RoomDeleted { id } => {
                    if let Some((_, rs)) = engine.rooms.remove(id) {
                        let guard = rs.try_read().expect("replay: uncontended read");
                        for e in &guard.cal.entries {
                            engine.entry_owner.remove(&e.id);
                        }
                        if let Some(mut kids) = engine.homestay_rooms.get_mut(&guard.homestay_id) {
                            kids.retain(|r| r != id);
                        }
                    }
                }
                other => {
                    let Some(owner) = event_owner_id(other) else {
                        continue;
                    };
                    if let Some(entry) = engine.rooms.get(&owner) {
                        let rs = entry.value().clone();
                        let mut guard = rs.try_write().expect("replay: uncontended write");
                        apply_entry(&mut guard.cal, owner, other, &engine.entry_owner);
                    } else if let Some(entry) = engine.homestays.get(&owner) {
                        let hs = entry.value().clone();
                        let mut guard = hs.try_write().expect("replay: uncontended write");
                        apply_entry(&mut guard.cal, owner, other, &engine.entry_owner);
                    }
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
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

    pub fn get_homestay(&self, id: &Ulid) -> Option<SharedHomestayState> {
        self.homestays.get(id).map(|e| e.value().clone())
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn owner_of_entry(&self, entry_id: &Ulid) -> Option<Ulid> {
        self.entry_owner.get(entry_id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify for a room-calendar event. The event
    /// fans out on the room channel and the owning homestay's channel.
    pub(super) async fn persist_and_apply_room(
        &self,
        room_id: Ulid,
        homestay_id: Ulid,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_entry(&mut rs.cal, room_id, event, &self.entry_owner);
        self.notify.send(room_id, event);
        self.notify.send(homestay_id, event);
        Ok(())
    }

    /// WAL-append + apply + notify for a homestay-calendar event.
    pub(super) async fn persist_and_apply_homestay(
        &self,
        homestay_id: Ulid,
        hs: &mut HomestayState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_entry(&mut hs.cal, homestay_id, event, &self.entry_owner);
        self.notify.send(homestay_id, event);
        Ok(())
    }

    /// Lookup a booking's owning room and acquire its write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .owner_of_entry(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.write_owned().await;
        Ok((room_id, guard))
    }
}

/// Extract the calendar-owner id from an entry-level event.
fn event_owner_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::BookingRequested { room_id, .. }
        | Event::BookingStatusChanged { room_id, .. }
        | Event::BookingRemoved { room_id, .. } => Some(*room_id),
        Event::BlockAdded {
            homestay_id,
            room_id,
            ..
        }
        | Event::BlockUpdated {
            homestay_id,
            room_id,
            ..
        }
        | Event::BlockRemoved {
            homestay_id,
            room_id,
            ..
        } => Some(room_id.unwrap_or(*homestay_id)),
        _ => None,
    }
}
