use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open date range `[start, end)` — the checkout day is not occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Construction is unchecked; `start >= end` is caught by the engine's
    /// range validation, never here, so client input cannot panic.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    #[allow(dead_code)]
    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }

    /// Returns true if `self` fully contains `other`.
    #[allow(dead_code)]
    pub fn contains_range(&self, other: &DateRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Booking lifecycle. Only `OCCUPYING` statuses count toward availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Verified,
    Cancelled,
    Rejected,
}

/// The one place that defines which statuses occupy dates.
pub const OCCUPYING: &[BookingStatus] = &[
    BookingStatus::Pending,
    BookingStatus::Confirmed,
    BookingStatus::Verified,
];

impl BookingStatus {
    pub fn occupies(self) -> bool {
        OCCUPYING.contains(&self)
    }

    /// Cancelled and rejected bookings are settled: they no longer count
    /// and may be swept once old enough.
    pub fn is_settled(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Rejected)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Pending, Rejected)
                | (Confirmed, Verified)
                | (Confirmed, Cancelled)
                | (Verified, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Verified => "verified",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<BookingStatus> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "verified" => Some(BookingStatus::Verified),
            "cancelled" => Some(BookingStatus::Cancelled),
            "rejected" => Some(BookingStatus::Rejected),
            _ => None,
        }
    }
}

/// What a calendar entry represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// A guest reservation with a lifecycle status.
    Booking {
        status: BookingStatus,
        guest: Option<String>,
    },
    /// Host-marked unavailability, independent of bookings.
    Block { reason: Option<String> },
}

/// A single entry on a calendar — bookings and blocks are both just entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub id: Ulid,
    pub range: DateRange,
    pub kind: EntryKind,
}

impl CalendarEntry {
    /// Whether this entry makes its dates unavailable right now.
    pub fn occupies(&self) -> bool {
        match &self.kind {
            EntryKind::Booking { status, .. } => status.occupies(),
            EntryKind::Block { .. } => true,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self.kind, EntryKind::Block { .. })
    }
}

/// Entries sorted by `range.start`.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    pub entries: Vec<CalendarEntry>,
}

impl Calendar {
    /// Insert an entry maintaining sort order by range.start.
    pub fn insert(&mut self, entry: CalendarEntry) {
        let pos = self
            .entries
            .binary_search_by_key(&entry.range.start, |e| e.range.start)
            .unwrap_or_else(|e| e);
        self.entries.insert(pos, entry);
    }

    pub fn remove(&mut self, id: Ulid) -> Option<CalendarEntry> {
        if let Some(pos) = self.entries.iter().position(|e| e.id == id) {
            Some(self.entries.remove(pos))
        } else {
            None
        }
    }

    pub fn get(&self, id: Ulid) -> Option<&CalendarEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: Ulid) -> Option<&mut CalendarEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Return only entries whose range overlaps the query window.
    /// Uses binary search to skip entries starting at or after `query.end`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &CalendarEntry> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self.entries.partition_point(|e| e.range.start < query.end);
        self.entries[..right_bound]
            .iter()
            .filter(move |e| e.range.end > query.start)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub homestay_id: Ulid,
    pub name: Option<String>,
    /// The room's bookings and room-scoped blocks.
    pub cal: Calendar,
}

impl RoomState {
    pub fn new(id: Ulid, homestay_id: Ulid, name: Option<String>) -> Self {
        Self {
            id,
            homestay_id,
            name,
            cal: Calendar::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HomestayState {
    pub id: Ulid,
    pub name: Option<String>,
    /// Homestay-wide blocks only; everything room-scoped lives on the room.
    pub cal: Calendar,
}

impl HomestayState {
    pub fn new(id: Ulid, name: Option<String>) -> Self {
        Self {
            id,
            name,
            cal: Calendar::default(),
        }
    }
}

/// What an availability query is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetId {
    Room(Ulid),
    Homestay(Ulid),
}

impl TargetId {
    pub fn id(self) -> Ulid {
        match self {
            TargetId::Room(id) | TargetId::Homestay(id) => id,
        }
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    HomestayCreated {
        id: Ulid,
        name: Option<String>,
    },
    HomestayUpdated {
        id: Ulid,
        name: Option<String>,
    },
    HomestayDeleted {
        id: Ulid,
    },
    RoomCreated {
        id: Ulid,
        homestay_id: Ulid,
        name: Option<String>,
    },
    RoomUpdated {
        id: Ulid,
        name: Option<String>,
    },
    RoomDeleted {
        id: Ulid,
    },
    BookingRequested {
        id: Ulid,
        room_id: Ulid,
        range: DateRange,
        guest: Option<String>,
    },
    BookingStatusChanged {
        id: Ulid,
        room_id: Ulid,
        status: BookingStatus,
    },
    BookingRemoved {
        id: Ulid,
        room_id: Ulid,
    },
    BlockAdded {
        id: Ulid,
        homestay_id: Ulid,
        room_id: Option<Ulid>,
        range: DateRange,
        reason: Option<String>,
    },
    BlockUpdated {
        id: Ulid,
        homestay_id: Ulid,
        room_id: Option<Ulid>,
        range: DateRange,
        reason: Option<String>,
    },
    BlockRemoved {
        id: Ulid,
        homestay_id: Ulid,
        room_id: Option<Ulid>,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomestayInfo {
    pub id: Ulid,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: Ulid,
    pub homestay_id: Ulid,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingInfo {
    pub id: Ulid,
    pub room_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: BookingStatus,
    pub guest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub id: Ulid,
    pub homestay_id: Ulid,
    pub room_id: Option<Ulid>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: Option<String>,
}
