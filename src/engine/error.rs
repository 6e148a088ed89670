use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::BookingStatus;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed date range: start is not strictly before end.
    InvalidRange { start: NaiveDate, end: NaiveDate },
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Booking overlaps an existing counted booking or block.
    Conflict(Ulid),
    IllegalTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    /// Block names a room that belongs to a different homestay.
    WrongHomestay { room_id: Ulid, homestay_id: Ulid },
    HasRooms(Ulid),
    HasBookings(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange { start, end } => {
                write!(f, "invalid range: [{start}, {end}) is empty or reversed")
            }
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(id) => write!(f, "conflict with entry: {id}"),
            EngineError::IllegalTransition { from, to } => {
                write!(
                    f,
                    "illegal status transition: {} -> {}",
                    from.as_str(),
                    to.as_str()
                )
            }
            EngineError::WrongHomestay {
                room_id,
                homestay_id,
            } => {
                write!(f, "room {room_id} does not belong to homestay {homestay_id}")
            }
            EngineError::HasRooms(id) => {
                write!(f, "cannot delete homestay {id}: has rooms")
            }
            EngineError::HasBookings(id) => {
                write!(f, "cannot delete room {id}: has active bookings")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
