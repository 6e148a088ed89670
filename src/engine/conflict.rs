use chrono::Datelike;

use crate::model::*;

use super::EngineError;

/// Range checks shared by bookings, blocks and queries: non-empty and
/// inside the valid year window.
pub(crate) fn validate_range(range: &DateRange) -> Result<(), EngineError> {
    use crate::limits::*;
    if range.start >= range.end {
        return Err(EngineError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }
    if range.start.year() < MIN_VALID_YEAR || range.end.year() > MAX_VALID_YEAR {
        return Err(EngineError::LimitExceeded("date out of valid year range"));
    }
    Ok(())
}

/// A booking or block being written to a calendar.
pub(crate) fn validate_stay(range: &DateRange) -> Result<(), EngineError> {
    validate_range(range)?;
    if range.nights() > crate::limits::MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// A calendar window being queried.
pub(crate) fn validate_window(range: &DateRange) -> Result<(), EngineError> {
    validate_range(range)?;
    if range.nights() > crate::limits::MAX_QUERY_WINDOW_NIGHTS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

/// Write-path overlap check for a new booking: any counted booking or
/// block on the room, or homestay-wide block, that overlaps the range
/// is a conflict naming the existing entry. Blocks never go through
/// this — adding a block is always allowed.
pub(crate) fn check_no_conflict(
    room_cal: &Calendar,
    homestay_cal: &Calendar,
    range: &DateRange,
) -> Result<(), EngineError> {
    for entry in room_cal.overlapping(range) {
        if entry.occupies() {
            return Err(EngineError::Conflict(entry.id));
        }
    }
    for entry in homestay_cal.overlapping(range) {
        if entry.occupies() {
            return Err(EngineError::Conflict(entry.id));
        }
    }
    Ok(())
}
