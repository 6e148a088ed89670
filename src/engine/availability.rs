use crate::model::*;

// ── Availability core ─────────────────────────────────────────────
//
// Pure functions over a snapshot of calendar entries. The engine
// collects the entries for a target under short-lived read guards and
// everything below runs on plain slices.

/// Collect the busy ranges of a calendar inside `window`: counted
/// bookings and every block, each clamped to the window. Settled
/// bookings contribute nothing.
pub fn collect_busy(cal: &Calendar, window: &DateRange, out: &mut Vec<DateRange>) {
    for entry in cal.overlapping(window) {
        if entry.occupies() {
            out.push(DateRange::new(
                entry.range.start.max(window.start),
                entry.range.end.min(window.end),
            ));
        }
    }
}

/// Collect the busy ranges of a calendar with no window: every counted
/// booking and block, unclamped.
pub fn collect_busy_all(cal: &Calendar, out: &mut Vec<DateRange>) {
    for entry in &cal.entries {
        if entry.occupies() {
            out.push(entry.range);
        }
    }
}

/// Merge sorted overlapping or adjacent ranges into disjoint ranges.
/// Adjacent means the next start equals the current end: a block ending
/// on checkout day and one starting the same day render as one bar.
pub fn merge_overlapping(sorted: &[DateRange]) -> Vec<DateRange> {
    let mut merged: Vec<DateRange> = Vec::new();
    for &range in sorted {
        if let Some(last) = merged.last_mut()
            && range.start <= last.end
        {
            last.end = last.end.max(range.end);
            continue;
        }
        merged.push(range);
    }
    merged
}

/// Subtract sorted, merged `busy` ranges from sorted `base` ranges.
pub fn subtract_ranges(base: &[DateRange], busy: &[DateRange]) -> Vec<DateRange> {
    let mut result = Vec::new();
    let mut bi = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while bi < busy.len() && busy[bi].end <= current_start {
            bi += 1;
        }

        let mut j = bi;
        while j < busy.len() && busy[j].start < current_end {
            let r = &busy[j];
            if r.start > current_start {
                result.push(DateRange::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(DateRange::new(current_start, current_end));
        }
    }

    result
}

/// Free ranges inside `window` given the unsorted busy ranges collected
/// for a target. Gaps shorter than `min_nights` are dropped.
pub fn free_ranges(
    window: &DateRange,
    mut busy: Vec<DateRange>,
    min_nights: Option<i64>,
) -> Vec<DateRange> {
    busy.sort_by_key(|r| r.start);
    let busy = merge_overlapping(&busy);
    let mut free = subtract_ranges(&[*window], &busy);
    if let Some(min) = min_nights {
        free.retain(|r| r.nights() >= min);
    }
    free
}

/// Merged busy ranges for calendar rendering.
pub fn merged_busy(mut busy: Vec<DateRange>) -> Vec<DateRange> {
    busy.sort_by_key(|r| r.start);
    merge_overlapping(&busy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn r(a: NaiveDate, b: NaiveDate) -> DateRange {
        DateRange::new(a, b)
    }

    fn cal_with(entries: Vec<CalendarEntry>) -> Calendar {
        let mut cal = Calendar::default();
        for e in entries {
            cal.insert(e);
        }
        cal
    }

    fn booking(range: DateRange, status: BookingStatus) -> CalendarEntry {
        CalendarEntry {
            id: Ulid::new(),
            range,
            kind: EntryKind::Booking {
                status,
                guest: None,
            },
        }
    }

    fn block(range: DateRange) -> CalendarEntry {
        CalendarEntry {
            id: Ulid::new(),
            range,
            kind: EntryKind::Block { reason: None },
        }
    }

    // ── subtract_ranges ───────────────────────────────────

    #[test]
    fn subtract_no_overlap() {
        let base = vec![r(d(1, 1), d(1, 10)), r(d(2, 1), d(2, 10))];
        let busy = vec![r(d(1, 10), d(2, 1))];
        assert_eq!(subtract_ranges(&base, &busy), base);
    }

    #[test]
    fn subtract_full_overlap() {
        let base = vec![r(d(3, 5), d(3, 10))];
        let busy = vec![r(d(3, 1), d(3, 20))];
        assert!(subtract_ranges(&base, &busy).is_empty());
    }

    #[test]
    fn subtract_partial_left() {
        let base = vec![r(d(3, 5), d(3, 15))];
        let busy = vec![r(d(3, 1), d(3, 10))];
        assert_eq!(subtract_ranges(&base, &busy), vec![r(d(3, 10), d(3, 15))]);
    }

    #[test]
    fn subtract_partial_right() {
        let base = vec![r(d(3, 5), d(3, 15))];
        let busy = vec![r(d(3, 10), d(3, 20))];
        assert_eq!(subtract_ranges(&base, &busy), vec![r(d(3, 5), d(3, 10))]);
    }

    #[test]
    fn subtract_middle_punch() {
        let base = vec![r(d(3, 1), d(3, 31))];
        let busy = vec![r(d(3, 10), d(3, 15))];
        assert_eq!(
            subtract_ranges(&base, &busy),
            vec![r(d(3, 1), d(3, 10)), r(d(3, 15), d(3, 31))]
        );
    }

    #[test]
    fn subtract_multiple_punches() {
        let base = vec![r(d(6, 1), d(6, 30))];
        let busy = vec![
            r(d(6, 3), d(6, 5)),
            r(d(6, 10), d(6, 12)),
            r(d(6, 20), d(6, 25)),
        ];
        assert_eq!(
            subtract_ranges(&base, &busy),
            vec![
                r(d(6, 1), d(6, 3)),
                r(d(6, 5), d(6, 10)),
                r(d(6, 12), d(6, 20)),
                r(d(6, 25), d(6, 30)),
            ]
        );
    }

    // ── merge_overlapping ─────────────────────────────────

    #[test]
    fn merge_overlapping_basic() {
        let ranges = vec![
            r(d(3, 1), d(3, 10)),
            r(d(3, 5), d(3, 15)),
            r(d(3, 20), d(3, 25)),
        ];
        assert_eq!(
            merge_overlapping(&ranges),
            vec![r(d(3, 1), d(3, 15)), r(d(3, 20), d(3, 25))]
        );
    }

    #[test]
    fn merge_adjacent_coalesces() {
        let ranges = vec![r(d(3, 1), d(3, 5)), r(d(3, 5), d(3, 8))];
        assert_eq!(merge_overlapping(&ranges), vec![r(d(3, 1), d(3, 8))]);
    }

    // ── collect_busy ──────────────────────────────────────

    #[test]
    fn collect_busy_filters_settled() {
        let cal = cal_with(vec![
            booking(r(d(2, 10), d(2, 15)), BookingStatus::Confirmed),
            booking(r(d(2, 16), d(2, 20)), BookingStatus::Cancelled),
            booking(r(d(2, 21), d(2, 25)), BookingStatus::Rejected),
            block(r(d(2, 26), d(2, 28))),
        ]);
        let mut busy = Vec::new();
        collect_busy(&cal, &r(d(2, 1), d(3, 1)), &mut busy);
        assert_eq!(busy, vec![r(d(2, 10), d(2, 15)), r(d(2, 26), d(2, 28))]);
    }

    #[test]
    fn collect_busy_clamps_to_window() {
        let cal = cal_with(vec![booking(
            r(d(1, 1), d(12, 31)),
            BookingStatus::Verified,
        )]);
        let mut busy = Vec::new();
        collect_busy(&cal, &r(d(6, 1), d(6, 10)), &mut busy);
        assert_eq!(busy, vec![r(d(6, 1), d(6, 10))]);
    }

    #[test]
    fn collect_busy_pending_counts() {
        let cal = cal_with(vec![booking(r(d(2, 10), d(2, 15)), BookingStatus::Pending)]);
        let mut busy = Vec::new();
        collect_busy(&cal, &r(d(2, 1), d(3, 1)), &mut busy);
        assert_eq!(busy.len(), 1);
    }

    // ── free_ranges ───────────────────────────────────────

    #[test]
    fn free_ranges_whole_window_when_empty() {
        let window = r(d(4, 1), d(4, 30));
        assert_eq!(free_ranges(&window, vec![], None), vec![window]);
    }

    #[test]
    fn free_ranges_subtracts_busy() {
        let window = r(d(4, 1), d(4, 30));
        let busy = vec![r(d(4, 10), d(4, 15)), r(d(4, 12), d(4, 20))];
        assert_eq!(
            free_ranges(&window, busy, None),
            vec![r(d(4, 1), d(4, 10)), r(d(4, 20), d(4, 30))]
        );
    }

    #[test]
    fn free_ranges_min_nights_drops_short_gaps() {
        let window = r(d(4, 1), d(4, 30));
        let busy = vec![r(d(4, 3), d(4, 10)), r(d(4, 12), d(4, 20))];
        // Gaps: [1,3) = 2 nights, [10,12) = 2 nights, [20,30) = 10 nights
        assert_eq!(
            free_ranges(&window, busy, Some(3)),
            vec![r(d(4, 20), d(4, 30))]
        );
    }

    // ── merged_busy ───────────────────────────────────────

    #[test]
    fn merged_busy_merges_adjacent_blocks() {
        // The two blocks share a boundary day and render as one range
        let busy = vec![r(d(3, 1), d(3, 5)), r(d(3, 5), d(3, 8))];
        assert_eq!(merged_busy(busy), vec![r(d(3, 1), d(3, 8))]);
    }

    #[test]
    fn merged_busy_sorts_first() {
        let busy = vec![r(d(3, 20), d(3, 25)), r(d(3, 1), d(3, 5))];
        assert_eq!(
            merged_busy(busy),
            vec![r(d(3, 1), d(3, 5)), r(d(3, 20), d(3, 25))]
        );
    }
}
