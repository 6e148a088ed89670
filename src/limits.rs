//! Named bounds enforced at the engine boundary. Exceeding any of them
//! fails the one command that crossed it with `LimitExceeded`.

pub const MAX_HOMESTAYS_PER_TENANT: usize = 10_000;
pub const MAX_ROOMS_PER_HOMESTAY: usize = 1_000;

/// Bookings plus blocks on a single calendar.
pub const MAX_ENTRIES_PER_CALENDAR: usize = 100_000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_GUEST_LEN: usize = 256;
pub const MAX_REASON_LEN: usize = 512;

/// Rows in one multi-row booking INSERT.
pub const MAX_BATCH_SIZE: usize = 100;

/// Longest stay or manual block, in nights.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Widest calendar window a single query may inspect.
pub const MAX_QUERY_WINDOW_NIGHTS: i64 = 3 * 366;

/// Dates outside this year range are rejected outright; they are
/// always typos, and keeping them out bounds calendar arithmetic.
pub const MIN_VALID_YEAR: i32 = 2000;
pub const MAX_VALID_YEAR: i32 = 2100;

pub const MAX_TENANTS: usize = 64;
pub const MAX_TENANT_NAME_LEN: usize = 128;
