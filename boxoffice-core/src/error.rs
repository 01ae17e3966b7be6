/// Failures reported by a seat store.
///
/// The service never forwards the lock/confirm variants to its callers; they
/// are logged and collapsed into [`SeatError::SeatLockFailed`] or
/// [`SeatError::SeatConfirmationFailed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Seat not found for show: {0}")]
    SeatNotFound(i64),

    #[error("Seat already booked: {0}")]
    SeatAlreadyBooked(i64),

    #[error("Seat locked by another booking: {0}")]
    SeatHeldByOtherBooking(i64),

    #[error("Seat not locked: {0}")]
    SeatNotLocked(i64),

    #[error("Seat lock expired: {0}")]
    LockExpired(i64),

    #[error("No seats held for booking: {0}")]
    NoSeatsForBooking(i64),

    #[error("Corrupt seat record: {0}")]
    CorruptRecord(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeatError {
    #[error("No seats provided")]
    NoSeatsProvided,

    #[error("Duplicate seat ids provided")]
    DuplicateSeatIds,

    #[error("Lock duration must be positive and representable")]
    InvalidLockDuration,

    #[error("One or more seats could not be locked")]
    SeatLockFailed,

    #[error("One or more seats could not be booked")]
    SeatConfirmationFailed,

    #[error(transparent)]
    Store(#[from] StoreError),
}
