use crate::error::StoreError;
use crate::models::ShowSeat;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Persistence contract for show-seat reservation state.
///
/// Every operation must be atomic with respect to every other operation on
/// the same show. Implementations serialize all mutations of a seat record;
/// the service layer adds no locking of its own.
#[async_trait]
pub trait SeatRepository: Send + Sync {
    /// All seats of the show ordered by show-seat id, with locks whose
    /// deadline is at or before `now` presented as `Unlocked`.
    async fn list_seats(
        &self,
        show_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ShowSeat>, StoreError>;

    /// Locks every listed seat for `booking_id` until `lock_until`, or none.
    ///
    /// Fails if a seat is missing from the show, already booked, or held by a
    /// live lock of another booking. Expired locks are free; a live lock of the
    /// same booking is refreshed. `locked_at` is the store's own operation time.
    async fn lock_seats(
        &self,
        show_id: i64,
        seat_ids: &[i64],
        booking_id: i64,
        lock_until: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Moves every seat the booking holds in this show from `Locked` to
    /// `Booked`, skipping seats that are already booked. Fails without
    /// changes if any of them is unlocked or its lock has expired, or if the
    /// booking holds no seat in the show.
    async fn book_locked_seats(
        &self,
        show_id: i64,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Resets every lock whose deadline is at or before `now` to `Unlocked`.
    /// Returns the number of seats reclaimed.
    async fn release_expired_locks(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Drops the locks a booking holds in this show. Booked seats stay booked.
    /// Returns the number of seats released.
    async fn release_booking_locks(&self, show_id: i64, booking_id: i64) -> Result<u64, StoreError>;
}
