use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reservation state of a show-seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeatStatus {
    Unlocked,
    Locked,
    Booked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Unlocked => "Unlocked",
            SeatStatus::Locked => "Locked",
            SeatStatus::Booked => "Booked",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unlocked" => Ok(SeatStatus::Unlocked),
            "Locked" => Ok(SeatStatus::Locked),
            "Booked" => Ok(SeatStatus::Booked),
            other => Err(StoreError::CorruptRecord(format!("unknown seat status '{}'", other))),
        }
    }
}

/// One reservable seat for one show.
///
/// `locked_at` and `lock_expires_at` are only set while `status` is `Locked`;
/// `booking_id` is set for `Locked` and `Booked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowSeat {
    pub show_seat_id: i64,
    pub show_id: i64,
    pub seat_id: i64,
    pub status: SeatStatus,
    pub locked_at: Option<DateTime<Utc>>,
    pub lock_expires_at: Option<DateTime<Utc>>,
    pub booking_id: Option<i64>,
    pub price: i64, // minor currency units
}

impl ShowSeat {
    /// A seat as created at show setup: unlocked, no booking.
    pub fn new(show_seat_id: i64, show_id: i64, seat_id: i64, price: i64) -> Self {
        Self {
            show_seat_id,
            show_id,
            seat_id,
            status: SeatStatus::Unlocked,
            locked_at: None,
            lock_expires_at: None,
            booking_id: None,
            price,
        }
    }

    /// True while a lock is held and its deadline is still ahead of `now`.
    /// A `Locked` record without a deadline never counts as live.
    pub fn has_live_lock(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Locked
            && self.lock_expires_at.map_or(false, |expires_at| expires_at > now)
    }

    /// Stored as `Locked` but logically released.
    pub fn is_stale_lock(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Locked && !self.has_live_lock(now)
    }

    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SeatStatus::Unlocked => true,
            SeatStatus::Locked => !self.has_live_lock(now),
            SeatStatus::Booked => false,
        }
    }

    /// The record as every reader must see it at `now`: stale locks are
    /// presented as `Unlocked` with their lock fields cleared.
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        if self.is_stale_lock(now) {
            self.unlock();
        }
        self
    }

    /// Rejects the lock if the seat is booked or held live by someone else.
    /// A live lock owned by `booking_id` itself is refreshable.
    pub fn ensure_lockable(&self, booking_id: i64, now: DateTime<Utc>) -> Result<(), StoreError> {
        match self.status {
            SeatStatus::Booked => Err(StoreError::SeatAlreadyBooked(self.show_seat_id)),
            SeatStatus::Locked if self.has_live_lock(now) && self.booking_id != Some(booking_id) => {
                Err(StoreError::SeatHeldByOtherBooking(self.show_seat_id))
            }
            _ => Ok(()),
        }
    }

    /// Returns `Ok(true)` when the seat must move to `Booked`, `Ok(false)` when
    /// it already is (a retried confirmation).
    pub fn ensure_confirmable(&self, now: DateTime<Utc>) -> Result<bool, StoreError> {
        match self.status {
            SeatStatus::Booked => Ok(false),
            SeatStatus::Locked if self.has_live_lock(now) => Ok(true),
            SeatStatus::Locked => Err(StoreError::LockExpired(self.show_seat_id)),
            SeatStatus::Unlocked => Err(StoreError::SeatNotLocked(self.show_seat_id)),
        }
    }

    pub fn lock(&mut self, booking_id: i64, locked_at: DateTime<Utc>, lock_until: DateTime<Utc>) {
        self.status = SeatStatus::Locked;
        self.locked_at = Some(locked_at);
        self.lock_expires_at = Some(lock_until);
        self.booking_id = Some(booking_id);
    }

    pub fn book(&mut self) {
        self.status = SeatStatus::Booked;
        self.locked_at = None;
        self.lock_expires_at = None;
    }

    pub fn unlock(&mut self) {
        self.status = SeatStatus::Unlocked;
        self.locked_at = None;
        self.lock_expires_at = None;
        self.booking_id = None;
    }
}
