use async_trait::async_trait;
use boxoffice_core::{Clock, SeatRepository, SeatStatus, ShowSeat, StoreError, SystemClock};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Single-process seat store.
///
/// One mutex guards the whole seat table, so every operation is atomic with
/// respect to every other. Multi-seat operations validate everything first and
/// only then apply, under the same guard.
pub struct InMemorySeatRepository {
    seats: Mutex<BTreeMap<i64, ShowSeat>>, // key = show_seat_id
    clock: Arc<dyn Clock>,
}

impl InMemorySeatRepository {
    pub fn new(seats: Vec<ShowSeat>) -> Self {
        Self::with_clock(seats, Arc::new(SystemClock))
    }

    pub fn with_clock(seats: Vec<ShowSeat>, clock: Arc<dyn Clock>) -> Self {
        let seats = seats
            .into_iter()
            .map(|seat| (seat.show_seat_id, seat))
            .collect();

        Self {
            seats: Mutex::new(seats),
            clock,
        }
    }

    /// Inspection helper: records exactly as stored, without the lazy-expiry
    /// view applied by `list_seats`. Not part of `SeatRepository`; tests use it
    /// to check what a sweep or release actually wrote.
    pub async fn stored_seats(&self) -> Vec<ShowSeat> {
        self.seats.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl SeatRepository for InMemorySeatRepository {
    async fn list_seats(
        &self,
        show_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ShowSeat>, StoreError> {
        let seats = self.seats.lock().await;

        Ok(seats
            .values()
            .filter(|seat| seat.show_id == show_id)
            .map(|seat| seat.clone().as_of(now))
            .collect())
    }

    async fn lock_seats(
        &self,
        show_id: i64,
        seat_ids: &[i64],
        booking_id: i64,
        lock_until: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut seats = self.seats.lock().await;
        let now = self.clock.now();

        for id in seat_ids {
            let seat = seats
                .get(id)
                .filter(|seat| seat.show_id == show_id)
                .ok_or(StoreError::SeatNotFound(*id))?;
            seat.ensure_lockable(booking_id, now)?;
        }

        for id in seat_ids {
            if let Some(seat) = seats.get_mut(id) {
                seat.lock(booking_id, now, lock_until);
            }
        }

        Ok(())
    }

    async fn book_locked_seats(
        &self,
        show_id: i64,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut seats = self.seats.lock().await;

        let mut held = 0usize;
        let mut to_book = Vec::new();
        for seat in seats
            .values()
            .filter(|seat| seat.show_id == show_id && seat.booking_id == Some(booking_id))
        {
            held += 1;
            if seat.ensure_confirmable(now)? {
                to_book.push(seat.show_seat_id);
            }
        }

        if held == 0 {
            return Err(StoreError::NoSeatsForBooking(booking_id));
        }

        for id in &to_book {
            if let Some(seat) = seats.get_mut(id) {
                seat.book();
            }
        }

        debug!(
            "Booked {} of {} seats for booking {} on show {}",
            to_book.len(),
            held,
            booking_id,
            show_id
        );
        Ok(())
    }

    async fn release_expired_locks(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut seats = self.seats.lock().await;

        let mut released = 0;
        for seat in seats.values_mut().filter(|seat| seat.is_stale_lock(now)) {
            seat.unlock();
            released += 1;
        }

        Ok(released)
    }

    async fn release_booking_locks(&self, show_id: i64, booking_id: i64) -> Result<u64, StoreError> {
        let mut seats = self.seats.lock().await;

        let mut released = 0;
        for seat in seats.values_mut().filter(|seat| {
            seat.show_id == show_id
                && seat.booking_id == Some(booking_id)
                && seat.status == SeatStatus::Locked
        }) {
            seat.unlock();
            released += 1;
        }

        Ok(released)
    }
}
