use crate::error::SeatError;
use crate::models::ShowSeat;
use crate::repository::SeatRepository;
use crate::SeatResult;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Seat reservation operations used by booking workflows.
///
/// Holds no state between calls, so any number of clones (or separate
/// instances) may run against one store.
#[derive(Clone)]
pub struct SeatService {
    repo: Arc<dyn SeatRepository>,
}

impl SeatService {
    pub fn new(repo: Arc<dyn SeatRepository>) -> Self {
        Self { repo }
    }

    /// Seat inventory for a show as of `now`. Expired locks show as unlocked.
    pub async fn list_availability(
        &self,
        show_id: i64,
        now: DateTime<Utc>,
    ) -> SeatResult<Vec<ShowSeat>> {
        Ok(self.repo.list_seats(show_id, now).await?)
    }

    /// Locks all given seats for a booking, or none of them.
    ///
    /// Returns the lock deadline (`now + lock_duration`).
    pub async fn lock_for_booking(
        &self,
        show_id: i64,
        seat_ids: &[i64],
        booking_id: i64,
        lock_duration: Duration,
        now: DateTime<Utc>,
    ) -> SeatResult<DateTime<Utc>> {
        if seat_ids.is_empty() {
            return Err(SeatError::NoSeatsProvided);
        }

        // Every caller acquires seats in the same order
        let ordered = canonical_order(seat_ids)?;

        if lock_duration <= Duration::zero() {
            return Err(SeatError::InvalidLockDuration);
        }
        let lock_until = now
            .checked_add_signed(lock_duration)
            .ok_or(SeatError::InvalidLockDuration)?;

        debug!(
            "Locking seats {:?} on show {} for booking {} until {}",
            ordered, show_id, booking_id, lock_until
        );

        if let Err(e) = self
            .repo
            .lock_seats(show_id, &ordered, booking_id, lock_until)
            .await
        {
            warn!(
                "Seat lock rejected for booking {} on show {}: {}",
                booking_id, show_id, e
            );
            return Err(SeatError::SeatLockFailed);
        }

        info!(
            "Locked {} seats on show {} for booking {}",
            ordered.len(),
            show_id,
            booking_id
        );
        Ok(lock_until)
    }

    /// Confirms every seat locked for the booking. Safe to retry: a booking
    /// whose seats are already booked confirms again successfully.
    pub async fn confirm_booking(
        &self,
        show_id: i64,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> SeatResult<()> {
        if let Err(e) = self.repo.book_locked_seats(show_id, booking_id, now).await {
            warn!(
                "Seat confirmation rejected for booking {} on show {}: {}",
                booking_id, show_id, e
            );
            return Err(SeatError::SeatConfirmationFailed);
        }

        info!("Confirmed seats on show {} for booking {}", show_id, booking_id);
        Ok(())
    }

    /// Storage reclamation pass, meant to be driven by a scheduler.
    pub async fn release_expired_locks(&self, now: DateTime<Utc>) -> SeatResult<u64> {
        let released = self.repo.release_expired_locks(now).await?;
        if released > 0 {
            info!("Released {} expired seat locks", released);
        }
        Ok(released)
    }

    /// Gives up a pending booking's locks ahead of their deadline.
    pub async fn release_booking(&self, show_id: i64, booking_id: i64) -> SeatResult<u64> {
        let released = self.repo.release_booking_locks(show_id, booking_id).await?;
        info!(
            "Released {} seats on show {} held by booking {}",
            released, show_id, booking_id
        );
        Ok(released)
    }
}

/// Ascending copy of `seat_ids`, rejecting repeats.
fn canonical_order(seat_ids: &[i64]) -> SeatResult<Vec<i64>> {
    let mut ordered = seat_ids.to_vec();
    ordered.sort_unstable();

    if ordered.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(SeatError::DuplicateSeatIds);
    }

    Ok(ordered)
}
