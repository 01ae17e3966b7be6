use async_trait::async_trait;
use boxoffice_core::{Clock, SeatRepository, SeatStatus, ShowSeat, StoreError, SystemClock};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error};

/// Seat store backed by the `show_seats` table.
///
/// Lock and confirm run in one transaction that first row-locks the affected
/// seats with `SELECT ... ORDER BY show_seat_id FOR UPDATE`, validates them, and
/// then applies a single `UPDATE`. The release statements lock their rows the
/// same way before updating. Row locks are always taken in ascending id order,
/// so overlapping requests and sweeps queue instead of deadlocking.
pub struct PostgresSeatRepository {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PostgresSeatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Show setup: writes seat records as given. Used by seeding tools and tests.
    pub async fn insert_seats(&self, seats: &[ShowSeat]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        for seat in seats {
            sqlx::query(
                r#"
                INSERT INTO show_seats (show_seat_id, show_id, seat_id, status, locked_at, lock_expires_at, booking_id, price)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(seat.show_seat_id)
            .bind(seat.show_id)
            .bind(seat.seat_id)
            .bind(seat.status.as_str())
            .bind(seat.locked_at)
            .bind(seat.lock_expires_at)
            .bind(seat.booking_id)
            .bind(seat.price)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        }

        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    show_seat_id: i64,
    show_id: i64,
    seat_id: i64,
    status: String,
    locked_at: Option<DateTime<Utc>>,
    lock_expires_at: Option<DateTime<Utc>>,
    booking_id: Option<i64>,
    price: i64,
}

impl TryFrom<SeatRow> for ShowSeat {
    type Error = StoreError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        Ok(ShowSeat {
            show_seat_id: row.show_seat_id,
            show_id: row.show_id,
            seat_id: row.seat_id,
            status: row.status.parse()?,
            locked_at: row.locked_at,
            lock_expires_at: row.lock_expires_at,
            booking_id: row.booking_id,
            price: row.price,
        })
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    error!("Seat store query failed: {}", e);
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl SeatRepository for PostgresSeatRepository {
    async fn list_seats(
        &self,
        show_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ShowSeat>, StoreError> {
        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT show_seat_id, show_id, seat_id, status, locked_at, lock_expires_at, booking_id, price
            FROM show_seats
            WHERE show_id = $1
            ORDER BY show_seat_id
            "#,
        )
        .bind(show_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter()
            .map(|row| ShowSeat::try_from(row).map(|seat| seat.as_of(now)))
            .collect()
    }

    async fn lock_seats(
        &self,
        show_id: i64,
        seat_ids: &[i64],
        booking_id: i64,
        lock_until: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT show_seat_id, show_id, seat_id, status, locked_at, lock_expires_at, booking_id, price
            FROM show_seats
            WHERE show_id = $1 AND show_seat_id = ANY($2)
            ORDER BY show_seat_id
            FOR UPDATE
            "#,
        )
        .bind(show_id)
        .bind(seat_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(unavailable)?;

        // Operation time is read once the row locks are held
        let now = self.clock.now();

        if let Some(missing) = seat_ids
            .iter()
            .find(|id| !rows.iter().any(|row| row.show_seat_id == **id))
        {
            return Err(StoreError::SeatNotFound(*missing));
        }

        for row in rows {
            ShowSeat::try_from(row)?.ensure_lockable(booking_id, now)?;
        }

        sqlx::query(
            r#"
            UPDATE show_seats
            SET status = $3, locked_at = $4, lock_expires_at = $5, booking_id = $6
            WHERE show_id = $1 AND show_seat_id = ANY($2)
            "#,
        )
        .bind(show_id)
        .bind(seat_ids)
        .bind(SeatStatus::Locked.as_str())
        .bind(now)
        .bind(lock_until)
        .bind(booking_id)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;

        debug!("Locked {:?} on show {} for booking {}", seat_ids, show_id, booking_id);
        Ok(())
    }

    async fn book_locked_seats(
        &self,
        show_id: i64,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT show_seat_id, show_id, seat_id, status, locked_at, lock_expires_at, booking_id, price
            FROM show_seats
            WHERE show_id = $1 AND booking_id = $2
            ORDER BY show_seat_id
            FOR UPDATE
            "#,
        )
        .bind(show_id)
        .bind(booking_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(unavailable)?;

        if rows.is_empty() {
            return Err(StoreError::NoSeatsForBooking(booking_id));
        }

        let mut to_book = Vec::new();
        for row in rows {
            let seat = ShowSeat::try_from(row)?;
            if seat.ensure_confirmable(now)? {
                to_book.push(seat.show_seat_id);
            }
        }

        if !to_book.is_empty() {
            // Only the rows validated above
            sqlx::query(
                r#"
                UPDATE show_seats
                SET status = $3, locked_at = NULL, lock_expires_at = NULL
                WHERE show_id = $1 AND show_seat_id = ANY($2)
                "#,
            )
            .bind(show_id)
            .bind(&to_book[..])
            .bind(SeatStatus::Booked.as_str())
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        }

        tx.commit().await.map_err(unavailable)?;

        debug!("Booked {:?} on show {} for booking {}", to_book, show_id, booking_id);
        Ok(())
    }

    async fn release_expired_locks(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        // Row locks in show_seat_id order, same as lock and confirm
        let result = sqlx::query(
            r#"
            WITH stale AS (
                SELECT show_seat_id
                FROM show_seats
                WHERE status = $2 AND (lock_expires_at IS NULL OR lock_expires_at <= $3)
                ORDER BY show_seat_id
                FOR UPDATE
            )
            UPDATE show_seats s
            SET status = $1, locked_at = NULL, lock_expires_at = NULL, booking_id = NULL
            FROM stale
            WHERE s.show_seat_id = stale.show_seat_id
            "#,
        )
        .bind(SeatStatus::Unlocked.as_str())
        .bind(SeatStatus::Locked.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected())
    }

    async fn release_booking_locks(&self, show_id: i64, booking_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            WITH held AS (
                SELECT show_seat_id
                FROM show_seats
                WHERE show_id = $2 AND booking_id = $3 AND status = $4
                ORDER BY show_seat_id
                FOR UPDATE
            )
            UPDATE show_seats s
            SET status = $1, locked_at = NULL, lock_expires_at = NULL, booking_id = NULL
            FROM held
            WHERE s.show_seat_id = held.show_seat_id
            "#,
        )
        .bind(SeatStatus::Unlocked.as_str())
        .bind(show_id)
        .bind(booking_id)
        .bind(SeatStatus::Locked.as_str())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected())
    }
}
