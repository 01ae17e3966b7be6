//! Runs against a real database:
//! `DATABASE_URL=postgres://... cargo test -p boxoffice-store -- --ignored`

use boxoffice_core::{FixedClock, SeatError, SeatService, SeatStatus, ShowSeat};
use boxoffice_store::app_config::DatabaseConfig;
use boxoffice_store::{DbClient, PostgresSeatRepository};
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

static NEXT_SHOW: AtomicI64 = AtomicI64::new(0);

async fn connect() -> DbClient {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = DbClient::new(&DatabaseConfig {
        url,
        max_connections: 10,
        acquire_timeout_seconds: 5,
    })
    .await
    .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");
    db
}

/// Fresh show with seats `base+1 ..= base+count`, so runs don't collide.
fn fresh_show(count: i64) -> (i64, Vec<ShowSeat>) {
    let run = Utc::now().timestamp_millis() % 1_000_000_000;
    let base = run * 100_000 + (NEXT_SHOW.fetch_add(1, Ordering::SeqCst) % 1000) * 100;
    let show_id = base;
    let seats = (1..=count)
        .map(|n| ShowSeat::new(base + n, show_id, n, 3000))
        .collect();
    (show_id, seats)
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_lock_confirm_flow() {
    let db = connect().await;
    let t0 = Utc::now();
    let clock = Arc::new(FixedClock::new(t0));
    let repo = Arc::new(PostgresSeatRepository::with_clock(db.pool.clone(), clock.clone()));
    let service = SeatService::new(repo.clone());

    let (show_id, seats) = fresh_show(3);
    let ids: Vec<i64> = seats.iter().map(|s| s.show_seat_id).collect();
    repo.insert_seats(&seats).await.unwrap();

    service
        .lock_for_booking(show_id, &[ids[2], ids[0], ids[1]], 101, Duration::minutes(10), t0)
        .await
        .unwrap();

    let listed = service.list_availability(show_id, t0).await.unwrap();
    assert_eq!(listed.len(), 3);
    for seat in &listed {
        assert_eq!(seat.status, SeatStatus::Locked);
        assert_eq!(seat.booking_id, Some(101));
        // Postgres keeps microseconds
        assert_eq!(
            seat.lock_expires_at.map(|t| t.timestamp_micros()),
            Some((t0 + Duration::minutes(10)).timestamp_micros())
        );
    }

    clock.set(t0 + Duration::minutes(1));
    service.confirm_booking(show_id, 101, t0 + Duration::minutes(1)).await.unwrap();
    service.confirm_booking(show_id, 101, t0 + Duration::minutes(2)).await.unwrap();

    let listed = service.list_availability(show_id, t0 + Duration::minutes(2)).await.unwrap();
    assert!(listed.iter().all(|s| s.status == SeatStatus::Booked && s.lock_expires_at.is_none()));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_lock_is_all_or_nothing() {
    let db = connect().await;
    let t0 = Utc::now();
    let clock = Arc::new(FixedClock::new(t0));
    let repo = Arc::new(PostgresSeatRepository::with_clock(db.pool.clone(), clock));
    let service = SeatService::new(repo.clone());

    let (show_id, seats) = fresh_show(2);
    let ids: Vec<i64> = seats.iter().map(|s| s.show_seat_id).collect();
    repo.insert_seats(&seats).await.unwrap();

    service
        .lock_for_booking(show_id, &[ids[1]], 202, Duration::minutes(10), t0)
        .await
        .unwrap();

    let result = service
        .lock_for_booking(show_id, &[ids[0], ids[1]], 101, Duration::minutes(10), t0)
        .await;
    assert_eq!(result, Err(SeatError::SeatLockFailed));

    let listed = service.list_availability(show_id, t0).await.unwrap();
    assert_eq!(listed[0].status, SeatStatus::Unlocked);
    assert_eq!(listed[1].booking_id, Some(202));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_sweep_and_lazy_expiry() {
    let db = connect().await;
    let t0 = Utc::now();
    let clock = Arc::new(FixedClock::new(t0));
    let repo = Arc::new(PostgresSeatRepository::with_clock(db.pool.clone(), clock));
    let service = SeatService::new(repo.clone());

    let (show_id, seats) = fresh_show(2);
    let ids: Vec<i64> = seats.iter().map(|s| s.show_seat_id).collect();
    repo.insert_seats(&seats).await.unwrap();

    service
        .lock_for_booking(show_id, &[ids[0]], 101, Duration::minutes(1), t0)
        .await
        .unwrap();

    let later = t0 + Duration::minutes(5);
    let listed = service.list_availability(show_id, later).await.unwrap();
    assert!(listed.iter().all(|s| s.status == SeatStatus::Unlocked));

    // Other shows' stale rows may be swept too
    assert!(service.release_expired_locks(later).await.unwrap() >= 1);
    let result = service.confirm_booking(show_id, 101, later).await;
    assert_eq!(result, Err(SeatError::SeatConfirmationFailed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_mirrored_requests_do_not_deadlock() {
    let db = connect().await;
    let repo = Arc::new(PostgresSeatRepository::new(db.pool.clone()));
    let service = SeatService::new(repo.clone());

    for _ in 0..20 {
        let (show_id, seats) = fresh_show(2);
        let ids: Vec<i64> = seats.iter().map(|s| s.show_seat_id).collect();
        repo.insert_seats(&seats).await.unwrap();

        let a = {
            let service = service.clone();
            let set = vec![ids[0], ids[1]];
            tokio::spawn(async move {
                service.lock_for_booking(show_id, &set, 1, Duration::minutes(10), Utc::now()).await
            })
        };
        let b = {
            let service = service.clone();
            let set = vec![ids[1], ids[0]];
            tokio::spawn(async move {
                service.lock_for_booking(show_id, &set, 2, Duration::minutes(10), Utc::now()).await
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_ok() ^ b.is_ok());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_sweeps_race_lock_and_confirm() {
    let db = connect().await;
    let repo = Arc::new(PostgresSeatRepository::new(db.pool.clone()));
    let service = SeatService::new(repo.clone());

    for round in 0..10 {
        let stale_at = Utc::now() - Duration::minutes(10);
        let (show_id, mut seats) = fresh_show(60);
        for seat in &mut seats {
            seat.lock(900, stale_at - Duration::minutes(10), stale_at);
        }
        let ids: Vec<i64> = seats.iter().map(|s| s.show_seat_id).collect();
        // Descending physical order, opposite to the canonical lock order
        seats.reverse();
        repo.insert_seats(&seats).await.unwrap();

        // Booking 1 takes the first 40 seats at once, bookings 2..=11 take pairs of the rest
        let mut requests: Vec<(i64, Vec<i64>)> = vec![(1, ids[..40].to_vec())];
        requests.extend(
            (0..10).map(|n| (n as i64 + 2, vec![ids[41 + 2 * n], ids[40 + 2 * n]])),
        );

        let mut sweepers = Vec::new();
        for _ in 0..3 {
            let service = service.clone();
            sweepers.push(tokio::spawn(async move {
                for _ in 0..5 {
                    service.release_expired_locks(Utc::now()).await?;
                }
                Ok::<_, SeatError>(())
            }));
        }

        let mut bookings = Vec::new();
        for (booking_id, seat_ids) in requests.clone() {
            let service = service.clone();
            bookings.push(tokio::spawn(async move {
                service
                    .lock_for_booking(show_id, &seat_ids, booking_id, Duration::minutes(10), Utc::now())
                    .await?;
                service.confirm_booking(show_id, booking_id, Utc::now()).await
            }));
        }

        for handle in bookings {
            assert_eq!(handle.await.unwrap(), Ok(()), "round {}", round);
        }
        for handle in sweepers {
            assert_eq!(handle.await.unwrap(), Ok(()), "round {}", round);
        }

        let listed = service.list_availability(show_id, Utc::now()).await.unwrap();
        assert_eq!(listed.len(), 60);
        for (booking_id, seat_ids) in &requests {
            for id in seat_ids {
                let seat = listed.iter().find(|s| s.show_seat_id == *id).unwrap();
                assert_eq!(seat.status, SeatStatus::Booked, "round {} seat {}", round, id);
                assert_eq!(seat.booking_id, Some(*booking_id));
            }
        }
    }
}
