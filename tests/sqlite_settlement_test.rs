use chrono::{DateTime, Duration, TimeZone, Utc};
use settlement_engine::orchestration::{BoostExpiryJob, EarningsReleaseJob};
use settlement_engine::{
    init_db, Boost, BoostExpiryPolicy, BoostExpiryProcessor, BoostStatus, Clock, Decimal,
    DisposalDesk, DisposalRequest, DisposalType, EarningStatus, EarningsLedger, EarningsPolicy,
    ItemSize, ManualClock, Order, OrderId, OrderStatus, PickupFeeSchedule, ProductId, Repository,
    RunOutcome, SettlementError, SettlementScheduler, SettlementStore, UserId,
};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

async fn setup_repo() -> (Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    (Arc::new(Repository::new(pool)), temp_dir)
}

fn monday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
}

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn test_release_is_idempotent_against_sqlite() {
    let (repo, _temp) = setup_repo().await;
    let seller = UserId::new("seller-1");
    repo.insert_user(&seller, d("0")).await.unwrap();

    let clock = Arc::new(ManualClock::new(monday_noon()));
    let ledger = EarningsLedger::new(repo.clone(), clock.clone(), EarningsPolicy::default());

    let earning = ledger
        .record_earning(&OrderId::new("order-1"), &seller, d("100"))
        .await
        .unwrap();
    assert_eq!(earning.net_amount, d("90"));
    assert_eq!(earning.release_at, monday_noon() + Duration::days(3));

    clock.advance(Duration::days(3));
    let first = ledger.release_due_earnings(clock.now()).await.unwrap();
    let second = ledger.release_due_earnings(clock.now()).await.unwrap();

    assert_eq!(first.released, 1);
    assert_eq!(second.examined, 0);
    assert_eq!(second.released, 0);
    assert_eq!(repo.available_balance(&seller).await.unwrap(), Some(d("90")));

    let stored = repo.find_earning(&earning.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EarningStatus::Released);
    assert_eq!(stored.released_at, Some(clock.now()));
}

#[tokio::test]
async fn test_direct_double_release_credits_once() {
    let (repo, _temp) = setup_repo().await;
    let seller = UserId::new("seller-1");
    repo.insert_user(&seller, d("5")).await.unwrap();

    let clock = Arc::new(ManualClock::new(monday_noon()));
    let ledger = EarningsLedger::new(repo.clone(), clock.clone(), EarningsPolicy::default());
    let earning = ledger
        .record_earning(&OrderId::new("order-1"), &seller, d("19.99"))
        .await
        .unwrap();
    assert_eq!(earning.fee_amount, d("2.00"));
    assert_eq!(earning.net_amount, d("17.99"));

    let at = clock.now() + Duration::days(3);
    let (a, b) = tokio::join!(
        repo.release_earning(&earning.id, &seller, earning.net_amount, at),
        repo.release_earning(&earning.id, &seller, earning.net_amount, at),
    );
    let outcomes = [assert_ok!(a), assert_ok!(b)];

    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == settlement_engine::domain::ReleaseOutcome::Released)
            .count(),
        1
    );
    assert_eq!(repo.available_balance(&seller).await.unwrap(), Some(d("22.99")));
}

#[tokio::test]
async fn test_release_with_missing_user_changes_nothing() {
    let (repo, _temp) = setup_repo().await;
    let clock = Arc::new(ManualClock::new(monday_noon()));
    let ledger = EarningsLedger::new(repo.clone(), clock.clone(), EarningsPolicy::default());
    let earning = ledger
        .record_earning(&OrderId::new("order-1"), &UserId::new("ghost"), d("40"))
        .await
        .unwrap();

    clock.advance(Duration::days(3));
    let report = ledger.release_due_earnings(clock.now()).await.unwrap();

    assert_eq!(report.released, 0);
    assert_eq!(report.failures.len(), 1);
    let stored = repo.find_earning(&earning.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EarningStatus::Scheduled);
    assert_eq!(stored.released_at, None);
}

#[tokio::test]
async fn test_duplicate_order_earning_is_rejected() {
    let (repo, _temp) = setup_repo().await;
    let seller = UserId::new("seller-1");
    repo.upsert_order(&Order {
        id: OrderId::new("order-7"),
        seller_id: seller.clone(),
        total_amount: d("60"),
        status: OrderStatus::Paid,
    })
    .await
    .unwrap();

    let clock = Arc::new(ManualClock::new(monday_noon()));
    let ledger = EarningsLedger::new(repo.clone(), clock, EarningsPolicy::default());

    assert_ok!(ledger.record_for_order(&OrderId::new("order-7")).await);
    let err = assert_err!(ledger.record_for_order(&OrderId::new("order-7")).await);
    assert!(matches!(err, SettlementError::AlreadyRecorded(_)));
}

#[tokio::test]
async fn test_boost_expiry_against_sqlite() {
    let (repo, _temp) = setup_repo().await;
    let now = monday_noon();
    let short = Boost::active(
        ProductId::new("product-1"),
        UserId::new("seller-1"),
        1,
        d("9.99"),
        now - Duration::days(7),
        now + Duration::minutes(25),
    );
    let long = Boost::active(
        ProductId::new("product-2"),
        UserId::new("seller-1"),
        3,
        d("29.99"),
        now - Duration::days(1),
        now + Duration::minutes(90),
    );
    repo.insert_boost(&short).await.unwrap();
    repo.insert_boost(&long).await.unwrap();

    let processor = BoostExpiryProcessor::new(repo.clone(), BoostExpiryPolicy::default());
    let report = processor.run(now).await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.expired, 1);
    assert_eq!(report.decayed, 1);

    let short = repo.find_boost(&short.id).await.unwrap().unwrap();
    assert_eq!(short.status, BoostStatus::Expired);
    assert_eq!(short.until_date, now - Duration::minutes(5));

    let long = repo.find_boost(&long.id).await.unwrap().unwrap();
    assert_eq!(long.status, BoostStatus::Active);
    assert_eq!(long.until_date, now + Duration::minutes(60));

    let active = repo.find_active_boosts().await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn test_disposal_desk_persists_to_sqlite() {
    let (repo, _temp) = setup_repo().await;
    // Tuesday, before the Friday cutoff.
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 4, 10, 0, 0).unwrap()));
    let desk = DisposalDesk::new(repo.clone(), clock, PickupFeeSchedule::default());

    let disposal = desk
        .submit(DisposalRequest {
            product_id: ProductId::new("product-1"),
            user_id: UserId::new("owner-1"),
            disposal_type: DisposalType::Pickup,
            scheduled_at: Some(Utc.with_ymd_and_hms(2024, 6, 8, 9, 0, 0).unwrap()),
            item_size: Some(ItemSize::Medium),
            base_amount: d("30"),
        })
        .await
        .unwrap();

    let stored = desk.get(&disposal.id).await.unwrap();
    assert_eq!(stored, disposal);
    assert_eq!(stored.final_total_amount, d("40"));
}

#[tokio::test]
async fn test_scheduler_drives_both_jobs_against_sqlite() {
    let (repo, _temp) = setup_repo().await;
    let seller = UserId::new("seller-1");
    repo.insert_user(&seller, d("0")).await.unwrap();

    let clock = Arc::new(ManualClock::new(monday_noon()));
    let boost = Boost::active(
        ProductId::new("product-1"),
        seller.clone(),
        1,
        d("5"),
        monday_noon() - Duration::days(3),
        monday_noon() + Duration::minutes(10),
    );
    repo.insert_boost(&boost).await.unwrap();

    let ledger = EarningsLedger::new(repo.clone(), clock.clone(), EarningsPolicy::default());
    ledger
        .record_earning(&OrderId::new("order-1"), &seller, d("50"))
        .await
        .unwrap();
    clock.advance(Duration::days(3));

    let mut scheduler = SettlementScheduler::new();
    scheduler.register(
        Arc::new(BoostExpiryJob::new(
            BoostExpiryProcessor::new(repo.clone(), BoostExpiryPolicy::default()),
            clock.clone(),
        )),
        std::time::Duration::from_secs(3600),
    );
    scheduler.register(
        Arc::new(EarningsReleaseJob::new(ledger, clock.clone())),
        std::time::Duration::from_secs(3600),
    );

    let boost_run = scheduler.trigger("boost-expiry").await.unwrap();
    let release_run = scheduler.trigger("earnings-release").await.unwrap();

    assert!(matches!(boost_run, RunOutcome::Completed(s) if s.settled == 1));
    assert!(matches!(release_run, RunOutcome::Completed(s) if s.settled == 1));
    assert_eq!(repo.available_balance(&seller).await.unwrap(), Some(d("45")));
    assert_eq!(
        repo.find_boost(&boost.id).await.unwrap().unwrap().status,
        BoostStatus::Expired
    );
}
