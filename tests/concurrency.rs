use std::sync::Arc;
use std::time::Duration;

use point_ledger::model::now_millis;
use point_ledger::{
    HistoryEntry, LedgerConfig, LedgerError, PointService, Points, TransactionType, UserId,
};
use tokio::task::JoinSet;

fn service(latency_ms: u64) -> Arc<PointService> {
    let config = LedgerConfig::default().with_store_latency(Duration::from_millis(latency_ms));
    Arc::new(PointService::in_memory(&config))
}

/// Spawn `charges` charges of `charge` and `uses` uses of `spend` for `user`.
fn spawn_mixed(
    tasks: &mut JoinSet<Result<(), LedgerError>>,
    service: &Arc<PointService>,
    user: UserId,
    charges: usize,
    charge: i64,
    uses: usize,
    spend: i64,
) {
    for _ in 0..charges {
        let service = Arc::clone(service);
        tasks.spawn(async move {
            service
                .charge(user, Points::new(charge), now_millis())
                .await
                .map(drop)
        });
    }
    for _ in 0..uses {
        let service = Arc::clone(service);
        tasks.spawn(async move {
            service
                .use_points(user, Points::new(spend), now_millis())
                .await
                .map(drop)
        });
    }
}

async fn history_sum(service: &PointService, user: UserId) -> Points {
    service
        .get_history(user)
        .await
        .unwrap()
        .iter()
        .map(HistoryEntry::signed_amount)
        .sum()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn single_user_mixed_operations() {
    let service = service(2);
    service.charge(1, Points::new(5_000), now_millis()).await.unwrap();

    let mut tasks = JoinSet::new();
    spawn_mixed(&mut tasks, &service, 1, 5, 2_000, 5, 1_000);
    for result in tasks.join_all().await {
        result.unwrap();
    }

    let balance = service.get_balance(1).await.unwrap();
    assert_eq!(balance.points, Points::new(10_000));
    assert_eq!(history_sum(&service, 1).await, balance.points);
    assert_eq!(service.get_history(1).await.unwrap().len(), 11);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn many_users_mixed_operations() {
    let service = service(2);
    for user in 1..=5 {
        service
            .charge(user, Points::new(5_000), now_millis())
            .await
            .unwrap();
    }

    let mut tasks = JoinSet::new();
    for user in 1..=5 {
        spawn_mixed(&mut tasks, &service, user, 5, 2_000, 5, 1_000);
    }
    for result in tasks.join_all().await {
        result.unwrap();
    }

    for user in 1..=5 {
        let balance = service.get_balance(user).await.unwrap();
        assert_eq!(balance.points, Points::new(10_000), "user {user}");
        assert_eq!(history_sum(&service, user).await, balance.points);
    }
    assert_eq!(service.known_users(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn users_are_isolated() {
    let service = service(1);
    let mut tasks = JoinSet::new();
    spawn_mixed(&mut tasks, &service, 1, 10, 1_000, 0, 0);
    spawn_mixed(&mut tasks, &service, 2, 4, 5_000, 0, 0);
    for result in tasks.join_all().await {
        result.unwrap();
    }

    assert_eq!(
        service.get_balance(1).await.unwrap().points,
        Points::new(10_000)
    );
    assert_eq!(
        service.get_balance(2).await.unwrap().points,
        Points::new(20_000)
    );
    assert!(
        service
            .get_history(1)
            .await
            .unwrap()
            .iter()
            .all(|e| e.user_id == 1 && e.kind == TransactionType::Charge)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn contended_limit_is_never_exceeded() {
    let service = service(1);
    service
        .charge(1, Points::new(9_000_000), now_millis())
        .await
        .unwrap();

    // only two of these fit under the maximum balance
    let mut tasks = JoinSet::new();
    spawn_mixed(&mut tasks, &service, 1, 8, 400_000, 0, 0);
    let results = tasks.join_all().await;

    let applied = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(applied, 2);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        LedgerError::LimitExceeded { .. }
    )));
    assert_eq!(
        service.get_balance(1).await.unwrap().points,
        Points::new(9_800_000)
    );
    assert_eq!(history_sum(&service, 1).await, Points::new(9_800_000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_user_does_not_delay_other_users() {
    let service = service(50);

    // queue several slow operations on user 1
    let mut tasks = JoinSet::new();
    spawn_mixed(&mut tasks, &service, 1, 6, 1_000, 0, 0);
    tokio::time::sleep(Duration::from_millis(10)).await;

    // user 2 only waits for its own store calls (three of them)
    let started = std::time::Instant::now();
    service.charge(2, Points::new(1_000), now_millis()).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(6 * 3 * 50));

    for result in tasks.join_all().await {
        result.unwrap();
    }
    assert_eq!(
        service.get_balance(1).await.unwrap().points,
        Points::new(6_000)
    );
}
