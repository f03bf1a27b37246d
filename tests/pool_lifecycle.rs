//! Pool and manager lifecycle: borrow/release accounting, exhaustion
//! bounds, status reporting and shutdown.

mod common;

use std::time::{Duration, Instant};

use cluster_pool::{
    ClassifiedError, ClusterConnectionManager, ConnectionPool, Host, HostPool, Operation,
};

use common::{test_config, ScriptedConn, ScriptedConnector};

#[tokio::test]
async fn bounded_borrow_times_out_on_an_exhausted_pool() {
    let host: Host = "10.2.0.1:9160"
        .parse::<Host>()
        .unwrap()
        .with_max_active(1)
        .with_max_wait_when_exhausted(Duration::from_millis(200));
    let pool = HostPool::new(host, ScriptedConnector::new()).await.unwrap();

    let lease = pool.borrow().await.unwrap();
    assert_eq!(pool.num_active(), 1);
    assert!(pool.is_exhausted());

    let started = Instant::now();
    let err = pool.borrow().await.unwrap_err();
    assert!(matches!(err, ClassifiedError::PoolExhausted(_)));
    assert!(started.elapsed() >= Duration::from_millis(200));

    pool.release(lease).await;
    assert_eq!(pool.num_active(), 0);
    pool.shutdown().unwrap();
}

#[tokio::test]
async fn released_connections_are_reused_not_redialed() {
    let host: Host = "10.2.0.1:9160"
        .parse::<Host>()
        .unwrap()
        .with_max_active(3);
    let connector = ScriptedConnector::new();
    let pool = HostPool::new(host, connector.clone()).await.unwrap();
    let after_prewarm = connector.dial_count();

    for _ in 0..10 {
        let lease = pool.borrow().await.unwrap();
        pool.release(lease).await;
    }
    assert_eq!(connector.dial_count(), after_prewarm);
    pool.shutdown().unwrap();
}

#[tokio::test]
async fn successful_operations_leave_no_connection_checked_out() {
    let manager = ClusterConnectionManager::new(
        test_config("lifecycle", &["10.2.0.1:9160"]),
        ScriptedConnector::new(),
    )
    .await
    .unwrap();

    for _ in 0..5 {
        let op = Operation::read(|_conn: &mut ScriptedConn| Box::pin(async move { Ok(42u64) }));
        let result = manager.execute(op).await.unwrap();
        assert_eq!(result.value, 42);
    }

    let status = manager.status_string();
    assert!(status.contains("Active: 0"));
    manager.shutdown().unwrap();
}

#[tokio::test]
async fn status_string_reports_live_and_downed_sets() {
    let connector = ScriptedConnector::new();
    connector.refuse("10.2.0.2:9160");
    let manager = ClusterConnectionManager::new(
        test_config("lifecycle", &["10.2.0.1:9160", "10.2.0.2:9160"]),
        connector,
    )
    .await
    .unwrap();

    let status = manager.status_string();
    assert!(status.starts_with("<ClusterConnectionManager>:{lifecycle}"));
    assert!(status.contains("10.2.0.1:9160"));
    assert!(status.contains("Downed: [10.2.0.2:9160]"));
    manager.shutdown().unwrap();
}

#[tokio::test]
async fn manager_shutdown_is_terminal() {
    let manager = ClusterConnectionManager::new(
        test_config("lifecycle", &["10.2.0.1:9160"]),
        ScriptedConnector::new(),
    )
    .await
    .unwrap();

    manager.shutdown().unwrap();
    assert!(manager.hosts().is_empty());

    let op = Operation::read(|_conn: &mut ScriptedConn| Box::pin(async move { Ok(()) }));
    let err = manager.execute(op).await.unwrap_err();
    assert!(matches!(err, ClassifiedError::PoolInactive(_)));
    assert!(matches!(
        manager.shutdown(),
        Err(ClassifiedError::PoolInactive(_))
    ));
}
