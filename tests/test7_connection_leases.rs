use mssql_request::prelude::*;
use mssql_request::test_utils::{EventScript, PoolStats, ScriptedPool};

#[tokio::test]
async fn test7_every_lease_is_released_once() {
    let pool = ScriptedPool::new();
    pool.push_events(EventScript::new().rowcount(1).done());
    pool.push_rejection(DriverError::new("Incorrect syntax near 'SELEC'.").with_code(102));
    pool.push_events(
        EventScript::new()
            .recordset(&[("a", SqlType::Int)])
            .error(DriverError::new("Divide by zero error encountered.").with_code(8134))
            .build(),
    );

    let mut request = Request::new(&pool);
    assert!(request.query("UPDATE t SET a = 1").await.is_ok());
    assert!(request.query("SELEC 1").await.is_err());
    assert!(request.query("SELECT 1 / 0 AS a").await.is_err());

    assert_eq!(
        pool.stats(),
        PoolStats {
            acquired: 3,
            released: 3,
            discarded: 0,
        }
    );
}

#[tokio::test]
async fn test7_broken_connection_state_flags_the_lease() {
    let pool = ScriptedPool::new();
    pool.push_events(
        EventScript::new()
            .error(DriverError::new("Communication link failure").with_sql_state("08S01"))
            .build(),
    );
    pool.push_rejection(DriverError::new("TCP Provider: connection reset").with_sql_state("08s01"));
    pool.push_events(
        EventScript::new()
            .error(DriverError::new("General error").with_sql_state("HY000"))
            .build(),
    );

    let mut request = Request::new(&pool);
    for _ in 0..3 {
        let err = request.query("SELECT 1").await.err();
        assert_eq!(err.and_then(|e| e.request_code()), Some(RequestErrorCode::Request));
    }

    let stats = pool.stats();
    assert_eq!(stats.released, 3);
    assert_eq!(stats.discarded, 2);
}

#[tokio::test]
async fn test7_broken_connection_inside_a_transaction() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    let mut tx = Transaction::new(pool.clone());
    tx.begin(IsolationLevel::default()).await?;

    pool.push_events(
        EventScript::new()
            .error(DriverError::new("Communication link failure").with_sql_state("08S01"))
            .build(),
    );
    assert!(tx.request().query("SELECT 1").await.is_err());
    // The lease stays with the transaction until it finishes.
    assert_eq!(pool.stats().released, 0);

    tx.rollback().await?;
    let stats = pool.stats();
    assert_eq!(stats.released, 1);
    assert_eq!(stats.discarded, 1);
    Ok(())
}

#[tokio::test]
async fn test7_unavailable_pool_surfaces_connection_errors() {
    let pool = ScriptedPool::new();
    pool.set_unavailable(true);

    let err = Request::new(&pool).query("SELECT 1").await.err();
    assert!(matches!(err, Some(SqlMiddlewareDbError::ConnectionError(_))));

    let mut tx = Transaction::new(pool.clone());
    let err = tx.begin(IsolationLevel::default()).await.err();
    assert!(matches!(err, Some(SqlMiddlewareDbError::ConnectionError(_))));
    assert_eq!(tx.state(), TransactionState::Idle);

    assert_eq!(pool.stats(), PoolStats::default());
}

#[tokio::test]
async fn test7_concurrent_requests_take_separate_leases() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    let config = ConfigAndPool::new(pool.clone());

    let mut first = config.request();
    let mut second = config.request();
    let (a, b) = tokio::join!(first.query("SELECT 1"), second.query("SELECT 2"));
    a?;
    b?;

    let executed = pool.executed();
    assert_eq!(executed.len(), 2);
    assert_ne!(executed[0].connection, executed[1].connection);
    assert_eq!(pool.stats().released, 2);
    Ok(())
}
