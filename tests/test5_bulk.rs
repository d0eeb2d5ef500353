use mssql_request::prelude::*;
use mssql_request::test_utils::ScriptedPool;

fn staging_table() -> BulkTable {
    let mut table = BulkTable::new("#staging").with_create(true);
    table
        .add_column(BulkColumn::new("id", SqlType::Int).nullable(false).primary())
        .add_column(BulkColumn::new("label", SqlType::NVarChar).length(50))
        .add_column(BulkColumn::new("payload", SqlType::VarBinary));
    table
        .add_row(vec![
            RowValues::Int(1),
            RowValues::Text("first".into()),
            RowValues::Blob(vec![1, 2]),
        ])
        .add_row(vec![RowValues::Text("2".into()), RowValues::Int(5)]);
    table
}

fn staging_columns() -> Vec<Column> {
    vec![
        Column::new("id", SqlType::Int).with_nullable(false),
        Column::new("label", SqlType::NVarChar).with_length(Some(50)),
        Column::new("payload", SqlType::VarBinary),
    ]
}

#[tokio::test]
async fn test5_bulk_creates_then_reuses_the_table() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.add_creatable_table("#staging", staging_columns());
    let table = staging_table();

    let inserted = Request::new(&pool).bulk(&table).await?;
    assert_eq!(inserted, 2);
    assert!(pool.table_exists("#staging"));

    // Running the guarded DDL again is harmless.
    let inserted = Request::new(&pool).bulk(&table).await?;
    assert_eq!(inserted, 2);

    let executed = pool.executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(
        executed[0].text,
        "IF OBJECT_ID('tempdb..[#staging]') IS NULL CREATE TABLE [#staging] \
         ([id] int NOT NULL PRIMARY KEY, [label] nvarchar(50), [payload] varbinary(MAX))"
    );
    assert_eq!(executed[0].text, executed[1].text);

    let rows = pool.table_rows("#staging");
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[1],
        vec![
            ("id".to_string(), RowValues::Int(2)),
            ("label".to_string(), RowValues::Text("5".into())),
            ("payload".to_string(), RowValues::Blob(Vec::new())),
        ]
    );

    let stats = pool.stats();
    assert_eq!(stats.acquired, 2);
    assert_eq!(stats.released, 2);
    Ok(())
}

#[tokio::test]
async fn test5_existing_table_needs_no_ddl() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.add_table("sales.dbo.orders", vec![Column::new("amount", SqlType::Float)]);

    let mut table = BulkTable::new("[sales].[dbo].[orders]");
    table.add_row(vec![RowValues::Text("3.5".into())]);
    let inserted = Request::new(&pool).bulk(&table).await?;

    assert_eq!(inserted, 1);
    assert!(pool.executed().is_empty());
    assert_eq!(
        pool.table_rows("sales.dbo.orders"),
        vec![vec![("amount".to_string(), RowValues::Float(3.5))]]
    );
    Ok(())
}

#[tokio::test]
async fn test5_invalid_targets_are_name_errors() {
    let pool = ScriptedPool::new();

    for name in ["", "@rows"] {
        let err = Request::new(&pool).bulk(&BulkTable::new(name)).await.err();
        assert_eq!(err.and_then(|e| e.request_code()), Some(RequestErrorCode::Name));
    }
    // Rejected before any lease.
    assert_eq!(pool.stats().acquired, 0);

    let missing = Request::new(&pool).bulk(&BulkTable::new("dbo.missing")).await.err();
    match missing {
        Some(SqlMiddlewareDbError::RequestError { code, message, .. }) => {
            assert_eq!(code, RequestErrorCode::Name);
            assert_eq!(message, "Table [dbo].[missing] was not found on the server.");
        }
        other => panic!("expected a name error, got {other:?}"),
    }
    assert_eq!(pool.stats().released, 1);
}

#[tokio::test]
async fn test5_bulk_in_a_transaction_uses_its_own_lease() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.add_table("items", vec![Column::new("id", SqlType::Int)]);

    let mut tx = Transaction::new(pool.clone());
    tx.begin(IsolationLevel::default()).await?;
    let mut table = BulkTable::new("items");
    table.add_row(vec![RowValues::Int(9)]);
    tx.request().bulk(&table).await?;

    let stats = pool.stats();
    assert_eq!(stats.acquired, 2);
    assert_eq!(stats.released, 1);
    tx.commit().await?;
    assert_eq!(pool.stats().released, 2);
    Ok(())
}

#[tokio::test]
async fn test5_broken_link_during_insert_discards_the_connection() {
    let pool = ScriptedPool::new();
    pool.add_table("items", vec![Column::new("id", SqlType::Int)]);
    pool.fail_next_insert(DriverError::new("Connection reset by peer").with_sql_state("08S01"));

    let mut table = BulkTable::new("items");
    table.add_row(vec![RowValues::Int(1)]);
    let err = Request::new(&pool).bulk(&table).await.err();

    assert_eq!(err.and_then(|e| e.request_code()), Some(RequestErrorCode::Request));
    let stats = pool.stats();
    assert_eq!(stats.released, 1);
    assert_eq!(stats.discarded, 1);
    assert!(pool.table_rows("items").is_empty());
}
