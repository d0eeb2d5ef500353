use mssql_request::prelude::*;
use mssql_request::test_utils::{EventScript, ScriptedPool};

#[tokio::test]
async fn test1_query_without_parameters_runs_verbatim() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.push_events(
        EventScript::new()
            .recordset(&[("one", SqlType::Int)])
            .row(vec![RowValues::Int(1)])
            .done(),
    );

    let mut request = Request::new(&pool);
    let result = request.query("SELECT 1 AS one").await?;

    let executed = pool.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].text, "SELECT 1 AS one");
    assert!(executed[0].binds.is_empty());
    assert_eq!(result.recordsets.len(), 1);
    assert_eq!(result.recordsets[0].rows[0].get_value("one"), Some(&RowValues::Int(1)));
    assert!(result.output.is_empty());
    Ok(())
}

#[tokio::test]
async fn test1_query_with_inputs_and_outputs() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.push_events(
        EventScript::new()
            .rowcount(1)
            .recordset(&[("label", SqlType::NVarChar)])
            .row(vec![RowValues::Text("widget".into())])
            .done(),
    );

    let mut request = Request::new(&pool);
    request
        .input("id", SqlType::Int, RowValues::Text("12".into()))
        .output("label", SqlType::NVarChar);
    let result = request
        .query("SELECT @label = name FROM items WHERE id = @id;")
        .await?;

    let executed = pool.executed();
    assert_eq!(
        executed[0].text,
        "DECLARE @id int, @label nvarchar(MAX);SET @id = ?;\
         SELECT @label = name FROM items WHERE id = @id;SELECT @label as 'label';"
    );
    assert_eq!(executed[0].binds, vec![RowValues::Int(12)]);

    // The trailing projection is consumed, not returned as a recordset.
    assert!(result.recordsets.is_empty());
    assert_eq!(result.rows_affected, vec![1]);
    assert_eq!(result.output.get("label"), Some(&RowValues::Text("widget".into())));
    assert_eq!(
        request.parameters().get("@label").map(|p| p.value.clone()),
        Some(RowValues::Text("widget".into()))
    );
    Ok(())
}

#[tokio::test]
async fn test1_procedure_call_text() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();

    let mut request = Request::new(&pool);
    request
        .input("id", SqlType::Int, RowValues::Int(5))
        .output("total", SqlType::Money);
    request.execute("dbo.order_total").await?;

    let mut bare = Request::new(&pool);
    bare.execute("dbo.ping").await?;

    let executed = pool.executed();
    assert_eq!(
        executed[0].text,
        "DECLARE @___return___ int, @total money;\
         EXEC @___return___ = dbo.order_total @id=?, @total=@total output;\
         SELECT @___return___ as '___return___', @total as 'total';"
    );
    assert_eq!(executed[0].binds, vec![RowValues::Int(5)]);
    assert_eq!(
        executed[1].text,
        "DECLARE @___return___ int;EXEC @___return___ = dbo.ping;\
         SELECT @___return___ as '___return___';"
    );
    Ok(())
}

#[tokio::test]
async fn test1_empty_command_needs_no_connection() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    let mut request = Request::new(&pool);
    let result = request.query("").await?;

    assert_eq!(result, QueryResult::default());
    assert_eq!(pool.stats().acquired, 0);
    assert!(pool.executed().is_empty());
    Ok(())
}

#[tokio::test]
async fn test1_batch_shares_the_query_pipeline() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.push_events(EventScript::new().rowcount(2).rowcount(3).done());

    let mut request = Request::new(&pool);
    let result = request
        .batch("UPDATE a SET x = 1; UPDATE b SET y = 2;")
        .await?;

    assert_eq!(pool.executed()[0].text, "UPDATE a SET x = 1; UPDATE b SET y = 2;");
    assert_eq!(result.rows_affected, vec![2, 3]);
    assert_eq!(result.total_rows_affected(), 5);
    Ok(())
}
