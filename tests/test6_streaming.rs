use mssql_request::prelude::*;
use mssql_request::test_utils::{EventScript, ScriptedPool};
use mssql_request::{JSON_COLUMN_ID, RETURN_FIELD};
use tokio::sync::mpsc;

fn drain(rx: &mut mpsc::UnboundedReceiver<RequestEvent>) -> Vec<RequestEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test6_rows_are_emitted_as_they_arrive() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.push_events(
        EventScript::new()
            .recordset(&[("id", SqlType::Int)])
            .row(vec![RowValues::Int(1)])
            .row(vec![RowValues::Int(2)])
            .rowcount(2)
            .recordset(&[("name", SqlType::NVarChar)])
            .row(vec![RowValues::Text("x".into())])
            .done(),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut request = Request::new(&pool).with_options(RequestOptions::default().with_stream(tx));
    assert!(!request.cancel());
    let result = request.query("SELECT id FROM a; SELECT name FROM b").await?;

    assert!(result.recordsets.is_empty());
    assert_eq!(result.rows_affected, vec![2]);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 5);
    assert!(matches!(&events[0], RequestEvent::Recordset(cols) if cols[0].name == "id"));
    assert!(matches!(&events[1], RequestEvent::Row(row) if row.get_value("id") == Some(&RowValues::Int(1))));
    assert!(matches!(&events[2], RequestEvent::Row(row) if row.get_value("id") == Some(&RowValues::Int(2))));
    assert!(matches!(&events[3], RequestEvent::Recordset(cols) if cols[0].name == "name"));
    assert!(matches!(&events[4], RequestEvent::Row(_)));
    Ok(())
}

#[tokio::test]
async fn test6_return_projection_is_not_streamed() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.push_events(
        EventScript::new()
            .recordset(&[("line", SqlType::Int)])
            .row(vec![RowValues::Int(7)])
            .recordset(&[(RETURN_FIELD, SqlType::Int), ("total", SqlType::Float)])
            .row(vec![RowValues::Int(1), RowValues::Float(4.0)])
            .done(),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut request = Request::new(&pool).with_options(RequestOptions::default().with_stream(tx));
    request.output("total", SqlType::Float);
    let result = request.execute("dbo.lines").await?;

    assert_eq!(result.return_value, Some(1));
    assert_eq!(result.output.get("total"), Some(&RowValues::Float(4.0)));

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], RequestEvent::Recordset(cols) if cols[0].name == "line"));
    assert!(matches!(&events[1], RequestEvent::Row(row) if !row.is_return_row()));
    Ok(())
}

#[tokio::test]
async fn test6_query_outputs_are_streamed_and_returned() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.push_events(
        EventScript::new()
            .recordset(&[("id", SqlType::Int)])
            .row(vec![RowValues::Int(3)])
            .recordset(&[("total", SqlType::Float)])
            .row(vec![RowValues::Float(4.5)])
            .done(),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut request = Request::new(&pool).with_options(RequestOptions::default().with_stream(tx));
    request
        .input("id", SqlType::Int, RowValues::Int(3))
        .output("total", SqlType::Float);
    let result = request
        .query("SELECT id FROM t WHERE id = @id; SELECT @total = SUM(x) FROM t")
        .await?;

    assert!(result.recordsets.is_empty());
    assert_eq!(result.output.get("total"), Some(&RowValues::Float(4.5)));
    let total = request.parameters().get("total").map(|p| p.value.clone());
    assert_eq!(total, Some(RowValues::Float(4.5)));

    // The output projection is an ordinary recordset on the stream.
    let events = drain(&mut rx);
    assert_eq!(events.len(), 4);
    assert!(matches!(&events[0], RequestEvent::Recordset(cols) if cols[0].name == "id"));
    assert!(matches!(&events[1], RequestEvent::Row(row) if row.get_value("id") == Some(&RowValues::Int(3))));
    assert!(matches!(&events[2], RequestEvent::Recordset(cols) if cols[0].name == "total"));
    assert!(matches!(
        &events[3],
        RequestEvent::Row(row) if row.get_value("total") == Some(&RowValues::Float(4.5))
    ));

    let executed = pool.executed();
    assert!(executed[0].text.ends_with(";SELECT @total as 'total';"));
    Ok(())
}

#[tokio::test]
async fn test6_bad_json_is_reported_without_failing() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.push_events(
        EventScript::new()
            .recordset(&[(JSON_COLUMN_ID, SqlType::NVarChar)])
            .fragments(&["{\"broken\":"])
            .recordset(&[("after", SqlType::Int)])
            .row(vec![RowValues::Int(1)])
            .done(),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    let options = RequestOptions::default().with_parse_json(true).with_stream(tx);
    let result = Request::new(&pool)
        .with_options(options)
        .query("SELECT * FROM t FOR JSON PATH; SELECT 1 AS after")
        .await;
    assert!(result.is_ok());

    let events = drain(&mut rx);
    assert_eq!(events.len(), 4);
    assert!(matches!(&events[0], RequestEvent::Recordset(_)));
    assert!(matches!(
        &events[1],
        RequestEvent::Error(e) if e.request_code() == Some(RequestErrorCode::Json)
    ));
    assert!(matches!(&events[2], RequestEvent::Recordset(cols) if cols[0].name == "after"));
    assert!(matches!(&events[3], RequestEvent::Row(_)));
    Ok(())
}

#[tokio::test]
async fn test6_dropped_receiver_does_not_fail_the_request() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.push_events(
        EventScript::new()
            .recordset(&[("id", SqlType::Int)])
            .row(vec![RowValues::Int(1)])
            .done(),
    );
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);

    Request::new(&pool)
        .with_options(RequestOptions::default().with_stream(tx))
        .query("SELECT 1 AS id")
        .await?;
    assert_eq!(pool.stats().released, 1);
    Ok(())
}
