use mssql_request::prelude::*;
use mssql_request::test_utils::{EventScript, ScriptedPool};
use mssql_request::RETURN_FIELD;

fn order_total_events() -> Vec<DriverEvent> {
    EventScript::new()
        .recordset(&[("line", SqlType::Int), ("amount", SqlType::Money)])
        .row(vec![RowValues::Int(1), RowValues::Float(10.0)])
        .row(vec![RowValues::Int(2), RowValues::Float(2.5)])
        .rowcount(2)
        .recordset(&[
            (RETURN_FIELD, SqlType::Int),
            ("total", SqlType::Money),
            ("note", SqlType::NVarChar),
        ])
        .row(vec![RowValues::Int(3), RowValues::Float(12.5), RowValues::Null])
        .done()
}

#[tokio::test]
async fn test3_return_code_and_outputs() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.push_events(order_total_events());

    let mut request = Request::new(&pool);
    request
        .input("order_id", SqlType::Int, RowValues::Int(42))
        .output("total", SqlType::Money)
        .output("note", SqlType::NVarChar);
    let result = request.execute("dbo.order_total").await?;

    assert_eq!(result.return_value, Some(3));
    assert_eq!(result.recordsets.len(), 1);
    assert_eq!(result.recordsets[0].len(), 2);
    assert_eq!(result.rows_affected, vec![2]);
    assert_eq!(result.output.len(), 2);
    assert_eq!(result.output.get("total"), Some(&RowValues::Float(12.5)));
    assert_eq!(result.output.get("note"), Some(&RowValues::Null));

    let total = request.parameters().get("total").map(|p| p.value.clone());
    assert_eq!(total, Some(RowValues::Float(12.5)));
    Ok(())
}

#[tokio::test]
async fn test3_procedure_without_outputs_reports_return_code() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();
    pool.push_events(
        EventScript::new()
            .recordset(&[(RETURN_FIELD, SqlType::Int)])
            .row(vec![RowValues::Int(0)])
            .done(),
    );

    let result = Request::new(&pool).execute("dbo.ping").await?;
    assert_eq!(result.return_value, Some(0));
    assert!(result.recordsets.is_empty());
    assert!(result.output.is_empty());
    Ok(())
}

#[tokio::test]
async fn test3_parameter_metadata_shapes_declarations() -> Result<(), SqlMiddlewareDbError> {
    let pool = ScriptedPool::new();

    let mut request = Request::new(&pool);
    request
        .parameter(Parameter::input("price", SqlType::Decimal, RowValues::Text("9.99".into())).with_precision(10, 2))
        .parameter(Parameter::input("code", SqlType::VarChar, RowValues::Int(7)).with_length(9000))
        .parameter(Parameter::output("stamp", SqlType::DateTime2).with_scale(3));
    request.execute("dbo.reprice").await?;

    let executed = pool.executed();
    assert_eq!(
        executed[0].text,
        "DECLARE @___return___ int, @stamp datetime2(3);\
         EXEC @___return___ = dbo.reprice @price=?, @code=?, @stamp=@stamp output;\
         SELECT @___return___ as '___return___', @stamp as 'stamp';"
    );
    assert_eq!(
        executed[0].binds,
        vec![RowValues::Float(9.99), RowValues::Text("7".into())]
    );
    Ok(())
}

#[tokio::test]
async fn test3_driver_error_fails_the_call() {
    let pool = ScriptedPool::new();
    pool.push_events(
        EventScript::new()
            .recordset(&[("line", SqlType::Int)])
            .row(vec![RowValues::Int(1)])
            .error(DriverError::new("Could not find stored procedure 'dbo.nope'.").with_code(2812))
            .build(),
    );

    let err = Request::new(&pool).execute("dbo.nope").await.err();
    match err {
        Some(SqlMiddlewareDbError::RequestError { code, message, source }) => {
            assert_eq!(code, RequestErrorCode::Request);
            assert!(message.contains("dbo.nope"));
            assert_eq!(source.and_then(|s| s.code), Some(2812));
        }
        other => panic!("expected a request error, got {other:?}"),
    }
}
