use async_trait::async_trait;
use bb8::PooledConnection;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use tiberius::{ColumnData, ColumnType, Query, QueryItem};

use super::bulk::MssqlTableBinding;
use super::client::{MssqlConnection, MssqlManager};
use super::placeholders::rewrite_placeholders;
use crate::driver::{
    CONNECTION_BROKEN_STATE, DriverConnection, DriverError, DriverEvent, EventStream, TableBinding,
};
use crate::results::Column;
use crate::types::{RowValues, SqlType};

/// Map a tiberius error onto the driver error shape; I/O failures carry the
/// broken-connection SQLSTATE.
pub(crate) fn driver_error(err: tiberius::error::Error) -> DriverError {
    match &err {
        tiberius::error::Error::Io { .. } => {
            DriverError::new(err.to_string()).with_sql_state(CONNECTION_BROKEN_STATE.to_uppercase())
        }
        tiberius::error::Error::Server(token) => {
            let mut driver_err = DriverError::new(token.message());
            driver_err.code = i32::try_from(token.code()).ok();
            driver_err
        }
        _ => DriverError::new(err.to_string()),
    }
}

pub(crate) fn sql_type_of(column_type: ColumnType) -> SqlType {
    match column_type {
        ColumnType::Bit | ColumnType::Bitn => SqlType::Bit,
        ColumnType::Int1 => SqlType::TinyInt,
        ColumnType::Int2 => SqlType::SmallInt,
        ColumnType::Int4 | ColumnType::Intn => SqlType::Int,
        ColumnType::Int8 => SqlType::BigInt,
        ColumnType::Float4 => SqlType::Real,
        ColumnType::Float8 | ColumnType::Floatn => SqlType::Float,
        ColumnType::Money => SqlType::Money,
        ColumnType::Money4 => SqlType::SmallMoney,
        ColumnType::Decimaln => SqlType::Decimal,
        ColumnType::Numericn => SqlType::Numeric,
        ColumnType::Datetime4 => SqlType::SmallDateTime,
        ColumnType::Datetime | ColumnType::Datetimen => SqlType::DateTime,
        ColumnType::Daten => SqlType::Date,
        ColumnType::Timen => SqlType::Time,
        ColumnType::Datetime2 => SqlType::DateTime2,
        ColumnType::DatetimeOffsetn => SqlType::DateTimeOffset,
        ColumnType::Guid => SqlType::UniqueIdentifier,
        ColumnType::BigVarBin => SqlType::VarBinary,
        ColumnType::BigBinary => SqlType::Binary,
        ColumnType::Image => SqlType::Image,
        ColumnType::BigVarChar => SqlType::VarChar,
        ColumnType::BigChar => SqlType::Char,
        ColumnType::NVarchar => SqlType::NVarChar,
        ColumnType::NChar => SqlType::NChar,
        ColumnType::Text => SqlType::Text,
        ColumnType::NText => SqlType::NText,
        ColumnType::Xml => SqlType::Xml,
        ColumnType::Udt => SqlType::Udt,
        _ => SqlType::Variant,
    }
}

pub(crate) fn column_from_tiberius(column: &tiberius::Column) -> Column {
    Column::new(column.name(), sql_type_of(column.column_type()))
}

fn epoch_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn cell_value(row: &tiberius::Row, idx: usize, data: &ColumnData<'static>) -> RowValues {
    match data {
        ColumnData::Bit(Some(b)) => RowValues::Bool(*b),
        ColumnData::U8(Some(v)) => RowValues::Int(i64::from(*v)),
        ColumnData::I16(Some(v)) => RowValues::Int(i64::from(*v)),
        ColumnData::I32(Some(v)) => RowValues::Int(i64::from(*v)),
        ColumnData::I64(Some(v)) => RowValues::Int(*v),
        ColumnData::F32(Some(v)) => RowValues::Float(f64::from(*v)),
        ColumnData::F64(Some(v)) => RowValues::Float(*v),
        #[allow(clippy::cast_precision_loss)]
        ColumnData::Numeric(Some(n)) => {
            RowValues::Float(n.value() as f64 / 10f64.powi(i32::from(n.scale())))
        }
        ColumnData::String(Some(s)) => RowValues::Text(s.to_string()),
        ColumnData::Guid(Some(g)) => RowValues::Text(g.to_string()),
        ColumnData::Binary(Some(b)) => RowValues::Blob(b.to_vec()),
        ColumnData::Xml(Some(xml)) => RowValues::Text(xml.clone().into_owned().into_string()),
        ColumnData::DateTime(Some(_))
        | ColumnData::SmallDateTime(Some(_))
        | ColumnData::DateTime2(Some(_)) => row
            .try_get::<NaiveDateTime, _>(idx)
            .ok()
            .flatten()
            .map_or(RowValues::Null, RowValues::Timestamp),
        ColumnData::DateTimeOffset(Some(_)) => row
            .try_get::<DateTime<Utc>, _>(idx)
            .ok()
            .flatten()
            .map_or(RowValues::Null, |dt| RowValues::Timestamp(dt.naive_utc())),
        ColumnData::Date(Some(_)) => row
            .try_get::<NaiveDate, _>(idx)
            .ok()
            .flatten()
            .map_or(RowValues::Null, |d| {
                RowValues::Timestamp(d.and_time(NaiveTime::MIN))
            }),
        ColumnData::Time(Some(_)) => row
            .try_get::<NaiveTime, _>(idx)
            .ok()
            .flatten()
            .map_or(RowValues::Null, |t| {
                RowValues::Timestamp(epoch_day().and_time(t))
            }),
        _ => RowValues::Null,
    }
}

/// Driver events for one tiberius stream item. `row_index` counts rows within
/// the current result set.
fn translate(item: tiberius::Result<QueryItem>, row_index: &mut usize) -> Vec<DriverEvent> {
    match item {
        Ok(QueryItem::Metadata(meta)) => {
            *row_index = 0;
            vec![DriverEvent::Meta(
                meta.columns().iter().map(column_from_tiberius).collect(),
            )]
        }
        Ok(QueryItem::Row(row)) => {
            let mut events = vec![DriverEvent::Row(*row_index)];
            *row_index += 1;
            events.extend(
                row.cells()
                    .enumerate()
                    .map(|(index, (_col, data))| DriverEvent::Column {
                        index,
                        data: cell_value(&row, index, data),
                    }),
            );
            events
        }
        Err(err) => vec![DriverEvent::Error(driver_error(err))],
    }
}

impl MssqlConnection {
    async fn events<'c>(
        &'c mut self,
        command: &str,
        binds: Vec<RowValues>,
    ) -> Result<EventStream<'c>, DriverError> {
        let mut query = Query::new(rewrite_placeholders(command).into_owned());
        for bind in binds {
            query.bind(bind);
        }
        let results = query.query(&mut self.client).await.map_err(driver_error)?;

        let mut row_index = 0usize;
        Ok(results
            .flat_map(move |item| stream::iter(translate(item, &mut row_index)))
            .chain(stream::iter([DriverEvent::Done]))
            .boxed())
    }
}

#[async_trait]
impl DriverConnection for MssqlConnection {
    async fn execute_raw<'c>(
        &'c mut self,
        command: &str,
        binds: Vec<RowValues>,
    ) -> Result<EventStream<'c>, DriverError> {
        self.events(command, binds).await
    }

    async fn bind_table<'c>(
        &'c mut self,
        name: &str,
    ) -> Result<Box<dyn TableBinding + 'c>, DriverError> {
        let binding = MssqlTableBinding::bind(&mut self.client, name).await?;
        Ok(Box::new(binding))
    }

    fn mark_unhealthy(&mut self) {
        self.unhealthy = true;
    }

    fn is_unhealthy(&self) -> bool {
        self.unhealthy
    }
}

#[async_trait]
impl DriverConnection for PooledConnection<'static, MssqlManager> {
    async fn execute_raw<'c>(
        &'c mut self,
        command: &str,
        binds: Vec<RowValues>,
    ) -> Result<EventStream<'c>, DriverError> {
        (**self).execute_raw(command, binds).await
    }

    async fn bind_table<'c>(
        &'c mut self,
        name: &str,
    ) -> Result<Box<dyn TableBinding + 'c>, DriverError> {
        (**self).bind_table(name).await
    }

    fn mark_unhealthy(&mut self) {
        (**self).mark_unhealthy();
    }

    fn is_unhealthy(&self) -> bool {
        (**self).is_unhealthy()
    }
}
