//! Turns the driver's event stream into recordsets.
//!
//! [`ResultMaterializer`] is a plain state machine fed one [`DriverEvent`] at a
//! time; [`run_command`] pulls events from a connection and feeds it.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::UnboundedSender;

use crate::coercion::value_correction;
use crate::command::{ExecutionMode, SynthesizedCommand};
use crate::driver::{DriverConnection, DriverError, DriverEvent, flag_if_broken};
use crate::error::{RequestErrorCode, SqlMiddlewareDbError};
use crate::options::RequestOptions;
use crate::results::{Column, RETURN_FIELD, Recordset, Row};
use crate::types::RowValues;

/// Column name SQL Server gives a `FOR JSON` result.
pub const JSON_COLUMN_ID: &str = "JSON_F52E2B61-18A1-11d1-B105-00805F49916B";
/// Column name SQL Server gives a `FOR XML` result.
pub const XML_COLUMN_ID: &str = "XML_F52E2B61-18A1-11d1-B105-00805F49916B";

/// Events delivered to a streaming request.
#[derive(Debug)]
pub enum RequestEvent {
    /// A recordset starts with these columns.
    Recordset(Arc<Vec<Column>>),
    Row(Row),
    /// Non-fatal failure (a chunked JSON payload that did not parse).
    Error(SqlMiddlewareDbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitMeta,
    BuildingRow,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sentinel {
    Json,
    Xml,
}

impl Sentinel {
    fn detect(columns: &[Column]) -> Option<Sentinel> {
        match columns {
            [only] if only.name == JSON_COLUMN_ID => Some(Sentinel::Json),
            [only] if only.name == XML_COLUMN_ID => Some(Sentinel::Xml),
            _ => None,
        }
    }

    fn column_name(self) -> &'static str {
        match self {
            Sentinel::Json => JSON_COLUMN_ID,
            Sentinel::Xml => XML_COLUMN_ID,
        }
    }
}

/// Fragments of the single aggregate cell of a `FOR JSON`/`FOR XML` recordset.
#[derive(Debug)]
struct ChunkBuffer {
    sentinel: Sentinel,
    fragments: Vec<String>,
    saw_row: bool,
}

/// Whether the caller should keep feeding events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
}

/// Output of a finished command.
#[derive(Debug, Default)]
pub struct Materialized {
    pub recordsets: Vec<Recordset>,
    pub rows_affected: Vec<u64>,
    /// Row of the trailing output/return projection, when the mode has one.
    pub projection: Option<Row>,
}

/// Recordset reconstruction state for one command.
pub struct ResultMaterializer<'a> {
    mode: ExecutionMode,
    parse_json: bool,
    options: &'a RequestOptions,
    sink: Option<&'a UnboundedSender<RequestEvent>>,
    state: State,
    recordsets: Vec<Recordset>,
    current: Option<Recordset>,
    pending: Option<Row>,
    chunks: Option<ChunkBuffer>,
    rows_affected: Vec<u64>,
    last_row: Option<Row>,
}

impl<'a> ResultMaterializer<'a> {
    #[must_use]
    pub fn new(mode: ExecutionMode, options: &'a RequestOptions) -> Self {
        Self {
            mode,
            parse_json: options.parse_json,
            options,
            sink: options.stream.as_ref(),
            state: State::AwaitMeta,
            recordsets: Vec::new(),
            current: None,
            pending: None,
            chunks: None,
            rows_affected: Vec::new(),
            last_row: None,
        }
    }

    fn streaming(&self) -> bool {
        self.sink.is_some()
    }

    fn emit(&self, event: RequestEvent) {
        if let Some(sink) = self.sink {
            // A dropped receiver only means nobody listens any more.
            let _ = sink.send(event);
        }
    }

    /// Feed one driver event.
    ///
    /// # Errors
    /// Returns the driver error carried by an `Error` event; the command is over.
    pub fn handle(&mut self, event: DriverEvent) -> Result<Flow, DriverError> {
        if self.state == State::Done {
            return Ok(Flow::Done);
        }
        match event {
            DriverEvent::Meta(columns) => self.on_meta(columns),
            DriverEvent::Row(_) => self.on_row(),
            DriverEvent::Column { index, data } => self.on_column(index, data),
            DriverEvent::RowCount(n) => self.rows_affected.push(n),
            DriverEvent::Error(err) => return Err(err),
            DriverEvent::Done => {
                self.close_recordset();
                self.state = State::Done;
                return Ok(Flow::Done);
            }
        }
        Ok(Flow::Continue)
    }

    fn on_meta(&mut self, columns: Vec<Column>) {
        self.close_recordset();

        let columns: Vec<Column> = columns
            .into_iter()
            .enumerate()
            .map(|(index, col)| Column { index, ..col })
            .collect();
        self.chunks = Sentinel::detect(&columns).map(|sentinel| ChunkBuffer {
            sentinel,
            fragments: Vec::new(),
            saw_row: false,
        });
        let columns = Arc::new(columns);
        let is_return_projection = columns.first().is_some_and(|c| c.name == RETURN_FIELD);
        if self.streaming() && !is_return_projection {
            self.emit(RequestEvent::Recordset(Arc::clone(&columns)));
        }
        self.current = Some(Recordset::new(columns));
        self.state = State::AwaitMeta;
    }

    fn on_row(&mut self) {
        self.state = State::BuildingRow;
        if let Some(chunks) = self.chunks.as_mut() {
            // One aggregate cell spans several rows; it is sealed at the recordset boundary.
            chunks.saw_row = true;
            return;
        }
        self.seal_pending();
        self.pending = Some(Row::new());
    }

    fn on_column(&mut self, index: usize, data: RowValues) {
        if let Some(chunks) = self.chunks.as_mut() {
            chunks.saw_row = true;
            if !data.is_null() {
                chunks.fragments.push(data.to_string());
            }
            return;
        }
        let Some(column) = self
            .current
            .as_ref()
            .and_then(|rs| rs.columns().get(index))
            .cloned()
        else {
            tracing::warn!(index, "column event outside of the current recordset; ignored");
            return;
        };
        let value = value_correction(data, &column, &self.options.udt_parsers);
        self.pending
            .get_or_insert_with(Row::new)
            .push_value(&column.name, value);
    }

    fn seal_pending(&mut self) {
        if let Some(row) = self.pending.take() {
            self.deliver(row);
        }
    }

    fn deliver(&mut self, row: Row) {
        if self.streaming() {
            if !row.is_return_row() {
                self.emit(RequestEvent::Row(row.clone()));
            }
            self.last_row = Some(row);
        } else if let Some(rs) = self.current.as_mut() {
            rs.push(row);
        }
    }

    fn close_recordset(&mut self) {
        if let Some(chunks) = self.chunks.take() {
            self.pending = None;
            if let Some(row) = self.reassemble(chunks) {
                self.deliver(row);
            }
        } else {
            self.seal_pending();
        }
        if let Some(rs) = self.current.take() {
            if !self.streaming() {
                self.recordsets.push(rs);
            }
        }
    }

    fn reassemble(&self, chunks: ChunkBuffer) -> Option<Row> {
        if !chunks.saw_row {
            return None;
        }
        let text = chunks.fragments.concat();
        let name = chunks.sentinel.column_name();

        if chunks.sentinel == Sentinel::Json && self.parse_json {
            if text.is_empty() {
                return None;
            }
            return match serde_json::from_str::<JsonValue>(&text) {
                Ok(json) => Some(row_from_json(json, name)),
                Err(e) => {
                    let err = SqlMiddlewareDbError::request(
                        RequestErrorCode::Json,
                        format!("Failed to parse incoming JSON. {e}"),
                    );
                    if self.streaming() {
                        self.emit(RequestEvent::Error(err));
                        None
                    } else {
                        tracing::error!("{err}");
                        Some(single_field_row(name, RowValues::Text(text)))
                    }
                }
            };
        }
        Some(single_field_row(name, RowValues::Text(text)))
    }

    /// Close whatever is still open and hand back the collected results.
    #[must_use]
    pub fn finish(mut self) -> Materialized {
        if self.state != State::Done {
            self.close_recordset();
            self.state = State::Done;
        }
        let projection = if !self.mode.has_trailing_projection() {
            None
        } else if self.streaming() {
            self.last_row.take()
        } else {
            self.recordsets
                .pop()
                .and_then(|rs| rs.rows.into_iter().next())
        };
        Materialized {
            recordsets: self.recordsets,
            rows_affected: self.rows_affected,
            projection,
        }
    }
}

fn single_field_row(name: &str, value: RowValues) -> Row {
    let mut row = Row::new();
    row.push_value(name, value);
    row
}

fn row_from_json(json: JsonValue, name: &str) -> Row {
    match json {
        JsonValue::Object(map) => {
            let mut row = Row::new();
            for (key, value) in map {
                row.push_value(&key, RowValues::from_json(value));
            }
            row
        }
        other => single_field_row(name, RowValues::JSON(other)),
    }
}

/// Execute `command` on `conn` and materialize its results.
///
/// The connection is not released here; the caller owns the lease. A driver error
/// with the broken-connection signature flags `conn` before the error is returned.
///
/// # Errors
/// Returns `RequestError(EREQUEST)` when the driver rejects the command or emits an
/// `error` event. No partial results are returned.
pub async fn run_command<C: DriverConnection + ?Sized>(
    conn: &mut C,
    command: &SynthesizedCommand,
    options: &RequestOptions,
) -> Result<Materialized, SqlMiddlewareDbError> {
    tracing::debug!(command = %command.text, binds = command.binds.len(), "executing command");
    let mut materializer = ResultMaterializer::new(command.mode, options);

    let outcome = match conn.execute_raw(&command.text, command.binds.clone()).await {
        Err(err) => Err(err),
        Ok(mut events) => {
            let mut outcome = Ok(());
            while let Some(event) = events.next().await {
                match materializer.handle(event) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Done) => break,
                    Err(err) => {
                        outcome = Err(err);
                        break;
                    }
                }
            }
            outcome
        }
    };

    match outcome {
        Ok(()) => Ok(materializer.finish()),
        Err(err) => {
            flag_if_broken(conn, &err);
            Err(SqlMiddlewareDbError::from_driver(err))
        }
    }
}
