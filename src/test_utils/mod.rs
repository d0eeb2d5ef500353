//! In-memory driver and pool for exercising the request layer without a server.
//!
//! Every `execute_raw` call consumes the next queued script; an empty queue
//! answers with a bare `Done`. Commands, binds, leases and bulk rows are recorded
//! so tests can assert on them.

mod script;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;

use crate::driver::{
    ConnectionPool, DriverConnection, DriverError, DriverEvent, EventStream, NamedRow,
    TableBinding,
};
use crate::error::SqlMiddlewareDbError;
use crate::results::Column;
use crate::types::RowValues;

pub use script::EventScript;

/// One command the scripted driver received.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedCommand {
    pub connection: usize,
    pub text: String,
    pub binds: Vec<RowValues>,
}

/// Lease bookkeeping of a [`ScriptedPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub acquired: usize,
    pub released: usize,
    /// Released connections that were flagged unhealthy (the pool would destroy them).
    pub discarded: usize,
}

enum Script {
    Events(Vec<DriverEvent>),
    Reject(DriverError),
}

#[derive(Debug, Default)]
struct ScriptedTable {
    columns: Vec<Column>,
    exists: bool,
    rows: Vec<NamedRow>,
}

#[derive(Default)]
struct PoolState {
    scripts: VecDeque<Script>,
    executed: Vec<ExecutedCommand>,
    tables: HashMap<String, ScriptedTable>,
    insert_failure: Option<DriverError>,
    unavailable: bool,
    next_id: usize,
    stats: PoolStats,
}

/// Pool handing out [`ScriptedConnection`]s that replay queued event scripts.
#[derive(Clone, Default)]
pub struct ScriptedPool {
    state: Arc<Mutex<PoolState>>,
}

impl std::fmt::Debug for ScriptedPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedPool")
            .field("stats", &self.stats())
            .finish()
    }
}

impl ScriptedPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the events answering the next command.
    pub fn push_events(&self, events: Vec<DriverEvent>) -> &Self {
        self.lock().scripts.push_back(Script::Events(events));
        self
    }

    /// Queue a driver rejection for the next command (no event stream at all).
    pub fn push_rejection(&self, err: DriverError) -> &Self {
        self.lock().scripts.push_back(Script::Reject(err));
        self
    }

    /// Every `acquire` fails with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Register an existing server table under its unquoted name.
    pub fn add_table(&self, name: &str, columns: Vec<Column>) {
        self.lock().tables.insert(
            name.to_string(),
            ScriptedTable {
                columns,
                exists: true,
                rows: Vec::new(),
            },
        );
    }

    /// Register a table that springs into existence once a guarded
    /// `IF OBJECT_ID(...) IS NULL CREATE TABLE` naming it runs.
    pub fn add_creatable_table(&self, name: &str, columns: Vec<Column>) {
        self.lock().tables.insert(
            name.to_string(),
            ScriptedTable {
                columns,
                exists: false,
                rows: Vec::new(),
            },
        );
    }

    /// Fail the next bulk insert with `err`.
    pub fn fail_next_insert(&self, err: DriverError) {
        self.lock().insert_failure = Some(err);
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.lock().stats
    }

    #[must_use]
    pub fn executed(&self) -> Vec<ExecutedCommand> {
        self.lock().executed.clone()
    }

    /// Rows inserted so far into the table registered as `name`.
    #[must_use]
    pub fn table_rows(&self, name: &str) -> Vec<NamedRow> {
        self.lock()
            .tables
            .get(name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn table_exists(&self, name: &str) -> bool {
        self.lock().tables.get(name).is_some_and(|t| t.exists)
    }
}

#[async_trait]
impl ConnectionPool for ScriptedPool {
    type Connection = ScriptedConnection;

    async fn acquire(&self) -> Result<ScriptedConnection, SqlMiddlewareDbError> {
        let id = {
            let mut state = self.lock();
            if state.unavailable {
                return Err(SqlMiddlewareDbError::ConnectionError(
                    "scripted pool is unavailable".to_string(),
                ));
            }
            state.next_id += 1;
            state.stats.acquired += 1;
            state.next_id
        };
        Ok(ScriptedConnection {
            id,
            state: Arc::clone(&self.state),
            unhealthy: false,
        })
    }

    fn release(&self, conn: ScriptedConnection) {
        let mut state = self.lock();
        state.stats.released += 1;
        if conn.unhealthy {
            state.stats.discarded += 1;
        }
    }
}

/// Connection leased from a [`ScriptedPool`].
pub struct ScriptedConnection {
    id: usize,
    state: Arc<Mutex<PoolState>>,
    unhealthy: bool,
}

impl ScriptedConnection {
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_script(&self, command: &str, binds: Vec<RowValues>) -> Script {
        let mut state = self.lock();
        state.executed.push(ExecutedCommand {
            connection: self.id,
            text: command.to_string(),
            binds,
        });
        if command.starts_with("IF OBJECT_ID(") && command.contains("CREATE TABLE") {
            let unquoted = command.replace(['[', ']'], "");
            for (name, table) in &mut state.tables {
                if unquoted.contains(name.as_str()) {
                    table.exists = true;
                }
            }
        }
        state
            .scripts
            .pop_front()
            .unwrap_or(Script::Events(vec![DriverEvent::Done]))
    }

    fn table_columns(&self, name: &str) -> Vec<Column> {
        self.lock()
            .tables
            .get(name)
            .filter(|t| t.exists)
            .map(|t| t.columns.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DriverConnection for ScriptedConnection {
    async fn execute_raw<'c>(
        &'c mut self,
        command: &str,
        binds: Vec<RowValues>,
    ) -> Result<EventStream<'c>, DriverError> {
        match self.next_script(command, binds) {
            Script::Events(events) => Ok(stream::iter(events).boxed()),
            Script::Reject(err) => Err(err),
        }
    }

    async fn bind_table<'c>(
        &'c mut self,
        name: &str,
    ) -> Result<Box<dyn TableBinding + 'c>, DriverError> {
        let columns = self.table_columns(name);
        Ok(Box::new(ScriptedBinding {
            conn: self,
            name: name.to_string(),
            columns,
        }))
    }

    fn mark_unhealthy(&mut self) {
        self.unhealthy = true;
    }

    fn is_unhealthy(&self) -> bool {
        self.unhealthy
    }
}

struct ScriptedBinding<'c> {
    conn: &'c mut ScriptedConnection,
    name: String,
    columns: Vec<Column>,
}

impl ScriptedBinding<'_> {
    fn store(&self, rows: Vec<NamedRow>) -> Result<(), DriverError> {
        let mut state = self.conn.lock();
        if let Some(err) = state.insert_failure.take() {
            return Err(err);
        }
        if let Some(table) = state.tables.get_mut(&self.name) {
            table.rows.extend(rows);
        }
        Ok(())
    }
}

#[async_trait]
impl TableBinding for ScriptedBinding<'_> {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    async fn insert_rows(&mut self, rows: Vec<NamedRow>) -> Result<(), DriverError> {
        self.store(rows)
    }
}
