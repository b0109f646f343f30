//! SQL statement handling
//!
//! A [`Statement`] is one SQL or CL unit of work on a session, together with
//! its cursor lifecycle. Its correlation ID doubles as the server-side
//! continuation ID once results are open: pass it to [`Statement::fetch_more`]
//! to page and to [`Statement::close`] to tear the cursor down early.
//!
//! # Example
//!
//! ```rust,no_run
//! use sqljob::{Config, QueryOptions, Session};
//!
//! fn main() -> sqljob::Result<()> {
//!     let session = Session::new("demo");
//!     session.connect(Config::new("db.example.com", "user", "password"))?;
//!
//!     let mut statement = session.query_with_options(
//!         "SELECT * FROM sample.employee",
//!         QueryOptions { rows: 50, ..Default::default() },
//!     )?;
//!     let mut response = statement.execute()?;
//!     let cont_id = statement.id().to_string();
//!     while !response.is_done {
//!         response = statement.fetch_more(&cont_id, 50)?;
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::cursor::CursorState;
use crate::error::{Error, Result};
use crate::protocol::request::{encode_parameters, Request};
use crate::protocol::ServerResponse;
use crate::session::{JobStatus, Session};

/// Statement lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatementState {
    /// Created but never executed
    NotYetRun = 0,
    /// Executed; the cursor has more rows
    RunMoreData = 1,
    /// Executed to completion; terminal
    RunDone = 2,
}

impl StatementState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => StatementState::RunMoreData,
            2 => StatementState::RunDone,
            _ => StatementState::NotYetRun,
        }
    }
}

/// Options for query execution
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Number of rows to fetch (0 lets the server decide)
    pub rows: u32,
    /// Parameter matrix for a prepared statement; supplying one marks the
    /// statement prepared
    pub parameters: Option<Vec<Vec<Value>>>,
    /// Request positional (terse) rows instead of named-field rows
    pub terse_results: bool,
    /// Treat the command text as a CL command instead of SQL
    pub is_cl_command: bool,
}

enum CommandText {
    Sql(String),
    Cl(String),
}

/// One SQL or CL unit of work and its cursor lifecycle
pub struct Statement<'s> {
    session: &'s Session,
    cursor: Arc<CursorState>,
    command: CommandText,
    parameters: Option<Value>,
    rows: String,
    terse: bool,
    prepared: bool,
}

impl<'s> Statement<'s> {
    pub(crate) fn new(
        session: &'s Session,
        cursor: Arc<CursorState>,
        command: &str,
        options: &QueryOptions,
    ) -> Self {
        let command = if options.is_cl_command {
            CommandText::Cl(command.to_string())
        } else {
            CommandText::Sql(command.to_string())
        };
        let rows = if options.rows > 0 {
            options.rows.to_string()
        } else {
            String::new()
        };
        Self {
            session,
            cursor,
            command,
            parameters: options.parameters.as_deref().map(encode_parameters),
            rows,
            terse: options.terse_results,
            prepared: options.parameters.is_some(),
        }
    }

    /// The correlation ID, unique within the owning session. Doubles as the
    /// continuation ID once results are open.
    pub fn id(&self) -> &str {
        self.cursor.id()
    }

    /// The current lifecycle state
    pub fn state(&self) -> StatementState {
        self.cursor.state()
    }

    /// Whether this statement carries a server-side plan
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Execute the statement for the first time.
    ///
    /// CL commands go out as `cl`, prepared statements as the combined
    /// `prepare_sql_execute`, everything else as plain `sql`. A second call
    /// fails without touching the network.
    pub fn execute(&mut self) -> Result<ServerResponse> {
        self.session.set_status(JobStatus::Busy);
        if self.state() != StatementState::NotYetRun {
            self.session.set_status(JobStatus::Error);
            return Err(Error::AlreadyRun);
        }

        let request = match (&self.command, self.prepared) {
            (CommandText::Cl(cmd), _) => Request::cl(self.id(), cmd, self.terse)?,
            (CommandText::Sql(sql), true) => {
                let parameters = self
                    .parameters
                    .clone()
                    .unwrap_or_else(|| Value::Array(Vec::new()));
                Request::prepare_sql_execute(self.id(), sql, &parameters, &self.rows, self.terse)?
            }
            (CommandText::Sql(sql), false) => {
                Request::sql(self.id(), sql, &self.rows, self.terse)?
            }
        };
        self.run(request)
    }

    /// Allocate the server-side plan without executing it.
    ///
    /// Execution then goes through [`Statement::execute_prepared`]. CL
    /// commands have no plan to prepare.
    pub fn prepare(&mut self) -> Result<ServerResponse> {
        self.session.set_status(JobStatus::Busy);
        if self.state() != StatementState::NotYetRun {
            self.session.set_status(JobStatus::Error);
            return Err(Error::AlreadyRun);
        }
        let CommandText::Sql(sql) = &self.command else {
            self.session.set_status(JobStatus::Error);
            return Err(Error::NotPreparable);
        };

        let request = Request::prepare_sql(self.id(), sql, &self.rows, self.terse)?;
        let response = self.session.send(&request)?;
        // no cursor is open yet, so the lifecycle state does not move
        self.prepared = true;
        Ok(response)
    }

    /// Run a previously prepared plan, optionally binding a fresh parameter
    /// matrix. The continuation ID is the statement's own correlation ID.
    pub fn execute_prepared(&mut self, parameters: Option<Vec<Vec<Value>>>) -> Result<ServerResponse> {
        self.session.set_status(JobStatus::Busy);
        if !self.prepared {
            self.session.set_status(JobStatus::Error);
            return Err(Error::NotPrepared);
        }
        if self.state() != StatementState::NotYetRun {
            self.session.set_status(JobStatus::Error);
            return Err(Error::AlreadyRun);
        }
        if let Some(rows) = parameters {
            self.parameters = Some(encode_parameters(&rows));
        }

        let request = Request::execute(self.id(), self.id(), self.parameters.as_ref(), self.terse)?;
        self.run(request)
    }

    /// Fetch up to `rows` more rows from the open cursor named by `cont_id`.
    ///
    /// The continuation ID must name a registered statement that has not run
    /// to completion. A successful reply always reports `has_results`: by
    /// definition fetch-more continues an existing result set, even when the
    /// wire reply omits the flag.
    pub fn fetch_more(&mut self, cont_id: &str, rows: u32) -> Result<ServerResponse> {
        self.session.set_status(JobStatus::Busy);
        if !self.session.registry().validate(cont_id) {
            self.session.set_status(JobStatus::Error);
            return Err(Error::UnknownContinuation);
        }
        if self.state() == StatementState::NotYetRun {
            self.session.set_status(JobStatus::Error);
            return Err(Error::NotYetRun);
        }

        let request = Request::fetch_more(self.id(), cont_id, &rows.to_string(), self.terse)?;
        let mut response = self.run(request)?;
        if response.success {
            response.has_results = true;
        }
        Ok(response)
    }

    /// Close the server-side cursor named by `cont_id`.
    ///
    /// Cursors run to completion are closed automatically during the registry
    /// sweep (under the eager-close policy); this is the explicit path.
    pub fn close(&self, cont_id: &str) -> Result<()> {
        if !self.session.registry().validate(cont_id) {
            self.session.set_status(JobStatus::Error);
            return Err(Error::UnknownContinuation);
        }
        self.session.sql_close_unchecked(self.id(), cont_id)
    }

    /// Send a cursor-bearing request, apply the resulting state transition,
    /// and sweep the registry.
    fn run(&self, request: Request) -> Result<ServerResponse> {
        let response = self.session.send(&request)?;

        if response.is_done && response.success {
            self.cursor.set_state(StatementState::RunDone);
        } else if response.success {
            self.cursor.set_state(StatementState::RunMoreData);
        }
        self.session.registry().sweep(self.session);

        Ok(response)
    }
}
