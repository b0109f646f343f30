//! SQL job session
//!
//! A [`Session`] owns one websocket connection to one server-side SQL job and
//! serializes every request/response exchange through it. The protocol is not
//! pipelined: the transport lock wraps the write and the read of each
//! exchange as one atomic unit, so at most one request is ever in flight.
//!
//! # Example
//!
//! ```rust,no_run
//! use sqljob::{Config, Session};
//!
//! fn main() -> sqljob::Result<()> {
//!     let session = Session::new("reports");
//!     session.connect(Config::new("db.example.com", "user", "password"))?;
//!
//!     let mut statement = session.query("SELECT * FROM sample.sales")?;
//!     let response = statement.execute()?;
//!     println!("{} columns", response.metadata.map_or(0, |m| m.column_count));
//!
//!     session.close()?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::config::Config;
use crate::cursor::{CursorRegistry, CursorState};
use crate::error::{Error, Result};
use crate::protocol::request::Request;
use crate::protocol::response::{decode_response, scan_for_error};
use crate::protocol::ServerResponse;
use crate::statement::{QueryOptions, Statement};
use crate::trace::{write_trace_files, TraceData, TraceOptions};
use crate::transport::{Transport, WsTransport};

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobStatus {
    /// Created, never connected
    NotStarted = 0,
    /// Connect in progress
    Connecting = 1,
    /// Connected and idle
    Ready = 2,
    /// An exchange is in flight
    Busy = 3,
    /// The last exchange failed
    Error = 4,
    /// Closed; unusable until reconnected
    Ended = 5,
}

impl JobStatus {
    /// Get the status string
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::NotStarted => "NOT_STARTED",
            JobStatus::Connecting => "CONNECTING",
            JobStatus::Ready => "READY",
            JobStatus::Busy => "BUSY",
            JobStatus::Error => "ERROR",
            JobStatus::Ended => "ENDED",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => JobStatus::Connecting,
            2 => JobStatus::Ready,
            3 => JobStatus::Busy,
            4 => JobStatus::Error,
            5 => JobStatus::Ended,
            _ => JobStatus::NotStarted,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Session behavior knobs
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Close the server-side cursor of every statement the registry sweep
    /// reaps. With this off, finished statements still leave the registry but
    /// their cursors are left for the server to reclaim.
    pub eager_close_on_sweep: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            eager_close_on_sweep: true,
        }
    }
}

/// One connection to one server-side SQL job
pub struct Session {
    id: String,
    options: SessionOptions,
    status: AtomicU8,
    job_name: Mutex<Option<String>>,
    counter: AtomicU32,
    registry: CursorRegistry,
    transport: Mutex<Option<Box<dyn Transport>>>,
    trace: Mutex<Option<TraceOptions>>,
}

impl Session {
    /// Create a session with the given job label, not yet connected
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_options(id, SessionOptions::default())
    }

    /// Create a session with explicit behavior options
    pub fn with_options(id: impl Into<String>, options: SessionOptions) -> Self {
        Self {
            id: id.into(),
            options,
            status: AtomicU8::new(JobStatus::NotStarted as u8),
            job_name: Mutex::new(None),
            counter: AtomicU32::new(0),
            registry: CursorRegistry::new(),
            transport: Mutex::new(None),
            trace: Mutex::new(None),
        }
    }

    /// The client-chosen job label
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The current session status
    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// The server-assigned job name, known after a successful connect
    pub fn job_name(&self) -> Option<String> {
        self.job_name.lock().clone()
    }

    /// Whether a transport is currently attached
    pub fn is_connected(&self) -> bool {
        self.transport.lock().is_some()
    }

    /// The registry of statements opened on this session
    pub fn registry(&self) -> &CursorRegistry {
        &self.registry
    }

    pub(crate) fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub(crate) fn set_status(&self, status: JobStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    /// Open the websocket and perform the protocol handshake.
    ///
    /// On transport failure the status stays at `Connecting` and the caller
    /// may retry; once frames start flowing, any failure marks the session
    /// `Error`.
    pub fn connect(&self, config: Config) -> Result<()> {
        self.set_status(JobStatus::Connecting);

        let transport =
            WsTransport::open(&config.url(), &config.basic_auth(), config.ignore_unauthorized)?;
        *self.transport.lock() = Some(Box::new(transport));
        tracing::debug!(job = %self.id, host = %config.host, port = config.port, "websocket connected");

        if let Err(err) = self.handshake(&config) {
            self.set_status(JobStatus::Error);
            return Err(err);
        }
        self.set_status(JobStatus::Ready);
        Ok(())
    }

    fn handshake(&self, config: &Config) -> Result<()> {
        let request = Request::connect(&self.id, config.technique, config.properties.as_deref())?;
        self.send(&request)?;
        let job_name = self.get_db_job()?;
        tracing::debug!(job = %self.id, server_job = %job_name, "session ready");
        Ok(())
    }

    /// Build a statement for a SQL query
    pub fn query(&self, sql: &str) -> Result<Statement<'_>> {
        self.query_with_options(sql, QueryOptions::default())
    }

    /// Build a statement for a CL command
    pub fn cl_command(&self, command: &str) -> Result<Statement<'_>> {
        self.query_with_options(
            command,
            QueryOptions {
                is_cl_command: true,
                ..Default::default()
            },
        )
    }

    /// Build a statement with explicit options.
    ///
    /// Allocates the next correlation ID and registers the statement's cursor
    /// state so continuation IDs can be validated later. Supplying a
    /// parameter matrix marks the statement prepared.
    pub fn query_with_options(&self, command: &str, options: QueryOptions) -> Result<Statement<'_>> {
        if command.is_empty() {
            return Err(Error::EmptyCommand);
        }

        let id = self.next_unique_id();
        let cursor = Arc::new(CursorState::new(id));
        self.registry.add(Arc::clone(&cursor));
        Ok(Statement::new(self, cursor, command, &options))
    }

    /// Configure server-side tracing.
    ///
    /// At least one tracer needs both its level and destination; incomplete
    /// pairs are rejected before anything touches the network.
    pub fn set_trace_config(&self, options: TraceOptions) -> Result<()> {
        if options.server_pair().is_none() && options.jtopen_pair().is_none() {
            return Err(Error::IncompleteTraceConfig);
        }

        let request = Request::set_config(&self.id, &options)?;
        self.send(&request)?;
        *self.trace.lock() = Some(options);
        Ok(())
    }

    /// Fetch the trace text collected since [`Session::set_trace_config`].
    ///
    /// Tracers configured with a file destination have their text written to
    /// dated files next to the process; the collected data is returned either
    /// way.
    pub fn get_trace_data(&self) -> Result<TraceData> {
        let options = self.trace.lock().clone().ok_or(Error::TraceNotConfigured)?;

        let request = Request::get_trace_data(&self.id)?;
        let raw = self.send_scanned(&request)?;
        let mut data: TraceData = serde_json::from_str(&raw).map_err(|err| {
            self.set_status(JobStatus::Error);
            Error::Decode(err)
        })?;
        data.dest = options.dest;
        data.jtopen_dest = options.jtopen_dest;

        let written = write_trace_files(&data)?;
        for path in &written {
            tracing::debug!(job = %self.id, path = %path.display(), "trace file written");
        }
        Ok(data)
    }

    /// The server version string
    pub fn version(&self) -> Result<String> {
        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct VersionReply {
            version: String,
        }

        let request = Request::get_version()?;
        let raw = self.send_scanned(&request)?;
        let reply: VersionReply = serde_json::from_str(&raw).map_err(|err| {
            self.set_status(JobStatus::Error);
            Error::Decode(err)
        })?;
        Ok(reply.version)
    }

    /// Send the exit envelope and close the connection.
    ///
    /// The session ends up `Ended` and is unusable until reconnected.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.transport.lock();
        let Some(transport) = guard.as_mut() else {
            return Err(Error::NoConnection);
        };
        self.set_status(JobStatus::Ended);

        let request = Request::exit()?;
        transport.send(request.frame())?;
        transport.close()?;
        *guard = None;
        drop(guard);

        *self.trace.lock() = None;
        tracing::debug!(job = %self.id, "session closed");
        Ok(())
    }

    /// Send one request and decode its reply: the atomic exchange primitive.
    ///
    /// Success resets the status to `Ready` and stamps the response with the
    /// server job name once it is known. A server-reported failure also
    /// leaves the session `Ready`: the exchange itself completed, so no
    /// reconnect is needed. Transport and decode failures mark the session
    /// `Error`.
    pub(crate) fn send(&self, request: &Request) -> Result<ServerResponse> {
        let raw = self.exchange(request)?;

        match decode_response(&raw, request.terse) {
            Ok(mut response) => {
                if let Some(name) = self.job_name.lock().clone() {
                    response.job = name;
                }
                self.set_status(JobStatus::Ready);
                Ok(response)
            }
            Err(err @ Error::Server { .. }) => {
                self.set_status(JobStatus::Ready);
                Err(err)
            }
            Err(err) => {
                self.set_status(JobStatus::Error);
                Err(err)
            }
        }
    }

    /// Exchange variant for verbs whose replies do not fit [`ServerResponse`]:
    /// pre-scans for server failures but hands the raw text back.
    fn send_scanned(&self, request: &Request) -> Result<String> {
        let raw = self.exchange(request)?;
        self.set_status(JobStatus::Ready);
        scan_for_error(&raw)?;
        Ok(raw)
    }

    /// Write one frame and block for exactly one reply frame, holding the
    /// transport lock across the pair.
    fn exchange(&self, request: &Request) -> Result<String> {
        let mut guard = self.transport.lock();
        let transport = guard.as_mut().ok_or(Error::NoConnection)?;

        self.set_status(JobStatus::Busy);
        if let Err(err) = transport.send(request.frame()) {
            self.set_status(JobStatus::Error);
            return Err(err);
        }
        match transport.receive() {
            Ok(raw) => Ok(raw),
            Err(err) => {
                self.set_status(JobStatus::Error);
                Err(err)
            }
        }
    }

    /// Close a server-side cursor without consulting the registry. Used by
    /// the explicit close path after validation, and by the registry sweep
    /// for reaped statements.
    pub(crate) fn sql_close_unchecked(&self, id: &str, cont_id: &str) -> Result<()> {
        self.set_status(JobStatus::Busy);
        let request = Request::sql_close(id, cont_id)?;
        self.send(&request).map(|_| ())
    }

    fn get_db_job(&self) -> Result<String> {
        if self.id.is_empty() {
            return Err(Error::MissingJobId);
        }

        let request = Request::get_db_job(&self.id)?;
        let response = self.send(&request)?;
        *self.job_name.lock() = Some(response.job.clone());
        Ok(response.job)
    }

    fn next_unique_id(&self) -> String {
        (self.counter.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_not_started() {
        let session = Session::new("test");
        assert_eq!(session.status(), JobStatus::NotStarted);
        assert!(!session.is_connected());
        assert!(session.job_name().is_none());
    }

    #[test]
    fn test_close_without_connection_fails() {
        let session = Session::new("test");
        assert!(matches!(session.close(), Err(Error::NoConnection)));
        // the failed close must not flip the status to ENDED
        assert_eq!(session.status(), JobStatus::NotStarted);
    }

    #[test]
    fn test_version_without_connection_fails() {
        let session = Session::new("test");
        assert!(matches!(session.version(), Err(Error::NoConnection)));
    }

    #[test]
    fn test_trace_data_requires_config_first() {
        let session = Session::new("test");
        assert!(matches!(
            session.get_trace_data(),
            Err(Error::TraceNotConfigured)
        ));
    }

    #[test]
    fn test_incomplete_trace_config_is_rejected() {
        let session = Session::new("test");
        let options = TraceOptions {
            level: Some("ON".parse().unwrap()),
            ..Default::default()
        };
        assert!(matches!(
            session.set_trace_config(options),
            Err(Error::IncompleteTraceConfig)
        ));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(JobStatus::NotStarted.as_str(), "NOT_STARTED");
        assert_eq!(JobStatus::Connecting.to_string(), "CONNECTING");
        assert_eq!(JobStatus::Ready.as_str(), "READY");
        assert_eq!(JobStatus::Busy.as_str(), "BUSY");
        assert_eq!(JobStatus::Error.as_str(), "ERROR");
        assert_eq!(JobStatus::Ended.as_str(), "ENDED");
    }

    #[test]
    fn test_unique_ids_share_one_counter() {
        let session = Session::new("test");
        assert_eq!(session.next_unique_id(), "1");
        assert_eq!(session.next_unique_id(), "2");
        let statement = session.query("SELECT 1 FROM SYSIBM.SYSDUMMY1").unwrap();
        assert_eq!(statement.id(), "3");
    }
}
