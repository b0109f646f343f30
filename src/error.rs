//! Error types for the SQL job client
//!
//! Every failure surfaced by this crate falls into one of four tiers:
//! transport (the socket died), protocol (the reply could not be decoded),
//! application (the server reported a SQL failure, an expected outcome of
//! bad SQL rather than a bug), and usage (a local precondition was violated before
//! anything touched the network).

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the SQL job client
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Opening the websocket failed
    #[error("error connecting to websocket: {0}")]
    Connect(String),

    /// Writing a frame failed
    #[error("error writing message: {0}")]
    Write(String),

    /// Reading a reply frame failed
    #[error("error reading message: {0}")]
    Read(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Reply body could not be decoded
    #[error("error decoding json reply: {0}")]
    Decode(#[from] serde_json::Error),

    // =========================================================================
    // Application Errors
    // =========================================================================
    /// The server reported a SQL failure for the request with `id`
    #[error("server error [SQLSTATE {sql_state}, SQLCODE {sql_rc}]: {message}")]
    Server {
        id: String,
        sql_rc: i32,
        sql_state: String,
        message: String,
    },

    // =========================================================================
    // Usage Errors
    // =========================================================================
    /// No command text was supplied
    #[error("SQL or CL command required")]
    EmptyCommand,

    /// The statement was executed a second time
    #[error("statement has already been run")]
    AlreadyRun,

    /// The statement has no open cursor yet
    #[error("statement has not yet been run")]
    NotYetRun,

    /// The continuation ID is unknown or its cursor is already done
    #[error("need ID from previous SQL")]
    UnknownContinuation,

    /// CL commands have no server-side plan to prepare
    #[error("CL commands cannot be prepared")]
    NotPreparable,

    /// The statement was never prepared
    #[error("statement has not been prepared")]
    NotPrepared,

    /// No websocket connection is open
    #[error("need a websocket connection")]
    NoConnection,

    /// The session has no job label
    #[error("need a job ID")]
    MissingJobId,

    /// Trace data was requested before configuring tracing
    #[error("need to set the trace config")]
    TraceNotConfigured,

    /// Neither tracer has both its level and destination set
    #[error("need at least two fields; level and dest of the same tracer")]
    IncompleteTraceConfig,

    /// Pool max size must be positive
    #[error("max size must be greater than 0")]
    PoolMaxSize,

    /// Pool starting size must be positive
    #[error("starting size must be greater than 0")]
    PoolStartingSize,

    /// Pool starting size may not exceed max size
    #[error("max size must be greater than or equal to starting size")]
    PoolSizeOrder,

    /// Pool credentials are incomplete
    #[error("hostname and password required")]
    MissingCredentials,

    /// The ready queue is already at max size
    #[error("not enough space in the pool")]
    PoolFull,

    /// No session became available within the wait limit
    #[error("exceeded time limit")]
    PoolTimeout,

    /// The pool has been closed
    #[error("pool is closed")]
    PoolClosed,

    /// A string did not parse as a connection technique
    #[error("unknown technique: {0}")]
    InvalidTechnique(String),

    /// A string did not parse as a trace level
    #[error("unknown trace level: {0}")]
    InvalidTraceLevel(String),

    /// A string did not parse as a trace destination
    #[error("unknown trace destination: {0}")]
    InvalidTraceDest(String),

    /// A string did not parse as a websocket scheme
    #[error("unknown scheme: {0}")]
    InvalidScheme(String),

    /// A required environment variable is missing
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// An environment variable holds an unusable value
    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// Underlying I/O error (trace-file writing)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Two failures from one operation, neither dropped
    #[error("{first}; {second}")]
    Compound { first: Box<Error>, second: Box<Error> },
}

impl Error {
    /// Join two errors so neither is silently discarded
    pub fn join(first: Error, second: Error) -> Error {
        Error::Compound {
            first: Box::new(first),
            second: Box::new(second),
        }
    }

    /// Check if this is a transport-tier error (the caller must reconnect)
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Connect(_) | Error::Write(_) | Error::Read(_))
    }

    /// Check if this is a protocol-tier error (undecodable reply)
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    /// Check if the server reported this failure (no reconnect required)
    pub fn is_application(&self) -> bool {
        matches!(self, Error::Server { .. })
    }

    /// Check if this is a local precondition violation that never touched
    /// the network
    pub fn is_usage(&self) -> bool {
        !self.is_transport() && !self.is_protocol() && !self.is_application()
            && !matches!(self, Error::Io(_) | Error::Compound { .. })
    }

    /// The correlation ID of the failed request, when the server reported one
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Error::Server { id, .. } => Some(id),
            _ => None,
        }
    }

    /// The SQLSTATE code, when the server reported one
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Error::Server { sql_state, .. } => Some(sql_state),
            _ => None,
        }
    }

    /// The numeric SQL return code, when the server reported one
    pub fn sql_rc(&self) -> Option<i32> {
        match self {
            Error::Server { sql_rc, .. } => Some(*sql_rc),
            _ => None,
        }
    }
}
