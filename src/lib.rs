#![warn(missing_docs)]

//! # sqljob
//!
//! A pure Rust client for WebSocket-based remote SQL job servers.
//!
//! The server runs one SQL engine instance ("job") per connection; this crate
//! drives it over a persistent secure websocket carrying JSON text frames.
//! Statement execution, cursor paging and cursor teardown are multiplexed
//! through a strict one-request-at-a-time protocol on that connection.
//!
//! ## Features
//!
//! - **Pure Rust** - No native client libraries required
//! - **Blocking API** - One caller thread per exchange, no runtime to manage
//! - **TLS/SSL** - rustls-secured connections, with an opt-out for
//!   self-signed development servers
//! - **Cursor lifecycle** - Continuation IDs are validated and finished
//!   cursors reaped and closed automatically
//! - **Session pooling** - A bounded blocking pool with timed acquire
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sqljob::{Config, Session};
//!
//! fn main() -> sqljob::Result<()> {
//!     // Connect to the server
//!     let config = Config::new("db.example.com", "user", "password");
//!     let session = Session::new("quickstart");
//!     session.connect(config)?;
//!
//!     // Execute a query
//!     let mut statement = session.query("SELECT id, name FROM users")?;
//!     let response = statement.execute()?;
//!
//!     for row in response.data.unwrap_or_default() {
//!         println!("{:?} {:?}", row.get("ID"), row.get("NAME"));
//!     }
//!
//!     session.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Prepared Statements
//!
//! Supplying a parameter matrix marks the statement prepared; execution then
//! goes out as a combined prepare-and-execute exchange:
//!
//! ```rust,no_run
//! use sqljob::{QueryOptions, Session};
//! use sqljob::serde_json::json;
//!
//! # fn example(session: Session) -> sqljob::Result<()> {
//! let mut statement = session.query_with_options(
//!     "INSERT INTO users (id, name) VALUES (?, ?)",
//!     QueryOptions {
//!         parameters: Some(vec![
//!             vec![json!(1), json!("Alice")],
//!             vec![json!(2), json!("Bob")],
//!         ]),
//!         ..Default::default()
//!     },
//! )?;
//! let response = statement.execute()?;
//! println!("bound {} parameters", response.parameter_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Cursor Paging
//!
//! A statement's correlation ID doubles as the continuation ID of its open
//! cursor:
//!
//! ```rust,no_run
//! use sqljob::{QueryOptions, Session};
//!
//! # fn example(session: Session) -> sqljob::Result<()> {
//! let mut statement = session.query_with_options(
//!     "SELECT * FROM big_table",
//!     QueryOptions { rows: 100, ..Default::default() },
//! )?;
//! let first_page = statement.execute()?;
//!
//! let cont_id = statement.id().to_string();
//! let next_page = statement.fetch_more(&cont_id, 100)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Connection Pooling
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use sqljob::{Config, Pool, PoolOptions};
//!
//! fn main() -> sqljob::Result<()> {
//!     let pool = Pool::new(PoolOptions {
//!         config: Config::new("db.example.com", "user", "password"),
//!         starting_size: 2,
//!         max_size: 8,
//!         max_wait_time: Duration::from_secs(10),
//!     })?;
//!
//!     let response = pool.execute_sql("UPDATE users SET active = 1")?;
//!     println!("{} rows updated", response.update_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Tiers
//!
//! Failures are split into four tiers (see [`Error`]): transport errors kill
//! the connection, protocol errors mean an undecodable reply, application
//! errors are the server rejecting SQL (inspect
//! [`Error::sql_state`]/[`Error::sql_rc`]), and usage errors are local
//! precondition violations that never touch the network.

pub mod config;
pub mod cursor;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod session;
pub mod statement;
pub mod trace;
pub mod transport;

// Re-export commonly used types
pub use config::{Config, Technique, DEFAULT_PORT};
pub use cursor::CursorRegistry;
pub use error::{Error, Result};
pub use pool::{Pool, PoolOptions};
pub use protocol::{Column, Metadata, Request, ServerResponse};
pub use session::{JobStatus, Session, SessionOptions};
pub use statement::{QueryOptions, Statement, StatementState};
pub use trace::{TraceData, TraceDest, TraceLevel, TraceOptions};
pub use transport::{Scheme, Transport, WsTransport};

// Re-export serde_json for users building parameter matrices
pub use serde_json;
