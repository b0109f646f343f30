//! Session pool
//!
//! A bounded, blocking collection of ready sessions shared by concurrent
//! callers. Acquire waits up to a configured limit for a session to come
//! back, then grows the pool, never past its max size, even under
//! concurrent acquires.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use sqljob::{Config, Pool, PoolOptions};
//!
//! fn main() -> sqljob::Result<()> {
//!     let pool = Pool::new(PoolOptions {
//!         config: Config::new("db.example.com", "user", "password"),
//!         starting_size: 2,
//!         max_size: 5,
//!         max_wait_time: Duration::from_secs(5),
//!     })?;
//!
//!     let response = pool.execute_sql("VALUES CURRENT DATE")?;
//!     println!("{:?}", response.data);
//!
//!     pool.close();
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::ServerResponse;
use crate::session::Session;
use crate::statement::QueryOptions;

/// Options for configuring a session pool
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Credentials and endpoint for every pooled session
    pub config: Config,
    /// Sessions connected up front
    pub starting_size: u32,
    /// Hard cap on sessions ever created
    pub max_size: u32,
    /// How long an acquire may wait for a returned session before growing
    /// the pool or giving up
    pub max_wait_time: Duration,
}

struct ReadyQueue {
    sessions: VecDeque<Session>,
    closed: bool,
}

/// Bounded blocking pool of ready sessions
pub struct Pool {
    ready: Mutex<ReadyQueue>,
    available: Condvar,
    created: AtomicU32,
    options: PoolOptions,
}

impl Pool {
    /// Validate the options and connect the starting sessions concurrently.
    ///
    /// Fails fast, before any session is created, on a non-positive max or
    /// starting size, a starting size above the max, or missing host or
    /// password.
    pub fn new(options: PoolOptions) -> Result<Self> {
        if options.max_size == 0 {
            return Err(Error::PoolMaxSize);
        }
        if options.starting_size == 0 {
            return Err(Error::PoolStartingSize);
        }
        if options.max_size < options.starting_size {
            return Err(Error::PoolSizeOrder);
        }
        if options.config.host.is_empty() || options.config.password().is_empty() {
            return Err(Error::MissingCredentials);
        }

        let mut sessions = VecDeque::with_capacity(options.max_size as usize);
        thread::scope(|scope| -> Result<()> {
            let (sender, receiver) = mpsc::channel();
            for n in 1..=options.starting_size {
                let sender = sender.clone();
                let config = options.config.clone();
                scope.spawn(move || {
                    let session = Session::new(format!("PoolJob {n}"));
                    let result = session.connect(config).map(|()| session);
                    let _ = sender.send(result);
                });
            }
            drop(sender);
            for result in receiver {
                sessions.push_back(result?);
            }
            Ok(())
        })?;
        tracing::debug!(count = options.starting_size, "pool seeded");

        Ok(Self {
            ready: Mutex::new(ReadyQueue {
                sessions,
                closed: false,
            }),
            available: Condvar::new(),
            created: AtomicU32::new(options.starting_size),
            options,
        })
    }

    /// Take a ready session, waiting up to the configured limit.
    ///
    /// A dequeued session whose transport is gone is reconnected before it is
    /// handed out. When the wait expires and the pool is still below its max
    /// size, a new session is connected instead; otherwise the acquire fails.
    pub fn acquire(&self) -> Result<Session> {
        let deadline = Instant::now() + self.options.max_wait_time;
        let mut ready = self.ready.lock();
        loop {
            if ready.closed {
                return Err(Error::PoolClosed);
            }
            if let Some(session) = ready.sessions.pop_front() {
                drop(ready);
                if !session.is_connected() {
                    session.connect(self.options.config.clone())?;
                }
                return Ok(session);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.available.wait_for(&mut ready, remaining);
        }
        drop(ready);
        self.grow()
    }

    /// Return a session to the pool.
    ///
    /// Defensive: release is typically called from a cleanup path, so a full
    /// queue is reported rather than assumed impossible.
    pub fn release(&self, session: Session) -> Result<()> {
        let mut ready = self.ready.lock();
        if ready.closed {
            return Err(Error::PoolClosed);
        }
        if ready.sessions.len() as u32 >= self.options.max_size {
            return Err(Error::PoolFull);
        }
        ready.sessions.push_back(session);
        drop(ready);
        self.available.notify_one();
        Ok(())
    }

    /// Execute one SQL query on a pooled session
    pub fn execute_sql(&self, sql: &str) -> Result<ServerResponse> {
        self.execute_sql_with_options(sql, QueryOptions::default())
    }

    /// Execute one command with options on a pooled session.
    ///
    /// The session is always released back, even when execution failed; an
    /// execution error and a release error are joined so neither is dropped.
    pub fn execute_sql_with_options(
        &self,
        command: &str,
        options: QueryOptions,
    ) -> Result<ServerResponse> {
        let session = self.acquire()?;

        let executed = session
            .query_with_options(command, options)
            .and_then(|mut statement| statement.execute());
        let released = self.release(session);

        match (executed, released) {
            (Ok(response), Ok(())) => Ok(response),
            (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
            (Err(first), Err(second)) => Err(Error::join(first, second)),
        }
    }

    /// Number of sessions this pool has ever created
    pub fn created_count(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    /// Close the pool: every queued session is closed and further acquires
    /// and releases fail. Sessions currently checked out are the caller's
    /// responsibility.
    pub fn close(&self) {
        let drained: Vec<Session> = {
            let mut ready = self.ready.lock();
            ready.closed = true;
            ready.sessions.drain(..).collect()
        };
        self.available.notify_all();

        for session in drained {
            if let Err(err) = session.close() {
                tracing::warn!(job = %session.id(), error = %err, "failed to close pooled session");
            }
        }
    }

    /// Claim a counter slot and connect a fresh session for it. The CAS loop
    /// keeps the created count at or below max size no matter how many
    /// acquires race here.
    fn grow(&self) -> Result<Session> {
        loop {
            let count = self.created.load(Ordering::SeqCst);
            if count >= self.options.max_size {
                return Err(Error::PoolTimeout);
            }
            if self
                .created
                .compare_exchange(count, count + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let label = format!("PoolJob {}", count + 1);
                tracing::debug!(job = %label, "growing pool");
                let session = Session::new(label);
                session.connect(self.options.config.clone())?;
                return Ok(session);
            }
        }
    }
}
