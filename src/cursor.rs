//! Cursor registry
//!
//! Each session tracks every statement opened on it so continuation IDs can
//! be validated and finished cursors reaped. The registry lock is independent
//! of the session's transport lock: bookkeeping never waits on the wire, and
//! the server-side closes a sweep may trigger happen after the lock is
//! released.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::session::Session;
use crate::statement::StatementState;

/// State shared between one statement and its session's registry
pub(crate) struct CursorState {
    id: String,
    state: AtomicU8,
}

impl CursorState {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            state: AtomicU8::new(StatementState::NotYetRun as u8),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn state(&self) -> StatementState {
        StatementState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: StatementState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Tracks the live statements of one session
#[derive(Default)]
pub struct CursorRegistry {
    entries: Mutex<Vec<Arc<CursorState>>>,
}

impl CursorRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, cursor: Arc<CursorState>) {
        self.entries.lock().push(cursor);
    }

    /// Check whether `id` names a registered statement whose cursor is still
    /// open (not run to completion)
    pub fn validate(&self, id: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|cursor| cursor.id() == id && cursor.state() != StatementState::RunDone)
    }

    /// Number of statements currently tracked
    pub fn open_cursors(&self) -> usize {
        self.entries.lock().len()
    }

    /// Remove every statement that has run to completion. When the session's
    /// eager-close policy is on, each reaped cursor is also closed
    /// server-side; close failures are logged and swallowed.
    pub(crate) fn sweep(&self, session: &Session) {
        let reaped: Vec<Arc<CursorState>> = {
            let mut entries = self.entries.lock();
            let mut done = Vec::new();
            entries.retain(|cursor| {
                if cursor.state() == StatementState::RunDone {
                    done.push(Arc::clone(cursor));
                    false
                } else {
                    true
                }
            });
            done
        };

        if !session.options().eager_close_on_sweep {
            return;
        }
        for cursor in reaped {
            tracing::debug!(cont_id = %cursor.id(), "closing reaped cursor");
            if let Err(err) = session.sql_close_unchecked(cursor.id(), cursor.id()) {
                tracing::warn!(cont_id = %cursor.id(), error = %err, "failed to close reaped cursor");
            }
        }
    }
}
