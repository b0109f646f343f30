//! Reply decoding
//!
//! Decoding is a two-step affair. First a permissive pre-scan looks for the
//! `error`/`sql_state`/`sql_rc` failure shape and short-circuits before any
//! structured decode. Second, when the originating request asked for terse
//! results, the raw text is relabeled: the server always emits row data under
//! the ordinary `"data"` key, even in terse mode, so the key introducing the
//! row array is rewritten to `"terse_data"` exactly once before parsing.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

const TERSE_FROM: &str = "\"data\":[[";
const TERSE_TO: &str = "\"terse_data\":[[";

/// A decoded server reply
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerResponse {
    /// The correlation ID of the request this reply answers
    pub id: String,
    /// The server job name
    pub job: String,
    /// Whether the request was successful
    pub success: bool,
    /// Whether the reply carries result rows
    pub has_results: bool,
    /// Whether the cursor is exhausted
    pub is_done: bool,
    /// Rows affected by the statement (−1 if not applicable)
    pub update_count: i64,
    /// Number of parameters in a prepared statement
    pub parameter_count: i64,
    /// Named-field rows; never present together with `terse_data`
    pub data: Option<Vec<Map<String, Value>>>,
    /// Positional rows; only present for terse statements
    pub terse_data: Option<Vec<Vec<Value>>>,
    /// Column metadata
    pub metadata: Option<Metadata>,
    /// SQLSTATE code (failure replies only)
    pub sql_state: Option<String>,
    /// Numeric SQL return code (failure replies only)
    pub sql_rc: i32,
}

impl Default for ServerResponse {
    fn default() -> Self {
        Self {
            id: String::new(),
            job: String::new(),
            success: false,
            has_results: false,
            is_done: false,
            update_count: -1,
            parameter_count: 0,
            data: None,
            terse_data: None,
            metadata: None,
            sql_state: None,
            sql_rc: 0,
        }
    }
}

/// Result-set metadata
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// The server job name
    pub job: String,
    /// Column descriptions, in result order
    pub columns: Vec<Column>,
    /// Number of columns
    pub column_count: u32,
}

/// One column of a result set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared SQL type
    #[serde(rename = "type")]
    pub column_type: String,
    /// Column label
    pub label: String,
    /// Display size
    pub display_size: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorScan {
    id: String,
    error: String,
    sql_state: String,
    sql_rc: i32,
}

/// Pre-scan a raw reply for the server failure shape.
///
/// The scan is permissive: a reply that does not even parse is left for the
/// structured decode to reject.
pub(crate) fn scan_for_error(raw: &str) -> Result<()> {
    let scan = serde_json::from_str::<ErrorScan>(raw).unwrap_or_default();
    if scan.error.is_empty() && scan.sql_state.is_empty() {
        return Ok(());
    }
    Err(Error::Server {
        id: scan.id,
        sql_rc: scan.sql_rc,
        sql_state: scan.sql_state,
        message: scan.error,
    })
}

/// Decode a raw reply, applying the terse relabel when `terse` is set
pub(crate) fn decode_response(raw: &str, terse: bool) -> Result<ServerResponse> {
    scan_for_error(raw)?;

    let response = if terse {
        serde_json::from_str(&raw.replacen(TERSE_FROM, TERSE_TO, 1))?
    } else {
        serde_json::from_str(raw)?
    };
    Ok(response)
}
