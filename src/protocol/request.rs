//! Request envelope construction
//!
//! Envelopes are `{"id": <string>, "type": <verb>, ...verb fields}` and are
//! built through a tagged serde enum so SQL text, CL commands and property
//! strings are always escaped correctly.

use serde::Serialize;
use serde_json::Value;

use crate::config::Technique;
use crate::error::Result;
use crate::trace::TraceOptions;

/// Fixed wire ID used by the `exit` verb
const EXIT_ID: &str = "bye";
/// Fixed wire ID used by the `getversion` verb
const VERSION_ID: &str = "versionCheck";

/// One encoded request frame.
///
/// The `terse` flag travels with the request (it never lives on the session)
/// and tells the reply decoder whether to apply the terse relabeling.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) id: String,
    pub(crate) frame: String,
    pub(crate) terse: bool,
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: &'a str,
    #[serde(flatten)]
    body: Body<'a>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Body<'a> {
    Connect {
        #[serde(skip_serializing_if = "Option::is_none")]
        technique: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        props: Option<&'a str>,
    },
    Getdbjob,
    Sql {
        sql: &'a str,
        rows: &'a str,
        terse: bool,
    },
    PrepareSql {
        sql: &'a str,
        rows: &'a str,
        terse: bool,
    },
    PrepareSqlExecute {
        sql: &'a str,
        parameters: &'a Value,
        rows: &'a str,
        terse: bool,
    },
    Execute {
        cont_id: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        parameters: Option<&'a Value>,
    },
    Sqlmore {
        cont_id: &'a str,
        rows: &'a str,
    },
    Sqlclose {
        cont_id: &'a str,
    },
    Cl {
        cmd: &'a str,
        terse: bool,
    },
    Setconfig {
        #[serde(skip_serializing_if = "Option::is_none")]
        tracelevel: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tracedest: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        jtopentracelevel: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        jtopentracedest: Option<&'a str>,
    },
    Gettracedata,
    Getversion,
    Exit,
}

impl Request {
    fn encode(id: &str, body: Body<'_>, terse: bool) -> Result<Request> {
        let frame = serde_json::to_string(&Envelope { id, body })?;
        Ok(Request {
            id: id.to_string(),
            frame,
            terse,
        })
    }

    /// The correlation ID this request was built with
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The encoded JSON frame
    pub fn frame(&self) -> &str {
        &self.frame
    }

    pub(crate) fn connect(
        id: &str,
        technique: Option<Technique>,
        props: Option<&str>,
    ) -> Result<Request> {
        Self::encode(
            id,
            Body::Connect {
                technique: technique.map(|t| t.as_str()),
                props,
            },
            false,
        )
    }

    pub(crate) fn get_db_job(id: &str) -> Result<Request> {
        Self::encode(id, Body::Getdbjob, false)
    }

    pub(crate) fn sql(id: &str, sql: &str, rows: &str, terse: bool) -> Result<Request> {
        Self::encode(id, Body::Sql { sql, rows, terse }, terse)
    }

    pub(crate) fn prepare_sql(id: &str, sql: &str, rows: &str, terse: bool) -> Result<Request> {
        Self::encode(id, Body::PrepareSql { sql, rows, terse }, terse)
    }

    pub(crate) fn prepare_sql_execute(
        id: &str,
        sql: &str,
        parameters: &Value,
        rows: &str,
        terse: bool,
    ) -> Result<Request> {
        Self::encode(
            id,
            Body::PrepareSqlExecute {
                sql,
                parameters,
                rows,
                terse,
            },
            terse,
        )
    }

    pub(crate) fn execute(
        id: &str,
        cont_id: &str,
        parameters: Option<&Value>,
        terse: bool,
    ) -> Result<Request> {
        Self::encode(id, Body::Execute { cont_id, parameters }, terse)
    }

    pub(crate) fn fetch_more(id: &str, cont_id: &str, rows: &str, terse: bool) -> Result<Request> {
        Self::encode(id, Body::Sqlmore { cont_id, rows }, terse)
    }

    pub(crate) fn sql_close(id: &str, cont_id: &str) -> Result<Request> {
        Self::encode(id, Body::Sqlclose { cont_id }, false)
    }

    pub(crate) fn cl(id: &str, cmd: &str, terse: bool) -> Result<Request> {
        Self::encode(id, Body::Cl { cmd, terse }, terse)
    }

    pub(crate) fn set_config(id: &str, options: &TraceOptions) -> Result<Request> {
        let server = options.server_pair();
        let jtopen = options.jtopen_pair();
        Self::encode(
            id,
            Body::Setconfig {
                tracelevel: server.map(|(level, _)| level.as_str()),
                tracedest: server.map(|(_, dest)| dest.as_str()),
                jtopentracelevel: jtopen.map(|(level, _)| level.as_str()),
                jtopentracedest: jtopen.map(|(_, dest)| dest.as_str()),
            },
            false,
        )
    }

    pub(crate) fn get_trace_data(id: &str) -> Result<Request> {
        Self::encode(id, Body::Gettracedata, false)
    }

    pub(crate) fn get_version() -> Result<Request> {
        Self::encode(VERSION_ID, Body::Getversion, false)
    }

    pub(crate) fn exit() -> Result<Request> {
        Self::encode(EXIT_ID, Body::Exit, false)
    }
}

/// Encode a parameter matrix for the wire.
///
/// Exactly one parameter row serializes as a flat array of values; zero or
/// several rows serialize as an array of arrays. The asymmetry is part of
/// the wire contract.
pub(crate) fn encode_parameters(rows: &[Vec<Value>]) -> Value {
    if rows.len() == 1 {
        Value::Array(rows[0].clone())
    } else {
        Value::Array(rows.iter().map(|row| Value::Array(row.clone())).collect())
    }
}
