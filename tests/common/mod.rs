#![allow(dead_code)] // each test binary uses a different slice of this module

//! In-process mock SQL job server
//!
//! Speaks just enough of the wire protocol to exercise the client end to
//! end: a fixed five-row table, per-cursor offsets, prepared plans, trace
//! config echoes, and a log of every `sqlclose` it receives.

use std::collections::HashMap;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value};
use sqljob::{Config, Scheme};
use tungstenite::handshake::server::{Request, Response};
use tungstenite::Message;

const TABLE: [(i64, &str, &str); 5] = [
    (1, "Lorem ipsum", "121212"),
    (2, "dolor sit amet", "232323"),
    (3, "consetetur sadipscing elitr", "343434"),
    (4, "sed diam nonumy", "454545"),
    (5, "eirmod tempor", "565656"),
];

pub const SERVER_JOB: &str = "038216/pooluser/sqlengine";
pub const SERVER_VERSION: &str = "mock-server 1.4.2";

pub struct MockServer {
    pub port: u16,
    closed_cursors: Arc<Mutex<Vec<String>>>,
}

/// Bind a listener on an ephemeral port and serve every incoming
/// connection on its own thread until the test process exits.
pub fn spawn() -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let port = listener.local_addr().unwrap().port();
    let closed_cursors = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&closed_cursors);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let log = Arc::clone(&log);
            thread::spawn(move || serve(stream, log));
        }
    });

    MockServer {
        port,
        closed_cursors,
    }
}

impl MockServer {
    /// A config pointing at this server (plain ws, no TLS to set up)
    pub fn config(&self) -> Config {
        Config::new("127.0.0.1", "tester", "secret")
            .with_port(self.port)
            .with_scheme(Scheme::Ws)
    }

    /// Continuation IDs of every `sqlclose` received so far
    pub fn closed_cursors(&self) -> Vec<String> {
        self.closed_cursors.lock().unwrap().clone()
    }
}

struct Cursor {
    offset: usize,
    terse: bool,
}

fn serve(stream: TcpStream, closed_log: Arc<Mutex<Vec<String>>>) {
    let callback = |request: &Request, response: Response| {
        let authorized = request
            .headers()
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("Basic "))
            .unwrap_or(false);
        assert!(authorized, "client did not send a basic auth header");
        Ok(response)
    };
    let Ok(mut socket) = tungstenite::accept_hdr(stream, callback) else {
        return;
    };

    let mut cursors: HashMap<String, Cursor> = HashMap::new();
    let mut prepared: HashMap<String, (String, bool)> = HashMap::new();

    loop {
        let message = match socket.read() {
            Ok(message) => message,
            Err(_) => return,
        };
        let Message::Text(text) = message else { continue };
        let request: Value = serde_json::from_str(&text).expect("request frame is json");

        let id = request["id"].as_str().unwrap_or_default().to_string();
        let verb = request["type"].as_str().unwrap_or_default();
        let reply = match verb {
            "connect" => json!({"id": id, "success": true}),
            "getdbjob" => json!({"id": id, "success": true, "job": SERVER_JOB}),
            "getversion" => json!({"id": id, "success": true, "version": SERVER_VERSION}),
            "setconfig" => json!({
                "id": id,
                "success": true,
                "tracelevel": request["tracelevel"],
                "tracedest": request["tracedest"],
            }),
            "gettracedata" => json!({
                "id": id,
                "success": true,
                "tracedata": "trace line one\ntrace line two",
                "jtopentracedata": "",
            }),
            "cl" => json!({"id": id, "success": true, "is_done": true, "has_results": false}),
            "sql" | "prepare_sql_execute" => {
                let sql = request["sql"].as_str().unwrap_or_default().to_string();
                let rows = request["rows"].as_str().unwrap_or_default();
                let terse = request["terse"].as_bool().unwrap_or(false);
                run_sql(&id, &sql, rows, terse, &mut cursors)
            }
            "prepare_sql" => {
                let sql = request["sql"].as_str().unwrap_or_default().to_string();
                let terse = request["terse"].as_bool().unwrap_or(false);
                let parameter_count = sql.matches('?').count();
                prepared.insert(id.clone(), (sql, terse));
                json!({
                    "id": id,
                    "success": true,
                    "has_results": false,
                    "is_done": false,
                    "parameter_count": parameter_count,
                })
            }
            "execute" => {
                let cont_id = request["cont_id"].as_str().unwrap_or_default();
                match prepared.get(cont_id).cloned() {
                    Some((sql, terse)) => run_sql(&id, &sql, "", terse, &mut cursors),
                    None => error_reply(&id, -501, "24501", "prepared statement not found"),
                }
            }
            "sqlmore" => {
                let cont_id = request["cont_id"].as_str().unwrap_or_default();
                let requested = request["rows"]
                    .as_str()
                    .and_then(|rows| rows.parse::<usize>().ok());
                fetch_more(&id, cont_id, requested, &mut cursors)
            }
            "sqlclose" => {
                let cont_id = request["cont_id"].as_str().unwrap_or_default();
                closed_log.lock().unwrap().push(cont_id.to_string());
                cursors.remove(cont_id);
                json!({"id": id, "success": true})
            }
            "exit" => return,
            _ => error_reply(&id, -1, "XXXXX", &format!("unknown verb: {verb}")),
        };

        if socket.send(Message::Text(reply.to_string())).is_err() {
            return;
        }
    }
}

fn run_sql(id: &str, sql: &str, rows: &str, terse: bool, cursors: &mut HashMap<String, Cursor>) -> Value {
    let upper = sql.trim().to_uppercase();

    if upper.contains("BADTABLE") {
        return error_reply(
            id,
            -204,
            "42704",
            "[SQL0204] BADTABLE in TESTER type *FILE not found.",
        );
    }

    if upper.starts_with("SELECT") {
        // an absent row count means "fetch everything and close"
        let (served, is_done) = match rows.parse::<usize>() {
            Ok(requested) => (requested.min(TABLE.len()), requested > TABLE.len()),
            Err(_) => (TABLE.len(), true),
        };
        cursors.insert(
            id.to_string(),
            Cursor {
                offset: served,
                terse,
            },
        );
        return result_reply(id, 0..served, terse, is_done);
    }

    let update_count = if upper.starts_with("UPDATE") {
        1
    } else if upper.starts_with("INSERT") {
        TABLE.len() as i64
    } else {
        0
    };
    json!({
        "id": id,
        "success": true,
        "has_results": false,
        "is_done": true,
        "update_count": update_count,
    })
}

fn fetch_more(
    id: &str,
    cont_id: &str,
    requested: Option<usize>,
    cursors: &mut HashMap<String, Cursor>,
) -> Value {
    let Some(cursor) = cursors.get_mut(cont_id) else {
        return error_reply(id, -501, "24501", "cursor not open");
    };

    let remaining = TABLE.len() - cursor.offset;
    let requested = requested.unwrap_or(remaining);
    let served = requested.min(remaining);
    let range = cursor.offset..cursor.offset + served;
    cursor.offset += served;
    let terse = cursor.terse;

    result_reply(id, range, terse, requested > served || remaining == 0)
}

fn result_reply(id: &str, range: std::ops::Range<usize>, terse: bool, is_done: bool) -> Value {
    let rows: Vec<Value> = TABLE[range]
        .iter()
        .map(|(id, description, serial)| {
            if terse {
                json!([id, description, serial])
            } else {
                json!({"ID": id, "DESCRIPTION": description, "SERIALNO": serial})
            }
        })
        .collect();

    json!({
        "id": id,
        "success": true,
        // an exhausted cursor reports no results; the client forces the flag
        "has_results": !rows.is_empty(),
        "is_done": is_done,
        "update_count": -1,
        "data": rows,
        "metadata": {
            "job": SERVER_JOB,
            "column_count": 3,
            "columns": [
                {"name": "ID", "type": "CHAR", "label": "ID", "display_size": 8},
                {"name": "DESCRIPTION", "type": "VARCHAR", "label": "DESCRIPTION", "display_size": 60},
                {"name": "SERIALNO", "type": "CHAR", "label": "SERIALNO", "display_size": 12},
            ],
        },
    })
}

fn error_reply(id: &str, sql_rc: i32, sql_state: &str, message: &str) -> Value {
    json!({
        "id": id,
        "success": false,
        "error": message,
        "sql_state": sql_state,
        "sql_rc": sql_rc,
    })
}
