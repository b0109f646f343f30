//! Server-side trace configuration and trace data retrieval
//!
//! The server runs two tracers: its own trace and the JDBC driver trace
//! ("jtopen"). Each is configured with a level and a destination, and a
//! destination of [`TraceDest::File`] makes
//! [`Session::get_trace_data`](crate::Session::get_trace_data) write the
//! collected text next to the process.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Trace verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLevel {
    /// Tracing disabled
    Off,
    /// Everything
    On,
    /// Errors only
    Errors,
    /// Raw datastream
    Datastream,
    /// Inputs plus errors
    InputAndErrors,
}

impl TraceLevel {
    /// Get the wire string for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceLevel::Off => "OFF",
            TraceLevel::On => "ON",
            TraceLevel::Errors => "ERRORS",
            TraceLevel::Datastream => "DATASTREAM",
            TraceLevel::InputAndErrors => "INPUT_AND_ERRORS",
        }
    }
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TraceLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "OFF" => Ok(TraceLevel::Off),
            "ON" => Ok(TraceLevel::On),
            "ERRORS" => Ok(TraceLevel::Errors),
            "DATASTREAM" => Ok(TraceLevel::Datastream),
            "INPUT_AND_ERRORS" => Ok(TraceLevel::InputAndErrors),
            _ => Err(Error::InvalidTraceLevel(s.to_string())),
        }
    }
}

/// Where the server collects trace output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceDest {
    /// Collect into a file on the client side
    File,
    /// Collect in server memory
    InMem,
}

impl TraceDest {
    /// Get the wire string for this destination
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceDest::File => "file",
            TraceDest::InMem => "in_mem",
        }
    }
}

impl fmt::Display for TraceDest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TraceDest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" => Ok(TraceDest::File),
            "in_mem" => Ok(TraceDest::InMem),
            _ => Err(Error::InvalidTraceDest(s.to_string())),
        }
    }
}

/// Trace configuration options.
///
/// At least one tracer must have both its level and destination set before
/// the configuration is accepted; incomplete pairs are ignored when building
/// the wire request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceOptions {
    /// Server trace level
    pub level: Option<TraceLevel>,
    /// Server trace destination
    pub dest: Option<TraceDest>,
    /// JDBC driver trace level
    pub jtopen_level: Option<TraceLevel>,
    /// JDBC driver trace destination
    pub jtopen_dest: Option<TraceDest>,
}

impl TraceOptions {
    /// The server tracer pair, if complete
    pub fn server_pair(&self) -> Option<(TraceLevel, TraceDest)> {
        Some((self.level?, self.dest?))
    }

    /// The JDBC tracer pair, if complete
    pub fn jtopen_pair(&self) -> Option<(TraceLevel, TraceDest)> {
        Some((self.jtopen_level?, self.jtopen_dest?))
    }
}

/// Trace text collected by the server, one field per tracer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TraceData {
    /// Server trace text
    #[serde(rename = "tracedata")]
    pub trace_data: String,
    /// Destination the server trace was configured with
    #[serde(skip)]
    pub dest: Option<TraceDest>,
    /// JDBC driver trace text
    #[serde(rename = "jtopentracedata")]
    pub jtopen_trace_data: String,
    /// Destination the JDBC trace was configured with
    #[serde(skip)]
    pub jtopen_dest: Option<TraceDest>,
}

/// Write trace text to dated files for every tracer configured with a
/// [`TraceDest::File`] destination. Returns the paths written.
pub fn write_trace_files(data: &TraceData) -> Result<Vec<PathBuf>> {
    let date = chrono::Local::now().format("%Y-%m-%d");
    let mut written = Vec::new();

    if data.dest == Some(TraceDest::File) {
        let path = PathBuf::from(format!("trace-{date}.html"));
        fs::write(&path, &data.trace_data)?;
        written.push(path);
    }
    if data.jtopen_dest == Some(TraceDest::File) {
        let path = PathBuf::from(format!("jtopentrace-{date}.txt"));
        fs::write(&path, &data.jtopen_trace_data)?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip() {
        for level in [
            TraceLevel::Off,
            TraceLevel::On,
            TraceLevel::Errors,
            TraceLevel::Datastream,
            TraceLevel::InputAndErrors,
        ] {
            assert_eq!(level.as_str().parse::<TraceLevel>().unwrap(), level);
        }
        assert!("verbose".parse::<TraceLevel>().is_err());
    }

    #[test]
    fn test_dest_from_str() {
        assert_eq!("file".parse::<TraceDest>().unwrap(), TraceDest::File);
        assert_eq!("FILE".parse::<TraceDest>().unwrap(), TraceDest::File);
        assert_eq!("in_mem".parse::<TraceDest>().unwrap(), TraceDest::InMem);
        assert!("syslog".parse::<TraceDest>().is_err());
    }

    #[test]
    fn test_pair_completeness() {
        let options = TraceOptions {
            level: Some(TraceLevel::On),
            ..Default::default()
        };
        assert!(options.server_pair().is_none());

        let options = TraceOptions {
            level: Some(TraceLevel::On),
            dest: Some(TraceDest::InMem),
            ..Default::default()
        };
        assert_eq!(
            options.server_pair(),
            Some((TraceLevel::On, TraceDest::InMem))
        );
        assert!(options.jtopen_pair().is_none());
    }

    #[test]
    fn test_trace_data_decode() {
        let data: TraceData =
            serde_json::from_str(r#"{"tracedata":"abc","jtopentracedata":"def","extra":1}"#)
                .unwrap();
        assert_eq!(data.trace_data, "abc");
        assert_eq!(data.jtopen_trace_data, "def");
        assert!(data.dest.is_none());
    }

    #[test]
    fn test_write_skips_in_mem_destinations() {
        let data = TraceData {
            trace_data: "x".to_string(),
            dest: Some(TraceDest::InMem),
            jtopen_trace_data: String::new(),
            jtopen_dest: None,
        };
        assert!(write_trace_files(&data).unwrap().is_empty());
    }
}
