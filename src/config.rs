//! Connection configuration
//!
//! A [`Config`] describes how to reach one SQL job server: host, port,
//! credentials, certificate handling, and the optional server-side connection
//! technique and JDBC-style property string. It is immutable once built and
//! is passed by value into [`Session::connect`](crate::Session::connect).

use std::env;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, Result};
use crate::transport::Scheme;

/// Default server port
pub const DEFAULT_PORT: u16 = 8076;

// Environment variables understood by Config::from_env
const ENV_HOST: &str = "SQLJOB_HOST";
const ENV_USER: &str = "SQLJOB_USER";
const ENV_PASSWORD: &str = "SQLJOB_PASSWORD";
const ENV_PORT: &str = "SQLJOB_PORT";
const ENV_IGNORE_UNAUTHORIZED: &str = "SQLJOB_IGNORE_UNAUTHORIZED";
const ENV_TECHNIQUE: &str = "SQLJOB_TECHNIQUE";
const ENV_PROPERTIES: &str = "SQLJOB_PROPERTIES";

/// Server-side connection technique
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Technique {
    /// Connect through the CLI interface
    Cli,
    /// Connect through a TCP socket
    Tcp,
}

impl Technique {
    /// Get the wire string for this technique
    pub fn as_str(&self) -> &'static str {
        match self {
            Technique::Cli => "CLI",
            Technique::Tcp => "TCP",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Technique {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "CLI" => Ok(Technique::Cli),
            "TCP" => Ok(Technique::Tcp),
            _ => Err(Error::InvalidTechnique(s.to_string())),
        }
    }
}

/// Connection configuration for a SQL job server.
///
/// # Examples
///
/// ## Basic connection
///
/// ```rust
/// use sqljob::Config;
///
/// let config = Config::new("db.example.com", "user", "password");
/// ```
///
/// ## Self-signed server certificate
///
/// ```rust
/// use sqljob::Config;
///
/// let config = Config::new("db.example.com", "user", "password")
///     .danger_accept_invalid_certs();
/// ```
///
/// ## With connection properties
///
/// ```rust
/// use sqljob::{Config, Technique};
///
/// let config = Config::new("db.example.com", "user", "password")
///     .with_port(8085)
///     .with_technique(Technique::Tcp)
///     .with_properties("naming=sql;date format=iso");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to connect to
    pub host: String,
    /// Username for authentication
    pub user: String,
    /// Password for authentication (stored temporarily)
    password: String,
    /// Port to connect to
    pub port: u16,
    /// Skip server certificate verification
    pub ignore_unauthorized: bool,
    /// Optional connection technique
    pub technique: Option<Technique>,
    /// Semicolon-delimited connection properties
    pub properties: Option<String>,
    /// Websocket scheme (secure by default)
    pub scheme: Scheme,
}

impl Config {
    /// Create a new configuration with the default port and a secure scheme
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            port: DEFAULT_PORT,
            ignore_unauthorized: false,
            technique: None,
            properties: None,
            scheme: Scheme::Wss,
        }
    }

    /// Set the server port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Disable server certificate verification (NOT recommended for production)
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.ignore_unauthorized = true;
        self
    }

    /// Set the connection technique
    pub fn with_technique(mut self, technique: Technique) -> Self {
        self.technique = Some(technique);
        self
    }

    /// Set the semicolon-delimited connection property string
    pub fn with_properties(mut self, properties: impl Into<String>) -> Self {
        self.properties = Some(properties.into());
        self
    }

    /// Set the websocket scheme
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Load a configuration from `SQLJOB_*` environment variables.
    ///
    /// `SQLJOB_HOST`, `SQLJOB_USER` and `SQLJOB_PASSWORD` are required;
    /// `SQLJOB_PORT`, `SQLJOB_IGNORE_UNAUTHORIZED`, `SQLJOB_TECHNIQUE` and
    /// `SQLJOB_PROPERTIES` are optional.
    pub fn from_env() -> Result<Self> {
        let host = env::var(ENV_HOST).map_err(|_| Error::MissingEnv(ENV_HOST))?;
        let user = env::var(ENV_USER).map_err(|_| Error::MissingEnv(ENV_USER))?;
        let password = env::var(ENV_PASSWORD).map_err(|_| Error::MissingEnv(ENV_PASSWORD))?;

        let mut config = Config::new(host, user, password);

        if let Ok(port) = env::var(ENV_PORT) {
            config.port = port.parse().map_err(|_| Error::InvalidEnv {
                var: ENV_PORT,
                value: port,
            })?;
        }
        if let Ok(flag) = env::var(ENV_IGNORE_UNAUTHORIZED) {
            config.ignore_unauthorized = parse_bool(&flag);
        }
        if let Ok(technique) = env::var(ENV_TECHNIQUE) {
            config.technique = Some(technique.parse()?);
        }
        if let Ok(properties) = env::var(ENV_PROPERTIES) {
            config.properties = Some(properties);
        }

        Ok(config)
    }

    /// Password accessor (kept off the public surface)
    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// The websocket URL this configuration dials
    pub(crate) fn url(&self) -> String {
        format!("{}://{}:{}/db/", self.scheme.as_str(), self.host, self.port)
    }

    /// The Basic authorization header value for these credentials
    pub(crate) fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.user, self.password);
        format!("Basic {}", STANDARD.encode(credentials))
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new("localhost", "scott", "tiger");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.scheme, Scheme::Wss);
        assert!(!config.ignore_unauthorized);
        assert!(config.technique.is_none());
        assert!(config.properties.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new("localhost", "scott", "tiger")
            .with_port(9000)
            .danger_accept_invalid_certs()
            .with_technique(Technique::Cli)
            .with_properties("naming=sql");
        assert_eq!(config.port, 9000);
        assert!(config.ignore_unauthorized);
        assert_eq!(config.technique, Some(Technique::Cli));
        assert_eq!(config.properties.as_deref(), Some("naming=sql"));
    }

    #[test]
    fn test_url_formatting() {
        let config = Config::new("db.example.com", "u", "p").with_port(8081);
        assert_eq!(config.url(), "wss://db.example.com:8081/db/");

        let config = config.with_scheme(Scheme::Ws);
        assert_eq!(config.url(), "ws://db.example.com:8081/db/");
    }

    #[test]
    fn test_basic_auth_header() {
        let config = Config::new("h", "user", "password");
        // base64("user:password")
        assert_eq!(config.basic_auth(), "Basic dXNlcjpwYXNzd29yZA==");
    }

    #[test]
    fn test_technique_from_str() {
        assert_eq!("CLI".parse::<Technique>().unwrap(), Technique::Cli);
        assert_eq!("cli".parse::<Technique>().unwrap(), Technique::Cli);
        assert_eq!("tcp".parse::<Technique>().unwrap(), Technique::Tcp);
        assert!("udp".parse::<Technique>().is_err());
    }

    #[test]
    fn test_from_env() {
        env::set_var(ENV_HOST, "envhost");
        env::set_var(ENV_USER, "envuser");
        env::set_var(ENV_PASSWORD, "envpass");
        env::set_var(ENV_PORT, "8200");
        env::set_var(ENV_IGNORE_UNAUTHORIZED, "true");
        env::set_var(ENV_TECHNIQUE, "tcp");

        let config = Config::from_env().unwrap();
        assert_eq!(config.host, "envhost");
        assert_eq!(config.user, "envuser");
        assert_eq!(config.password(), "envpass");
        assert_eq!(config.port, 8200);
        assert!(config.ignore_unauthorized);
        assert_eq!(config.technique, Some(Technique::Tcp));

        env::set_var(ENV_PORT, "not-a-port");
        assert!(matches!(
            Config::from_env(),
            Err(Error::InvalidEnv { var: ENV_PORT, .. })
        ));

        for var in [
            ENV_HOST,
            ENV_USER,
            ENV_PASSWORD,
            ENV_PORT,
            ENV_IGNORE_UNAUTHORIZED,
            ENV_TECHNIQUE,
        ] {
            env::remove_var(var);
        }
    }
}
