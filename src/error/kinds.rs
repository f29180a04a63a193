use std::{fmt, io};

use super::cluster::ClusterError;

/// Crate-wide `Result` type using [`EsdumpError`] as the error.
pub type Result<T> = std::result::Result<T, EsdumpError>;

/// Top-level error type for esdump operations.
///
/// Every variant except [`EsdumpError::Serialization`] outside strict mode
/// aborts the export run.
#[derive(Debug)]
pub enum EsdumpError {
    /// The cluster answered with an application-level error.
    Cluster(ClusterError),

    /// The response body did not have the expected shape.
    Protocol(String),

    /// HTTP transport failure (connect, timeout, TLS, ...).
    Transport(reqwest::Error),

    /// I/O errors, including sink write failures.
    Io(io::Error),

    /// A record could not be serialized (strict mode only).
    Serialization(SerializationError),

    /// Configuration errors.
    Config(ConfigError),

    /// Query construction errors.
    Query(QueryError),

    /// None of the requested indices exist on the cluster.
    IndexNotFound { indices: String, addresses: String },

    /// Generic error with a free-form message.
    Generic(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// Any other configuration problem.
    Generic(String),
}

/// Query construction errors.
#[derive(Debug)]
pub enum QueryError {
    /// The raw query body is not valid JSON.
    InvalidDsl(String),

    /// The raw query body is valid JSON but not an object.
    NotAnObject,

    /// A scroll keep-alive value could not be parsed.
    InvalidDuration(String),
}

/// A record that could not be turned into a JSON line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationError {
    pub index: Option<String>,
    pub id: Option<String>,
    pub reason: String,
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for EsdumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EsdumpError::Cluster(e) => write!(f, "Cluster error: {e}"),
            EsdumpError::Protocol(msg) => write!(f, "Error parsing the response body: {msg}"),
            EsdumpError::Transport(e) => write!(f, "Error getting response: {e}"),
            EsdumpError::Io(e) => write!(f, "I/O error: {e}"),
            EsdumpError::Serialization(e) => write!(f, "Serialization error: {e}"),
            EsdumpError::Config(e) => write!(f, "Configuration error: {e}"),
            EsdumpError::Query(e) => write!(f, "Query error: {e}"),
            EsdumpError::IndexNotFound { indices, addresses } => write!(
                f,
                "Any of index(es) {{{indices}}} does not exist in {{{addresses}}}"
            ),
            EsdumpError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidDsl(msg) => write!(f, "Invalid query body: {msg}"),
            QueryError::NotAnObject => write!(f, "Query body must be a JSON object"),
            QueryError::InvalidDuration(value) => {
                write!(f, "Invalid keep-alive '{value}' (expected e.g. 30s, 5m, 1h)")
            }
        }
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record {}/{}: {}",
            self.index.as_deref().unwrap_or("?"),
            self.id.as_deref().unwrap_or("?"),
            self.reason
        )
    }
}

impl std::error::Error for EsdumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EsdumpError::Transport(e) => Some(e),
            EsdumpError::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for ConfigError {}
impl std::error::Error for QueryError {}
impl std::error::Error for SerializationError {}

/* ========================= Conversions to EsdumpError ========================= */

impl From<io::Error> for EsdumpError {
    fn from(err: io::Error) -> Self {
        EsdumpError::Io(err)
    }
}

impl From<reqwest::Error> for EsdumpError {
    fn from(err: reqwest::Error) -> Self {
        EsdumpError::Transport(err)
    }
}

impl From<ClusterError> for EsdumpError {
    fn from(err: ClusterError) -> Self {
        EsdumpError::Cluster(err)
    }
}

impl From<ConfigError> for EsdumpError {
    fn from(err: ConfigError) -> Self {
        EsdumpError::Config(err)
    }
}

impl From<QueryError> for EsdumpError {
    fn from(err: QueryError) -> Self {
        EsdumpError::Query(err)
    }
}

impl From<SerializationError> for EsdumpError {
    fn from(err: SerializationError) -> Self {
        EsdumpError::Serialization(err)
    }
}

impl From<String> for EsdumpError {
    fn from(msg: String) -> Self {
        EsdumpError::Generic(msg)
    }
}

impl From<&str> for EsdumpError {
    fn from(msg: &str) -> Self {
        EsdumpError::Generic(msg.to_owned())
    }
}
