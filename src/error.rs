use http::{Method, StatusCode};
use thiserror::Error;

/// Configuration errors.
///
/// These are raised while building the engine and are fatal: a pipeline that
/// fails to build must never accept traffic.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("Trusted proxy rule has no CIDR blocks")]
    EmptyProxyRule,

    #[error("Duplicate trusted proxy rule: {0}")]
    DuplicateProxyRule(String),

    #[error("Invalid max hops: {0} (must be at least 1)")]
    InvalidMaxHops(usize),

    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("Duplicate virtual host: {hostname} (port {port})")]
    DuplicateHost { hostname: String, port: String },

    #[error("Invalid route path: {0}")]
    InvalidRoutePath(String),

    #[error("Duplicate route: {method} {path}")]
    DuplicateRoute { path: String, method: String },

    #[error("Invalid controller reference: {0}")]
    InvalidController(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Classifies admission errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionErrorKind {
    BadPeerIp,
    IncorrectHost,
    BadUrlLength,
    BadUrlEncoding,
    EndpointNotFound,
    MethodNotAllowed,
}

/// Per-request admission errors.
///
/// Each variant terminates the pipeline and maps to a single HTTP status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Bad peer IP: {0}")]
    BadPeerIp(String),

    #[error("Incorrect host: {host} (port {port})")]
    IncorrectHost { host: String, port: u16 },

    #[error("URL too long: {len} bytes (limit {limit})")]
    BadUrlLength { len: usize, limit: usize },

    #[error("Bad URL encoding: {0}")]
    BadUrlEncoding(String),

    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },
}

impl AdmissionError {
    pub fn kind(&self) -> AdmissionErrorKind {
        match self {
            AdmissionError::BadPeerIp(_) => AdmissionErrorKind::BadPeerIp,
            AdmissionError::IncorrectHost { .. } => AdmissionErrorKind::IncorrectHost,
            AdmissionError::BadUrlLength { .. } => AdmissionErrorKind::BadUrlLength,
            AdmissionError::BadUrlEncoding(_) => AdmissionErrorKind::BadUrlEncoding,
            AdmissionError::EndpointNotFound(_) => AdmissionErrorKind::EndpointNotFound,
            AdmissionError::MethodNotAllowed { .. } => AdmissionErrorKind::MethodNotAllowed,
        }
    }

    /// HTTP status the transport layer should answer with.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            AdmissionErrorKind::BadPeerIp => StatusCode::BAD_REQUEST,
            AdmissionErrorKind::IncorrectHost => StatusCode::MISDIRECTED_REQUEST,
            AdmissionErrorKind::BadUrlLength => StatusCode::URI_TOO_LONG,
            AdmissionErrorKind::BadUrlEncoding => StatusCode::BAD_REQUEST,
            AdmissionErrorKind::EndpointNotFound => StatusCode::NOT_FOUND,
            AdmissionErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Value for the `Allow` response header, only for `MethodNotAllowed`.
    pub fn allow_header(&self) -> Option<String> {
        match self {
            AdmissionError::MethodNotAllowed { allowed, .. } => Some(
                allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => None,
        }
    }
}
