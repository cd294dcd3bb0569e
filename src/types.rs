use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};

use crate::proxy::TrustedProxyRule;
use crate::vhost::VirtualHost;

/// URL scheme as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Parse a scheme token. Only `http` and `https` are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("http") {
            Some(Scheme::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Some(Scheme::Https)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound request as handed over by the transport layer
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Address of the directly connected peer
    pub peer_ip: String,
    /// Request method
    pub method: Method,
    /// Request target (path with optional query)
    pub path: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Whether the connection to this server is TLS
    pub tls: bool,
    /// Local port the connection was accepted on
    pub local_port: Option<u16>,
}

impl RequestInfo {
    /// Create a new plain-text request with no headers
    pub fn new(peer_ip: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            peer_ip: peer_ip.into(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            tls: false,
            local_port: None,
        }
    }

    /// Append a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = Some(port);
        self
    }

    /// First value of a header as a string.
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub(crate) fn join_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let mut joined: Option<String> = None;
    for value in headers.get_all(name) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        match joined.as_mut() {
            Some(s) => {
                s.push(',');
                s.push_str(value);
            }
            None => joined = Some(value.to_string()),
        }
    }
    joined
}

/// Result of walking the proxy chain for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrust {
    /// Resolved client address
    pub client_ip: IpAddr,
    /// Hostname declared by the nearest trusted hop
    pub hostname: Option<String>,
    /// Port declared by the nearest trusted hop
    pub port: Option<u16>,
    /// Scheme declared by the nearest trusted hop
    pub scheme: Option<Scheme>,
    /// Index of the client in the chain (0 when nothing was promoted)
    pub proxy_hop: usize,
    /// The trusted proxy rule the peer matched
    pub rule: Option<Arc<TrustedProxyRule>>,
}

impl ResolvedTrust {
    /// Trust result for a peer that matched no proxy rule
    pub fn direct(client_ip: IpAddr) -> Self {
        Self {
            client_ip,
            hostname: None,
            port: None,
            scheme: None,
            proxy_hop: 0,
            rule: None,
        }
    }

    /// Whether the peer is one of the configured trusted proxies
    pub fn via_proxy(&self) -> bool {
        self.rule.is_some()
    }
}

/// Captured path parameters, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the last captured parameter
    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Successful admission: everything the controller layer needs
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Fully resolved controller class
    pub controller: String,
    /// Entrypoint to invoke on the controller
    pub entrypoint: String,
    /// Captured path parameters
    pub params: PathParams,
    /// Matched route path (normalized declaration form)
    pub route: String,
    /// Proxy trust resolution for this request
    pub trust: ResolvedTrust,
    /// Matched virtual host
    pub host: Arc<VirtualHost>,
    /// Effective scheme of the request
    pub scheme: Scheme,
    /// `Origin` header, passed through for CORS handling
    pub origin: Option<String>,
}

/// Terminal redirect, not an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub status: StatusCode,
    pub location: String,
}

impl Redirect {
    pub fn permanent(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::PERMANENT_REDIRECT,
            location: location.into(),
        }
    }

    pub fn moved(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::MOVED_PERMANENTLY,
            location: location.into(),
        }
    }
}

/// Non-error pipeline outcome
#[derive(Debug, Clone)]
pub enum Outcome {
    Dispatch(Box<Dispatch>),
    Redirect(Redirect),
}

impl Outcome {
    pub fn dispatch(&self) -> Option<&Dispatch> {
        match self {
            Outcome::Dispatch(d) => Some(d),
            Outcome::Redirect(_) => None,
        }
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Outcome::Redirect(r) => Some(r),
            Outcome::Dispatch(_) => None,
        }
    }
}
