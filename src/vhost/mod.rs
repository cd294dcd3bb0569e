//! Virtual host table.
//!
//! An ordered list of hosts this server answers for, matched against the
//! hostname/port a request resolved to after proxy trust resolution.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::{AdmissionError, ConfigError, Result};
use crate::matcher::{HostPattern, HostMatchMode};
use crate::parser::split_host_port;
use crate::types::{Redirect, RequestInfo, ResolvedTrust, Scheme};

/// Which transports a virtual host is reachable through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardingMode {
    /// Direct clients and trusted proxies alike
    #[default]
    Any,
    /// Only peers that matched no trusted proxy rule
    DirectOnly,
    /// Only peers that matched a trusted proxy rule
    ProxyOnly,
}

impl ForwardingMode {
    fn allows(&self, via_proxy: bool) -> bool {
        match self {
            ForwardingMode::Any => true,
            ForwardingMode::DirectOnly => !via_proxy,
            ForwardingMode::ProxyOnly => via_proxy,
        }
    }
}

/// A configured (hostname, port) this server answers for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualHost {
    pattern: HostPattern,
    port: Option<u16>,
    secure: bool,
    forwarding: ForwardingMode,
}

impl VirtualHost {
    /// Create a host from a hostname (`*.` prefix for wildcard hosts).
    ///
    /// Without a port the host matches any port.
    pub fn new(hostname: &str) -> Result<Self> {
        Ok(Self {
            pattern: HostPattern::parse(hostname)?,
            port: None,
            secure: false,
            forwarding: ForwardingMode::Any,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Require TLS for this host
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_forwarding(mut self, forwarding: ForwardingMode) -> Self {
        self.forwarding = forwarding;
        self
    }

    pub fn hostname(&self) -> &str {
        self.pattern.name()
    }

    pub fn is_wildcard(&self) -> bool {
        self.pattern.is_wildcard()
    }

    pub fn is_ip_address(&self) -> bool {
        self.pattern.is_ip_address()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn forwarding(&self) -> ForwardingMode {
        self.forwarding
    }

    fn key(&self) -> (&str, HostMatchMode, Option<u16>) {
        (self.pattern.name(), self.pattern.mode(), self.port)
    }

    fn matches(&self, hostname: &str, port: u16, via_proxy: bool) -> bool {
        self.port.map_or(true, |p| p == port)
            && self.forwarding.allows(via_proxy)
            && self.pattern.matches(hostname)
    }
}

/// Outcome of host matching
#[derive(Debug, Clone)]
pub enum HostMatch {
    Matched(ResolvedHost),
    Redirect(Redirect),
}

/// The host a request was admitted for
#[derive(Debug, Clone)]
pub struct ResolvedHost {
    pub host: Arc<VirtualHost>,
    /// Hostname as requested (before any `www.` alias stripping)
    pub hostname: String,
    pub port: u16,
    pub scheme: Scheme,
}

/// Ordered virtual host table
#[derive(Debug, Clone, Default)]
pub struct HostTable {
    hosts: Vec<Arc<VirtualHost>>,
    www_alias: bool,
    www_redirect: bool,
    enforce_tls: bool,
}

impl HostTable {
    /// Create a table. Duplicate (hostname, wildcard, port) keys are rejected.
    pub fn new(hosts: Vec<VirtualHost>) -> Result<Self> {
        let mut table: Vec<Arc<VirtualHost>> = Vec::with_capacity(hosts.len());
        for host in hosts {
            if table.iter().any(|h| h.key() == host.key()) {
                let name = match host.pattern.mode() {
                    HostMatchMode::Wildcard => format!("*.{}", host.hostname()),
                    HostMatchMode::Exact => host.hostname().to_string(),
                };
                return Err(ConfigError::DuplicateHost {
                    hostname: name,
                    port: host.port.map_or_else(|| "any".to_string(), |p| p.to_string()),
                });
            }
            table.push(Arc::new(host));
        }
        Ok(Self {
            hosts: table,
            ..Self::default()
        })
    }

    /// Treat `www.<host>` as an alias of `<host>`
    pub fn with_www_alias(mut self, enabled: bool) -> Self {
        self.www_alias = enabled;
        self
    }

    /// Answer aliased `www.` requests with a 301 to the bare host
    pub fn with_www_redirect(mut self, enabled: bool) -> Self {
        self.www_redirect = enabled;
        self
    }

    /// Redirect every plain-text request to HTTPS
    pub fn with_enforce_tls(mut self, enabled: bool) -> Self {
        self.enforce_tls = enabled;
        self
    }

    pub fn hosts(&self) -> &[Arc<VirtualHost>] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// First host (declaration order) matching a normalized hostname and port
    pub fn find(&self, hostname: &str, port: u16, via_proxy: bool) -> Option<&Arc<VirtualHost>> {
        self.hosts
            .iter()
            .find(|host| host.matches(hostname, port, via_proxy))
    }

    /// Match a request, applying the alias and TLS policies.
    pub fn resolve(
        &self,
        req: &RequestInfo,
        trust: &ResolvedTrust,
    ) -> std::result::Result<HostMatch, AdmissionError> {
        let (hostname, port, scheme) = effective_authority(req, trust);
        let Some(hostname) = hostname else {
            return Err(AdmissionError::IncorrectHost {
                host: String::new(),
                port,
            });
        };

        let candidate = match hostname.strip_prefix("www.") {
            Some(bare) if self.www_alias => bare,
            _ => hostname.as_str(),
        };
        let aliased = candidate.len() != hostname.len();

        let Some(host) = self.find(candidate, port, trust.via_proxy()) else {
            debug!(host = %hostname, port, "no virtual host matched");
            return Err(AdmissionError::IncorrectHost {
                host: hostname,
                port,
            });
        };

        if aliased && self.www_redirect {
            let location = build_location(scheme, candidate, port, &req.path);
            return Ok(HostMatch::Redirect(Redirect::moved(location)));
        }

        if (self.enforce_tls || host.is_secure()) && scheme != Scheme::Https {
            let port = if port == Scheme::Http.default_port() {
                Scheme::Https.default_port()
            } else {
                port
            };
            let location = build_location(Scheme::Https, &hostname, port, &req.path);
            debug!(location = %location, "redirecting to TLS");
            return Ok(HostMatch::Redirect(Redirect::permanent(location)));
        }

        Ok(HostMatch::Matched(ResolvedHost {
            host: host.clone(),
            hostname,
            port,
            scheme,
        }))
    }
}

/// Hostname, port and scheme the request is addressed to.
///
/// Values promoted by a trusted proxy win; otherwise the `Host` header and the
/// transport are used.
fn effective_authority(req: &RequestInfo, trust: &ResolvedTrust) -> (Option<String>, u16, Scheme) {
    let transport_scheme = if req.tls { Scheme::Https } else { Scheme::Http };
    let scheme = trust.scheme.unwrap_or(transport_scheme);

    if let Some(hostname) = &trust.hostname {
        let port = trust.port.unwrap_or_else(|| scheme.default_port());
        return (Some(hostname.clone()), port, scheme);
    }

    let (hostname, header_port) = match req.header("host").and_then(split_host_port) {
        Some((host, port)) => (Some(host), port),
        None => (None, None),
    };
    let port = trust
        .port
        .or(header_port)
        .or(req.local_port)
        .unwrap_or_else(|| scheme.default_port());
    (hostname, port, scheme)
}

fn build_location(scheme: Scheme, hostname: &str, port: u16, target: &str) -> String {
    let authority = if port == scheme.default_port() {
        hostname.to_string()
    } else {
        format!("{}:{}", hostname, port)
    };
    let target = if target.starts_with('/') { target } else { "/" };
    format!("{}://{}{}", scheme, authority, target)
}
