use std::net::IpAddr;

use crate::error::{ConfigError, Result};

/// Host matching mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostMatchMode {
    /// Exact match: "example.com" matches only "example.com"
    Exact,
    /// Wildcard match: "*.example.com" matches "foo.example.com" (one label)
    Wildcard,
}

/// Hostname pattern for a virtual host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPattern {
    name: String,
    mode: HostMatchMode,
    is_ip: bool,
}

impl HostPattern {
    /// Parse a configured hostname.
    ///
    /// A leading `*.` marks a wildcard host. The stored name is lower-cased
    /// with any trailing dot stripped.
    pub fn parse(pattern: &str) -> Result<Self> {
        let lowered = normalize_hostname(pattern);

        let (name, mode) = match lowered.strip_prefix("*.") {
            Some(base) => (base.to_string(), HostMatchMode::Wildcard),
            None => (lowered, HostMatchMode::Exact),
        };

        let is_ip = parse_ip_host(&name).is_some();
        let invalid = || ConfigError::InvalidHostname(pattern.to_string());

        if name.is_empty() || name.contains('*') {
            return Err(invalid());
        }
        if mode == HostMatchMode::Wildcard && (is_ip || !name.contains('.')) {
            return Err(invalid());
        }
        if !is_ip && !is_valid_dns_name(&name) {
            return Err(invalid());
        }

        Ok(Self { name, mode, is_ip })
    }

    /// Check a normalized hostname against this pattern
    pub fn matches(&self, host: &str) -> bool {
        if host.is_empty() {
            return false;
        }
        match self.mode {
            HostMatchMode::Exact => host == self.name,
            HostMatchMode::Wildcard => match host.split_once('.') {
                Some((label, rest)) => !label.is_empty() && rest == self.name,
                None => false,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> HostMatchMode {
        self.mode
    }

    pub fn is_wildcard(&self) -> bool {
        self.mode == HostMatchMode::Wildcard
    }

    pub fn is_ip_address(&self) -> bool {
        self.is_ip
    }
}

/// Lower-case and strip a single trailing dot
pub fn normalize_hostname(host: &str) -> String {
    let host = host.trim();
    let host = host.strip_suffix('.').unwrap_or(host);
    host.to_ascii_lowercase()
}

/// Parse an IP literal host, accepting the bracketed IPv6 form
pub(crate) fn parse_ip_host(host: &str) -> Option<IpAddr> {
    let inner = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    inner.parse().ok()
}

fn is_valid_dns_name(name: &str) -> bool {
    name.len() <= 253
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
}
