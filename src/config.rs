//! Static admission configuration.
//!
//! Loaded once at startup (JSON) or built fluently, then validated by
//! [`Pipeline::new`](crate::pipeline::Pipeline::new).

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::proxy::{ProxyResolver, TrustedProxyRule, DEFAULT_MAX_HOPS};
use crate::route::DEFAULT_MAX_URL_LENGTH;
use crate::vhost::{ForwardingMode, HostTable, VirtualHost};

/// One virtual host entry
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HostConfig {
    /// Hostname, `*.` prefix for wildcard hosts
    pub hostname: String,
    /// Port to match; any port when absent
    #[serde(default)]
    pub port: Option<u16>,
    /// Require TLS for this host
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub forwarding: ForwardingMode,
}

impl HostConfig {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port: None,
            secure: false,
            forwarding: ForwardingMode::Any,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_forwarding(mut self, forwarding: ForwardingMode) -> Self {
        self.forwarding = forwarding;
        self
    }

    fn build(&self) -> Result<VirtualHost> {
        let mut host = VirtualHost::new(&self.hostname)?
            .with_secure(self.secure)
            .with_forwarding(self.forwarding);
        if let Some(port) = self.port {
            if port == 0 {
                return Err(ConfigError::InvalidHostname(format!(
                    "{}: port 0",
                    self.hostname
                )));
            }
            host = host.with_port(port);
        }
        Ok(host)
    }
}

/// One trusted proxy entry
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TrustedProxyConfig {
    pub cidrs: Vec<String>,
    /// Read the standard `Forwarded` header instead of `X-Forwarded-*`
    #[serde(default)]
    pub use_forwarded_header: bool,
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
}

impl TrustedProxyConfig {
    pub fn new<S: Into<String>>(cidrs: impl IntoIterator<Item = S>) -> Self {
        Self {
            cidrs: cidrs.into_iter().map(Into::into).collect(),
            use_forwarded_header: false,
            max_hops: DEFAULT_MAX_HOPS,
        }
    }

    pub fn with_forwarded_header(mut self, enabled: bool) -> Self {
        self.use_forwarded_header = enabled;
        self
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    fn build(&self) -> Result<TrustedProxyRule> {
        TrustedProxyRule::new(self.cidrs.as_slice(), self.use_forwarded_header, self.max_hops)
    }
}

fn default_max_hops() -> usize {
    DEFAULT_MAX_HOPS
}

fn default_max_url_length() -> usize {
    DEFAULT_MAX_URL_LENGTH
}

/// Complete admission configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AdmissionConfig {
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    #[serde(default)]
    pub trusted_proxies: Vec<TrustedProxyConfig>,
    /// Treat `www.<host>` as `<host>`
    #[serde(default)]
    pub www_alias: bool,
    /// Redirect aliased `www.` requests (301) to the bare host
    #[serde(default)]
    pub www_redirect: bool,
    /// Redirect plain-text requests to HTTPS (308)
    #[serde(default)]
    pub enforce_tls: bool,
    /// Request-target limit in bytes
    #[serde(default = "default_max_url_length")]
    pub max_url_length: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            trusted_proxies: Vec::new(),
            www_alias: false,
            www_redirect: false,
            enforce_tls: false,
            max_url_length: DEFAULT_MAX_URL_LENGTH,
        }
    }
}

impl AdmissionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn with_host(mut self, host: HostConfig) -> Self {
        self.hosts.push(host);
        self
    }

    pub fn with_trusted_proxy(mut self, proxy: TrustedProxyConfig) -> Self {
        self.trusted_proxies.push(proxy);
        self
    }

    pub fn with_www_alias(mut self, enabled: bool) -> Self {
        self.www_alias = enabled;
        self
    }

    pub fn with_www_redirect(mut self, enabled: bool) -> Self {
        self.www_redirect = enabled;
        self
    }

    pub fn with_enforce_tls(mut self, enabled: bool) -> Self {
        self.enforce_tls = enabled;
        self
    }

    pub fn with_max_url_length(mut self, limit: usize) -> Self {
        self.max_url_length = limit;
        self
    }

    /// Validate and build the virtual host table.
    pub fn build_hosts(&self) -> Result<HostTable> {
        let hosts = self
            .hosts
            .iter()
            .map(HostConfig::build)
            .collect::<Result<Vec<_>>>()?;
        Ok(HostTable::new(hosts)?
            .with_www_alias(self.www_alias)
            .with_www_redirect(self.www_redirect)
            .with_enforce_tls(self.enforce_tls))
    }

    /// Validate and build the proxy resolver.
    pub fn build_resolver(&self) -> Result<ProxyResolver> {
        let rules = self
            .trusted_proxies
            .iter()
            .map(TrustedProxyConfig::build)
            .collect::<Result<Vec<_>>>()?;
        ProxyResolver::new(rules)
    }
}
