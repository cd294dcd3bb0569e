//! Proxy chain resolution.
//!
//! Turns attacker-controllable forwarding headers into a client identity,
//! walking outward from this server through consecutive trusted proxies and
//! stopping at the first address the operator does not trust.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use http::HeaderMap;
use tracing::{debug, warn};

use crate::error::{AdmissionError, ConfigError, Result};
use crate::matcher::CidrStore;
use crate::parser::{parse_forwarded, parse_port, parse_xff_addr, split_host_port, split_list};
use crate::types::{join_header, ResolvedTrust, Scheme};

/// Default number of chain elements inspected per request
pub const DEFAULT_MAX_HOPS: usize = 10;

pub const FORWARDED: &str = "forwarded";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_PORT: &str = "x-forwarded-port";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// A reverse proxy (or group of proxies) this server trusts
#[derive(Clone)]
pub struct TrustedProxyRule {
    store: CidrStore,
    use_forwarded_header: bool,
    max_hops: usize,
    checksum: blake3::Hash,
}

impl TrustedProxyRule {
    /// Create a rule from CIDR strings.
    pub fn new<S: AsRef<str>>(cidrs: &[S], use_forwarded_header: bool, max_hops: usize) -> Result<Self> {
        if cidrs.is_empty() {
            return Err(ConfigError::EmptyProxyRule);
        }
        if max_hops == 0 {
            return Err(ConfigError::InvalidMaxHops(max_hops));
        }
        let store = CidrStore::parse(cidrs)?;
        let checksum = checksum(&store);
        Ok(Self {
            store,
            use_forwarded_header,
            max_hops,
            checksum,
        })
    }

    /// Check if an address belongs to this rule's ranges
    pub fn matches(&self, ip: IpAddr) -> bool {
        self.store.matches(ip)
    }

    pub fn store(&self) -> &CidrStore {
        &self.store
    }

    pub fn use_forwarded_header(&self) -> bool {
        self.use_forwarded_header
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Hex checksum of the rule's CIDR set; the rule's identity
    pub fn checksum(&self) -> String {
        self.checksum.to_hex().to_string()
    }
}

impl PartialEq for TrustedProxyRule {
    fn eq(&self, other: &Self) -> bool {
        self.checksum == other.checksum
    }
}

impl Eq for TrustedProxyRule {}

impl fmt::Debug for TrustedProxyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedProxyRule")
            .field("networks", &self.store.networks())
            .field("use_forwarded_header", &self.use_forwarded_header)
            .field("max_hops", &self.max_hops)
            .field("checksum", &self.checksum())
            .finish()
    }
}

/// Checksum over the sorted, de-duplicated CIDR set so that declaration order
/// and repeats do not change a rule's identity.
fn checksum(store: &CidrStore) -> blake3::Hash {
    let mut canonical: Vec<String> = store.networks().iter().map(|n| n.to_string()).collect();
    canonical.sort();
    canonical.dedup();

    let mut hasher = blake3::Hasher::new();
    for cidr in &canonical {
        hasher.update(cidr.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize()
}

/// Parse the directly connected peer address.
///
/// Accepts a bare address or a socket address (the port is ignored).
pub fn parse_peer_ip(peer: &str) -> std::result::Result<IpAddr, AdmissionError> {
    let peer = peer.trim();
    if let Ok(ip) = peer.parse::<IpAddr>() {
        return Ok(ip.to_canonical());
    }
    peer.parse::<SocketAddr>()
        .map(|addr| addr.ip().to_canonical())
        .map_err(|_| AdmissionError::BadPeerIp(peer.to_string()))
}

/// One hop of a forwarding chain, nearest hop first
#[derive(Debug, Default)]
struct Hop {
    addr: Option<IpAddr>,
    host: Option<String>,
    port: Option<String>,
    proto: Option<String>,
}

/// Resolves client identity through the configured trusted proxies
#[derive(Debug, Clone, Default)]
pub struct ProxyResolver {
    rules: Vec<Arc<TrustedProxyRule>>,
}

impl ProxyResolver {
    /// Create a resolver. Rules with the same CIDR set are rejected.
    pub fn new(rules: Vec<TrustedProxyRule>) -> Result<Self> {
        let mut accepted: Vec<Arc<TrustedProxyRule>> = Vec::with_capacity(rules.len());
        for rule in rules {
            if accepted.iter().any(|r| **r == rule) {
                return Err(ConfigError::DuplicateProxyRule(rule.checksum()));
            }
            if rule.store().trusts_everything() {
                warn!(
                    checksum = %rule.checksum(),
                    "trusted proxy rule contains a zero-length prefix and trusts every peer"
                );
            }
            accepted.push(Arc::new(rule));
        }
        Ok(Self { rules: accepted })
    }

    pub fn rules(&self) -> &[Arc<TrustedProxyRule>] {
        &self.rules
    }

    /// First rule (declaration order) whose ranges contain the peer
    pub fn rule_for(&self, peer: IpAddr) -> Option<&Arc<TrustedProxyRule>> {
        self.rules.iter().find(|rule| rule.matches(peer))
    }

    /// Resolve the client for a request arriving from `peer`.
    ///
    /// Header data is only consulted when the peer is a trusted proxy, and
    /// hostname/port/scheme are only promoted when the client sits behind at
    /// least one trusted hop (`proxy_hop > 0`).
    pub fn resolve(&self, peer: IpAddr, headers: &HeaderMap) -> ResolvedTrust {
        let peer = peer.to_canonical();
        let Some(rule) = self.rule_for(peer) else {
            return ResolvedTrust::direct(peer);
        };

        let hops = collect_hops(rule, headers);
        let fallback = ResolvedTrust {
            rule: Some(rule.clone()),
            ..ResolvedTrust::direct(peer)
        };

        for (index, hop) in hops.iter().enumerate().take(rule.max_hops()) {
            let Some(addr) = hop.addr else {
                continue;
            };
            if rule.matches(addr) {
                continue;
            }

            if index == 0 {
                // Only the address is trusted at the first boundary.
                debug!(client_ip = %addr, "client directly behind trusted proxy");
                return ResolvedTrust {
                    client_ip: addr,
                    ..fallback
                };
            }

            let trusted = &hops[index - 1];
            let (hostname, host_port) = match trusted.host.as_deref().and_then(split_host_port) {
                Some((host, port)) => (Some(host), port),
                None => (None, None),
            };
            let port = trusted.port.as_deref().and_then(parse_port).or(host_port);
            let scheme = trusted.proto.as_deref().and_then(Scheme::parse);

            debug!(
                client_ip = %addr,
                proxy_hop = index,
                hostname = hostname.as_deref().unwrap_or(""),
                "client resolved through proxy chain"
            );
            return ResolvedTrust {
                client_ip: addr,
                hostname,
                port,
                scheme,
                proxy_hop: index,
                rule: Some(rule.clone()),
            };
        }

        debug!(peer = %peer, "no untrusted address in proxy chain, using peer");
        fallback
    }
}

/// Build the chain for `rule`, ordered nearest hop first.
fn collect_hops(rule: &TrustedProxyRule, headers: &HeaderMap) -> Vec<Hop> {
    if rule.use_forwarded_header() {
        if let Some(forwarded) = join_header(headers, FORWARDED) {
            // Proxies append on the right; the last element is the nearest hop.
            return parse_forwarded(&forwarded)
                .into_iter()
                .rev()
                .map(|element| Hop {
                    addr: element.for_addr,
                    host: element.host,
                    port: None,
                    proto: element.proto,
                })
                .collect();
        }
    }

    let Some(xff) = join_header(headers, X_FORWARDED_FOR) else {
        return Vec::new();
    };
    let hosts = reversed_list(headers, X_FORWARDED_HOST);
    let ports = reversed_list(headers, X_FORWARDED_PORT);
    let protos = reversed_list(headers, X_FORWARDED_PROTO);

    split_list(&xff)
        .into_iter()
        .rev()
        .enumerate()
        .map(|(i, token)| Hop {
            addr: parse_xff_addr(token),
            host: hosts.get(i).cloned(),
            port: ports.get(i).cloned(),
            proto: protos.get(i).cloned(),
        })
        .collect()
}

/// Sibling `X-Forwarded-*` list, rightmost entry first
fn reversed_list(headers: &HeaderMap, name: &str) -> Vec<String> {
    join_header(headers, name)
        .map(|value| split_list(&value).into_iter().rev().map(str::to_string).collect())
        .unwrap_or_default()
}
