use std::net::IpAddr;

use ipnet::IpNet;

use crate::error::{ConfigError, Result};

/// CIDR trust store - a set of network ranges parsed once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidrStore {
    networks: Vec<IpNet>,
}

impl CidrStore {
    /// Parse a list of CIDR strings.
    ///
    /// A bare address is accepted as a full-length prefix. Networks are
    /// truncated so that host bits never take part in matching.
    pub fn parse<S: AsRef<str>>(cidrs: &[S]) -> Result<Self> {
        let mut networks = Vec::with_capacity(cidrs.len());
        for cidr in cidrs {
            networks.push(parse_cidr(cidr.as_ref())?);
        }
        Ok(Self { networks })
    }

    pub fn from_networks(networks: Vec<IpNet>) -> Self {
        Self {
            networks: networks.into_iter().map(|n| n.trunc()).collect(),
        }
    }

    /// Check if the address falls into any stored range
    pub fn matches(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.networks.iter().any(|net| net.contains(&ip))
    }

    pub fn networks(&self) -> &[IpNet] {
        &self.networks
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Whether any range covers the whole address family
    pub fn trusts_everything(&self) -> bool {
        self.networks.iter().any(|net| net.prefix_len() == 0)
    }
}

fn parse_cidr(cidr: &str) -> Result<IpNet> {
    let cidr = cidr.trim();
    if let Ok(net) = cidr.parse::<IpNet>() {
        return Ok(canonical_net(net).trunc());
    }
    if let Ok(ip) = cidr.parse::<IpAddr>() {
        return Ok(IpNet::from(ip.to_canonical()));
    }
    Err(ConfigError::InvalidCidr(cidr.to_string()))
}

/// Rewrite `::ffff:a.b.c.d/n` ranges (n >= 96) into their IPv4 form so they
/// compare against canonicalised peers.
fn canonical_net(net: IpNet) -> IpNet {
    if let IpNet::V6(v6) = net {
        if let Some(v4) = v6.addr().to_ipv4_mapped() {
            if v6.prefix_len() >= 96 {
                if let Ok(mapped) = IpNet::new(IpAddr::V4(v4), v6.prefix_len() - 96) {
                    return mapped;
                }
            }
        }
    }
    net
}
