//! Request admission pipeline.
//!
//! Sequences peer validation, proxy trust resolution, request-target
//! validation, virtual host matching, path matching and controller binding
//! for one request. Every stage can terminate the request; nothing is retried.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::compile::RouteTable;
use crate::config::AdmissionConfig;
use crate::error::{AdmissionError, Result};
use crate::proxy::{parse_peer_ip, ProxyResolver};
use crate::route::path::validate_target;
use crate::types::{Dispatch, Outcome, RequestInfo, ResolvedTrust};
use crate::vhost::{HostMatch, HostTable};

/// Admission pipeline: immutable after construction and shareable across
/// request-handling threads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    resolver: ProxyResolver,
    hosts: HostTable,
    routes: Arc<RouteTable>,
    max_url_length: usize,
}

impl Pipeline {
    /// Build a pipeline from configuration and a compiled route table.
    ///
    /// All configuration is validated here; a pipeline that fails to build
    /// must not serve traffic.
    pub fn new(config: &AdmissionConfig, routes: impl Into<Arc<RouteTable>>) -> Result<Self> {
        let resolver = config.build_resolver()?;
        let hosts = config.build_hosts()?;
        let routes = routes.into();

        info!(
            hosts = hosts.len(),
            trusted_proxies = resolver.rules().len(),
            routes = routes.route_count(),
            "admission pipeline ready"
        );

        Ok(Self {
            resolver,
            hosts,
            routes,
            max_url_length: config.max_url_length,
        })
    }

    /// Build a pipeline from a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>, routes: impl Into<Arc<RouteTable>>) -> Result<Self> {
        let config = AdmissionConfig::from_file(path)?;
        Self::new(&config, routes)
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn hosts(&self) -> &HostTable {
        &self.hosts
    }

    pub fn resolver(&self) -> &ProxyResolver {
        &self.resolver
    }

    /// Validate the peer and walk the proxy chain.
    pub fn resolve_trust(
        &self,
        req: &RequestInfo,
    ) -> std::result::Result<ResolvedTrust, AdmissionError> {
        let peer = parse_peer_ip(&req.peer_ip)?;
        Ok(self.resolver.resolve(peer, &req.headers))
    }

    /// Run the full pipeline for one request.
    pub fn admit(&self, req: &RequestInfo) -> std::result::Result<Outcome, AdmissionError> {
        let trust = self.resolve_trust(req)?;

        // Redirect locations embed the raw target.
        validate_target(&req.path, self.max_url_length)?;

        let host = match self.hosts.resolve(req, &trust)? {
            HostMatch::Matched(host) => host,
            HostMatch::Redirect(redirect) => {
                debug!(
                    client_ip = %trust.client_ip,
                    status = redirect.status.as_u16(),
                    location = %redirect.location,
                    "request redirected"
                );
                return Ok(Outcome::Redirect(redirect));
            }
        };

        let matched = self.routes.match_path(&req.path)?;
        let binding = self.routes.resolve_binding(matched.route, &req.method)?;
        let (controller, entrypoint) = binding.resolve(&req.method, &matched.params)?;

        debug!(
            client_ip = %trust.client_ip,
            proxy_hop = trust.proxy_hop,
            host = %host.hostname,
            route = %matched.route.path,
            controller = %controller,
            "request admitted"
        );

        Ok(Outcome::Dispatch(Box::new(Dispatch {
            controller,
            entrypoint,
            params: matched.params,
            route: matched.route.path.clone(),
            trust,
            host: host.host,
            scheme: host.scheme,
            origin: req.header("origin").map(str::to_string),
        })))
    }
}
