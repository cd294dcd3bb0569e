//! Admission Engine - HTTP request admission and routing for Rust
//!
//! This library decides, for every inbound request, who the client really is,
//! which virtual host it addressed and which controller should serve it:
//! - Trusted proxy resolution (`X-Forwarded-*` and RFC 7239 `Forwarded`)
//! - Virtual host matching (exact, wildcard, `www.` alias, TLS redirect)
//! - Declarative route trees compiled into an immutable route table
//! - Path matching with typed parameters and catch-all segments
//! - Controller binding with per-method dispatch and namespace wildcards
//!
//! # Example
//!
//! ```rust
//! use admission_engine::{AdmissionConfig, HostConfig, Method, Pipeline, RequestInfo, RouteTable,
//!     TrustedProxyConfig};
//!
//! let config = AdmissionConfig::new()
//!     .with_host(HostConfig::new("example.com"))
//!     .with_trusted_proxy(TrustedProxyConfig::new(["10.0.0.0/8"]));
//!
//! let routes = RouteTable::build(|r| {
//!     r.get("/", r"Home\Index");
//!     r.group("/users", |r| {
//!         r.get("/:id", r"Users\Item");
//!     });
//! })
//! .unwrap();
//!
//! let pipeline = Pipeline::new(&config, routes).unwrap();
//!
//! let req = RequestInfo::new("10.0.0.1", Method::GET, "/users/42")
//!     .with_header("Host", "example.com")
//!     .with_header("X-Forwarded-For", "198.51.100.4");
//! let outcome = pipeline.admit(&req).unwrap();
//! let dispatch = outcome.dispatch().unwrap();
//! assert_eq!(dispatch.controller, r"Users\Item");
//! assert_eq!(dispatch.params.get("id"), Some("42"));
//! assert_eq!(dispatch.trust.client_ip.to_string(), "198.51.100.4");
//! ```
//!
//! # Route Syntax
//!
//! | Segment | Example | Description |
//! |---------|---------|-------------|
//! | Literal | `users` | Case-insensitive literal |
//! | Parameter | `:id` | One path segment, captured by name |
//! | Catch-all | `*` | Rest of the path, last segment only |
//!
//! # Controller Syntax
//!
//! - `Users\Item` - class, entrypoint is the lower-cased method
//! - `Users\Item::show` - class with a fixed entrypoint
//! - `Docs\Controllers\*` - class taken from the last captured segment

pub mod compile;
pub mod config;
pub mod error;
pub mod matcher;
pub mod parser;
pub mod pipeline;
pub mod proxy;
pub mod route;
pub mod types;
pub mod vhost;

// Re-export commonly used items
pub use compile::{compile, CompiledRoute, ControllerBinding, RouteMatch, RouteTable};
pub use config::{AdmissionConfig, HostConfig, TrustedProxyConfig};
pub use error::{AdmissionError, AdmissionErrorKind, ConfigError, Result};
pub use http::{Method, StatusCode};
pub use matcher::{CidrStore, HostMatchMode, HostPattern};
pub use pipeline::Pipeline;
pub use proxy::{parse_peer_ip, ProxyResolver, TrustedProxyRule, DEFAULT_MAX_HOPS};
pub use route::{
    ControllerRef, MethodSet, RouteBuilder, RouteEntry, RouteGroup, RouteNode,
    DEFAULT_MAX_URL_LENGTH,
};
pub use types::{
    Dispatch, Outcome, PathParams, Redirect, RequestInfo, ResolvedTrust, Scheme,
};
pub use vhost::{ForwardingMode, HostMatch, HostTable, ResolvedHost, VirtualHost};
