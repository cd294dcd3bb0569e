use std::collections::HashMap;

use http::Method;
use regex::Regex;
use tracing::info;

use crate::error::{AdmissionError, ConfigError, Result};
use crate::route::path::{decode_param, join, normalize_request, parse_segments};
use crate::route::{ControllerRef, MethodSet, RouteEntry, RouteGroup, RouteNode, Segment, CATCH_ALL};
use crate::types::PathParams;

/// One controller bound to a path for a set of methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerBinding {
    /// The controller reference
    pub controller: ControllerRef,
    /// Methods served, or `Any` for the fallback binding
    pub methods: MethodSet,
}

impl ControllerBinding {
    /// Resolve the concrete controller class and entrypoint for a request.
    pub fn resolve(
        &self,
        method: &Method,
        params: &PathParams,
    ) -> std::result::Result<(String, String), AdmissionError> {
        let class = self
            .controller
            .resolve_class(params)
            .ok_or_else(|| AdmissionError::EndpointNotFound(self.controller.to_string()))?;
        Ok((class, self.controller.entrypoint(method)))
    }
}

/// A flattened, matchable route
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    /// Normalized declared path
    pub path: String,
    /// Match pattern
    pub pattern: Regex,
    /// Parameter names, in declaration order
    pub params: Vec<String>,
    /// Bindings in declaration order
    pub bindings: Vec<ControllerBinding>,
}

impl PartialEq for CompiledRoute {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.pattern.as_str() == other.pattern.as_str()
            && self.params == other.params
            && self.bindings == other.bindings
    }
}

impl Eq for CompiledRoute {}

impl CompiledRoute {
    /// Binding for `method`: an explicit binding first, then the `Any` fallback.
    pub fn binding_for(&self, method: &Method) -> Option<&ControllerBinding> {
        self.bindings
            .iter()
            .find(|b| !b.methods.is_any() && b.methods.contains(method))
            .or_else(|| self.bindings.iter().find(|b| b.methods.is_any()))
    }

    /// Union of explicitly declared methods, sorted
    pub fn allowed_methods(&self) -> Vec<Method> {
        let mut allowed: Vec<Method> = Vec::new();
        for binding in &self.bindings {
            for method in binding.methods.methods() {
                if !allowed.contains(method) {
                    allowed.push(method.clone());
                }
            }
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        allowed
    }

    pub fn has_fallback(&self) -> bool {
        self.bindings.iter().any(|b| b.methods.is_any())
    }
}

/// A route matched against a request path
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route: &'a CompiledRoute,
    pub params: PathParams,
}

/// Immutable, ordered snapshot of compiled routes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Declare and compile a route tree in one step.
    pub fn build<F: FnOnce(&mut crate::route::RouteBuilder)>(declare: F) -> Result<Self> {
        compile(&RouteGroup::root(declare))
    }

    /// Match a request path; first route in snapshot order wins.
    pub fn match_path(&self, target: &str) -> std::result::Result<RouteMatch<'_>, AdmissionError> {
        let path = normalize_request(target);

        for route in &self.routes {
            let Some(captures) = route.pattern.captures(&path) else {
                continue;
            };
            let mut params = PathParams::new();
            for (name, value) in route.params.iter().zip(captures.iter().skip(1)) {
                let raw = value.map_or("", |m| m.as_str());
                params.push(name.as_str(), decode_param(raw)?);
            }
            return Ok(RouteMatch { route, params });
        }

        Err(AdmissionError::EndpointNotFound(path))
    }

    /// Select the binding serving `method` on a matched route.
    pub fn resolve_binding<'a>(
        &self,
        route: &'a CompiledRoute,
        method: &Method,
    ) -> std::result::Result<&'a ControllerBinding, AdmissionError> {
        route
            .binding_for(method)
            .ok_or_else(|| AdmissionError::MethodNotAllowed {
                method: method.clone(),
                path: route.path.clone(),
                allowed: route.allowed_methods(),
            })
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    /// Get the number of compiled routes
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

/// A tree entry recorded at its effective path
enum Flat<'a> {
    Group,
    Route(&'a RouteNode),
}

/// Path buckets in first-appearance order
#[derive(Default)]
struct Buckets<'a> {
    order: Vec<(String, Vec<Flat<'a>>)>,
    index: HashMap<String, usize>,
}

impl<'a> Buckets<'a> {
    fn push(&mut self, path: String, entry: Flat<'a>) {
        match self.index.get(&path) {
            Some(&i) => self.order[i].1.push(entry),
            None => {
                self.index.insert(path.clone(), self.order.len());
                self.order.push((path, vec![entry]));
            }
        }
    }
}

/// Depth-first, pre-order flatten of a group into path buckets
fn flatten<'a>(group: &'a RouteGroup, parent: &str, buckets: &mut Buckets<'a>) {
    let path = join(parent, group.path());
    buckets.push(path.clone(), Flat::Group);

    for child in group.children() {
        match child {
            RouteEntry::Route(node) => buckets.push(join(&path, node.path()), Flat::Route(node)),
            RouteEntry::Group(nested) => flatten(nested, &path, buckets),
        }
    }
}

/// Compile a route tree into a snapshot
pub fn compile(root: &RouteGroup) -> Result<RouteTable> {
    let mut buckets = Buckets::default();
    flatten(root, "/", &mut buckets);

    let mut routes = Vec::with_capacity(buckets.order.len());
    for (path, entries) in &buckets.order {
        let segments = parse_segments(path)?;

        let nodes: Vec<&RouteNode> = entries
            .iter()
            .filter_map(|entry| match entry {
                Flat::Route(node) => Some(*node),
                Flat::Group => None,
            })
            .collect();
        if nodes.is_empty() {
            continue;
        }

        let bindings = compile_bindings(path, &segments, &nodes)?;
        let (pattern, params) = compile_pattern(&segments)?;
        routes.push(CompiledRoute {
            path: path.clone(),
            pattern,
            params,
            bindings,
        });
    }

    info!(routes = routes.len(), "compiled route table");
    Ok(RouteTable { routes })
}

/// Aggregate the routes declared at one path into controller bindings
fn compile_bindings(
    path: &str,
    segments: &[Segment],
    nodes: &[&RouteNode],
) -> Result<Vec<ControllerBinding>> {
    let mut bindings: Vec<(String, ControllerBinding)> = Vec::new();
    let mut claimed: Vec<Method> = Vec::new();
    let has_captures = segments.iter().any(|s| !matches!(s, Segment::Literal(_)));

    for node in nodes {
        let controller = ControllerRef::parse(node.controller())?;
        if controller.is_namespace() && !has_captures {
            return Err(ConfigError::InvalidController(format!(
                "{} needs a captured segment on {}",
                node.controller(),
                path
            )));
        }

        let duplicate = |method: &str| ConfigError::DuplicateRoute {
            path: path.to_string(),
            method: method.to_string(),
        };

        match node.method_set() {
            MethodSet::Any => {
                if bindings.iter().any(|(_, b)| b.methods.is_any()) {
                    return Err(duplicate("*"));
                }
                bindings.push((
                    node.controller().to_string(),
                    ControllerBinding {
                        controller,
                        methods: MethodSet::Any,
                    },
                ));
            }
            MethodSet::Only(methods) => {
                for method in methods {
                    if claimed.contains(method) {
                        return Err(duplicate(method.as_str()));
                    }
                    claimed.push(method.clone());
                }

                let existing = bindings
                    .iter()
                    .position(|(name, b)| name == node.controller() && !b.methods.is_any());
                match existing {
                    Some(i) => {
                        for method in methods {
                            bindings[i].1.methods.insert(method.clone());
                        }
                    }
                    None => bindings.push((
                        node.controller().to_string(),
                        ControllerBinding {
                            controller,
                            methods: MethodSet::Only(methods.clone()),
                        },
                    )),
                }
            }
        }
    }

    Ok(bindings.into_iter().map(|(_, b)| b).collect())
}

/// Build the anchored, case-insensitive match pattern for a path
fn compile_pattern(segments: &[Segment]) -> Result<(Regex, Vec<String>)> {
    let mut pattern = String::from("(?i)^");
    let mut params = Vec::new();

    if segments.is_empty() {
        pattern.push('/');
    }
    for segment in segments {
        match segment {
            Segment::Literal(literal) => {
                pattern.push('/');
                pattern.push_str(&regex::escape(literal));
            }
            Segment::Param(name) => {
                pattern.push_str("/([^/]+)");
                params.push(name.clone());
            }
            Segment::CatchAll => {
                pattern.push_str("/(.+)");
                params.push(CATCH_ALL.to_string());
            }
        }
    }
    pattern.push('$');

    Ok((Regex::new(&pattern)?, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::build(|r| {
            r.get("/", r"Home\Index");
            r.group("/users", |r| {
                r.get("/", r"Users\Collection");
                r.post("/", r"Users\Collection");
                r.get("/:id", r"Users\Item");
                r.any("/:id", r"Users\Fallback");
            });
        })
        .unwrap()
    }

    #[test]
    fn test_compile_flattens_in_declaration_order() {
        let table = table();
        let paths: Vec<&str> = table.routes().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/users", "/users/:id"]);
    }

    #[test]
    fn test_compile_patterns() {
        let table = table();
        assert_eq!(table.routes()[0].pattern.as_str(), "(?i)^/$");
        assert_eq!(table.routes()[2].pattern.as_str(), "(?i)^/users/([^/]+)$");
        assert_eq!(table.routes()[2].params, vec!["id".to_string()]);
    }

    #[test]
    fn test_methods_aggregated_per_controller() {
        let table = table();
        let users = &table.routes()[1];
        assert_eq!(users.bindings.len(), 1);
        assert_eq!(users.bindings[0].methods.methods(), &[Method::GET, Method::POST]);
    }

    #[test]
    fn test_group_only_paths_produce_no_route() {
        let table = RouteTable::build(|r| {
            r.group("/api", |r| {
                r.get("/ping", "Ping");
            });
        })
        .unwrap();
        assert_eq!(table.route_count(), 1);
        assert_eq!(table.routes()[0].path, "/api/ping");
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let table = RouteTable::build(|r| {
            r.get("/feed.json", "Feed");
        })
        .unwrap();
        assert!(table.match_path("/feed.json").is_ok());
        assert!(table.match_path("/feedxjson").is_err());
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let err = RouteTable::build(|r| {
            r.post("/users", "A");
            r.post("/users", "B");
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute { ref method, .. } if method == "POST"));
    }

    #[test]
    fn test_duplicate_any_rejected() {
        let err = RouteTable::build(|r| {
            r.any("/users", "A");
            r.group("/", |r| {
                r.any("/users", "B");
            });
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute { ref method, .. } if method == "*"));
    }

    #[test]
    fn test_invalid_path_rejected() {
        let err = RouteTable::build(|r| {
            r.get("/users/{id}", "A");
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoutePath(_)));

        let err = RouteTable::build(|r| {
            r.group("/files/*", |r| {
                r.get("/meta", "A");
            });
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoutePath(_)));
    }

    #[test]
    fn test_namespace_controller_needs_capture() {
        let err = RouteTable::build(|r| {
            r.get("/docs", r"Docs\*");
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidController(_)));
    }

    #[test]
    fn test_binding_prefers_explicit_method() {
        let table = table();
        let route = &table.routes()[2];
        let get = table.resolve_binding(route, &Method::GET).unwrap();
        assert_eq!(get.controller.to_string(), r"Users\Item");

        let delete = table.resolve_binding(route, &Method::DELETE).unwrap();
        assert_eq!(delete.controller.to_string(), r"Users\Fallback");
    }

    #[test]
    fn test_method_not_allowed_reports_union() {
        let table = table();
        let route = &table.routes()[1];
        let err = table.resolve_binding(route, &Method::DELETE).unwrap_err();
        assert_eq!(err.allow_header().as_deref(), Some("GET, POST"));
    }

    #[test]
    fn test_compile_is_idempotent() {
        assert_eq!(table(), table());
    }
}
