//! Declarative route tree.
//!
//! Routes are declared once at startup through [`RouteBuilder`] closures and
//! then compiled into an immutable [`RouteTable`](crate::compile::RouteTable).

use http::Method;

use super::path::normalize_declared;

/// HTTP methods a route answers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    /// Wildcard: any method
    Any,
    /// Explicit methods, sorted and de-duplicated
    Only(Vec<Method>),
}

impl MethodSet {
    pub fn contains(&self, method: &Method) -> bool {
        match self {
            MethodSet::Any => true,
            MethodSet::Only(methods) => methods.contains(method),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, MethodSet::Any)
    }

    /// Explicit methods; empty for `Any`
    pub fn methods(&self) -> &[Method] {
        match self {
            MethodSet::Any => &[],
            MethodSet::Only(methods) => methods,
        }
    }

    /// Add a method, turning `Any` into an explicit set.
    pub fn insert(&mut self, method: Method) {
        match self {
            MethodSet::Any => *self = MethodSet::Only(vec![method]),
            MethodSet::Only(methods) => {
                if !methods.contains(&method) {
                    methods.push(method);
                    methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                }
            }
        }
    }
}

/// One declared route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNode {
    path: String,
    controller: String,
    methods: MethodSet,
}

impl RouteNode {
    pub fn new(path: &str, controller: impl Into<String>) -> Self {
        Self {
            path: normalize_declared(path),
            controller: controller.into(),
            methods: MethodSet::Any,
        }
    }

    /// Restrict the route to one more method
    pub fn method(&mut self, method: Method) -> &mut Self {
        self.methods.insert(method);
        self
    }

    /// Restrict the route to a set of methods
    pub fn methods<I: IntoIterator<Item = Method>>(&mut self, methods: I) -> &mut Self {
        for method in methods {
            self.methods.insert(method);
        }
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn method_set(&self) -> &MethodSet {
        &self.methods
    }
}

/// A node of the route tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEntry {
    Route(RouteNode),
    Group(RouteGroup),
}

/// A path prefix scoping nested routes and groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGroup {
    path: String,
    children: Vec<RouteEntry>,
}

impl RouteGroup {
    /// Build the root group (`/`) by running a declaration closure.
    pub fn root<F: FnOnce(&mut RouteBuilder)>(declare: F) -> Self {
        Self::declare("/", declare)
    }

    fn declare<F: FnOnce(&mut RouteBuilder)>(path: &str, declare: F) -> Self {
        let mut builder = RouteBuilder {
            children: Vec::new(),
        };
        declare(&mut builder);
        Self {
            path: normalize_declared(path),
            children: builder.children,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn children(&self) -> &[RouteEntry] {
        &self.children
    }
}

/// Collects routes and nested groups for one group
#[derive(Debug)]
pub struct RouteBuilder {
    children: Vec<RouteEntry>,
}

impl RouteBuilder {
    /// Declare a route answering any method until restricted.
    pub fn route(&mut self, path: &str, controller: &str) -> &mut RouteNode {
        self.children
            .push(RouteEntry::Route(RouteNode::new(path, controller)));
        match self.children.last_mut() {
            Some(RouteEntry::Route(node)) => node,
            _ => unreachable!("route entry was just pushed"),
        }
    }

    /// Declare a wildcard-method route
    pub fn any(&mut self, path: &str, controller: &str) -> &mut RouteNode {
        self.route(path, controller)
    }

    pub fn get(&mut self, path: &str, controller: &str) -> &mut RouteNode {
        self.route(path, controller).method(Method::GET)
    }

    pub fn post(&mut self, path: &str, controller: &str) -> &mut RouteNode {
        self.route(path, controller).method(Method::POST)
    }

    pub fn put(&mut self, path: &str, controller: &str) -> &mut RouteNode {
        self.route(path, controller).method(Method::PUT)
    }

    pub fn patch(&mut self, path: &str, controller: &str) -> &mut RouteNode {
        self.route(path, controller).method(Method::PATCH)
    }

    pub fn delete(&mut self, path: &str, controller: &str) -> &mut RouteNode {
        self.route(path, controller).method(Method::DELETE)
    }

    /// Declare a nested group under `path`
    pub fn group<F: FnOnce(&mut RouteBuilder)>(&mut self, path: &str, declare: F) -> &mut Self {
        self.children
            .push(RouteEntry::Group(RouteGroup::declare(path, declare)));
        self
    }
}
