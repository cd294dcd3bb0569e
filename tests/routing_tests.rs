//! Integration tests for route compilation, path matching and controller binding

use admission_engine::route::path::normalize_request;
use admission_engine::{
    AdmissionError, AdmissionErrorKind, ConfigError, ControllerRef, Method, RouteGroup,
    RouteTable, StatusCode,
};

fn dispatch(table: &RouteTable, method: Method, target: &str) -> (String, String) {
    let matched = table.match_path(target).unwrap();
    let binding = table.resolve_binding(matched.route, &method).unwrap();
    binding.resolve(&method, &matched.params).unwrap()
}

fn blog() -> RouteTable {
    RouteTable::build(|r| {
        r.get("/", r"Blog\Home");
        r.group("/posts", |r| {
            r.get("/", r"Blog\Posts::index");
            r.post("/", r"Blog\Posts::store");
            r.get("/:slug", r"Blog\Post");
            r.group("/:slug/comments", |r| {
                r.get("/", r"Blog\Comments");
                r.delete("/:comment", r"Blog\Comments");
            });
        });
        r.group("/docs", |r| {
            r.get("/*", r"Docs\Controllers\Libs\*");
        });
        r.any("/files/*", r"Files\Serve");
    })
    .unwrap()
}

mod matching_tests {
    use super::*;

    #[test]
    fn test_root_and_literals() {
        let table = blog();
        assert_eq!(dispatch(&table, Method::GET, "/").0, r"Blog\Home");
        assert_eq!(
            dispatch(&table, Method::GET, "/posts"),
            (r"Blog\Posts".to_string(), "index".to_string())
        );
        assert_eq!(
            dispatch(&table, Method::POST, "/posts/"),
            (r"Blog\Posts".to_string(), "store".to_string())
        );
    }

    #[test]
    fn test_params_are_captured_in_order() {
        let table = blog();
        let matched = table.match_path("/posts/hello-world/comments/17").unwrap();
        assert_eq!(matched.route.path, "/posts/:slug/comments/:comment");
        let params: Vec<(&str, &str)> = matched.params.iter().collect();
        assert_eq!(params, vec![("slug", "hello-world"), ("comment", "17")]);
    }

    #[test]
    fn test_request_normalization() {
        let table = blog();
        assert_eq!(normalize_request("//posts///abc/?page=2#top"), "/posts/abc");
        assert_eq!(normalize_request(""), "/");

        let matched = table.match_path("//POSTS//Abc/?page=2").unwrap();
        assert_eq!(matched.route.path, "/posts/:slug");
        // Captured values keep their case
        assert_eq!(matched.params.get("slug"), Some("Abc"));
    }

    #[test]
    fn test_params_are_percent_decoded() {
        let table = blog();
        let matched = table.match_path("/posts/caf%C3%A9%20menu").unwrap();
        assert_eq!(matched.params.get("slug"), Some("café menu"));

        let err = table.match_path("/posts/%FF").unwrap_err();
        assert_eq!(err.kind(), AdmissionErrorKind::BadUrlEncoding);
    }

    #[test]
    fn test_params_do_not_span_segments() {
        let table = RouteTable::build(|r| {
            r.get("/users/:id", "Users");
        })
        .unwrap();
        assert!(table.match_path("/users/1/2").is_err());
        assert!(table.match_path("/users").is_err());
    }

    #[test]
    fn test_catch_all() {
        let table = blog();
        let matched = table.match_path("/files/a/b/c.txt").unwrap();
        assert_eq!(matched.params.get("*"), Some("a/b/c.txt"));
        assert!(table.match_path("/files").is_err());
    }

    #[test]
    fn test_namespace_wildcard() {
        let table = blog();
        assert_eq!(
            dispatch(&table, Method::GET, "/docs/libs/http_router"),
            (
                r"Docs\Controllers\Libs\HttpRouter".to_string(),
                "get".to_string()
            )
        );
    }

    #[test]
    fn test_namespace_wildcard_rejects_bad_class() {
        let table = blog();
        let matched = table.match_path("/docs/libs/9lives").unwrap();
        let binding = table.resolve_binding(matched.route, &Method::GET).unwrap();
        let err = binding.resolve(&Method::GET, &matched.params).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unknown_path() {
        let err = blog().match_path("/nope").unwrap_err();
        assert!(matches!(err, AdmissionError::EndpointNotFound(ref p) if p == "/nope"));
    }
}

mod ordering_tests {
    use super::*;

    #[test]
    fn test_declaration_order_shadows_later_routes() {
        let table = RouteTable::build(|r| {
            r.get("/users/:id", r"Users\Item");
            r.get("/users/me", r"Users\Me");
        })
        .unwrap();
        assert_eq!(dispatch(&table, Method::GET, "/users/me").0, r"Users\Item");
    }

    #[test]
    fn test_literal_first_when_declared_first() {
        let table = RouteTable::build(|r| {
            r.get("/users/me", r"Users\Me");
            r.get("/users/:id", r"Users\Item");
        })
        .unwrap();
        assert_eq!(dispatch(&table, Method::GET, "/users/me").0, r"Users\Me");
        assert_eq!(dispatch(&table, Method::GET, "/users/7").0, r"Users\Item");
    }

    #[test]
    fn test_same_path_in_two_groups_merges_at_first_position() {
        let table = RouteTable::build(|r| {
            r.get("/a", "First");
            r.get("/b", "Second");
            r.group("/", |r| {
                r.post("/a", "Third");
            });
        })
        .unwrap();
        let paths: Vec<&str> = table.routes().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/a", "/b"]);
        assert_eq!(dispatch(&table, Method::POST, "/a").0, "Third");
    }
}

mod method_tests {
    use super::*;

    #[test]
    fn test_method_not_allowed() {
        let table = blog();
        let matched = table.match_path("/posts").unwrap();
        let err = table
            .resolve_binding(matched.route, &Method::PATCH)
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.allow_header().as_deref(), Some("GET, POST"));
    }

    #[test]
    fn test_any_method_fallback() {
        let table = blog();
        let (controller, entrypoint) = dispatch(&table, Method::OPTIONS, "/files/x");
        assert_eq!(controller, r"Files\Serve");
        assert_eq!(entrypoint, "options");
    }

    #[test]
    fn test_custom_method() {
        let purge = Method::from_bytes(b"PURGE").unwrap();
        let table = RouteTable::build(|r| {
            r.route("/cache", r"Cache\Admin").method(purge.clone());
        })
        .unwrap();
        assert_eq!(
            dispatch(&table, purge, "/cache"),
            (r"Cache\Admin".to_string(), "purge".to_string())
        );
    }
}

mod compile_error_tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_controller() {
        let err = RouteTable::build(|r| {
            r.get("/", "Not A Class");
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidController(_)));
    }

    #[test]
    fn test_rejects_duplicate_param_names() {
        let err = RouteTable::build(|r| {
            r.group("/:id", |r| {
                r.get("/:id", "A");
            });
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoutePath(_)));
    }

    #[test]
    fn test_duplicate_across_groups() {
        let err = RouteTable::build(|r| {
            r.group("/api", |r| {
                r.get("/ping", "A");
            });
            r.get("/api/ping", "B");
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Duplicate route: GET /api/ping");
    }

    #[test]
    fn test_compile_from_tree() {
        let root = RouteGroup::root(|r| {
            r.get("/health", r"Ops\Health");
        });
        let table = admission_engine::compile(&root).unwrap();
        assert_eq!(table.route_count(), 1);
        assert_eq!(
            table.routes()[0].bindings[0].controller,
            ControllerRef::parse(r"Ops\Health").unwrap()
        );
    }
}
