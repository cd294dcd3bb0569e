//! Integration tests for the full admission pipeline

use std::path::PathBuf;

use admission_engine::{
    AdmissionConfig, AdmissionErrorKind, ConfigError, HostConfig, Method, Outcome, Pipeline,
    RequestInfo, RouteTable, Scheme, StatusCode, TrustedProxyConfig,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn testdata_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("testdata")
        .join(filename)
}

fn routes() -> RouteTable {
    RouteTable::build(|r| {
        r.get("/", r"Site\Home");
        r.group("/api", |r| {
            r.get("/status", r"Api\Status");
            r.route("/items/:id", r"Api\Items").methods([Method::GET, Method::DELETE]);
        });
    })
    .unwrap()
}

fn file_pipeline() -> Pipeline {
    init_tracing();
    Pipeline::from_file(testdata_path("admission.json"), routes()).unwrap()
}

fn redirect_location(outcome: &Outcome) -> (StatusCode, &str) {
    let redirect = outcome.redirect().expect("expected redirect");
    (redirect.status, redirect.location.as_str())
}

mod config_file_tests {
    use super::*;

    #[test]
    fn test_load_config_file() {
        let pipeline = file_pipeline();
        assert_eq!(pipeline.hosts().len(), 3);
        assert_eq!(pipeline.resolver().rules().len(), 2);
        assert_eq!(pipeline.routes().route_count(), 3);
    }

    #[test]
    fn test_missing_config_file() {
        let err = Pipeline::from_file(testdata_path("missing.json"), routes()).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}

mod redirect_tests {
    use super::*;

    #[test]
    fn test_secure_host_redirects_plain_text() {
        let req = RequestInfo::new("198.51.100.1", Method::GET, "/api/status?verbose=1")
            .with_header("Host", "example.com");
        let outcome = file_pipeline().admit(&req).unwrap();
        assert_eq!(
            redirect_location(&outcome),
            (
                StatusCode::PERMANENT_REDIRECT,
                "https://example.com/api/status?verbose=1"
            )
        );
    }

    #[test]
    fn test_tls_redirect_keeps_custom_port() {
        let req = RequestInfo::new("198.51.100.1", Method::GET, "/")
            .with_header("Host", "example.com:8080");
        let outcome = file_pipeline().admit(&req).unwrap();
        assert_eq!(redirect_location(&outcome).1, "https://example.com:8080/");
    }

    #[test]
    fn test_secure_host_over_tls() {
        let req = RequestInfo::new("198.51.100.1", Method::GET, "/")
            .with_header("Host", "example.com")
            .with_tls(true);
        let outcome = file_pipeline().admit(&req).unwrap();
        let dispatch = outcome.dispatch().unwrap();
        assert_eq!(dispatch.scheme, Scheme::Https);
        assert_eq!(dispatch.controller, r"Site\Home");
    }

    #[test]
    fn test_www_redirect() {
        let req = RequestInfo::new("198.51.100.1", Method::GET, "/api/status")
            .with_header("Host", "www.example.com")
            .with_tls(true);
        let outcome = file_pipeline().admit(&req).unwrap();
        assert_eq!(
            redirect_location(&outcome),
            (StatusCode::MOVED_PERMANENTLY, "https://example.com/api/status")
        );
    }

    #[test]
    fn test_crlf_target_rejected_instead_of_redirected() {
        let req = RequestInfo::new("198.51.100.1", Method::GET, "/a\r\nSet-Cookie: sid=evil")
            .with_header("Host", "example.com");
        let err = file_pipeline().admit(&req).unwrap_err();
        assert_eq!(err.kind(), AdmissionErrorKind::BadUrlEncoding);

        let req = RequestInfo::new("198.51.100.1", Method::GET, format!("/{}", "x".repeat(300)))
            .with_header("Host", "www.example.com");
        let err = file_pipeline().admit(&req).unwrap_err();
        assert_eq!(err.status(), StatusCode::URI_TOO_LONG);
    }

    #[test]
    fn test_redirect_runs_before_routing() {
        let req = RequestInfo::new("198.51.100.1", Method::GET, "/does/not/exist")
            .with_header("Host", "example.com");
        let outcome = file_pipeline().admit(&req).unwrap();
        assert!(outcome.redirect().is_some());
    }

    #[test]
    fn test_proxy_promoted_scheme_satisfies_tls() {
        let req = RequestInfo::new("10.0.0.1", Method::GET, "/")
            .with_header("X-Forwarded-For", "198.51.100.1, 10.0.0.2")
            .with_header("X-Forwarded-Host", "example.com")
            .with_header("X-Forwarded-Proto", "https");
        let outcome = file_pipeline().admit(&req).unwrap();
        let dispatch = outcome.dispatch().unwrap();
        assert_eq!(dispatch.scheme, Scheme::Https);
        assert_eq!(dispatch.trust.proxy_hop, 1);
        assert_eq!(dispatch.trust.client_ip.to_string(), "198.51.100.1");
    }
}

mod forwarding_mode_tests {
    use super::*;

    #[test]
    fn test_proxy_only_host() {
        let pipeline = file_pipeline();

        let direct = RequestInfo::new("198.51.100.1", Method::GET, "/api/status")
            .with_header("Host", "api.example.com");
        let err = pipeline.admit(&direct).unwrap_err();
        assert_eq!(err.status(), StatusCode::MISDIRECTED_REQUEST);

        let proxied = RequestInfo::new("10.0.0.1", Method::GET, "/api/status")
            .with_header("Host", "api.example.com")
            .with_header("X-Forwarded-For", "198.51.100.1");
        let outcome = pipeline.admit(&proxied).unwrap();
        assert_eq!(outcome.dispatch().unwrap().controller, r"Api\Status");
    }

    #[test]
    fn test_direct_only_host_with_port() {
        let pipeline = file_pipeline();

        let req = RequestInfo::new("198.51.100.1", Method::GET, "/")
            .with_header("Host", "internal.lan:8080");
        assert!(pipeline.admit(&req).is_ok());

        let req = RequestInfo::new("198.51.100.1", Method::GET, "/")
            .with_header("Host", "internal.lan")
            .with_local_port(8080);
        assert!(pipeline.admit(&req).is_ok());

        let req = RequestInfo::new("198.51.100.1", Method::GET, "/")
            .with_header("Host", "internal.lan");
        assert_eq!(
            pipeline.admit(&req).unwrap_err().kind(),
            AdmissionErrorKind::IncorrectHost
        );

        let req = RequestInfo::new("10.0.0.1", Method::GET, "/")
            .with_header("Host", "internal.lan:8080");
        assert_eq!(
            pipeline.admit(&req).unwrap_err().kind(),
            AdmissionErrorKind::IncorrectHost
        );
    }
}

mod failure_tests {
    use super::*;

    fn pipeline() -> Pipeline {
        init_tracing();
        let config = AdmissionConfig::new()
            .with_host(HostConfig::new("example.com"))
            .with_trusted_proxy(TrustedProxyConfig::new(["10.0.0.0/8"]))
            .with_max_url_length(64);
        Pipeline::new(&config, routes()).unwrap()
    }

    fn request(method: Method, target: &str) -> RequestInfo {
        RequestInfo::new("198.51.100.1", method, target).with_header("Host", "example.com")
    }

    #[test]
    fn test_missing_host_header() {
        let req = RequestInfo::new("198.51.100.1", Method::GET, "/");
        let err = pipeline().admit(&req).unwrap_err();
        assert_eq!(err.kind(), AdmissionErrorKind::IncorrectHost);
    }

    #[test]
    fn test_url_too_long() {
        let target = format!("/api/items/{}", "a".repeat(60));
        let err = pipeline().admit(&request(Method::GET, &target)).unwrap_err();
        assert_eq!(err.status(), StatusCode::URI_TOO_LONG);
    }

    #[test]
    fn test_malformed_percent_encoding() {
        let err = pipeline()
            .admit(&request(Method::GET, "/api/items/%zz"))
            .unwrap_err();
        assert_eq!(err.kind(), AdmissionErrorKind::BadUrlEncoding);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_method_not_allowed() {
        let err = pipeline()
            .admit(&request(Method::POST, "/api/items/1"))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.allow_header().as_deref(), Some("DELETE, GET"));
    }

    #[test]
    fn test_bad_peer() {
        let err = pipeline()
            .admit(&RequestInfo::new("not-an-ip", Method::GET, "/"))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), AdmissionErrorKind::BadPeerIp);
    }

    #[test]
    fn test_shared_across_threads() {
        let pipeline = std::sync::Arc::new(pipeline());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let pipeline = pipeline.clone();
                std::thread::spawn(move || {
                    let req = request(Method::GET, &format!("/api/items/{}", i));
                    let outcome = pipeline.admit(&req).unwrap();
                    outcome.dispatch().unwrap().params.get("id").map(str::to_string)
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), Some(i.to_string()));
        }
    }
}
