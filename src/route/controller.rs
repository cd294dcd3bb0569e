//! Controller references.
//!
//! A reference is either a concrete class (`Users\Controller`, optionally with
//! an entrypoint: `Users\Controller::create`) or a namespace wildcard
//! (`Docs\Controllers\Libs\*`) whose class is taken from the request path.

use std::fmt;

use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConfigError, Result};
use crate::types::PathParams;

static CLASS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\\[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("CLASS_PATTERN: hardcoded regex is invalid")
});

static IDENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("IDENT_PATTERN: hardcoded regex is invalid")
});

/// A controller a route is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControllerRef {
    Class {
        class: String,
        entrypoint: Option<String>,
    },
    Namespace {
        namespace: String,
    },
}

impl ControllerRef {
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        let invalid = || ConfigError::InvalidController(reference.to_string());

        if let Some(namespace) = reference.strip_suffix("\\*") {
            if !CLASS_PATTERN.is_match(namespace) {
                return Err(invalid());
            }
            return Ok(ControllerRef::Namespace {
                namespace: namespace.to_string(),
            });
        }

        let (class, entrypoint) = match reference.split_once("::") {
            Some((class, entrypoint)) => {
                if !IDENT_PATTERN.is_match(entrypoint) {
                    return Err(invalid());
                }
                (class, Some(entrypoint.to_string()))
            }
            None => (reference, None),
        };
        if !CLASS_PATTERN.is_match(class) {
            return Err(invalid());
        }

        Ok(ControllerRef::Class {
            class: class.to_string(),
            entrypoint,
        })
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self, ControllerRef::Namespace { .. })
    }

    /// Concrete class for a request.
    ///
    /// Namespace references take the last segment of the last captured value
    /// and convert it to PascalCase; `None` if that does not yield a valid
    /// class name.
    pub fn resolve_class(&self, params: &PathParams) -> Option<String> {
        match self {
            ControllerRef::Class { class, .. } => Some(class.clone()),
            ControllerRef::Namespace { namespace } => {
                let segment = params.last()?;
                let segment = segment.rsplit('/').find(|s| !s.is_empty())?;
                let class = pascal_case(segment);
                if !IDENT_PATTERN.is_match(&class) {
                    return None;
                }
                Some(format!("{}\\{}", namespace, class))
            }
        }
    }

    /// Entrypoint to invoke; defaults to the lower-cased method name.
    pub fn entrypoint(&self, method: &Method) -> String {
        match self {
            ControllerRef::Class {
                entrypoint: Some(entrypoint),
                ..
            } => entrypoint.clone(),
            _ => method.as_str().to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for ControllerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerRef::Class {
                class,
                entrypoint: Some(entrypoint),
            } => write!(f, "{}::{}", class, entrypoint),
            ControllerRef::Class { class, .. } => f.write_str(class),
            ControllerRef::Namespace { namespace } => write!(f, "{}\\*", namespace),
        }
    }
}

/// `http_router` -> `HttpRouter`; `_`, `-` and `.` separate words.
pub fn pascal_case(segment: &str) -> String {
    segment
        .split(['_', '-', '.'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_class() {
        let c = ControllerRef::parse(r"Users\Controller").unwrap();
        assert_eq!(
            c,
            ControllerRef::Class {
                class: r"Users\Controller".into(),
                entrypoint: None
            }
        );
        assert_eq!(c.entrypoint(&Method::POST), "post");

        let c = ControllerRef::parse(r"Users\Controller::create").unwrap();
        assert_eq!(c.entrypoint(&Method::POST), "create");
        assert_eq!(c.to_string(), r"Users\Controller::create");
    }

    #[test]
    fn test_parse_namespace() {
        let c = ControllerRef::parse(r"Docs\Controllers\Libs\*").unwrap();
        assert!(c.is_namespace());
        assert_eq!(c.to_string(), r"Docs\Controllers\Libs\*");
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["", r"Users\", r"\Users", "Users::", "Users::a-b", "1Users", r"A\*\B"] {
            assert!(
                matches!(ControllerRef::parse(bad), Err(ConfigError::InvalidController(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("http_router"), "HttpRouter");
        assert_eq!(pascal_case("user-profile.v2"), "UserProfileV2");
        assert_eq!(pascal_case("already"), "Already");
        assert_eq!(pascal_case("__"), "");
    }

    #[test]
    fn test_resolve_namespace_class() {
        let c = ControllerRef::parse(r"Docs\Controllers\Libs\*").unwrap();
        let mut params = PathParams::new();
        params.push("*", "lib/http_router");
        assert_eq!(
            c.resolve_class(&params).as_deref(),
            Some(r"Docs\Controllers\Libs\HttpRouter")
        );

        let mut bad = PathParams::new();
        bad.push("*", "9lives");
        assert!(c.resolve_class(&bad).is_none());

        assert!(c.resolve_class(&PathParams::new()).is_none());
    }
}
