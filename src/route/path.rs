//! Path grammar, normalization and request-target validation.

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::error::{AdmissionError, ConfigError, Result};

static LITERAL_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._-]+$").expect("LITERAL_SEGMENT: hardcoded regex is invalid")
});

static PARAM_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^:([a-z0-9_]+)$").expect("PARAM_SEGMENT: hardcoded regex is invalid")
});

/// Parameter name recorded for a trailing catch-all segment
pub const CATCH_ALL: &str = "*";

/// Default request-target length limit in bytes
pub const DEFAULT_MAX_URL_LENGTH: usize = 2048;

/// One segment of a declared route path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    CatchAll,
}

/// Normalize a declared path: trim slashes, lower-case, one leading `/`.
pub fn normalize_declared(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{}", trimmed.to_lowercase())
}

/// Concatenate two normalized declared paths.
pub fn join(parent: &str, child: &str) -> String {
    match (parent, child) {
        ("/", child) => child.to_string(),
        (parent, "/") => parent.to_string(),
        (parent, child) => format!("{}{}", parent, child),
    }
}

/// Split a normalized declared path into validated segments.
pub fn parse_segments(path: &str) -> Result<Vec<Segment>> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let parts: Vec<&str> = trimmed.split('/').collect();
    let mut segments = Vec::with_capacity(parts.len());
    let mut names: Vec<&str> = Vec::new();

    for (i, part) in parts.iter().enumerate() {
        let invalid = || ConfigError::InvalidRoutePath(path.to_string());

        if *part == CATCH_ALL {
            if i + 1 != parts.len() {
                return Err(invalid());
            }
            segments.push(Segment::CatchAll);
        } else if let Some(caps) = PARAM_SEGMENT.captures(part) {
            let name = caps.get(1).map_or("", |m| m.as_str());
            if names.contains(&name) {
                return Err(invalid());
            }
            names.push(name);
            segments.push(Segment::Param(name.to_string()));
        } else if LITERAL_SEGMENT.is_match(part) {
            segments.push(Segment::Literal(part.to_string()));
        } else {
            return Err(invalid());
        }
    }

    Ok(segments)
}

/// Normalize a request path: drop query and fragment, collapse empty
/// segments, single leading `/`, no trailing `/` except for the root.
pub fn normalize_request(target: &str) -> String {
    let path = target.split(['?', '#']).next().unwrap_or("");

    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Reject over-long targets, control characters and malformed
/// percent-encoding.
pub fn validate_target(target: &str, limit: usize) -> std::result::Result<(), AdmissionError> {
    if target.len() > limit {
        return Err(AdmissionError::BadUrlLength {
            len: target.len(),
            limit,
        });
    }

    let bytes = target.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b if b.is_ascii_control() => {
                return Err(AdmissionError::BadUrlEncoding(format!(
                    "control character at offset {}",
                    i
                )));
            }
            b'%' => {
                let valid = bytes.len() > i + 2
                    && bytes[i + 1].is_ascii_hexdigit()
                    && bytes[i + 2].is_ascii_hexdigit();
                if !valid {
                    return Err(AdmissionError::BadUrlEncoding(format!(
                        "malformed percent-encoding at offset {}",
                        i
                    )));
                }
                i += 3;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

/// Percent-decode a captured path value.
pub fn decode_param(raw: &str) -> std::result::Result<String, AdmissionError> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| AdmissionError::BadUrlEncoding(format!("invalid UTF-8 in '{}'", raw)))?;
    if decoded.chars().any(char::is_control) {
        return Err(AdmissionError::BadUrlEncoding(format!(
            "control character in '{}'",
            raw
        )));
    }
    Ok(decoded.into_owned())
}
