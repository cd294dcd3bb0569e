//! Forwarding header grammar.
//!
//! Parses the standard `Forwarded` header and the legacy `X-Forwarded-*`
//! lists into per-hop elements. Nothing here decides trust; see
//! [`crate::proxy`].

use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;

/// Hostnames a proxy may hand us: DNS-ish labels or a bracketed IPv6 literal
static HOST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9_](?:[a-z0-9_-]*[a-z0-9_])?(?:\.[a-z0-9_](?:[a-z0-9_-]*[a-z0-9_])?)*|\[[0-9a-f:.]+\])$")
        .expect("HOST_PATTERN: hardcoded regex is invalid")
});

/// One element (hop) of a `Forwarded` header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedElement {
    /// Parsed `for=` address, absent if missing or unparsable
    pub for_addr: Option<IpAddr>,
    /// Parsed `by=` address
    pub by: Option<IpAddr>,
    /// Raw `host=` value
    pub host: Option<String>,
    /// Raw `proto=` value
    pub proto: Option<String>,
}

/// Parse a `Forwarded` header value into its elements, in header order.
///
/// Empty elements are kept so that positions line up with the header.
pub fn parse_forwarded(value: &str) -> Vec<ForwardedElement> {
    split_unquoted(value, ',')
        .into_iter()
        .map(parse_forwarded_element)
        .collect()
}

fn parse_forwarded_element(element: &str) -> ForwardedElement {
    let mut parsed = ForwardedElement::default();

    for pair in split_unquoted(element, ';') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = unquote(value.trim());

        if key.eq_ignore_ascii_case("for") {
            parsed.for_addr = parse_node(&value);
        } else if key.eq_ignore_ascii_case("by") {
            parsed.by = parse_node(&value);
        } else if key.eq_ignore_ascii_case("host") {
            parsed.host = Some(value);
        } else if key.eq_ignore_ascii_case("proto") {
            parsed.proto = Some(value);
        }
    }

    parsed
}

/// Parse a `Forwarded` node (`for=`/`by=` value).
///
/// IPv6 must be bracketed; an unbracketed IPv6 literal is unparsable.
fn parse_node(value: &str) -> Option<IpAddr> {
    if let Some(rest) = value.strip_prefix('[') {
        let (inner, _) = rest.split_once(']')?;
        return match inner.parse::<IpAddr>().ok()? {
            ip @ IpAddr::V6(_) => Some(ip.to_canonical()),
            IpAddr::V4(_) => None,
        };
    }
    let host = match value.split_once(':') {
        Some((host, port)) if !port.contains(':') => host,
        Some(_) => return None,
        None => value,
    };
    host.parse::<std::net::Ipv4Addr>().ok().map(IpAddr::V4)
}

/// Split a comma separated header list, trimming each entry.
pub fn split_list(value: &str) -> Vec<&str> {
    value.split(',').map(str::trim).collect()
}

/// Normalize one `X-Forwarded-For` entry into an address.
///
/// Accepts bare IPv4/IPv6, `ipv4:port`, and `[ipv6]` with an optional port.
/// `unknown`, empty and malformed entries yield `None`.
pub fn parse_xff_addr(token: &str) -> Option<IpAddr> {
    let token = token.trim();
    if token.is_empty() || token.eq_ignore_ascii_case("unknown") {
        return None;
    }
    if let Some(rest) = token.strip_prefix('[') {
        let (inner, _) = rest.split_once(']')?;
        return inner.parse::<IpAddr>().ok().map(|ip| ip.to_canonical());
    }
    if let Ok(ip) = token.parse::<IpAddr>() {
        return Some(ip.to_canonical());
    }
    let (host, port) = token.split_once(':')?;
    if port.contains(':') {
        return None;
    }
    host.parse::<std::net::Ipv4Addr>().ok().map(IpAddr::V4)
}

/// Parse a port, accepting only `1..=65535`.
pub fn parse_port(value: &str) -> Option<u16> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

/// Split `host[:port]`, lower-casing the host.
///
/// Returns `None` when the host part is not a plausible hostname or a port
/// is present but not in `1..=65535`.
pub fn split_host_port(value: &str) -> Option<(String, Option<u16>)> {
    let value = value.trim();
    let (host, port) = if value.starts_with('[') {
        let end = value.find(']')?;
        let (host, rest) = value.split_at(end + 1);
        if rest.is_empty() {
            (host, None)
        } else {
            (host, Some(rest.strip_prefix(':')?))
        }
    } else {
        match value.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (value, None),
        }
    };

    let host = host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase();
    if !HOST_PATTERN.is_match(&host) {
        return None;
    }
    let port = match port {
        Some(port) => Some(parse_port(port)?),
        None => None,
    };
    Some((host, port))
}

/// Split on `sep` outside of double-quoted strings.
fn split_unquoted(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(value[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(value[start..].trim());
    parts
}

/// Strip surrounding quotes and unescape `\"` and `\\`.
fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
