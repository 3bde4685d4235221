//! Domain + path routing rules.

use std::fmt;

use crate::error::{AppError, Result};

/// Domain that matches any host.
pub const ANY_DOMAIN: &str = "*";

/// A `domain[/path]` rule, e.g. `*/status` or `example.com/api`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub domain: String,
    pub path: String,
}

impl Route {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::config("A route must not be empty"));
        }

        let (domain, path) = value.split_once('/').unwrap_or((value, ""));
        let domain = if domain.is_empty() {
            ANY_DOMAIN.to_string()
        } else {
            domain.to_ascii_lowercase()
        };
        if domain.contains(char::is_whitespace) {
            return Err(AppError::config(format!("Invalid route domain in '{}'", value)));
        }

        let path = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        Ok(Self { domain, path })
    }

    pub fn is_wildcard(&self) -> bool {
        self.domain == ANY_DOMAIN
    }

    /// Check whether a request `Host` header value is served by this route.
    /// Any `:port` suffix is ignored.
    pub fn matches_host(&self, host: &str) -> bool {
        if self.is_wildcard() {
            return true;
        }
        strip_port(host).eq_ignore_ascii_case(&self.domain)
    }
}

/// Drop a trailing `:port` from a host, keeping bracketed IPv6 literals whole.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    match host.rsplit_once(':') {
        Some((name, port))
            if !name.contains(':') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            name
        }
        _ => host,
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.domain)
        } else {
            write!(f, "{}/{}", self.domain, self.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wildcard() {
        let route = Route::parse("*").unwrap();
        assert!(route.is_wildcard());
        assert_eq!(route.path, "");
        assert_eq!(route.to_string(), "*");
    }

    #[test]
    fn parses_domain_and_path() {
        let route = Route::parse("Example.com/api/status/").unwrap();
        assert_eq!(route.domain, "example.com");
        assert_eq!(route.path, "api/status");
        assert_eq!(route.to_string(), "example.com/api/status");
    }

    #[test]
    fn leading_slash_means_any_domain() {
        let route = Route::parse("/status").unwrap();
        assert_eq!(route, Route::parse("*/status").unwrap());
    }

    #[test]
    fn rejects_empty_route() {
        assert!(Route::parse("  ").is_err());
    }

    #[test]
    fn host_matching_ignores_port_and_case() {
        let route = Route::parse("example.com/foo").unwrap();
        assert!(route.matches_host("example.com:3000"));
        assert!(route.matches_host("EXAMPLE.com"));
        assert!(!route.matches_host("other.com"));
        assert!(Route::parse("*/foo").unwrap().matches_host("anything:80"));
    }

    #[test]
    fn host_matching_keeps_ipv6_literals() {
        let route = Route::parse("[::1]/status").unwrap();
        assert!(route.matches_host("[::1]"));
        assert!(route.matches_host("[::1]:8080"));
        assert!(!route.matches_host("[::2]:8080"));
        assert_eq!(strip_port("example.com:"), "example.com:");
        assert_eq!(strip_port("::1"), "::1");
    }
}
