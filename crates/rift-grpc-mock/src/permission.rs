//! Connection-permission policy for calls no stub answers.
//!
//! When mocking is enabled and the registry has no stub for a call, the
//! adapter asks [`is_connection_allowed`] whether the call may still reach the
//! real server. The decision is a pure function of the [`NetConnectConfig`]
//! snapshot and the target endpoint:
//!
//! 1. `allow_net_connect` allows everything.
//! 2. `allow_localhost` allows the loopback hosts.
//! 3. Otherwise the [`AllowSpec`] decides, recursively for lists.
//!
//! # Allow grammar
//!
//! - `Host(s)`: equals the full URI, the host, `host:port`,
//!   `scheme://host:port`, or `scheme://host` when the port is the scheme
//!   default.
//! - `Pattern(re)`: searches the full URI, or `scheme://host` when the port is
//!   the scheme default.
//! - `Predicate(f)`: `f(uri)`.
//! - `Any(list)`: any element matches.

use crate::error::MockError;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tonic::transport::Uri;

/// Hosts allowed by the localhost exception.
const LOCALHOST_HOSTS: [&str; 5] = ["localhost", "127.0.0.1", "0.0.0.0", "[::1]", "::1"];

/// Scheme assumed for targets given as a bare `host:port`.
const DEFAULT_SCHEME: &str = "http";

/// A call target parsed the way the policy compares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUri {
    raw: String,
    scheme: String,
    host: String,
    explicit_port: Option<u16>,
}

impl TargetUri {
    /// Parse a target such as `localhost:8000` or `https://api.example.com`.
    pub fn parse(target: &str) -> Result<Self, MockError> {
        let written = if target.contains("://") {
            target.to_string()
        } else {
            format!("{DEFAULT_SCHEME}://{target}")
        };

        let invalid = |reason: String| MockError::InvalidTarget {
            target: target.to_string(),
            reason,
        };

        let uri: Uri = written.parse().map_err(|e| invalid(format!("{e}")))?;
        let scheme = uri
            .scheme_str()
            .ok_or_else(|| invalid("missing scheme".to_string()))?
            .to_ascii_lowercase();
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?
            .to_string();

        let mut parsed = Self {
            raw: String::new(),
            scheme,
            host,
            explicit_port: uri.port_u16(),
        };
        parsed.raw = parsed.normalized(uri.path_and_query().map(|pq| pq.as_str()));
        Ok(parsed)
    }

    /// Full URI with a lowercase scheme and without the scheme default port.
    fn normalized(&self, path_and_query: Option<&str>) -> String {
        let mut uri = format!("{}://{}", self.scheme, self.host);
        if let Some(port) = self.explicit_port.filter(|_| !self.is_default_port()) {
            uri.push_str(&format!(":{port}"));
        }
        uri.push_str(path_and_query.unwrap_or_default());
        uri
    }

    /// The URI as compared by full-string rules.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host as written in the URI; IPv6 literals keep their brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, falling back to the scheme default.
    pub fn port(&self) -> Option<u16> {
        self.explicit_port.or_else(|| self.default_port())
    }

    pub fn default_port(&self) -> Option<u16> {
        match self.scheme.as_str() {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        }
    }

    pub fn is_default_port(&self) -> bool {
        self.port() == self.default_port()
    }

    pub fn is_localhost(&self) -> bool {
        LOCALHOST_HOSTS.contains(&self.host.as_str())
    }

    fn port_string(&self) -> String {
        self.port().map(|p| p.to_string()).unwrap_or_default()
    }
}

impl fmt::Display for TargetUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Predicate deciding whether a target may be reached.
pub type AllowPredicate = Arc<dyn Fn(&TargetUri) -> bool + Send + Sync>;

/// Endpoints that stay reachable while net connect is disabled.
#[derive(Clone)]
pub enum AllowSpec {
    Host(String),
    Pattern(Regex),
    Predicate(AllowPredicate),
    Any(Vec<AllowSpec>),
}

impl AllowSpec {
    /// Compile a regex allow entry.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(AllowSpec::Pattern(Regex::new(pattern)?))
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&TargetUri) -> bool + Send + Sync + 'static,
    {
        AllowSpec::Predicate(Arc::new(f))
    }

    /// Check whether this entry allows `uri`.
    pub fn allows(&self, uri: &TargetUri) -> bool {
        match self {
            AllowSpec::Any(entries) => entries.iter().any(|entry| entry.allows(uri)),
            AllowSpec::Pattern(regex) => {
                regex.is_match(uri.as_str())
                    || (regex.is_match(&format!("{}://{}", uri.scheme(), uri.host()))
                        && uri.is_default_port())
            }
            AllowSpec::Host(allowed) => {
                let host_port = format!("{}:{}", uri.host(), uri.port_string());
                allowed == uri.as_str()
                    || allowed == uri.host()
                    || *allowed == host_port
                    || *allowed == format!("{}://{}", uri.scheme(), host_port)
                    || (*allowed == format!("{}://{}", uri.scheme(), uri.host())
                        && uri.is_default_port())
            }
            AllowSpec::Predicate(predicate) => predicate(uri),
        }
    }
}

impl fmt::Debug for AllowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowSpec::Host(host) => f.debug_tuple("Host").field(host).finish(),
            AllowSpec::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            AllowSpec::Predicate(_) => f.write_str("Predicate(..)"),
            AllowSpec::Any(entries) => f.debug_tuple("Any").field(entries).finish(),
        }
    }
}

impl From<&str> for AllowSpec {
    fn from(host: &str) -> Self {
        AllowSpec::Host(host.to_string())
    }
}

impl From<String> for AllowSpec {
    fn from(host: String) -> Self {
        AllowSpec::Host(host)
    }
}

impl From<Regex> for AllowSpec {
    fn from(regex: Regex) -> Self {
        AllowSpec::Pattern(regex)
    }
}

impl From<Vec<AllowSpec>> for AllowSpec {
    fn from(entries: Vec<AllowSpec>) -> Self {
        AllowSpec::Any(entries)
    }
}

/// Permission settings consulted on a registry miss.
#[derive(Debug, Clone)]
pub struct NetConnectConfig {
    pub allow_net_connect: bool,
    pub allow_localhost: bool,
    pub allow: Option<AllowSpec>,
}

impl Default for NetConnectConfig {
    fn default() -> Self {
        Self {
            allow_net_connect: true,
            allow_localhost: false,
            allow: None,
        }
    }
}

/// Decide whether a call to `target` may reach the network.
///
/// Targets that do not parse are denied unless net connect is allowed.
pub fn is_connection_allowed(config: &NetConnectConfig, target: &str) -> bool {
    if config.allow_net_connect {
        return true;
    }
    match TargetUri::parse(target) {
        Ok(uri) => is_uri_allowed(config, &uri),
        Err(e) => {
            tracing::warn!(endpoint = %target, error = %e, "Denying connection to unparsable target");
            false
        }
    }
}

/// Same decision as [`is_connection_allowed`] for an already parsed target.
pub fn is_uri_allowed(config: &NetConnectConfig, uri: &TargetUri) -> bool {
    if config.allow_net_connect {
        return true;
    }
    if config.allow_localhost && uri.is_localhost() {
        return true;
    }
    config.allow.as_ref().is_some_and(|allow| allow.allows(uri))
}
