//! Turning the user's destination argument into something we can dial.

use crate::error::{Error, Result};
use std::fmt;
use std::net::Ipv6Addr;

/// Port assumed when the destination does not name one.
pub const DEFAULT_PORT: u16 = 443;

/// A resolved `(host, port)` pair plus an optional SNI override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Host name or IP literal to connect to (no brackets for IPv6).
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Name sent in the server-name extension and expected in the leaf certificate,
    /// when it differs from `host`.
    pub server_name: Option<String>,
}

impl ConnectionTarget {
    /// Creates a target without an SNI override.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            server_name: None,
        }
    }

    /// Parses `host`, `host:port`, `[v6]:port`, `http://host[:port]/...` or
    /// `https://host[:port]/...`.
    ///
    /// Only the authority of a URL is used. When no port is given [`DEFAULT_PORT`] is
    /// assumed, whatever the URL scheme.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::Usage(
                "expected <host|host:port|http[s]://url>".to_owned(),
            ));
        }

        let authority = if has_http_scheme(input) {
            url::Url::parse(input).map_err(|e| target_error(input, e.to_string()))?;
            url_authority(input)
        } else {
            input
        };

        let (host, port) = split_authority(authority).map_err(|reason| target_error(input, reason))?;
        Ok(Self::new(host, port))
    }

    /// Chainable setter for the SNI override. Empty names are ignored.
    pub fn with_server_name(mut self, server_name: Option<String>) -> Self {
        self.server_name = server_name.filter(|name| !name.is_empty());
        self
    }

    /// The identity presented in the handshake and checked against the leaf.
    pub fn server_name(&self) -> &str {
        self.server_name.as_deref().unwrap_or(&self.host)
    }

    /// `host:port` in a form accepted by [`std::net::ToSocketAddrs`].
    pub fn addr(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn has_http_scheme(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

// `Url` drops ports equal to the scheme default, so the authority is sliced out of
// the input text instead.
fn url_authority(input: &str) -> &str {
    let rest = input.split_once("://").map_or(input, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port)
}

fn split_authority(authority: &str) -> std::result::Result<(String, u16), String> {
    if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, rest) = bracketed
            .split_once(']')
            .ok_or_else(|| "unterminated IPv6 literal".to_owned())?;
        host.parse::<Ipv6Addr>()
            .map_err(|e| format!("invalid IPv6 address '{host}': {e}"))?;
        let port = match rest {
            "" => DEFAULT_PORT,
            _ => match rest.strip_prefix(':') {
                Some(port) => parse_port(port)?,
                None => return Err(format!("unexpected '{rest}' after IPv6 literal")),
            },
        };
        return Ok((host.to_owned(), port));
    }

    // A bare IPv6 literal has several colons and cannot carry a port.
    if authority.parse::<Ipv6Addr>().is_ok() {
        return Ok((authority.to_owned(), DEFAULT_PORT));
    }

    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, parse_port(port)?),
        None => (authority, DEFAULT_PORT),
    };

    if host.is_empty() {
        return Err("missing host".to_owned());
    }

    Ok((host.to_owned(), port))
}

fn parse_port(port: &str) -> std::result::Result<u16, String> {
    port.parse::<u16>()
        .map_err(|e| format!("invalid port '{port}': {e}"))
}

fn target_error(input: &str, reason: String) -> Error {
    Error::Target {
        input: input.to_owned(),
        reason,
    }
}
