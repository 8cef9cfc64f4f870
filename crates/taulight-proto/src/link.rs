//! Link descriptors: `tau://host[:port]?key=<hex>`.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Why a link failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Link does not start with `tau://`
    #[error("link must start with {}", Link::SCHEME)]
    Scheme,

    /// Nothing between the scheme and the port or query
    #[error("link has no host")]
    EmptyHost,

    /// Port is not a number in 1..=65535
    #[error("invalid port: {0:?}")]
    InvalidPort(String),

    /// No `key=` query parameter
    #[error("link has no key")]
    MissingKey,

    /// Key is not valid hex
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Parsed hub link: where to connect and which key the hub must present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    host: String,
    port: u16,
    key: Vec<u8>,
}

impl Link {
    /// Scheme prefix.
    pub const SCHEME: &'static str = "tau://";

    /// Port used when the link does not name one.
    pub const DEFAULT_PORT: u16 = 52525;

    /// Build a link from parts.
    pub fn new(host: impl Into<String>, port: u16, key: Vec<u8>) -> Self {
        Self { host: host.into(), port, key }
    }

    /// Host name or address, without IPv6 brackets.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Hub key material.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Link {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.trim().strip_prefix(Self::SCHEME).ok_or(LinkError::Scheme)?;
        let (authority, query) = rest.split_once('?').unwrap_or((rest, ""));
        let (host, port) = split_authority(authority.trim_end_matches('/'))?;

        let key = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("key="))
            .filter(|key| !key.is_empty())
            .ok_or(LinkError::MissingKey)?;
        let key = hex::decode(key).map_err(|e| LinkError::InvalidKey(e.to_string()))?;

        Ok(Self { host, port, key })
    }
}

fn split_authority(authority: &str) -> Result<(String, u16), LinkError> {
    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed.split_once(']').ok_or(LinkError::EmptyHost)?;
        (host, after.strip_prefix(':'))
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(LinkError::EmptyHost);
    }

    let port = match port {
        None => Link::DEFAULT_PORT,
        Some(raw) => match raw.parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => return Err(LinkError::InvalidPort(raw.to_string())),
        },
    };

    Ok((host.to_string(), port))
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}?key={}", Self::SCHEME, self.endpoint(), hex::encode(&self.key))
    }
}
