//! Location header rewriting
//!
//! When the upstream redirects to itself, the client must be sent back to the
//! proxy instead. The redirect target is resolved against the upstream URL;
//! if its authority is the upstream's own, it is replaced by the public
//! address and the scheme is forced to `http`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Scheme used for rewritten redirects. The proxy only listens in plain HTTP.
pub const PUBLIC_SCHEME: &str = "http";

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("invalid address '{0}': expected host[:port]")]
    InvalidAddress(String),

    #[error("cannot resolve redirect target '{location}'")]
    Unresolvable {
        location: String,
        #[source]
        source: url::ParseError,
    },

    #[error("cannot rewrite '{0}' to the public address")]
    Unrewritable(String),
}

/// A host with an optional explicit port.
///
/// Default ports are elided, so `example.com` and `example.com:80` are the
/// same address when the scheme is `http`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    pub host: String,
    pub port: Option<u16>,
}

impl HostPort {
    /// Extracts the authority of an absolute URL.
    pub fn from_url(url: &Url) -> Option<Self> {
        Some(Self {
            host: url.host_str()?.to_string(),
            port: url.port(),
        })
    }
}

impl FromStr for HostPort {
    type Err = RedirectError;

    /// Parses `host[:port]`, normalising it the way a URL authority would be.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RedirectError::InvalidAddress(s.to_string());

        if s.is_empty() || s.contains(['/', '?', '#', '@']) {
            return Err(invalid());
        }

        let url = Url::parse(&format!("{PUBLIC_SCHEME}://{s}")).map_err(|_| invalid())?;
        Self::from_url(&url).ok_or_else(invalid)
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

/// Rewrites upstream self-redirects to point at the proxy.
#[derive(Debug, Clone)]
pub struct RedirectRewriter {
    target: Url,
    target_addr: Option<HostPort>,
    public_addr: HostPort,
}

impl RedirectRewriter {
    pub fn new(target: Url, public_addr: HostPort) -> Self {
        let target_addr = HostPort::from_url(&target);
        Self {
            target,
            target_addr,
            public_addr,
        }
    }

    /// Returns the value to send in place of `location`.
    ///
    /// `Ok(None)` means the header should be left as it is because the
    /// redirect points somewhere other than the upstream.
    pub fn rewrite(&self, location: &str) -> Result<Option<String>, RedirectError> {
        let mut resolved = self
            .target
            .join(location)
            .map_err(|source| RedirectError::Unresolvable {
                location: location.to_string(),
                source,
            })?;

        if HostPort::from_url(&resolved) != self.target_addr {
            return Ok(None);
        }

        let unrewritable = || RedirectError::Unrewritable(location.to_string());

        resolved
            .set_scheme(PUBLIC_SCHEME)
            .map_err(|_| unrewritable())?;
        resolved
            .set_host(Some(&self.public_addr.host))
            .map_err(|_| unrewritable())?;
        resolved
            .set_port(self.public_addr.port)
            .map_err(|_| unrewritable())?;

        Ok(Some(resolved.to_string()))
    }
}
