//! Startup configuration
//!
//! Everything comes from the command line:
//!
//! ```text
//! filter-proxy <TARGET_URL> <LISTEN_ADDR> <PUBLIC_ADDR> <RULES_FILE>
//! filter-proxy http://example.com 0.0.0.0:8080 proxy.example.com:8080 allowlist.txt
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use url::Url;

use crate::proxy::redirect::HostPort;

#[derive(Debug, Parser)]
#[command(
    name = "filter-proxy",
    version,
    about = "Reverse proxy that forwards only requests allowed by a rule file",
    after_help = "Example: filter-proxy http://example.com 0.0.0.0:8080 proxy.example.com:8080 allowlist.txt"
)]
pub struct Cli {
    /// Upstream URL to forward allowed requests to
    pub target_url: String,

    /// Address to listen on, as host:port
    pub listen_addr: String,

    /// Public host:port substituted into upstream redirects
    pub public_addr: String,

    /// Rule file with one `<ALLOW|DENY> <METHOD> <PATH>` rule per line
    pub rules_file: PathBuf,

    /// Seconds to wait for the upstream connection
    #[arg(long, default_value_t = 5)]
    pub connect_timeout: u64,

    /// Seconds to wait for the upstream response
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid target URL '{url}'")]
    InvalidTargetUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported target URL '{0}': only http:// targets with a host are supported")]
    UnsupportedTarget(String),

    #[error("invalid listen address '{0}': expected host:port")]
    InvalidListenAddress(String),

    #[error(transparent)]
    InvalidPublicAddress(#[from] crate::proxy::redirect::RedirectError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub target: Url,
    pub listen_addr: String,
    pub public_addr: HostPort,
    pub rules_path: PathBuf,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Config {
    /// Validates parsed command-line arguments.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let target = Url::parse(&cli.target_url).map_err(|source| ConfigError::InvalidTargetUrl {
            url: cli.target_url.clone(),
            source,
        })?;

        if target.scheme() != "http" || target.host_str().is_none() {
            return Err(ConfigError::UnsupportedTarget(cli.target_url));
        }

        let valid_listen = cli
            .listen_addr
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid_listen {
            return Err(ConfigError::InvalidListenAddress(cli.listen_addr));
        }

        let public_addr: HostPort = cli.public_addr.parse()?;

        Ok(Self {
            target,
            listen_addr: cli.listen_addr,
            public_addr,
            rules_path: cli.rules_file,
            connect_timeout: Duration::from_secs(cli.connect_timeout),
            request_timeout: Duration::from_secs(cli.request_timeout),
        })
    }
}
