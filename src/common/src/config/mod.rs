use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use url::Url;

/// Default configuration file, looked up in the working directory
pub const CONFIG_FILE: &str = "ast-server.toml";

/// Prefix for environment variable overrides, nested keys are split on `__`
pub const ENV_PREFIX: &str = "AST_SERVER__";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid listen address '{addr}': {reason}")]
    InvalidListenAddr { addr: String, reason: String },
    #[error("invalid upstream URL '{url}': {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },
}

/// HTTP listener configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on, either `host:port` or `:port` for all interfaces
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: String::from(":8000"),
        }
    }
}

/// Upstream Prometheus server that `/api/v1/*` requests are forwarded to
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream server
    pub url: String,
    /// Optional timeout for a whole proxied request; unset means the transport default
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://demo.robustperception.io:9090/"),
            timeout: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// HTTP listener configuration
    pub server: ServerConfig,
    /// Upstream proxy configuration
    pub upstream: UpstreamConfig,
}

impl Configuration {
    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
    }

    /// Load configuration from defaults, `ast-server.toml` and the environment
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Self::figment()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// Load configuration from an explicit TOML file instead of the default one
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        let config = Self::figment()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// Apply command line overrides on top of the loaded configuration
    pub fn with_overrides(mut self, listen_addr: Option<String>, upstream_url: Option<String>) -> Self {
        if let Some(addr) = listen_addr {
            self.server.listen_addr = addr;
        }
        if let Some(url) = upstream_url {
            self.upstream.url = url;
        }
        self
    }

    /// Resolve the listen address, expanding the `:port` shorthand to all interfaces
    pub fn listen_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_addr(&self.server.listen_addr)
    }

    /// Parse and validate the upstream base URL
    pub fn upstream_url(&self) -> Result<Url, ConfigError> {
        parse_upstream_url(&self.upstream.url)
    }
}

pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidListenAddr {
        addr: addr.to_string(),
        reason,
    };

    if let Some(port) = addr.strip_prefix(':') {
        let port = port.parse::<u16>().map_err(|e| invalid(e.to_string()))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }

    addr.parse::<SocketAddr>()
        .map_err(|e| invalid(e.to_string()))
}

pub fn parse_upstream_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidUpstreamUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url)
}
