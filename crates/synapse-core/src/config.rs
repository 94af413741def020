//! Node configuration resolution.
//!
//! A node starts from a partially filled [`NodeConfig`] (from a file, the
//! environment, or a CLI layer owned by the host process) and resolves it
//! once into a [`ResolvedConfig`] before any axon or dendrite is built.

use rand::Rng;
use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;
use tracing::info;

/// Lower bound of the random fallback port range.
pub const RANDOM_PORT_MIN: u16 = 6000;
/// Upper bound (inclusive) of the random fallback port range.
pub const RANDOM_PORT_MAX: u16 = 60000;
/// Default metagraph cache size.
pub const DEFAULT_METAGRAPH_SIZE: usize = 100_000;
/// Boot peer used when none is configured.
pub const DEFAULT_BOOTSTRAP: &str = "165.227.216.95:8080";

/// Prefix of the environment variables read by [`NodeConfig::from_env`].
pub const ENV_PREFIX: &str = "SYNAPSE";

/// Configuration error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid value
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            message: message.into(),
        }
    }
}

/// Unresolved node configuration; every field may be absent.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    pub axon_port: Option<u16>,
    pub metagraph_port: Option<u16>,
    pub metagraph_size: Option<usize>,
    pub bootstrap: Option<String>,
    pub identity: Option<String>,
    pub remote_ip: Option<String>,
    pub chain_endpoint: Option<String>,
}

impl NodeConfig {
    /// Read `SYNAPSE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, using the `SYNAPSE_*` key names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}_{name}")).filter(|value| !value.trim().is_empty())
        };

        let mut config = NodeConfig::default();
        if let Some(val) = get("AXON_PORT") {
            config.axon_port = Some(parse_port("axon_port", &val)?);
        }
        if let Some(val) = get("METAGRAPH_PORT") {
            config.metagraph_port = Some(parse_port("metagraph_port", &val)?);
        }
        if let Some(val) = get("METAGRAPH_SIZE") {
            let size = val
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("metagraph_size", format!("not a count: {val}")))?;
            config.metagraph_size = Some(size);
        }
        config.bootstrap = get("BOOTSTRAP");
        config.identity = get("IDENTITY");
        config.remote_ip = get("REMOTE_IP");
        config.chain_endpoint = get("CHAIN_ENDPOINT");
        Ok(config)
    }

    /// Fill every absent field with its default and validate the result.
    ///
    /// Randomness (fallback ports, fresh identity) is drawn only from `rng`.
    pub fn resolve<R: Rng>(self, rng: &mut R) -> Result<ResolvedConfig, ConfigError> {
        let axon_port = self
            .axon_port
            .unwrap_or_else(|| rng.gen_range(RANDOM_PORT_MIN..=RANDOM_PORT_MAX));
        let metagraph_port = self
            .metagraph_port
            .unwrap_or_else(|| rng.gen_range(RANDOM_PORT_MIN..=RANDOM_PORT_MAX));

        let metagraph_size = self.metagraph_size.unwrap_or(DEFAULT_METAGRAPH_SIZE);
        if metagraph_size == 0 {
            return Err(ConfigError::invalid("metagraph_size", "must be positive"));
        }

        let bootstrap = self
            .bootstrap
            .unwrap_or_else(|| DEFAULT_BOOTSTRAP.to_string());
        validate_host_port(&bootstrap)?;

        let identity = match self.identity {
            Some(raw) => Identity::parse(&raw)?,
            None => Identity::generate(rng),
        };

        let remote_ip = self
            .remote_ip
            .ok_or(ConfigError::MissingField("remote_ip"))?;
        let remote_ip = remote_ip
            .trim()
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::invalid("remote_ip", e.to_string()))?;

        Ok(ResolvedConfig {
            axon_port,
            metagraph_port,
            metagraph_size,
            bootstrap,
            identity,
            remote_ip,
            chain_endpoint: self.chain_endpoint,
        })
    }
}

/// A node's network identity: 32 bytes rendered as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub const BYTES: usize = 32;

    /// Draw a fresh identity from `rng`.
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; Self::BYTES];
        rng.fill(&mut bytes[..]);
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Accept a hex identity of the right length.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.len() != Self::BYTES * 2 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::invalid(
                "identity",
                format!("expected {} hex characters", Self::BYTES * 2),
            ));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({}..)", &self.0[..8.min(self.0.len())])
    }
}

/// Fully resolved node configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub axon_port: u16,
    pub metagraph_port: u16,
    pub metagraph_size: usize,
    pub bootstrap: String,
    pub identity: Identity,
    pub remote_ip: IpAddr,
    pub chain_endpoint: Option<String>,
}

impl ResolvedConfig {
    /// Emit the resolved values once at startup.
    pub fn log_summary(&self) {
        info!(
            identity = %self.identity,
            axon_port = self.axon_port,
            metagraph_port = self.metagraph_port,
            metagraph_size = self.metagraph_size,
            bootstrap = %self.bootstrap,
            remote_ip = %self.remote_ip,
            chain_endpoint = self.chain_endpoint.as_deref().unwrap_or("-"),
            "node configuration resolved"
        );
    }
}

fn parse_port(field: &'static str, raw: &str) -> Result<u16, ConfigError> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ConfigError::invalid(field, format!("not a port: {raw}"))),
        Ok(port) => Ok(port),
    }
}

fn validate_host_port(addr: &str) -> Result<(), ConfigError> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::invalid("bootstrap", format!("expected host:port, got {addr}")))?;
    if host.is_empty() {
        return Err(ConfigError::invalid("bootstrap", "empty host"));
    }
    parse_port("bootstrap", port).map(|_| ())
}
