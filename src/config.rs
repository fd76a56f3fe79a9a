use crate::{DhError, Group, Result};

use std::net::SocketAddr;

pub const DEFAULT_MESSAGE: &str = "Go Ninja, Go Ninja, GO: Go Ninja, Go Ninja, GO!";

/// Addresses and parameters for running the three roles side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub responder_addr: SocketAddr,
    pub relay_addr: SocketAddr,
    pub group: Group,
    pub message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            responder_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            relay_addr: SocketAddr::from(([127, 0, 0, 1], 9001)),
            group: Group::modp1536(),
            message: DEFAULT_MESSAGE.to_string(),
        }
    }
}

impl Config {
    /// Reads `DH_RESPONDER_ADDR`, `DH_RELAY_ADDR`, `DH_GROUP` and `DH_MESSAGE`,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(addr) = lookup("DH_RESPONDER_ADDR") {
            config.responder_addr = parse_addr("DH_RESPONDER_ADDR", &addr)?;
        }
        if let Some(addr) = lookup("DH_RELAY_ADDR") {
            config.relay_addr = parse_addr("DH_RELAY_ADDR", &addr)?;
        }
        if let Some(group) = lookup("DH_GROUP") {
            config.group = match group.to_ascii_lowercase().as_str() {
                "modp1536" => Group::modp1536(),
                "small" => Group::small(),
                other => {
                    return Err(DhError::Config(format!(
                        "DH_GROUP must be 'modp1536' or 'small', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(message) = lookup("DH_MESSAGE") {
            config.message = message;
        }
        Ok(config)
    }
}

fn parse_addr(name: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e| DhError::Config(format!("{} '{}': {}", name, value, e)))
}
