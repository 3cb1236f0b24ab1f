//! Network configuration for the Ark client
//!
//! A network file is plain TOML. Everything except the net hash, seed
//! peers and trusted peers has a default matching Ark mainnet.

use crate::error::{ClientError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_PORT: u16 = 4003;
pub const DEFAULT_P2P_PORT: u16 = 4001;

const EPOCH_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_api_version")]
    pub api_version: u8,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    pub net_hash: String,
    #[serde(default = "default_pub_key_hash")]
    pub pub_key_hash: u8,
    #[serde(default = "default_epoch")]
    pub epoch: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_fee")]
    pub fee: u64,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub peers: Vec<PeerSettings>,
    #[serde(default)]
    pub trusted_peers: Vec<PeerSettings>,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// A host/port pair as written in the network file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PeerSettings {
    pub hostname: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_p2p_port")]
    pub p2p_port: u16,
}

impl PeerSettings {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            p2p_port: DEFAULT_P2P_PORT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Drop peers whose address resolves into a private or loopback range
    #[serde(default = "default_enabled")]
    pub exclude_private: bool,
    /// Ask every discovered peer for its externally reachable API port
    #[serde(default = "default_enabled")]
    pub resolve_api_port: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            exclude_private: true,
            resolve_api_port: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// Network API generation spoken by the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

/// Validated, immutable view of a network file.
#[derive(Debug, Clone)]
pub struct NetworkParameters {
    pub api_version: ApiVersion,
    pub scheme: Scheme,
    pub net_hash: String,
    pub pub_key_hash: u8,
    pub epoch: DateTime<Utc>,
    pub version: String,
    pub fee: u64,
    pub request_timeout: Duration,
    pub seed_peers: Vec<PeerSettings>,
    pub trusted_peers: Vec<PeerSettings>,
    pub discovery: DiscoveryConfig,
}

impl NetworkParameters {
    /// Whole seconds elapsed since the network epoch.
    pub fn timestamp_now(&self) -> Result<u32> {
        self.timestamp_at(Utc::now())
    }

    pub fn timestamp_at(&self, now: DateTime<Utc>) -> Result<u32> {
        let elapsed = now.signed_duration_since(self.epoch).num_seconds();
        u32::try_from(elapsed).map_err(|_| {
            ClientError::Timestamp(format!(
                "{} is {} seconds from network epoch {}",
                now, elapsed, self.epoch
            ))
        })
    }
}

impl NetworkConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn into_parameters(self) -> Result<NetworkParameters> {
        let api_version = match self.api_version {
            1 => ApiVersion::V1,
            2 => ApiVersion::V2,
            other => {
                return Err(ClientError::Config(format!(
                    "api_version must be 1 or 2, got {}",
                    other
                )))
            }
        };

        let scheme = match self.scheme.to_ascii_lowercase().as_str() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(ClientError::Config(format!(
                    "scheme must be http or https, got {}",
                    other
                )))
            }
        };

        if self.net_hash.trim().is_empty() {
            return Err(ClientError::Config("net_hash must be set".to_string()));
        }
        if self.peers.is_empty() {
            return Err(ClientError::Config(
                "at least one seed peer must be configured".to_string(),
            ));
        }
        if self.trusted_peers.is_empty() {
            return Err(ClientError::Config(
                "at least one trusted peer must be configured".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClientError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }

        let epoch = NaiveDateTime::parse_from_str(&self.epoch, EPOCH_FORMAT)
            .map_err(|e| {
                ClientError::Config(format!("Failed to parse epoch {:?}: {}", self.epoch, e))
            })?
            .and_utc();

        Ok(NetworkParameters {
            api_version,
            scheme,
            net_hash: self.net_hash,
            pub_key_hash: self.pub_key_hash,
            epoch,
            version: self.version,
            fee: self.fee,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            seed_peers: self.peers,
            trusted_peers: self.trusted_peers,
            discovery: self.discovery,
        })
    }
}

pub fn load_network_config(path: impl AsRef<Path>) -> Result<NetworkParameters> {
    let text = fs::read_to_string(path.as_ref())?;
    NetworkConfig::from_toml_str(&text)?.into_parameters()
}

fn default_api_version() -> u8 {
    1
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_pub_key_hash() -> u8 {
    23
}

fn default_epoch() -> String {
    "2017-03-21 13:00:00".to_string()
}

fn default_version() -> String {
    "1.0.1".to_string()
}

fn default_fee() -> u64 {
    10_000_000
}

fn default_timeout() -> u64 {
    3
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_p2p_port() -> u16 {
    DEFAULT_P2P_PORT
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const MINIMAL: &str = r#"
        net_hash = "6e84d08bd299ed97c212c886c98a57e36545c8f5d645ca7eeae63a8bd62d8988"

        [[peers]]
        hostname = "5.39.9.240"
        port = 4001

        [[trusted_peers]]
        hostname = "5.39.9.240"
    "#;

    #[test]
    fn test_defaults_applied() {
        let params = NetworkConfig::from_toml_str(MINIMAL)
            .unwrap()
            .into_parameters()
            .unwrap();
        assert_eq!(params.api_version, ApiVersion::V1);
        assert_eq!(params.scheme, Scheme::Http);
        assert_eq!(params.pub_key_hash, 23);
        assert_eq!(params.fee, 10_000_000);
        assert_eq!(params.request_timeout, Duration::from_secs(3));
        assert_eq!(params.trusted_peers[0].port, DEFAULT_API_PORT);
        assert_eq!(params.trusted_peers[0].p2p_port, DEFAULT_P2P_PORT);
        assert!(params.discovery.exclude_private);
        assert!(params.discovery.resolve_api_port);
        assert_eq!(
            params.epoch,
            Utc.with_ymd_and_hms(2017, 3, 21, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_trusted_peers_rejected() {
        let text = r#"
            net_hash = "abc"
            [[peers]]
            hostname = "5.39.9.240"
        "#;
        let err = NetworkConfig::from_toml_str(text)
            .unwrap()
            .into_parameters()
            .unwrap_err();
        assert!(err.to_string().contains("trusted peer"));
    }

    #[test]
    fn test_unknown_api_version_rejected() {
        let text = format!("api_version = 3\n{}", MINIMAL);
        let err = NetworkConfig::from_toml_str(&text)
            .unwrap()
            .into_parameters()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_timestamp_is_seconds_since_epoch() {
        let params = NetworkConfig::from_toml_str(MINIMAL)
            .unwrap()
            .into_parameters()
            .unwrap();
        let now = Utc.with_ymd_and_hms(2017, 3, 21, 14, 0, 1).unwrap();
        assert_eq!(params.timestamp_at(now).unwrap(), 3601);

        let before = Utc.with_ymd_and_hms(2017, 3, 21, 12, 59, 59).unwrap();
        assert!(matches!(
            params.timestamp_at(before),
            Err(ClientError::Timestamp(_))
        ));
    }

    #[test]
    fn test_scheme() {
        let params = NetworkConfig::from_toml_str(&format!("scheme = \"https\"\n{}", MINIMAL))
            .unwrap()
            .into_parameters()
            .unwrap();
        assert_eq!(params.scheme.to_string(), "https");

        let bad = NetworkConfig::from_toml_str(&format!("scheme = \"ftp\"\n{}", MINIMAL))
            .unwrap()
            .into_parameters();
        assert!(matches!(bad, Err(ClientError::Config(_))));
    }
}
