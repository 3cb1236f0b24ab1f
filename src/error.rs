//! Error types for the Ark client

use std::fmt;
use thiserror::Error;

/// Why a single peer did not accept a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerFailure {
    /// `host:port` of the peer that was contacted
    pub peer: String,
    pub reason: String,
}

impl fmt::Display for PeerFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.peer, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Peer discovery failed: no peers reachable from {seeds} seed hosts")]
    DiscoveryFailure { seeds: usize },

    #[error("None of the {configured} configured trusted peers matched a reachable peer")]
    NoTrustedPeers { configured: usize },

    #[error("Peer set is empty; refresh the peer directory first")]
    EmptyPeerSet,

    #[error("Vendor field is {len} bytes, maximum is 64")]
    MemoTooLong { len: usize },

    #[error("Broadcast failed because no nodes accepted transaction: {}", join_failures(.0))]
    BroadcastRejected(Vec<PeerFailure>),

    #[error("Fanout must be at least 1")]
    InvalidFanout,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Timestamp error: {0}")]
    Timestamp(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Node answered with status {status}: {body}")]
    Status { status: u16, body: serde_json::Value },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn join_failures(failures: &[PeerFailure]) -> String {
    if failures.is_empty() {
        return "no peers contacted".to_string();
    }
    failures
        .iter()
        .map(PeerFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ClientError>;
