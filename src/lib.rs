//! ark-client - peer discovery, transfer signing and quorum broadcast for
//! Ark-style proof-of-stake networks
//!
//! # Architecture
//!
//! ## Transactions & Cryptography
//! - [`crypto`] - Passphrase keys, ECDSA signatures and addresses (secp256k1)
//! - [`transaction`] - Canonical transfer encoding and signing
//!
//! ## Networking
//! - [`peer`] - Peer value objects
//! - [`directory`] - Peer discovery and the trusted peer set
//! - [`broadcast`] - Fan-out submission of signed transfers
//! - [`protocol`] - Per-API-version paths, headers and payloads
//! - [`transport`] - HTTP transport
//!
//! ## Client
//! - [`client`] - High-level client
//! - [`queries`] - Balance and transaction lookups
//!
//! ## Configuration & Utilities
//! - [`config`] - Network configuration
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Transactions & Cryptography
// ============================================================================
pub mod crypto;
pub mod transaction;

// ============================================================================
// Networking
// ============================================================================
pub mod broadcast;
pub mod directory;
pub mod peer;
pub mod protocol;
pub mod transport;

// ============================================================================
// Client
// ============================================================================
pub mod client;
pub mod queries;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use client::ArkClient;
pub use error::{ClientError, Result};
