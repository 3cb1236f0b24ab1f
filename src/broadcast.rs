//! Quorum broadcast of a signed transfer
//!
//! The transfer goes to `fanout` trusted peers at once, one task per peer.
//! Completions are collected through a single `JoinSet` in the order they
//! finish; the first acceptance observed there decides the returned id.
//! Slow siblings are never cancelled: resubmitting a valid signed
//! transaction is harmless.

use crate::config::NetworkParameters;
use crate::directory::PeerDirectory;
use crate::error::{ClientError, PeerFailure, Result};
use crate::peer::Peer;
use crate::protocol::{SubmissionReply, WireProtocol};
use crate::transaction::SignedTransfer;
use crate::transport::HttpTransport;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Result of submitting to one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted(String),
    Rejected(String),
    Unreachable(String),
}

/// Every contacted peer with its outcome, in completion order.
#[derive(Debug, Clone, Default)]
pub struct BroadcastReport {
    pub outcomes: Vec<(Peer, Outcome)>,
}

impl BroadcastReport {
    /// Id from the first peer that accepted, by completion order.
    pub fn first_accepted(&self) -> Option<&str> {
        self.outcomes.iter().find_map(|(_, outcome)| match outcome {
            Outcome::Accepted(id) => Some(id.as_str()),
            _ => None,
        })
    }

    pub fn failures(&self) -> Vec<PeerFailure> {
        self.outcomes
            .iter()
            .filter_map(|(peer, outcome)| {
                let reason = match outcome {
                    Outcome::Accepted(_) => return None,
                    Outcome::Rejected(reason) => format!("rejected: {}", reason),
                    Outcome::Unreachable(reason) => format!("unreachable: {}", reason),
                };
                Some(PeerFailure {
                    peer: peer.addr(),
                    reason,
                })
            })
            .collect()
    }
}

/// Shuffles the pool and keeps the first `fanout` peers; a pool no larger
/// than `fanout` is used whole.
pub fn select_targets<R: Rng + ?Sized>(pool: &HashSet<Peer>, fanout: usize, rng: &mut R) -> Vec<Peer> {
    let mut targets: Vec<Peer> = pool.iter().cloned().collect();
    // HashSet order is arbitrary; sort first so a seeded rng is reproducible
    targets.sort_by(|a, b| {
        (&a.ip, a.api_port, a.p2p_port).cmp(&(&b.ip, b.api_port, b.p2p_port))
    });
    targets.shuffle(rng);
    targets.truncate(fanout);
    targets
}

pub struct Broadcaster {
    transport: Arc<dyn HttpTransport>,
    protocol: WireProtocol,
    directory: Arc<PeerDirectory>,
    timeout: Duration,
}

impl Broadcaster {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        directory: Arc<PeerDirectory>,
        params: &NetworkParameters,
    ) -> Self {
        Self {
            transport,
            protocol: WireProtocol::new(params),
            directory,
            timeout: params.request_timeout,
        }
    }

    /// Submits `tx` to up to `fanout` trusted peers and returns the id the
    /// first accepting peer reported.
    pub async fn broadcast(&self, tx: &SignedTransfer, fanout: usize) -> Result<String> {
        let report = self.broadcast_report(tx, fanout).await?;
        match report.first_accepted() {
            Some(id) => {
                if id != tx.id() {
                    warn!("Node reported id {} for locally computed id {}", id, tx.id());
                }
                Ok(id.to_string())
            }
            None => Err(ClientError::BroadcastRejected(report.failures())),
        }
    }

    /// Submits `tx` and returns every peer's outcome without resolving them.
    pub async fn broadcast_report(
        &self,
        tx: &SignedTransfer,
        fanout: usize,
    ) -> Result<BroadcastReport> {
        if fanout == 0 {
            return Err(ClientError::InvalidFanout);
        }

        let snapshot = self.directory.snapshot();
        if snapshot.trusted.is_empty() {
            return Err(ClientError::EmptyPeerSet);
        }
        let targets = select_targets(&snapshot.trusted, fanout, &mut rand::thread_rng());
        info!(
            "Broadcasting transaction {} to {} peers: {}",
            tx.id(),
            targets.len(),
            targets
                .iter()
                .map(|p| p.ip.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let envelope = Arc::new(self.protocol.envelope(tx));
        let mut submissions = JoinSet::new();
        let mut pending = HashMap::new();
        for peer in targets {
            let transport = self.transport.clone();
            let protocol = self.protocol.clone();
            let envelope = envelope.clone();
            let timeout = self.timeout;
            let target = peer.clone();
            let handle = submissions.spawn(async move {
                submit(transport.as_ref(), &protocol, &target, &envelope, timeout).await
            });
            pending.insert(handle.id(), peer);
        }

        let mut report = BroadcastReport::default();
        while let Some(joined) = submissions.join_next_with_id().await {
            let (task, outcome) = match joined {
                Ok((task, outcome)) => (task, outcome),
                Err(e) => {
                    warn!("Submission task failed: {}", e);
                    (e.id(), Outcome::Unreachable(format!("submission task failed: {}", e)))
                }
            };
            let Some(peer) = pending.remove(&task) else {
                continue;
            };
            if !matches!(outcome, Outcome::Accepted(_)) {
                info!("Failed to broadcast transaction to node {}: {:?}", peer, outcome);
            }
            report.outcomes.push((peer, outcome));
        }
        Ok(report)
    }
}

async fn submit(
    transport: &dyn HttpTransport,
    protocol: &WireProtocol,
    peer: &Peer,
    envelope: &Value,
    timeout: Duration,
) -> Outcome {
    let url = protocol.submission_url(peer);
    let headers = protocol.headers(peer.api_port);

    let body = match tokio::time::timeout(timeout, transport.post_json(&url, &headers, envelope)).await {
        Err(_) => return Outcome::Unreachable(format!("timed out after {:?}", timeout)),
        // A status code means the node answered and refused
        Ok(Err(ClientError::Status { status, body })) => {
            return match protocol.parse_submission(&body) {
                Ok(SubmissionReply::Rejected(reason)) => Outcome::Rejected(reason),
                _ => Outcome::Rejected(format!("HTTP {}: {}", status, body)),
            };
        }
        Ok(Err(e)) => return Outcome::Unreachable(e.to_string()),
        Ok(Ok(body)) => body,
    };

    match protocol.parse_submission(&body) {
        Ok(SubmissionReply::Accepted(id)) => Outcome::Accepted(id),
        Ok(SubmissionReply::Rejected(reason)) => Outcome::Rejected(reason),
        Err(e) => Outcome::Rejected(e.to_string()),
    }
}
