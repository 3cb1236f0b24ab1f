//! Peer directory: discovery, trusted-peer reconciliation and selection
//!
//! A refresh queries every seed host concurrently, one task per seed, and
//! folds the per-seed results into a fresh [`PeerSnapshot`]. The snapshot
//! is swapped in whole, so readers see either the old known/trusted pair
//! or the new one, never a mix. Refreshes are serialized.

use crate::config::{DiscoveryConfig, NetworkParameters, PeerSettings};
use crate::error::{ClientError, Result};
use crate::peer::{is_non_public, Peer, PeerDescriptor};
use crate::protocol::WireProtocol;
use crate::transport::HttpTransport;
use parking_lot::RwLock;
use rand::seq::IteratorRandom;
use std::collections::HashSet;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Known and trusted peers as published by one successful refresh.
#[derive(Debug, Clone, Default)]
pub struct PeerSnapshot {
    pub known: HashSet<Peer>,
    pub trusted: HashSet<Peer>,
}

pub struct PeerDirectory {
    discoverer: Discoverer,
    seeds: Vec<PeerSettings>,
    trusted_settings: Vec<PeerSettings>,
    snapshot: RwLock<Arc<PeerSnapshot>>,
    refresh_lock: Mutex<()>,
}

impl PeerDirectory {
    pub fn new(transport: Arc<dyn HttpTransport>, params: &NetworkParameters) -> Self {
        Self {
            discoverer: Discoverer {
                transport,
                protocol: WireProtocol::new(params),
                options: params.discovery.clone(),
                timeout: params.request_timeout,
            },
            seeds: params.seed_peers.clone(),
            trusted_settings: params.trusted_peers.clone(),
            snapshot: RwLock::new(Arc::new(PeerSnapshot::default())),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current published state. Empty until the first successful refresh.
    pub fn snapshot(&self) -> Arc<PeerSnapshot> {
        self.snapshot.read().clone()
    }

    /// Refreshes from the configured seed and trusted peers.
    pub async fn refresh(&self) -> Result<Arc<PeerSnapshot>> {
        self.refresh_from(&self.seeds, &self.trusted_settings).await
    }

    /// Rediscovers the network and publishes a new snapshot.
    ///
    /// On error nothing is published and the previous snapshot stays live.
    pub async fn refresh_from(
        &self,
        seeds: &[PeerSettings],
        trusted_settings: &[PeerSettings],
    ) -> Result<Arc<PeerSnapshot>> {
        let _guard = self.refresh_lock.lock().await;

        let mut tasks = JoinSet::new();
        for seed in seeds.iter().cloned() {
            let discoverer = self.discoverer.clone();
            tasks.spawn(async move {
                let result = discoverer.discover_from_seed(&seed).await;
                (seed, result)
            });
        }

        let mut known = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((seed, Ok(peers))) => {
                    debug!("Seed {}:{} reported {} usable peers", seed.hostname, seed.port, peers.len());
                    known.extend(peers);
                }
                Ok((seed, Err(e))) => {
                    warn!("Ignoring seed {}:{}: {}", seed.hostname, seed.port, e);
                }
                Err(e) => warn!("Discovery task failed: {}", e),
            }
        }

        if known.is_empty() {
            warn!("No peers available to connect to the network");
            return Err(ClientError::DiscoveryFailure { seeds: seeds.len() });
        }

        let trusted = match_trusted(&known, trusted_settings);
        if trusted.is_empty() {
            warn!("No trusted peers available to connect to the network");
            return Err(ClientError::NoTrustedPeers {
                configured: trusted_settings.len(),
            });
        }

        info!("Updated peers: {} known, {} trusted", known.len(), trusted.len());
        debug!(
            "Trusted peers: {}",
            serde_json::to_string(&trusted).unwrap_or_default()
        );

        let snapshot = Arc::new(PeerSnapshot { known, trusted });
        *self.snapshot.write() = snapshot.clone();
        Ok(snapshot)
    }

    pub fn random_peer(&self) -> Result<Peer> {
        pick_random(&self.snapshot().known)
    }

    pub fn random_trusted_peer(&self) -> Result<Peer> {
        pick_random(&self.snapshot().trusted)
    }
}

/// Uniformly random member of `peers`.
pub fn pick_random(peers: &HashSet<Peer>) -> Result<Peer> {
    peers
        .iter()
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or(ClientError::EmptyPeerSet)
}

/// For every configured trusted host, the discovered peer with the same
/// address and API port. When a host shows up on several P2P ports the
/// configured one wins, then the lowest. Hosts with no live match are
/// dropped.
pub fn match_trusted(candidates: &HashSet<Peer>, settings: &[PeerSettings]) -> HashSet<Peer> {
    let mut trusted = HashSet::new();
    for setting in settings {
        let found = candidates
            .iter()
            .filter(|p| p.ip == setting.hostname && p.api_port == setting.port)
            .min_by_key(|p| (p.p2p_port != setting.p2p_port, p.p2p_port));
        match found {
            Some(peer) => {
                trusted.insert(peer.clone());
            }
            None => debug!(
                "Trusted peer {}:{} not seen during discovery",
                setting.hostname, setting.port
            ),
        }
    }
    trusted
}

/// Everything a discovery task needs, cheap to clone into each task.
#[derive(Clone)]
struct Discoverer {
    transport: Arc<dyn HttpTransport>,
    protocol: WireProtocol,
    options: DiscoveryConfig,
    timeout: Duration,
}

impl Discoverer {
    async fn bounded<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ClientError::Network(format!("{} timed out after {:?}", what, self.timeout)))?
    }

    async fn discover_from_seed(&self, seed: &PeerSettings) -> Result<Vec<Peer>> {
        let url = self.protocol.peer_list_url(&seed.hostname, seed.port);
        let headers = self.protocol.headers(seed.port);
        let body = self
            .bounded(&url, self.transport.get_json(&url, &headers))
            .await?;

        let mut candidates = Vec::new();
        for descriptor in self.protocol.parse_peer_list(body)? {
            if !descriptor.is_healthy() {
                continue;
            }
            if self.options.exclude_private && !self.is_public(&descriptor).await {
                debug!("Skipping non-public peer {}", descriptor.ip);
                continue;
            }
            candidates.push(descriptor);
        }

        if !self.options.resolve_api_port {
            return Ok(candidates.into_iter().map(PeerDescriptor::into_peer).collect());
        }

        let mut lookups = JoinSet::new();
        for descriptor in candidates {
            let discoverer = self.clone();
            lookups.spawn(async move { discoverer.resolve_api_port(descriptor).await });
        }

        let mut peers = Vec::new();
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok(Ok(peer)) => peers.push(peer),
                Ok(Err(e)) => warn!("Discarding peer: {}", e),
                Err(e) => warn!("API port lookup failed: {}", e),
            }
        }
        Ok(peers)
    }

    async fn resolve_api_port(&self, descriptor: PeerDescriptor) -> Result<Peer> {
        let url = self.protocol.config_url(&descriptor.ip, descriptor.port);
        let api_port = self
            .bounded(&url, self.transport.get_json(&url, &Vec::new()))
            .await
            .and_then(|body| self.protocol.parse_api_port(&body))
            .map_err(|e| {
                ClientError::Network(format!("{} request failed: {}", descriptor.ip, e))
            })?;
        Ok(descriptor.into_peer_with_api_port(api_port))
    }

    /// Resolves the peer's address and checks it is not private or loopback.
    /// Addresses that do not resolve are treated as not public.
    async fn is_public(&self, descriptor: &PeerDescriptor) -> bool {
        if let Ok(ip) = descriptor.ip.parse::<IpAddr>() {
            return !is_non_public(ip);
        }
        let lookup = tokio::time::timeout(
            self.timeout,
            lookup_host((descriptor.ip.as_str(), descriptor.port)),
        )
        .await;
        match lookup {
            Ok(Ok(mut addrs)) => addrs.next().is_some_and(|addr| !is_non_public(addr.ip())),
            _ => false,
        }
    }
}
