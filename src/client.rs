//! High-level client tying discovery, signing and broadcast together

use crate::broadcast::Broadcaster;
use crate::config::NetworkParameters;
use crate::crypto::KeyPair;
use crate::directory::{PeerDirectory, PeerSnapshot};
use crate::error::{ClientError, Result};
use crate::peer::Peer;
use crate::protocol::WireProtocol;
use crate::queries::{self, AccountBalance, TransactionRecord};
use crate::transaction::{SignedTransfer, TransferBuilder};
use crate::transport::{HttpTransport, ReqwestTransport};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct ArkClient {
    params: NetworkParameters,
    transport: Arc<dyn HttpTransport>,
    protocol: WireProtocol,
    directory: Arc<PeerDirectory>,
    broadcaster: Broadcaster,
}

impl ArkClient {
    /// Client over HTTP with the network's request timeout.
    pub fn new(params: NetworkParameters) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(params.request_timeout)?);
        Ok(Self::with_transport(params, transport))
    }

    pub fn with_transport(params: NetworkParameters, transport: Arc<dyn HttpTransport>) -> Self {
        let directory = Arc::new(PeerDirectory::new(transport.clone(), &params));
        let broadcaster = Broadcaster::new(transport.clone(), directory.clone(), &params);
        Self {
            protocol: WireProtocol::new(&params),
            params,
            transport,
            directory,
            broadcaster,
        }
    }

    pub fn params(&self) -> &NetworkParameters {
        &self.params
    }

    pub fn directory(&self) -> &Arc<PeerDirectory> {
        &self.directory
    }

    /// Rediscovers peers. Must succeed once before any query or broadcast.
    pub async fn update_peers(&self) -> Result<Arc<PeerSnapshot>> {
        self.directory.refresh().await
    }

    pub fn get_address(&self, passphrase: &str) -> Result<String> {
        let keypair = KeyPair::from_passphrase(passphrase)?;
        Ok(keypair.address(self.params.pub_key_hash))
    }

    /// Builds and signs a transfer stamped with the current network time
    /// and the configured fee.
    pub fn create_transfer(
        &self,
        recipient: &str,
        amount: u64,
        vendor_field: Option<&str>,
        passphrase: &str,
    ) -> Result<SignedTransfer> {
        let timestamp = self.params.timestamp_now()?;
        let mut builder = TransferBuilder::new(recipient, amount, self.params.fee, timestamp);
        if let Some(vendor_field) = vendor_field {
            builder = builder.with_vendor_field(vendor_field)?;
        }
        let keypair = KeyPair::from_passphrase(passphrase)?;
        builder.sign(&keypair, Some(self.params.pub_key_hash))
    }

    /// Signs a transfer and submits it to `nodes` trusted peers, returning
    /// the first accepted transaction id.
    pub async fn broadcast_transaction(
        &self,
        recipient: &str,
        amount: u64,
        vendor_field: Option<&str>,
        passphrase: &str,
        nodes: usize,
    ) -> Result<String> {
        let tx = self.create_transfer(recipient, amount, vendor_field, passphrase)?;
        self.broadcaster.broadcast(&tx, nodes).await
    }

    pub async fn broadcast(&self, tx: &SignedTransfer, nodes: usize) -> Result<String> {
        self.broadcaster.broadcast(tx, nodes).await
    }

    pub async fn get_balance(&self, address: &str) -> Result<AccountBalance> {
        let body = self
            .query(|p, peer| p.balance_url(peer, address))
            .await?;
        queries::parse_balance(self.protocol.api_version, body)
    }

    pub async fn get_transaction(&self, id: &str) -> Result<TransactionRecord> {
        let body = self.query(|p, peer| p.transaction_url(peer, id)).await?;
        queries::parse_transaction(self.protocol.api_version, body)
    }

    pub async fn get_transactions(&self, limit: u32, offset: u32) -> Result<Vec<TransactionRecord>> {
        let body = self
            .query(|p, peer| p.transactions_url(peer, limit, offset, None))
            .await?;
        queries::parse_transactions(self.protocol.api_version, body)
    }

    pub async fn get_transactions_by_recipient(
        &self,
        recipient: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TransactionRecord>> {
        let body = self
            .query(|p, peer| p.transactions_url(peer, limit, offset, Some(recipient)))
            .await?;
        queries::parse_transactions(self.protocol.api_version, body)
    }

    /// GET against a random trusted peer.
    async fn query<F>(&self, url: F) -> Result<Value>
    where
        F: FnOnce(&WireProtocol, &Peer) -> Result<String>,
    {
        let peer = self.directory.random_trusted_peer()?;
        let url = url(&self.protocol, &peer)?;
        let headers = self.protocol.headers(peer.api_port);
        debug!("GET {}", url);

        tokio::time::timeout(self.params.request_timeout, self.transport.get_json(&url, &headers))
            .await
            .map_err(|_| ClientError::Network(format!("{} timed out", url)))?
    }
}
