//! Wire details that differ between node API versions
//!
//! Paths, headers, request envelopes and response shapes live here so the
//! discovery and broadcast code stays version-agnostic.

use crate::config::{ApiVersion, NetworkParameters, Scheme};
use crate::error::{ClientError, Result};
use crate::peer::{Peer, PeerDescriptor};
use crate::transaction::SignedTransfer;
use crate::transport::Headers;
use reqwest::Url;
use serde_json::{json, Value};

const CORE_API_PLUGIN: &str = "@arkecosystem/core-api";

/// What a node said about a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionReply {
    Accepted(String),
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct WireProtocol {
    pub api_version: ApiVersion,
    scheme: Scheme,
    net_hash: String,
    version: String,
    network: u8,
}

impl WireProtocol {
    pub fn new(params: &NetworkParameters) -> Self {
        Self {
            api_version: params.api_version,
            scheme: params.scheme,
            net_hash: params.net_hash.clone(),
            version: params.version.clone(),
            network: params.pub_key_hash,
        }
    }

    pub fn base_url(&self, host: &str, port: u16) -> String {
        format!("{}://{}:{}", self.scheme, host, port)
    }

    pub fn peer_url(&self, peer: &Peer) -> String {
        self.base_url(&peer.ip, peer.api_port)
    }

    /// Network identification headers for a request to `port`.
    pub fn headers(&self, port: u16) -> Headers {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        match self.api_version {
            ApiVersion::V1 => {
                headers.push(("nethash".to_string(), self.net_hash.clone()));
                headers.push(("version".to_string(), self.version.clone()));
                headers.push(("port".to_string(), port.to_string()));
            }
            ApiVersion::V2 => {
                headers.push(("API-Version".to_string(), "2".to_string()));
            }
        }
        headers
    }

    pub fn peer_list_url(&self, host: &str, port: u16) -> String {
        format!("{}/api/peers", self.base_url(host, port))
    }

    /// Peer listing under `peers` (V1) or `data` (V2). A listing with any
    /// undecodable entry is rejected as a whole.
    pub fn parse_peer_list(&self, body: Value) -> Result<Vec<PeerDescriptor>> {
        let list = match self.api_version {
            ApiVersion::V1 => field(body, "peers"),
            ApiVersion::V2 => field(body, "data"),
        }?;
        serde_json::from_value(list)
            .map_err(|e| ClientError::MalformedResponse(format!("peer list: {}", e)))
    }

    pub fn config_url(&self, host: &str, port: u16) -> String {
        format!("{}/config", self.base_url(host, port))
    }

    /// API port a node advertises in its `/config`.
    pub fn parse_api_port(&self, body: &Value) -> Result<u16> {
        body.pointer("/data/plugins")
            .and_then(|plugins| plugins.get(CORE_API_PLUGIN))
            .and_then(|plugin| plugin.get("port"))
            .and_then(Value::as_u64)
            .and_then(|port| u16::try_from(port).ok())
            .ok_or_else(|| {
                ClientError::MalformedResponse(format!("no {} port in config", CORE_API_PLUGIN))
            })
    }

    pub fn submission_url(&self, peer: &Peer) -> String {
        match self.api_version {
            ApiVersion::V1 => format!("{}/peer/transactions", self.peer_url(peer)),
            ApiVersion::V2 => format!("{}/api/transactions", self.peer_url(peer)),
        }
    }

    pub fn envelope(&self, tx: &SignedTransfer) -> Value {
        json!({ "transactions": [tx.to_json(self.api_version, self.network)] })
    }

    pub fn parse_submission(&self, body: &Value) -> Result<SubmissionReply> {
        match self.api_version {
            ApiVersion::V1 => parse_v1_submission(body),
            ApiVersion::V2 => parse_v2_submission(body),
        }
    }

    pub fn balance_url(&self, peer: &Peer, address: &str) -> Result<String> {
        match self.api_version {
            ApiVersion::V1 => {
                self.endpoint(peer, &["api", "accounts", "getBalance"], &[("address", address)])
            }
            ApiVersion::V2 => self.endpoint(peer, &["api", "wallets", address], &[]),
        }
    }

    pub fn transaction_url(&self, peer: &Peer, id: &str) -> Result<String> {
        match self.api_version {
            ApiVersion::V1 => self.endpoint(peer, &["api", "transactions", "get"], &[("id", id)]),
            ApiVersion::V2 => self.endpoint(peer, &["api", "transactions", id], &[]),
        }
    }

    /// Newest-first transaction listing, optionally filtered by recipient.
    ///
    /// V2 nodes page instead of skipping, so there `limit` must be positive
    /// and `offset` a multiple of it.
    pub fn transactions_url(
        &self,
        peer: &Peer,
        limit: u32,
        offset: u32,
        recipient: Option<&str>,
    ) -> Result<String> {
        let limit_text = limit.to_string();
        let position = match self.api_version {
            ApiVersion::V1 => ("offset", offset.to_string()),
            ApiVersion::V2 => {
                if limit == 0 {
                    return Err(ClientError::InvalidQuery(
                        "limit must be at least 1".to_string(),
                    ));
                }
                if offset % limit != 0 {
                    return Err(ClientError::InvalidQuery(format!(
                        "offset {} is not a multiple of limit {}",
                        offset, limit
                    )));
                }
                ("page", (offset / limit + 1).to_string())
            }
        };

        let mut query = vec![
            ("orderBy", "timestamp:desc"),
            ("limit", limit_text.as_str()),
            (position.0, position.1.as_str()),
        ];
        if let Some(recipient) = recipient {
            query.push(("recipientId", recipient));
        }
        self.endpoint(peer, &["api", "transactions"], &query)
    }

    /// `peer_url` plus escaped path segments and query pairs.
    fn endpoint(&self, peer: &Peer, segments: &[&str], query: &[(&str, &str)]) -> Result<String> {
        let base = self.peer_url(peer);
        let mut url = Url::parse(&base)
            .map_err(|e| ClientError::InvalidQuery(format!("{}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidQuery(format!("{} cannot take a path", base)))?
            .clear()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }
}

fn field(mut body: Value, name: &str) -> Result<Value> {
    body.get_mut(name)
        .map(Value::take)
        .ok_or_else(|| ClientError::MalformedResponse(format!("missing `{}`", name)))
}

fn first_id(list: Option<&Value>) -> Option<String> {
    list.and_then(Value::as_array)
        .and_then(|ids| ids.first())
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_v1_submission(body: &Value) -> Result<SubmissionReply> {
    if let Some(id) = first_id(body.get("transactionIds")) {
        return Ok(SubmissionReply::Accepted(id));
    }
    if body.get("success").is_none() {
        return Err(ClientError::MalformedResponse(
            "submission reply has neither `success` nor `transactionIds`".to_string(),
        ));
    }
    let reason = body
        .get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("rejected transaction");
    Ok(SubmissionReply::Rejected(reason.to_string()))
}

fn parse_v2_submission(body: &Value) -> Result<SubmissionReply> {
    let data = body.get("data").ok_or_else(|| {
        ClientError::MalformedResponse("submission reply has no `data`".to_string())
    })?;
    if let Some(id) = first_id(data.get("accept")) {
        return Ok(SubmissionReply::Accepted(id));
    }

    let mut reasons = Vec::new();
    if let Some(errors) = body.get("errors").and_then(Value::as_object) {
        for entries in errors.values() {
            for entry in entries.as_array().into_iter().flatten() {
                if let Some(message) = entry.get("message").and_then(Value::as_str) {
                    reasons.push(message.to_string());
                }
            }
        }
    }
    if reasons.is_empty() {
        reasons.push("rejected transaction".to_string());
    }
    Ok(SubmissionReply::Rejected(reasons.join("; ")))
}
