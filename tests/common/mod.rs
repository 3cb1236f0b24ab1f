//! In-memory transport and network fixtures shared by the integration tests

#![allow(dead_code)]

use ark_client::config::{NetworkConfig, NetworkParameters};
use ark_client::error::{ClientError, Result};
use ark_client::transport::{Headers, HttpTransport};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone)]
pub enum Reply {
    Json(Value),
    /// Answer after a delay
    Delayed(Duration, Value),
    Fail(String),
    /// Non-2xx answer with a body, as the HTTP transport reports it
    Status(u16, Value),
    /// The request handler itself blows up
    Panic,
    /// Never answers within any reasonable timeout
    Stall,
}

#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, Reply>>,
    posts: Mutex<Vec<(String, Value)>>,
    gets: Mutex<Vec<(String, Headers)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, url: impl Into<String>, reply: Reply) -> &Self {
        self.routes.lock().unwrap().insert(url.into(), reply);
        self
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn gets(&self) -> Vec<(String, Headers)> {
        self.gets.lock().unwrap().clone()
    }

    async fn respond(&self, url: &str) -> Result<Value> {
        let reply = self.routes.lock().unwrap().get(url).cloned();
        match reply {
            Some(Reply::Json(body)) => Ok(body),
            Some(Reply::Delayed(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(body)
            }
            Some(Reply::Fail(msg)) => Err(ClientError::Network(msg)),
            Some(Reply::Status(status, body)) => Err(ClientError::Status { status, body }),
            Some(Reply::Panic) => panic!("handler for {} crashed", url),
            Some(Reply::Stall) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(ClientError::Network("stalled".to_string()))
            }
            None => Err(ClientError::Network(format!("connection refused: {}", url))),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get_json(&self, url: &str, headers: &Headers) -> Result<Value> {
        self.gets
            .lock()
            .unwrap()
            .push((url.to_string(), headers.clone()));
        self.respond(url).await
    }

    async fn post_json(&self, url: &str, _headers: &Headers, body: &Value) -> Result<Value> {
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        self.respond(url).await
    }
}

/// Network file with one-second timeouts. `extra` is spliced in before
/// the peer tables.
pub fn params(extra: &str, seeds: &[&str], trusted: &[(&str, u16)]) -> NetworkParameters {
    let mut text = format!(
        "net_hash = \"6e84d08bd299ed97c212c886c98a57e36545c8f5d645ca7eeae63a8bd62d8988\"\nrequest_timeout_secs = 1\n{}\n",
        extra
    );
    for seed in seeds {
        text.push_str(&format!("[[peers]]\nhostname = \"{}\"\nport = 4001\n", seed));
    }
    for (host, port) in trusted {
        text.push_str(&format!("[[trusted_peers]]\nhostname = \"{}\"\nport = {}\n", host, port));
    }
    NetworkConfig::from_toml_str(&text)
        .unwrap()
        .into_parameters()
        .unwrap()
}

pub fn peer_list_url(host: &str) -> String {
    format!("http://{}:4001/api/peers", host)
}

pub fn config_url(host: &str) -> String {
    format!("http://{}:4001/config", host)
}

pub fn submit_url(host: &str, port: u16) -> String {
    format!("http://{}:{}/peer/transactions", host, port)
}

/// V1 `/api/peers` body listing healthy peers on P2P port 4001.
pub fn peer_list(hosts: &[&str]) -> Value {
    let peers: Vec<Value> = hosts
        .iter()
        .map(|ip| json!({"ip": ip, "port": 4001, "status": "OK", "height": 100, "delay": 10}))
        .collect();
    json!({"success": true, "peers": peers})
}

pub fn core_config(api_port: u16) -> Value {
    json!({"data": {"plugins": {"@arkecosystem/core-api": {"enabled": true, "port": api_port}}}})
}

pub fn accepted(id: &str) -> Value {
    json!({"success": true, "transactionIds": [id]})
}

pub fn rejected(message: &str) -> Value {
    json!({"success": false, "message": message})
}
