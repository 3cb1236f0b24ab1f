//! HTTP transport used to talk to nodes
//!
//! The rest of the crate only sees [`HttpTransport`], so discovery and
//! broadcast can be driven by an in-memory fake in tests.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Header name/value pairs attached to a single request.
pub type Headers = Vec<(String, String)>;

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_json(&self, url: &str, headers: &Headers) -> Result<Value>;

    async fn post_json(&self, url: &str, headers: &Headers, body: &Value) -> Result<Value>;
}

/// `reqwest`-backed transport with connect and request timeouts.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    fn apply_headers(
        mut request: reqwest::RequestBuilder,
        headers: &Headers,
    ) -> reqwest::RequestBuilder {
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }

    /// Body of a 2xx reply as JSON. Any other status becomes
    /// [`ClientError::Status`] carrying whatever the node sent back, so a
    /// rejection reason survives.
    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| ClientError::MalformedResponse(e.to_string()));
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str, headers: &Headers) -> Result<Value> {
        let request = Self::apply_headers(self.client.get(url), headers);
        let response = request.send().await?;
        Self::read_json(response).await
    }

    async fn post_json(&self, url: &str, headers: &Headers, body: &Value) -> Result<Value> {
        let request = Self::apply_headers(self.client.post(url), headers).json(body);
        let response = request.send().await?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one canned HTTP response and returns its base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_success_body_is_json() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let url = serve_once("200 OK", r#"{"success":true,"peers":[]}"#).await;
            let transport = ReqwestTransport::new(Duration::from_secs(3)).unwrap();

            let body = transport.get_json(&url, &Vec::new()).await.unwrap();
            assert_eq!(body["success"], Value::Bool(true));
        })
        .await
        .expect("test_success_body_is_json timed out");
    }

    #[tokio::test]
    async fn test_error_status_keeps_node_message() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let url = serve_once(
                "422 Unprocessable Entity",
                r#"{"success":false,"message":"Invalid signature"}"#,
            )
            .await;
            let transport = ReqwestTransport::new(Duration::from_secs(3)).unwrap();

            match transport.get_json(&url, &Vec::new()).await {
                Err(ClientError::Status { status, body }) => {
                    assert_eq!(status, 422);
                    assert_eq!(body["message"], Value::from("Invalid signature"));
                }
                other => panic!("expected status error, got {:?}", other),
            }
        })
        .await
        .expect("test_error_status_keeps_node_message timed out");
    }

    #[tokio::test]
    async fn test_error_status_with_plain_text() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let url = serve_once("503 Service Unavailable", "busy").await;
            let transport = ReqwestTransport::new(Duration::from_secs(3)).unwrap();

            match transport.get_json(&url, &Vec::new()).await {
                Err(ClientError::Status { status, body }) => {
                    assert_eq!(status, 503);
                    assert_eq!(body, Value::from("busy"));
                }
                other => panic!("expected status error, got {:?}", other),
            }
        })
        .await
        .expect("test_error_status_with_plain_text timed out");
    }
}
