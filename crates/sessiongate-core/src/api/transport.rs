//! Transport seam: the raw request/response primitive underneath the gateway.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, Method};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::error::{NETWORK_ERROR_SIGNATURE, STATUS_FAILURE_SIGNATURE};

#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

/// A request that produced no structured response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportFailure {
    pub message: String,
    pub status: Option<u16>,
}

impl TransportFailure {
    pub fn connectivity() -> Self {
        Self {
            message: NETWORK_ERROR_SIGNATURE.to_string(),
            status: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            message: "timeout".to_string(),
            status: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            message: format!("{} {}", STATUS_FAILURE_SIGNATURE, status),
            status: Some(status),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }
}

pub trait Transport: Send + Sync {
    fn send(&self, request: TransportRequest)
        -> BoxFuture<'_, Result<TransportResponse, TransportFailure>>;
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(failure_from_reqwest)?;
        let status = response.status();
        let text = response.text().await.map_err(failure_from_reqwest)?;
        debug!(url = %request.url, status = %status, bytes = text.len(), "Transport response received");

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Ok(TransportResponse {
                status: status.as_u16(),
                body,
            }),
            Err(_) if status.is_success() => Ok(TransportResponse {
                status: status.as_u16(),
                body: if text.is_empty() { Value::Null } else { Value::String(text) },
            }),
            Err(_) => Err(TransportFailure::status(status.as_u16())),
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: TransportRequest)
        -> BoxFuture<'_, Result<TransportResponse, TransportFailure>>
    {
        Box::pin(self.execute(request))
    }
}

fn failure_from_reqwest(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::timeout()
    } else if err.is_connect() {
        TransportFailure::connectivity()
    } else if let Some(status) = err.status() {
        TransportFailure::status(status.as_u16())
    } else {
        TransportFailure::other(err.to_string())
    }
}
