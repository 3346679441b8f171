//! Network plumbing: SOAP over HTTP and WS-Discovery over UDP multicast.

pub mod discovery;

use crate::error::Result;
use crate::soap::CONTENT_TYPE;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header;
use reqwest::StatusCode;
use std::borrow::Cow;
use std::time::Duration;
use url::Url;

/// What came back from a SOAP POST, whatever the status.
#[derive(Debug, Clone)]
pub struct SoapReply {
    pub status: StatusCode,
    pub body: Bytes,
}

impl SoapReply {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Sends one SOAP envelope and returns the raw reply.
///
/// Implementations must not retry: one call, at most one request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, endpoint: &Url, envelope: String) -> Result<SoapReply>;
}

/// reqwest backed transport, one connection pool per session.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpTransport { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: &Url, envelope: String) -> Result<SoapReply> {
        let response = self
            .client
            .post(endpoint.clone())
            .header(header::CONTENT_TYPE, CONTENT_TYPE)
            .body(envelope)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        Ok(SoapReply { status, body })
    }
}
