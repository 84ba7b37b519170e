//! Client side of the HTTP POST stream.
//!
//! Not safe for concurrent use: one `write` must precede the batch of reads
//! that consume its response. `&mut self` on both enforces that.

use crate::config::RpcConfig;
use crate::error::TransportError;
use bytes::{Buf, Bytes};
use reqwest::{header, Client};
use std::io::Read;
use tracing::debug;

/// Byte stream over one POST per write.
#[derive(Debug)]
pub struct ClientConn {
    http: Client,
    url: String,
    /// Unread part of the last response body.
    response: Bytes,
}

impl ClientConn {
    /// Create a connection posting to `url`.
    pub fn new(url: impl Into<String>) -> Result<Self, TransportError> {
        let http = Client::builder().build()?;
        Ok(Self::with_client(http, url))
    }

    /// Create a connection reusing an existing HTTP client.
    pub fn with_client(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            response: Bytes::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bytes of the last response not yet read.
    pub fn remaining(&self) -> usize {
        self.response.len()
    }

    /// Send `body` as one request and buffer the whole response.
    pub async fn write(&mut self, body: Bytes) -> Result<usize, TransportError> {
        if !self.response.is_empty() {
            debug!(
                "Discarding {} unread bytes of the previous response",
                self.response.len()
            );
            self.response.clear();
        }

        let len = body.len();
        let response = self
            .http
            .post(&self.url)
            .header(header::CONTENT_TYPE, RpcConfig::CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        self.response = response.bytes().await?;
        Ok(len)
    }

    #[cfg(test)]
    pub(crate) fn buffer_response(&mut self, body: Bytes) {
        self.response = body;
    }

    /// Release the connection. Dropping the HTTP client closes its pooled
    /// keep-alive connections; any unread response bytes are discarded.
    pub fn close(self) {
        debug!("Closing client connection to {}", self.url);
    }
}

impl Read for ClientConn {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.response.len());
        self.response.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}
