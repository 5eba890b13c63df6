//! HTTP-RPC transport.
//!
//! The node's RPC port speaks JSON-RPC over HTTP: every request is its own
//! `POST` and the reply envelope comes back as the response body. There is
//! no connection to lose, so a failed POST fails only the call it carried.
//!
//! In-flight POSTs are bounded by a semaphore; a full semaphore is reported
//! as `Backpressure`, the same way a full writer queue is on streams.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::{Error, Result};
use crate::protocol::{Request, Response};

/// POSTs request envelopes to one URL.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    slots: Arc<Semaphore>,
    max_in_flight: usize,
}

impl HttpTransport {
    /// Build a transport for `url` allowing `max_in_flight` concurrent POSTs.
    ///
    /// `timeout` bounds each whole POST, reply body included.
    pub fn new(
        url: impl Into<String>,
        max_in_flight: usize,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let max_in_flight = max_in_flight.min(Semaphore::MAX_PERMITS);
        Ok(Self {
            http: builder.build()?,
            url: url.into(),
            slots: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Reserve a slot for one POST without waiting.
    pub fn try_reserve(&self) -> Result<OwnedSemaphorePermit> {
        self.slots.clone().try_acquire_owned().map_err(|e| match e {
            TryAcquireError::NoPermits => Error::Backpressure,
            TryAcquireError::Closed => Error::TransportClosed,
        })
    }

    /// POSTs currently in flight.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight.saturating_sub(self.slots.available_permits())
    }

    /// Stop handing out slots. Later reservations fail with `TransportClosed`.
    pub fn close(&self) {
        self.slots.close();
    }

    /// POST `request` and read back its reply envelope.
    pub async fn post(&self, request: &Request) -> Result<Response> {
        tracing::debug!(id = request.id, url = %self.url, "posting request");

        let resp = self.http.post(&self.url).json(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}
