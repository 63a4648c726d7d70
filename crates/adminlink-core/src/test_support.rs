//! Scripted transport shared by the client and admin facade tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tokio::time::Instant;

use crate::api::transport::{FailureKind, OutboundRequest, RawResponse, Transport, TransportError};

/// Transport that replays a script and records what was sent.
/// Once the script runs out every send gets an empty 200.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    sent: Mutex<Vec<(Instant, OutboundRequest)>>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<Result<RawResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Script of 200 JSON replies
    pub(crate) fn replying(bodies: Vec<&str>) -> Arc<Self> {
        Self::new(bodies.into_iter().map(|body| Ok(respond(200, body))).collect())
    }

    pub(crate) fn requests(&self) -> Vec<OutboundRequest> {
        self.sent.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Time between consecutive sends
    pub(crate) fn gaps(&self) -> Vec<Duration> {
        let sent = self.sent.lock().unwrap();
        sent.windows(2).map(|w| w[1].0 - w[0].0).collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<RawResponse, TransportError>> {
        self.sent.lock().unwrap().push((Instant::now(), request));
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(respond(200, "")));
        Box::pin(async move { next })
    }
}

pub(crate) fn respond(status: u16, body: &str) -> RawResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    RawResponse {
        status,
        headers,
        body: body.as_bytes().to_vec(),
    }
}

pub(crate) fn respond_with_etag(status: u16, body: &str, etag: &'static str) -> RawResponse {
    let mut raw = respond(status, body);
    raw.headers.insert(header::ETAG, HeaderValue::from_static(etag));
    raw
}

pub(crate) fn fail(kind: FailureKind) -> Result<RawResponse, TransportError> {
    Err(TransportError::new(kind, format!("{:?} failure", kind)))
}

pub(crate) fn refused() -> Result<RawResponse, TransportError> {
    fail(FailureKind::Connect)
}
