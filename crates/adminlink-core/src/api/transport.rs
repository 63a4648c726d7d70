//! The wire seam between the client and the HTTP stack.
//!
//! `HttpClient` builds an [`OutboundRequest`] per attempt and hands it to a
//! [`Transport`]. The production transport is reqwest; tests script one.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::{multipart, Client, Method};
use thiserror::Error;

use super::request::{FormPart, MultipartForm, PartData};

/// What kind of failure prevented an HTTP response from arriving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// DNS failure, connection refused, TLS handshake failure
    Connect,
    Timeout,
    /// The request could not be built; nothing reached the network
    Build,
    /// Status line arrived but the body could not be read; the server may
    /// already have acted on the request
    Body,
    Other,
}

#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_connect() {
            FailureKind::Connect
        } else if err.is_builder() {
            FailureKind::Build
        } else {
            FailureKind::Other
        };
        TransportError::new(kind, err.to_string())
    }
}

#[derive(Debug, Clone)]
pub enum OutboundBody {
    Empty,
    Bytes(Vec<u8>),
    Multipart(MultipartForm),
}

/// One fully prepared attempt.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: OutboundBody,
    pub timeout: Duration,
}

/// Status, headers and raw body of any HTTP response (success or not).
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

pub trait Transport: Send + Sync {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<RawResponse, TransportError>>;
}

/// Production transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build_form(form: MultipartForm) -> Result<multipart::Form, TransportError> {
        let mut out = multipart::Form::new();
        for FormPart { name, data } in form.parts {
            out = match data {
                PartData::Text(value) => out.text(name, value),
                PartData::File {
                    bytes,
                    file_name,
                    mime,
                } => {
                    let mut part = multipart::Part::bytes(bytes).file_name(file_name);
                    if let Some(mime) = mime {
                        part = part.mime_str(&mime)?;
                    }
                    out.part(name, part)
                }
            };
        }
        Ok(out)
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<RawResponse, TransportError>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method, &request.url)
                .headers(request.headers)
                .timeout(request.timeout);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            builder = match request.body {
                OutboundBody::Empty => builder,
                OutboundBody::Bytes(bytes) => builder.body(bytes),
                OutboundBody::Multipart(form) => builder.multipart(Self::build_form(form)?),
            };

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::new(FailureKind::Body, e.to_string()))?
                .to_vec();
            Ok(RawResponse {
                status,
                headers,
                body,
            })
        })
    }
}
