use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{multipart, Method};
use serde::Serialize;
use serde_json::Value;

use super::error::ApiError;

/// Request body, resolved once when the call is made.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized as JSON with `Content-Type: application/json`
    Json(Value),
    /// Sent as multipart/form-data; the transport sets the content type and boundary
    Multipart(MultipartForm),
    /// Sent verbatim
    Raw {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
}

impl RequestBody {
    /// Serialize any value as a JSON body.
    ///
    /// Serialization failures are caller bugs and surface as `InvalidRequest`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::InvalidRequest(format!("Body is not serializable: {}", e)))
    }

    pub fn text(text: impl Into<String>) -> Self {
        RequestBody::Raw {
            bytes: text.into().into_bytes(),
            content_type: Some("text/plain; charset=utf-8".to_string()),
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartData {
    Text(String),
    File {
        bytes: Vec<u8>,
        file_name: String,
        mime: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub data: PartData,
}

/// Multipart payload. Kept as plain data so a retry can rebuild it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    pub parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            data: PartData::Text(value.into()),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        mime: Option<&str>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            data: PartData::File {
                bytes,
                file_name: file_name.into(),
                mime: mime.map(str::to_string),
            },
        });
        self
    }

    /// Reject part content types the transport could not encode.
    pub fn validate(&self) -> Result<(), ApiError> {
        for part in &self.parts {
            if let PartData::File {
                mime: Some(mime), ..
            } = &part.data
            {
                multipart::Part::bytes(Vec::<u8>::new())
                    .mime_str(mime)
                    .map_err(|e| {
                        ApiError::InvalidRequest(format!(
                            "Invalid content type {:?} for part {}: {}",
                            mime, part.name, e
                        ))
                    })?;
            }
        }
        Ok(())
    }
}

/// Per-call options for `HttpClient::request`.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: RequestBody,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    /// Never retry this request, even on network failure
    pub skip_retry: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
            query: Vec::new(),
            skip_retry: false,
        }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, ApiError> {
        Ok(self.body(RequestBody::json(value)?))
    }

    pub fn multipart(self, form: MultipartForm) -> Self {
        self.body(RequestBody::Multipart(form))
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn skip_retry(mut self) -> Self {
        self.skip_retry = true;
        self
    }
}
