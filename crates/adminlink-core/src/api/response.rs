use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::error::ApiError;

/// Uniform result of a successful call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub data: Value,
    pub status: u16,
    pub headers: HeaderMap,
    /// Set for 304 answers; `data` then holds the cached body, or null
    pub not_modified: bool,
}

impl ApiResponse {
    /// Decode `data` into a typed value
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to decode response: {}", e)))
    }

    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_value(self.data)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to decode response: {}", e)))
    }
}

/// Decode a raw body: JSON when it parses as JSON, otherwise text, null when empty.
pub(crate) fn decode_body(headers: &HeaderMap, body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    let declared_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("json"))
        .unwrap_or(false);

    match serde_json::from_slice::<Value>(body) {
        Ok(value) => value,
        Err(e) => {
            if declared_json {
                debug!(error = %e, "Response declared JSON but did not parse; keeping text");
            }
            Value::String(String::from_utf8_lossy(body).into_owned())
        }
    }
}

/// Maximum number of cached conditional responses.
/// Admin pages fetch a few dozen distinct lists; 128 leaves headroom.
const MAX_CACHED_RESPONSES: usize = 128;

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub etag: String,
    pub data: Value,
    pub cached_at: DateTime<Utc>,
}

/// ETag-keyed store backing conditional GETs.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CachedResponse>>,
    capacity: usize,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(MAX_CACHED_RESPONSES)
    }
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn etag(&self, key: &str) -> Option<String> {
        self.get(key).map(|c| c.etag)
    }

    pub fn store(&self, key: &str, etag: &str, data: &Value) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() >= self.capacity && !entries.contains_key(key) {
            // Evict the oldest entry
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, c)| c.cached_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key.to_string(),
            CachedResponse {
                etag: etag.to_string(),
                data: data.clone(),
                cached_at: Utc::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde::Deserialize;

    #[test]
    fn test_decode_body_variants() {
        let mut headers = HeaderMap::new();
        assert_eq!(decode_body(&headers, b""), Value::Null);
        assert_eq!(decode_body(&headers, b"[1,2]"), serde_json::json!([1, 2]));
        assert_eq!(decode_body(&headers, b"pong"), Value::String("pong".into()));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert_eq!(decode_body(&headers, b"{oops"), Value::String("{oops".into()));
    }

    #[test]
    fn test_typed_decode() {
        #[derive(Deserialize)]
        struct App {
            id: String,
        }
        let response = ApiResponse {
            data: serde_json::json!([{"id": "chat"}]),
            status: 200,
            headers: HeaderMap::new(),
            not_modified: false,
        };
        let apps: Vec<App> = response.json().unwrap();
        assert_eq!(apps[0].id, "chat");

        let err = response.json::<String>().unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let cache = ResponseCache::new(2);
        cache.store("a", "\"1\"", &Value::Null);
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.store("b", "\"2\"", &Value::Null);
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.store("c", "\"3\"", &Value::Null);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.etag("c").as_deref(), Some("\"3\""));
    }

    #[test]
    fn test_cache_replace_and_invalidate() {
        let cache = ResponseCache::default();
        cache.store("k", "v1", &serde_json::json!(1));
        cache.store("k", "v2", &serde_json::json!(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").unwrap().data, serde_json::json!(2));

        cache.invalidate("k");
        assert!(cache.is_empty());
    }
}
