//! The request pipeline: header attachment, send, retry, status handling.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::{ApiError, ErrorResponse};
use super::request::{RequestBody, RequestOptions};
use super::response::{decode_body, ApiResponse, ResponseCache};
use super::transport::{
    FailureKind, OutboundBody, OutboundRequest, RawResponse, ReqwestTransport, Transport, TransportError,
};
use crate::auth::{CredentialKey, CredentialStore, MemoryCredentialStore, SessionManager};
use crate::config::ClientConfig;
use crate::events::{AuthEvent, AuthEvents};
use crate::navigation::{AuthFailureContext, AuthFailureHandler, CredentialUsed};
use crate::network::NetworkStatusObserver;

/// Header carrying the client session ID
pub const SESSION_HEADER: &str = "x-session-id";

/// Requests to paths containing this are never retried
const HEALTH_CHECK_PATH: &str = "/health";

/// Which timeout budget a client instance applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Standard,
    /// Long-running calls (catalog syncs, generation)
    Streaming,
}

struct Shared {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    sessions: SessionManager,
    events: AuthEvents,
    network: Option<Arc<dyn NetworkStatusObserver>>,
    auth_failure: Option<Arc<dyn AuthFailureHandler>>,
    cache: Option<ResponseCache>,
}

/// API client for the admin backend.
/// Clone is cheap - all clones share transport, credentials and cache.
#[derive(Clone)]
pub struct HttpClient {
    shared: Arc<Shared>,
    timeout_class: TimeoutClass,
}

pub struct HttpClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    events: Option<AuthEvents>,
    network: Option<Arc<dyn NetworkStatusObserver>>,
    auth_failure: Option<Arc<dyn AuthFailureHandler>>,
}

impl HttpClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            credentials: None,
            events: None,
            network: None,
            auth_failure: None,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn events(mut self, events: AuthEvents) -> Self {
        self.events = Some(events);
        self
    }

    pub fn network_observer(mut self, observer: Arc<dyn NetworkStatusObserver>) -> Self {
        self.network = Some(observer);
        self
    }

    pub fn auth_failure_handler(mut self, handler: Arc<dyn AuthFailureHandler>) -> Self {
        self.auth_failure = Some(handler);
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let credentials: Arc<dyn CredentialStore> = self
            .credentials
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));
        let cache = self.config.conditional_requests.then(ResponseCache::default);

        Ok(HttpClient {
            shared: Arc::new(Shared {
                sessions: SessionManager::new(credentials.clone()),
                config: self.config,
                transport,
                credentials,
                events: self.events.unwrap_or_default(),
                network: self.network,
                auth_failure: self.auth_failure,
                cache,
            }),
            timeout_class: TimeoutClass::Standard,
        })
    }
}

impl HttpClient {
    pub fn builder(config: ClientConfig) -> HttpClientBuilder {
        HttpClientBuilder::new(config)
    }

    /// Create a client with the reqwest transport and an in-memory store
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// A handle to the same client using the streaming timeout
    pub fn streaming(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            timeout_class: TimeoutClass::Streaming,
        }
    }

    pub fn timeout_class(&self) -> TimeoutClass {
        self.timeout_class
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.shared.credentials
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.shared.sessions
    }

    pub fn events(&self) -> &AuthEvents {
        &self.shared.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AuthEvent> {
        self.shared.events.subscribe()
    }

    pub fn set_auth_token(&self, token: &str) -> Result<()> {
        self.shared.credentials.set(CredentialKey::AuthToken, token)
    }

    pub fn set_admin_token(&self, token: &str) -> Result<()> {
        self.shared.credentials.set(CredentialKey::AdminToken, token)
    }

    /// Explicit logout: drop tokens, session and cached responses
    pub fn logout(&self) -> Result<()> {
        self.shared.credentials.clear()?;
        if let Some(cache) = &self.shared.cache {
            cache.clear();
        }
        info!("Logged out, credentials cleared");
        Ok(())
    }

    fn timeout(&self) -> Duration {
        match self.timeout_class {
            TimeoutClass::Standard => self.shared.config.request_timeout(),
            TimeoutClass::Streaming => self.shared.config.streaming_timeout(),
        }
    }

    // ===== Request pipeline =====

    /// Perform a request against `path` (joined to the configured base URL).
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<ApiResponse, ApiError> {
        let url = self.shared.config.url_for(path);
        let cache_key = self.cache_key(&url, &options);
        let retry_allowed = !options.skip_retry && !is_health_check(path);
        let max_retries = self.shared.config.max_retries;

        let mut retries = 0;
        let mut backoff_ms = self.shared.config.initial_backoff_ms;
        let mut first_failure: Option<TransportError> = None;

        loop {
            let (outbound, credential) = self.prepare(&url, &options, cache_key.as_deref())?;
            debug!(method = %options.method, url = %url, attempt = retries + 1, "Sending request");

            match self.shared.transport.send(outbound).await {
                Ok(raw) => {
                    if let Some(network) = &self.shared.network {
                        network.record_success();
                    }
                    return self
                        .finish(raw, credential, cache_key.as_deref())
                        .map_err(|e| self.annotate(e));
                }
                Err(failure) if failure.kind == FailureKind::Build => {
                    // Nothing reached the network
                    warn!(url = %url, error = %failure, "Request could not be built");
                    return Err(ApiError::InvalidRequest(failure.message));
                }
                Err(failure) => {
                    let err = ApiError::network(failure.clone(), retries + 1);
                    if let Some(network) = &self.shared.network {
                        network.record_failure(&err);
                    }
                    let original = first_failure.get_or_insert(failure);

                    if retry_allowed && retries < max_retries && self.retry_eligible(&err, &options.method) {
                        retries += 1;
                        warn!(
                            url = %url,
                            retry = retries,
                            backoff_ms = backoff_ms,
                            error = %err,
                            "Network failure, backing off"
                        );
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        backoff_ms = backoff_ms.saturating_mul(2);
                        continue;
                    }

                    let err = ApiError::network(original.clone(), retries + 1);
                    warn!(url = %url, attempts = retries + 1, error = %err, "Request failed");
                    return Err(self.annotate(err));
                }
            }
        }
    }

    fn cache_key(&self, url: &str, options: &RequestOptions) -> Option<String> {
        self.shared.cache.as_ref()?;
        if options.method != Method::GET {
            return None;
        }
        if options.query.is_empty() {
            return Some(url.to_string());
        }
        let query: Vec<String> = options
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        Some(format!("{}?{}", url, query.join("&")))
    }

    fn retry_eligible(&self, err: &ApiError, method: &Method) -> bool {
        let body_lost = err
            .transport_error()
            .map(|f| f.kind == FailureKind::Body)
            .unwrap_or(false);
        if body_lost && !method.is_idempotent() {
            return false;
        }
        match &self.shared.network {
            Some(network) => network.should_retry(err),
            None => err.is_network(),
        }
    }

    fn annotate(&self, mut err: ApiError) -> ApiError {
        if let Some(network) = &self.shared.network {
            let connectivity = network.classify_error(&err);
            err.set_connectivity(connectivity);
        }
        err
    }

    /// Build one attempt: body encoding, session ID, bearer token, conditional header.
    fn prepare(
        &self,
        url: &str,
        options: &RequestOptions,
        cache_key: Option<&str>,
    ) -> Result<(OutboundRequest, CredentialUsed), ApiError> {
        let mut headers = options.headers.clone();

        let body = match &options.body {
            RequestBody::Empty => OutboundBody::Empty,
            RequestBody::Json(value) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                let bytes = serde_json::to_vec(value)
                    .map_err(|e| ApiError::InvalidRequest(format!("Body is not serializable: {}", e)))?;
                OutboundBody::Bytes(bytes)
            }
            RequestBody::Multipart(form) => {
                form.validate()?;
                // The transport supplies the multipart boundary
                headers.remove(header::CONTENT_TYPE);
                OutboundBody::Multipart(form.clone())
            }
            RequestBody::Raw {
                bytes,
                content_type,
            } => {
                if let Some(content_type) = content_type {
                    headers.insert(header::CONTENT_TYPE, header_value(content_type)?);
                }
                OutboundBody::Bytes(bytes.clone())
            }
        };

        match self.shared.sessions.session_id_for_request() {
            Ok(id) => {
                headers.insert(SESSION_HEADER, header_value(&id)?);
            }
            Err(e) => warn!(error = %e, "Could not obtain session ID, sending without it"),
        }

        let credential = self.attach_authorization(&mut headers)?;

        if let (Some(key), Some(cache)) = (cache_key, &self.shared.cache) {
            if let Some(etag) = cache.etag(key) {
                if let Ok(value) = HeaderValue::from_str(&etag) {
                    headers.insert(header::IF_NONE_MATCH, value);
                }
            }
        }

        Ok((
            OutboundRequest {
                method: options.method.clone(),
                url: url.to_string(),
                query: options.query.clone(),
                headers,
                body,
                timeout: self.timeout(),
            },
            credential,
        ))
    }

    /// Auth token if present, else admin token, else nothing. Never both.
    fn attach_authorization(&self, headers: &mut HeaderMap) -> Result<CredentialUsed, ApiError> {
        headers.remove(header::AUTHORIZATION);

        let (token, used) = match self.stored(CredentialKey::AuthToken) {
            Some(token) => (token, CredentialUsed::AuthToken),
            None => match self.stored(CredentialKey::AdminToken) {
                Some(token) => (token, CredentialUsed::AdminToken),
                None => return Ok(CredentialUsed::None),
            },
        };

        let mut value = header_value(&format!("Bearer {}", token))?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
        Ok(used)
    }

    fn stored(&self, key: CredentialKey) -> Option<String> {
        match self.shared.credentials.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "Failed to read credential");
                None
            }
        }
    }

    fn forget(&self, key: CredentialKey) {
        if let Err(e) = self.shared.credentials.remove(key) {
            warn!(key = key.as_str(), error = %e, "Failed to clear credential");
        }
    }

    fn finish(
        &self,
        raw: RawResponse,
        credential: CredentialUsed,
        cache_key: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let RawResponse {
            status,
            headers,
            body,
        } = raw;
        let data = decode_body(&headers, &body);

        match status {
            200..=299 => {
                if let (Some(key), Some(cache)) = (cache_key, &self.shared.cache) {
                    if let Some(etag) = headers.get(header::ETAG).and_then(|v| v.to_str().ok()) {
                        cache.store(key, etag, &data);
                    }
                }
                Ok(ApiResponse {
                    data,
                    status,
                    headers,
                    not_modified: false,
                })
            }
            304 => {
                let cached = match (cache_key, &self.shared.cache) {
                    (Some(key), Some(cache)) => cache.get(key).map(|c| c.data),
                    _ => None,
                };
                debug!(cached = cached.is_some(), "Not modified");
                Ok(ApiResponse {
                    data: cached.unwrap_or(Value::Null),
                    status,
                    headers,
                    not_modified: true,
                })
            }
            _ => {
                let mut err = ApiError::from_response(ErrorResponse::new(status, data, headers));
                if status == 401 || status == 403 {
                    self.handle_auth_failure(&mut err, status, credential);
                }
                debug!(status, error = %err, "Request rejected");
                Err(err)
            }
        }
    }

    /// Clear the rejected credential, notify, and ask the host where to go.
    fn handle_auth_failure(&self, err: &mut ApiError, status: u16, credential: CredentialUsed) {
        if status == 401 {
            self.forget(CredentialKey::AuthToken);
            self.shared.events.emit(AuthEvent::TokenExpired);
            info!("Auth token rejected, cleared");
        }
        if credential == CredentialUsed::AdminToken {
            self.forget(CredentialKey::AdminToken);
            info!(status, "Admin token rejected, cleared");
        }

        if let Some(handler) = &self.shared.auth_failure {
            let context = AuthFailureContext {
                status,
                credential,
                has_auth_token: self.stored(CredentialKey::AuthToken).is_some(),
            };
            let intent = handler.on_auth_failure(&context);
            debug!(?intent, "Auth failure navigation decided");
            err.set_navigation(intent);
        }
    }

    // ===== Convenience methods =====

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(path, RequestOptions::get()).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.request(path, RequestOptions::post().json(body)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.request(path, RequestOptions::put().json(body)?).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.request(path, RequestOptions::new(Method::PATCH).json(body)?)
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(path, RequestOptions::delete()).await
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid header value: {}", e)))
}

fn is_health_check(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    format!("/{}", path.trim_start_matches('/')).contains(HEALTH_CHECK_PATH)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::Instant;

    use super::*;
    use crate::api::request::MultipartForm;
    use crate::navigation::{AdminRedirectPolicy, NavigationIntent};
    use crate::network::{Connectivity, NetworkMonitor};
    use crate::test_support::{fail, refused, respond, respond_with_etag, ScriptedTransport};

    fn client_with(
        transport: Arc<ScriptedTransport>,
        store: Arc<MemoryCredentialStore>,
    ) -> HttpClient {
        HttpClient::builder(ClientConfig::default())
            .transport(transport)
            .credentials(store)
            .build()
            .unwrap()
    }

    fn auth_header(request: &OutboundRequest) -> Option<String> {
        request
            .headers
            .get(header::AUTHORIZATION)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let transport = ScriptedTransport::new(vec![Ok(respond(200, r#"[{"id":"chat"}]"#))]);
        let store = Arc::new(MemoryCredentialStore::with_auth_token("user-token"));
        store.set(CredentialKey::AdminToken, "admin-secret").unwrap();
        let client = client_with(transport.clone(), store);

        let response = client.request("/admin/apps", RequestOptions::default()).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.data, serde_json::json!([{"id": "chat"}]));
        assert!(!response.not_modified);

        let sent = transport.requests();
        assert_eq!(sent[0].url, "http://localhost:3000/api/admin/apps");
        assert_eq!(sent[0].method, Method::GET);
        assert_eq!(auth_header(&sent[0]).as_deref(), Some("Bearer user-token"));
    }

    #[tokio::test]
    async fn test_admin_token_fallback_and_no_token() {
        let transport = ScriptedTransport::new(vec![]);
        let store = Arc::new(MemoryCredentialStore::new());
        let client = client_with(transport.clone(), store.clone());

        client.get("/admin/models").await.unwrap();
        store.set(CredentialKey::AdminToken, "admin-secret").unwrap();
        client.get("/admin/models").await.unwrap();

        let sent = transport.requests();
        assert_eq!(auth_header(&sent[0]), None);
        assert_eq!(auth_header(&sent[1]).as_deref(), Some("Bearer admin-secret"));
    }

    #[tokio::test]
    async fn test_session_header_on_every_request() {
        let transport = ScriptedTransport::new(vec![]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));

        client.get("/admin/users").await.unwrap();
        client.get("/admin/groups").await.unwrap();

        let sent = transport.requests();
        let first = sent[0].headers.get(SESSION_HEADER).unwrap();
        let second = sent[1].headers.get(SESSION_HEADER).unwrap();
        assert!(first.to_str().unwrap().starts_with("sess_"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_json_body_sets_content_type() {
        let transport = ScriptedTransport::new(vec![Ok(respond(201, r#"{"id":"g1"}"#))]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));

        let response = client
            .post("/admin/groups", &serde_json::json!({"name": "editors"}))
            .await
            .unwrap();
        assert_eq!(response.status, 201);

        let sent = transport.requests();
        assert_eq!(
            sent[0].headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        match &sent[0].body {
            OutboundBody::Bytes(bytes) => {
                let v: Value = serde_json::from_slice(bytes).unwrap();
                assert_eq!(v["name"], "editors");
            }
            other => panic!("expected bytes, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multipart_body_has_no_client_content_type() {
        let transport = ScriptedTransport::new(vec![]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));
        let form = MultipartForm::new().file("file", "logo.png", vec![0x89, 0x50], Some("image/png"));

        let options = RequestOptions::post()
            .header("Content-Type", "application/json")
            .unwrap()
            .multipart(form.clone());
        client.request("/admin/ui/upload-asset", options).await.unwrap();

        let sent = transport.requests();
        assert!(sent[0].headers.get(header::CONTENT_TYPE).is_none());
        match &sent[0].body {
            OutboundBody::Multipart(sent_form) => assert_eq!(sent_form, &form),
            other => panic!("expected multipart, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_not_modified_is_success() {
        let transport = ScriptedTransport::new(vec![Ok(respond(304, ""))]);
        let client = client_with(transport, Arc::new(MemoryCredentialStore::new()));

        let response = client.get("/admin/prompts").await.unwrap();
        assert_eq!(response.status, 304);
        assert!(response.not_modified);
        assert_eq!(response.data, Value::Null);
    }

    #[tokio::test]
    async fn test_conditional_get_returns_cached_data() {
        let transport = ScriptedTransport::new(vec![
            Ok(respond_with_etag(200, r#"[{"id":"p1"}]"#, "\"v1\"")),
            Ok(respond(304, "")),
        ]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));

        let first = client.get("/admin/prompts").await.unwrap();
        let second = client.get("/admin/prompts").await.unwrap();

        assert!(second.not_modified);
        assert_eq!(second.data, first.data);

        let sent = transport.requests();
        assert!(sent[0].headers.get(header::IF_NONE_MATCH).is_none());
        assert_eq!(sent[1].headers.get(header::IF_NONE_MATCH).unwrap(), "\"v1\"");
    }

    #[tokio::test]
    async fn test_unauthorized_clears_token_and_notifies_once() {
        let transport = ScriptedTransport::new(vec![Ok(respond(401, r#"{"error":"expired"}"#))]);
        let store = Arc::new(MemoryCredentialStore::with_auth_token("stale"));
        let client = client_with(transport.clone(), store.clone());
        let mut events = client.subscribe();

        let err = client.get("/admin/prompts").await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert_eq!(err.status(), Some(401));
        assert_eq!(store.get(CredentialKey::AuthToken).unwrap(), None);
        assert_eq!(events.try_recv().unwrap(), AuthEvent::TokenExpired);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_token_rejection_redirects() {
        let transport = ScriptedTransport::new(vec![Ok(respond(403, ""))]);
        let store = Arc::new(MemoryCredentialStore::new());
        store.set(CredentialKey::AdminToken, "admin-secret").unwrap();
        let client = HttpClient::builder(ClientConfig::default())
            .transport(transport)
            .credentials(store.clone())
            .auth_failure_handler(Arc::new(AdminRedirectPolicy::new(|| {
                Some("/admin/workflows".to_string())
            })))
            .build()
            .unwrap();
        let mut events = client.subscribe();

        let err = client.get("/admin/workflows").await.unwrap_err();

        assert!(matches!(err, ApiError::AccessDenied { .. }));
        assert_eq!(err.navigation(), &NavigationIntent::Redirect("/".to_string()));
        assert_eq!(store.get(CredentialKey::AdminToken).unwrap(), None);
        // 403 is not a token expiry
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_admin_token_unauthorized_clears_and_redirects() {
        let transport = ScriptedTransport::new(vec![Ok(respond(401, r#"{"error":"bad token"}"#))]);
        let store = Arc::new(MemoryCredentialStore::new());
        store.set(CredentialKey::AdminToken, "admin-secret").unwrap();
        let client = HttpClient::builder(ClientConfig::default())
            .transport(transport.clone())
            .credentials(store.clone())
            .auth_failure_handler(Arc::new(AdminRedirectPolicy::new(|| {
                Some("/admin/users".to_string())
            })))
            .build()
            .unwrap();
        let mut events = client.subscribe();

        let err = client.get("/admin/users").await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert!(err.is_auth_failure());
        assert_eq!(err.navigation(), &NavigationIntent::Redirect("/".to_string()));
        assert_eq!(store.get(CredentialKey::AdminToken).unwrap(), None);
        assert_eq!(events.try_recv().unwrap(), AuthEvent::TokenExpired);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_forbidden_keeps_bearer_token() {
        let transport = ScriptedTransport::new(vec![Ok(respond(403, "no"))]);
        let store = Arc::new(MemoryCredentialStore::with_auth_token("user-token"));
        let client = client_with(transport, store.clone());

        let err = client.get("/admin/users").await.unwrap_err();
        assert!(matches!(err, ApiError::AccessDenied { .. }));
        assert_eq!(err.navigation(), &NavigationIntent::Stay);
        assert_eq!(store.get(CredentialKey::AuthToken).unwrap().as_deref(), Some("user-token"));
    }

    #[tokio::test]
    async fn test_server_error_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(respond(500, r#"{"error":"db down"}"#))]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));

        let err = client.get("/admin/tools").await.unwrap_err();
        assert!(matches!(err, ApiError::ServerError(_)));
        assert_eq!(err.response().unwrap().message(), Some("db down"));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_backoff_schedule() {
        let transport = ScriptedTransport::new(vec![refused(), refused(), refused(), refused()]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));

        let err = client.get("/admin/models").await.unwrap_err();

        match &err {
            ApiError::Network { source, attempts, .. } => {
                assert_eq!(source.kind, FailureKind::Connect);
                assert_eq!(*attempts, 4);
            }
            other => panic!("expected network error, got {:?}", other),
        }
        assert_eq!(transport.requests().len(), 4);
        assert_eq!(
            transport.gaps(),
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_recovers() {
        let transport = ScriptedTransport::new(vec![refused(), refused(), Ok(respond(200, "[]"))]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));

        let response = client.get("/admin/models").await.unwrap();
        assert_eq!(response.data, serde_json::json!([]));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_retry_and_health_never_retried() {
        let transport = ScriptedTransport::new(vec![refused(), refused()]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));

        let err = client
            .request("/admin/models", RequestOptions::get().skip_retry())
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert_eq!(transport.requests().len(), 1);

        let err = client.get("/health").await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_annotates_unrecovered_failures() {
        let transport = ScriptedTransport::new(vec![refused(), refused(), refused(), refused()]);
        let client = HttpClient::builder(ClientConfig::default())
            .transport(transport)
            .network_observer(Arc::new(NetworkMonitor::new()))
            .build()
            .unwrap();

        let err = client.get("/admin/models").await.unwrap_err();
        assert_eq!(err.connectivity(), Some(Connectivity::Offline));
    }

    #[tokio::test]
    async fn test_observer_annotates_http_errors() {
        let transport = ScriptedTransport::new(vec![Ok(respond(502, ""))]);
        let client = HttpClient::builder(ClientConfig::default())
            .transport(transport)
            .network_observer(Arc::new(NetworkMonitor::new()))
            .build()
            .unwrap();

        let err = client.get("/admin/apps").await.unwrap_err();
        assert_eq!(err.connectivity(), Some(Connectivity::ServerError));
    }

    #[tokio::test]
    async fn test_invalid_request_never_sent() {
        let transport = ScriptedTransport::new(vec![]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));

        let options = RequestOptions::post().body(RequestBody::Raw {
            bytes: b"x".to_vec(),
            content_type: Some("text/plain\nx-injected: 1".to_string()),
        });
        let err = client.request("/admin/prompts", options).await.unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbuildable_request_fails_without_retry() {
        let transport = ScriptedTransport::new(vec![
            fail(FailureKind::Build),
            fail(FailureKind::Build),
        ]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));
        let start = Instant::now();

        let err = client.get("/admin/models").await.unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert!(!err.is_network());
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_part_mime_is_never_sent() {
        let transport = ScriptedTransport::new(vec![]);
        let client = HttpClient::builder(ClientConfig::default())
            .transport(transport.clone())
            .network_observer(Arc::new(NetworkMonitor::new()))
            .build()
            .unwrap();
        let form = MultipartForm::new().file("file", "logo.png", vec![1, 2, 3], Some("not a mime"));
        let start = Instant::now();

        let err = client
            .request("/admin/ui/upload-asset", RequestOptions::post().multipart(form))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert_eq!(err.connectivity(), None);
        assert!(transport.requests().is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_body_retried_only_for_idempotent_methods() {
        let transport = ScriptedTransport::new(vec![
            fail(FailureKind::Body),
            fail(FailureKind::Body),
            Ok(respond(200, r#"{"ok":true}"#)),
        ]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));

        let err = client
            .post("/admin/groups", &serde_json::json!({"name": "editors"}))
            .await
            .unwrap_err();
        assert_eq!(err.transport_error().unwrap().kind, FailureKind::Body);
        assert_eq!(transport.requests().len(), 1);

        let response = client.get("/admin/groups").await.unwrap();
        assert_eq!(response.data["ok"], true);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_streaming_client_uses_long_timeout() {
        let transport = ScriptedTransport::new(vec![]);
        let client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));

        client.get("/admin/apps").await.unwrap();
        client.streaming().get("/admin/apps").await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].timeout, Duration::from_secs(30));
        assert_eq!(sent[1].timeout, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let transport = ScriptedTransport::new(vec![]);
        let store = Arc::new(MemoryCredentialStore::with_auth_token("t"));
        let client = client_with(transport, store.clone());
        client.get("/admin/apps").await.unwrap();

        client.logout().unwrap();
        assert_eq!(store.get(CredentialKey::AuthToken).unwrap(), None);
        assert_eq!(store.get(CredentialKey::SessionId).unwrap(), None);
    }

    #[test]
    fn test_is_health_check() {
        assert!(is_health_check("/health"));
        assert!(is_health_check("health"));
        assert!(is_health_check("/admin/health?verbose=1"));
        assert!(!is_health_check("/admin/apps"));
    }
}
