//! Resilient API fetch client.
//!
//! Wraps `reqwest` with the Campus request conventions: bearer-token
//! injection, JSON content negotiation, status classification, and
//! rate-limit retry with backoff. Every call resolves to an [`Envelope`];
//! nothing escapes as an error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::envelope::Envelope;
use super::errors::{server_message, ApiError};
use super::session::SessionStore;
use crate::config::ApiClientConfig;

/// Buffered multipart payload.
///
/// `reqwest::multipart::Form` is consumed on send, so the client keeps the
/// parts buffered and rebuilds the form for each attempt; a rate-limited
/// upload can then be retried like any other request.
#[derive(Debug, Clone, Default)]
pub struct FormPayload {
    parts: Vec<FormPart>,
}

#[derive(Debug, Clone)]
enum FormPart {
    Text { name: String, value: String },
    File { name: String, filename: String, mime: String, data: Vec<u8> },
}

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text { name: name.into(), value: value.into() });
        self
    }

    /// Add a file field with buffered contents.
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        mime: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            filename: filename.into(),
            mime: mime.into(),
            data,
        });
        self
    }

    fn build_form(&self) -> Result<reqwest::multipart::Form, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File { name, filename, mime, data } => {
                    let part = reqwest::multipart::Part::bytes(data.clone())
                        .file_name(filename.clone())
                        .mime_str(mime)
                        .map_err(|e| ApiError::Config(format!("Invalid mime type: {e}")))?;
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

/// Request body variants.
#[derive(Debug, Clone)]
pub enum Payload {
    /// JSON-serialized body, sent with `Content-Type: application/json`.
    Json(serde_json::Value),
    /// Multipart body. The client sets no `Content-Type` so the transport
    /// can attach its own multipart boundary.
    Form(FormPayload),
}

/// Per-call request options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Payload>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { method: Method::GET, headers: Vec::new(), body: None }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self { method, ..Self::default() }
    }

    /// Add a caller-supplied header, merged after the defaults.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, payload: Payload) -> Self {
        self.body = Some(payload);
        self
    }
}

/// API fetch client.
///
/// Cheap to clone pieces are shared; construct once per deployment target
/// and hand references to page code.
pub struct ApiClient {
    http: reqwest::Client,
    session: Arc<dyn SessionStore>,
    config: ApiClientConfig,
    in_flight: Arc<AtomicUsize>,
}

impl ApiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the retry policy is invalid or the
    /// underlying HTTP client cannot be built.
    pub fn new(config: ApiClientConfig, session: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        config.retry.validate().map_err(|e| ApiError::Config(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .no_proxy()
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { http, session, config, in_flight: Arc::new(AtomicUsize::new(0)) })
    }

    /// Create a builder for fluent configuration.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Number of calls currently in flight.
    ///
    /// Each call tracks its own loading state independently; this gauge is
    /// the aggregate observable for UI spinners.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Execute a request described by `options` against `path`.
    ///
    /// Never fails past the envelope boundary: transport errors, rejected
    /// credentials, exhausted rate-limit retries, and application errors
    /// all come back as `Envelope::failure`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Envelope<T> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = self.execute(path, &options).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Envelope::from(result)
    }

    /// Execute a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Envelope<T> {
        self.request(path, RequestOptions::default()).await
    }

    /// Execute a POST request with a JSON body.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Envelope<T> {
        self.json_request(Method::POST, path, body).await
    }

    /// Execute a PUT request with a JSON body.
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Envelope<T> {
        self.json_request(Method::PUT, path, body).await
    }

    /// Execute a PATCH request with a JSON body.
    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Envelope<T> {
        self.json_request(Method::PATCH, path, body).await
    }

    /// Execute a DELETE request.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Envelope<T> {
        self.request(path, RequestOptions::new(Method::DELETE)).await
    }

    /// Execute a POST request with a multipart body.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: FormPayload,
    ) -> Envelope<T> {
        self.request(path, RequestOptions::new(Method::POST).body(Payload::Form(form))).await
    }

    async fn json_request<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Envelope<T> {
        let value = match serde_json::to_value(body) {
            Ok(value) => value,
            Err(e) => {
                return Envelope::from(Err(ApiError::Config(format!(
                    "Failed to serialize body: {e}"
                ))));
            }
        };
        self.request(path, RequestOptions::new(method).body(Payload::Json(value))).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.config.base_url, path);
        let max_attempts = self.config.retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let request = self.build_request(&url, options)?;
            debug!(attempt = attempt + 1, method = %options.method, url = %url, "sending request");

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    // Transport failures (unreachable host, DNS, abort,
                    // timeout) are terminal and surface as a single
                    // connection error, no retry.
                    debug!(attempt = attempt + 1, url = %url, error = %err, "request failed");
                    return Err(ApiError::Network(err.to_string()));
                }
            };

            let status = response.status();
            debug!(attempt = attempt + 1, url = %url, %status, "received response");

            if status == StatusCode::UNAUTHORIZED {
                warn!(url = %url, "credential rejected, terminating session");
                self.session.clear();
                return Err(ApiError::Auth(format!("{url} returned status 401")));
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let body = response.bytes().await.unwrap_or_default();
                if attempt + 1 < max_attempts {
                    let delay = self.config.retry.delay_after(attempt);
                    warn!(attempt = attempt + 1, url = %url, ?delay, "rate limited, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(ApiError::RateLimit(server_message(&body)));
            }

            if !status.is_success() {
                let body = response.bytes().await.unwrap_or_default();
                let message = server_message(&body);
                return Err(if status.is_server_error() {
                    ApiError::Server(message)
                } else {
                    ApiError::Client(message)
                });
            }

            return Self::parse_success(response).await;
        }

        Err(ApiError::Config("retry loop exhausted without producing a result".to_string()))
    }

    fn build_request(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let mut builder = self.http.request(options.method.clone(), url);

        // Multipart bodies carry their own content type with the boundary
        // chosen by the transport.
        if !matches!(options.body, Some(Payload::Form(_))) {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }

        if let Some(token) = self.session.token() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        for (name, value) in &options.headers {
            builder = builder.header(name, value);
        }

        match &options.body {
            Some(Payload::Json(value)) if options.method != Method::GET => {
                builder = builder.json(value);
            }
            Some(Payload::Form(form)) => {
                builder = builder.multipart(form.build_form()?);
            }
            _ => {}
        }

        Ok(builder)
    }

    async fn parse_success<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();

        // 204/205 have no body by RFC spec.
        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return serde_json::from_value(serde_json::Value::Null).map_err(|_| {
                ApiError::Client(format!(
                    "No content response ({}), but response type cannot be deserialized from an empty body",
                    status.as_u16()
                ))
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Client(format!("Failed to parse response: {e}")))
    }
}

/// Builder for [`ApiClient`].
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ApiClientConfig>,
    session: Option<Arc<dyn SessionStore>>,
}

impl ApiClientBuilder {
    /// Set the client configuration.
    pub fn config(mut self, config: ApiClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the session store capability.
    pub fn session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the session store is missing or client
    /// creation fails.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config.unwrap_or_default();
        let session =
            self.session.ok_or_else(|| ApiError::Config("Session store not set".to_string()))?;

        ApiClient::new(config, session)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::session::MemorySessionStore;

    fn client_for(server: &MockServer, session: Arc<dyn SessionStore>) -> ApiClient {
        let config = ApiClientConfig {
            base_url: server.uri(),
            retry: campus_common::resilience::RetryConfig::builder()
                .max_attempts(3)
                .fixed_backoff(std::time::Duration::from_millis(10))
                .build()
                .unwrap(),
            ..Default::default()
        };
        ApiClient::new(config, session).unwrap()
    }

    #[tokio::test]
    async fn builder_requires_session() {
        assert!(ApiClient::builder().build().is_err());

        let session = Arc::new(MemorySessionStore::new());
        assert!(ApiClient::builder().session(session).build().is_ok());
    }

    #[tokio::test]
    async fn get_parses_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        let envelope: Envelope<serde_json::Value> = client.get("/ping").await;

        assert_eq!(envelope.data, Some(serde_json::json!({"ok": true})));
        assert_eq!(envelope.error, None);
        assert!(!envelope.loading);
    }

    #[tokio::test]
    async fn delete_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/cursos/9"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        let envelope: Envelope<()> = client.delete("/cursos/9").await;

        assert!(envelope.is_success());
    }

    #[tokio::test]
    async fn in_flight_returns_to_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySessionStore::new()));
        assert_eq!(client.in_flight(), 0);
        let _: Envelope<serde_json::Value> = client.get("/x").await;
        assert_eq!(client.in_flight(), 0);
    }

    #[test]
    fn form_payload_rebuilds_per_attempt() {
        let form = FormPayload::new()
            .text("curso", "algebra")
            .file("adjunto", "plan.pdf", "application/pdf", vec![1, 2, 3]);

        // Two builds from the same payload must both succeed; the buffered
        // parts are what make multipart retries possible.
        assert!(form.build_form().is_ok());
        assert!(form.build_form().is_ok());
    }

    #[test]
    fn form_payload_rejects_bad_mime() {
        let form = FormPayload::new().file("f", "x.bin", "not a mime", vec![]);
        assert!(form.build_form().is_err());
    }
}
