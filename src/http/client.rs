//! API client
//!
//! Builds request descriptors against a configured base URL and sends them
//! through a [`Dispatcher`]. Resource-specific wrappers sit on top of this and
//! decide how their reads are classified and what to invalidate after writes.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::{
    Classification, Dispatcher, ReqwestTransport, RequestDescriptor, Transport, TransportError,
};
use crate::cache::{CacheStore, Envelope};
use crate::config::{ClientConfig, ConfigError};

/// Errors that can occur when using the API client
#[derive(Debug, Error)]
pub enum ClientError {
    /// No base URL was configured
    #[error("No base URL configured")]
    MissingBaseUrl,

    /// Base URL or request path could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request path resolved to a URL outside the base URL
    #[error("Path '{0}' resolves outside the base URL")]
    OutsideBaseUrl(String),

    /// Configuration was invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The request itself failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// HTTP client with a response cache in front of its reads
#[derive(Clone)]
pub struct ApiClient {
    dispatcher: Dispatcher,
    base_url: Url,
    default_headers: HeaderMap,
}

impl ApiClient {
    /// Creates a client that uses `reqwest` and the process-wide cache
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(ReqwestTransport::from_config(config)?);
        Self::with_transport(config, transport, CacheStore::global())
    }

    /// Creates a client with an explicit transport and cache store
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<CacheStore>,
    ) -> Result<Self, ClientError> {
        let base = config.base_url.as_deref().ok_or(ClientError::MissingBaseUrl)?;
        let mut base_url = Url::parse(base)?;
        // Without a trailing slash, joining would replace the last segment
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            dispatcher: Dispatcher::with_store(transport, store),
            base_url,
            default_headers: config.header_map()?,
        })
    }

    /// The dispatcher requests are sent through
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Base URL with a guaranteed trailing slash
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds a descriptor for `path` relative to the base URL
    ///
    /// Paths that resolve to another origin or above the base path, such as
    /// absolute URLs or `../` segments, are rejected so default headers are
    /// only ever sent to the configured API.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestDescriptor, ClientError> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        let same_origin = url.origin() == self.base_url.origin();
        if !same_origin || !url.path().starts_with(self.base_url.path()) {
            return Err(ClientError::OutsideBaseUrl(path.to_string()));
        }
        Ok(RequestDescriptor::new(method, url).with_headers(self.default_headers.clone()))
    }

    /// Sends a prepared descriptor
    pub async fn send(
        &self,
        request: &RequestDescriptor,
        classification: Option<&Classification>,
    ) -> Result<Envelope, ClientError> {
        Ok(self.dispatcher.dispatch(request, classification).await?)
    }

    /// GET `path`, served from cache when possible
    pub async fn get(
        &self,
        path: &str,
        classification: Option<&Classification>,
    ) -> Result<Envelope, ClientError> {
        let request = self.request(Method::GET, path)?;
        self.send(&request, classification).await
    }

    /// GET `path` with query parameters
    pub async fn get_with_params(
        &self,
        path: &str,
        params: &[(&str, &str)],
        classification: Option<&Classification>,
    ) -> Result<Envelope, ClientError> {
        let request = params
            .iter()
            .fold(self.request(Method::GET, path)?, |request, (name, value)| {
                request.with_param(*name, *value)
            });
        self.send(&request, classification).await
    }

    /// POST a JSON body to `path`
    pub async fn post(&self, path: &str, body: Value) -> Result<Envelope, ClientError> {
        self.write(Method::POST, path, Some(body)).await
    }

    /// PUT a JSON body to `path`
    pub async fn put(&self, path: &str, body: Value) -> Result<Envelope, ClientError> {
        self.write(Method::PUT, path, Some(body)).await
    }

    /// PATCH `path` with a JSON body
    pub async fn patch(&self, path: &str, body: Value) -> Result<Envelope, ClientError> {
        self.write(Method::PATCH, path, Some(body)).await
    }

    /// DELETE `path`
    pub async fn delete(&self, path: &str) -> Result<Envelope, ClientError> {
        self.write(Method::DELETE, path, None).await
    }

    async fn write(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Envelope, ClientError> {
        let mut request = self.request(method, path)?;
        request.body = body;
        self.send(&request, None).await
    }

    /// Removes cached reads by group and action
    pub fn invalidate(&self, group: Option<&str>, action: Option<&str>) -> usize {
        self.dispatcher.invalidate(group, action)
    }

    /// Removes the cached read stored under `id`
    pub fn invalidate_by_id(&self, id: &str) -> bool {
        self.dispatcher.invalidate_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::TransportResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Transport that records every request and echoes it back
    #[derive(Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<RequestDescriptor>>,
    }

    impl RecordingTransport {
        fn urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| format!("{} {}", r.method, r.resolved_url()))
                .collect()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(
            &self,
            request: &RequestDescriptor,
        ) -> Result<TransportResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(TransportResponse {
                status: 200,
                data: json!({ "body": request.body }),
            })
        }
    }

    fn config(base_url: &str) -> ClientConfig {
        ClientConfig {
            base_url: Some(base_url.to_string()),
            ..Default::default()
        }
    }

    fn client(base_url: &str) -> (ApiClient, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let client = ApiClient::with_transport(
            &config(base_url),
            transport.clone(),
            Arc::new(CacheStore::new()),
        )
        .unwrap();
        (client, transport)
    }

    #[test]
    fn test_missing_base_url_is_rejected() {
        let result = ApiClient::with_transport(
            &ClientConfig::default(),
            Arc::new(RecordingTransport::default()),
            Arc::new(CacheStore::new()),
        );
        assert!(matches!(result, Err(ClientError::MissingBaseUrl)));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = ApiClient::with_transport(
            &config("not a url"),
            Arc::new(RecordingTransport::default()),
            Arc::new(CacheStore::new()),
        );
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_request_paths_keep_base_path() {
        let (client, _) = client("https://api.example.com/v1");

        assert_eq!(client.base_url().as_str(), "https://api.example.com/v1/");
        let request = client.request(Method::GET, "/customers/5").unwrap();
        assert_eq!(request.url.as_str(), "https://api.example.com/v1/customers/5");
    }

    #[test]
    fn test_request_rejects_paths_outside_base() {
        let (client, _) = client("https://api.example.com/v1");

        for path in [
            "https://other.example/x",
            "../admin",
            "v1/../../admin",
            "http://api.example.com/v1/lists",
        ] {
            assert!(
                matches!(
                    client.request(Method::GET, path),
                    Err(ClientError::OutsideBaseUrl(_))
                ),
                "{} should be rejected",
                path
            );
        }
    }

    #[test]
    fn test_request_allows_nested_paths_and_queries() {
        let (client, _) = client("https://api.example.com/v1/");

        let request = client.request(Method::GET, "lists/3/members?page=2").unwrap();
        assert_eq!(
            request.url.as_str(),
            "https://api.example.com/v1/lists/3/members?page=2"
        );
    }

    #[tokio::test]
    async fn test_get_outside_base_never_reaches_transport() {
        let (client, transport) = client("https://api.example.com/v1/");

        let result = client.get("https://other.example/steal", None).await;

        assert!(matches!(result, Err(ClientError::OutsideBaseUrl(_))));
        assert!(transport.urls().is_empty());
    }

    #[test]
    fn test_request_carries_default_headers() {
        let mut config = config("https://api.example.com/");
        config
            .default_headers
            .insert("X-Api-Version".to_string(), "3".to_string());
        let client = ApiClient::with_transport(
            &config,
            Arc::new(RecordingTransport::default()),
            Arc::new(CacheStore::new()),
        )
        .unwrap();

        let request = client.request(Method::GET, "lists").unwrap();
        assert_eq!(request.headers.get("x-api-version").unwrap(), "3");
    }

    #[tokio::test]
    async fn test_get_is_cached_and_writes_are_not() {
        let (client, transport) = client("https://api.example.com/v1/");
        let lists = Classification::new().with_group("lists").with_action("list");

        client.get("lists", Some(&lists)).await.unwrap();
        let cached = client.get("lists", Some(&lists)).await.unwrap();
        assert!(cached.is_cache);

        let created = client.post("lists", json!({"name": "new"})).await.unwrap();
        assert!(!created.is_cache);
        assert_eq!(created.data["body"], json!({"name": "new"}));

        // Writes do not invalidate on their own
        assert!(client.get("lists", Some(&lists)).await.unwrap().is_cache);

        assert_eq!(client.invalidate(Some("lists"), None), 1);
        assert!(!client.get("lists", Some(&lists)).await.unwrap().is_cache);

        assert_eq!(
            transport.urls(),
            vec![
                "GET https://api.example.com/v1/lists",
                "POST https://api.example.com/v1/lists",
                "GET https://api.example.com/v1/lists",
            ]
        );
    }

    #[tokio::test]
    async fn test_get_with_params_builds_query() {
        let (client, transport) = client("https://api.example.com/");

        client
            .get_with_params("participants", &[("page", "2"), ("limit", "25")], None)
            .await
            .unwrap();

        assert_eq!(
            transport.urls(),
            vec!["GET https://api.example.com/participants?page=2&limit=25"]
        );
    }

    #[tokio::test]
    async fn test_write_methods_send_expected_verbs() {
        let (client, transport) = client("https://api.example.com/");

        client.put("content/1", json!({"title": "a"})).await.unwrap();
        client.patch("content/1", json!({"title": "b"})).await.unwrap();
        client.delete("content/1").await.unwrap();

        assert_eq!(
            transport.urls(),
            vec![
                "PUT https://api.example.com/content/1",
                "PATCH https://api.example.com/content/1",
                "DELETE https://api.example.com/content/1",
            ]
        );
        assert!(client.dispatcher().store().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_by_id_after_update() {
        let (client, transport) = client("https://api.example.com/");
        let single = Classification::new().with_id("customer-5");

        client.get("customers/5", Some(&single)).await.unwrap();
        client.put("customers/5", json!({"name": "z"})).await.unwrap();
        assert!(client.invalidate_by_id("customer-5"));
        let refreshed = client.get("customers/5", Some(&single)).await.unwrap();

        assert!(!refreshed.is_cache);
        assert_eq!(transport.urls().len(), 3);
    }
}
