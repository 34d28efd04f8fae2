//! qBittorrent Web API v2 connector
//!
//! Implements the `RemoteCollectionSource` trait on top of a bridge
//! `HttpClient`.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::remote::{RemoteCollection, RemoteCollectionFile, RemoteCollectionSource};
use core_runtime::logging::redact_if_sensitive;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::QbittorrentError;
use crate::types::{TorrentFile, TorrentInfo};

const LOGIN_PATH: &str = "/api/v2/auth/login";
const TORRENTS_INFO_PATH: &str = "/api/v2/torrents/info";
const TORRENT_FILES_PATH: &str = "/api/v2/torrents/files";

/// Session cookie name issued by the Web UI
const SESSION_COOKIE: &str = "SID";

/// Body returned by the login endpoint when credentials are rejected
const LOGIN_REJECTED_BODY: &str = "Fails.";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// qBittorrent Web API connector
///
/// Holds one cookie session shared by every caller. The connector is `Sync`
/// and may be used from many fetch workers at once.
///
/// # Example
///
/// ```ignore
/// use provider_qbittorrent::QbittorrentConnector;
/// use bridge_traits::remote::RemoteCollectionSource;
///
/// let connector = QbittorrentConnector::new(http_client, "http://qbt.home", "admin", "adminadmin");
/// connector.authenticate().await?;
/// let torrents = connector.list_collections().await?;
/// ```
pub struct QbittorrentConnector {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    username: String,
    password: String,
    timeout: Duration,
    retry_policy: RetryPolicy,
    session: RwLock<Option<String>>,
}

impl std::fmt::Debug for QbittorrentConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QbittorrentConnector")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &redact_if_sensitive("password", &self.password))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl QbittorrentConnector {
    /// Create a connector for the Web UI at `base_url` (scheme, host and
    /// optional port, no trailing path).
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            session: RwLock::new(None),
        }
    }

    /// Per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry policy applied to listing requests. Login is never retried.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a session cookie is currently held.
    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Pull `SID=<value>` out of a `Set-Cookie` header.
    fn session_cookie(response: &HttpResponse) -> Option<String> {
        let header = response.header("Set-Cookie")?;
        header
            .split([';', ','])
            .map(str::trim)
            .find_map(|part| part.strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    async fn login(&self) -> std::result::Result<(), QbittorrentError> {
        let request = HttpRequest::new(HttpMethod::Post, self.url(LOGIN_PATH))
            .header("Referer", self.base_url.clone())
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .timeout(self.timeout);

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await
            .map_err(|e| QbittorrentError::NetworkError(e.to_string()))?;

        if response.status == 403 {
            return Err(QbittorrentError::AuthenticationFailed(
                "client address is banned after too many failed logins".to_string(),
            ));
        }
        if !response.is_success() {
            return Err(QbittorrentError::ApiError {
                status_code: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        let body = String::from_utf8_lossy(&response.body);
        if body.trim() == LOGIN_REJECTED_BODY {
            return Err(QbittorrentError::AuthenticationFailed(
                "invalid username or password".to_string(),
            ));
        }

        let sid = Self::session_cookie(&response);
        if sid.is_none() {
            // Whitelisted clients are let in without a cookie.
            debug!("Login succeeded without a session cookie");
        }
        *self.session.write().await = sid;
        Ok(())
    }

    /// GET an API path and decode its JSON body.
    #[instrument(skip(self))]
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> std::result::Result<T, QbittorrentError> {
        let mut request = HttpRequest::new(HttpMethod::Get, self.url(path))
            .header("Accept", "application/json")
            .timeout(self.timeout);
        if let Some(sid) = self.session.read().await.as_deref() {
            request = request.cookie(SESSION_COOKIE, sid);
        }

        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        match response.status {
            200 => response
                .json()
                .map_err(|e| QbittorrentError::ParseError(e.to_string())),
            403 => {
                warn!("Session rejected by qBittorrent");
                *self.session.write().await = None;
                Err(QbittorrentError::AuthenticationFailed(
                    "session is not authorized".to_string(),
                ))
            }
            status => Err(QbittorrentError::ApiError {
                status_code: status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            }),
        }
    }
}

#[async_trait]
impl RemoteCollectionSource for QbittorrentConnector {
    #[instrument(skip(self), fields(base_url = %self.base_url, username = %self.username))]
    async fn authenticate(&self) -> Result<()> {
        self.login().await?;
        info!("Authenticated with qBittorrent");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_collections(&self) -> Result<Vec<RemoteCollection>> {
        let torrents: Vec<TorrentInfo> = self.get_json(TORRENTS_INFO_PATH).await?;
        info!(count = torrents.len(), "Listed torrents");
        Ok(torrents.into_iter().map(RemoteCollection::from).collect())
    }

    #[instrument(skip(self))]
    async fn files_of(&self, collection_id: &str) -> Result<Vec<RemoteCollectionFile>> {
        if collection_id.is_empty() {
            return Err(QbittorrentError::ApiError {
                status_code: 400,
                message: "torrent hash cannot be empty".to_string(),
            }
            .into());
        }

        let path = format!(
            "{}?hash={}",
            TORRENT_FILES_PATH,
            urlencoding::encode(collection_id)
        );
        let files: Vec<TorrentFile> = self.get_json(&path).await?;
        debug!(hash = %collection_id, count = files.len(), "Listed torrent files");
        Ok(files.into_iter().map(RemoteCollectionFile::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn login_ok() -> HttpResponse {
        let mut headers = HashMap::new();
        headers.insert(
            "set-cookie".to_string(),
            "SID=abc123; HttpOnly; SameSite=Strict; path=/".to_string(),
        );
        HttpResponse {
            status: 200,
            headers,
            body: Bytes::from_static(b"Ok."),
        }
    }

    fn connector(mock_http: MockHttpClient) -> QbittorrentConnector {
        QbittorrentConnector::new(Arc::new(mock_http), "http://qbt.home/", "admin", "secret")
            .with_retry_policy(RetryPolicy::no_retry())
    }

    #[test]
    fn test_session_cookie_parsing() {
        assert_eq!(
            QbittorrentConnector::session_cookie(&login_ok()),
            Some("abc123".to_string())
        );
        assert_eq!(QbittorrentConnector::session_cookie(&response(200, "Ok.")), None);
    }

    #[test]
    fn test_debug_redacts_password() {
        let connector = connector(MockHttpClient::new());
        let debug = format!("{:?}", connector);

        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_authenticate_stores_session() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url == "http://qbt.home/api/v2/auth/login"
                    && req.body.as_deref() == Some(&b"username=admin&password=secret"[..])
            })
            .times(1)
            .returning(|_| Ok(login_ok()));

        let connector = connector(mock_http);
        connector.authenticate().await.unwrap();

        assert!(connector.has_session().await);
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_authentication_errors() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, "Fails.")));

        let connector = connector(mock_http);
        let error = connector.authenticate().await.unwrap_err();

        assert!(error.is_authentication());
        assert!(!connector.has_session().await);
    }

    #[tokio::test]
    async fn test_banned_client_is_authentication_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(403, "Forbidden")));

        let error = connector(mock_http).authenticate().await.unwrap_err();
        assert!(error.is_authentication());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_not_authentication_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("connection refused".to_string())));

        let error = connector(mock_http).authenticate().await.unwrap_err();
        assert!(!error.is_authentication());
    }

    #[tokio::test]
    async fn test_list_collections_sends_cookie() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(login_ok()));
        mock_http
            .expect_execute()
            .withf(|req| {
                req.url == "http://qbt.home/api/v2/torrents/info"
                    && req.headers.get("Cookie") == Some(&"SID=abc123".to_string())
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"[
                        {"hash": "aaa", "name": "Alpha", "size": 700, "save_path": "/downloads/movies"},
                        {"hash": "bbb", "name": "Gamma", "size": 450, "save_path": "/downloads/shows"}
                    ]"#,
                ))
            });

        let connector = connector(mock_http);
        connector.authenticate().await.unwrap();
        let collections = connector.list_collections().await.unwrap();

        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].id, "aaa");
        assert_eq!(collections[1].save_location, "/downloads/shows");
    }

    #[tokio::test]
    async fn test_files_of_encodes_hash() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| req.url == "http://qbt.home/api/v2/torrents/files?hash=a%20b")
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"[{"index": 0, "name": "s01e01.mkv", "size": 200}]"#,
                ))
            });

        let files = connector(mock_http).files_of("a b").await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_name, "s01e01.mkv");
        assert_eq!(files[0].size, 200);
    }

    #[tokio::test]
    async fn test_files_of_unknown_hash_is_api_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(404, "Torrent hash was not found")));

        let error = connector(mock_http).files_of("missing").await.unwrap_err();
        assert!(matches!(error, BridgeError::OperationFailed(msg) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_expired_session_is_cleared() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(login_ok()));
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(403, "Forbidden")));

        let connector = connector(mock_http);
        connector.authenticate().await.unwrap();
        let error = connector.list_collections().await.unwrap_err();

        assert!(error.is_authentication());
        assert!(!connector.has_session().await);
    }

    #[tokio::test]
    async fn test_malformed_listing_is_parse_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, "<html>")));

        let error = connector(mock_http).list_collections().await.unwrap_err();
        assert!(matches!(error, BridgeError::OperationFailed(msg) if msg.starts_with("Parse error")));
    }

    #[tokio::test]
    async fn test_empty_hash_rejected_without_request() {
        let error = connector(MockHttpClient::new()).files_of("").await.unwrap_err();
        assert!(matches!(error, BridgeError::OperationFailed(_)));
    }
}
