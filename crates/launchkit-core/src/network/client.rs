//! HTTP client with a uniform timeout and per-service authentication.
//!
//! Provides a wrapper around reqwest with:
//! - One bounded timeout applied to every request
//! - User-agent management
//! - Header (API key / token) or basic authentication
//! - Non-success statuses mapped to [`LaunchkitError::Remote`]

use crate::config::NetworkConfig;
use crate::{LaunchkitError, Result};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How requests authenticate against a service.
#[derive(Clone, Default)]
pub enum Auth {
    #[default]
    None,
    /// A single header, e.g. `X-Api-Key: <key>` or `Authorization: Token <key>`.
    Header { name: String, value: String },
    /// HTTP basic authentication.
    Basic { username: String, password: String },
}

impl Auth {
    /// `X-Api-Key` header as used by the *arr family and Syncthing.
    pub fn api_key(key: impl Into<String>) -> Self {
        Auth::Header {
            name: "X-Api-Key".to_string(),
            value: key.into(),
        }
    }

    /// `Authorization: Token <key>` as used by Linkding.
    pub fn token(key: impl AsRef<str>) -> Self {
        Auth::Header {
            name: header::AUTHORIZATION.to_string(),
            value: format!("Token {}", key.as_ref()),
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Auth::None => request,
            Auth::Header { name, value } => request.header(name.as_str(), value.as_str()),
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }
}

// Credentials stay out of logs.
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::None => write!(f, "Auth::None"),
            Auth::Header { name, .. } => write!(f, "Auth::Header({})", name),
            Auth::Basic { username, .. } => write!(f, "Auth::Basic({})", username),
        }
    }
}

/// Body and selected headers of a binary download.
#[derive(Debug, Clone)]
pub struct Download {
    pub content_disposition: Option<String>,
    pub bytes: Vec<u8>,
}

/// HTTP client shared by every plugin of a process.
pub struct HttpClient {
    client: Client,
    /// Default timeout for requests.
    default_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with the default request timeout.
    pub fn new(user_agent: &str) -> Result<Self> {
        Self::with_timeout(user_agent, NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a new HTTP client with a custom default timeout.
    pub fn with_timeout(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| LaunchkitError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// GET a URL and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, auth: &Auth) -> Result<T> {
        let response = self.send(Method::GET, url, auth, None, None).await?;
        response.json::<T>().await.map_err(|e| LaunchkitError::Json {
            message: format!("Failed to decode response from {}: {}", url, e),
            source: None,
        })
    }

    /// POST a JSON body, ignoring any response body.
    pub async fn post_json(&self, url: &str, auth: &Auth, body: &Value) -> Result<()> {
        self.send(Method::POST, url, auth, Some(body), None).await?;
        Ok(())
    }

    /// POST without a body.
    pub async fn post_empty(&self, url: &str, auth: &Auth) -> Result<()> {
        self.send(Method::POST, url, auth, None, None).await?;
        Ok(())
    }

    /// DELETE, optionally with a JSON body.
    pub async fn delete(&self, url: &str, auth: &Auth, body: Option<&Value>) -> Result<()> {
        self.send(Method::DELETE, url, auth, body, None).await?;
        Ok(())
    }

    /// GET raw bytes, with the longer download timeout.
    pub async fn download(&self, url: &str, auth: &Auth) -> Result<Download> {
        let response = self
            .send(
                Method::GET,
                url,
                auth,
                None,
                Some(NetworkConfig::DOWNLOAD_TIMEOUT),
            )
            .await?;

        let content_disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error("GET", url, e))?;

        Ok(Download {
            content_disposition,
            bytes: bytes.to_vec(),
        })
    }

    // Internal methods

    async fn send(
        &self,
        method: Method,
        url: &str,
        auth: &Auth,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        debug!("{} request to {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(header::ACCEPT, "application/json");
        request = auth.apply(request);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(method.as_str(), url, e))?;

        let status = response.status();
        debug!("Got response {} from {}", status.as_u16(), url);

        if status.is_success() {
            Ok(response)
        } else {
            warn!("Got response {} querying {}", status.as_u16(), url);
            Err(LaunchkitError::Remote {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }

    fn transport_error(&self, method: &str, url: &str, err: reqwest::Error) -> LaunchkitError {
        if err.is_timeout() {
            LaunchkitError::Timeout(self.default_timeout)
        } else {
            LaunchkitError::Network {
                message: format!("{} {} failed: {}", method, url, err),
                source: Some(err),
            }
        }
    }
}

/// A client bound to one service instance: base URL plus credentials.
#[derive(Clone)]
pub struct ServiceClient {
    http: Arc<HttpClient>,
    base_url: String,
    auth: Auth,
}

impl ServiceClient {
    pub fn new(http: Arc<HttpClient>, base_url: impl Into<String>, auth: Auth) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    /// Absolute URL for `path`; absolute inputs pass through unchanged.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.http.get_json(&self.url(path), &self.auth).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<()> {
        self.http.post_json(&self.url(path), &self.auth, body).await
    }

    pub async fn post_empty(&self, path: &str) -> Result<()> {
        self.http.post_empty(&self.url(path), &self.auth).await
    }

    pub async fn delete(&self, path: &str, body: Option<&Value>) -> Result<()> {
        self.http.delete(&self.url(path), &self.auth, body).await
    }

    pub async fn download(&self, path: &str) -> Result<Download> {
        self.http.download(&self.url(path), &self.auth).await
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .finish()
    }
}

/// Extract the host from a URL, for log messages.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.host_str().unwrap_or("unknown").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
