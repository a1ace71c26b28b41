//! HTTP transport.
//!
//! Provider flows talk to the reward platforms through the [`Transport`]
//! trait. [`ReqwestTransport`] keeps one `reqwest` client per proxy so
//! accounts with different proxies can run side by side.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, ClientBuilder, Proxy};

use super::models::RawOutcome;
use crate::error::{CdkError, Result};

/// Default per-request timeout, used for `general.timeout_seconds`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Browser-like user agent the platforms expect.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outgoing request.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub cookies: BTreeMap<String, String>,
    pub bearer: Option<String>,
    pub proxy: Option<String>,
}

impl HttpRequest {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            cookies: BTreeMap::new(),
            bearer: None,
            proxy: None,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn cookies(mut self, jar: &BTreeMap<String, String>) -> Self {
        self.cookies
            .extend(jar.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[must_use]
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: Option<&str>) -> Self {
        self.proxy = proxy.map(str::to_string);
        self
    }

    /// Value of the `Cookie` header, if any cookies are set.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

/// Status and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Convert to a raw outcome for classification.
    #[must_use]
    pub fn into_outcome(self) -> RawOutcome {
        RawOutcome::from_http(self.status, &self.body)
    }
}

/// Sends requests to reward platforms.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. Non-2xx statuses are returned, not raised.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if the proxy URL is invalid or client construction fails.
pub fn build_client(timeout: Duration, proxy: Option<&str>) -> Result<Client> {
    let mut builder = ClientBuilder::new().timeout(timeout).user_agent(USER_AGENT);
    if let Some(proxy) = proxy {
        let proxy = Proxy::all(proxy)
            .map_err(|e| CdkError::Config(format!("invalid proxy {proxy}: {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| CdkError::Network(e.to_string()))
}

/// Map a `reqwest` send error onto the crate error type.
pub(crate) fn map_send_error(e: &reqwest::Error, timeout: Duration) -> CdkError {
    if e.is_timeout() {
        CdkError::Timeout(timeout.as_secs())
    } else {
        CdkError::Network(e.to_string())
    }
}

/// `reqwest`-backed transport with one client per proxy.
#[derive(Debug)]
pub struct ReqwestTransport {
    timeout: Duration,
    default_proxy: Option<String>,
    clients: DashMap<Option<String>, Client>,
}

impl ReqwestTransport {
    /// Create a transport; `default_proxy` applies to requests without one.
    #[must_use]
    pub fn new(timeout: Duration, default_proxy: Option<String>) -> Self {
        Self {
            timeout,
            default_proxy,
            clients: DashMap::new(),
        }
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client> {
        let key = proxy.map(str::to_string);
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }
        let client = build_client(self.timeout, proxy)?;
        self.clients.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let proxy = request.proxy.as_deref().or(self.default_proxy.as_deref());
        let client = self.client_for(proxy)?;

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url).body(""),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = request.cookie_header() {
            builder = builder.header("cookie", cookie);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        tracing::debug!(method = ?request.method, url = %request.url, "Sending request");
        let response = builder
            .send()
            .await
            .map_err(|e| map_send_error(&e, self.timeout))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| map_send_error(&e, self.timeout))?;
        tracing::debug!(url = %request.url, status, bytes = body.len(), "Response received");

        Ok(HttpResponse { status, body })
    }
}
