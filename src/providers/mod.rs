//! Provider-specific reward flows.
//!
//! Each provider has its own submodule implementing [`RewardFlow`]. The HTTP
//! providers share [`Endpoint`] for request plumbing; `b4u` drives a browser.

pub mod b4u;
pub mod runawaytime;
pub mod x666;

use std::sync::Arc;

use crate::core::http::{HttpRequest, Method, Transport};
use crate::core::models::{ProviderCredentials, RawOutcome};
use crate::error::{CdkError, Result};

pub use crate::core::provider::{Provider, RewardFlow};

/// Base URL, transport and proxy for one HTTP provider run.
#[derive(Clone)]
pub struct Endpoint {
    transport: Arc<dyn Transport>,
    base_url: String,
    proxy: Option<String>,
}

impl Endpoint {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>, proxy: Option<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            proxy,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path on this provider.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Start a request with the browser-like headers the platforms expect.
    #[must_use]
    pub fn request(&self, method: Method, path: &str, referer_path: &str) -> HttpRequest {
        let url = self.url(path);
        let request = match method {
            Method::Get => HttpRequest::get(url),
            Method::Post => HttpRequest::post(url).header("origin", self.base_url.as_str()),
        };
        browser_headers(request)
            .header("referer", self.url(referer_path))
            .cookie("i18next", "en")
            .proxy(self.proxy.as_deref())
    }

    /// Send a request and turn the response into a raw outcome.
    pub async fn send(&self, request: HttpRequest) -> Result<RawOutcome> {
        let response = self.transport.send(request).await?;
        Ok(response.into_outcome())
    }
}

/// Headers a desktop Chrome sends on same-origin fetches.
#[must_use]
pub fn browser_headers(request: HttpRequest) -> HttpRequest {
    request
        .header("accept", "*/*")
        .header("accept-language", "en,en-US;q=0.9,zh;q=0.8")
        .header("cache-control", "no-cache")
        .header("pragma", "no-cache")
        .header(
            "sec-ch-ua",
            r#""Google Chrome";v="143", "Chromium";v="143", "Not A(Brand";v="24""#,
        )
        .header("sec-ch-ua-mobile", "?0")
        .header("sec-ch-ua-platform", r#""macOS""#)
        .header("sec-fetch-dest", "empty")
        .header("sec-fetch-mode", "cors")
        .header("sec-fetch-site", "same-origin")
}

/// Build the flow for an HTTP-only provider.
///
/// # Errors
///
/// Returns an error when the credentials do not fit the provider or the
/// provider needs a browser.
pub fn build_http_flow(
    provider: Provider,
    credentials: ProviderCredentials,
    endpoint: Endpoint,
) -> Result<Box<dyn RewardFlow>> {
    match (provider, credentials) {
        (Provider::RunawaytimeCheckin, ProviderCredentials::CookieJar(cookies)) => {
            Ok(Box::new(runawaytime::RunawaytimeFlow::checkin(endpoint, cookies)))
        }
        (Provider::RunawaytimeWheel, ProviderCredentials::CookieJar(cookies)) => {
            Ok(Box::new(runawaytime::RunawaytimeFlow::wheel(endpoint, cookies)))
        }
        (Provider::X666, ProviderCredentials::BearerToken(token)) => {
            Ok(Box::new(x666::X666Flow::new(endpoint, token)))
        }
        (Provider::B4u, _) => Err(CdkError::Config(
            "b4u runs through a browser session".to_string(),
        )),
        (provider, credentials) => Err(CdkError::Config(format!(
            "{provider} cannot use {} credentials",
            credentials.kind()
        ))),
    }
}
