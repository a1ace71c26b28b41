//! W3C WebDriver client.
//!
//! Talks to a running driver (geckodriver, chromedriver, Selenium) over its
//! HTTP protocol with `reqwest`. Only the commands the reward flows need are
//! implemented.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::browser::{Browser, BrowserFactory, ElementHandle, Selector};
use super::http::{build_client, map_send_error};
use super::models::SessionArtifact;
use crate::error::{CdkError, Result};

/// Key under which WebDriver returns element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const FIND_BY_TEXT_SCRIPT: &str = r"
const [css, text] = arguments;
for (const el of document.querySelectorAll(css)) {
  if ((el.innerText || el.textContent || '').includes(text)) return el;
}
return null;";

const PAGE_TEXT_SCRIPT: &str = "return document.body ? document.body.innerText : '';";

/// Options for a new browser session.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub headless: bool,
    pub proxy: Option<String>,
}

/// Cookies of one origin, as persisted in a session artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredState {
    origin: String,
    cookies: Vec<Value>,
}

enum Reply {
    Value(Value),
    Error { error: String, message: String },
}

/// A live WebDriver session.
#[derive(Debug)]
pub struct WebDriverBrowser {
    client: Client,
    endpoint: String,
    session_id: String,
    timeout: Duration,
}

impl WebDriverBrowser {
    /// Open a new session on the driver at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`CdkError::DriverUnavailable`] when the driver cannot be
    /// reached or refuses to create a session.
    pub async fn connect(endpoint: &str, options: &LaunchOptions, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let client = build_client(timeout, None)?;
        let unavailable = |message: String| CdkError::DriverUnavailable {
            url: endpoint.clone(),
            message,
        };

        let response = client
            .post(format!("{endpoint}/session"))
            .json(&capabilities(options)?)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| unavailable(format!("unreadable reply: {e}")))?;

        let value = body.get("value").cloned().unwrap_or(Value::Null);
        if !status.is_success() {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("session not created");
            return Err(unavailable(format!("HTTP {status}: {message}")));
        }
        let session_id = value
            .get("sessionId")
            .or_else(|| body.get("sessionId"))
            .and_then(Value::as_str)
            .ok_or_else(|| unavailable("reply carried no session id".to_string()))?
            .to_string();

        tracing::debug!(endpoint = %endpoint, session = %session_id, "WebDriver session created");
        Ok(Self {
            client,
            endpoint,
            session_id,
            timeout,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}/session/{}{path}", self.endpoint, self.session_id)
    }

    async fn call(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> Result<Reply> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| map_send_error(&e, self.timeout))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| CdkError::Browser(format!("unreadable driver reply: {e}")))?;
        let value = body.get("value").cloned().unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(Reply::Value(value));
        }
        Ok(Reply::Error {
            error: value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    async fn command(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> Result<Value> {
        match self.call(method, path, body).await? {
            Reply::Value(value) => Ok(value),
            Reply::Error { error, message } => {
                Err(CdkError::Browser(format!("{path}: {error}: {message}")))
            }
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.command(reqwest::Method::POST, path, Some(body)).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.command(reqwest::Method::GET, path, None).await
    }

    async fn execute(&self, script: &str, args: Value) -> Result<Value> {
        self.post("/execute/sync", json!({ "script": script, "args": args }))
            .await
    }
}

/// Extract an element reference from a WebDriver value.
fn element_from(value: &Value) -> Option<ElementHandle> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(ElementHandle::new)
}

/// New-session payload.
fn capabilities(options: &LaunchOptions) -> Result<Value> {
    let (firefox_args, chrome_args): (Vec<&str>, Vec<&str>) = if options.headless {
        (vec!["-headless"], vec!["--headless=new"])
    } else {
        (Vec::new(), Vec::new())
    };

    let mut always_match = json!({
        "moz:firefoxOptions": {
            "args": firefox_args,
            "prefs": { "intl.accept_languages": "zh-CN" }
        },
        "goog:chromeOptions": { "args": chrome_args }
    });
    if let Some(proxy) = &options.proxy {
        always_match["proxy"] = proxy_capability(proxy)?;
    }
    Ok(json!({ "capabilities": { "alwaysMatch": always_match } }))
}

/// Translate a proxy URL into the WebDriver `proxy` capability.
fn proxy_capability(proxy: &str) -> Result<Value> {
    let url = Url::parse(proxy).map_err(|e| CdkError::Config(format!("invalid proxy {proxy}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| CdkError::Config(format!("proxy {proxy} has no host")))?;
    let port = url.port_or_known_default().unwrap_or(8080);
    let address = format!("{host}:{port}");

    Ok(match url.scheme() {
        "socks5" | "socks5h" => json!({
            "proxyType": "manual",
            "socksProxy": address,
            "socksVersion": 5
        }),
        _ => json!({
            "proxyType": "manual",
            "httpProxy": address,
            "sslProxy": address
        }),
    })
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        tracing::debug!(url = %url, "Navigating");
        self.post("/url", json!({ "url": url })).await.map(|_| ())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .get("/url")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn query(&self, selector: &Selector) -> Result<Option<ElementHandle>> {
        if let Some(text) = &selector.text {
            let value = self
                .execute(FIND_BY_TEXT_SCRIPT, json!([selector.css, text]))
                .await?;
            return Ok(element_from(&value));
        }

        let body = json!({ "using": "css selector", "value": selector.css });
        match self.call(reqwest::Method::POST, "/element", Some(body)).await? {
            Reply::Value(value) => Ok(element_from(&value)),
            Reply::Error { error, .. } if error == "no such element" => Ok(None),
            Reply::Error { error, message } => {
                Err(CdkError::Browser(format!("query {selector}: {error}: {message}")))
            }
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.post(&format!("/element/{}/click", element.id()), json!({}))
            .await
            .map(|_| ())
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> Result<()> {
        self.post(&format!("/element/{}/clear", element.id()), json!({}))
            .await?;
        self.post(
            &format!("/element/{}/value", element.id()),
            json!({ "text": value }),
        )
        .await
        .map(|_| ())
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let value = self
            .get(&format!("/element/{}/attribute/{name}", element.id()))
            .await?;
        Ok(match value {
            Value::String(s) => Some(s),
            Value::Bool(true) => Some("true".to_string()),
            _ => None,
        })
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.execute(script, json!([])).await
    }

    async fn page_text(&self) -> Result<String> {
        Ok(self
            .evaluate(PAGE_TEXT_SCRIPT)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let encoded = self.get("/screenshot").await?;
        BASE64
            .decode(encoded.as_str().unwrap_or_default())
            .map_err(|e| CdkError::Browser(format!("screenshot decode: {e}")))
    }

    async fn export_state(&self) -> Result<SessionArtifact> {
        let current = self.current_url().await?;
        let origin = Url::parse(&current)
            .map_err(|e| CdkError::Browser(format!("current url {current}: {e}")))?
            .origin()
            .ascii_serialization();
        let cookies = match self.get("/cookie").await? {
            Value::Array(cookies) => cookies,
            _ => Vec::new(),
        };
        let state = StoredState { origin, cookies };
        Ok(SessionArtifact::new(serde_json::to_string(&state)?))
    }

    async fn restore_state(&self, artifact: &SessionArtifact) -> Result<()> {
        let state: StoredState = serde_json::from_str(artifact.as_str())?;
        // Cookies can only be set for the origin currently loaded.
        self.navigate(&state.origin).await?;
        for cookie in state.cookies {
            let name = cookie
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let Err(e) = self.post("/cookie", json!({ "cookie": cookie })).await {
                tracing::debug!(cookie = %name, error = %e, "Skipping cookie that could not be restored");
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.command(reqwest::Method::DELETE, "", None)
            .await
            .map(|_| ())
    }
}

/// Opens [`WebDriverBrowser`] sessions on one driver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    pub endpoint: String,
    pub headless: bool,
    pub timeout: Duration,
}

#[async_trait]
impl BrowserFactory for WebDriverFactory {
    async fn launch(&self, proxy: Option<&str>) -> Result<Arc<dyn Browser>> {
        let options = LaunchOptions {
            headless: self.headless,
            proxy: proxy.map(str::to_string),
        };
        let browser = WebDriverBrowser::connect(&self.endpoint, &options, self.timeout).await?;
        Ok(Arc::new(browser))
    }
}
