use std::{future::Future, time::Duration};

use log::debug;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;

use crate::scrape_error::{Result, ScrapflyError};

// The scrape endpoint can hold a rendering request open for up to 150s.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(165);

/// Parameters of one rendered-page scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeConfig {
    pub url: String,
    pub asp: bool,
    pub render_js: bool,
    pub auto_scroll: bool,
    pub wait_for_selector: Option<String>,
    pub lang: Vec<String>,
    pub debug: bool,
}

impl ScrapeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            asp: false,
            render_js: false,
            auto_scroll: false,
            wait_for_selector: None,
            lang: Vec::new(),
            debug: false,
        }
    }

    /// Base config for x.com pages: anti-bot bypass and javascript rendering.
    pub fn twitter(url: impl Into<String>) -> Self {
        Self {
            asp: true,
            render_js: true,
            ..Self::new(url)
        }
    }

    pub fn auto_scroll(mut self, auto_scroll: bool) -> Self {
        self.auto_scroll = auto_scroll;
        self
    }

    pub fn wait_for_selector(mut self, selector: impl Into<String>) -> Self {
        self.wait_for_selector = Some(selector.into());
        self
    }

    pub fn lang(mut self, lang: &[&str]) -> Self {
        self.lang = lang.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn query_params(&self, key: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("key", key.to_string()),
            ("url", self.url.clone()),
            ("asp", self.asp.to_string()),
            ("render_js", self.render_js.to_string()),
            ("auto_scroll", self.auto_scroll.to_string()),
            ("debug", self.debug.to_string()),
        ];
        if let Some(selector) = &self.wait_for_selector {
            params.push(("wait_for_selector", selector.clone()));
        }
        if !self.lang.is_empty() {
            params.push(("lang", self.lang.join(",")));
        }
        params
    }
}

/// A background request the browser made while rendering the page.
#[derive(Debug, Clone, Deserialize)]
pub struct XhrCall {
    pub url: String,
    #[serde(default)]
    pub response: Option<XhrResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XhrResponse {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub content: String,
    pub status_code: u16,
    pub xhr_calls: Vec<XhrCall>,
}

#[derive(Deserialize)]
struct ApiEnvelope {
    result: ApiResult,
}

#[derive(Deserialize)]
struct ApiResult {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    status_code: u16,
    #[serde(default)]
    browser_data: Option<BrowserData>,
}

#[derive(Deserialize)]
struct BrowserData {
    #[serde(default)]
    xhr_call: Vec<XhrCall>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl ScrapeResult {
    pub fn from_api_body(body: &str) -> Result<Self> {
        let envelope: ApiEnvelope = serde_json::from_str(body)?;
        let result = envelope.result;
        Ok(Self {
            content: result.content.unwrap_or_default(),
            status_code: result.status_code,
            xhr_calls: result.browser_data.map(|b| b.xhr_call).unwrap_or_default(),
        })
    }

    /// Rejects pages the scraped website answered with a 4xx/5xx status.
    pub fn error_for_upstream_status(self) -> Result<Self> {
        if self.status_code >= 400 {
            return Err(ScrapflyError::Upstream {
                status: self.status_code,
            });
        }
        Ok(self)
    }
}

/// Error for a non-2xx reply of the scrape endpoint itself.
fn api_error(status: u16, body: String) -> ScrapflyError {
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or(body);
    ScrapflyError::Api { status, message }
}

/// Anything that can render a page for us.
pub trait Scrape {
    fn scrape(&self, config: &ScrapeConfig) -> impl Future<Output = Result<ScrapeResult>> + Send;
}

pub struct ScrapflyClient {
    client: Client,
    api_url: String,
    key: String,
}

impl ScrapflyClient {
    pub fn new(api_url: &str, key: &str) -> anyhow::Result<Self> {
        let client = ClientBuilder::new().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }
}

impl Scrape for ScrapflyClient {
    async fn scrape(&self, config: &ScrapeConfig) -> Result<ScrapeResult> {
        debug!("requesting render of {}", config.url);
        let response = self
            .client
            .get(format!("{}/scrape", self.api_url))
            .query(&config.query_params(&self.key))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), body));
        }

        ScrapeResult::from_api_body(&body)
    }
}
