//! Stateless HTTP transport with header rotation.
//!
//! Each request goes out with a user agent and referrer drawn at random from
//! fixed pools, plus the `Accept*` headers a desktop browser sends. No cookies
//! are kept between requests.

use super::{BackendKind, Document, FetchBackend};
use crate::credentials::Credentials;
use crate::error::{ExtractError, FetchError};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use rand::rng;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
];

pub const REFERRERS: [&str; 4] = [
    "https://www.google.com/",
    "https://www.google.com.br/",
    "https://www.bing.com/",
    "https://duckduckgo.com/",
];

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(with = "crate::retry::millis")]
    pub connect_timeout: Duration,
    #[serde(with = "crate::retry::millis")]
    pub request_timeout: Duration,
    pub accept_language: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            accept_language: "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
        }
    }
}

/// Headers for one request, with a freshly drawn user agent and referrer.
pub fn rotated_headers(accept_language: &str) -> HeaderMap {
    let mut r = rng();
    let agent = USER_AGENTS.choose(&mut r).copied().unwrap_or(USER_AGENTS[0]);
    let referrer = REFERRERS.choose(&mut r).copied().unwrap_or(REFERRERS[0]);

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(agent));
    headers.insert(REFERER, HeaderValue::from_static(referrer));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    if let Ok(lang) = HeaderValue::from_str(accept_language) {
        headers.insert(ACCEPT_LANGUAGE, lang);
    }
    headers
}

pub struct LightweightTransport {
    client: Client,
    config: HttpConfig,
}

impl LightweightTransport {
    pub fn new(config: HttpConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::BackendInit(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl FetchBackend for LightweightTransport {
    fn kind(&self) -> BackendKind {
        BackendKind::Lightweight
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&mut self, url: &str) -> Result<Document, FetchError> {
        let response = self
            .client
            .get(url)
            .headers(rotated_headers(&self.config.accept_language))
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(FetchError::from_reqwest)?;
        debug!(status = status.as_u16(), bytes = body.len(), "Fetched document");
        Ok(Document {
            url: url.to_string(),
            status: status.as_u16(),
            body,
            backend: BackendKind::Lightweight,
        })
    }

    async fn authenticate(&mut self, _credentials: &Credentials) -> Result<(), ExtractError> {
        Err(ExtractError::Authentication(
            "lightweight transport keeps no session".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.accept_language.starts_with("pt-BR"));
    }

    #[test]
    fn test_rotated_headers_come_from_pools() {
        for _ in 0..20 {
            let headers = rotated_headers("pt-BR");
            let agent = headers.get(USER_AGENT).unwrap().to_str().unwrap();
            let referrer = headers.get(REFERER).unwrap().to_str().unwrap();
            assert!(USER_AGENTS.contains(&agent));
            assert!(REFERRERS.contains(&referrer));
            assert_eq!(headers.get(ACCEPT_LANGUAGE).unwrap(), "pt-BR");
        }
    }

    #[tokio::test]
    async fn test_lightweight_cannot_authenticate() {
        let mut transport = LightweightTransport::new(HttpConfig::default()).unwrap();
        let err = transport
            .authenticate(&Credentials::new("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Authentication(_)));
        assert_eq!(transport.kind(), BackendKind::Lightweight);
    }
}
