//! Authenticated session transport.
//!
//! Holds a cookie jar, logs in through the source's HTML login form, and
//! renders pages through a headless browser `/content` endpoint (Browserless
//! API) so JavaScript-gated articles come back fully rendered. The session
//! cookies are forwarded to the renderer on every request.
//!
//! Initialization fails when no rendering endpoint is configured or when it
//! cannot be reached; the owning [`FetchChain`](super::FetchChain) then falls
//! back to the lightweight transport.

use super::lightweight::{HttpConfig, rotated_headers};
use super::{BackendKind, Document, FetchBackend};
use crate::credentials::Credentials;
use crate::error::{ExtractError, FetchError};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Headless browser endpoint used to render pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererEndpoint {
    pub base_url: String,
    pub token: Option<String>,
}

impl RendererEndpoint {
    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }
}

/// How to log in to a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginForm {
    pub login_url: String,
    /// Form field receiving the identity (e-mail).
    pub identity_field: String,
    pub secret_field: String,
    /// Substrings of the post-login URL that mean success.
    pub success_markers: Vec<String>,
    /// Page that only answers 200 to an authenticated session.
    pub verify_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub login: LoginForm,
    pub renderer: Option<RendererEndpoint>,
    pub http: HttpConfig,
}

struct Session {
    client: Client,
    jar: Arc<Jar>,
    renderer: RendererEndpoint,
    authenticated: bool,
}

pub struct SessionTransport {
    config: SessionConfig,
    session: Option<Session>,
}

impl SessionTransport {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.authenticated)
    }

    fn session_mut(&mut self) -> Result<&mut Session, FetchError> {
        self.session
            .as_mut()
            .ok_or_else(|| FetchError::BackendInit("session transport not initialized".to_string()))
    }
}

/// Action URL and hidden inputs of the first form on a login page.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct LoginPage {
    pub action: String,
    pub hidden: Vec<(String, String)>,
}

pub(crate) fn parse_login_page(html: &str, page_url: &str) -> Option<LoginPage> {
    let document = Html::parse_document(html);
    let form_sel = Selector::parse("form").ok()?;
    let hidden_sel = Selector::parse(r#"input[type="hidden"]"#).ok()?;

    let form = document.select(&form_sel).next()?;
    let base = Url::parse(page_url).ok()?;
    let action = match form.value().attr("action") {
        Some(a) if !a.trim().is_empty() => base.join(a.trim()).ok()?.to_string(),
        _ => page_url.to_string(),
    };

    let hidden = form
        .select(&hidden_sel)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value")?;
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    Some(LoginPage { action, hidden })
}

#[async_trait]
impl FetchBackend for SessionTransport {
    fn kind(&self) -> BackendKind {
        BackendKind::Session
    }

    #[instrument(level = "info", skip_all)]
    async fn initialize(&mut self) -> Result<(), FetchError> {
        let renderer = self
            .config
            .renderer
            .clone()
            .ok_or_else(|| FetchError::BackendInit("no rendering endpoint configured".to_string()))?;

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .connect_timeout(self.config.http.connect_timeout)
            .timeout(self.config.http.request_timeout)
            .build()
            .map_err(|e| FetchError::BackendInit(e.to_string()))?;

        // Any HTTP answer means the renderer is up.
        client
            .get(renderer.endpoint("json/version"))
            .send()
            .await
            .map_err(|e| FetchError::BackendInit(format!("renderer unreachable: {e}")))?;

        info!(renderer = %renderer.base_url, "Session transport ready");
        self.session = Some(Session {
            client,
            jar,
            renderer,
            authenticated: false,
        });
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&mut self, url: &str) -> Result<Document, FetchError> {
        let session = self.session_mut()?;
        let target = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let mut body = serde_json::json!({ "url": url });
        if let Some(cookie) = session.jar.cookies(&target) {
            if let Ok(cookie) = cookie.to_str() {
                body["setExtraHTTPHeaders"] = serde_json::json!({ "Cookie": cookie });
            }
        }

        let response = session
            .client
            .post(session.renderer.endpoint("content"))
            .json(&body)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let html = response.text().await.map_err(FetchError::from_reqwest)?;
        debug!(bytes = html.len(), "Rendered document");

        Ok(Document {
            url: url.to_string(),
            status: status.as_u16(),
            body: html,
            backend: BackendKind::Session,
        })
    }

    #[instrument(level = "info", skip_all, fields(identity = %credentials.identity()))]
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), ExtractError> {
        let login = self.config.login.clone();
        let accept_language = self.config.http.accept_language.clone();
        let session = self
            .session_mut()
            .map_err(|e| ExtractError::Authentication(e.to_string()))?;
        session.authenticated = false;

        let page = session
            .client
            .get(&login.login_url)
            .headers(rotated_headers(&accept_language))
            .send()
            .await
            .map_err(|e| ExtractError::Authentication(format!("login page unreachable: {e}")))?;
        if !page.status().is_success() {
            return Err(ExtractError::Authentication(format!(
                "login page answered HTTP {}",
                page.status().as_u16()
            )));
        }
        let html = page
            .text()
            .await
            .map_err(|e| ExtractError::Authentication(e.to_string()))?;

        let form = parse_login_page(&html, &login.login_url)
            .ok_or_else(|| ExtractError::Authentication("login form not found".to_string()))?;

        let mut fields = form.hidden;
        fields.push((login.identity_field.clone(), credentials.identity().to_string()));
        fields.push((login.secret_field.clone(), credentials.secret().to_string()));

        let response = session
            .client
            .post(&form.action)
            .header(reqwest::header::REFERER, login.login_url.as_str())
            .form(&fields)
            .send()
            .await
            .map_err(|e| ExtractError::Authentication(format!("login request failed: {e}")))?;

        let landed = response.url().to_string();
        let status = response.status();
        let mut ok = status.is_success()
            && login.success_markers.iter().any(|m| landed.contains(m.as_str()));

        if !ok && status.is_success() {
            if let Some(ref verify) = login.verify_url {
                ok = session
                    .client
                    .get(verify)
                    .send()
                    .await
                    .map(|r| r.status().is_success())
                    .unwrap_or(false);
            }
        }

        if !ok {
            warn!(status = status.as_u16(), %landed, "Login rejected");
            return Err(ExtractError::Authentication(
                "login rejected; check credentials".to_string(),
            ));
        }

        session.authenticated = true;
        info!("Session authenticated");
        Ok(())
    }

    async fn shutdown(&mut self) {
        if self.session.take().is_some() {
            debug!("Session closed");
        }
    }
}
