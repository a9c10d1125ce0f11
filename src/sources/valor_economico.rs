//! Valor Econômico (`valor.globo.com`): subscriber content.
//!
//! Search and articles are behind a login, so this adapter needs credentials
//! and logs in before every search. Pages are rendered through the session
//! transport; when no rendering endpoint is available it falls back to plain
//! HTTP for the rest of its life.

use super::article::{ArticleSelectors, parse_article};
use super::html::{absolute_url, child_attr, child_text};
use super::listing::{ListingItem, ListingSite, walk_listing};
use super::{AdapterSettings, Pacing, SearchRequest, SourceAdapter, rules};
use crate::credentials::Credentials;
use crate::error::{ExtractError, FetchError};
use crate::fetch::{
    AuthWall, Document, FetchChain, LightweightTransport, LoginForm, SessionConfig, SessionTransport,
};
use crate::models::{ExtractionRecord, SourceId};
use crate::normalize::standardize_date;
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{info, instrument};
use url::Url;

const SEARCH_URL: &str = "https://valor.globo.com/busca";
const LOGIN_URL: &str = "https://login.globo.com/login/438";

/// Both must appear for a page to count as paywalled.
pub const AUTH_WALL_MARKERS: [&str; 2] = ["Para continuar lendo", "Faça login ou assine"];

const ARTICLE: ArticleSelectors = ArticleSelectors {
    title: "h1.content-head__title",
    date: ".content-publication-data__updated",
    body: ".content-text p",
};

pub fn login_form() -> LoginForm {
    LoginForm {
        login_url: LOGIN_URL.to_string(),
        identity_field: "login".to_string(),
        secret_field: "password".to_string(),
        success_markers: vec!["minha-conta".to_string(), "dashboard".to_string()],
        verify_url: Some("https://valor.globo.com/minha-conta/".to_string()),
    }
}

struct SearchListing;

impl ListingSite for SearchListing {
    fn page_url(&self, request: &SearchRequest, page: u32) -> Option<String> {
        let page = page.to_string();
        Url::parse_with_params(SEARCH_URL, [("q", request.query.as_str()), ("page", page.as_str())])
            .ok()
            .map(Into::into)
    }

    fn parse_listing(&self, html: &str, page_url: &str) -> Vec<ListingItem> {
        let document = Html::parse_document(html);
        let Ok(card_sel) = Selector::parse(".c-card") else {
            return Vec::new();
        };
        document
            .select(&card_sel)
            .map(|card| ListingItem {
                url: child_attr(&card, "a.c-card__link", "href").and_then(|href| absolute_url(page_url, &href)),
                title: child_text(&card, "a.c-card__link").unwrap_or_default(),
                published: child_text(&card, ".c-card__info time").and_then(|t| standardize_date(&t)),
            })
            .collect()
    }
}

pub struct ValorEconomico {
    chain: FetchChain,
    pacing: Pacing,
}

impl ValorEconomico {
    pub fn new(settings: &AdapterSettings, credentials: Option<Credentials>) -> Result<Self, FetchError> {
        let session = SessionTransport::new(SessionConfig {
            login: login_form(),
            renderer: settings.renderer.clone(),
            http: settings.http.clone(),
        });
        let fallback = LightweightTransport::new(settings.http.clone())?;
        let chain = FetchChain::new(Box::new(session), settings.retry.clone())
            .with_fallback(Box::new(fallback))
            .with_auth_wall(AuthWall::new(AUTH_WALL_MARKERS))
            .with_credentials(credentials);
        Ok(Self::with_chain(chain, settings.pacing.clone()))
    }

    pub fn with_chain(chain: FetchChain, pacing: Pacing) -> Self {
        Self { chain, pacing }
    }
}

#[async_trait]
impl SourceAdapter for ValorEconomico {
    fn id(&self) -> SourceId {
        SourceId::ValorEconomico
    }

    #[instrument(level = "info", skip_all, fields(query = %request.query, days = request.days))]
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<String>, ExtractError> {
        if !self.chain.has_credentials() {
            return Err(ExtractError::Configuration(
                "Valor Econômico needs VALOR_EMAIL and VALOR_PASSWORD".to_string(),
            ));
        }
        self.chain.authenticate().await?;
        info!(backend = ?self.chain.active_backend(), "Logged in");

        walk_listing(&SearchListing, &mut self.chain, &self.pacing, request).await
    }

    async fn fetch_detail(&mut self, url: &str) -> Result<Document, ExtractError> {
        self.chain.fetch(url).await
    }

    fn parse(&self, document: &Document) -> Result<ExtractionRecord, ExtractError> {
        parse_article(self.id(), document, &ARTICLE, rules::extended())
    }

    async fn shutdown(&mut self) {
        self.chain.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fetch::testing::ScriptedBackend;
    use crate::fetch::{ActiveBackend, BackendKind};
    use crate::models::Informed;
    use crate::retry::RetryPolicy;
    use crate::sources::run_cycle;
    use chrono::NaiveDate;

    const RESULTS: &str = r#"
        <section>
          <div class="c-card">
            <a class="c-card__link" href="https://valor.globo.com/empresas/noticia/2024/03/19/totvs.ghtml">Totvs compra RD</a>
            <div class="c-card__info"><time>19/03/2024 18:02</time></div>
          </div>
          <div class="c-card">
            <a class="c-card__link" href="/empresas/noticia/2024/01/02/velha.ghtml">Velha</a>
            <div class="c-card__info"><time>02/01/2024 09:00</time></div>
          </div>
        </section>
    "#;

    const ARTICLE_HTML: &str = r#"
        <h1 class="content-head__title">Totvs compra RD Station</h1>
        <p class="content-publication-data__updated">19/03/2024 18h02</p>
        <div class="content-text"><p>A Totvs concluiu a compra da RD Station.</p></div>
        <div class="content-text"><p>O negócio foi avaliada em R$ 1,86 bilhão.</p></div>
    "#;

    const WALL: &str = "<div>Para continuar lendo, Faça login ou assine</div>";

    fn request() -> SearchRequest {
        SearchRequest {
            query: "aquisição".to_string(),
            days: 7,
            max_pages: 2,
            today: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
        }
    }

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        }
    }

    fn page_1() -> String {
        SearchListing.page_url(&request(), 1).unwrap()
    }

    #[tokio::test]
    async fn test_missing_credentials_is_configuration_error() {
        let chain = FetchChain::new(Box::new(ScriptedBackend::session()), quick())
            .with_auth_wall(AuthWall::new(AUTH_WALL_MARKERS));
        let mut adapter = ValorEconomico::with_chain(chain, Pacing::none());

        let outcome = run_cycle(&mut adapter, &request(), &Pacing::none()).await;
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_failed_login_is_authentication_error() {
        let backend = ScriptedBackend::session().rejects_login();
        let stats = backend.stats();
        let chain = FetchChain::new(Box::new(backend), quick())
            .with_credentials(Some(Credentials::new("leitor@example.com", "errada")));
        let mut adapter = ValorEconomico::with_chain(chain, Pacing::none());

        let err = adapter.search(&request()).await.unwrap_err();
        assert!(matches!(err, ExtractError::Authentication(_)));
        assert_eq!(stats.fetches(), 0);
    }

    #[tokio::test]
    async fn test_full_cycle_with_paywall_recovery() {
        let article = "https://valor.globo.com/empresas/noticia/2024/03/19/totvs.ghtml";
        let backend = ScriptedBackend::session()
            .page(&page_1(), RESULTS)
            .then_ok(WALL)
            .then_ok(ARTICLE_HTML);
        let stats = backend.stats();
        let chain = FetchChain::new(Box::new(backend), quick())
            .with_auth_wall(AuthWall::new(AUTH_WALL_MARKERS))
            .with_credentials(Some(Credentials::new("leitor@example.com", "certa")));
        let mut adapter = ValorEconomico::with_chain(chain, Pacing::none());

        let outcome = run_cycle(&mut adapter, &request(), &Pacing::none()).await;
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.records.len(), 1);

        let record = &outcome.records[0];
        assert_eq!(record.url, article);
        assert_eq!(record.title, "Totvs compra RD Station");
        assert_eq!(record.buyer, Informed::Known("Totvs".to_string()));
        assert_eq!(record.acquired, Informed::Known("RD Station".to_string()));
        assert_eq!(record.value.known().map(|v| v.amount), Some(1.86));
        // one login before search, one after the paywall
        assert_eq!(stats.auths(), 2);
        assert_eq!(
            adapter.chain.active_backend(),
            &ActiveBackend::Primary(BackendKind::Session)
        );
    }

    #[tokio::test]
    async fn test_login_on_lightweight_fallback_fails() {
        let session = ScriptedBackend::session().init_fails(FetchError::BackendInit("no renderer".into()));
        let fallback = LightweightTransport::new(Default::default()).unwrap();
        let chain = FetchChain::new(Box::new(session), quick())
            .with_fallback(Box::new(fallback))
            .with_credentials(Some(Credentials::new("a", "b")));
        let mut adapter = ValorEconomico::with_chain(chain, Pacing::none());

        let err = adapter.search(&request()).await.unwrap_err();
        assert!(matches!(err, ExtractError::Authentication(_)));
        assert_eq!(
            adapter.chain.active_backend(),
            &ActiveBackend::Fallback(BackendKind::Lightweight)
        );
    }
}
