//! Pipeline Valor (`pipelinevalor.globo.com`): open search, plain HTTP.

use super::article::{ArticleSelectors, parse_article};
use super::html::{absolute_url, child_attr, child_text};
use super::listing::{ListingItem, ListingSite, walk_listing};
use super::{AdapterSettings, Pacing, SearchRequest, SourceAdapter, rules};
use crate::error::{ExtractError, FetchError};
use crate::fetch::{Document, FetchChain, LightweightTransport};
use crate::models::{ExtractionRecord, SourceId};
use crate::normalize::standardize_date;
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::instrument;
use url::Url;

const SEARCH_URL: &str = "https://pipelinevalor.globo.com/busca/";

const ARTICLE: ArticleSelectors = ArticleSelectors {
    title: "h1.article-title",
    date: "time.article-date",
    body: ".article-content",
};

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
        let Ok(item_sel) = Selector::parse(".search-result-item") else {
            return Vec::new();
        };
        document
            .select(&item_sel)
            .map(|item| ListingItem {
                url: child_attr(&item, "a.search-result-link", "href")
                    .and_then(|href| absolute_url(page_url, &href)),
                title: child_text(&item, "a.search-result-link").unwrap_or_default(),
                published: child_text(&item, ".search-result-date").and_then(|t| standardize_date(&t)),
            })
            .collect()
    }
}

pub struct PipelineValor {
    chain: FetchChain,
    pacing: Pacing,
}

impl PipelineValor {
    pub fn new(settings: &AdapterSettings) -> Result<Self, FetchError> {
        let transport = LightweightTransport::new(settings.http.clone())?;
        let chain = FetchChain::new(Box::new(transport), settings.retry.clone());
        Ok(Self::with_chain(chain, settings.pacing.clone()))
    }

    pub fn with_chain(chain: FetchChain, pacing: Pacing) -> Self {
        Self { chain, pacing }
    }
}

#[async_trait]
impl SourceAdapter for PipelineValor {
    fn id(&self) -> SourceId {
        SourceId::PipelineValor
    }

    #[instrument(level = "info", skip_all, fields(query = %request.query, days = request.days))]
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<String>, ExtractError> {
        walk_listing(&SearchListing, &mut self.chain, &self.pacing, request).await
    }

    async fn fetch_detail(&mut self, url: &str) -> Result<Document, ExtractError> {
        self.chain.fetch(url).await
    }

    fn parse(&self, document: &Document) -> Result<ExtractionRecord, ExtractError> {
        parse_article(self.id(), document, &ARTICLE, rules::base())
    }

    async fn shutdown(&mut self) {
        self.chain.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BackendKind;
    use crate::fetch::testing::ScriptedBackend;
    use crate::models::{Informed, Magnitude};
    use crate::retry::RetryPolicy;
    use chrono::NaiveDate;

    const PAGE_1: &str = r#"
        <div class="search-results">
          <div class="search-result-item">
            <a class="search-result-link" href="/noticia/2024/03/18/natura-compra-avon.ghtml">Natura compra Avon</a>
            <span class="search-result-date">18/03/2024 às 10:15</span>
          </div>
          <div class="search-result-item">
            <a class="search-result-link" href="/noticia/sem-data.ghtml">Sem data</a>
          </div>
          <div class="search-result-item">
            <a class="search-result-link" href="/noticia/2024/03/12/stone-linx.ghtml">Stone e Linx</a>
            <span class="search-result-date">12/03/2024 às 08:00</span>
          </div>
          <div class="search-result-item">
            <a class="search-result-link" href="/noticia/2023/12/01/antiga.ghtml">Antiga</a>
            <span class="search-result-date">01/12/2023 às 08:00</span>
          </div>
        </div>
    "#;

    const ARTICLE_HTML: &str = r#"
        <article>
          <h1 class="article-title">Natura compra Avon</h1>
          <time class="article-date">18/03/2024 10:15</time>
          <div class="article-content">
            <p>A Natura adquiriu a Avon por R$ 2,5 bilhões.</p>
          </div>
        </article>
    "#;

    fn request() -> SearchRequest {
        SearchRequest {
            query: "aquisição".to_string(),
            days: 30,
            max_pages: 3,
            today: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
        }
    }

    fn adapter(backend: ScriptedBackend) -> PipelineValor {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        PipelineValor::with_chain(FetchChain::new(Box::new(backend), policy), Pacing::none())
    }

    #[test]
    fn test_page_url_encodes_query() {
        let url = SearchListing.page_url(&request(), 2).unwrap();
        assert_eq!(url, "https://pipelinevalor.globo.com/busca/?q=aquisi%C3%A7%C3%A3o&page=2");
    }

    #[tokio::test]
    async fn test_search_stops_at_cutoff() {
        let page_1 = SearchListing.page_url(&request(), 1).unwrap();
        let backend = ScriptedBackend::new().page(&page_1, PAGE_1);
        let stats = backend.stats();
        let mut adapter = adapter(backend);

        let urls = adapter.search(&request()).await.unwrap();
        assert_eq!(
            urls,
            vec![
                "https://pipelinevalor.globo.com/noticia/2024/03/18/natura-compra-avon.ghtml",
                "https://pipelinevalor.globo.com/noticia/2024/03/12/stone-linx.ghtml",
            ]
        );
        assert_eq!(stats.fetches(), 1);
    }

    #[test]
    fn test_parse_article() {
        let adapter = adapter(ScriptedBackend::new());
        let doc = Document {
            url: "https://pipelinevalor.globo.com/noticia/x.ghtml".to_string(),
            status: 200,
            body: ARTICLE_HTML.to_string(),
            backend: BackendKind::Lightweight,
        };
        let record = adapter.parse(&doc).unwrap();
        assert_eq!(record.title, "Natura compra Avon");
        assert_eq!(record.raw_date, "18/03/2024 10:15");
        assert_eq!(record.source, SourceId::PipelineValor);
        assert_eq!(record.buyer, Informed::Known("Natura".to_string()));
        assert_eq!(record.acquired, Informed::Known("Avon".to_string()));
        assert_eq!(record.value.known().map(|v| v.magnitude), Some(Magnitude::Billion));
        assert!(record.multiple.is_unset());
    }

    #[test]
    fn test_parse_rejects_non_article() {
        let adapter = adapter(ScriptedBackend::new());
        let doc = Document {
            url: "https://pipelinevalor.globo.com/404".to_string(),
            status: 200,
            body: "<html><body><p>Página não encontrada</p></body></html>".to_string(),
            backend: BackendKind::Lightweight,
        };
        assert!(matches!(adapter.parse(&doc), Err(ExtractError::Parse { .. })));
    }
}
