//! Fusões e Aquisições (`fusoesaquisicoes.com`): a WordPress news blog.
//!
//! The site has no usable search, so the adapter walks the front page and
//! its `/page/<n>/` archive, keeping posts that look relevant to the query.
//! When the archive yields nothing it asks a web search engine for
//! `site:fusoesaquisicoes.com <query>` instead.

use super::article::{ArticleSelectors, parse_article};
use super::html::{absolute_url, child_attr, child_text};
use super::listing::{ListingItem, ListingSite, walk_listing};
use super::{AdapterSettings, Pacing, SearchRequest, SourceAdapter, rules};
use crate::error::{ExtractError, FetchError};
use crate::fetch::{Document, FetchChain, LightweightTransport};
use crate::models::{ExtractionRecord, SourceId};
use crate::normalize::standardize_date;
use async_trait::async_trait;
use itertools::Itertools;
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};
use url::Url;

const BASE_URL: &str = "https://fusoesaquisicoes.com/";
const SITE_HOST: &str = "fusoesaquisicoes.com";
const WEB_SEARCH_URL: &str = "https://www.google.com/search";

/// Topic words that make a post relevant regardless of the query.
const DEAL_KEYWORDS: [&str; 11] = [
    "fusão",
    "aquisição",
    "fusões",
    "aquisições",
    "compra",
    "adquiriu",
    "comprou",
    "transação",
    "m&a",
    "merger",
    "acquisition",
];

const ARTICLE: ArticleSelectors = ArticleSelectors {
    title: "h1.entry-title",
    date: ".entry-date",
    body: ".entry-content",
};

/// Whether `text` mentions a query word or a deal keyword.
pub fn is_relevant(text: &str, query: &str) -> bool {
    let text = text.to_lowercase();
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .any(|word| text.contains(&word))
        || DEAL_KEYWORDS.iter().any(|k| text.contains(k))
}

struct ArchiveListing;

impl ListingSite for ArchiveListing {
    fn page_url(&self, _request: &SearchRequest, page: u32) -> Option<String> {
        match page {
            0 => None,
            1 => Some(BASE_URL.to_string()),
            n => Some(format!("{BASE_URL}page/{n}/")),
        }
    }

    fn parse_listing(&self, html: &str, page_url: &str) -> Vec<ListingItem> {
        let document = Html::parse_document(html);
        let Ok(post_sel) = Selector::parse("article.post") else {
            return Vec::new();
        };
        document
            .select(&post_sel)
            .map(|post| ListingItem {
                url: child_attr(&post, "h2.entry-title a", "href").and_then(|href| absolute_url(page_url, &href)),
                title: child_text(&post, "h2.entry-title a").unwrap_or_default(),
                published: child_text(&post, ".entry-date").and_then(|t| standardize_date(&t)),
            })
            .collect()
    }

    fn keep(&self, item: &ListingItem, request: &SearchRequest) -> bool {
        let url = item.url.as_deref().unwrap_or_default();
        is_relevant(url, &request.query) || is_relevant(&item.title, &request.query)
    }
}

/// Query URL for the site-restricted web search.
fn web_search_url(request: &SearchRequest) -> Option<String> {
    let query = format!("site:{SITE_HOST} {}", request.query);
    let window = format!("qdr:d{}", request.days.max(1));
    Url::parse_with_params(
        WEB_SEARCH_URL,
        [
            ("q", query.as_str()),
            ("num", "10"),
            ("hl", "pt-BR"),
            ("tbs", window.as_str()),
        ],
    )
    .ok()
    .map(Into::into)
}

/// Result links on the site, in result order, without repeats.
fn parse_web_results(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(result_sel) = Selector::parse("div.g") else {
        return Vec::new();
    };
    document
        .select(&result_sel)
        .filter_map(|result| child_attr(&result, "a[href]", "href"))
        .filter_map(|href| unwrap_redirect(&href))
        .filter(|url| {
            Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h == SITE_HOST || h.ends_with(".fusoesaquisicoes.com")))
                .unwrap_or(false)
        })
        .unique()
        .collect()
}

/// Resolve `/url?q=<target>` redirect links to their target.
fn unwrap_redirect(href: &str) -> Option<String> {
    if !href.starts_with("/url?") {
        return Some(href.to_string());
    }
    let url = Url::parse(WEB_SEARCH_URL).ok()?.join(href).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.into_owned())
}

pub struct FusoesAquisicoes {
    chain: FetchChain,
    pacing: Pacing,
}

impl FusoesAquisicoes {
    pub fn new(settings: &AdapterSettings) -> Result<Self, FetchError> {
        let transport = LightweightTransport::new(settings.http.clone())?;
        let chain = FetchChain::new(Box::new(transport), settings.retry.clone());
        Ok(Self::with_chain(chain, settings.pacing.clone()))
    }

    pub fn with_chain(chain: FetchChain, pacing: Pacing) -> Self {
        Self { chain, pacing }
    }

    async fn web_search(&mut self, request: &SearchRequest) -> Result<Vec<String>, ExtractError> {
        let Some(url) = web_search_url(request) else {
            return Ok(Vec::new());
        };
        let doc = self.chain.fetch(&url).await?;
        let urls = parse_web_results(&doc.body);
        info!(found = urls.len(), "Web search fallback finished");
        Ok(urls)
    }
}

#[async_trait]
impl SourceAdapter for FusoesAquisicoes {
    fn id(&self) -> SourceId {
        SourceId::FusoesAquisicoes
    }

    #[instrument(level = "info", skip_all, fields(query = %request.query, days = request.days))]
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<String>, ExtractError> {
        let listing_error = match walk_listing(&ArchiveListing, &mut self.chain, &self.pacing, request).await {
            Ok(urls) if !urls.is_empty() => return Ok(urls),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Archive listing failed");
                Some(e)
            }
        };

        info!("Archive gave no posts; trying web search");
        self.pacing.pause().await;
        match self.web_search(request).await {
            Ok(urls) => Ok(urls),
            Err(e) => {
                warn!(error = %e, "Web search fallback failed");
                Err(listing_error.unwrap_or(e))
            }
        }
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
