//! Detail-page parsing shared by the adapters.

use super::html::{first_text, joined_text};
use super::rules::TransactionRules;
use crate::error::ExtractError;
use crate::fetch::Document;
use crate::models::{ExtractionRecord, SourceId};
use scraper::Html;

pub const TITLE_NOT_FOUND: &str = "Título não encontrado";
pub const DATE_NOT_FOUND: &str = "Data não encontrada";

/// Where a site puts the parts of an article.
#[derive(Debug, Clone, Copy)]
pub struct ArticleSelectors {
    pub title: &'static str,
    pub date: &'static str,
    /// Matches every body paragraph; their texts are joined.
    pub body: &'static str,
}

/// Build a record from an article page.
///
/// A page with neither a title nor any body text is not an article.
pub fn parse_article(
    source: SourceId,
    document: &Document,
    selectors: &ArticleSelectors,
    rules: &TransactionRules,
) -> Result<ExtractionRecord, ExtractError> {
    let html = Html::parse_document(&document.body);
    let title = first_text(&html, selectors.title);
    let date = first_text(&html, selectors.date);
    let body = joined_text(&html, selectors.body);

    if title.is_none() && body.is_none() {
        return Err(ExtractError::Parse {
            url: document.url.clone(),
            reason: "no article title or body".to_string(),
        });
    }

    let mut record = ExtractionRecord::new(
        source,
        &document.url,
        title.unwrap_or_else(|| TITLE_NOT_FOUND.to_string()),
        date.unwrap_or_else(|| DATE_NOT_FOUND.to_string()),
    );
    if let Some(body) = body {
        rules.apply(&mut record, &body);
    }
    Ok(record)
}
