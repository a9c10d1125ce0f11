//! Paging through a source's result listing.
//!
//! Listings are assumed to be ordered newest first. On each page, items are
//! scanned in order until one is older than the cutoff; that sets
//! [`PageScan::reached_cutoff`] and stops paging. Items without a readable
//! date are skipped and never stop the scan, so a page with no dated items
//! simply moves on to the next page.

use super::{Pacing, SearchRequest};
use crate::error::ExtractError;
use crate::fetch::FetchChain;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// One entry on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    /// Absolute article URL, when the entry had a link.
    pub url: Option<String>,
    pub title: String,
    pub published: Option<NaiveDate>,
}

/// Result of scanning one listing page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageScan {
    pub urls: Vec<String>,
    /// An item older than the cutoff was seen on this page.
    pub reached_cutoff: bool,
}

/// Scan one page's items against `cutoff`.
pub fn scan_page<F>(items: &[ListingItem], cutoff: NaiveDate, keep: F) -> PageScan
where
    F: Fn(&ListingItem) -> bool,
{
    let mut scan = PageScan::default();
    for item in items {
        let Some(published) = item.published else {
            continue;
        };
        if published < cutoff {
            scan.reached_cutoff = true;
            break;
        }
        if let Some(ref url) = item.url {
            if keep(item) {
                scan.urls.push(url.clone());
            }
        }
    }
    scan
}

/// Per-site listing rules.
pub trait ListingSite: Send + Sync {
    /// URL of 1-indexed result page `page`, or `None` past the last one.
    fn page_url(&self, request: &SearchRequest, page: u32) -> Option<String>;

    fn parse_listing(&self, html: &str, page_url: &str) -> Vec<ListingItem>;

    /// Extra filter on in-window items.
    fn keep(&self, _item: &ListingItem, _request: &SearchRequest) -> bool {
        true
    }
}

/// Walk result pages until the cutoff, an empty page, or `max_pages`.
///
/// A failure on the first page is returned; later failures end the walk with
/// what was collected so far.
pub async fn walk_listing<S: ListingSite>(
    site: &S,
    chain: &mut FetchChain,
    pacing: &Pacing,
    request: &SearchRequest,
) -> Result<Vec<String>, ExtractError> {
    let cutoff = request.cutoff();
    let mut urls = Vec::new();

    for page in 1..=request.max_pages {
        let Some(page_url) = site.page_url(request, page) else {
            break;
        };
        if page > 1 {
            pacing.pause().await;
        }

        info!(page, %page_url, "Fetching listing page");
        let doc = match chain.fetch(&page_url).await {
            Ok(doc) => doc,
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                warn!(page, error = %e, "Listing page failed; keeping earlier pages");
                break;
            }
        };

        let items = site.parse_listing(&doc.body, &page_url);
        if items.is_empty() {
            info!(page, "No results on page");
            break;
        }

        let scan = scan_page(&items, cutoff, |item| site.keep(item, request));
        debug!(page, items = items.len(), kept = scan.urls.len(), "Scanned listing page");
        urls.extend(scan.urls);

        if scan.reached_cutoff {
            info!(page, %cutoff, "Reached date cutoff");
            break;
        }
    }

    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedBackend;
    use crate::retry::RetryPolicy;
    use std::time::Duration;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    fn item(url: &str, published: Option<NaiveDate>) -> ListingItem {
        ListingItem {
            url: Some(url.to_string()),
            title: url.to_string(),
            published,
        }
    }

    #[test]
    fn test_scan_stops_at_first_old_item() {
        let items = vec![
            item("https://a", d(2024, 3, 10)),
            item("https://b", d(2024, 3, 1)),
            item("https://c", d(2024, 2, 1)),
            item("https://d", d(2024, 3, 9)),
        ];
        let scan = scan_page(&items, d(2024, 2, 15).unwrap(), |_| true);
        assert_eq!(scan.urls, vec!["https://a", "https://b"]);
        assert!(scan.reached_cutoff);
    }

    #[test]
    fn test_scan_page_without_dates_does_not_stop() {
        let items = vec![item("https://a", None), item("https://b", None)];
        let scan = scan_page(&items, d(2024, 2, 15).unwrap(), |_| true);
        assert!(scan.urls.is_empty());
        assert!(!scan.reached_cutoff);
    }

    #[test]
    fn test_scan_applies_keep_filter() {
        let items = vec![item("https://fusao", d(2024, 3, 1)), item("https://esporte", d(2024, 3, 1))];
        let scan = scan_page(&items, d(2024, 1, 1).unwrap(), |i| i.title.contains("fusao"));
        assert_eq!(scan.urls, vec!["https://fusao"]);
    }

    struct FakeSite;

    impl ListingSite for FakeSite {
        fn page_url(&self, _request: &SearchRequest, page: u32) -> Option<String> {
            Some(format!("https://list/{page}"))
        }

        fn parse_listing(&self, html: &str, _page_url: &str) -> Vec<ListingItem> {
            // "url|yyyy-mm-dd" per line, "-" for no date
            html.lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| {
                    let (url, date) = l.trim().split_once('|').unwrap();
                    ListingItem {
                        url: Some(url.to_string()),
                        title: url.to_string(),
                        published: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
                    }
                })
                .collect()
        }
    }

    fn request(max_pages: u32) -> SearchRequest {
        SearchRequest {
            query: "fusão".to_string(),
            days: 10,
            max_pages,
            today: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
        }
    }

    fn chain(backend: ScriptedBackend) -> FetchChain {
        let policy = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        FetchChain::new(Box::new(backend), policy)
    }

    #[tokio::test]
    async fn test_walk_continues_past_undated_page_and_stops_at_cutoff() {
        let backend = ScriptedBackend::new()
            .page("https://list/1", "https://a|2024-03-19\nhttps://b|2024-03-15")
            .page("https://list/2", "https://x|-")
            .page("https://list/3", "https://c|2024-03-12\nhttps://old|2024-03-01\nhttps://never|2024-03-18")
            .page("https://list/4", "https://p4|2024-03-19");
        let stats = backend.stats();
        let mut chain = chain(backend);

        let urls = walk_listing(&FakeSite, &mut chain, &Pacing::none(), &request(5))
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);
        assert_eq!(stats.fetches(), 3);
    }

    #[tokio::test]
    async fn test_walk_respects_max_pages_and_empty_page() {
        let backend = ScriptedBackend::new()
            .page("https://list/1", "https://a|2024-03-19")
            .page("https://list/2", "https://b|2024-03-19")
            .page("https://list/3", "https://c|2024-03-19");
        let mut chain = chain(backend);
        let urls = walk_listing(&FakeSite, &mut chain, &Pacing::none(), &request(2))
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://a", "https://b"]);

        let backend = ScriptedBackend::new()
            .page("https://list/1", "https://a|2024-03-19")
            .page("https://list/2", "");
        let mut chain = self::chain(backend);
        let urls = walk_listing(&FakeSite, &mut chain, &Pacing::none(), &request(5))
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://a"]);
    }

    #[tokio::test]
    async fn test_walk_first_page_failure_is_error_later_failure_is_not() {
        let mut failing = chain(ScriptedBackend::failing_with(crate::error::FetchError::Status(500)));
        assert!(walk_listing(&FakeSite, &mut failing, &Pacing::none(), &request(3))
            .await
            .is_err());

        let backend = ScriptedBackend::new().page("https://list/1", "https://a|2024-03-19");
        let mut partial = chain(backend);
        let urls = walk_listing(&FakeSite, &mut partial, &Pacing::none(), &request(3))
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://a"]);
    }
}
