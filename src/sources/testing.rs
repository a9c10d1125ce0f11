//! In-memory adapter for orchestrator and cycle tests.

use super::{SearchRequest, SourceAdapter};
use crate::error::ExtractError;
use crate::fetch::{BackendKind, Document};
use crate::models::{ExtractionRecord, SourceId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const UNPARSEABLE: &str = "<unparseable>";

#[derive(Clone)]
enum Detail {
    Article { title: String, date: String },
    Unparseable,
    Failing(ExtractError),
}

/// Per-cycle search behavior.
#[derive(Clone)]
enum Script {
    /// Return every configured article.
    Articles,
    /// Return nothing.
    Empty,
    Fail(ExtractError),
    Panic,
}

pub struct ScriptedAdapter {
    id: SourceId,
    urls: Vec<String>,
    details: HashMap<String, Detail>,
    cycles: VecDeque<Script>,
    default_cycle: Script,
    delay: Duration,
    searches: Arc<AtomicUsize>,
    detail_fetches: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl ScriptedAdapter {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            urls: Vec::new(),
            details: HashMap::new(),
            cycles: VecDeque::new(),
            default_cycle: Script::Articles,
            delay: Duration::ZERO,
            searches: Arc::new(AtomicUsize::new(0)),
            detail_fetches: Arc::new(AtomicUsize::new(0)),
            shutdowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn add(mut self, url: &str, detail: Detail) -> Self {
        self.urls.push(url.to_string());
        self.details.insert(url.to_string(), detail);
        self
    }

    pub fn with_article(self, url: &str, title: &str) -> Self {
        self.with_dated_article(url, title, "")
    }

    pub fn with_dated_article(self, url: &str, title: &str, date: &str) -> Self {
        self.add(
            url,
            Detail::Article {
                title: title.to_string(),
                date: date.to_string(),
            },
        )
    }

    pub fn with_failing(self, url: &str, err: ExtractError) -> Self {
        self.add(url, Detail::Failing(err))
    }

    pub fn with_unparseable(self, url: &str) -> Self {
        self.add(url, Detail::Unparseable)
    }

    /// Repeat an already known URL in search results.
    pub fn with_extra_search_hit(mut self, url: &str) -> Self {
        self.urls.push(url.to_string());
        self
    }

    pub fn failing_search(mut self, err: ExtractError) -> Self {
        self.default_cycle = Script::Fail(err);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.default_cycle = Script::Panic;
        self
    }

    pub fn always_empty(mut self) -> Self {
        self.default_cycle = Script::Empty;
        self
    }

    /// The next `n` cycles find nothing; later ones use the default.
    pub fn empty_cycles(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.cycles.push_back(Script::Empty);
        }
        self
    }

    /// Simulated work per search.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn searches(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.searches)
    }

    pub fn shutdowns(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.shutdowns)
    }

    pub fn detail_fetches(&self) -> usize {
        self.detail_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn search(&mut self, _request: &SearchRequest) -> Result<Vec<String>, ExtractError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let script = self.cycles.pop_front().unwrap_or_else(|| self.default_cycle.clone());
        match script {
            Script::Articles => Ok(self.urls.clone()),
            Script::Empty => Ok(Vec::new()),
            Script::Fail(e) => Err(e),
            Script::Panic => panic!("scripted adapter {} blew up", self.id),
        }
    }

    async fn fetch_detail(&mut self, url: &str) -> Result<Document, ExtractError> {
        self.detail_fetches.fetch_add(1, Ordering::SeqCst);
        let body = match self.details.get(url) {
            Some(Detail::Article { title, date }) => format!("{title}\n{date}"),
            Some(Detail::Unparseable) => UNPARSEABLE.to_string(),
            Some(Detail::Failing(e)) => return Err(e.clone()),
            None => {
                return Err(ExtractError::PermanentHttp {
                    url: url.to_string(),
                    status: 404,
                });
            }
        };
        Ok(Document {
            url: url.to_string(),
            status: 200,
            body,
            backend: BackendKind::Lightweight,
        })
    }

    fn parse(&self, document: &Document) -> Result<ExtractionRecord, ExtractError> {
        if document.body == UNPARSEABLE {
            return Err(ExtractError::Parse {
                url: document.url.clone(),
                reason: "no article body".to_string(),
            });
        }
        let (title, date) = document.body.split_once('\n').unwrap_or((&document.body, ""));
        Ok(ExtractionRecord::new(self.id, &document.url, title, date))
    }

    async fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
