//! Scripted in-memory backend for tests.

use super::{BackendKind, Document, FetchBackend};
use crate::credentials::Credentials;
use crate::error::{ExtractError, FetchError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct BackendStats {
    inits: AtomicUsize,
    fetches: AtomicUsize,
    auths: AtomicUsize,
}

impl BackendStats {
    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn auths(&self) -> usize {
        self.auths.load(Ordering::SeqCst)
    }
}

/// Answers from a per-URL table first, then a queue, then a default.
pub struct ScriptedBackend {
    kind: BackendKind,
    init_error: Option<FetchError>,
    login_ok: bool,
    pages: HashMap<String, Result<String, FetchError>>,
    queue: VecDeque<Result<String, FetchError>>,
    default: Option<Result<String, FetchError>>,
    stats: Arc<BackendStats>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            kind: BackendKind::Lightweight,
            init_error: None,
            login_ok: true,
            pages: HashMap::new(),
            queue: VecDeque::new(),
            default: None,
            stats: Arc::new(BackendStats::default()),
        }
    }

    pub fn session() -> Self {
        Self {
            kind: BackendKind::Session,
            ..Self::new()
        }
    }

    pub fn failing_with(err: FetchError) -> Self {
        Self::new().always(Err(err))
    }

    pub fn init_fails(mut self, err: FetchError) -> Self {
        self.init_error = Some(err);
        self
    }

    pub fn rejects_login(mut self) -> Self {
        self.login_ok = false;
        self
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn page_error(mut self, url: &str, err: FetchError) -> Self {
        self.pages.insert(url.to_string(), Err(err));
        self
    }

    pub fn then_ok(mut self, body: &str) -> Self {
        self.queue.push_back(Ok(body.to_string()));
        self
    }

    pub fn then_fail(mut self, err: FetchError) -> Self {
        self.queue.push_back(Err(err));
        self
    }

    pub fn always_ok(self, body: &str) -> Self {
        self.always(Ok(body.to_string()))
    }

    fn always(mut self, answer: Result<String, FetchError>) -> Self {
        self.default = Some(answer);
        self
    }

    pub fn stats(&self) -> Arc<BackendStats> {
        Arc::clone(&self.stats)
    }

    pub fn fetch_count(&self) -> usize {
        self.stats.fetches()
    }
}

#[async_trait]
impl FetchBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn initialize(&mut self) -> Result<(), FetchError> {
        self.stats.inits.fetch_add(1, Ordering::SeqCst);
        match &self.init_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn fetch(&mut self, url: &str) -> Result<Document, FetchError> {
        self.stats.fetches.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .pages
            .get(url)
            .cloned()
            .or_else(|| self.queue.pop_front())
            .or_else(|| self.default.clone())
            .unwrap_or(Err(FetchError::Status(404)));

        answer.map(|body| Document {
            url: url.to_string(),
            status: 200,
            body,
            backend: self.kind,
        })
    }

    async fn authenticate(&mut self, _credentials: &Credentials) -> Result<(), ExtractError> {
        self.stats.auths.fetch_add(1, Ordering::SeqCst);
        if self.login_ok {
            Ok(())
        } else {
            Err(ExtractError::Authentication("login rejected".to_string()))
        }
    }
}
