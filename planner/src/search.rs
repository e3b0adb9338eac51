use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use shared::Place;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::PlannerError;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
pub const DEFAULT_RESULT_LIMIT: usize = 5;

pub trait PlaceSearch: Send + Sync + 'static {
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Place>, PlannerError>> + Send;
}

/// Search box state: a query, at most one scheduled lookup, and the latest
/// result list.
///
/// Every keystroke replaces the scheduled lookup. A blank query clears the
/// list straight away and never reaches the search service.
pub struct DebouncedSearch<S> {
    client: Arc<S>,
    delay: Duration,
    limit: usize,
    query: String,
    pending: Option<JoinHandle<()>>,
    results: watch::Sender<Vec<Place>>,
}

impl<S: PlaceSearch> DebouncedSearch<S> {
    pub fn new(client: Arc<S>, delay: Duration, limit: usize) -> Self {
        let (results, _) = watch::channel(Vec::new());
        Self {
            client,
            delay,
            limit,
            query: String::new(),
            pending: None,
            results,
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn input(&mut self, query: &str) {
        self.cancel_pending();
        self.query = query.to_string();

        let trimmed = query.trim();
        if trimmed.is_empty() {
            self.results.send_replace(Vec::new());
            return;
        }

        let client = Arc::clone(&self.client);
        let results = self.results.clone();
        let delay = self.delay;
        let limit = self.limit;
        let query = trimmed.to_string();

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match client.search(&query, limit).await {
                Ok(places) => {
                    tracing::debug!("search {query:?} returned {} places", places.len());
                    results.send_replace(places);
                }
                Err(err) => tracing::warn!("search {query:?} failed: {err}"),
            }
        }));
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> Vec<Place> {
        self.results.borrow().clone()
    }

    #[cfg(test)]
    pub(crate) fn subscribe(&self) -> watch::Receiver<Vec<Place>> {
        self.results.subscribe()
    }

    pub fn best_match(&self) -> Option<Place> {
        self.results.borrow().first().cloned()
    }

    /// Pick a result and close the list.
    pub fn select(&mut self, index: usize) -> Option<Place> {
        let place = self.results.borrow().get(index).cloned()?;
        self.close();
        Some(place)
    }

    /// Enter key / search icon: the best match of a non-empty query.
    pub fn submit(&mut self) -> Option<Place> {
        if self.query.trim().is_empty() {
            return None;
        }
        let place = self.best_match()?;
        self.close();
        Some(place)
    }

    fn close(&mut self) {
        self.cancel_pending();
        self.results.send_replace(Vec::new());
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<S> Drop for DebouncedSearch<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
