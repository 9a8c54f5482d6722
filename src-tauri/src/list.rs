//! Search + pagination state shared by every paginated admin page.
//!
//! [`ListController`] is the plain state machine; [`ListPage`] drives it
//! against a [`ListSource`] and owns the locking. Every reload carries a
//! generation number and only the newest one is committed, so a slow
//! response for an old query can never overwrite a newer page.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::types::{ListQuery, Page};
use crate::error::AppError;

/// Anything that can serve one page of rows.
#[async_trait]
pub trait ListSource<R>: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<Page<R>, AppError>;
}

/// What the table body should show. Loading wins over everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListDisplay {
    Loading,
    Error,
    Empty,
    Rows,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListView<R> {
    pub query: String,
    pub applied_query: String,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
    pub rows: Vec<R>,
    pub loading: bool,
    pub error: Option<String>,
    /// The last failure was an auth failure; the view should sign out.
    pub auth_lost: bool,
    pub display: ListDisplay,
}

/// Identifies one issued reload and the parameters it was issued with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadTicket {
    generation: u64,
    pub query: ListQuery,
}

/// `max(1, ceil(total / page_size))`.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    let pages = total.div_ceil(size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone)]
pub struct ListController<R> {
    /// Text in the search box.
    query: String,
    /// Filter the current rows were loaded with; set by `search`.
    applied_query: String,
    page: u32,
    page_size: u32,
    total: u64,
    rows: Vec<R>,
    loading: bool,
    error: Option<String>,
    auth_lost: bool,
    generation: u64,
}

impl<R: Clone> ListController<R> {
    pub fn new(page_size: u32) -> Self {
        Self {
            query: String::new(),
            applied_query: String::new(),
            page: 1,
            page_size: page_size.max(1),
            total: 0,
            rows: Vec::new(),
            loading: false,
            error: None,
            auth_lost: false,
            generation: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.total, self.page_size)
    }

    /// Edit the search text. Does not reload.
    pub fn set_query(&mut self, q: &str) {
        self.query = q.to_string();
    }

    /// Apply the search text from page 1.
    pub fn search(&mut self) -> ReloadTicket {
        if self.applied_query != self.query {
            debug!("Query changed '{}' -> '{}'", self.applied_query, self.query);
        }
        self.applied_query = self.query.clone();
        self.page = 1;
        self.begin_reload()
    }

    /// Move to page `n`, clamped into `[1, total_pages]`.
    pub fn go_to_page(&mut self, n: i64) -> ReloadTicket {
        let last = i64::from(self.total_pages());
        self.page = n.clamp(1, last) as u32;
        self.begin_reload()
    }

    /// Mark loading and issue a new generation for the active filter and page.
    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.generation += 1;
        self.loading = true;
        ReloadTicket {
            generation: self.generation,
            query: ListQuery::new(&self.applied_query, self.page, self.page_size),
        }
    }

    pub fn is_current(&self, ticket: &ReloadTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Apply the outcome of a reload. Returns false, leaving state alone,
    /// when a newer reload has been issued since.
    pub fn commit(&mut self, ticket: &ReloadTicket, result: Result<Page<R>, AppError>) -> bool {
        if !self.is_current(ticket) {
            debug!(
                "Dropping stale list response (generation {} < {})",
                ticket.generation, self.generation
            );
            return false;
        }
        match result {
            Ok(page) => {
                let page = page.capped(self.page_size);
                self.rows = page.data;
                self.total = page.total;
                self.error = None;
                self.auth_lost = false;
            }
            Err(e) => {
                self.rows.clear();
                self.total = 0;
                self.fail(&e);
            }
        }
        self.loading = false;
        true
    }

    /// Clear the loading flag for a reload that ended without a result.
    pub fn release(&mut self, ticket: &ReloadTicket) {
        if self.is_current(ticket) {
            self.loading = false;
        }
    }

    /// Surface an error without touching the rows.
    pub fn fail(&mut self, err: &AppError) {
        self.error = Some(err.to_string());
        self.auth_lost = err.is_auth();
    }

    pub fn view(&self) -> ListView<R> {
        let display = if self.loading {
            ListDisplay::Loading
        } else if self.error.is_some() {
            ListDisplay::Error
        } else if self.rows.is_empty() {
            ListDisplay::Empty
        } else {
            ListDisplay::Rows
        };
        ListView {
            query: self.query.clone(),
            applied_query: self.applied_query.clone(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
            total_pages: self.total_pages(),
            rows: self.rows.clone(),
            loading: self.loading,
            error: self.error.clone(),
            auth_lost: self.auth_lost,
            display,
        }
    }
}

/// Releases the loading flag if a reload future is dropped mid-flight.
struct LoadingGuard<'a, R: Clone> {
    state: &'a Mutex<ListController<R>>,
    ticket: Option<ReloadTicket>,
}

impl<R: Clone> LoadingGuard<'_, R> {
    fn disarm(&mut self) {
        self.ticket = None;
    }
}

impl<R: Clone> Drop for LoadingGuard<'_, R> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            lock(self.state).release(&ticket);
        }
    }
}

fn lock<R>(state: &Mutex<ListController<R>>) -> MutexGuard<'_, ListController<R>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A list page bound to its data source.
pub struct ListPage<R, S> {
    name: &'static str,
    state: Mutex<ListController<R>>,
    source: S,
}

impl<R, S> ListPage<R, S>
where
    R: Clone + Send + 'static,
    S: ListSource<R>,
{
    pub fn new(name: &'static str, source: S, page_size: u32) -> Self {
        Self {
            name,
            state: Mutex::new(ListController::new(page_size)),
            source,
        }
    }

    pub fn view(&self) -> ListView<R> {
        lock(&self.state).view()
    }

    pub fn set_query(&self, q: &str) -> ListView<R> {
        let mut state = lock(&self.state);
        state.set_query(q);
        state.view()
    }

    pub async fn search(&self) -> ListView<R> {
        let ticket = lock(&self.state).search();
        self.run(ticket).await
    }

    pub async fn go_to_page(&self, n: i64) -> ListView<R> {
        let ticket = lock(&self.state).go_to_page(n);
        self.run(ticket).await
    }

    /// Reload with the active filter and page.
    pub async fn reload(&self) -> ListView<R> {
        let ticket = lock(&self.state).begin_reload();
        self.run(ticket).await
    }

    /// Run a row mutation, then reload once on success. A failure is
    /// surfaced on the list and returned.
    pub async fn mutate<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>> + Send,
    {
        match op.await {
            Ok(value) => {
                self.reload().await;
                Ok(value)
            }
            Err(e) => {
                warn!("{} mutation failed: {}", self.name, e);
                lock(&self.state).fail(&e);
                Err(e)
            }
        }
    }

    async fn run(&self, ticket: ReloadTicket) -> ListView<R> {
        info!(
            "Loading {} (q={:?}, page={}, pageSize={})",
            self.name, ticket.query.q, ticket.query.page, ticket.query.page_size
        );
        let mut guard = LoadingGuard {
            state: &self.state,
            ticket: Some(ticket.clone()),
        };
        let result = self.source.list(&ticket.query).await;
        guard.disarm();

        if let Err(e) = &result {
            warn!("Loading {} failed: {}", self.name, e);
        }
        let mut state = lock(&self.state);
        state.commit(&ticket, result);
        state.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(ids: &[i64], total: u64) -> Page<i64> {
        Page {
            data: ids.to_vec(),
            total,
        }
    }

    #[test]
    fn test_total_pages_never_below_one() {
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(3, 0), 3);
    }

    #[test]
    fn test_search_resets_page_and_applies_query() {
        let mut c: ListController<i64> = ListController::new(20);
        let t = c.begin_reload();
        c.commit(&t, Ok(page(&[1], 100)));
        let t = c.go_to_page(4);
        assert_eq!(t.query.page, 4);
        c.commit(&t, Ok(page(&[1], 100)));

        c.set_query("ana");
        assert_eq!(c.page(), 4, "typing alone does not reload or move");
        let t = c.search();
        assert_eq!(t.query.page, 1);
        assert_eq!(t.query.q.as_deref(), Some("ana"));
        assert!(c.is_loading());
    }

    #[test]
    fn test_go_to_page_clamps() {
        let mut c: ListController<i64> = ListController::new(20);
        let t = c.begin_reload();
        c.commit(&t, Ok(page(&[1, 2], 45)));
        assert_eq!(c.total_pages(), 3);
        assert_eq!(c.go_to_page(99).query.page, 3);
        assert_eq!(c.go_to_page(0).query.page, 1);
        assert_eq!(c.go_to_page(-5).query.page, 1);
        assert_eq!(c.go_to_page(2).query.page, 2);
    }

    #[test]
    fn test_go_to_page_with_no_rows_stays_on_one() {
        let mut c: ListController<i64> = ListController::new(20);
        assert_eq!(c.go_to_page(2).query.page, 1);
    }

    #[test]
    fn test_failure_clears_rows_and_sets_error() {
        let mut c: ListController<i64> = ListController::new(20);
        let t = c.begin_reload();
        c.commit(&t, Ok(page(&[1, 2, 3], 3)));
        let t = c.begin_reload();
        c.commit(&t, Err(AppError::Network("connection reset".into())));
        assert!(c.rows().is_empty());
        assert_eq!(c.total(), 0);
        assert_eq!(c.error(), Some("Network error: connection reset"));
        assert!(!c.is_loading());
        assert_eq!(c.view().display, ListDisplay::Error);
        assert!(!c.view().auth_lost);
    }

    #[test]
    fn test_unauthorized_reload_flags_auth_lost() {
        let mut c: ListController<i64> = ListController::new(20);
        let t = c.begin_reload();
        c.commit(
            &t,
            Err(AppError::Request {
                status: 401,
                message: "Invalid JWT".into(),
                body: String::new(),
            }),
        );
        assert!(c.view().auth_lost);
        let t = c.begin_reload();
        c.commit(&t, Ok(page(&[1], 1)));
        assert!(!c.view().auth_lost);
    }

    #[test]
    fn test_success_clears_previous_error() {
        let mut c: ListController<i64> = ListController::new(20);
        let t = c.begin_reload();
        c.commit(&t, Err(AppError::Network("x".into())));
        let t = c.begin_reload();
        c.commit(&t, Ok(page(&[9], 1)));
        assert_eq!(c.error(), None);
        assert_eq!(c.view().display, ListDisplay::Rows);
    }

    #[test]
    fn test_stale_commit_is_dropped() {
        let mut c: ListController<i64> = ListController::new(20);
        let old = c.begin_reload();
        let new = c.begin_reload();
        assert!(c.commit(&new, Ok(page(&[2], 1))));
        assert!(!c.commit(&old, Ok(page(&[1], 1))));
        assert_eq!(c.rows(), &[2]);
    }

    #[test]
    fn test_stale_release_keeps_newer_loading() {
        let mut c: ListController<i64> = ListController::new(20);
        let old = c.begin_reload();
        let _new = c.begin_reload();
        c.release(&old);
        assert!(c.is_loading());
    }

    #[test]
    fn test_over_delivered_page_is_capped() {
        let mut c: ListController<i64> = ListController::new(2);
        let t = c.begin_reload();
        c.commit(&t, Ok(page(&[1, 2, 3, 4], 4)));
        assert_eq!(c.rows().len(), 2);
        assert_eq!(c.total(), 4);
    }

    #[test]
    fn test_display_precedence() {
        let mut c: ListController<i64> = ListController::new(20);
        assert_eq!(c.view().display, ListDisplay::Empty);
        let t = c.begin_reload();
        assert_eq!(c.view().display, ListDisplay::Loading);
        c.commit(&t, Ok(page(&[], 0)));
        let view = c.view();
        assert_eq!(view.display, ListDisplay::Empty);
        assert_eq!(view.total_pages, 1);
    }
}
