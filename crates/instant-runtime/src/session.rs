//! The query session state machine.
//!
//! A session owns one transport and consumes its events strictly in arrival
//! order. Page fetches run as independent tasks and report back through the
//! same event channel; every completion is checked against the session
//! generation and the most recently requested page before it is rendered, so
//! results of a superseded query or page are dropped on arrival.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::api::{packages_path, ResultsApi};
use crate::config::SessionConfig;
use crate::grouping::{GroupingChange, GroupingController, ResultMode};
use crate::notices::{Notice, NoticeBoard, NO_RESULTS_ID, RECONNECTING_ID};
use crate::pagination::{package_filter_url, History, NavigationState, PaginationSync};
use crate::progress::{progress_percent, ProgressBar};
use crate::protocol::{
    ErrorKind, PackagePage, Pagination, ProgressUpdate, ProtocolError, ResultRow, StreamMessage,
    PACKAGES_PER_PAGE,
};
use crate::transport::{Transport, TransportEvent, TransportFactory, TransportSink};
use crate::view::{PackageResults, PackageSummary, View};
use crate::window::ResultWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Complete,
    Errored,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The stream carried data the client does not understand. The session
    /// is unusable afterwards.
    #[error("protocol defect: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Everything that can drive the session after it started.
#[derive(Debug)]
pub enum SessionEvent {
    Transport {
        generation: Uuid,
        event: TransportEvent,
    },
    PageLoaded {
        generation: Uuid,
        page: usize,
        result: Result<Vec<ResultRow>>,
    },
    PackagePageLoaded {
        generation: Uuid,
        page: usize,
        preload: bool,
        result: Result<Vec<PackagePage>>,
    },
    PackagesLoaded {
        generation: Uuid,
        result: Result<Vec<String>>,
    },
    LoadingTimer {
        generation: Uuid,
        ticket: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadKind {
    /// User asked for the page: record it in history.
    Interactive,
    /// Back/forward navigation: history already points at the page.
    Restore,
    /// Background fetch for a hidden view.
    Preload,
}

/// Delayed "loading…" progress for a page fetch.
struct Loading {
    ticket: u64,
    mode: ResultMode,
    text: String,
    handle: JoinHandle<()>,
}

pub struct QuerySession<V: View, H: History> {
    config: SessionConfig,
    api: Arc<dyn ResultsApi>,
    transports: Arc<dyn TransportFactory>,
    transport: Option<Box<dyn Transport>>,
    view: V,
    pagination: PaginationSync<H>,
    grouping: GroupingController,
    window: ResultWindow,
    notices: NoticeBoard,
    progress: ProgressBar,

    generation: Uuid,
    state: SessionState,
    term: String,
    query_id: Option<String>,
    files_processed: u64,
    files_total: u64,
    result_count: u64,
    current_page: usize,
    current_package_page: usize,
    result_page_count: usize,
    packages: Vec<String>,
    package_results: Vec<PackageResults>,

    pending_page: Option<usize>,
    pending_package_page: Option<usize>,
    in_flight: usize,
    loading: Option<Loading>,
    next_ticket: u64,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<V: View, H: History> QuerySession<V, H> {
    pub fn new(
        config: SessionConfig,
        base: Url,
        api: Arc<dyn ResultsApi>,
        transports: Arc<dyn TransportFactory>,
        view: V,
        history: H,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            api,
            transports,
            transport: None,
            view,
            pagination: PaginationSync::new(base, history),
            grouping: GroupingController::new(),
            window: ResultWindow::new(),
            notices: NoticeBoard::new(),
            progress: ProgressBar::default(),
            generation: Uuid::nil(),
            state: SessionState::Idle,
            term: String::new(),
            query_id: None,
            files_processed: 0,
            files_total: 0,
            result_count: 0,
            current_page: 0,
            current_package_page: 0,
            result_page_count: 0,
            packages: Vec::new(),
            package_results: Vec::new(),
            pending_page: None,
            pending_package_page: None,
            in_flight: 0,
            loading: None,
            next_ticket: 0,
            events_tx,
            events_rx,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn generation(&self) -> Uuid {
        self.generation
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    pub fn files_processed(&self) -> u64 {
        self.files_processed
    }

    pub fn files_total(&self) -> u64 {
        self.files_total
    }

    pub fn result_count(&self) -> u64 {
        self.result_count
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn current_package_page(&self) -> usize {
        self.current_package_page
    }

    pub fn result_page_count(&self) -> usize {
        self.result_page_count
    }

    pub fn package_page_count(&self) -> usize {
        self.packages.len().div_ceil(PACKAGES_PER_PAGE)
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn package_results(&self) -> &[PackageResults] {
        &self.package_results
    }

    pub fn window(&self) -> &ResultWindow {
        &self.window
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn progress(&self) -> &ProgressBar {
        &self.progress
    }

    pub fn grouping(&self) -> &GroupingController {
        &self.grouping
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn history(&self) -> &H {
        self.pagination.history()
    }

    pub fn history_mut(&mut self) -> &mut H {
        self.pagination.history_mut()
    }

    pub fn pagination(&self) -> &PaginationSync<H> {
        &self.pagination
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start a query if the current location already names one.
    pub fn boot(&mut self) -> bool {
        match self.pagination.location_state() {
            Some(nav) => {
                self.start(&nav.term);
                true
            }
            None => false,
        }
    }

    /// Submit a new query from user input.
    pub fn submit(&mut self, term: &str) {
        self.pagination
            .push_state(NavigationState::new(term, 0, false));
        self.start(term);
    }

    /// Start streaming `term`, superseding whatever query was live.
    pub fn start(&mut self, term: &str) {
        self.close_transport();
        self.cancel_loading();
        for notice in self.notices.notices() {
            if let Some(id) = notice.unique_id.as_deref() {
                self.view.clear_notice(id);
            }
        }

        self.generation = Uuid::new_v4();
        self.state = SessionState::Connecting;
        self.term = term.to_string();
        self.query_id = None;
        self.files_processed = 0;
        self.files_total = 0;
        self.result_count = 0;
        self.current_page = 0;
        self.current_package_page = 0;
        self.result_page_count = 0;
        self.packages.clear();
        self.package_results.clear();
        self.pending_page = None;
        self.pending_package_page = None;
        self.window.reset();
        self.notices.clear();
        self.grouping.reset();
        self.progress.reset();

        info!(term = %term, generation = %self.generation, "Starting query");

        self.view.show_mode(ResultMode::Flat);
        self.view.set_options_visible(false);
        self.view.render_results(&[]);
        self.view
            .set_title(&format!("{} · Debian Code Search", term));
        self.progress.start("Checking which files to grep…", false);
        self.view.render_progress(&self.progress);

        let sink = self.sink();
        let opened = self.transports.create().and_then(|mut transport| {
            transport.open(term, sink)?;
            Ok(transport)
        });
        match opened {
            Ok(transport) => {
                debug!(kind = ?transport.kind(), "Transport opened");
                self.transport = Some(transport);
            }
            Err(e) => {
                error!(error = %e, "Failed to open transport");
                self.state = SessionState::Errored;
                self.fatal(&format!("Could not connect to the server: {}", e));
            }
        }
    }

    fn sink(&self) -> TransportSink {
        let tx = self.events_tx.clone();
        let generation = self.generation;
        TransportSink::new(move |event| {
            tx.send(SessionEvent::Transport { generation, event }).is_ok()
        })
    }

    fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    /// Wait for the next event without handling it.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Process events until no page fetch is outstanding.
    pub async fn settle(&mut self) -> Result<(), SessionError> {
        while self.in_flight > 0 {
            match self.events_rx.recv().await {
                Some(event) => self.handle(event)?,
                None => break,
            }
        }
        Ok(())
    }

    /// Process events until the query has finished and every follow-up
    /// fetch has been rendered.
    pub async fn run_until_complete(&mut self) -> Result<(), SessionError> {
        loop {
            let finished = matches!(
                self.state,
                SessionState::Idle | SessionState::Complete | SessionState::Errored
            );
            if finished && self.in_flight == 0 {
                return Ok(());
            }
            match self.events_rx.recv().await {
                Some(event) => self.handle(event)?,
                None => return Ok(()),
            }
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        match event {
            SessionEvent::Transport { generation, event } => {
                if generation != self.generation {
                    debug!("Discarding transport event of a superseded query");
                    return Ok(());
                }
                self.on_transport(event)
            }
            SessionEvent::PageLoaded {
                generation,
                page,
                result,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if generation != self.generation {
                    debug!(page, "Discarding page of a superseded query");
                    return Ok(());
                }
                self.on_page_loaded(page, result);
                Ok(())
            }
            SessionEvent::PackagePageLoaded {
                generation,
                page,
                preload,
                result,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if generation != self.generation {
                    debug!(page, "Discarding per-package page of a superseded query");
                    return Ok(());
                }
                self.on_package_page_loaded(page, preload, result);
                Ok(())
            }
            SessionEvent::PackagesLoaded { generation, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if generation != self.generation {
                    debug!("Discarding package list of a superseded query");
                    return Ok(());
                }
                self.on_packages_loaded(result);
                Ok(())
            }
            SessionEvent::LoadingTimer { generation, ticket } => {
                if generation == self.generation {
                    self.on_loading_timer(ticket);
                }
                Ok(())
            }
        }
    }

    fn on_transport(&mut self, event: TransportEvent) -> Result<(), SessionError> {
        if self.state == SessionState::Errored {
            return Ok(());
        }
        match event {
            TransportEvent::Message(message) => {
                self.on_message(message);
                Ok(())
            }
            TransportEvent::Defect(err) => {
                if !self.is_streaming() {
                    warn!(
                        error = %err,
                        state = ?self.state,
                        "Ignoring protocol defect after the query finished"
                    );
                    return Ok(());
                }
                error!(error = %err, "Protocol defect, abandoning query");
                self.state = SessionState::Errored;
                self.close_transport();
                self.fatal(&format!("Lost protocol sync with the server: {}", err));
                Err(SessionError::Protocol(err))
            }
            TransportEvent::Reconnecting => {
                if self.is_streaming() {
                    warn!("Connection lost, reconnecting");
                    self.post_notice(Notice::warning(
                        Some(RECONNECTING_ID),
                        "Lost connection to the server, reconnecting…",
                    ));
                }
                Ok(())
            }
            TransportEvent::Reopened => {
                if self.notices.dismiss(RECONNECTING_ID) {
                    self.view.clear_notice(RECONNECTING_ID);
                }
                Ok(())
            }
            TransportEvent::Closed(reason) => {
                if self.is_streaming() {
                    warn!(reason = %reason, "Transport closed for good");
                    self.state = SessionState::Errored;
                    if self.notices.dismiss(RECONNECTING_ID) {
                        self.view.clear_notice(RECONNECTING_ID);
                    }
                    self.fatal(&format!("Connection to the server lost: {}", reason));
                }
                Ok(())
            }
        }
    }

    fn is_streaming(&self) -> bool {
        matches!(
            self.state,
            SessionState::Connecting | SessionState::Streaming
        )
    }

    fn on_message(&mut self, message: StreamMessage) {
        if self.state == SessionState::Connecting {
            info!("Query accepted, streaming results");
            self.state = SessionState::Streaming;
        }
        match message {
            StreamMessage::Progress(update) => self.on_progress(update),
            StreamMessage::Pagination(pagination) => self.on_pagination(pagination),
            StreamMessage::Result(row) => {
                self.window.insert(row);
                self.view.render_results(self.window.rows());
            }
            StreamMessage::Error(kind) => self.on_server_error(kind),
        }
    }

    fn on_progress(&mut self, update: ProgressUpdate) {
        if !update.query_id.is_empty() {
            self.query_id = Some(update.query_id.clone());
        }
        let total = update.files_total;
        let processed = if update.files_processed > total {
            warn!(
                processed = update.files_processed,
                total, "Server reported more processed files than total"
            );
            total
        } else {
            update.files_processed
        };
        self.files_processed = processed;
        self.files_total = total;
        self.result_count = update.results;

        if processed < total {
            if !self.progress.is_halted() {
                self.progress.update(
                    progress_percent(processed, total),
                    false,
                    Some(&format!(
                        "{} / {} files grepped ({} results)",
                        processed, total, update.results
                    )),
                );
                self.view.render_progress(&self.progress);
            }
            return;
        }

        if self.state == SessionState::Complete {
            if update.results == 0 {
                self.post_no_results();
            }
            return;
        }

        info!(
            files = total,
            results = update.results,
            "Query complete"
        );
        self.state = SessionState::Complete;
        self.close_transport();
        self.on_query_done(total, update.results);
    }

    /// Completion: render totals, then resolve packages and prefetch the
    /// first grouped page.
    fn on_query_done(&mut self, files_total: u64, results: u64) {
        if !self.progress.is_halted() {
            self.progress.update(
                100.0,
                false,
                Some(&format!("{} files grepped ({} results)", files_total, results)),
            );
            self.view.render_progress(&self.progress);
        }

        if results == 0 {
            self.post_no_results();
            return;
        }

        self.view.set_options_visible(true);
        self.request_package_page(0, LoadKind::Preload);
        self.request_packages();
    }

    fn post_no_results(&mut self) {
        let message = format!(
            "Your query “{}” had no results. Did you read the FAQ to make sure your syntax is correct?",
            self.term
        );
        self.post_notice(Notice::permanent(Some(NO_RESULTS_ID), message));
    }

    fn on_pagination(&mut self, pagination: Pagination) {
        debug!(
            query_id = %pagination.query_id,
            pages = pagination.result_pages,
            "Pagination available"
        );
        self.query_id = Some(pagination.query_id);
        self.result_page_count = pagination.result_pages;
        self.current_page = 0;
        self.current_package_page = 0;
        self.render_flat_controls();

        // Deep link: the location decides which flat page replaces the
        // streamed window. Grouped locations wait for the package list.
        if let Some(nav) = self.pagination.location_state() {
            if !nav.per_package && nav.term == self.term {
                self.request_page(nav.page, LoadKind::Interactive);
            }
        }
    }

    fn on_server_error(&mut self, kind: ErrorKind) {
        let message = kind.message();
        warn!(kind = kind.as_str(), "Server reported an error");
        self.post_notice(Notice::permanent(Some(kind.as_str()), message.clone()));
        if kind.halts_progress() && !self.progress.is_halted() {
            self.progress.halt(&message);
            self.view.render_progress(&self.progress);
        }
    }

    // ------------------------------------------------------------------
    // Page fetches
    // ------------------------------------------------------------------

    /// Fetch and render flat page `page`, recording it in history.
    pub fn load_page(&mut self, page: usize) -> bool {
        self.request_page(page, LoadKind::Interactive)
    }

    /// Fetch and render per-package page `page`. A preload leaves the
    /// location untouched.
    pub fn load_package_page(&mut self, page: usize, preload: bool) -> bool {
        let kind = if preload {
            LoadKind::Preload
        } else {
            LoadKind::Interactive
        };
        self.request_package_page(page, kind)
    }

    fn request_page(&mut self, page: usize, kind: LoadKind) -> bool {
        let Some(query_id) = self.query_id.clone() else {
            warn!(page, "No query id yet, cannot load page");
            return false;
        };

        if kind != LoadKind::Preload {
            self.view.scroll_to_top();
            self.schedule_loading(
                ResultMode::Flat,
                self.config.page_loading_delay(),
                format!("Loading search result page {}…", page + 1),
            );
        }
        if kind == LoadKind::Interactive {
            self.pagination
                .push_state(NavigationState::new(&self.term, page, false));
        }

        self.pending_page = Some(page);
        self.in_flight += 1;
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = api.page(&query_id, page).await;
            let _ = tx.send(SessionEvent::PageLoaded {
                generation,
                page,
                result,
            });
        });
        true
    }

    fn request_package_page(&mut self, page: usize, kind: LoadKind) -> bool {
        let Some(query_id) = self.query_id.clone() else {
            warn!(page, "No query id yet, cannot load per-package page");
            return false;
        };

        if kind != LoadKind::Preload {
            self.view.scroll_to_top();
            self.schedule_loading(
                ResultMode::PerPackage,
                self.config.package_page_loading_delay(),
                format!("Loading per-package search result page {}…", page + 1),
            );
        }
        if kind == LoadKind::Interactive {
            self.pagination
                .push_state(NavigationState::new(&self.term, page, true));
        }

        self.pending_package_page = Some(page);
        self.in_flight += 1;
        let preload = kind == LoadKind::Preload;
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = api.package_page(&query_id, page).await;
            let _ = tx.send(SessionEvent::PackagePageLoaded {
                generation,
                page,
                preload,
                result,
            });
        });
        true
    }

    fn request_packages(&mut self) {
        let Some(query_id) = self.query_id.clone() else {
            warn!("No query id yet, cannot load package list");
            return;
        };
        self.in_flight += 1;
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = api.packages(&query_id).await;
            let _ = tx.send(SessionEvent::PackagesLoaded { generation, result });
        });
    }

    fn on_page_loaded(&mut self, page: usize, result: Result<Vec<ResultRow>>) {
        if self.pending_page != Some(page) {
            debug!(page, pending = ?self.pending_page, "Discarding stale page");
            return;
        }
        self.pending_page = None;

        match result {
            Ok(rows) => {
                self.current_page = page;
                self.render_flat_controls();
                self.window.replace(rows);
                self.view.render_results(self.window.rows());
                self.finish_loading(ResultMode::Flat);
            }
            Err(e) => {
                self.cancel_loading();
                warn!(page, error = %e, "Loading page failed");
                self.fatal(&format!("Could not load search query results: {}", e));
            }
        }
    }

    fn on_package_page_loaded(
        &mut self,
        page: usize,
        preload: bool,
        result: Result<Vec<PackagePage>>,
    ) {
        if self.pending_package_page != Some(page) {
            debug!(page, pending = ?self.pending_package_page, "Discarding stale per-package page");
            return;
        }
        self.pending_package_page = None;

        match result {
            Ok(pages) => {
                self.current_package_page = page;
                self.render_package_controls();
                let base = self.pagination.base().clone();
                self.package_results = pages
                    .into_iter()
                    .map(|block| PackageResults {
                        all_results_url: package_filter_url(&base, &self.term, &block.package.name),
                        rows: ResultWindow::from_rows(block.rows).into_rows(),
                        package: block.package.name,
                    })
                    .collect();
                self.view.render_package_results(&self.package_results);
                self.finish_loading(ResultMode::PerPackage);
                debug!(page, preload, "Per-package page rendered");
            }
            Err(e) => {
                self.cancel_loading();
                warn!(page, error = %e, "Loading per-package page failed");
                self.fatal(&format!("Could not load search query results (\"{}\").", e));
            }
        }
    }

    fn on_packages_loaded(&mut self, result: Result<Vec<String>>) {
        let packages = match result {
            Ok(packages) => packages,
            Err(e) => {
                warn!(error = %e, "Loading package list failed");
                self.fatal(&format!("Loading search result package list failed: {}", e));
                return;
            }
        };

        info!(count = packages.len(), "Package list resolved");
        self.packages = packages;
        self.render_package_controls();
        let enabled = self.grouping.set_packages(&self.packages);
        self.view.set_grouping_enabled(enabled);

        match self.packages.len() {
            0 => {}
            1 => {
                let summary = PackageSummary::Single(self.packages[0].clone());
                self.view.render_packages(&summary);
            }
            count => {
                let base = self.pagination.base().clone();
                let max = self.config.max_listed_packages;
                let links = self
                    .packages
                    .iter()
                    .take(max)
                    .map(|name| (name.clone(), package_filter_url(&base, &self.term, name)))
                    .collect();
                let hint = match (&self.query_id, count > max) {
                    (Some(query_id), true) => base
                        .join(&packages_path(query_id))
                        .ok()
                        .map(|url| format!("curl -s {} | jq -r '.Packages[]'", url)),
                    _ => None,
                };
                self.view
                    .render_packages(&PackageSummary::Many { links, hint });

                // Deep link into the grouped view.
                if let Some(nav) = self.pagination.location_state() {
                    if nav.per_package && nav.term == self.term {
                        self.apply_grouping(ResultMode::PerPackage, false);
                        self.request_package_page(nav.page, LoadKind::Interactive);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Grouping and navigation
    // ------------------------------------------------------------------

    /// User toggled grouping. Returns whether the visible mode changed.
    pub fn set_grouping(&mut self, per_package: bool) -> bool {
        self.apply_grouping(ResultMode::from_per_package(per_package), true)
    }

    fn apply_grouping(&mut self, mode: ResultMode, record: bool) -> bool {
        match self.grouping.request(mode) {
            GroupingChange::Disabled => {
                warn!("Per-package view requested but results come from a single package");
                self.view.set_grouping_enabled(false);
                false
            }
            GroupingChange::Unchanged => false,
            GroupingChange::Switch(mode) => {
                if record {
                    let page = match mode {
                        ResultMode::PerPackage => self.current_package_page,
                        ResultMode::Flat => self.current_page,
                    };
                    self.pagination.push_state(NavigationState::new(
                        &self.term,
                        page,
                        mode.is_per_package(),
                    ));
                }
                self.grouping.commit(mode);
                self.view.show_mode(mode);
                true
            }
        }
    }

    /// Back/forward navigation. The state stored with the history entry is
    /// the source of truth; entries without one fall back to the location.
    pub fn navigate(&mut self, state: Option<NavigationState>) {
        let Some(nav) = state.or_else(|| self.pagination.location_state()) else {
            debug!("Navigation to a location without results, ignoring");
            return;
        };

        if nav.term != self.term {
            info!(term = %nav.term, "Navigated to a different query");
            self.start(&nav.term);
            return;
        }

        self.apply_grouping(ResultMode::from_per_package(nav.per_package), false);
        if nav.per_package {
            self.request_package_page(nav.page, LoadKind::Restore);
        } else {
            self.request_page(nav.page, LoadKind::Restore);
        }
    }

    // ------------------------------------------------------------------
    // Rendering helpers
    // ------------------------------------------------------------------

    fn render_flat_controls(&mut self) {
        let controls = self.pagination.render_controls(
            &self.term,
            self.current_page,
            self.result_page_count,
            false,
        );
        self.view.render_pagination(&controls);
    }

    fn render_package_controls(&mut self) {
        let controls = self.pagination.render_controls(
            &self.term,
            self.current_package_page,
            self.package_page_count(),
            true,
        );
        self.view.render_pagination(&controls);
    }

    fn post_notice(&mut self, notice: Notice) {
        if self.notices.post(notice.clone()) {
            self.view.render_notice(&notice);
        }
    }

    /// Permanent notice plus halted progress.
    fn fatal(&mut self, message: &str) {
        self.post_notice(Notice::permanent(None, message));
        self.progress.halt(message);
        self.view.render_progress(&self.progress);
    }

    fn schedule_loading(&mut self, mode: ResultMode, delay: Duration, text: String) {
        self.cancel_loading();
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let tx = self.events_tx.clone();
        let generation = self.generation;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SessionEvent::LoadingTimer { generation, ticket });
        });
        self.loading = Some(Loading {
            ticket,
            mode,
            text,
            handle,
        });
    }

    fn on_loading_timer(&mut self, ticket: u64) {
        let Some(loading) = self.loading.as_ref() else {
            return;
        };
        if loading.ticket != ticket || self.progress.is_halted() {
            return;
        }
        let text = loading.text.clone();
        self.progress.start(&text, true);
        self.view.render_progress(&self.progress);
    }

    fn cancel_loading(&mut self) {
        if let Some(loading) = self.loading.take() {
            loading.handle.abort();
        }
    }

    fn finish_loading(&mut self, mode: ResultMode) {
        if !self.loading.as_ref().is_some_and(|l| l.mode == mode) {
            return;
        }
        self.cancel_loading();
        if !self.progress.is_halted() {
            self.progress.update(100.0, true, None);
            self.view.render_progress(&self.progress);
        }
    }
}

impl<V: View, H: History> Drop for QuerySession<V, H> {
    fn drop(&mut self) {
        self.cancel_loading();
        self.close_transport();
    }
}
