//! URL and history synchronisation for result pages.
//!
//! All reads and writes of navigation history go through [`PaginationSync`];
//! the session state machine never touches a [`History`] directly.

use serde::{Deserialize, Serialize};
use url::Url;

/// The payload attached to every history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub term: String,
    pub page: usize,
    pub per_package: bool,
}

impl NavigationState {
    pub fn new(term: impl Into<String>, page: usize, per_package: bool) -> Self {
        Self {
            term: term.into(),
            page,
            per_package,
        }
    }
}

/// Browser-style navigation history.
pub trait History {
    fn location(&self) -> Url;
    fn push_state(&mut self, state: NavigationState, title: &str, url: Url);
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub state: Option<NavigationState>,
    pub title: String,
    pub url: Url,
}

/// What a back/forward step hands to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct PopState {
    pub state: Option<NavigationState>,
    pub url: Url,
}

/// In-process history stack with back/forward support.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    entries: Vec<HistoryEntry>,
    index: usize,
}

impl MemoryHistory {
    /// Start with a single stateless entry, like a fresh page load.
    pub fn new(initial: Url) -> Self {
        Self {
            entries: vec![HistoryEntry {
                state: None,
                title: String::new(),
                url: initial,
            }],
            index: 0,
        }
    }

    pub fn back(&mut self) -> Option<PopState> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.pop_state())
    }

    pub fn forward(&mut self) -> Option<PopState> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.pop_state())
    }

    fn pop_state(&self) -> PopState {
        let entry = &self.entries[self.index];
        PopState {
            state: entry.state.clone(),
            url: entry.url.clone(),
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl History for MemoryHistory {
    fn location(&self) -> Url {
        self.entries[self.index].url.clone()
    }

    fn push_state(&mut self, state: NavigationState, title: &str, url: Url) {
        self.entries.truncate(self.index + 1);
        self.entries.push(HistoryEntry {
            state: Some(state),
            title: title.to_string(),
            url,
        });
        self.index = self.entries.len() - 1;
    }
}

/// Canonical URL for a result page. Page 0 carries no page indicator.
pub fn url_for(base: &Url, term: &str, page: usize, per_package: bool) -> Url {
    let mut query = format!("q={}", urlencoding::encode(term));
    if page > 0 {
        query.push_str(&format!("&page={}", page));
    }
    if per_package {
        query.push_str("&perpkg=1");
    }
    let mut url = base.clone();
    url.set_path(&mounted_path(base, "search"));
    url.set_query(Some(&query));
    url.set_fragment(None);
    url
}

/// Link narrowing the query to a single package.
pub fn package_filter_url(base: &Url, term: &str, package: &str) -> Url {
    url_for(base, &format!("{} package:{}", term, package), 0, false)
}

/// Directory of the base path without its trailing slash
/// (`/codesearch/` -> `/codesearch`, `/` -> empty).
fn mount_prefix(base: &Url) -> &str {
    let path = base.path();
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Absolute path of `relative` below the directory `base` is mounted at.
pub fn mounted_path(base: &Url, relative: &str) -> String {
    format!("{}/{}", mount_prefix(base), relative)
}

/// Recognise a results location below `base` in any of the accepted forms:
/// `results/{term}/page_{n}`, `perpackage-results/{term}/2/page_{n}` and
/// `search?q={term}&page={n}&perpkg={0|1}`.
pub fn parse_location(base: &Url, url: &Url) -> Option<NavigationState> {
    let path = url.path().strip_prefix(mount_prefix(base))?;
    if let Some(rest) = path.strip_prefix("/results/") {
        return parse_path_form(rest, false);
    }
    if let Some(rest) = path.strip_prefix("/perpackage-results/") {
        return parse_path_form(rest, true);
    }
    if path != "/search" {
        return None;
    }

    let mut term = None;
    let mut page = 0;
    let mut per_package = false;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "q" if term.is_none() => term = Some(value.into_owned()),
            "page" => page = value.parse().unwrap_or(0),
            "perpkg" => per_package = value == "1",
            _ => {}
        }
    }
    let term = term.filter(|t| !t.is_empty())?;
    Some(NavigationState {
        term,
        page,
        per_package,
    })
}

fn parse_path_form(rest: &str, per_package: bool) -> Option<NavigationState> {
    let mut segments = rest.split('/');
    let raw_term = segments.next().filter(|s| !s.is_empty())?;
    let term = urlencoding::decode(raw_term).ok()?.into_owned();
    let page = segments
        .filter_map(|s| s.strip_prefix("page_"))
        .find_map(|n| n.parse().ok())
        .unwrap_or(0);
    Some(NavigationState {
        term,
        page,
        per_package,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageControl {
    Prev { page: usize, url: Url },
    Page { page: usize, url: Url, current: bool },
    Ellipsis,
    Next { page: usize, url: Url },
}

impl PageControl {
    pub fn label(&self) -> String {
        match self {
            Self::Prev { .. } => "<".to_string(),
            Self::Page { page, .. } => (page + 1).to_string(),
            Self::Ellipsis => "…".to_string(),
            Self::Next { .. } => ">".to_string(),
        }
    }
}

/// Page links for one pagination region (flat or per-package).
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationControls {
    pub per_package: bool,
    pub current: usize,
    pub total: usize,
    pub items: Vec<PageControl>,
}

impl PaginationControls {
    /// Page indices that appear as numbered links, in order.
    pub fn page_numbers(&self) -> Vec<usize> {
        self.items
            .iter()
            .filter_map(|item| match item {
                PageControl::Page { page, .. } => Some(*page),
                _ => None,
            })
            .collect()
    }
}

/// Maps pages to URLs and records them in history.
pub struct PaginationSync<H: History> {
    base: Url,
    history: H,
}

impl<H: History> PaginationSync<H> {
    pub fn new(base: Url, history: H) -> Self {
        Self { base, history }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn url_for(&self, term: &str, page: usize, per_package: bool) -> Url {
        url_for(&self.base, term, page, per_package)
    }

    /// Record `state` as a new history entry unless the location already
    /// points at it. Returns whether an entry was pushed.
    pub fn push_state(&mut self, state: NavigationState) -> bool {
        let url = self.url_for(&state.term, state.page, state.per_package);
        if self.history.location() == url {
            return false;
        }
        let title = format!("page {}", state.page);
        tracing::debug!(url = %url, "Pushing history entry");
        self.history.push_state(state, &title, url);
        true
    }

    /// Navigation state named by the current location, if any.
    pub fn location_state(&self) -> Option<NavigationState> {
        parse_location(&self.base, &self.history.location())
    }

    /// Bounded window of page links around `current`.
    pub fn render_controls(
        &self,
        term: &str,
        current: usize,
        total: usize,
        per_package: bool,
    ) -> PaginationControls {
        let link = |page: usize| self.url_for(term, page, per_package);
        let mut items = Vec::new();

        let start = current
            .saturating_sub(5)
            .max(if current > 0 { 1 } else { 0 });
        let end = (if current >= 5 { current + 5 } else { 10 }).min(total);

        if current > 0 {
            items.push(PageControl::Prev {
                page: current - 1,
                url: link(current - 1),
            });
            items.push(PageControl::Page {
                page: 0,
                url: link(0),
                current: false,
            });
        }

        if start > 1 {
            items.push(PageControl::Ellipsis);
        }

        for page in start..end {
            items.push(PageControl::Page {
                page,
                url: link(page),
                current: page == current,
            });
        }

        if end + 1 < total {
            items.push(PageControl::Ellipsis);
        }

        if end < total {
            items.push(PageControl::Page {
                page: total - 1,
                url: link(total - 1),
                current: false,
            });
        }

        if current + 1 < total {
            items.push(PageControl::Next {
                page: current + 1,
                url: link(current + 1),
            });
        }

        PaginationControls {
            per_package,
            current,
            total,
            items,
        }
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut H {
        &mut self.history
    }
}
