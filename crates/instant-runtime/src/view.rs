use url::Url;

use crate::grouping::ResultMode;
use crate::notices::Notice;
use crate::pagination::PaginationControls;
use crate::progress::ProgressBar;
use crate::protocol::ResultRow;

/// A package block ready for display on a grouped page.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageResults {
    pub package: String,
    pub rows: Vec<ResultRow>,
    /// Query narrowed to this package.
    pub all_results_url: Url,
}

/// Package list shown once the query completes.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageSummary {
    /// All results come from one source package.
    Single(String),
    /// Filter links, truncated to the configured maximum.
    Many {
        links: Vec<(String, Url)>,
        /// Command listing every package when `links` was truncated.
        hint: Option<String>,
    },
}

/// Rendering collaborator. Receives commands from the session and owns
/// everything about presentation.
pub trait View {
    fn set_title(&mut self, title: &str);
    fn render_progress(&mut self, progress: &ProgressBar);
    fn render_notice(&mut self, notice: &Notice);
    fn clear_notice(&mut self, unique_id: &str);
    fn render_results(&mut self, rows: &[ResultRow]);
    fn render_package_results(&mut self, packages: &[PackageResults]);
    fn render_pagination(&mut self, controls: &PaginationControls);
    fn render_packages(&mut self, summary: &PackageSummary);
    /// Grouping toggle and package filter.
    fn set_options_visible(&mut self, visible: bool);
    fn set_grouping_enabled(&mut self, enabled: bool);
    fn show_mode(&mut self, mode: ResultMode);

    fn scroll_to_top(&mut self) {}
}
