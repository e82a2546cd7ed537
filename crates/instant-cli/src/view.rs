//! Plain-text rendering of a query session.
//!
//! Progress and notices go to the diagnostic stream as they happen. Results
//! are kept until the session settles and then printed once, so the output
//! stream only ever holds the final page.

use std::io::Write;

use instant_runtime::{
    Notice, PackageResults, PackageSummary, PageControl, PaginationControls, ProgressBar,
    ResultMode, ResultRow, Severity, View,
};
use url::Url;

pub struct TerminalView<O: Write, E: Write> {
    out: O,
    err: E,
    base: Url,
    mode: ResultMode,
    rows: Vec<ResultRow>,
    package_results: Vec<PackageResults>,
    flat_pagination: Option<PaginationControls>,
    package_pagination: Option<PaginationControls>,
    packages: Option<PackageSummary>,
    last_progress: Option<String>,
}

impl<O: Write, E: Write> TerminalView<O, E> {
    pub fn new(base: Url, out: O, err: E) -> Self {
        Self {
            out,
            err,
            base,
            mode: ResultMode::Flat,
            rows: Vec::new(),
            package_results: Vec::new(),
            flat_pagination: None,
            package_pagination: None,
            packages: None,
            last_progress: None,
        }
    }

    /// Print the page that is currently visible.
    pub fn finish(&mut self) -> std::io::Result<()> {
        match self.mode {
            ResultMode::Flat => {
                for row in &self.rows {
                    write_row(&mut self.out, &self.base, row)?;
                }
                if let Some(controls) = &self.flat_pagination {
                    writeln!(self.out, "{}", format_controls(controls))?;
                }
            }
            ResultMode::PerPackage => {
                for block in &self.package_results {
                    writeln!(self.out, "== {} ==", block.package)?;
                    for row in &block.rows {
                        write_row(&mut self.out, &self.base, row)?;
                    }
                    writeln!(self.out, "   all results: {}", block.all_results_url)?;
                    writeln!(self.out)?;
                }
                if let Some(controls) = &self.package_pagination {
                    writeln!(self.out, "{}", format_controls(controls))?;
                }
            }
        }

        match &self.packages {
            Some(PackageSummary::Single(package)) => {
                writeln!(self.out, "All results from Debian source package {}", package)?;
            }
            Some(PackageSummary::Many { links, hint }) => {
                let names: Vec<&str> = links.iter().map(|(name, _)| name.as_str()).collect();
                writeln!(self.out, "Filter by package: {}", names.join(" "))?;
                if let Some(hint) = hint {
                    writeln!(self.out, "To see all packages: {}", hint)?;
                }
            }
            None => {}
        }
        self.out.flush()
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> View for TerminalView<O, E> {
    fn set_title(&mut self, title: &str) {
        let _ = writeln!(self.err, "{}", title);
    }

    fn render_progress(&mut self, progress: &ProgressBar) {
        if !progress.visible {
            return;
        }
        let line = format!("[{:>3.0}%] {}", progress.percent, progress.text);
        if self.last_progress.as_deref() == Some(line.as_str()) {
            return;
        }
        let _ = writeln!(self.err, "{}", line);
        self.last_progress = Some(line);
    }

    fn render_notice(&mut self, notice: &Notice) {
        let marker = match notice.severity {
            Severity::Warning => "warning",
            Severity::Permanent => "error",
        };
        let _ = writeln!(self.err, "{}: {}", marker, notice.message);
    }

    fn clear_notice(&mut self, _unique_id: &str) {}

    fn render_results(&mut self, rows: &[ResultRow]) {
        self.rows = rows.to_vec();
    }

    fn render_package_results(&mut self, packages: &[PackageResults]) {
        self.package_results = packages.to_vec();
    }

    fn render_pagination(&mut self, controls: &PaginationControls) {
        if controls.per_package {
            self.package_pagination = Some(controls.clone());
        } else {
            self.flat_pagination = Some(controls.clone());
        }
    }

    fn render_packages(&mut self, summary: &PackageSummary) {
        self.packages = Some(summary.clone());
    }

    fn set_options_visible(&mut self, _visible: bool) {}

    fn set_grouping_enabled(&mut self, _enabled: bool) {}

    fn show_mode(&mut self, mode: ResultMode) {
        self.mode = mode;
    }
}

fn write_row(out: &mut impl Write, base: &Url, row: &ResultRow) -> std::io::Result<()> {
    let link = base
        .join(&row.show_url())
        .map(|url| url.to_string())
        .unwrap_or_else(|_| row.show_url());
    writeln!(out, "{}:{}  {}", row.path, row.line, link)?;
    for line in row.context_lines() {
        let marker = if line.matched { ">" } else { " " };
        writeln!(out, "  {} {}", marker, unescape_html(line.text))?;
    }
    writeln!(out)
}

/// `< 1 [2] 3 … 9 >` with the current page in brackets.
fn format_controls(controls: &PaginationControls) -> String {
    let labels: Vec<String> = controls
        .items
        .iter()
        .map(|item| match item {
            PageControl::Page { current: true, .. } => format!("[{}]", item.label()),
            _ => item.label(),
        })
        .collect();
    format!("Pages: {}", labels.join(" "))
}

/// Undo the entity escaping applied by the server to context lines.
fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use instant_runtime::pagination::url_for;

    use super::*;

    fn base() -> Url {
        Url::parse("https://codesearch.example.org/").unwrap()
    }

    fn view() -> TerminalView<Vec<u8>, Vec<u8>> {
        TerminalView::new(base(), Vec::new(), Vec::new())
    }

    fn row(path: &str, line: u32, context: &str) -> ResultRow {
        ResultRow {
            path: path.to_string(),
            line,
            path_rank: 0.0,
            ranking: 0.5,
            context_before2: String::new(),
            context_before1: "int x;".to_string(),
            matched_text: context.to_string(),
            context_after1: String::new(),
            context_after2: String::new(),
        }
    }

    fn output(view: TerminalView<Vec<u8>, Vec<u8>>) -> (String, String) {
        let (out, err) = view.into_writers();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_flat_results_printed_on_finish() {
        let mut view = view();
        view.render_results(&[row("i3-wm_4.8-1/src/main.c", 42, "if (a &lt; b)")]);
        view.render_pagination(&PaginationControls {
            per_package: false,
            current: 1,
            total: 3,
            items: vec![
                PageControl::Prev {
                    page: 0,
                    url: url_for(&base(), "foo", 0, false),
                },
                PageControl::Page {
                    page: 0,
                    url: url_for(&base(), "foo", 0, false),
                    current: false,
                },
                PageControl::Page {
                    page: 1,
                    url: url_for(&base(), "foo", 1, false),
                    current: true,
                },
                PageControl::Page {
                    page: 2,
                    url: url_for(&base(), "foo", 2, false),
                    current: false,
                },
            ],
        });
        view.finish().unwrap();

        let (out, _) = output(view);
        assert!(out.contains(
            "i3-wm_4.8-1/src/main.c:42  https://codesearch.example.org/show?file=i3-wm_4.8-1%2Fsrc%2Fmain.c&line=42"
        ));
        assert!(out.contains("  > if (a < b)"));
        assert!(out.contains("    int x;"));
        assert!(out.contains("Pages: < 1 [2] 3"));
    }

    #[test]
    fn test_grouped_mode_prints_package_blocks() {
        let mut view = view();
        view.render_results(&[row("flat_1/a.c", 1, "flat")]);
        view.render_package_results(&[PackageResults {
            package: "i3-wm".to_string(),
            rows: vec![row("i3-wm_4.8-1/src/main.c", 7, "grouped")],
            all_results_url: Url::parse("https://codesearch.example.org/search?q=foo+package%3Ai3-wm")
                .unwrap(),
        }]);
        view.show_mode(ResultMode::PerPackage);
        view.render_packages(&PackageSummary::Many {
            links: vec![
                ("i3-wm".to_string(), base()),
                ("dwm".to_string(), base()),
            ],
            hint: Some("curl -s x | jq".to_string()),
        });
        view.finish().unwrap();

        let (out, _) = output(view);
        assert!(out.contains("== i3-wm =="));
        assert!(out.contains("grouped"));
        assert!(!out.contains("flat"));
        assert!(out.contains("Filter by package: i3-wm dwm"));
        assert!(out.contains("To see all packages: curl -s x | jq"));
    }

    #[test]
    fn test_progress_lines_are_deduplicated() {
        let mut view = view();
        let mut progress = ProgressBar::default();
        view.render_progress(&progress);
        progress.start("Checking which files to grep…", false);
        view.render_progress(&progress);
        view.render_progress(&progress);
        progress.update(55.0, false, Some("Searching"));
        view.render_progress(&progress);

        let (out, err) = output(view);
        assert!(out.is_empty());
        assert_eq!(
            err,
            "[ 10%] Checking which files to grep…\n[ 55%] Searching\n"
        );
    }

    #[test]
    fn test_notices_go_to_diagnostics() {
        let mut view = view();
        view.set_title("foo · Debian Code Search");
        view.render_notice(&Notice::permanent(None, "backend down"));
        view.render_notice(&Notice::warning(Some("reconnecting"), "reconnecting…"));

        let (_, err) = output(view);
        assert!(err.contains("foo · Debian Code Search\n"));
        assert!(err.contains("error: backend down\n"));
        assert!(err.contains("warning: reconnecting…\n"));
    }

    #[test]
    fn test_single_package_summary() {
        let mut view = view();
        view.render_packages(&PackageSummary::Single("i3-wm".to_string()));
        view.finish().unwrap();
        let (out, _) = output(view);
        assert_eq!(out, "All results from Debian source package i3-wm\n");
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("a &amp;&lt;b&gt; &quot;c&quot;"), "a &<b> \"c\"");
        assert_eq!(unescape_html("&amp;lt;"), "&lt;");
    }
}
