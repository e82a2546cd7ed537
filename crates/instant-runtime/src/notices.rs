//! User-facing notices, deduplicated by a caller-supplied key.

/// Notice uniqueness key for the empty-result notice.
pub const NO_RESULTS_ID: &str = "noresults";
/// Notice uniqueness key for the connection-lost notice.
pub const RECONNECTING_ID: &str = "reconnecting";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Transient condition expected to clear on its own.
    Warning,
    /// Stays until the page is reloaded.
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub unique_id: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn permanent(unique_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.map(str::to_string),
            severity: Severity::Permanent,
            message: message.into(),
        }
    }

    pub fn warning(unique_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.map(str::to_string),
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct NoticeBoard {
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a notice. Returns false when a notice with the same key is
    /// already showing.
    pub fn post(&mut self, notice: Notice) -> bool {
        if let Some(id) = notice.unique_id.as_deref() {
            if self.contains(id) {
                return false;
            }
        }
        self.notices.push(notice);
        true
    }

    pub fn dismiss(&mut self, unique_id: &str) -> bool {
        let before = self.notices.len();
        self.notices
            .retain(|n| n.unique_id.as_deref() != Some(unique_id));
        self.notices.len() != before
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.notices
            .iter()
            .any(|n| n.unique_id.as_deref() == Some(unique_id))
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn clear(&mut self) {
        self.notices.clear();
    }
}
