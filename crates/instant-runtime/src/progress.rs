/// Progress indicator state handed to the view.
///
/// Percentage 0 means "query accepted" and is displayed as 10 %, so any
/// progress reported by the server lands in the 10..=100 range.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressBar {
    pub percent: f64,
    pub text: String,
    /// Last non-temporary text, restored when a temporary update completes.
    pub persistent_text: String,
    pub active: bool,
    pub visible: bool,
    halted: bool,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self {
            percent: 0.0,
            text: String::new(),
            persistent_text: String::new(),
            active: false,
            visible: false,
            halted: false,
        }
    }
}

/// Map stream counters onto the 10..=100 scale.
pub fn progress_percent(files_processed: u64, files_total: u64) -> f64 {
    if files_total == 0 {
        return 100.0;
    }
    let ratio = files_processed.min(files_total) as f64 / files_total as f64;
    10.0 + 90.0 * ratio
}

impl ProgressBar {
    /// Start (or restart) the bar at the "accepted" mark.
    pub fn start(&mut self, text: &str, temporary: bool) {
        self.text = text.to_string();
        if !temporary {
            self.persistent_text = text.to_string();
        }
        self.percent = 10.0;
        self.active = true;
        self.visible = true;
    }

    pub fn update(&mut self, percent: f64, temporary: bool, text: Option<&str>) {
        if let Some(text) = text {
            self.text = text.to_string();
            if !temporary {
                self.persistent_text = text.to_string();
            }
        }
        self.percent = percent;
        if percent >= 100.0 {
            self.percent = 100.0;
            self.active = false;
            if temporary {
                self.text = self.persistent_text.clone();
            }
        }
    }

    /// Stop at 100 % with an error text; later stream updates are ignored.
    pub fn halt(&mut self, message: &str) {
        self.update(100.0, false, Some(&format!("Error: {}", message)));
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Clear everything, including the halted flag, for a new query.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
