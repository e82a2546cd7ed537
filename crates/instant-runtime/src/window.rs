use crate::protocol::{ResultRow, RESULTS_PER_PAGE};

/// Bounded, ranking-ordered set of displayed rows.
///
/// Rows are kept sorted non-increasing by `ranking`; ties keep insertion
/// order. After every insert the window holds at most `capacity` rows, the
/// lowest-ranked ones being dropped from the tail.
#[derive(Debug, Clone)]
pub struct ResultWindow {
    rows: Vec<ResultRow>,
    capacity: usize,
}

impl Default for ResultWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultWindow {
    pub fn new() -> Self {
        Self::with_capacity(RESULTS_PER_PAGE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Build a window from a batch of rows, as a page render does.
    pub fn from_rows(rows: impl IntoIterator<Item = ResultRow>) -> Self {
        let mut window = Self::new();
        window.extend(rows);
        window
    }

    pub fn insert(&mut self, row: ResultRow) {
        self.rows.push(row);
        // sort_by is stable, so equal rankings stay in arrival order
        self.rows.sort_by(|a, b| b.ranking.total_cmp(&a.ranking));
        self.rows.truncate(self.capacity);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = ResultRow>) {
        for row in rows {
            self.insert(row);
        }
    }

    /// Replace the contents wholesale.
    pub fn replace(&mut self, rows: impl IntoIterator<Item = ResultRow>) {
        self.reset();
        self.extend(rows);
    }

    pub fn reset(&mut self) {
        self.rows.clear();
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }
}
