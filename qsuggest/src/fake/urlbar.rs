use std::collections::BTreeSet;

use crate::browser::ResultRow;

/// What an engagement with the address bar left behind once it ended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngagementEnd {
    /// Providers whose row was visible at any point of the engagement.
    pub shown: BTreeSet<String>,
    /// Providers whose row was visible when the engagement ended.
    pub at_end: BTreeSet<String>,
    pub picked: Option<ResultRow>,
}

impl EngagementEnd {
    pub fn is_empty(&self) -> bool {
        self.shown.is_empty() && self.at_end.is_empty() && self.picked.is_none()
    }
}

/// Address bar of one window.
///
/// An engagement starts with the first typed character and ends with a pick, `Escape` or a blur.
/// Result rows are computed by the owner and handed in through [`Urlbar::show`].
#[derive(Debug, Default)]
pub struct Urlbar {
    focused: bool,
    text: String,
    rows: Vec<ResultRow>,
    selected: usize,
    engagement: Option<BTreeSet<String>>,
}

impl Urlbar {
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn selected(&self) -> Option<&ResultRow> {
        self.rows.get(self.selected)
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    /// Appends typed text and returns the full contents.
    pub fn type_text(&mut self, text: &str) -> &str {
        self.engagement.get_or_insert_with(BTreeSet::new);
        self.text.push_str(text);
        &self.text
    }

    /// Replaces the popup contents. The first row is selected.
    pub fn show(&mut self, rows: Vec<ResultRow>) {
        if let Some(shown) = self.engagement.as_mut() {
            shown.extend(rows.iter().filter_map(|row| row.provider().map(str::to_owned)));
        }
        self.rows = rows;
        self.selected = 0;
    }

    pub fn select_next(&mut self) {
        if !self.rows.is_empty() {
            self.selected = (self.selected + 1) % self.rows.len();
        }
    }

    pub fn select_previous(&mut self) {
        if !self.rows.is_empty() {
            self.selected = (self.selected + self.rows.len() - 1) % self.rows.len();
        }
    }

    /// Picks the selected row. Nothing happens while the popup is empty.
    pub fn pick(&mut self) -> Option<EngagementEnd> {
        let picked = self.selected()?.clone();
        let mut end = self.end_engagement();
        end.picked = Some(picked);
        self.focused = false;
        Some(end)
    }

    /// Closes the popup without picking anything.
    pub fn abandon(&mut self) -> Option<EngagementEnd> {
        self.engagement.as_ref()?;
        Some(self.end_engagement())
    }

    pub fn blur(&mut self) -> Option<EngagementEnd> {
        self.focused = false;
        self.abandon()
    }

    fn end_engagement(&mut self) -> EngagementEnd {
        let at_end = self
            .rows
            .iter()
            .filter_map(|row| row.provider().map(str::to_owned))
            .collect();
        let shown = self.engagement.take().unwrap_or_default();
        self.text.clear();
        self.rows.clear();
        self.selected = 0;
        EngagementEnd {
            shown,
            at_end,
            picked: None,
        }
    }
}
