//! Document fragments picked as context for the next chat message.
//!
//! Selection order is preserved and each fragment appears at most once.

use serde::{Deserialize, Serialize};

/// A document fragment picked as chat context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    /// Id of the fragment element in the rendered document.
    pub fragment_id: String,
    /// Markup of the fragment at the time it was picked.
    pub snapshot_html: String,
}

impl SelectionEntry {
    pub fn new(fragment_id: impl Into<String>, snapshot_html: impl Into<String>) -> Self {
        Self {
            fragment_id: fragment_id.into(),
            snapshot_html: snapshot_html.into(),
        }
    }
}

/// Ordered multi-selection of document fragments.
///
/// `SelectionSet` is responsible for:
/// - Toggling fragments in and out on click
/// - Adding fragments idempotently on drag-and-drop
/// - Removing a single fragment (pill close button)
/// - Handing the whole selection to an outgoing chat message
///
/// # Selection Model
///
/// - **Order**: Entries keep the order they were picked in
/// - **Uniqueness**: A fragment id appears at most once
///
/// # Examples
///
/// ```
/// use docanvas_canvas::selection::{SelectionEntry, SelectionSet};
///
/// let mut selection = SelectionSet::new();
/// selection.toggle(SelectionEntry::new("p-1", "<p>One</p>"));
/// selection.add(SelectionEntry::new("p-2", "<p>Two</p>"));
/// assert_eq!(selection.compose_message("why?"), "@p-1 @p-2 why?");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    entries: Vec<SelectionEntry>,
}

impl SelectionSet {
    /// Creates an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[SelectionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, fragment_id: &str) -> bool {
        self.entries.iter().any(|e| e.fragment_id == fragment_id)
    }

    /// Selected fragment ids in selection order.
    pub fn fragment_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.fragment_id.clone()).collect()
    }

    /// Toggles a fragment.
    ///
    /// # Returns
    ///
    /// `true` if the fragment is selected afterwards.
    pub fn toggle(&mut self, entry: SelectionEntry) -> bool {
        if self.remove(&entry.fragment_id) {
            false
        } else {
            self.entries.push(entry);
            true
        }
    }

    /// Adds a fragment unless it is already selected.
    ///
    /// # Returns
    ///
    /// `true` if the fragment was newly added.
    pub fn add(&mut self, entry: SelectionEntry) -> bool {
        if self.contains(&entry.fragment_id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Removes one fragment. Returns `true` if it was selected.
    pub fn remove(&mut self, fragment_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.fragment_id != fragment_id);
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns all entries and clears the selection.
    pub fn take(&mut self) -> Vec<SelectionEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Pill labels, one `@fragment-id` per entry.
    pub fn pills(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("@{}", e.fragment_id))
            .collect()
    }

    /// Prefixes `text` with the pill labels.
    ///
    /// With an empty selection the trimmed text is returned unchanged; with
    /// empty text only the labels are returned.
    pub fn compose_message(&self, text: &str) -> String {
        let text = text.trim();
        let mut parts = self.pills();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
        parts.join(" ")
    }
}
