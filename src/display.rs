//! Render-ready result sequence: grouping, filtering and derived stats.
//!
//! Two groupers exist on purpose. [`StreamGrouper`] runs incrementally on the
//! offscreen worker while results stream in; [`regroup`] re-scans the full
//! accumulation and is used for ad-hoc client-side filters, where per-file
//! counts are known up front.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A row in the render-ready sequence: a per-file header or a match.
///
/// Match rows reference their event through `original_index`, the position of
/// the decoded record in the flat accumulated results sequence. Headers carry
/// `match_count: None` while the file's matches are still streaming in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DisplayItem {
    Header {
        file: String,
        match_count: Option<usize>,
    },
    Match {
        original_index: usize,
    },
}

impl DisplayItem {
    pub fn is_header(&self) -> bool {
        matches!(self, DisplayItem::Header { .. })
    }
}

/// Incremental grouper fed one decoded event at a time, in stream order.
///
/// Every accepted event advances the running index, so the indices handed to
/// match rows stay in lockstep with the controller's append-only results
/// sequence. `last_file` persists across batches; a header is emitted exactly
/// when the file changes, never re-scanned per batch.
#[derive(Debug, Default)]
pub struct StreamGrouper {
    next_index: usize,
    last_file: Option<String>,
}

impl StreamGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all grouping state. A new search must start from a clean slate.
    pub fn reset(&mut self) {
        self.next_index = 0;
        self.last_file = None;
    }

    /// Accept the next event in the stream, appending any display items it
    /// produces. Returns the original index assigned to this event.
    pub fn accept(&mut self, event: &Event, out: &mut Vec<DisplayItem>) -> usize {
        let index = self.next_index;
        self.next_index += 1;

        if event.is_match() {
            let file = event.path().unwrap_or("");
            if self.last_file.as_deref() != Some(file) {
                out.push(DisplayItem::Header {
                    file: file.to_string(),
                    match_count: None,
                });
                self.last_file = Some(file.to_string());
            }
            out.push(DisplayItem::Match {
                original_index: index,
            });
        }

        index
    }

    pub fn events_seen(&self) -> usize {
        self.next_index
    }
}

/// Client-side filter applied over already-received results.
#[derive(Debug, Clone, Default)]
pub struct ResultsFilter {
    /// Case-insensitive substring matched against line text or path.
    pub text: String,
    /// Lowercase extensions to keep; empty keeps everything.
    pub extensions: Vec<String>,
}

impl ResultsFilter {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.extensions.is_empty()
    }

    fn accepts(&self, event: &Event) -> bool {
        let path = event.path().unwrap_or("");

        if !self.extensions.is_empty() && !self.extensions.contains(&extension_of(path)) {
            return false;
        }

        if !self.text.is_empty() {
            let needle = self.text.to_lowercase();
            let line = event.line_text().unwrap_or("");
            return line.to_lowercase().contains(&needle)
                || path.to_lowercase().contains(&needle);
        }

        true
    }
}

/// Lowercase extension of a path, or `"no-ext"` when there is none.
pub fn extension_of(path: &str) -> String {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => "no-ext".to_string(),
    }
}

/// Re-group the full accumulation under a filter.
///
/// Produces the same header/match sequence shape as the streaming grouper,
/// in first-seen file order, except per-file counts are known. Cost is one
/// pass over the result set per call, which is bounded by the match cap.
pub fn regroup(events: &[Event], filter: &ResultsFilter) -> Vec<DisplayItem> {
    let mut order: Vec<(String, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (index, event) in events.iter().enumerate() {
        if !event.is_match() || !filter.accepts(event) {
            continue;
        }
        let file = event.path().unwrap_or("").to_string();
        match positions.get(&file) {
            Some(&slot) => order[slot].1.push(index),
            None => {
                positions.insert(file.clone(), order.len());
                order.push((file, vec![index]));
            }
        }
    }

    let mut items = Vec::new();
    for (file, indices) in order {
        items.push(DisplayItem::Header {
            file,
            match_count: Some(indices.len()),
        });
        for original_index in indices {
            items.push(DisplayItem::Match { original_index });
        }
    }
    items
}

/// Number of `match` events in the accumulation.
pub fn match_count(events: &[Event]) -> usize {
    events.iter().filter(|e| e.is_match()).count()
}

/// Number of distinct files with at least one match.
pub fn distinct_files(events: &[Event]) -> usize {
    let mut seen: HashMap<&str, ()> = HashMap::new();
    for event in events {
        if event.is_match() {
            seen.insert(event.path().unwrap_or(""), ());
        }
    }
    seen.len()
}

/// The `n` most frequent match extensions, most frequent first. Ties keep
/// first-seen order. Feeds the shell's quick-filter chips.
pub fn top_extensions(events: &[Event], n: usize) -> Vec<String> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for event in events {
        if !event.is_match() {
            continue;
        }
        let ext = extension_of(event.path().unwrap_or(""));
        match positions.get(&ext) {
            Some(&slot) => order[slot].1 += 1,
            None => {
                positions.insert(ext.clone(), order.len());
                order.push((ext, 1));
            }
        }
    }

    order.sort_by(|a, b| b.1.cmp(&a.1));
    order.truncate(n);
    order.into_iter().map(|(ext, _)| ext).collect()
}
