//! Export of the accumulated results sequence to JSON or CSV.

use crate::error::Result;
use crate::event::Event;
use crate::fsio::FileAccess;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Infer the format from a target path. Anything that is not `.json`
    /// exports as CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Csv,
        }
    }
}

#[derive(Serialize)]
struct ExportedMatch<'a> {
    #[serde(flatten)]
    record: &'a Event,
    original_index: usize,
}

/// Serialize all `match` events, with their original indices, as pretty JSON.
pub fn to_json(events: &[Event]) -> Result<String> {
    let matches: Vec<ExportedMatch> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_match())
        .map(|(original_index, record)| ExportedMatch {
            record,
            original_index,
        })
        .collect();
    serde_json::to_string_pretty(&matches)
        .map_err(|e| crate::error::RgviewError::Other(e.to_string()))
}

/// Serialize all `match` events as `File,Line,Content` CSV. Content is
/// trimmed and embedded quotes are doubled.
pub fn to_csv(events: &[Event]) -> String {
    let mut out = String::from("File,Line,Content\n");
    for event in events.iter().filter(|e| e.is_match()) {
        let file = event.path().unwrap_or("");
        let line = event
            .line_number()
            .map(|n| n.to_string())
            .unwrap_or_default();
        let content = event.line_text().unwrap_or("").trim().replace('"', "\"\"");
        out.push_str(&format!("\"{file}\",{line},\"{content}\"\n"));
    }
    out
}

/// Export the results to `path`, format inferred from its extension.
pub fn export_to_file(access: &dyn FileAccess, path: &Path, events: &[Event]) -> Result<()> {
    let content = match ExportFormat::from_path(path) {
        ExportFormat::Json => to_json(events)?,
        ExportFormat::Csv => to_csv(events),
    };
    access.write(path, &content)
}
