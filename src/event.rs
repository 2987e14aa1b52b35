//! Decoding of the search tool's line-delimited JSON output.
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One decoded record from the search tool's `--json` output stream.
///
/// The stream interleaves per-file `begin`/`end` markers, `match` and
/// `context` lines, and a trailing `summary` with aggregate stats. Unknown
/// or malformed records never reach this type; [`decode_line`] drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Event {
    Begin(BeginData),
    Match(MatchData),
    Context(MatchData),
    End(EndData),
    Summary(SummaryData),
}

/// A `{"text": ...}` payload. The tool encodes non-UTF-8 data as a `bytes`
/// field instead, in which case `text` is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeginData {
    #[serde(default)]
    pub path: Option<TextPayload>,
}

/// Payload shared by `match` and `context` records. `line_number` is absent
/// when the tool was not tracking lines; `submatches` is empty on context
/// lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchData {
    #[serde(default)]
    pub path: Option<TextPayload>,
    #[serde(default)]
    pub lines: Option<TextPayload>,
    #[serde(default)]
    pub line_number: Option<u64>,
    #[serde(default)]
    pub absolute_offset: Option<u64>,
    #[serde(default)]
    pub submatches: Vec<SubMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubMatch {
    #[serde(rename = "match", default)]
    pub matched: TextPayload,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndData {
    #[serde(default)]
    pub path: Option<TextPayload>,
    #[serde(default)]
    pub stats: Option<Stats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryData {
    #[serde(default)]
    pub elapsed_total: Option<Elapsed>,
    #[serde(default)]
    pub stats: Option<Stats>,
}

/// Elapsed time as reported by the tool. Older front-end builds spelled the
/// field `seconds`, current tool output spells it `secs`; both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Elapsed {
    #[serde(default)]
    pub human: Option<String>,
    #[serde(default, alias = "seconds")]
    pub secs: u64,
    #[serde(default)]
    pub nanos: u64,
}

impl Elapsed {
    pub fn as_duration(&self) -> Duration {
        Duration::new(self.secs, (self.nanos % 1_000_000_000) as u32)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub elapsed: Option<Elapsed>,
    #[serde(default)]
    pub searches: u64,
    #[serde(default)]
    pub searches_with_match: u64,
    #[serde(default)]
    pub bytes_searched: u64,
    #[serde(default)]
    pub bytes_printed: u64,
    #[serde(default)]
    pub matched_lines: u64,
    #[serde(default)]
    pub matches: u64,
}

impl Event {
    pub fn is_match(&self) -> bool {
        matches!(self, Event::Match(_))
    }

    /// File path carried by this record, if any.
    pub fn path(&self) -> Option<&str> {
        let payload = match self {
            Event::Begin(d) => d.path.as_ref(),
            Event::Match(d) | Event::Context(d) => d.path.as_ref(),
            Event::End(d) => d.path.as_ref(),
            Event::Summary(_) => None,
        };
        payload.and_then(|p| p.text.as_deref())
    }

    pub fn line_number(&self) -> Option<u64> {
        match self {
            Event::Match(d) | Event::Context(d) => d.line_number,
            _ => None,
        }
    }

    pub fn line_text(&self) -> Option<&str> {
        match self {
            Event::Match(d) | Event::Context(d) => {
                d.lines.as_ref().and_then(|l| l.text.as_deref())
            }
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<&SummaryData> {
        match self {
            Event::Summary(d) => Some(d),
            _ => None,
        }
    }
}

/// The discriminant of a record, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Begin,
    Match,
    Context,
    End,
    Summary,
}

#[derive(Deserialize)]
struct KindProbe {
    #[serde(rename = "type")]
    kind: EventKind,
}

/// Decode one raw output line into an [`Event`].
///
/// Returns `None` for blank lines and for anything that does not parse as a
/// known record. Partial lines are an expected tail condition of process
/// teardown, so failures are dropped rather than surfaced.
pub fn decode_line(line: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("dropping undecodable record: {e}");
            None
        }
    }
}

/// Probe a raw line for its record kind without decoding the payload.
pub fn probe_kind(line: &str) -> Option<EventKind> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str::<KindProbe>(line).ok().map(|p| p.kind)
}

/// Whether a raw line is a `match` record. Used by the ingestion pipeline
/// for cap accounting; the cap counts terminal match events only.
pub fn is_match_record(line: &str) -> bool {
    probe_kind(line) == Some(EventKind::Match)
}
