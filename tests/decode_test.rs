use rgview::event::{decode_line, is_match_record, probe_kind, Event, EventKind};
use std::time::Duration;

const MATCH_LINE: &str = r#"{"type":"match","data":{"path":{"text":"src/main.rs"},"lines":{"text":"fn main() {\n"},"line_number":3,"absolute_offset":20,"submatches":[{"match":{"text":"main"},"start":3,"end":7}]}}"#;

const CONTEXT_LINE: &str = r#"{"type":"context","data":{"path":{"text":"src/main.rs"},"lines":{"text":"use std::fs;\n"},"line_number":2,"absolute_offset":8,"submatches":[]}}"#;

const BEGIN_LINE: &str = r#"{"type":"begin","data":{"path":{"text":"src/main.rs"}}}"#;

const END_LINE: &str = r#"{"type":"end","data":{"path":{"text":"src/main.rs"},"binary_offset":null,"stats":{"elapsed":{"secs":0,"nanos":36296,"human":"0.0000s"},"searches":1,"searches_with_match":1,"bytes_searched":367,"bytes_printed":1151,"matched_lines":3,"matches":3}}}"#;

const SUMMARY_LINE: &str = r#"{"type":"summary","data":{"elapsed_total":{"human":"0.099726s","nanos":99726344,"secs":0},"stats":{"bytes_printed":4106,"bytes_searched":5860,"elapsed":{"human":"0.000047s","nanos":46800,"secs":0},"matched_lines":3,"matches":3,"searches":1,"searches_with_match":1}}}"#;

#[test]
fn decodes_match_record() {
    let event = decode_line(MATCH_LINE).expect("match line should decode");
    assert!(event.is_match());
    assert_eq!(event.path(), Some("src/main.rs"));
    assert_eq!(event.line_number(), Some(3));
    assert_eq!(event.line_text(), Some("fn main() {\n"));

    let Event::Match(data) = &event else {
        panic!("expected match variant");
    };
    assert_eq!(data.submatches.len(), 1);
    assert_eq!(data.submatches[0].start, 3);
    assert_eq!(data.submatches[0].end, 7);
    assert_eq!(data.submatches[0].matched.text.as_deref(), Some("main"));
}

#[test]
fn decodes_every_record_kind() {
    assert!(matches!(decode_line(BEGIN_LINE), Some(Event::Begin(_))));
    assert!(matches!(decode_line(CONTEXT_LINE), Some(Event::Context(_))));
    assert!(matches!(decode_line(END_LINE), Some(Event::End(_))));
    assert!(matches!(decode_line(SUMMARY_LINE), Some(Event::Summary(_))));
}

#[test]
fn summary_elapsed_converts_to_duration() {
    let event = decode_line(SUMMARY_LINE).unwrap();
    let summary = event.summary().unwrap();
    let elapsed = summary.elapsed_total.as_ref().unwrap();
    assert_eq!(elapsed.as_duration(), Duration::new(0, 99_726_344));
    assert_eq!(summary.stats.as_ref().unwrap().matches, 3);
}

#[test]
fn elapsed_accepts_legacy_seconds_spelling() {
    let line = r#"{"type":"summary","data":{"elapsed_total":{"human":"2s","seconds":2,"nanos":5},"stats":{}}}"#;
    let event = decode_line(line).unwrap();
    let elapsed = event.summary().unwrap().elapsed_total.as_ref().unwrap();
    assert_eq!(elapsed.as_duration(), Duration::new(2, 5));
}

#[test]
fn tolerates_missing_optional_fields() {
    // No line_number, no submatches: still a usable match.
    let line = r#"{"type":"match","data":{"path":{"text":"a.bin"},"lines":{"text":"x"}}}"#;
    let event = decode_line(line).unwrap();
    assert!(event.is_match());
    assert_eq!(event.line_number(), None);

    // Non-UTF-8 payloads come through as a bytes field; text is then absent.
    let line = r#"{"type":"match","data":{"path":{"bytes":"c3JjL21haW4ucnM="},"lines":{"text":"x"},"line_number":1}}"#;
    let event = decode_line(line).unwrap();
    assert_eq!(event.path(), None);
}

#[test]
fn drops_blank_and_malformed_lines() {
    assert_eq!(decode_line(""), None);
    assert_eq!(decode_line("   \t"), None);
    assert_eq!(decode_line("not json"), None);
    assert_eq!(decode_line(r#"{"type":"match","data":"#), None);
    // Unknown record kinds are noise, not events.
    assert_eq!(decode_line(r#"{"type":"mystery","data":{}}"#), None);
}

#[test]
fn kind_probe_discriminates_without_full_decode() {
    assert_eq!(probe_kind(MATCH_LINE), Some(EventKind::Match));
    assert_eq!(probe_kind(CONTEXT_LINE), Some(EventKind::Context));
    assert_eq!(probe_kind(SUMMARY_LINE), Some(EventKind::Summary));
    assert_eq!(probe_kind("garbage"), None);

    assert!(is_match_record(MATCH_LINE));
    assert!(!is_match_record(CONTEXT_LINE));
    assert!(!is_match_record(BEGIN_LINE));
    assert!(!is_match_record(""));
}
