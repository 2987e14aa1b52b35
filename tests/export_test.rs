use rgview::event::decode_line;
use rgview::export::{export_to_file, to_csv, to_json, ExportFormat};
use rgview::fsio::{FileAccess, LocalFiles};
use rgview::Event;
use std::path::Path;
use tempfile::TempDir;

fn sample_events() -> Vec<Event> {
    [
        r#"{"type":"begin","data":{"path":{"text":"a.rs"}}}"#,
        r#"{"type":"match","data":{"path":{"text":"a.rs"},"lines":{"text":"  say \"hi\"  \n"},"line_number":4,"absolute_offset":0,"submatches":[]}}"#,
        r#"{"type":"match","data":{"path":{"text":"b.rs"},"lines":{"text":"plain\n"},"line_number":9,"absolute_offset":0,"submatches":[]}}"#,
        r#"{"type":"end","data":{"path":{"text":"a.rs"}}}"#,
    ]
    .iter()
    .map(|l| decode_line(l).unwrap())
    .collect()
}

#[test]
fn csv_has_header_trimmed_content_and_doubled_quotes() {
    let csv = to_csv(&sample_events());
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "File,Line,Content");
    assert_eq!(lines[1], r#""a.rs",4,"say ""hi""""#);
    assert_eq!(lines[2], r#""b.rs",9,"plain""#);
    // begin/end records never export.
    assert_eq!(lines.len(), 3);
}

#[test]
fn json_keeps_records_with_their_original_indices() {
    let json = to_json(&sample_events()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let rows = parsed.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    // Indices refer to positions in the flat sequence, not the match list.
    assert_eq!(rows[0]["original_index"], 1);
    assert_eq!(rows[1]["original_index"], 2);
    assert_eq!(rows[0]["type"], "match");
    assert_eq!(rows[0]["data"]["path"]["text"], "a.rs");
}

#[test]
fn format_follows_target_extension() {
    assert_eq!(ExportFormat::from_path(Path::new("out.json")), ExportFormat::Json);
    assert_eq!(ExportFormat::from_path(Path::new("out.JSON")), ExportFormat::Json);
    assert_eq!(ExportFormat::from_path(Path::new("out.csv")), ExportFormat::Csv);
    assert_eq!(ExportFormat::from_path(Path::new("out")), ExportFormat::Csv);
}

#[test]
fn export_writes_through_file_access() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("results.json");
    export_to_file(&LocalFiles, &target, &sample_events()).unwrap();
    let written = std::fs::read_to_string(&target).unwrap();
    assert!(written.contains("original_index"));
}

#[test]
fn read_range_is_one_based_and_inclusive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("file.txt");
    std::fs::write(&path, "one\ntwo\nthree\nfour\nfive\n").unwrap();

    let files = LocalFiles;
    assert_eq!(files.read_range(&path, 2, 4).unwrap(), "two\nthree\nfour");
    // Clamped edges.
    assert_eq!(files.read_range(&path, 0, 1).unwrap(), "one");
    assert_eq!(files.read_range(&path, 4, 100).unwrap(), "four\nfive");
    assert_eq!(files.read_range(&path, 3, 2).unwrap(), "");
    assert_eq!(files.read_full(&path).unwrap(), "one\ntwo\nthree\nfour\nfive\n");
}
