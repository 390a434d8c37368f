use std::fs;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use sparlo_core::{ReportRecord, ReportStatus};
use sparlo_engine::{
    build_export_document, ensure_export_dir, export_stem, ExportBatch, PersistError,
    ReportExporter,
};
use tempfile::TempDir;

fn record(report_data: Option<serde_json::Value>) -> ReportRecord {
    ReportRecord {
        id: "rep-42".into(),
        title: "Passive cooling: \"v2\"".into(),
        status: ReportStatus::Complete,
        current_step: None,
        phase_progress: None,
        report_data,
        clarifications: Vec::new(),
        last_message: None,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    }
}

#[test]
fn document_has_quoted_frontmatter_and_markdown_body() {
    let doc = build_export_document(
        &record(Some(json!({ "markdown": "## Findings\n\nUse fins." }))),
        "2026-03-02T00:00:00+00:00",
    );
    let expected_head = "---\n\
id: \"rep-42\"\n\
title: \"Passive cooling: \\\"v2\\\"\"\n\
status: complete\n\
created_at: 2026-03-01T12:00:00+00:00\n\
exported_utc: 2026-03-02T00:00:00+00:00\n\
structured: false\n\
---\n\n";
    assert!(doc.starts_with(expected_head), "{doc}");
    assert!(doc.contains("## Findings"));
    assert!(doc.ends_with('\n'));
}

#[test]
fn document_without_content_says_so() {
    let doc = build_export_document(&record(None), "now");
    assert!(doc.contains("_This report has no content yet._"));
}

#[test]
fn exporter_writes_markdown_and_raw_json() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("exports");
    let exporter = ReportExporter::new(dir.clone(), Arc::new(|| "fixed".to_string()));
    let report = record(Some(json!({ "markdown": "body" })));

    let summary = exporter.export(&report).unwrap();
    let stem = export_stem(&report.title, &report.id);
    assert_eq!(summary.markdown_path, dir.join(format!("{stem}.md")));
    assert_eq!(summary.json_path, dir.join(format!("{stem}.json")));

    let raw: ReportRecord =
        serde_json::from_str(&fs::read_to_string(&summary.json_path).unwrap()).unwrap();
    assert_eq!(raw, report);
    let markdown = fs::read_to_string(&summary.markdown_path).unwrap();
    assert!(markdown.contains("exported_utc: fixed"));
}

#[test]
fn creates_missing_export_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out");
    assert!(!new_dir.exists());
    ensure_export_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn batch_replaces_existing_files() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();

    let mut first = ExportBatch::begin(dir.clone()).unwrap();
    first.stage("report.md", "first").unwrap();
    let written = first.commit().unwrap();

    let mut second = ExportBatch::begin(dir.clone()).unwrap();
    second.stage("report.md", "second").unwrap();
    assert_eq!(second.commit().unwrap(), written);
    assert_eq!(fs::read_to_string(dir.join("report.md")).unwrap(), "second");
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
}

#[test]
fn uncommitted_batch_leaves_directory_untouched() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    fs::write(dir.join("report.md"), "old").unwrap();

    let mut batch = ExportBatch::begin(dir.clone()).unwrap();
    batch.stage("report.md", "new").unwrap();
    drop(batch);

    assert_eq!(fs::read_to_string(dir.join("report.md")).unwrap(), "old");
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
}

#[test]
fn failed_reexport_keeps_the_previous_pair() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("exports");
    let exporter = ReportExporter::new(dir.clone(), Arc::new(|| "first".to_string()));
    let report = record(Some(json!({ "markdown": "body" })));
    let summary = exporter.export(&report).unwrap();
    let old_markdown = fs::read_to_string(&summary.markdown_path).unwrap();

    // Something now occupies the json name, so the second export cannot finish.
    fs::remove_file(&summary.json_path).unwrap();
    fs::create_dir(&summary.json_path).unwrap();

    let exporter = ReportExporter::new(dir.clone(), Arc::new(|| "second".to_string()));
    let err = exporter.export(&report).unwrap_err();
    assert!(err.to_string().contains("is a directory"), "{err}");

    assert_eq!(fs::read_to_string(&summary.markdown_path).unwrap(), old_markdown);
    assert!(old_markdown.contains("exported_utc: first"));
    assert!(summary.json_path.is_dir());
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 2);
}

#[test]
fn export_dir_that_is_a_file_fails_without_partial_output() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let err = ExportBatch::begin(file_path.clone()).err().unwrap();
    assert!(matches!(err, PersistError::ExportDir { .. }), "{err}");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}
