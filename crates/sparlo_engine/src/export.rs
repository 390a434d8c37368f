use std::path::PathBuf;
use std::sync::Arc;

use sparlo_core::{render_content, ReportRecord};
use sparlo_logging::sparlo_info;

use crate::filename::export_stem;
use crate::persist::{ExportBatch, PersistError};

/// Produces the `exported_utc` frontmatter value.
pub type ExportClock = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub markdown_path: PathBuf,
    pub json_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("could not serialize report {report_id}: {message}")]
    Serialize { report_id: String, message: String },
}

/// Writes a report as a markdown document plus the raw record next to it.
#[derive(Clone)]
pub struct ReportExporter {
    dir: PathBuf,
    clock: ExportClock,
}

impl ReportExporter {
    pub fn new(dir: PathBuf, clock: ExportClock) -> Self {
        Self { dir, clock }
    }

    pub fn export(&self, record: &ReportRecord) -> Result<ExportSummary, ExportError> {
        let stem = export_stem(&record.title, &record.id);
        let document = build_export_document(record, &(self.clock)());
        let raw = serde_json::to_string_pretty(record).map_err(|err| ExportError::Serialize {
            report_id: record.id.clone(),
            message: err.to_string(),
        })?;

        // The markdown and json files are replaced as a pair or not at all.
        let mut batch = ExportBatch::begin(self.dir.clone())?;
        let markdown_path = batch.stage(&format!("{stem}.md"), &document)?;
        let json_path = batch.stage(&format!("{stem}.json"), &raw)?;
        batch.commit()?;
        sparlo_info!("Exported report {} to {}", record.id, markdown_path.display());
        Ok(ExportSummary {
            markdown_path,
            json_path,
        })
    }
}

/// Frontmatter followed by the rendered report body.
///
/// String values are written as JSON strings, which YAML reads as
/// double-quoted scalars.
pub fn build_export_document(record: &ReportRecord, exported_utc: &str) -> String {
    let content = record.content();
    let body = content
        .as_ref()
        .map(render_content)
        .unwrap_or_else(|| "_This report has no content yet._\n".to_string());
    let structured = content.as_ref().is_some_and(|c| c.is_structured());

    let mut doc = String::from("---\n");
    push_field(&mut doc, "id", &quote(&record.id));
    push_field(&mut doc, "title", &quote(&record.title));
    push_field(&mut doc, "status", record.status.as_str());
    if let Some(step) = record.current_step.as_deref() {
        push_field(&mut doc, "current_step", &quote(step));
    }
    push_field(&mut doc, "created_at", &record.created_at.to_rfc3339());
    push_field(&mut doc, "exported_utc", exported_utc);
    push_field(&mut doc, "structured", if structured { "true" } else { "false" });
    doc.push_str("---\n\n");
    doc.push_str(&body);
    if !doc.ends_with('\n') {
        doc.push('\n');
    }
    doc
}

fn push_field(doc: &mut String, key: &str, value: &str) {
    doc.push_str(key);
    doc.push_str(": ");
    doc.push_str(value);
    doc.push('\n');
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
