//! Virtual report viewport for the terminal shell.
//!
//! The rendered markdown is laid out one line per `LINE_HEIGHT` pixels so the
//! TOC tracker sees the same kind of geometry a scrolling document would give it.

use sparlo_core::{ReportId, SectionTop, TocSection};

pub const LINE_HEIGHT: f64 = 24.0;
pub const VIEWPORT_LINES: usize = 30;

#[derive(Debug, Default)]
pub struct ReportViewport {
    report_id: Option<ReportId>,
    lines: Vec<String>,
    /// Section id and the line its heading sits on, in document order.
    anchors: Vec<(String, usize)>,
    scroll_top: f64,
    listening: bool,
}

impl ReportViewport {
    pub fn report_id(&self) -> Option<&str> {
        self.report_id.as_deref()
    }

    pub fn is_mounted(&self) -> bool {
        self.report_id.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn set_listening(&mut self, listening: bool) {
        self.listening = listening;
    }

    /// Lays out a report. Returns false when nothing changed.
    pub fn load(&mut self, report_id: &str, markdown: &str, sections: &[TocSection]) -> bool {
        let lines: Vec<String> = markdown.lines().map(str::to_string).collect();
        if self.report_id.as_deref() == Some(report_id) && self.lines == lines {
            return false;
        }
        if self.report_id.as_deref() != Some(report_id) {
            self.scroll_top = 0.0;
        }
        self.anchors = anchor_lines(&lines, sections);
        self.lines = lines;
        self.report_id = Some(report_id.to_string());
        self.scroll_top = self.scroll_top.min(self.max_scroll());
        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn scroll_by_lines(&mut self, lines: i64) {
        self.scroll_to(self.scroll_top + lines as f64 * LINE_HEIGHT);
    }

    pub fn scroll_to(&mut self, top: f64) {
        self.scroll_top = top.clamp(0.0, self.max_scroll());
    }

    /// Absolute top of a section's heading within the document.
    pub fn document_top(&self, section_id: &str) -> Option<f64> {
        self.anchors
            .iter()
            .find(|(id, _)| id == section_id)
            .map(|(_, line)| *line as f64 * LINE_HEIGHT)
    }

    /// Section tops relative to the current viewport top.
    pub fn section_tops(&self) -> Vec<SectionTop> {
        self.anchors
            .iter()
            .map(|(id, line)| SectionTop::new(id.clone(), *line as f64 * LINE_HEIGHT - self.scroll_top))
            .collect()
    }

    pub fn visible_lines(&self) -> &[String] {
        let first = (self.scroll_top / LINE_HEIGHT).floor() as usize;
        let first = first.min(self.lines.len());
        let last = (first + VIEWPORT_LINES).min(self.lines.len());
        &self.lines[first..last]
    }

    fn max_scroll(&self) -> f64 {
        self.lines.len().saturating_sub(VIEWPORT_LINES) as f64 * LINE_HEIGHT
    }
}

/// Matches each section, in order, to the next heading line carrying its title.
fn anchor_lines(lines: &[String], sections: &[TocSection]) -> Vec<(String, usize)> {
    let mut flat = Vec::new();
    flatten(sections, &mut flat);

    let mut anchors = Vec::new();
    let mut cursor = 0;
    for section in flat {
        let found = lines[cursor..].iter().position(|line| {
            let trimmed = line.trim_start();
            trimmed.starts_with('#') && trimmed.trim_start_matches('#').trim() == section.title
        });
        if let Some(offset) = found {
            cursor += offset;
            anchors.push((section.id.clone(), cursor));
            cursor += 1;
        }
    }
    anchors
}

fn flatten<'a>(sections: &'a [TocSection], out: &mut Vec<&'a TocSection>) {
    for section in sections {
        out.push(section);
        flatten(&section.subsections, out);
    }
}
