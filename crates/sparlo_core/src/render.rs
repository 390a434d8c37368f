use std::collections::HashMap;
use std::fmt::Write;

use crate::schema::{ReportContent, StructuredReport};
use crate::toc::TocSection;

pub const SECTION_BRIEF: &str = "brief";
pub const SECTION_EXECUTIVE_SUMMARY: &str = "executive-summary";
pub const SECTION_CONSTRAINTS: &str = "constraints";
pub const SECTION_PROBLEM_ANALYSIS: &str = "problem-analysis";
pub const SECTION_SOLUTION_CONCEPTS: &str = "solution-concepts";
pub const SECTION_RISKS: &str = "risks";
pub const SECTION_NEXT_STEPS: &str = "next-steps";
pub const SECTION_APPENDIX: &str = "appendix";

/// Renders any report body to markdown.
pub fn render_content(content: &ReportContent) -> String {
    match content {
        ReportContent::Structured(report) => render_markdown(report),
        ReportContent::Markdown { text, .. } => text.clone(),
    }
}

/// Renders a validated report to a markdown document, one `##` per present section.
pub fn render_markdown(report: &StructuredReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", report.brief.title);

    let _ = writeln!(out, "## Brief\n\n{}\n", report.brief.problem_statement);

    let summary = &report.executive_summary;
    let _ = writeln!(
        out,
        "## Executive Summary\n\n**{}**\n\n[{}] [{}]\n\n{}\n",
        summary.headline,
        summary.confidence.label(),
        summary.viability.label(),
        summary.summary
    );

    if let Some(constraints) = &report.constraints {
        out.push_str("## Constraints\n\n");
        push_list(&mut out, "Hard constraints", &constraints.hard);
        push_list(&mut out, "Soft constraints", &constraints.soft);
        push_list(&mut out, "Assumptions", &constraints.assumptions);
    }

    if let Some(analysis) = &report.problem_analysis {
        let _ = writeln!(
            out,
            "## Problem Analysis\n\n**Core contradiction:** {}\n",
            analysis.core_contradiction
        );
        push_list(&mut out, "Root causes", &analysis.root_causes);
        push_list(&mut out, "Success metrics", &analysis.success_metrics);
    }

    if let Some(concepts) = &report.solution_concepts {
        out.push_str("## Solution Concepts\n\n");
        for concept in &concepts.concepts {
            let _ = writeln!(
                out,
                "### {}\n\n[{}] [{}]\n\n{}\n",
                concept.title,
                concept.track.label(),
                concept.confidence.label(),
                concept.mechanism
            );
            if let Some(domain) = &concept.source_domain {
                let _ = writeln!(out, "- Source domain: {domain}");
            }
            if let Some(test) = &concept.first_test {
                let _ = writeln!(out, "- First test: {test}");
            }
            if concept.source_domain.is_some() || concept.first_test.is_some() {
                out.push('\n');
            }
        }
    }

    if let Some(risks) = &report.risks {
        out.push_str("## Risks\n\n");
        for risk in &risks.items {
            let _ = write!(out, "- [{}] {}", risk.likelihood.label(), risk.description);
            if let Some(mitigation) = &risk.mitigation {
                let _ = write!(out, " (mitigation: {mitigation})");
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if let Some(steps) = &report.next_steps {
        out.push_str("## Next Steps\n\n");
        for (idx, step) in steps.steps.iter().enumerate() {
            let _ = write!(out, "{}. {}", idx + 1, step.action);
            if let Some(timeframe) = &step.timeframe {
                let _ = write!(out, " ({timeframe})");
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if let Some(appendix) = &report.appendix {
        out.push_str("## Appendix\n\n");
        push_list(&mut out, "References", &appendix.references);
        if let Some(notes) = &appendix.notes {
            let _ = writeln!(out, "{notes}\n");
        }
    }

    if let Some(meta) = &report.metadata {
        let mut parts = Vec::new();
        if let Some(model) = &meta.model {
            parts.push(format!("model {model}"));
        }
        if let Some(version) = &meta.version {
            parts.push(format!("version {version}"));
        }
        if let Some(at) = meta.generated_at {
            parts.push(format!("generated {}", at.to_rfc3339()));
        }
        if !parts.is_empty() {
            let _ = writeln!(out, "---\n\n_{}_", parts.join(", "));
        }
    }

    out
}

fn push_list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "**{label}**\n");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
    out.push('\n');
}

/// Derives the table of contents for a report body.
pub fn toc_sections(content: &ReportContent) -> Vec<TocSection> {
    match content {
        ReportContent::Structured(report) => structured_sections(report),
        ReportContent::Markdown { text, .. } => markdown_sections(text),
    }
}

fn structured_sections(report: &StructuredReport) -> Vec<TocSection> {
    let mut sections = vec![
        TocSection::new(SECTION_BRIEF, "Brief"),
        TocSection::new(SECTION_EXECUTIVE_SUMMARY, "Executive Summary"),
    ];
    if report.constraints.is_some() {
        sections.push(TocSection::new(SECTION_CONSTRAINTS, "Constraints"));
    }
    if report.problem_analysis.is_some() {
        sections.push(TocSection::new(SECTION_PROBLEM_ANALYSIS, "Problem Analysis"));
    }
    if let Some(concepts) = &report.solution_concepts {
        let mut section = TocSection::new(SECTION_SOLUTION_CONCEPTS, "Solution Concepts");
        section.subsections = concepts
            .concepts
            .iter()
            .enumerate()
            .map(|(idx, concept)| TocSection::new(format!("concept-{}", idx + 1), &concept.title))
            .collect();
        sections.push(section);
    }
    if report.risks.is_some() {
        sections.push(TocSection::new(SECTION_RISKS, "Risks"));
    }
    if report.next_steps.is_some() {
        sections.push(TocSection::new(SECTION_NEXT_STEPS, "Next Steps"));
    }
    if report.appendix.is_some() {
        sections.push(TocSection::new(SECTION_APPENDIX, "Appendix"));
    }
    sections
}

fn markdown_sections(text: &str) -> Vec<TocSection> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut sections: Vec<TocSection> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(title) = trimmed.strip_prefix("### ") {
            let id = unique_slug(title, &mut seen);
            match sections.last_mut() {
                Some(parent) => parent.subsections.push(TocSection::new(id, title.trim())),
                None => sections.push(TocSection::new(id, title.trim())),
            }
        } else if let Some(title) = trimmed.strip_prefix("## ") {
            let id = unique_slug(title, &mut seen);
            sections.push(TocSection::new(id, title.trim()));
        }
    }
    sections
}

fn unique_slug(title: &str, seen: &mut HashMap<String, usize>) -> String {
    let base = slugify(title);
    let count = seen.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base
    } else {
        format!("{base}-{count}")
    }
}

/// Lowercase, ascii-alphanumeric words joined by `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("section");
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("1. Problem Analysis!"), "1-problem-analysis");
        assert_eq!(slugify("  --  "), "section");
    }

    #[test]
    fn markdown_headings_nest_and_dedupe() {
        let md = "# Title\n## Risks\n### One\n```\n## not a heading\n```\n## Risks\n";
        let sections = markdown_sections(md);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].id, "risks");
        assert_eq!(sections[0].subsections[0].id, "one");
        assert_eq!(sections[1].id, "risks-2");
    }
}
