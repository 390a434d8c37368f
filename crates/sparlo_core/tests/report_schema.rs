use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sparlo_core::{
    render_markdown, toc_sections, ConceptTrack, LikelihoodColor, ReportContent, SchemaError,
    StructuredReport, MAX_CONCEPTS, MAX_TITLE_CHARS,
};

fn valid_payload() -> Value {
    json!({
        "brief": {
            "title": "Cold chain for rural clinics",
            "problem_statement": "Vaccines spoil during the last 30 km of delivery."
        },
        "executive_summary": {
            "headline": "Phase-change packs beat active cooling",
            "summary": "Passive packs keep 2-8C for 72h at a tenth of the cost.",
            "confidence": "medium",
            "viability": "viable"
        },
        "problem_analysis": {
            "core_contradiction": "More insulation means more weight",
            "root_causes": ["No grid power", "Long dwell times"]
        },
        "solution_concepts": {
            "concepts": [
                {
                    "title": "Phase-change packs",
                    "track": "best_fit",
                    "mechanism": "Paraffin blend melting at 5C",
                    "source_domain": "Food logistics",
                    "confidence": "high"
                },
                {
                    "title": "Evaporative jacket",
                    "track": "frontier",
                    "mechanism": "Clay pot refrigeration",
                    "confidence": "low",
                    "first_test": "Bench test at 40C ambient"
                }
            ]
        },
        "risks": {
            "items": [
                { "description": "Pack supply", "likelihood": "amber", "mitigation": "Dual source" }
            ]
        },
        "next_steps": { "steps": [ { "action": "Order samples", "timeframe": "2 weeks" } ] },
        "metadata": { "model": "gen-2", "internal_trace_id": "ignored" },
        "unknown_top_level": { "anything": true }
    })
}

#[test]
fn valid_payload_is_structured_and_unknown_fields_are_ignored() {
    let content = ReportContent::from_report_data(&valid_payload());
    let ReportContent::Structured(report) = content else {
        panic!("expected structured report");
    };
    assert_eq!(report.brief.title, "Cold chain for rural clinics");
    let concepts = &report.solution_concepts.as_ref().unwrap().concepts;
    assert_eq!(concepts[1].track, ConceptTrack::Frontier);
    assert_eq!(
        report.risks.as_ref().unwrap().items[0].likelihood,
        LikelihoodColor::Amber
    );
}

#[test]
fn markdown_payload_is_taken_verbatim() {
    let content = ReportContent::from_report_data(&json!({ "markdown": "## Intro\nhello" }));
    assert_eq!(
        content,
        ReportContent::Markdown {
            text: "## Intro\nhello".to_string(),
            fallback_reason: None,
        }
    );
}

#[test]
fn over_long_title_falls_back_to_markdown() {
    let mut payload = valid_payload();
    payload["brief"]["title"] = Value::String("x".repeat(MAX_TITLE_CHARS + 1));
    payload["markdown"] = Value::String("# Raw report".to_string());

    match ReportContent::from_report_data(&payload) {
        ReportContent::Markdown {
            text,
            fallback_reason,
        } => {
            assert_eq!(text, "# Raw report");
            assert_eq!(
                fallback_reason,
                Some(SchemaError::TooLong {
                    field: "report.brief.title".to_string(),
                    max: MAX_TITLE_CHARS,
                    actual: MAX_TITLE_CHARS + 1,
                })
            );
        }
        other => panic!("expected fallback, got {other:?}"),
    }
}

#[test]
fn empty_text_and_unknown_enum_literals_reject() {
    let mut empty = valid_payload();
    empty["executive_summary"]["summary"] = json!("   ");
    assert_eq!(
        StructuredReport::parse(&empty).unwrap_err(),
        SchemaError::Empty {
            field: "report.executive_summary.summary".to_string()
        }
    );

    let mut bad_enum = valid_payload();
    bad_enum["executive_summary"]["confidence"] = json!("certain");
    assert!(matches!(
        StructuredReport::parse(&bad_enum),
        Err(SchemaError::Shape(_))
    ));
}

#[test]
fn too_many_concepts_reject() {
    let mut payload = valid_payload();
    let concept = payload["solution_concepts"]["concepts"][0].clone();
    payload["solution_concepts"]["concepts"] = Value::Array(vec![concept; MAX_CONCEPTS + 1]);
    assert!(matches!(
        StructuredReport::parse(&payload),
        Err(SchemaError::TooMany { .. })
    ));
}

#[test]
fn invalid_payload_without_markdown_still_renders() {
    let content = ReportContent::from_report_data(&json!({ "brief": 42 }));
    match content {
        ReportContent::Markdown { text, fallback_reason } => {
            assert!(text.contains("\"brief\": 42"));
            assert!(fallback_reason.is_some());
        }
        other => panic!("expected fallback, got {other:?}"),
    }
}

#[test]
fn renderer_emits_sections_in_schema_order() {
    let report = StructuredReport::parse(&valid_payload()).unwrap();
    let md = render_markdown(&report);

    let brief = md.find("## Brief").unwrap();
    let summary = md.find("## Executive Summary").unwrap();
    let concepts = md.find("## Solution Concepts").unwrap();
    let risks = md.find("## Risks").unwrap();
    assert!(brief < summary && summary < concepts && concepts < risks);
    assert!(md.contains("[Medium confidence] [Viable]"));
    assert!(md.contains("- [Possible] Pack supply (mitigation: Dual source)"));
    assert!(md.contains("1. Order samples (2 weeks)"));
    assert!(!md.contains("## Constraints"));
}

#[test]
fn structured_toc_lists_present_sections_with_concepts_nested() {
    let content = ReportContent::from_report_data(&valid_payload());
    let sections = toc_sections(&content);
    let ids: Vec<&str> = sections.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "brief",
            "executive-summary",
            "problem-analysis",
            "solution-concepts",
            "risks",
            "next-steps"
        ]
    );
    assert_eq!(sections[3].subsections.len(), 2);
    assert_eq!(sections[3].subsections[1].title, "Evaporative jacket");
}
