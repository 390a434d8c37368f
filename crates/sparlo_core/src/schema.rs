//! Structured report schema and its validation.
//!
//! Report payloads come from an external generation service and are treated
//! as untrusted. [`ReportContent::from_report_data`] either yields a validated
//! [`StructuredReport`] or falls back to markdown; it never fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sparlo_logging::sparlo_warn;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_SHORT_TEXT_CHARS: usize = 2_000;
pub const MAX_LONG_TEXT_CHARS: usize = 8_000;
pub const MAX_CONCEPTS: usize = 12;
pub const MAX_RISKS: usize = 20;
pub const MAX_NEXT_STEPS: usize = 20;
pub const MAX_LIST_ITEMS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("payload does not match the report shape: {0}")]
    Shape(String),
    #[error("{field} must not be empty")]
    Empty { field: String },
    #[error("{field} is {actual} characters, max {max}")]
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },
    #[error("{field} has {actual} entries, max {max}")]
    TooMany {
        field: String,
        max: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Viability {
    Viable,
    Conditional,
    NotViable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptTrack {
    BestFit,
    SimplerPath,
    Frontier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikelihoodColor {
    Red,
    Amber,
    Green,
}

impl ConfidenceLevel {
    pub fn label(self) -> &'static str {
        match self {
            ConfidenceLevel::High => "High confidence",
            ConfidenceLevel::Medium => "Medium confidence",
            ConfidenceLevel::Low => "Low confidence",
        }
    }
}

impl Viability {
    pub fn label(self) -> &'static str {
        match self {
            Viability::Viable => "Viable",
            Viability::Conditional => "Conditionally viable",
            Viability::NotViable => "Not viable",
        }
    }
}

impl ConceptTrack {
    pub fn label(self) -> &'static str {
        match self {
            ConceptTrack::BestFit => "Best fit",
            ConceptTrack::SimplerPath => "Simpler path",
            ConceptTrack::Frontier => "Frontier",
        }
    }
}

impl LikelihoodColor {
    pub fn label(self) -> &'static str {
        match self {
            LikelihoodColor::Red => "Likely",
            LikelihoodColor::Amber => "Possible",
            LikelihoodColor::Green => "Unlikely",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brief {
    pub title: String,
    pub problem_statement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub headline: String,
    pub summary: String,
    pub confidence: ConfidenceLevel,
    pub viability: Viability,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub hard: Vec<String>,
    #[serde(default)]
    pub soft: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemAnalysis {
    pub core_contradiction: String,
    #[serde(default)]
    pub root_causes: Vec<String>,
    #[serde(default)]
    pub success_metrics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionConcept {
    pub title: String,
    pub track: ConceptTrack,
    pub mechanism: String,
    #[serde(default)]
    pub source_domain: Option<String>,
    pub confidence: ConfidenceLevel,
    #[serde(default)]
    pub first_test: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SolutionConcepts {
    #[serde(default)]
    pub concepts: Vec<SolutionConcept>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub description: String,
    pub likelihood: LikelihoodColor,
    #[serde(default)]
    pub mitigation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Risks {
    #[serde(default)]
    pub items: Vec<Risk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextStep {
    pub action: String,
    #[serde(default)]
    pub timeframe: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NextSteps {
    #[serde(default)]
    pub steps: Vec<NextStep>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Appendix {
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

/// A generated report that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredReport {
    pub brief: Brief,
    pub executive_summary: ExecutiveSummary,
    #[serde(default)]
    pub constraints: Option<Constraints>,
    #[serde(default)]
    pub problem_analysis: Option<ProblemAnalysis>,
    #[serde(default)]
    pub solution_concepts: Option<SolutionConcepts>,
    #[serde(default)]
    pub risks: Option<Risks>,
    #[serde(default)]
    pub next_steps: Option<NextSteps>,
    #[serde(default)]
    pub appendix: Option<Appendix>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl StructuredReport {
    /// Strict parse: shape first, then field bounds.
    pub fn parse(value: &serde_json::Value) -> Result<Self, SchemaError> {
        let report: StructuredReport = serde_json::from_value(value.clone())
            .map_err(|err| SchemaError::Shape(err.to_string()))?;
        report.validate("report")?;
        Ok(report)
    }
}

/// Report body in whichever form survived validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportContent {
    Structured(Box<StructuredReport>),
    Markdown {
        text: String,
        /// Why a non-markdown payload was demoted, if it was.
        fallback_reason: Option<SchemaError>,
    },
}

impl ReportContent {
    pub fn from_report_data(value: &serde_json::Value) -> Self {
        if let Some(text) = markdown_field(value) {
            if value.as_object().is_some_and(|obj| obj.len() == 1) {
                return ReportContent::Markdown {
                    text,
                    fallback_reason: None,
                };
            }
        }

        match StructuredReport::parse(value) {
            Ok(report) => ReportContent::Structured(Box::new(report)),
            Err(err) => {
                sparlo_warn!("Report payload failed validation, rendering as markdown: {}", err);
                let text = markdown_field(value).unwrap_or_else(|| raw_text(value));
                ReportContent::Markdown {
                    text,
                    fallback_reason: Some(err),
                }
            }
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, ReportContent::Structured(_))
    }

    pub fn headline(&self) -> Option<String> {
        match self {
            ReportContent::Structured(report) => {
                Some(report.executive_summary.headline.clone())
            }
            ReportContent::Markdown { .. } => None,
        }
    }
}

fn markdown_field(value: &serde_json::Value) -> Option<String> {
    value
        .get("markdown")
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
}

fn raw_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => {
            let pretty = serde_json::to_string_pretty(other).unwrap_or_default();
            format!("```json\n{pretty}\n```\n")
        }
    }
}

trait Validate {
    fn validate(&self, path: &str) -> Result<(), SchemaError>;
}

fn check_text(field: String, value: &str, max: usize) -> Result<(), SchemaError> {
    if value.trim().is_empty() {
        return Err(SchemaError::Empty { field });
    }
    let actual = value.chars().count();
    if actual > max {
        return Err(SchemaError::TooLong { field, max, actual });
    }
    Ok(())
}

fn check_optional_text(field: String, value: Option<&str>, max: usize) -> Result<(), SchemaError> {
    match value {
        Some(text) => check_text(field, text, max),
        None => Ok(()),
    }
}

fn check_len(field: &str, actual: usize, max: usize) -> Result<(), SchemaError> {
    if actual > max {
        return Err(SchemaError::TooMany {
            field: field.to_string(),
            max,
            actual,
        });
    }
    Ok(())
}

fn check_text_list(field: String, items: &[String], max_items: usize) -> Result<(), SchemaError> {
    check_len(&field, items.len(), max_items)?;
    for (idx, item) in items.iter().enumerate() {
        check_text(format!("{field}[{idx}]"), item, MAX_SHORT_TEXT_CHARS)?;
    }
    Ok(())
}

fn check_items<T: Validate>(field: String, items: &[T], max_items: usize) -> Result<(), SchemaError> {
    check_len(&field, items.len(), max_items)?;
    for (idx, item) in items.iter().enumerate() {
        item.validate(&format!("{field}[{idx}]"))?;
    }
    Ok(())
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        match self {
            Some(inner) => inner.validate(path),
            None => Ok(()),
        }
    }
}

impl Validate for StructuredReport {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        self.brief.validate(&format!("{path}.brief"))?;
        self.executive_summary
            .validate(&format!("{path}.executive_summary"))?;
        self.constraints.validate(&format!("{path}.constraints"))?;
        self.problem_analysis
            .validate(&format!("{path}.problem_analysis"))?;
        self.solution_concepts
            .validate(&format!("{path}.solution_concepts"))?;
        self.risks.validate(&format!("{path}.risks"))?;
        self.next_steps.validate(&format!("{path}.next_steps"))?;
        self.appendix.validate(&format!("{path}.appendix"))?;
        self.metadata.validate(&format!("{path}.metadata"))
    }
}

impl Validate for Brief {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_text(format!("{path}.title"), &self.title, MAX_TITLE_CHARS)?;
        check_text(
            format!("{path}.problem_statement"),
            &self.problem_statement,
            MAX_LONG_TEXT_CHARS,
        )
    }
}

impl Validate for ExecutiveSummary {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_text(format!("{path}.headline"), &self.headline, MAX_TITLE_CHARS)?;
        check_text(format!("{path}.summary"), &self.summary, MAX_LONG_TEXT_CHARS)
    }
}

impl Validate for Constraints {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_text_list(format!("{path}.hard"), &self.hard, MAX_LIST_ITEMS)?;
        check_text_list(format!("{path}.soft"), &self.soft, MAX_LIST_ITEMS)?;
        check_text_list(format!("{path}.assumptions"), &self.assumptions, MAX_LIST_ITEMS)
    }
}

impl Validate for ProblemAnalysis {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_text(
            format!("{path}.core_contradiction"),
            &self.core_contradiction,
            MAX_SHORT_TEXT_CHARS,
        )?;
        check_text_list(format!("{path}.root_causes"), &self.root_causes, MAX_LIST_ITEMS)?;
        check_text_list(
            format!("{path}.success_metrics"),
            &self.success_metrics,
            MAX_LIST_ITEMS,
        )
    }
}

impl Validate for SolutionConcept {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_text(format!("{path}.title"), &self.title, MAX_TITLE_CHARS)?;
        check_text(format!("{path}.mechanism"), &self.mechanism, MAX_LONG_TEXT_CHARS)?;
        check_optional_text(
            format!("{path}.source_domain"),
            self.source_domain.as_deref(),
            MAX_TITLE_CHARS,
        )?;
        check_optional_text(
            format!("{path}.first_test"),
            self.first_test.as_deref(),
            MAX_SHORT_TEXT_CHARS,
        )
    }
}

impl Validate for SolutionConcepts {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_items(format!("{path}.concepts"), &self.concepts, MAX_CONCEPTS)
    }
}

impl Validate for Risk {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_text(
            format!("{path}.description"),
            &self.description,
            MAX_SHORT_TEXT_CHARS,
        )?;
        check_optional_text(
            format!("{path}.mitigation"),
            self.mitigation.as_deref(),
            MAX_SHORT_TEXT_CHARS,
        )
    }
}

impl Validate for Risks {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_items(format!("{path}.items"), &self.items, MAX_RISKS)
    }
}

impl Validate for NextStep {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_text(format!("{path}.action"), &self.action, MAX_SHORT_TEXT_CHARS)?;
        check_optional_text(
            format!("{path}.timeframe"),
            self.timeframe.as_deref(),
            MAX_TITLE_CHARS,
        )
    }
}

impl Validate for NextSteps {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_items(format!("{path}.steps"), &self.steps, MAX_NEXT_STEPS)
    }
}

impl Validate for Appendix {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_text_list(format!("{path}.references"), &self.references, MAX_LIST_ITEMS)?;
        check_optional_text(
            format!("{path}.notes"),
            self.notes.as_deref(),
            MAX_LONG_TEXT_CHARS,
        )
    }
}

impl Validate for Metadata {
    fn validate(&self, path: &str) -> Result<(), SchemaError> {
        check_optional_text(format!("{path}.model"), self.model.as_deref(), MAX_TITLE_CHARS)?;
        check_optional_text(
            format!("{path}.version"),
            self.version.as_deref(),
            MAX_TITLE_CHARS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_text_is_checked_only_when_present() {
        assert!(check_optional_text("x".into(), None, 3).is_ok());
        assert_eq!(
            check_optional_text("x".into(), Some("  "), 3),
            Err(SchemaError::Empty { field: "x".into() })
        );
    }

    #[test]
    fn length_is_measured_in_chars_not_bytes() {
        assert!(check_text("t".into(), "ééé", 3).is_ok());
        assert!(check_text("t".into(), "éééé", 3).is_err());
    }

    #[test]
    fn bare_string_payload_becomes_markdown_text() {
        let content = ReportContent::from_report_data(&json!("# Plain"));
        match content {
            ReportContent::Markdown { text, fallback_reason } => {
                assert_eq!(text, "# Plain");
                assert!(fallback_reason.is_some());
            }
            other => panic!("expected markdown, got {other:?}"),
        }
    }
}
