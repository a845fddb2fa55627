//! Recovery of the structured classification payload from free-form model output.
//!
//! Models asked for "JSON only" still wrap answers in prose or code fences. The reconciler
//! scans for balanced `{ ... }` regions (tracking nesting depth and skipping braces inside
//! string literals) and accepts the first one that is a [`ClassifiedSummary`] object whose
//! clauses all carry a title and a summary. When no balanced region exists it strips code
//! fences and parses the remainder under the same rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single clause as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseSummary {
    /// Short clause title.
    #[serde(rename = "titulo")]
    pub title: String,
    /// One or two sentence plain-language summary.
    #[serde(rename = "resumo")]
    pub summary: String,
}

/// Clauses split into safe and risky groups, in model order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedSummary {
    /// Clauses judged harmless for the signer.
    #[serde(rename = "seguras")]
    pub safe_clauses: Vec<ClauseSummary>,
    /// Clauses judged risky for the signer.
    #[serde(rename = "riscos")]
    pub risky_clauses: Vec<ClauseSummary>,
}

/// The model output could not be turned into a [`ClassifiedSummary`].
#[derive(Debug, Error)]
#[error("could not interpret model output: {reason}")]
pub struct ReconciliationError {
    /// What went wrong.
    pub reason: String,
    /// The model output exactly as received.
    pub raw: String,
}

impl ReconciliationError {
    fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

/// Extract and validate the classification payload embedded in `raw`.
pub fn parse_classification(raw: &str) -> Result<ClassifiedSummary, ReconciliationError> {
    let regions = balanced_regions(raw);
    if regions.is_empty() {
        let stripped = strip_code_fences(raw);
        return parse_candidate(stripped.trim()).map_err(|reason| {
            ReconciliationError::new(format!("no structured payload found: {reason}"), raw)
        });
    }

    let mut first_failure = None;
    for region in regions {
        match parse_candidate(region) {
            Ok(summary) => return Ok(summary),
            Err(reason) => {
                first_failure.get_or_insert(reason);
            }
        }
    }
    let reason = first_failure.unwrap_or_default();
    Err(ReconciliationError::new(
        format!("no brace-delimited region matched the schema: {reason}"),
        raw,
    ))
}

/// Parse one candidate as a `{ "seguras", "riscos" }` object and check every clause.
///
/// Arrays are refused up front: serde maps a two-element array onto the struct positionally.
fn parse_candidate(candidate: &str) -> Result<ClassifiedSummary, String> {
    let value: serde_json::Value =
        serde_json::from_str(candidate).map_err(|error| error.to_string())?;
    if !value.is_object() {
        return Err("payload is not a JSON object".to_string());
    }
    let summary: ClassifiedSummary =
        serde_json::from_value(value).map_err(|error| error.to_string())?;
    validate(&summary)?;
    Ok(summary)
}

/// Every balanced `{ ... }` region, ordered by starting offset.
///
/// Regions may nest; an inner region is listed after the region that contains it.
fn balanced_regions(text: &str) -> Vec<&str> {
    text.char_indices()
        .filter(|&(_, ch)| ch == '{')
        .filter_map(|(start, _)| {
            matching_close(&text[start..]).map(|len| &text[start..start + len])
        })
        .collect()
}

/// Length (in bytes, inclusive) of the region opened by the `{` at the start of `text`.
fn matching_close(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim();
            match trimmed.strip_prefix("```") {
                Some(rest) if rest.chars().all(|ch| ch.is_ascii_alphanumeric()) => "",
                _ => line,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .replace("```", "")
}

fn validate(summary: &ClassifiedSummary) -> Result<(), String> {
    let groups = [
        ("seguras", &summary.safe_clauses),
        ("riscos", &summary.risky_clauses),
    ];
    for (group, clauses) in groups {
        for (index, clause) in clauses.iter().enumerate() {
            if clause.title.trim().is_empty() {
                return Err(format!("{group}[{index}] has an empty titulo"));
            }
            if clause.summary.trim().is_empty() {
                return Err(format!("{group}[{index}] has an empty resumo"));
            }
        }
    }
    Ok(())
}
