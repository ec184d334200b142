//! LLM-backed category router
//!
//! Classifies a free-text query into one of the known categories, or the
//! sentinel "none". The model may only pick from the known set; an
//! out-of-set answer or malformed JSON gets one retry, and a second
//! failure maps to "none" with an error rationale rather than a crash.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::errors::{EngineError, Result};
use crate::llm::ChatModel;
use crate::types::CategorySlug;

/// Sentinel the model uses when no category plausibly matches
const NONE_SENTINEL: &str = "none";

/// Routing decision
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    /// Selected category, `None` when nothing matches
    pub category: Option<CategorySlug>,
    /// Model-reported confidence in [0, 1]
    pub confidence: f32,
    /// Model-reported rationale (or the error that forced `none`)
    pub rationale: String,
}

impl RouteDecision {
    fn none(confidence: f32, rationale: impl Into<String>) -> Self {
        Self {
            category: None,
            confidence,
            rationale: rationale.into(),
        }
    }
}

/// Raw model response shape
#[derive(Debug, Deserialize)]
struct RawDecision {
    category: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    rationale: Option<String>,
}

/// LLM category classifier
pub struct CategoryRouter {
    model: Arc<dyn ChatModel>,
}

impl CategoryRouter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Route a query to one of `known` categories, or none.
    ///
    /// Guaranteed to return a member of `known` or `None` — never a value
    /// outside the set, and never an error for malformed model output.
    pub async fn route(&self, query: &str, known: &BTreeSet<CategorySlug>) -> Result<RouteDecision> {
        if known.is_empty() {
            return Ok(RouteDecision::none(1.0, "no categories exist"));
        }

        let prompt = self.build_prompt(query, known);

        let mut last_problem = String::new();
        for attempt in 0..2 {
            let raw = match self.model.complete(&prompt).await {
                Ok(raw) => raw,
                // Transport failures get the same single retry; a second
                // one propagates for the orchestrator's fallback handling.
                Err(e) if e.is_retryable() && attempt + 1 < 2 => {
                    last_problem = e.to_string();
                    tracing::debug!(attempt, problem = %last_problem, "router model call failed");
                    continue;
                }
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => {
                    last_problem = e.to_string();
                    tracing::debug!(attempt, problem = %last_problem, "router model call failed");
                    continue;
                }
            };

            match self.parse(&raw, known) {
                Ok(decision) => return Ok(decision),
                Err(problem) => {
                    last_problem = problem;
                    tracing::debug!(attempt, problem = %last_problem, "malformed routing output");
                }
            }
        }

        Ok(RouteDecision::none(
            0.0,
            format!("routing failed: {}", last_problem),
        ))
    }

    fn build_prompt(&self, query: &str, known: &BTreeSet<CategorySlug>) -> String {
        let listing: Vec<&str> = known.iter().map(|c| c.as_str()).collect();
        format!(
            "You are a query classifier for a knowledge base.\n\
             Known categories: {}\n\
             Classify the user query into exactly one category, or \"{}\" if \
             none plausibly matches. Do not invent categories.\n\
             Respond with JSON only: \
             {{\"category\": \"...\", \"confidence\": 0.0, \"rationale\": \"...\"}}\n\n\
             Query: {}",
            listing.join(", "),
            NONE_SENTINEL,
            query
        )
    }

    /// Parse and contract-check one model response. Returns a description
    /// of the problem when the output is unusable.
    fn parse(
        &self,
        raw: &str,
        known: &BTreeSet<CategorySlug>,
    ) -> std::result::Result<RouteDecision, String> {
        let json = extract_json_object(raw).ok_or("no JSON object in output")?;

        let parsed: RawDecision =
            serde_json::from_str(json).map_err(|e| format!("invalid JSON: {}", e))?;

        let confidence = parsed.confidence.unwrap_or(0.5).clamp(0.0, 1.0);
        let rationale = parsed.rationale.unwrap_or_default();

        if parsed.category.eq_ignore_ascii_case(NONE_SENTINEL) {
            return Ok(RouteDecision {
                category: None,
                confidence,
                rationale,
            });
        }

        let slug = CategorySlug::parse(&parsed.category)
            .ok_or_else(|| format!("unusable category value: {:?}", parsed.category))?;

        if !known.contains(&slug) {
            // Contract violation: the model picked outside the known set.
            return Err(
                EngineError::RoutingContract {
                    candidate: parsed.category,
                }
                .to_string(),
            );
        }

        Ok(RouteDecision {
            category: Some(slug),
            confidence,
            rationale,
        })
    }
}

/// Extract the first balanced JSON object from model output, tolerating
/// prose or code fences around it.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
