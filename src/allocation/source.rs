//! LLM-backed allocation source.
//!
//! Builds a prompt describing the cost entity and its department's programs,
//! asks the model for a JSON object of percentages, and parses it. The model
//! often wraps the object in prose, so the first balanced JSON object is cut
//! out of the reply before parsing. Validation of the percentages themselves
//! happens in the engine, not here.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::dataset::Program;
use crate::llm::{ChatMessage, ChatOptions, LlmClient};

use super::{AllocationMap, AllocationSource, AllocationSourceError, CostEntity, EntityKind};

const SYSTEM_PROMPT: &str = "You are an expert in cost allocation.";
const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u64 = 150;

/// Allocation source that asks an LLM for the distribution.
pub struct LlmAllocationSource {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl LlmAllocationSource {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl AllocationSource for LlmAllocationSource {
    async fn propose(
        &self,
        entity: &CostEntity<'_>,
        programs: &[&Program],
    ) -> Result<AllocationMap, AllocationSourceError> {
        let prompt = build_prompt(entity, programs);
        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        let options = ChatOptions {
            temperature: Some(TEMPERATURE),
            max_tokens: Some(MAX_TOKENS),
        };

        let response = self.llm.chat(&self.model, &messages, options).await?;
        let content = response
            .content
            .ok_or_else(|| AllocationSourceError::Malformed("empty completion".to_string()))?;

        debug!(
            department = entity.department,
            entity = entity.name,
            response = %content,
            "raw allocation response"
        );

        let object = extract_json_object(&content).ok_or_else(|| {
            AllocationSourceError::Malformed("no JSON object in response".to_string())
        })?;
        serde_json::from_str(object)
            .map_err(|e| AllocationSourceError::Malformed(format!("invalid allocation JSON: {e}")))
    }
}

/// Render the allocation request for one entity.
///
/// Two wordings: positions are allocated by work time, line items by how the
/// expense would typically be spread.
fn build_prompt(entity: &CostEntity<'_>, programs: &[&Program]) -> String {
    let names: Vec<&str> = programs.iter().map(|p| p.name.as_str()).collect();

    match entity.kind {
        EntityKind::Personnel => format!(
            "You are an expert in organizational management and program planning. \
             Consider the following details:\n\n\
             - Department: {department}\n\
             - Position Title: {title}\n\
             - Programs in Department: {names:?}\n\n\
             Based on the responsibilities typically associated with this position, \
             allocate the position's 100% work time among these programs.\n\
             The allocation must:\n\
             - Be in increments of 5% (e.g., 5%, 10%, 15%, etc.)\n\
             - Sum exactly to 100%\n\
             - Only allocate to at most {count} programs\n\n\
             Provide the result as a JSON object mapping each program to its \
             allocation percentage. For example:\n\
             {{\n  \"Budget Analysis\": 40,\n  \"Financial Planning\": 40,\n  \"Audit\": 20\n}}\n\n\
             Use your best judgement to reflect the likelihood of this position \
             supporting these programs.",
            department = entity.department,
            title = entity.name,
            count = names.len(),
        ),
        EntityKind::NonPersonnel => format!(
            "You are an expert in budgeting and cost allocation. \
             Consider the following details:\n\n\
             - Department: {department}\n\
             - Line Item: {label}\n\
             - Programs in Department: {names:?}\n\n\
             Allocate the cost of the \"{label}\" among these programs in a way that \
             reflects how the expense would likely be distributed.\n\
             The allocation must:\n\
             - Be in increments of 5% (e.g., 5%, 10%, 15%, etc.)\n\
             - Sum exactly to 100%\n\n\
             Provide the result as a JSON object mapping each program to its \
             allocation percentage. For example:\n\
             {{\n  \"Budget Analysis\": 30,\n  \"Financial Planning\": 50,\n  \"Audit\": 20\n}}\n\n\
             Use your best judgement to reflect typical usage patterns in the department.",
            department = entity.department,
            label = entity.name,
        ),
    }
}

/// Slice out the first balanced `{...}` object, respecting string literals.
///
/// Returns `None` when the text contains no complete object.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
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
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
