//! Research planning: decompose a topic into an initial bounded list of
//! sub-questions via the model collaborator.

use tracing::{info, warn};

use crate::error::DeepReportError;
use crate::llm::LlmClient;

const PLANNER_SYSTEM_PROMPT: &str = "You are a senior industry research analyst. \
    Your job is to break a complex research topic into a series of specific, clear \
    questions that can each be answered independently from a knowledge base.";

/// Produce the initial question list for a topic.
///
/// Failure here is fatal: without at least one question no research can run.
pub async fn plan(
    llm: &dyn LlmClient,
    topic: &str,
    target_count: usize,
) -> Result<Vec<String>, DeepReportError> {
    let user_prompt = format!(
        "The research topic is: {topic}\n\n\
         Design a comprehensive research outline and break it down into {target_count} core \
         questions. The questions should cover every aspect of the topic, be logically \
         ordered, and be phrased unambiguously.\n\
         Return strictly a JSON array of question strings with no other text or explanation, \
         for example: [\"Question 1?\", \"Question 2?\", ...]"
    );

    let response = llm.complete(PLANNER_SYSTEM_PROMPT, &user_prompt).await?;
    let questions = extract_question_list(&response)
        .filter(|list| !list.is_empty())
        .ok_or_else(|| {
            DeepReportError::Planning("model did not return a usable initial question list".into())
        })?;

    info!(count = questions.len(), "initial question list planned");
    Ok(questions)
}

/// Extract a JSON array of strings from a model response.
///
/// Tries a direct parse first, then the contents of a fenced code block
/// (first opening fence, last closing fence). `None` means nothing usable
/// was found; callers decide whether that is fatal.
pub(crate) fn extract_question_list(response: &str) -> Option<Vec<String>> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
        return Some(list);
    }

    for fence in ["```json", "```"] {
        let Some(start) = trimmed.find(fence) else {
            continue;
        };
        let rest = &trimmed[start + fence.len()..];
        let Some(end) = rest.rfind("```") else {
            continue;
        };
        if let Ok(list) = serde_json::from_str::<Vec<String>>(rest[..end].trim()) {
            return Some(list);
        }
    }

    warn!("could not extract a JSON question list from model response");
    None
}
