//! Iterative research loop: answer one pending question at a time, then let
//! the model revise the remaining queue under a strict additive-question
//! budget.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::LlmClient;
use crate::planner::extract_question_list;
use crate::retrieval::RetrievalClient;

/// Substituted when a single retrieval call fails; one failed lookup must
/// not halt the whole run.
pub const FALLBACK_ANSWER: &str =
    "No relevant information could be retrieved from the knowledge base.";

// Prefixed to every retrieval question so the backend cites documents by
// their original names instead of translating them or mistaking graph labels
// for document names.
const QUERY_GUIDANCE: &str = "When citing references, keep the original document names exactly \
    as they appear in the source material; do not translate them and do not mistake labels such \
    as \"relation\" for document names. ";

const REFLECTION_SYSTEM_PROMPT: &str = "You are a research strategist. Your job is to \
    dynamically refine the remaining research plan in light of the information collected so \
    far, by revising, adding, or removing questions.";

/// One answered question. Never mutated after creation; its position in
/// `completed_qa` defines the 1-based question index used by citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    pub evidence_log_path: String,
}

/// The whole mutable state of one research run. Owned by the orchestrator,
/// mutated only by the iteration controller, immutable after the run.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchState {
    pub topic: String,
    pub pending_questions: Vec<String>,
    pub completed_qa: Vec<QaPair>,
    pub added_questions_used: usize,
}

impl ResearchState {
    pub fn new(topic: impl Into<String>, pending_questions: Vec<String>) -> Self {
        Self {
            topic: topic.into(),
            pending_questions,
            completed_qa: Vec::new(),
            added_questions_used: 0,
        }
    }
}

/// Drives the step/reflect loop over `ResearchState`.
pub struct IterationController<'a> {
    llm: &'a dyn LlmClient,
    retrieval: &'a dyn RetrievalClient,
    max_additional_questions: usize,
}

impl<'a> IterationController<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        retrieval: &'a dyn RetrievalClient,
        max_additional_questions: usize,
    ) -> Self {
        Self {
            llm,
            retrieval,
            max_additional_questions,
        }
    }

    /// Drain the pending queue. Terminates because each step removes exactly
    /// one question and reflection adds at most the remaining budget.
    pub async fn run(&self, state: &mut ResearchState) {
        let mut iteration = 1usize;
        while !state.pending_questions.is_empty() {
            let question = state.pending_questions.remove(0);
            info!(iteration, question = %question, "researching question");

            self.step(state, question).await;
            self.reflect(state).await;
            iteration += 1;
        }
        info!(
            completed = state.completed_qa.len(),
            added = state.added_questions_used,
            "all questions researched"
        );
    }

    async fn step(&self, state: &mut ResearchState, question: String) {
        let query = format!("{QUERY_GUIDANCE}{question}");
        let (answer, evidence_log_path) = match self.retrieval.lookup(&query).await {
            Ok(retrieved) => (retrieved.answer, retrieved.evidence_log_path),
            Err(err) => {
                warn!(
                    error = %err,
                    question = %question,
                    "retrieval failed; substituting fallback answer"
                );
                (FALLBACK_ANSWER.to_string(), String::new())
            }
        };

        state.completed_qa.push(QaPair {
            question,
            answer,
            evidence_log_path,
        });
    }

    /// Ask the model for a full replacement of the remaining question list,
    /// then enforce the additive-question budget. Any failure keeps the
    /// current plan unchanged.
    async fn reflect(&self, state: &mut ResearchState) {
        let user_prompt = self.reflection_prompt(state);

        let response = match self
            .llm
            .complete(REFLECTION_SYSTEM_PROMPT, &user_prompt)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "reflection call failed; keeping current question list");
                return;
            }
        };

        let Some(proposed) = extract_question_list(&response) else {
            warn!("reflection produced no usable question list; keeping current plan");
            return;
        };

        // A parsed empty list is a valid update: the model may decide no
        // further research is needed.
        let accepted = self.enforce_budget(state, proposed);
        info!(remaining = accepted.len(), "question list updated after reflection");
        state.pending_questions = accepted;
    }

    fn reflection_prompt(&self, state: &ResearchState) -> String {
        let completed = state
            .completed_qa
            .iter()
            .map(|pair| format!("Q: {}\nA: {}\n", pair.question, pair.answer))
            .collect::<Vec<_>>()
            .join("\n");
        let pending = state
            .pending_questions
            .iter()
            .enumerate()
            .map(|(idx, question)| format!("{}. {}", idx + 1, question))
            .collect::<Vec<_>>()
            .join("\n");
        let remaining_allowed = self
            .max_additional_questions
            .saturating_sub(state.added_questions_used);

        format!(
            "Original research topic: {}\n\n\
             Research questions answered so far:\n{completed}\n\n\
             Questions we still plan to research:\n{pending}\n\n\
             Based on the above, refine the remaining question list. You may:\n\
             1. Revise existing questions to make them deeper or more precise.\n\
             2. Add new questions inspired by the information gathered.\n\
             3. Remove questions that are already answered or no longer relevant.\n\
             Note: you may add at most {remaining_allowed} new questions.\n\
             Make sure the final list is coherent, free of duplicates, and able to support a \
             complete report.\n\
             Return strictly a JSON array containing the updated questions with no other text \
             or explanation, for example: [\"Revised question?\", \"New question?\", ...]",
            state.topic
        )
    }

    /// Accept a proposed replacement list, truncating over-budget growth.
    ///
    /// Growth is charged positionally (`delta = new_len - old_len`; shrinking
    /// or same-size edits are free), but excess entries are dropped by
    /// set-difference, rear-first: a proposal that merely reorders questions
    /// already on the queue never loses them to the budget.
    fn enforce_budget(&self, state: &mut ResearchState, proposed: Vec<String>) -> Vec<String> {
        let before = state.pending_questions.len();
        if proposed.len() <= before {
            return proposed;
        }

        let delta = proposed.len() - before;
        let remaining = self
            .max_additional_questions
            .saturating_sub(state.added_questions_used);

        if delta <= remaining {
            state.added_questions_used += delta;
            return proposed;
        }

        let existing: HashSet<&str> = state
            .pending_questions
            .iter()
            .map(String::as_str)
            .collect();

        let mut to_drop = delta - remaining;
        let mut kept_rev: Vec<String> = Vec::with_capacity(proposed.len());
        for question in proposed.into_iter().rev() {
            if to_drop > 0 && !existing.contains(question.as_str()) {
                to_drop -= 1;
                continue;
            }
            kept_rev.push(question);
        }
        // Duplicated pre-existing questions can make positional growth exceed
        // the number of genuinely new entries; trim the rear for the rest.
        while to_drop > 0 && !kept_rev.is_empty() {
            kept_rev.remove(0);
            to_drop -= 1;
        }
        kept_rev.reverse();

        let growth = kept_rev.len().saturating_sub(before);
        state.added_questions_used += growth;
        warn!(
            proposed_growth = delta,
            kept_growth = growth,
            budget = self.max_additional_questions,
            "reflection exceeded the question budget; excess additions dropped"
        );
        kept_rev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeepReportError;
    use crate::retrieval::Retrieved;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(responses: &[&str]) -> Self {
            let mut responses: Vec<String> =
                responses.iter().map(|r| r.to_string()).collect();
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _: &str, _: &str) -> Result<String, DeepReportError> {
            Ok(self.responses.lock().unwrap().pop().unwrap_or_default())
        }
    }

    struct EchoRetrieval;

    #[async_trait]
    impl RetrievalClient for EchoRetrieval {
        async fn lookup(&self, question: &str) -> Result<Retrieved, DeepReportError> {
            Ok(Retrieved {
                answer: format!("answer to: {question}"),
                evidence_log_path: String::new(),
            })
        }
    }

    struct FailingRetrieval;

    #[async_trait]
    impl RetrievalClient for FailingRetrieval {
        async fn lookup(&self, _: &str) -> Result<Retrieved, DeepReportError> {
            Err(DeepReportError::Planning("unreachable backend".into()))
        }
    }

    fn questions(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn shrinking_and_same_size_edits_are_free() {
        let llm = ScriptedLlm::new(&[]);
        let controller = IterationController::new(&llm, &EchoRetrieval, 2);
        let mut state = ResearchState::new("topic", questions(&["A", "B", "C"]));

        let accepted = controller.enforce_budget(&mut state, questions(&["A'", "C"]));
        assert_eq!(accepted, questions(&["A'", "C"]));
        assert_eq!(state.added_questions_used, 0);
    }

    #[test]
    fn growth_within_budget_is_charged() {
        let llm = ScriptedLlm::new(&[]);
        let controller = IterationController::new(&llm, &EchoRetrieval, 2);
        let mut state = ResearchState::new("topic", questions(&["A"]));

        let accepted = controller.enforce_budget(&mut state, questions(&["A", "N1", "N2"]));
        assert_eq!(accepted.len(), 3);
        assert_eq!(state.added_questions_used, 2);
    }

    #[test]
    fn excess_growth_is_truncated_to_remaining_budget() {
        let llm = ScriptedLlm::new(&[]);
        let controller = IterationController::new(&llm, &EchoRetrieval, 2);
        let mut state = ResearchState::new("topic", questions(&["A"]));
        state.added_questions_used = 1;

        // remaining budget 1, proposal grows by 3: exactly one addition kept.
        let accepted =
            controller.enforce_budget(&mut state, questions(&["A", "N1", "N2", "N3"]));
        assert_eq!(accepted, questions(&["A", "N1"]));
        assert_eq!(state.added_questions_used, 2);
    }

    #[test]
    fn exhausted_budget_discards_all_additions() {
        let llm = ScriptedLlm::new(&[]);
        let controller = IterationController::new(&llm, &EchoRetrieval, 2);
        let mut state = ResearchState::new("topic", questions(&["A", "B"]));
        state.added_questions_used = 2;

        let accepted = controller.enforce_budget(&mut state, questions(&["A", "B", "N1"]));
        assert_eq!(accepted, questions(&["A", "B"]));
        assert_eq!(state.added_questions_used, 2);
    }

    #[test]
    fn reorder_keeps_existing_questions() {
        let llm = ScriptedLlm::new(&[]);
        let controller = IterationController::new(&llm, &EchoRetrieval, 1);
        let mut state = ResearchState::new("topic", questions(&["A", "B"]));

        // New questions listed first; positional slicing would discard "B".
        let accepted =
            controller.enforce_budget(&mut state, questions(&["N1", "N2", "A", "B"]));
        assert_eq!(accepted, questions(&["N1", "A", "B"]));
        assert_eq!(state.added_questions_used, 1);
    }

    #[tokio::test]
    async fn retrieval_failure_substitutes_fallback_answer() {
        let llm = ScriptedLlm::new(&["[]"]);
        let controller = IterationController::new(&llm, &FailingRetrieval, 0);
        let mut state = ResearchState::new("topic", questions(&["A"]));

        controller.run(&mut state).await;

        assert_eq!(state.completed_qa.len(), 1);
        assert_eq!(state.completed_qa[0].answer, FALLBACK_ANSWER);
        assert!(state.completed_qa[0].evidence_log_path.is_empty());
    }

    #[tokio::test]
    async fn unparsable_reflection_keeps_pending_list() {
        // First reflection is garbage; the queue must survive it.
        let llm = ScriptedLlm::new(&["not a list", "[]"]);
        let controller = IterationController::new(&llm, &EchoRetrieval, 0);
        let mut state = ResearchState::new("topic", questions(&["A", "B"]));

        controller.run(&mut state).await;

        // "A" answered, garbage reflection kept "B", then "B" answered and
        // the final reflection emptied the queue.
        assert_eq!(state.completed_qa.len(), 2);
        assert!(state.pending_questions.is_empty());
    }

    #[tokio::test]
    async fn reflection_rewrites_the_queue_in_fifo_order() {
        let llm = ScriptedLlm::new(&[r#"["B revised"]"#, "[]"]);
        let controller = IterationController::new(&llm, &EchoRetrieval, 2);
        let mut state = ResearchState::new("topic", questions(&["A", "B"]));

        controller.run(&mut state).await;

        assert_eq!(state.completed_qa.len(), 2);
        assert_eq!(state.completed_qa[0].question, "A");
        assert_eq!(state.completed_qa[1].question, "B revised");
    }
}
