//! Orchestrator sequencing planning, iterative research, synthesis, and
//! citation resolution. The whole flow is strictly sequential: reflection
//! after step N depends on step N's own answer.

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, PlannerConfig};
use crate::error::DeepReportError;
use crate::iteration::{IterationController, QaPair, ResearchState};
use crate::llm::{LlmClient, OpenAiChatClient};
use crate::resolve::{ReferenceTable, resolve};
use crate::retrieval::{HttpRetrievalClient, RetrievalClient};
use crate::{planner, synthesize};

/// The finished product of one research run.
#[derive(Debug, Clone)]
pub struct ResearchReport {
    pub topic: String,
    /// Model output with citation markers still inline.
    pub raw_report: String,
    /// Report with markers rewritten to reference numbers and a trailing
    /// bibliography.
    pub resolved_report: String,
    pub references: ReferenceTable,
    pub completed_qa: Vec<QaPair>,
}

pub struct ResearchAgent {
    llm: Arc<dyn LlmClient>,
    retrieval: Arc<dyn RetrievalClient>,
    initial_questions: usize,
    max_additional_questions: usize,
}

impl ResearchAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retrieval: Arc<dyn RetrievalClient>,
        planner: &PlannerConfig,
    ) -> Self {
        Self {
            llm,
            retrieval,
            initial_questions: planner.initial_questions,
            max_additional_questions: planner.max_additional_questions,
        }
    }

    /// Build an agent with the HTTP collaborators described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, DeepReportError> {
        let api_key = config.llm_api_key()?;
        let llm = Arc::new(OpenAiChatClient::new(&config.llm, api_key)?);
        let retrieval = Arc::new(HttpRetrievalClient::new(&config.retrieval)?);
        Ok(Self::new(llm, retrieval, &config.planner))
    }

    /// Run the full research flow for a topic.
    ///
    /// Only a planning failure aborts; retrieval failures, unresolvable
    /// citations, and over-budget reflections all degrade in place.
    pub async fn run(&self, topic: &str) -> Result<ResearchReport, DeepReportError> {
        info!(topic = %topic, "starting research session");

        let questions =
            planner::plan(self.llm.as_ref(), topic, self.initial_questions).await?;
        let mut state = ResearchState::new(topic, questions);

        let controller = IterationController::new(
            self.llm.as_ref(),
            self.retrieval.as_ref(),
            self.max_additional_questions,
        );
        controller.run(&mut state).await;

        let raw_report =
            synthesize::synthesize(self.llm.as_ref(), topic, &state.completed_qa).await?;
        let (resolved_report, references) = resolve(&raw_report, &state.completed_qa);

        info!(
            questions_answered = state.completed_qa.len(),
            references = references.len(),
            "research session complete"
        );

        Ok(ResearchReport {
            topic: state.topic,
            raw_report,
            resolved_report,
            references,
            completed_qa: state.completed_qa,
        })
    }
}
