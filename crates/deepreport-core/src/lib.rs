//! DeepReport core: an iterative research agent that plans sub-questions for
//! a topic, answers them through an external retrieval backend, reflects on
//! the accumulated answers under a strict question budget, synthesizes a
//! long-form report, and deterministically resolves inline citation markers
//! into a numbered bibliography.

mod agent;
mod citation;
mod config;
mod error;
mod evidence;
mod iteration;
mod llm;
mod planner;
mod resolve;
mod retrieval;
mod synthesize;

pub use agent::{ResearchAgent, ResearchReport};
pub use citation::{CitationReference, parse_marker};
pub use config::{
    Config, ConfigLoader, LlmConfig, LoggingConfig, PlannerConfig, RetrievalConfig, SecretValue,
    require_env,
};
pub use error::DeepReportError;
pub use evidence::{EvidenceCategory, EvidenceItem, EvidenceLog, EvidenceStore};
pub use iteration::{FALLBACK_ANSWER, IterationController, QaPair, ResearchState};
pub use llm::{ChatMessage, ChatRole, LlmClient, OpenAiChatClient};
pub use planner::plan;
pub use resolve::{REFERENCES_HEADER, ReferenceTable, resolve};
pub use retrieval::{HttpRetrievalClient, Retrieved, RetrievalClient};
pub use synthesize::synthesize;
