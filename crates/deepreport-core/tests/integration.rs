//! End-to-end run of the research agent against scripted collaborators and
//! evidence logs on disk.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deepreport_core::{
    DeepReportError, FALLBACK_ANSWER, LlmClient, PlannerConfig, REFERENCES_HEADER, ResearchAgent,
    Retrieved, RetrievalClient, resolve,
};
use tempfile::TempDir;

struct ScriptedLlm {
    responses: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(responses: &[&str]) -> Self {
        let mut responses: Vec<String> = responses.iter().map(|r| r.to_string()).collect();
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

/// Writes one evidence log per question into a shared directory.
struct LoggingRetrieval {
    dir: PathBuf,
    calls: Mutex<usize>,
}

#[async_trait]
impl RetrievalClient for LoggingRetrieval {
    async fn lookup(&self, question: &str) -> Result<Retrieved, DeepReportError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        let index = *calls;

        let log_path = self.dir.join(format!("evidence_{index}.json"));
        let log = format!(
            r#"{{
                "entities": [{{"id": "1", "source_file": "report_{index}.txt"}}],
                "text_units": [{{"id": "2", "source_file": "chunks_{index}.txt; shared.txt"}}]
            }}"#
        );
        std::fs::write(&log_path, log).expect("write evidence log");

        Ok(Retrieved {
            answer: format!("Findings for \"{question}\" (entity #1, chunk #2)."),
            evidence_log_path: log_path.display().to_string(),
        })
    }
}

#[tokio::test]
async fn full_run_resolves_citations_into_a_bibliography() {
    let dir = TempDir::new().expect("temp dir");

    let raw_report = "Output grew strongly [Q #1, E #1]. Exports followed \
[Q #1, DC #2; Q #2, DC #2]. Unverified claim [Q #2, E #9].";

    let llm = Arc::new(ScriptedLlm::new(&[
        // Planner: two initial questions.
        r#"["How did output develop?", "How did exports develop?"]"#,
        // Reflection after question 1: keep the queue as-is.
        r#"["How did exports develop?"]"#,
        // Reflection after question 2: done.
        "[]",
        // Synthesis.
        raw_report,
    ]));
    let retrieval = Arc::new(LoggingRetrieval {
        dir: dir.path().to_path_buf(),
        calls: Mutex::new(0),
    });

    let planner = PlannerConfig {
        initial_questions: 2,
        max_additional_questions: 2,
    };
    let agent = ResearchAgent::new(llm, retrieval, &planner);

    let report = agent.run("regional manufacturing trends").await.unwrap();

    assert_eq!(report.completed_qa.len(), 2);
    assert_eq!(report.raw_report, raw_report);

    // Markers resolved in order of appearance; the unverifiable one is kept.
    assert!(report.resolved_report.starts_with("Output grew strongly [1]."));
    assert!(report.resolved_report.contains("Unverified claim [Q #2, E #9]."));
    assert!(report.resolved_report.contains(REFERENCES_HEADER));
    assert!(report.resolved_report.contains("[1] report_1.txt"));

    // The second marker unions Q1 and Q2 chunk attributions; new files are
    // numbered in sorted name order and shared.txt appears exactly once.
    assert!(report.resolved_report.contains("Exports followed [2, 3, 4]."));
    assert_eq!(report.references.number_of("chunks_1.txt"), Some(2));
    assert_eq!(report.references.number_of("chunks_2.txt"), Some(3));
    assert_eq!(report.references.number_of("shared.txt"), Some(4));
    assert_eq!(report.references.len(), 4);

    // Re-running the resolver over its own output changes nothing.
    let (again, delta) = resolve(&report.resolved_report, &report.completed_qa);
    assert_eq!(again, report.resolved_report);
    assert!(delta.is_empty());
}

struct UnreachableRetrieval;

#[async_trait]
impl RetrievalClient for UnreachableRetrieval {
    async fn lookup(&self, _: &str) -> Result<Retrieved, DeepReportError> {
        Err(DeepReportError::Planning("backend offline".into()))
    }
}

#[tokio::test]
async fn failed_retrieval_still_produces_a_report() {
    let llm = Arc::new(ScriptedLlm::new(&[
        r#"["Only question?"]"#,
        "[]",
        "A best-effort report with no citations.",
    ]));

    let planner = PlannerConfig {
        initial_questions: 1,
        max_additional_questions: 0,
    };
    let agent = ResearchAgent::new(llm, Arc::new(UnreachableRetrieval), &planner);

    let report = agent.run("anything").await.unwrap();
    assert_eq!(report.completed_qa[0].answer, FALLBACK_ANSWER);
    assert_eq!(report.resolved_report, "A best-effort report with no citations.");
    assert!(report.references.is_empty());
}

#[tokio::test]
async fn planner_failure_aborts_the_run() {
    let llm = Arc::new(ScriptedLlm::new(&["I refuse to plan."]));
    let planner = PlannerConfig {
        initial_questions: 3,
        max_additional_questions: 2,
    };
    let agent = ResearchAgent::new(llm, Arc::new(UnreachableRetrieval), &planner);

    let err = agent.run("anything").await.unwrap_err();
    assert!(matches!(err, DeepReportError::Planning(_)));
}
