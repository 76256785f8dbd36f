//! Report synthesis: one prompt embedding every QA pair, with explicit
//! formatting rules for inline citation markers. Returns the raw model
//! output unmodified; citation resolution is a separate deterministic pass.

use crate::error::DeepReportError;
use crate::iteration::QaPair;
use crate::llm::LlmClient;

const SYNTHESIS_SYSTEM_PROMPT: &str = "You are a professional report writer. Using the \
    original topic and a series of research question/answer pairs, write a well-structured, \
    rigorous, and detailed final research report.";

pub async fn synthesize(
    llm: &dyn LlmClient,
    topic: &str,
    completed_qa: &[QaPair],
) -> Result<String, DeepReportError> {
    if completed_qa.is_empty() {
        return Err(DeepReportError::Synthesis(
            "no research material collected; cannot write a report".into(),
        ));
    }

    let material = completed_qa
        .iter()
        .enumerate()
        .map(|(idx, pair)| {
            format!(
                "**Question {}:** {}\n\n**Answer:** {}",
                idx + 1,
                pair.question,
                pair.answer
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let user_prompt = format!(
        "Original research topic: {topic}\n\n\
         Write the report from the following research material:\n\n{material}\n\n\
         Requirements:\n\
         1. The report must contain an introduction, a main body, and a conclusion.\n\
         2. Organize the body into logically ordered chapters, each with 2-4 subsections \
            depending on how much material is available.\n\
         3. Each subsection should consist of one or two substantial, flowing paragraphs; \
            avoid long bullet lists.\n\
         4. Anchor statements in time wherever the material allows, for example \"in March 2024\".\n\
         5. Output the report body directly, with no extra commentary.\n\
         6. After each sentence that draws on the research material, add a citation marker that \
            names the question it came from and the supporting evidence ids from that answer: \
            [Q #n, E #id] for entities, [Q #n, R #id] for relations, and [Q #n, DC #id] for \
            document chunks, where n is the question number above. Several ids may follow one \
            category, as in [Q #1, DC #3 #5], and several questions may be joined with \
            semicolons, as in [Q #1, DC #3; Q #2, E #4]. Do not invent ids, and do not list \
            references at the end of the report; the bibliography is compiled automatically."
    );

    llm.complete(SYNTHESIS_SYSTEM_PROMPT, &user_prompt).await
}
