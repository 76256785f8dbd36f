//! Deterministic citation-marker resolution.
//!
//! Scans a report left to right for `[Q #...]` markers, maps each one to the
//! source files named by the per-question evidence logs, rewrites it as a
//! bracketed list of reference numbers, and appends a numbered bibliography.
//! Implemented as an explicit fold over matches so the whole pass is a pure
//! function of `(report_text, completed_qa, evidence logs)`.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::citation::parse_marker;
use crate::evidence::EvidenceStore;
use crate::iteration::QaPair;

/// Fixed marker line heading the rendered bibliography.
pub const REFERENCES_HEADER: &str = "References";

// A candidate marker is a bracketed span whose first token is `Q #`.
// Rewritten output (`[3]`, `[1, 4]`) can never re-match, which is what makes
// a second resolution pass a no-op.
static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*Q\s*#[^\[\]]*\]").expect("invalid citation marker regex"));

/// Stable first-seen numbering of source files across one resolution pass.
/// Append-only; a number is never reassigned or reused for a different file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTable {
    files: Vec<String>,
    index: HashMap<String, usize>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number for a file, assigning the next one on first sight.
    fn assign(&mut self, file: &str) -> usize {
        if let Some(&number) = self.index.get(file) {
            return number;
        }
        self.files.push(file.to_string());
        let number = self.files.len();
        self.index.insert(file.to_string(), number);
        number
    }

    pub fn number_of(&self, file: &str) -> Option<usize> {
        self.index.get(file).copied()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Entries in ascending number order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str)> {
        self.files
            .iter()
            .enumerate()
            .map(|(idx, file)| (idx + 1, file.as_str()))
    }
}

/// Resolve every citation marker in `report_text` against the evidence logs
/// recorded in `completed_qa`, returning the rewritten report and the
/// reference table behind its bibliography.
///
/// Markers that resolve to zero file names are left unchanged and consume no
/// reference number. Running the pass twice over the same inputs yields
/// byte-identical output.
pub fn resolve(report_text: &str, completed_qa: &[QaPair]) -> (String, ReferenceTable) {
    let mut store = EvidenceStore::new();
    let mut table = ReferenceTable::new();
    let mut output = String::with_capacity(report_text.len());
    let mut cursor = 0;

    for found in MARKER.find_iter(report_text) {
        output.push_str(&report_text[cursor..found.start()]);
        cursor = found.end();

        let body = &report_text[found.start() + 1..found.end() - 1];
        let files = marker_file_names(body, completed_qa, &mut store);

        if files.is_empty() {
            warn!(marker = found.as_str(), "citation marker resolved to no sources; left unchanged");
            output.push_str(found.as_str());
            continue;
        }

        // New files are numbered in sorted name order within the marker so a
        // marker touching several unseen files is still deterministic.
        let mut numbers: Vec<usize> = files.iter().map(|file| table.assign(file)).collect();
        numbers.sort_unstable();
        numbers.dedup();

        output.push('[');
        for (idx, number) in numbers.iter().enumerate() {
            if idx > 0 {
                output.push_str(", ");
            }
            output.push_str(&number.to_string());
        }
        output.push(']');
    }
    output.push_str(&report_text[cursor..]);

    if !table.is_empty() {
        output.push_str("\n\n");
        output.push_str(REFERENCES_HEADER);
        output.push('\n');
        for (number, file) in table.entries() {
            output.push_str(&format!("[{number}] {file}\n"));
        }
    }

    (output, table)
}

/// Union of all source files attributable to one marker, sorted by name.
fn marker_file_names(
    body: &str,
    completed_qa: &[QaPair],
    store: &mut EvidenceStore,
) -> BTreeSet<String> {
    let mut files = BTreeSet::new();

    for reference in parse_marker(body) {
        let Some(pair) = reference
            .question_index
            .checked_sub(1)
            .and_then(|idx| completed_qa.get(idx))
        else {
            warn!(
                question_index = reference.question_index,
                "citation references a question with no recorded answer"
            );
            continue;
        };

        files.extend(store.resolve_file_names(
            reference.question_index,
            &pair.evidence_log_path,
            reference.category,
            &reference.ids,
        ));
    }

    files
}
