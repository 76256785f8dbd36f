//! Parser for the inline citation mini-grammar.
//!
//! One marker body (the text between `[` and `]`) consists of
//! semicolon-separated groups. Each group opens with `Q #<n>` naming a
//! 1-based question index, followed by comma-separated parts of the form
//! `<category> #<id> [#<id> ...]` where a category is one of `E`, `R`, `DC`
//! and an id token may be an inclusive range (`#14-16`). Question context
//! never crosses a `;` boundary.
//!
//! The parser is infallible: malformed tokens are skipped and the worst case
//! is an empty reference set, which leaves the marker visible in the output.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::evidence::EvidenceCategory;

/// The parsed form of one `category #id...` token within one `Q #n` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationReference {
    pub question_index: usize,
    pub category: EvidenceCategory,
    pub ids: BTreeSet<String>,
}

static QUESTION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Q\s*#\s*(\d+)$").expect("invalid question token regex"));

static CATEGORY_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(E|R|DC)\s*#\s*(.+)$").expect("invalid category part regex"));

static RANGE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*-\s*(\d+)$").expect("invalid range token regex"));

/// Parse one marker body into zero or more references.
pub fn parse_marker(body: &str) -> Vec<CitationReference> {
    let mut references = Vec::new();

    for group in body.split(';') {
        let mut question: Option<usize> = None;

        for segment in group.split(',') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            if let Some(caps) = QUESTION_TOKEN.captures(segment) {
                question = caps[1].parse().ok();
                continue;
            }

            let Some(question_index) = question else {
                debug!(segment, "citation part has no question context; skipping");
                continue;
            };

            let Some((category, ids)) = parse_part(segment) else {
                debug!(segment, "unrecognized citation part; skipping");
                continue;
            };
            if ids.is_empty() {
                continue;
            }

            references.push(CitationReference {
                question_index,
                category,
                ids,
            });
        }
    }

    references
}

fn parse_part(segment: &str) -> Option<(EvidenceCategory, BTreeSet<String>)> {
    let caps = CATEGORY_PART.captures(segment)?;
    let category = EvidenceCategory::from_code(&caps[1])?;

    let mut ids = BTreeSet::new();
    for token in caps[2].split('#') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        expand_id_token(token, &mut ids);
    }

    Some((category, ids))
}

/// Expand `14-16` to the closed interval; anything else is kept verbatim as
/// a single literal id.
fn expand_id_token(token: &str, ids: &mut BTreeSet<String>) {
    if let Some(caps) = RANGE_TOKEN.captures(token) {
        if let (Ok(low), Ok(high)) = (caps[1].parse::<u64>(), caps[2].parse::<u64>()) {
            if low <= high {
                for id in low..=high {
                    ids.insert(id.to_string());
                }
                return;
            }
        }
    }
    ids.insert(token.to_string());
}
