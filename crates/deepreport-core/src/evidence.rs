//! Per-question evidence logs produced by the retrieval backend.
//!
//! A log maps evidence categories to items carrying an id and a source-file
//! attribution. Logs are loaded lazily, cached per question index for the
//! duration of one resolution pass, and read-only once loaded. A missing or
//! unparsable log degrades to "no evidence resolvable for this question".

use std::collections::{BTreeSet, HashMap};
use std::fs;

use serde::Deserialize;
use tracing::warn;

/// Evidence category referenced by a citation marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvidenceCategory {
    Entity,
    Relation,
    TextUnit,
}

impl EvidenceCategory {
    /// Marker codes are case-sensitive and fixed.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "E" => Some(Self::Entity),
            "R" => Some(Self::Relation),
            "DC" => Some(Self::TextUnit),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Entity => "E",
            Self::Relation => "R",
            Self::TextUnit => "DC",
        }
    }

    pub fn log_key(&self) -> &'static str {
        match self {
            Self::Entity => "entities",
            Self::Relation => "relations",
            Self::TextUnit => "text_units",
        }
    }
}

/// One piece of evidence. `source_file` may be a `;`-separated list of file
/// names, all of which are attributed.
#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceItem {
    pub id: String,
    pub source_file: String,
}

/// The structured log for one answered question.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvidenceLog {
    #[serde(default)]
    entities: Vec<EvidenceItem>,
    #[serde(default)]
    relations: Vec<EvidenceItem>,
    #[serde(default)]
    text_units: Vec<EvidenceItem>,
}

impl EvidenceLog {
    pub fn items(&self, category: EvidenceCategory) -> &[EvidenceItem] {
        match category {
            EvidenceCategory::Entity => &self.entities,
            EvidenceCategory::Relation => &self.relations,
            EvidenceCategory::TextUnit => &self.text_units,
        }
    }
}

/// Cache of evidence logs keyed by 1-based question index, scoped to one
/// resolution pass.
#[derive(Debug, Default)]
pub struct EvidenceStore {
    cache: HashMap<usize, Option<EvidenceLog>>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the log for a question, reading the file at most once per pass.
    /// `None` means "zero evidence available", never a fatal condition.
    pub fn load(&mut self, question_index: usize, path: &str) -> Option<&EvidenceLog> {
        self.cache
            .entry(question_index)
            .or_insert_with(|| read_log(question_index, path))
            .as_ref()
    }

    /// Collect the source-file names attributed to the given ids within one
    /// category. Unmatched ids contribute nothing.
    pub fn resolve_file_names(
        &mut self,
        question_index: usize,
        path: &str,
        category: EvidenceCategory,
        ids: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let mut files = BTreeSet::new();
        let Some(log) = self.load(question_index, path) else {
            return files;
        };

        for item in log.items(category) {
            if !ids.contains(&item.id) {
                continue;
            }
            for name in item.source_file.split(';') {
                let name = name.trim();
                if !name.is_empty() {
                    files.insert(name.to_string());
                }
            }
        }
        files
    }
}

fn read_log(question_index: usize, path: &str) -> Option<EvidenceLog> {
    if path.trim().is_empty() {
        warn!(question_index, "no evidence log recorded for question");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(question_index, path, error = %err, "failed to read evidence log");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(log) => Some(log),
        Err(err) => {
            warn!(question_index, path, error = %err, "failed to parse evidence log");
            None
        }
    }
}
