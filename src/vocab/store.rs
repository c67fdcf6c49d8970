//! In-memory vocabulary indexed by id, label and synonym.
//!
//! The store is loaded once at startup and is read-only afterwards, so it is
//! shared by reference between the ranker, chunker, validator and matcher.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{VocabError, VocabResult};
use super::term::{TermCategory, VocabularyTerm};

/// How to resolve a synonym string claimed by more than one term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SynonymCollisionPolicy {
    /// The term that appears first in the source owns the synonym.
    #[default]
    FirstWins,
    /// The term that appears last in the source owns the synonym.
    LastWins,
    /// Ambiguous synonyms are left out of the index entirely.
    Reject,
}

/// Options that shape how the vocabulary is indexed.
#[derive(Debug, Clone, Copy, Default)]
pub struct VocabularyOptions {
    /// Index synonyms for lookup and validation.
    pub use_synonyms: bool,
    pub collisions: SynonymCollisionPolicy,
}

/// Column name candidates, matched case-insensitively against the header.
const ID_COLUMNS: &[&str] = &["class id", "id"];
const LABEL_COLUMNS: &[&str] = &["preferred label", "label"];
const SYNONYM_COLUMNS: &[&str] = &["synonyms", "synonym"];
const DEFINITION_COLUMNS: &[&str] = &["definitions", "definition"];
const OBSOLETE_COLUMNS: &[&str] = &["obsolete"];

/// The authoritative controlled vocabulary.
#[derive(Debug)]
pub struct VocabularyStore {
    /// Every row with an id and label, obsolete ones included, in source order.
    terms: Vec<VocabularyTerm>,
    /// Indexes into `terms` of the non-obsolete terms, in source order.
    active: Vec<usize>,
    by_id: HashMap<String, usize>,
    by_label: HashMap<String, usize>,
    by_synonym: HashMap<String, usize>,
    /// Id index over the full table, obsolete terms included.
    all_by_id: HashMap<String, usize>,
    ambiguous: Vec<String>,
    use_synonyms: bool,
}

impl VocabularyStore {
    /// Load a vocabulary CSV from disk.
    pub fn load(path: &Path, options: &VocabularyOptions) -> VocabResult<Self> {
        if !path.exists() {
            return Err(VocabError::NotFound {
                path: path.display().to_string(),
            });
        }
        let file = std::fs::File::open(path).map_err(|e| VocabError::Io {
            origin: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file, &path.display().to_string(), options)
    }

    /// Load a vocabulary CSV from any reader. `origin` names the source in
    /// diagnostics.
    pub fn from_reader<R: Read>(
        reader: R,
        origin: &str,
        options: &VocabularyOptions,
    ) -> VocabResult<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Fields)
            .from_reader(reader);

        let headers = csv
            .headers()
            .map_err(|e| VocabError::Malformed {
                origin: origin.to_string(),
                message: e.to_string(),
            })?
            .clone();

        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let id_col = find(ID_COLUMNS).ok_or_else(|| VocabError::MissingColumn {
            column: "Class ID".into(),
        })?;
        let label_col = find(LABEL_COLUMNS).ok_or_else(|| VocabError::MissingColumn {
            column: "Preferred Label".into(),
        })?;
        let synonym_col = find(SYNONYM_COLUMNS);
        let definition_col = find(DEFINITION_COLUMNS);
        let obsolete_col = find(OBSOLETE_COLUMNS);

        let mut terms = Vec::new();
        for (row, record) in csv.records().enumerate() {
            let record = record.map_err(|e| VocabError::Malformed {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;
            let field = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or("");

            let id = field(Some(id_col));
            let label = field(Some(label_col));
            if id.is_empty() || label.is_empty() {
                tracing::debug!(row = row + 2, "skipping vocabulary row without id or label");
                continue;
            }

            let synonyms = field(synonym_col)
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();

            terms.push(
                VocabularyTerm::new(id, label)
                    .with_definition(field(definition_col))
                    .with_synonyms(synonyms)
                    .obsolete(parse_flag(field(obsolete_col))),
            );
        }

        if terms.iter().all(|t| t.obsolete) {
            return Err(VocabError::Empty {
                origin: origin.to_string(),
            });
        }
        Self::from_terms(terms, options)
    }

    /// Build a store from already-parsed terms.
    pub fn from_terms(terms: Vec<VocabularyTerm>, options: &VocabularyOptions) -> VocabResult<Self> {
        let mut store = Self {
            terms,
            active: Vec::new(),
            by_id: HashMap::new(),
            by_label: HashMap::new(),
            by_synonym: HashMap::new(),
            all_by_id: HashMap::new(),
            ambiguous: Vec::new(),
            use_synonyms: options.use_synonyms,
        };

        for (idx, term) in store.terms.iter().enumerate() {
            store.all_by_id.entry(term.id.clone()).or_insert(idx);
            if term.obsolete {
                continue;
            }
            if store.by_id.insert(term.id.clone(), idx).is_some() {
                return Err(VocabError::DuplicateId {
                    id: term.id.clone(),
                });
            }
            if let Some(&owner) = store.by_label.get(&term.preferred_label) {
                tracing::warn!(
                    label = %term.preferred_label,
                    kept = %store.terms[owner].id,
                    ignored = %term.id,
                    "duplicate preferred label among active terms"
                );
            } else {
                store.by_label.insert(term.preferred_label.clone(), idx);
            }
            store.active.push(idx);
        }

        if store.active.is_empty() {
            return Err(VocabError::Empty {
                origin: "term list".into(),
            });
        }

        if options.use_synonyms {
            store.index_synonyms(options.collisions);
        }

        tracing::info!(
            terms = store.terms.len(),
            active = store.active.len(),
            labels = store.by_label.len(),
            synonyms = store.by_synonym.len(),
            use_synonyms = store.use_synonyms,
            "vocabulary loaded"
        );
        Ok(store)
    }

    fn index_synonyms(&mut self, policy: SynonymCollisionPolicy) {
        let mut claims: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for &idx in &self.active {
            for syn in &self.terms[idx].synonyms {
                // A canonical label always resolves through the label index.
                if self.by_label.contains_key(syn) {
                    continue;
                }
                let owners = claims.entry(syn.as_str()).or_insert_with(|| {
                    order.push(syn.as_str());
                    Vec::new()
                });
                if !owners.contains(&idx) {
                    owners.push(idx);
                }
            }
        }

        let mut by_synonym = HashMap::new();
        let mut ambiguous = Vec::new();
        for syn in order {
            let owners = &claims[syn];
            let winner = if owners.len() == 1 {
                Some(owners[0])
            } else {
                let ids: Vec<&str> = owners.iter().map(|&i| self.terms[i].id.as_str()).collect();
                tracing::warn!(synonym = syn, ?ids, ?policy, "synonym shared by several terms");
                ambiguous.push(syn.to_string());
                match policy {
                    SynonymCollisionPolicy::FirstWins => owners.first().copied(),
                    SynonymCollisionPolicy::LastWins => owners.last().copied(),
                    SynonymCollisionPolicy::Reject => None,
                }
            };
            if let Some(idx) = winner {
                by_synonym.insert(syn.to_string(), idx);
            }
        }
        self.by_synonym = by_synonym;
        self.ambiguous = ambiguous;
    }

    /// Whether synonyms take part in lookup and validation.
    pub fn use_synonyms(&self) -> bool {
        self.use_synonyms
    }

    /// Whether `id` names an active term.
    pub fn exists_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Whether `label` is an active preferred label, or an indexed synonym
    /// when synonym support is on.
    pub fn exists_label(&self, label: &str) -> bool {
        self.by_label.contains_key(label) || self.by_synonym.contains_key(label)
    }

    /// Canonical label of an active term.
    pub fn label_for_id(&self, id: &str) -> Option<&str> {
        self.get(id).map(|t| t.preferred_label.as_str())
    }

    /// Id of the active term whose preferred label is exactly `label`.
    pub fn id_for_label(&self, label: &str) -> Option<&str> {
        self.by_label
            .get(label)
            .map(|&idx| self.terms[idx].id.as_str())
    }

    /// Term owning an indexed synonym.
    pub fn term_for_synonym(&self, synonym: &str) -> Option<&VocabularyTerm> {
        self.by_synonym.get(synonym).map(|&idx| &self.terms[idx])
    }

    /// Resolve a label or synonym to its canonical `(label, id)` pair.
    pub fn normalize(&self, label_or_synonym: &str) -> (Option<&str>, Option<&str>) {
        let idx = self
            .by_label
            .get(label_or_synonym)
            .or_else(|| self.by_synonym.get(label_or_synonym));
        match idx {
            Some(&idx) => {
                let term = &self.terms[idx];
                (Some(term.preferred_label.as_str()), Some(term.id.as_str()))
            }
            None => (None, None),
        }
    }

    /// Active term by id.
    pub fn get(&self, id: &str) -> Option<&VocabularyTerm> {
        self.by_id.get(id).map(|&idx| &self.terms[idx])
    }

    /// Any term by id, obsolete ones included.
    pub fn lookup_any(&self, id: &str) -> Option<&VocabularyTerm> {
        self.all_by_id.get(id).map(|&idx| &self.terms[idx])
    }

    /// Active terms in vocabulary order.
    pub fn active_terms(&self) -> impl Iterator<Item = &VocabularyTerm> + '_ {
        self.active.iter().map(|&idx| &self.terms[idx])
    }

    /// Number of active terms.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Number of terms in the full table.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of synonyms in the index (zero when synonyms are off).
    pub fn synonym_count(&self) -> usize {
        self.by_synonym.len()
    }

    /// Synonyms claimed by more than one term, in first-seen order.
    pub fn ambiguous_synonyms(&self) -> &[String] {
        &self.ambiguous
    }

    /// A category-balanced sample of up to `n` active terms, drawn
    /// round-robin from the Topic, Operation and Data branches in vocabulary
    /// order, topped up from the remaining active terms when those run short.
    pub fn default_sample(&self, n: usize) -> Vec<&VocabularyTerm> {
        const BRANCHES: [TermCategory; 3] = [
            TermCategory::Topic,
            TermCategory::Operation,
            TermCategory::Data,
        ];
        let mut pools: Vec<Vec<&VocabularyTerm>> = BRANCHES
            .iter()
            .map(|cat| {
                self.active_terms()
                    .filter(|t| t.category == *cat)
                    .take(n)
                    .collect::<Vec<_>>()
            })
            .collect();
        for pool in &mut pools {
            pool.reverse();
        }

        let mut sample = Vec::with_capacity(n);
        while sample.len() < n {
            let mut progressed = false;
            for pool in &mut pools {
                if sample.len() == n {
                    break;
                }
                if let Some(term) = pool.pop() {
                    sample.push(term);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        // Vocabularies without Topic/Operation/Data ids still get a sample.
        if sample.len() < n {
            let rest: Vec<_> = self
                .active_terms()
                .filter(|t| !BRANCHES.contains(&t.category))
                .take(n - sample.len())
                .collect();
            sample.extend(rest);
        }
        sample
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y"
    )
}
