//! Validation and repair of oracle answers against the vocabulary.
//!
//! The oracle regularly returns an id and label that disagree: a guessed id
//! next to a correct label, a synonym instead of the preferred label, or a
//! label with a typo. The validator classifies the pair and, when one half is
//! trustworthy, repairs the other from the vocabulary.

use crate::vocab::VocabularyStore;

/// Why a pair did or did not validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStatus {
    /// The label is the id's canonical label.
    Valid,
    /// The label is a synonym owned by the id's term.
    ValidViaSynonym,
    IdNotFound,
    LabelNotFound,
    /// Both exist but belong to different terms.
    Mismatch {
        /// The term the label actually names.
        canonical_id: String,
        canonical_label: String,
    },
}

/// Result of checking an id/label pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub message: String,
    pub status: ValidationStatus,
}

impl ValidationOutcome {
    fn new(status: ValidationStatus, message: String) -> Self {
        Self {
            is_valid: matches!(
                status,
                ValidationStatus::Valid | ValidationStatus::ValidViaSynonym
            ),
            message,
            status,
        }
    }
}

/// Checks id/label pairs against a read-only [`VocabularyStore`].
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    store: &'a VocabularyStore,
}

impl<'a> Validator<'a> {
    pub fn new(store: &'a VocabularyStore) -> Self {
        Self { store }
    }

    /// Check that `id` exists, `label` exists (directly or as a synonym), and
    /// that both name the same term.
    pub fn validate(&self, id: &str, label: &str) -> ValidationOutcome {
        if !self.store.exists_id(id) {
            return ValidationOutcome::new(
                ValidationStatus::IdNotFound,
                format!("id not found: '{id}' is not an active vocabulary term"),
            );
        }
        if !self.store.exists_label(label) {
            return ValidationOutcome::new(
                ValidationStatus::LabelNotFound,
                format!("label not found: '{label}' is not a known label"),
            );
        }

        let expected = self.store.label_for_id(id).unwrap_or_default();
        if expected == label {
            return ValidationOutcome::new(ValidationStatus::Valid, "valid match".into());
        }

        if let Some(owner) = self.store.term_for_synonym(label) {
            if owner.id == id {
                return ValidationOutcome::new(
                    ValidationStatus::ValidViaSynonym,
                    "valid match (via synonym)".into(),
                );
            }
        }

        let (canonical_label, canonical_id) = self.store.normalize(label);
        let canonical_label = canonical_label.unwrap_or(label).to_string();
        let canonical_id = canonical_id.unwrap_or_default().to_string();
        ValidationOutcome::new(
            ValidationStatus::Mismatch {
                canonical_id: canonical_id.clone(),
                canonical_label: canonical_label.clone(),
            },
            format!(
                "id/label mismatch: '{id}' has label '{expected}', \
                 but '{label}' belongs to '{canonical_label}' ({canonical_id})"
            ),
        )
    }

    /// Repair a pair: trust a valid id and take its canonical label, else
    /// trust a valid label (or synonym) and take its canonical id, else
    /// return the pair unchanged.
    pub fn fix(&self, id: &str, label: &str) -> (String, String) {
        if let Some(canonical) = self.store.label_for_id(id) {
            return (id.to_string(), canonical.to_string());
        }
        if let (Some(canonical_label), Some(canonical_id)) = self.store.normalize(label) {
            return (canonical_id.to_string(), canonical_label.to_string());
        }
        (id.to_string(), label.to_string())
    }

    /// Canonical `(id, label)` owning `label` when it is a known preferred
    /// label or synonym.
    pub fn normalize(&self, label: &str) -> Option<(String, String)> {
        match self.store.normalize(label) {
            (Some(canonical_label), Some(canonical_id)) => {
                Some((canonical_id.to_string(), canonical_label.to_string()))
            }
            _ => None,
        }
    }

    /// Canonical `(id, label)` for a pair that validated.
    pub fn canonicalize(&self, id: &str, label: &str) -> (String, String) {
        match self.store.label_for_id(id) {
            Some(canonical) => (id.to_string(), canonical.to_string()),
            None => (id.to_string(), label.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{VocabularyOptions, VocabularyTerm};

    fn store(use_synonyms: bool) -> VocabularyStore {
        VocabularyStore::from_terms(
            vec![
                VocabularyTerm::new("T1", "Gene expression").with_synonyms(["GEX"]),
                VocabularyTerm::new("T2", "Proteomics").with_synonyms(["Protein science"]),
                VocabularyTerm::new("T3", "Retired").obsolete(true),
            ],
            &VocabularyOptions {
                use_synonyms,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn every_active_term_round_trips() {
        let store = store(true);
        let validator = Validator::new(&store);
        for term in store.active_terms() {
            let outcome = validator.validate(&term.id, &term.preferred_label);
            assert!(outcome.is_valid, "{}", outcome.message);
            assert_eq!(
                validator.fix(&term.id, "wrong label"),
                (term.id.clone(), term.preferred_label.clone())
            );
        }
    }

    #[test]
    fn unknown_id_fails_first() {
        let store = store(false);
        let outcome = Validator::new(&store).validate("T9", "Also unknown");
        assert!(!outcome.is_valid);
        assert_eq!(outcome.status, ValidationStatus::IdNotFound);
        assert!(outcome.message.starts_with("id not found"));
    }

    #[test]
    fn obsolete_id_is_not_found() {
        let store = store(false);
        let outcome = Validator::new(&store).validate("T3", "Retired");
        assert_eq!(outcome.status, ValidationStatus::IdNotFound);
    }

    #[test]
    fn unknown_label_fails() {
        let store = store(false);
        let outcome = Validator::new(&store).validate("T1", "Totally Wrong Label");
        assert!(!outcome.is_valid);
        assert_eq!(outcome.status, ValidationStatus::LabelNotFound);
    }

    #[test]
    fn mismatch_names_the_conflicting_pair() {
        let store = store(false);
        let outcome = Validator::new(&store).validate("T1", "Proteomics");
        assert!(!outcome.is_valid);
        assert_eq!(
            outcome.status,
            ValidationStatus::Mismatch {
                canonical_id: "T2".into(),
                canonical_label: "Proteomics".into(),
            }
        );
        assert!(outcome.message.contains("id/label mismatch"));
        assert!(outcome.message.contains("Gene expression"));
    }

    #[test]
    fn synonym_validates_only_when_enabled() {
        let on = store(true);
        let outcome = Validator::new(&on).validate("T1", "GEX");
        assert_eq!(outcome.status, ValidationStatus::ValidViaSynonym);
        assert!(outcome.is_valid);

        let off = store(false);
        let outcome = Validator::new(&off).validate("T1", "GEX");
        assert_eq!(outcome.status, ValidationStatus::LabelNotFound);
    }

    #[test]
    fn synonym_of_another_term_is_a_mismatch() {
        let store = store(true);
        let outcome = Validator::new(&store).validate("T1", "Protein science");
        assert!(matches!(
            outcome.status,
            ValidationStatus::Mismatch { ref canonical_id, .. } if canonical_id == "T2"
        ));
    }

    #[test]
    fn fix_prefers_id_then_label() {
        let store = store(true);
        let validator = Validator::new(&store);
        assert_eq!(
            validator.fix("T1", "Totally Wrong Label"),
            ("T1".to_string(), "Gene expression".to_string())
        );
        assert_eq!(
            validator.fix("http://guessed/topic_9999", "Proteomics"),
            ("T2".to_string(), "Proteomics".to_string())
        );
        assert_eq!(
            validator.fix("bogus", "GEX"),
            ("T1".to_string(), "Gene expression".to_string())
        );
        assert_eq!(
            validator.fix("bogus", "nothing"),
            ("bogus".to_string(), "nothing".to_string())
        );
    }

    #[test]
    fn wrong_label_is_repaired_and_revalidates() {
        let store = store(false);
        let validator = Validator::new(&store);
        assert!(!validator.validate("T1", "Totally Wrong Label").is_valid);
        let (id, label) = validator.fix("T1", "Totally Wrong Label");
        assert_eq!(label, "Gene expression");
        assert!(validator.validate(&id, &label).is_valid);
    }
}
