//! Vocabulary term model.

use serde::{Deserialize, Serialize};

/// Top-level branch of the ontology a term belongs to.
///
/// Derived from the identifier: EDAM ids end in `topic_NNNN`,
/// `operation_NNNN`, `data_NNNN` or `format_NNNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermCategory {
    Topic,
    Operation,
    Data,
    Format,
    Other,
}

impl TermCategory {
    /// Classify an identifier by its final path segment.
    pub fn from_id(id: &str) -> Self {
        let segment = id.rsplit(['/', '#']).next().unwrap_or(id);
        if segment.starts_with("topic_") {
            Self::Topic
        } else if segment.starts_with("operation_") {
            Self::Operation
        } else if segment.starts_with("data_") {
            Self::Data
        } else if segment.starts_with("format_") {
            Self::Format
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Operation => "operation",
            Self::Data => "data",
            Self::Format => "format",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for TermCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the controlled vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyTerm {
    /// Globally unique, URI-shaped identifier.
    pub id: String,
    /// Canonical label.
    pub preferred_label: String,
    /// Free-text definition, if the source has one.
    pub definition: Option<String>,
    /// Alternative labels in source order.
    pub synonyms: Vec<String>,
    pub category: TermCategory,
    pub obsolete: bool,
}

impl VocabularyTerm {
    /// Build a term, deriving the category from the id.
    pub fn new(id: impl Into<String>, preferred_label: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            category: TermCategory::from_id(&id),
            id,
            preferred_label: preferred_label.into(),
            definition: None,
            synonyms: Vec::new(),
            obsolete: false,
        }
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        let definition = definition.into();
        self.definition = (!definition.trim().is_empty()).then_some(definition);
        self
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }

    pub fn obsolete(mut self, obsolete: bool) -> Self {
        self.obsolete = obsolete;
        self
    }

    /// Text used for lexical relevance: label, definition and synonyms.
    pub fn search_text(&self) -> String {
        let mut text = self.preferred_label.clone();
        if let Some(def) = &self.definition {
            text.push(' ');
            text.push_str(def);
        }
        for syn in &self.synonyms {
            text.push(' ');
            text.push_str(syn);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_from_edam_ids() {
        assert_eq!(
            TermCategory::from_id("http://edamontology.org/topic_0080"),
            TermCategory::Topic
        );
        assert_eq!(
            TermCategory::from_id("http://edamontology.org/operation_2945"),
            TermCategory::Operation
        );
        assert_eq!(
            TermCategory::from_id("http://edamontology.org/data_0006"),
            TermCategory::Data
        );
        assert_eq!(
            TermCategory::from_id("http://edamontology.org/format_1915"),
            TermCategory::Format
        );
        assert_eq!(TermCategory::from_id("T1"), TermCategory::Other);
        assert_eq!(TermCategory::from_id("topic_3365"), TermCategory::Topic);
    }

    #[test]
    fn blank_definition_is_none() {
        let term = VocabularyTerm::new("T1", "Gene expression").with_definition("   ");
        assert!(term.definition.is_none());
    }

    #[test]
    fn search_text_includes_synonyms() {
        let term = VocabularyTerm::new("T1", "Gene expression")
            .with_definition("Study of transcription.")
            .with_synonyms(["GEX"]);
        assert_eq!(term.search_text(), "Gene expression Study of transcription. GEX");
    }
}
