pub mod change;
pub mod history;

use std::sync;

use crate::model::span::Span;
use crate::model::versioned;
use crate::model::versioned::Versioned;

/// An immutable snapshot of a text document at one generation.
#[derive(Clone)]
pub struct Document {
    text: sync::Arc<str>,
    version: versioned::Version,
}

pub type DocumentHost = versioned::Host<Document>;

impl Document {
    pub fn new(text: impl Into<String>) -> Document {
        let text: String = text.into();

        Document {
            text: sync::Arc::from(text),
            version: versioned::Version::default(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The text covered by the span, or None if the span falls outside the
    /// document or splits a character.
    pub fn slice(&self, span: Span) -> Option<&str> {
        self.text.get(span.range())
    }

    fn replace_text(&mut self, text: String) {
        self.text = sync::Arc::from(text);
    }
}

impl versioned::Versioned for Document {
    fn version(&self) -> &versioned::Version {
        &self.version
    }
}

impl versioned::Editable for Document {
    type Change = change::Change;

    fn version_mut(&mut self) -> &mut versioned::Version {
        &mut self.version
    }
}

impl versioned::Host<Document> {
    /// Applies a batch of replacements to the given generation of the document.
    pub fn edit(&self, document: &Document, changes: Vec<change::TextChange>) -> Result<versioned::Transition<Document>, change::ApplyError> {
        self.change(change::Change::new(document.generation(), changes))
    }

    pub fn replace(&self, document: &Document, span: Span, text: impl Into<String>) -> Result<versioned::Transition<Document>, change::ApplyError> {
        self.edit(document, vec![change::TextChange::new(span, text)])
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("uid", &self.version.uid())
            .field("generation", &self.version.generation())
            .field("len", &self.text.len())
            .finish_non_exhaustive()
    }
}
