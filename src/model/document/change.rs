use crate::model::document;
use crate::model::span::Span;
use crate::model::versioned;
use crate::model::versioned::Versioned;

/// Replaces `old_span` (in the coordinates of the document before the change) with `new_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub old_span: Span,
    pub new_text: String,
}

/// A host-level edit: an ordered list of non-overlapping replacements, all
/// expressed against the document generation they were made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub changes: Vec<TextChange>,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// The change was made against a different generation than the document is on.
    Outdated { expected: u64, found: u64 },
    InvalidParameters(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    Empty,
    Unordered,
    Overflow,
}

/// A single contiguous replacement between two adjacent versions: `old_span`
/// was replaced by text `delta` bytes longer (or shorter) than it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub old_span: Span,
    pub delta: isize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSpanResult {
    /// The span lies entirely before the edit.
    Unmoved,

    /// The span lies entirely after the edit and was shifted.
    Moved,

    /// The edit touched the inside of the span. Its new position is meaningless.
    Invalidated,
}

impl TextChange {
    pub fn new(old_span: Span, new_text: impl Into<String>) -> TextChange {
        TextChange {
            old_span,
            new_text: new_text.into(),
        }
    }

    pub fn insert(position: usize, text: impl Into<String>) -> TextChange {
        Self::new(Span::empty_at(position), text)
    }

    pub fn delete(span: Span) -> TextChange {
        Self::new(span, String::new())
    }

    pub fn delta(&self) -> Option<isize> {
        let new_length = isize::try_from(self.new_text.len()).ok()?;
        let old_length = isize::try_from(self.old_span.length).ok()?;
        new_length.checked_sub(old_length)
    }
}

impl Edit {
    /// Joins an ordered list of replacements into one edit spanning from
    /// the start of the first to the old end of the last, carrying the net
    /// length change.
    pub fn join(changes: &[TextChange]) -> Result<Edit, JoinError> {
        let (first, last) = match (changes.first(), changes.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(JoinError::Empty),
        };

        let mut delta: isize = 0;
        let mut previous_end = 0;

        for change in changes {
            if change.old_span.start < previous_end {
                return Err(JoinError::Unordered);
            }
            previous_end = change.old_span.end();

            delta = change.delta()
                .and_then(|d| delta.checked_add(d))
                .ok_or(JoinError::Overflow)?;
        }

        Ok(Edit {
            old_span: Span::between(first.old_span.start, last.old_span.end()).ok_or(JoinError::Unordered)?,
            delta,
        })
    }

    /// An edit that changes nothing.
    pub fn identity() -> Edit {
        Edit {
            old_span: Span::empty_at(0),
            delta: 0,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.old_span.is_empty() && self.delta == 0
    }

    /// The region the replacement text occupies in the new version.
    pub fn new_span(&self) -> Option<Span> {
        let length = self.old_span.length.checked_add_signed(self.delta)?;
        Some(Span::new(self.old_span.start, length))
    }

    /// Translates a span from the version before this edit to the version after it.
    #[must_use]
    pub fn update_span(&self, span: &mut Span) -> UpdateSpanResult {
        if span.end() <= self.old_span.start {
            UpdateSpanResult::Unmoved
        } else if span.start >= self.old_span.end() {
            if self.delta == 0 {
                return UpdateSpanResult::Unmoved;
            }

            match span.shifted(self.delta) {
                Some(shifted) => {
                    *span = shifted;
                    UpdateSpanResult::Moved
                },
                None => UpdateSpanResult::Invalidated,
            }
        } else {
            UpdateSpanResult::Invalidated
        }
    }
}

impl Change {
    pub fn new(generation: u64, changes: Vec<TextChange>) -> Change {
        Change {
            changes,
            generation,
        }
    }
}

impl versioned::Change<document::Document> for Change {
    type ApplyError = ApplyError;
    type ApplyRecord = Self;

    fn apply(self, document: &mut document::Document) -> Result<(Change, Change), ApplyError> {
        if self.generation != document.generation() {
            return Err(ApplyError::Outdated {
                expected: document.generation(),
                found: self.generation,
            });
        }

        let old_text = document.text();
        let mut new_text = String::with_capacity(old_text.len());
        let mut cursor = 0;

        for change in &self.changes {
            /* Keep replacements ordered and non-overlapping. */
            if change.old_span.start < cursor {
                return Err(ApplyError::InvalidParameters("replacements are out of order or overlap"));
            }

            if change.old_span.end() > old_text.len() {
                return Err(ApplyError::InvalidParameters("replacement extends beyond the end of the document"));
            }

            if !old_text.is_char_boundary(change.old_span.start) || !old_text.is_char_boundary(change.old_span.end()) {
                return Err(ApplyError::InvalidParameters("replacement splits a character"));
            }

            new_text.push_str(&old_text[cursor..change.old_span.start]);
            new_text.push_str(&change.new_text);
            cursor = change.old_span.end();
        }

        new_text.push_str(&old_text[cursor..]);
        document.replace_text(new_text);

        Ok((self.clone(), self))
    }
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::Outdated { expected, found } => write!(f, "change was made against generation {} but the document is on generation {}", found, expected),
            ApplyError::InvalidParameters(reason) => write!(f, "invalid change: {}", reason),
        }
    }
}

impl std::error::Error for ApplyError {
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinError::Empty => write!(f, "no replacements to join"),
            JoinError::Unordered => write!(f, "replacements are out of order or overlap"),
            JoinError::Overflow => write!(f, "net length change overflows"),
        }
    }
}

impl std::error::Error for JoinError {
}
