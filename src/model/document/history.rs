//! A version-indexed log of normalized edits. Entry `i` transforms
//! generation `base + i` into generation `base + i + 1`, so any span known at
//! one generation can be carried forward to a later one by composing the
//! entries in between.

use crate::model::document::change;
use crate::model::span::Span;

#[derive(Clone, Debug)]
pub struct History {
    base: u64,
    edits: imbl::Vector<change::Edit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryError {
    /// The starting generation is older than anything the log still remembers.
    Forgotten { generation: u64, base: u64 },

    /// The generation hasn't happened yet.
    Future { generation: u64, head: u64 },

    /// Spans can only be carried forward.
    Backwards { from: u64, to: u64 },
}

impl History {
    pub fn new(generation: u64) -> History {
        History {
            base: generation,
            edits: imbl::Vector::new(),
        }
    }

    /// The oldest generation spans can still be ported from.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// The newest generation the log knows about.
    pub fn head(&self) -> u64 {
        self.base + self.edits.len() as u64
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Records the edit that produced the next generation. Returns the new head.
    pub fn push(&mut self, edit: change::Edit) -> u64 {
        self.edits.push_back(edit);
        self.head()
    }

    /// The edits that transform generation `from` into generation `to`, in order.
    pub fn edits(&self, from: u64, to: u64) -> Result<impl Iterator<Item = &change::Edit> + '_, HistoryError> {
        if from > to {
            return Err(HistoryError::Backwards { from, to });
        }

        if from < self.base {
            return Err(HistoryError::Forgotten { generation: from, base: self.base });
        }

        if to > self.head() {
            return Err(HistoryError::Future { generation: to, head: self.head() });
        }

        let begin = (from - self.base) as usize;
        let end = (to - self.base) as usize;

        Ok((begin..end).filter_map(move |i| self.edits.get(i)))
    }

    /// Carries a span from generation `from` forward to generation `to`. On
    /// [change::UpdateSpanResult::Invalidated] the span is left wherever the
    /// last successful step put it and should not be used.
    #[must_use]
    pub fn port_span(&self, span: &mut Span, from: u64, to: u64) -> Result<change::UpdateSpanResult, HistoryError> {
        let mut result = change::UpdateSpanResult::Unmoved;

        for edit in self.edits(from, to)? {
            match edit.update_span(span) {
                change::UpdateSpanResult::Unmoved => {},
                change::UpdateSpanResult::Moved => result = change::UpdateSpanResult::Moved,
                change::UpdateSpanResult::Invalidated => return Ok(change::UpdateSpanResult::Invalidated),
            }
        }

        Ok(result)
    }

    /// Drops every edit older than `generation`, which becomes the new base.
    pub fn forget_before(&mut self, generation: u64) -> Result<(), HistoryError> {
        if generation > self.head() {
            return Err(HistoryError::Future { generation, head: self.head() });
        }

        if generation <= self.base {
            return Ok(());
        }

        self.edits = self.edits.skip((generation - self.base) as usize);
        self.base = generation;
        Ok(())
    }
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::Forgotten { generation, base } => write!(f, "generation {} predates the edit log (base {})", generation, base),
            HistoryError::Future { generation, head } => write!(f, "generation {} is newer than the edit log (head {})", generation, head),
            HistoryError::Backwards { from, to } => write!(f, "cannot port from generation {} back to {}", from, to),
        }
    }
}

impl std::error::Error for HistoryError {
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    fn edit(start: usize, length: usize, delta: isize) -> change::Edit {
        change::Edit {
            old_span: Span::new(start, length),
            delta,
        }
    }

    fn history() -> History {
        let mut history = History::new(10);
        history.push(edit(2, 0, 3)); /* 10 -> 11 */
        history.push(edit(20, 5, -5)); /* 11 -> 12 */
        history.push(edit(0, 1, 1)); /* 12 -> 13 */
        history
    }

    #[test]
    fn port_composes_edits() {
        let history = history();
        assert_eq!(history.head(), 13);

        let mut span = Span::new(8, 4);
        assert_eq!(history.port_span(&mut span, 10, 13), Ok(change::UpdateSpanResult::Moved));
        assert_eq!(span, Span::new(12, 4));

        /* starting later skips the first insertion */
        let mut span = Span::new(8, 4);
        assert_eq!(history.port_span(&mut span, 11, 13), Ok(change::UpdateSpanResult::Moved));
        assert_eq!(span, Span::new(9, 4));

        /* porting to the same generation is a no-op */
        let mut span = Span::new(8, 4);
        assert_eq!(history.port_span(&mut span, 12, 12), Ok(change::UpdateSpanResult::Unmoved));
        assert_eq!(span, Span::new(8, 4));
    }

    #[test]
    fn port_detects_invalidation_mid_chain() {
        let history = history();

        /* [14, 18) at 10 is [17, 21) at 11, which the deletion at [20, 25) cuts into */
        let mut span = Span::new(14, 4);
        assert_eq!(history.port_span(&mut span, 10, 13), Ok(change::UpdateSpanResult::Invalidated));

        /* entirely before everything but the last edit, which replaces its first byte */
        let mut span = Span::new(0, 2);
        assert_eq!(history.port_span(&mut span, 10, 12), Ok(change::UpdateSpanResult::Unmoved));
        assert_eq!(history.port_span(&mut span, 12, 13), Ok(change::UpdateSpanResult::Invalidated));
    }

    #[test]
    fn port_preconditions() {
        let history = history();
        let mut span = Span::new(0, 1);

        assert_matches!(history.port_span(&mut span, 9, 13), Err(HistoryError::Forgotten { generation: 9, base: 10 }));
        assert_matches!(history.port_span(&mut span, 10, 14), Err(HistoryError::Future { generation: 14, head: 13 }));
        assert_matches!(history.port_span(&mut span, 12, 11), Err(HistoryError::Backwards { from: 12, to: 11 }));
    }

    #[test]
    fn forget_before() {
        let mut history = history();
        history.forget_before(12).unwrap();

        assert_eq!(history.base(), 12);
        assert_eq!(history.head(), 13);
        assert_eq!(history.len(), 1);

        let mut span = Span::new(4, 1);
        assert_eq!(history.port_span(&mut span, 12, 13), Ok(change::UpdateSpanResult::Moved));
        assert_eq!(span, Span::new(5, 1));

        let mut span = Span::new(4, 1);
        assert_matches!(history.port_span(&mut span, 11, 13), Err(HistoryError::Forgotten { .. }));

        assert_matches!(history.forget_before(20), Err(HistoryError::Future { .. }));
    }
}
