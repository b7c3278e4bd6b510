//! The ordered, non-overlapping set of tokens for the current generation of
//! a document, together with the edit log needed to locate any of them.
//!
//! Tokens are stored in a persistent vector, so cloning a collection is
//! cheap and a clone can be handed out as an immutable snapshot while the
//! original keeps being edited.

use crate::model::document::change;
use crate::model::document::history;
use crate::model::span::Span;
use crate::model::token;

#[derive(Clone)]
pub struct TokenCollection {
    tokens: imbl::Vector<token::TrackingToken>,
    history: history::History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionError {
    /// A token could not be located at the requested generation.
    Tracking { id: u64, error: token::TrackingError },

    /// Adding the token would have overlapped one already in the collection.
    Overlap { existing: Span, added: Span },

    NotFound { id: u64 },

    /// Two adjacent tokens are out of order or overlap.
    OutOfOrder { index: usize, previous: Span, next: Span },
}

impl TokenCollection {
    pub fn new(generation: u64) -> TokenCollection {
        TokenCollection {
            tokens: imbl::Vector::new(),
            history: history::History::new(generation),
        }
    }

    /// Builds a collection from lexer output for the given generation.
    pub fn from_tokens(generation: u64, tokens: impl IntoIterator<Item = token::Token>) -> Result<TokenCollection, CollectionError> {
        let mut collection = Self::new(generation);
        let mut previous: Option<Span> = None;

        for token in tokens {
            if let Some(previous) = previous {
                if token.span.start < previous.end() {
                    return Err(CollectionError::OutOfOrder {
                        index: collection.tokens.len(),
                        previous,
                        next: token.span,
                    });
                }
            }

            previous = Some(token.span);
            collection.tokens.push_back(token::TrackingToken::new(token, generation));
        }

        Ok(collection)
    }

    /// The generation this collection describes.
    pub fn version(&self) -> u64 {
        self.history.head()
    }

    pub fn history(&self) -> &history::History {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Moves the collection forward one generation. Tokens the edit lands
    /// in must have been removed beforehand, or they will fail to resolve.
    pub fn advance(&mut self, edit: change::Edit) -> u64 {
        self.history.push(edit)
    }

    pub fn resolve(&self, token: &token::TrackingToken, version: u64) -> Result<Span, CollectionError> {
        token.span_at(&self.history, version).map_err(|error| CollectionError::Tracking {
            id: token.id(),
            error,
        })
    }

    fn span_of(&self, index: usize, version: u64) -> Result<Span, CollectionError> {
        self.resolve(&self.tokens[index], version)
    }

    /// Index of the first token for which `pred` is false, assuming it holds
    /// for a prefix of the collection.
    fn partition_point(&self, version: u64, pred: impl Fn(&Span) -> bool) -> Result<usize, CollectionError> {
        let mut low = 0;
        let mut high = self.tokens.len();

        while low < high {
            let mid = low + (high - low) / 2;
            if pred(&self.span_of(mid, version)?) {
                low = mid + 1;
            } else {
                high = mid;
            }
        }

        Ok(low)
    }

    /// Every token whose span intersects `span` at `version`, in order.
    /// Tokens that only touch `span` at one of its ends are included.
    pub fn get_overlapping(&self, version: u64, span: Span) -> Result<Vec<token::TrackingToken>, CollectionError> {
        let first = self.partition_point(version, |s| s.end() < span.start)?;
        let mut overlapping = Vec::new();

        for index in first..self.tokens.len() {
            if !self.span_of(index, version)?.intersects(&span) {
                break;
            }

            overlapping.push(self.tokens[index]);
        }

        Ok(overlapping)
    }

    /// Tokens sharing at least one byte with `span`. For an empty span, the
    /// token containing its position, if any.
    pub fn get_in_range(&self, version: u64, span: Span) -> Result<Vec<token::Token>, CollectionError> {
        let mut in_range = Vec::new();

        for t in self.get_overlapping(version, span)? {
            let resolved = self.resolve(&t, version)?;
            if resolved.overlaps(&span) || (span.is_empty() && resolved.includes(span.start)) {
                in_range.push(token::Token { ty: t.ty(), span: resolved });
            }
        }

        Ok(in_range)
    }

    /// Lazily walks the tokens starting at or after `position`, in order.
    pub fn in_order_after(&self, version: u64, position: usize) -> Result<InOrderAfter<'_>, CollectionError> {
        Ok(InOrderAfter {
            collection: self,
            version,
            index: self.partition_point(version, |s| s.start < position)?,
        })
    }

    /// Inserts a token measured at (or resolvable at) the current generation.
    pub fn add(&mut self, token: token::TrackingToken) -> Result<(), CollectionError> {
        let version = self.version();
        let span = self.resolve(&token, version)?;
        let index = self.partition_point(version, |s| s.start < span.start)?;

        if index > 0 {
            let previous = self.span_of(index - 1, version)?;
            if previous.end() > span.start {
                return Err(CollectionError::Overlap { existing: previous, added: span });
            }
        }

        if index < self.tokens.len() {
            let next = self.span_of(index, version)?;
            if next.start < span.end() {
                return Err(CollectionError::Overlap { existing: next, added: span });
            }
        }

        self.tokens.insert(index, token);
        Ok(())
    }

    /// Removes a token by identity. The token's span may be stale.
    pub fn remove(&mut self, token: &token::TrackingToken) -> Result<(), CollectionError> {
        let index = match self.locate(token) {
            Some(index) => index,
            None => self.tokens.iter()
                .position(|t| t.id() == token.id())
                .ok_or(CollectionError::NotFound { id: token.id() })?,
        };

        self.tokens.remove(index);
        Ok(())
    }

    /* binary search by position; None when the span can't be trusted */
    fn locate(&self, token: &token::TrackingToken) -> Option<usize> {
        let version = self.version();
        let span = self.resolve(token, version).ok()?;
        let index = self.partition_point(version, |s| s.start < span.start).ok()?;

        match self.tokens.get(index) {
            Some(candidate) if candidate.id() == token.id() => Some(index),
            _ => None,
        }
    }

    /// The raw tracking tokens, in order.
    pub fn tracking(&self) -> impl Iterator<Item = &token::TrackingToken> + '_ {
        self.tokens.iter()
    }

    /// Every token, resolved at the current generation.
    pub fn iter(&self) -> impl Iterator<Item = Result<token::Token, CollectionError>> + '_ {
        let version = self.version();
        self.tokens.iter().map(move |t| Ok(token::Token {
            ty: t.ty(),
            span: self.resolve(t, version)?,
        }))
    }

    pub fn to_vec(&self) -> Result<Vec<token::Token>, CollectionError> {
        self.iter().collect()
    }

    /// Checks that every token resolves at the current generation and that
    /// the whole collection is sorted and free of overlaps.
    pub fn check_invariants(&self) -> Result<(), CollectionError> {
        let version = self.version();
        let mut previous: Option<Span> = None;

        for (index, token) in self.tokens.iter().enumerate() {
            let span = self.resolve(token, version)?;

            if let Some(previous) = previous {
                if span.start < previous.end() {
                    return Err(CollectionError::OutOfOrder { index, previous, next: span });
                }
            }

            previous = Some(span);
        }

        Ok(())
    }

    /// Re-anchors every token at the current generation and forgets the edit log.
    pub fn compact(&mut self) -> Result<(), CollectionError> {
        let version = self.version();
        let mut tokens = imbl::Vector::new();

        for token in self.tokens.iter() {
            tokens.push_back(token.rebased(self.resolve(token, version)?, version));
        }

        self.tokens = tokens;
        self.history = history::History::new(version);
        Ok(())
    }
}

/// Single forward pass over a collection's tokens, yielding each with its
/// span at the generation the walk was started for.
pub struct InOrderAfter<'a> {
    collection: &'a TokenCollection,
    version: u64,
    index: usize,
}

impl<'a> Iterator for InOrderAfter<'a> {
    type Item = Result<(token::TrackingToken, Span), CollectionError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = *self.collection.tokens.get(self.index)?;

        match self.collection.resolve(&token, self.version) {
            Ok(span) => {
                self.index += 1;
                Some(Ok((token, span)))
            },
            Err(e) => {
                /* fuse */
                self.index = self.collection.tokens.len();
                Some(Err(e))
            },
        }
    }
}

impl std::fmt::Debug for TokenCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCollection")
            .field("version", &self.version())
            .field("len", &self.tokens.len())
            .field("history", &self.history.len())
            .finish()
    }
}

impl std::fmt::Display for CollectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionError::Tracking { id, error } => write!(f, "token #{}: {}", id, error),
            CollectionError::Overlap { existing, added } => write!(f, "token at {} would overlap existing token at {}", added, existing),
            CollectionError::NotFound { id } => write!(f, "token #{} is not in the collection", id),
            CollectionError::OutOfOrder { index, previous, next } => write!(f, "token {} at {} does not follow the token at {}", index, next, previous),
        }
    }
}

impl std::error::Error for CollectionError {
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use crate::model::token::{Token, TokenType, TrackingToken};

    const IDENT: TokenType = TokenType(1);
    const WS: TokenType = TokenType(2);
    const COMMA: TokenType = TokenType(3);

    /* "mov a, b" */
    fn collection() -> TokenCollection {
        TokenCollection::from_tokens(0, [
            Token::new(IDENT, 0, 3),
            Token::new(WS, 3, 1),
            Token::new(IDENT, 4, 1),
            Token::new(COMMA, 5, 1),
            Token::new(WS, 6, 1),
            Token::new(IDENT, 7, 1),
        ]).unwrap()
    }

    fn spans(tokens: &[TrackingToken], collection: &TokenCollection) -> Vec<Span> {
        tokens.iter().map(|t| collection.resolve(t, collection.version()).unwrap()).collect()
    }

    #[test]
    fn from_tokens_rejects_overlap() {
        assert_matches!(TokenCollection::from_tokens(0, [
            Token::new(IDENT, 0, 3),
            Token::new(WS, 2, 1),
        ]), Err(CollectionError::OutOfOrder { index: 1, .. }));
    }

    #[test]
    fn get_overlapping_includes_touching() {
        let collection = collection();

        /* insertion at 5 touches "a" (ends at 5) and "," (starts at 5) */
        let overlapping = collection.get_overlapping(0, Span::empty_at(5)).unwrap();
        assert_eq!(spans(&overlapping, &collection), vec![Span::new(4, 1), Span::new(5, 1)]);

        let overlapping = collection.get_overlapping(0, Span::new(1, 3)).unwrap();
        assert_eq!(spans(&overlapping, &collection), vec![Span::new(0, 3), Span::new(3, 1), Span::new(4, 1)]);

        let overlapping = collection.get_overlapping(0, Span::empty_at(8)).unwrap();
        assert_eq!(spans(&overlapping, &collection), vec![Span::new(7, 1)]);

        assert_eq!(collection.get_overlapping(0, Span::empty_at(20)).unwrap(), vec![]);
    }

    #[test]
    fn queries_follow_edits() {
        let mut collection = collection();

        /* replace "a" with "ax" */
        let removed = collection.get_overlapping(0, Span::new(4, 1)).unwrap();
        for token in &removed {
            collection.remove(token).unwrap();
        }
        assert_eq!(collection.advance(change::Edit { old_span: Span::new(4, 1), delta: 1 }), 1);
        assert_matches!(collection.add(TrackingToken::new(Token::new(IDENT, 2, 3), 1)), Err(CollectionError::Overlap { .. }));
        collection.add(TrackingToken::new(Token::new(IDENT, 4, 2), 1)).unwrap();

        collection.check_invariants().unwrap();
        itertools::assert_equal(collection.iter().map(Result::unwrap), [
            Token::new(IDENT, 0, 3),
            Token::new(IDENT, 4, 2),
            Token::new(WS, 7, 1),
            Token::new(IDENT, 8, 1),
        ]);

        /* the removed tokens took their neighbours with them: [3, 6) at generation 0 */
        assert_eq!(removed.len(), 3);
    }

    #[test]
    fn get_in_range_excludes_touching() {
        let collection = collection();

        assert_eq!(collection.get_in_range(0, Span::new(3, 2)).unwrap(), vec![
            Token::new(WS, 3, 1),
            Token::new(IDENT, 4, 1),
        ]);
        assert_eq!(collection.get_in_range(0, Span::empty_at(5)).unwrap(), vec![Token::new(COMMA, 5, 1)]);
        assert_eq!(collection.get_in_range(0, Span::empty_at(8)).unwrap(), vec![]);
    }

    #[test]
    fn in_order_after_is_lazy_and_ordered() {
        let collection = collection();
        let mut after = collection.in_order_after(0, 5).unwrap();

        assert_matches!(after.next(), Some(Ok((t, span))) if t.ty() == COMMA && span == Span::new(5, 1));
        assert_matches!(after.next(), Some(Ok((_, span))) if span == Span::new(6, 1));
        assert_matches!(after.next(), Some(Ok((_, span))) if span == Span::new(7, 1));
        assert_matches!(after.next(), None);

        assert_matches!(collection.in_order_after(0, 8).unwrap().next(), None);
    }

    #[test]
    fn remove_tolerates_stale_spans() {
        let mut collection = collection();
        let first = *collection.tracking().next().unwrap();

        /* an edit inside the first token makes its span unresolvable */
        collection.advance(change::Edit { old_span: Span::new(1, 1), delta: 0 });
        assert_matches!(collection.resolve(&first, 1), Err(CollectionError::Tracking { error: token::TrackingError::Invalidated, .. }));
        assert_matches!(collection.check_invariants(), Err(CollectionError::Tracking { .. }));

        collection.remove(&first).unwrap();
        assert_eq!(collection.len(), 5);
        collection.check_invariants().unwrap();

        assert_matches!(collection.remove(&first), Err(CollectionError::NotFound { .. }));
    }

    #[test]
    fn compact_rebases() {
        let mut collection = collection();
        let tokens = collection.to_vec().unwrap();

        collection.advance(change::Edit { old_span: Span::empty_at(0), delta: 0 });
        collection.advance(change::Edit { old_span: Span::new(20, 4), delta: -4 });
        assert_eq!(collection.history().len(), 2);

        collection.compact().unwrap();
        assert_eq!(collection.version(), 2);
        assert_eq!(collection.history().len(), 0);
        assert_eq!(collection.to_vec().unwrap(), tokens);
        assert!(collection.tracking().all(|t| t.origin() == 2));
    }
}
