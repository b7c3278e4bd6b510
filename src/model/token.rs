pub mod collection;

use std::sync;

use crate::model::document::change;
use crate::model::document::history;
use crate::model::span::Span;

/// A lexer grammar's own code for a kind of token. Opaque to everything but
/// the grammar that produced it; see [TokenClass] for a grammar-independent view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenType(pub u16);

/// The small set of semantic kinds consumers care about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Whitespace,
    Newline,
    Comment,
    Identifier,
    Number,
    StringLiteral,
    Punctuation,
    Unknown,
}

/// A token as produced by a lexer, positioned within one version of a document.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token {
    pub ty: TokenType,
    pub span: Span,
}

/// A token that remembers which generation its span was measured in, so
/// that it can be located in any later generation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TrackingToken {
    id: u64,
    token: Token,
    origin: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingError {
    /// The token didn't exist yet at the requested generation.
    BeforeOrigin { origin: u64, generation: u64 },

    /// An edit since the token's origin landed inside it.
    Invalidated,

    History(history::HistoryError),
}

static NEXT_TOKEN_ID: sync::atomic::AtomicU64 = sync::atomic::AtomicU64::new(1);

impl Token {
    pub fn new(ty: TokenType, start: usize, length: usize) -> Token {
        Token {
            ty,
            span: Span::new(start, length),
        }
    }
}

impl TrackingToken {
    pub fn new(token: Token, origin: u64) -> TrackingToken {
        TrackingToken {
            id: NEXT_TOKEN_ID.fetch_add(1, sync::atomic::Ordering::Relaxed),
            token,
            origin,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn ty(&self) -> TokenType {
        self.token.ty
    }

    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// The token exactly as it was measured at its origin generation.
    pub fn anchor(&self) -> &Token {
        &self.token
    }

    pub fn span_at(&self, history: &history::History, generation: u64) -> Result<Span, TrackingError> {
        if generation < self.origin {
            return Err(TrackingError::BeforeOrigin { origin: self.origin, generation });
        }

        let mut span = self.token.span;
        match history.port_span(&mut span, self.origin, generation)? {
            change::UpdateSpanResult::Unmoved | change::UpdateSpanResult::Moved => Ok(span),
            change::UpdateSpanResult::Invalidated => Err(TrackingError::Invalidated),
        }
    }

    pub fn token_at(&self, history: &history::History, generation: u64) -> Result<Token, TrackingError> {
        Ok(Token {
            ty: self.token.ty,
            span: self.span_at(history, generation)?,
        })
    }

    /// The same token (same identity), re-measured at a newer generation.
    fn rebased(&self, span: Span, generation: u64) -> TrackingToken {
        TrackingToken {
            id: self.id,
            token: Token {
                ty: self.token.ty,
                span,
            },
            origin: generation,
        }
    }
}

impl From<history::HistoryError> for TrackingError {
    fn from(e: history::HistoryError) -> TrackingError {
        TrackingError::History(e)
    }
}

impl std::fmt::Display for TrackingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackingError::BeforeOrigin { origin, generation } => write!(f, "token created at generation {} cannot be located at generation {}", origin, generation),
            TrackingError::Invalidated => write!(f, "token was invalidated by an edit"),
            TrackingError::History(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TrackingError {
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn span_at_later_generations() {
        let mut history = history::History::new(3);
        let token = TrackingToken::new(Token::new(TokenType(1), 4, 2), 3);

        assert_eq!(token.span_at(&history, 3), Ok(Span::new(4, 2)));

        history.push(change::Edit { old_span: Span::new(0, 0), delta: 5 });
        assert_eq!(token.span_at(&history, 4), Ok(Span::new(9, 2)));
        assert_eq!(token.token_at(&history, 4), Ok(Token::new(TokenType(1), 9, 2)));

        /* the anchor never changes */
        assert_eq!(token.anchor(), &Token::new(TokenType(1), 4, 2));

        history.push(change::Edit { old_span: Span::new(10, 0), delta: 1 });
        assert_matches!(token.span_at(&history, 5), Err(TrackingError::Invalidated));
    }

    #[test]
    fn span_at_before_origin() {
        let mut history = history::History::new(3);
        history.push(change::Edit::identity());

        let token = TrackingToken::new(Token::new(TokenType(1), 4, 2), 4);
        assert_matches!(token.span_at(&history, 3), Err(TrackingError::BeforeOrigin { origin: 4, generation: 3 }));
        assert_matches!(token.span_at(&history, 5), Err(TrackingError::History(history::HistoryError::Future { .. })));
    }

    #[test]
    fn identities_are_unique() {
        let token = Token::new(TokenType(1), 0, 1);
        assert_ne!(TrackingToken::new(token, 0).id(), TrackingToken::new(token, 0).id());
    }
}
