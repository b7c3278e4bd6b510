//! The incremental step: find the tokens an edit invalidated, lex their
//! replacement text plus as much of what follows as it takes for the new
//! tokens to line back up with old ones, and merge the result.

use std::borrow;
use std::cell;
use std::iter;

use tracing::{event, instrument, Level};

use crate::logic::lexer;
use crate::logic::tokenizer::RescanError;
use crate::model::document;
use crate::model::document::change;
use crate::model::span::Span;
use crate::model::token;
use crate::model::token::collection;
use crate::model::versioned::Versioned;

/// What an edit took out of the collection.
#[derive(Debug)]
pub struct Invalidation {
    /// Tokens that intersected (or touched) the edit, already removed.
    pub removed: Vec<token::TrackingToken>,

    /// Where their replacement text lies in the new generation.
    pub span: Span,
}

/// Freshly lexed tokens, and the old tokens after the invalidated span that they replace.
#[derive(Debug)]
pub struct Resync {
    pub tokens: Vec<token::Token>,
    pub superseded: Vec<token::TrackingToken>,

    /// Everything that was lexed, invalidated span and overrun included.
    pub scanned: Span,
}

/// Removes the tokens `edit` lands in and advances the collection to the
/// generation of `after`.
pub fn invalidate(tokens: &mut collection::TokenCollection, before: &document::Document, after: &document::Document, edit: change::Edit) -> Result<Invalidation, RescanError> {
    let old = before.generation();
    let removed = tokens.get_overlapping(old, edit.old_span)?;

    let bounds = match (removed.first(), removed.last()) {
        (Some(first), Some(last)) => Some((tokens.resolve(first, old)?, tokens.resolve(last, old)?)),
        _ => None,
    };

    for token in &removed {
        tokens.remove(token)?;
    }

    let new = tokens.advance(edit);
    if new != after.generation() {
        return Err(RescanError::VersionSkew { expected: after.generation(), found: new });
    }

    let span = match bounds {
        Some((first, last)) => {
            /* every byte belongs to some token, so the edit can't reach outside of what it invalidated */
            if first.start > edit.old_span.start || last.end() < edit.old_span.end() {
                return Err(RescanError::Uncovered { edit: edit.old_span });
            }

            /* tokens before the edit keep their positions, and the last one ends where it did plus the length change */
            last.end().checked_add_signed(edit.delta)
                .and_then(|end| Span::between(first.start, end))
                .ok_or(RescanError::OutOfBounds { span: last, len: after.len() })?
        },

        /* nothing was there to invalidate, which is only fine if there was no text either */
        None if before.is_empty() => Span::new(0, after.len()),
        None => return Err(RescanError::Uncovered { edit: edit.old_span }),
    };

    if span.end() > after.len() {
        return Err(RescanError::OutOfBounds { span, len: after.len() });
    }

    event!(Level::DEBUG, removed = removed.len(), %span, "invalidated");
    Ok(Invalidation { removed, span })
}

/// Lexes `invalidated`, pulling following tokens' text only for as long
/// as the new tokens haven't realigned with an old token boundary.
#[instrument(skip(tokens, lexer, after), fields(version = tokens.version()))]
pub fn relex(tokens: &collection::TokenCollection, lexer: &dyn lexer::Lexer, after: &document::Document, invalidated: Span) -> Result<Resync, RescanError> {
    let version = tokens.version();
    let text = after.slice(invalidated).ok_or(RescanError::OutOfBounds { span: invalidated, len: after.len() })?;

    /* old tokens whose text has been handed to the lexer, in order */
    let candidates: cell::RefCell<Vec<(token::TrackingToken, Span)>> = cell::RefCell::new(Vec::new());
    let failure: cell::Cell<Option<RescanError>> = cell::Cell::new(None);

    let excess = tokens.in_order_after(version, invalidated.end())?
        .map_while(|candidate| {
            let text = candidate
                .map_err(RescanError::from)
                .and_then(|(token, span)| {
                    let text = after.slice(span).ok_or(RescanError::OutOfBounds { span, len: after.len() })?;
                    candidates.borrow_mut().push((token, span));
                    Ok(text)
                });

            match text {
                Ok(text) => Some(borrow::Cow::Borrowed(text)),
                Err(e) => {
                    failure.set(Some(e));
                    None
                },
            }
        });

    let segments: lexer::Segments = Box::new(iter::once(borrow::Cow::Borrowed(text)).chain(excess));
    let mut produced = Vec::new();
    let mut cursor = invalidated.start;

    for token in lexer.run(segments, invalidated.start) {
        let token = token?;

        if token.span.start != cursor || token.span.is_empty() {
            return Err(RescanError::Divergence { expected: cursor, found: token.span.start });
        }

        cursor = token.span.end();
        produced.push(token);

        /* reached the boundary the invalidated tokens had with their successor */
        if cursor == invalidated.end() {
            break;
        }

        /* or lined back up with a boundary further along */
        if cursor > invalidated.end() && candidates.borrow().binary_search_by_key(&cursor, |(_, span)| span.end()).is_ok() {
            break;
        }
    }

    if let Some(e) = failure.take() {
        return Err(e);
    }

    let candidates = candidates.into_inner();
    let realigned = cursor == invalidated.end()
        || candidates.iter().any(|(_, span)| span.end() == cursor);

    if !realigned {
        return Err(RescanError::Divergence { expected: invalidated.end(), found: cursor });
    }

    let superseded: Vec<token::TrackingToken> = candidates.into_iter()
        .take_while(|(_, span)| span.end() <= cursor)
        .map(|(token, _)| token)
        .collect();

    let scanned = Span::between(invalidated.start, cursor).ok_or(RescanError::Divergence {
        expected: invalidated.start,
        found: cursor,
    })?;

    event!(Level::DEBUG, produced = produced.len(), superseded = superseded.len(), %scanned, "relexed");

    Ok(Resync {
        tokens: produced,
        superseded,
        scanned,
    })
}

/// Swaps the superseded tokens for the new ones.
pub fn merge(tokens: &mut collection::TokenCollection, resync: &Resync) -> Result<(), RescanError> {
    let version = tokens.version();

    for token in &resync.superseded {
        tokens.remove(token)?;
    }

    for token in &resync.tokens {
        tokens.add(token::TrackingToken::new(*token, version))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use crate::logic::lexer::asm;
    use crate::logic::lexer::Lexer;

    fn setup(text: &str) -> (document::DocumentHost, collection::TokenCollection) {
        let host = document::DocumentHost::new(document::Document::new(text));
        let tokens = collection::TokenCollection::from_tokens(host.get().generation(), asm::AsmLexer.lex(text).unwrap()).unwrap();
        (host, tokens)
    }

    fn transition(host: &document::DocumentHost, changes: Vec<change::TextChange>) -> (sync::Arc<document::Document>, sync::Arc<document::Document>, change::Edit) {
        let edit = change::Edit::join(&changes).unwrap();
        let transition = host.edit(&host.get(), changes).unwrap();
        (transition.before, transition.after, edit)
    }

    #[test]
    fn invalidate_includes_touching_tokens() {
        let (host, mut tokens) = setup("mov a, b");
        let (before, after, edit) = transition(&host, vec![change::TextChange::insert(5, "x")]);

        let invalidation = invalidate(&mut tokens, &before, &after, edit).unwrap();

        /* "a" and the comma after it */
        assert_eq!(invalidation.removed.len(), 2);
        assert_eq!(invalidation.span, Span::new(4, 3));
        assert_eq!(after.slice(invalidation.span), Some("ax,"));
        assert_eq!(tokens.version(), 1);
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn relex_stops_at_the_old_boundary() {
        let (host, mut tokens) = setup("mov a, b");
        let (before, after, edit) = transition(&host, vec![change::TextChange::insert(5, "x")]);
        let invalidation = invalidate(&mut tokens, &before, &after, edit).unwrap();

        let resync = relex(&tokens, &asm::AsmLexer, &after, invalidation.span).unwrap();
        assert_eq!(resync.tokens, vec![
            token::Token::new(asm::AsmToken::Identifier.ty(), 4, 2),
            token::Token::new(asm::AsmToken::Comma.ty(), 6, 1),
        ]);
        assert_eq!(resync.superseded, vec![]);
        assert_eq!(resync.scanned, Span::new(4, 3));

        merge(&mut tokens, &resync).unwrap();
        assert_eq!(tokens.to_vec().unwrap(), asm::AsmLexer.lex(after.text()).unwrap());
    }

    #[test]
    fn relex_pulls_until_realigned() {
        /* opening a comment swallows following tokens until one of them closes it */
        let (host, mut tokens) = setup("a / b c */ d e");
        let (before, after, edit) = transition(&host, vec![change::TextChange::insert(3, "*")]);
        let invalidation = invalidate(&mut tokens, &before, &after, edit).unwrap();
        assert_eq!(after.slice(invalidation.span), Some("/* "));

        let resync = relex(&tokens, &asm::AsmLexer, &after, invalidation.span).unwrap();
        assert_eq!(after.slice(resync.scanned), Some("/* b c */"));

        /* "b", " ", "c", " ", "*", "/" */
        assert_eq!(resync.superseded.len(), 6);

        merge(&mut tokens, &resync).unwrap();
        tokens.check_invariants().unwrap();
        assert_eq!(tokens.to_vec().unwrap(), asm::AsmLexer.lex(after.text()).unwrap());
    }

    #[test]
    fn invalidate_rejects_skewed_versions() {
        let (host, mut tokens) = setup("mov a, b");
        let (before, _, edit) = transition(&host, vec![change::TextChange::insert(5, "x")]);
        let (_, later, _) = transition(&host, vec![change::TextChange::insert(0, "y")]);

        assert_matches!(invalidate(&mut tokens, &before, &later, edit), Err(RescanError::VersionSkew { expected: 2, found: 1 }));
    }

    #[test]
    fn invalidate_rejects_uncovered_edits() {
        let host = document::DocumentHost::new(document::Document::new("mov"));
        let mut tokens = collection::TokenCollection::new(0);
        let (before, after, edit) = transition(&host, vec![change::TextChange::insert(1, "x")]);

        assert_matches!(invalidate(&mut tokens, &before, &after, edit), Err(RescanError::Uncovered { .. }));
    }

    #[test]
    fn invalidate_empty_document() {
        let host = document::DocumentHost::new(document::Document::new(""));
        let mut tokens = collection::TokenCollection::new(0);
        let (before, after, edit) = transition(&host, vec![change::TextChange::insert(0, "mov a")]);

        let invalidation = invalidate(&mut tokens, &before, &after, edit).unwrap();
        assert_eq!(invalidation.span, Span::new(0, 5));
        assert!(invalidation.removed.is_empty());
    }
}
