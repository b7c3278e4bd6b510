//! The lexer contract the tokenizer drives, and [Scanner], which turns a
//! function that recognises one token at the front of a string into a
//! lexer over lazily supplied text segments.

pub mod asm;

use std::borrow;
use std::iter;

use crate::model::token;

/// Text to lex, in order. Segments are pulled only as the lexer needs them.
pub type Segments<'a> = Box<dyn Iterator<Item = borrow::Cow<'a, str>> + 'a>;

pub type Tokens<'a> = Box<dyn Iterator<Item = Result<token::Token, LexError>> + 'a>;

/// Recognises the longest token at the front of `text`, returning its type
/// and byte length. Only returns None for empty text.
pub type ScanFn = fn(&str) -> Option<(token::TokenType, usize)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    /// The grammar didn't recognise anything at this position.
    Stalled { position: usize },

    /// The grammar claimed more text than it was given, or a length that splits a character.
    Overrun { position: usize, length: usize },
}

pub trait Lexer: Send + Sync {
    /// Lexes the concatenation of `segments`, which begins at `offset` in
    /// the document. Tokens cover the text exactly, in order. Segments are
    /// pulled lazily; a consumer that stops iterating stops the pulling.
    fn run<'a>(&'a self, segments: Segments<'a>, offset: usize) -> Tokens<'a>;

    fn classify(&self, ty: token::TokenType) -> token::TokenClass;

    fn lex(&self, text: &str) -> Result<Vec<token::Token>, LexError> {
        self.run(Box::new(iter::once(borrow::Cow::Borrowed(text))), 0).collect()
    }
}

pub struct Scanner<'a> {
    scan: ScanFn,
    segments: Segments<'a>,
    exhausted: bool,
    failed: bool,

    /* text pulled but not yet emitted starts at buffer[cursor], which is at `position` in the document */
    buffer: String,
    cursor: usize,
    position: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(scan: ScanFn, segments: Segments<'a>, offset: usize) -> Scanner<'a> {
        Scanner {
            scan,
            segments,
            exhausted: false,
            failed: false,
            buffer: String::new(),
            cursor: 0,
            position: offset,
        }
    }

    /// Appends at least `wanted` more bytes to the buffer, or as many as
    /// remain. Returns false if nothing could be added.
    fn pull(&mut self, wanted: usize) -> bool {
        if self.exhausted {
            return false;
        }

        self.buffer.drain(..self.cursor);
        self.cursor = 0;

        let before = self.buffer.len();
        while self.buffer.len() - before < wanted.max(1) {
            match self.segments.next() {
                Some(segment) => self.buffer.push_str(&segment),
                None => {
                    self.exhausted = true;
                    break;
                },
            }
        }

        self.buffer.len() > before
    }

    fn fail(&mut self, error: LexError) -> Option<Result<token::Token, LexError>> {
        self.failed = true;
        Some(Err(error))
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<token::Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let rest = &self.buffer[self.cursor..];
            if rest.is_empty() {
                if self.pull(1) {
                    continue;
                }

                return None;
            }

            let (ty, length) = match (self.scan)(rest) {
                Some((ty, length)) if length > 0 && rest.is_char_boundary(length) => (ty, length),
                Some((_, length)) if length > 0 => return self.fail(LexError::Overrun { position: self.position, length }),
                _ => return self.fail(LexError::Stalled { position: self.position }),
            };

            /* a token that runs into the end of the buffer might keep going in
             * the next segment. pulling at least as much again as the token
             * already spans keeps long tokens from being rescanned too often. */
            if length == rest.len() && self.pull(length) {
                continue;
            }

            self.cursor += length;
            let token = token::Token::new(ty, self.position, length);
            self.position += length;

            return Some(Ok(token));
        }
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexError::Stalled { position } => write!(f, "no token recognised at offset {}", position),
            LexError::Overrun { position, length } => write!(f, "token at offset {} claims an invalid length of {}", position, length),
        }
    }
}

impl std::error::Error for LexError {
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use crate::model::token::{Token, TokenType};

    const WORD: TokenType = TokenType(1);
    const SPACE: TokenType = TokenType(2);

    /* runs of letters, runs of spaces */
    fn scan_words(text: &str) -> Option<(TokenType, usize)> {
        let first = text.chars().next()?;
        let is_space = first == ' ';
        let length = text.find(|c: char| (c == ' ') != is_space).unwrap_or(text.len());
        Some((if is_space { SPACE } else { WORD }, length))
    }

    fn segments<'a>(parts: &'a [&'a str], pulled: &'a cell::Cell<usize>) -> Segments<'a> {
        Box::new(parts.iter().map(move |part| {
            pulled.set(pulled.get() + 1);
            borrow::Cow::Borrowed(*part)
        }))
    }

    #[test]
    fn tokens_span_segments() {
        let pulled = cell::Cell::new(0);
        let tokens: Result<Vec<_>, _> = Scanner::new(scan_words, segments(&["mo", "v a", "", "b  ", " c"], &pulled), 10).collect();

        assert_eq!(tokens.unwrap(), vec![
            Token::new(WORD, 10, 3),
            Token::new(SPACE, 13, 1),
            Token::new(WORD, 14, 2),
            Token::new(SPACE, 16, 3),
            Token::new(WORD, 19, 1),
        ]);
        assert_eq!(pulled.get(), 5);
    }

    #[test]
    fn segments_are_pulled_lazily() {
        let pulled = cell::Cell::new(0);
        let mut scanner = Scanner::new(scan_words, segments(&["ab ", "cd", " ef", " gh"], &pulled), 0);

        assert_eq!(scanner.next(), Some(Ok(Token::new(WORD, 0, 2))));
        assert_eq!(pulled.get(), 1);

        /* the space runs into the end of the first segment, so the next one is needed to finish it */
        assert_eq!(scanner.next(), Some(Ok(Token::new(SPACE, 2, 1))));
        assert_eq!(pulled.get(), 2);

        std::mem::drop(scanner);
        assert_eq!(pulled.get(), 2);
    }

    #[test]
    fn lex_single_segment() {
        struct Words;

        impl Lexer for Words {
            fn run<'a>(&'a self, segments: Segments<'a>, offset: usize) -> Tokens<'a> {
                Box::new(Scanner::new(scan_words, segments, offset))
            }

            fn classify(&self, _ty: TokenType) -> token::TokenClass {
                token::TokenClass::Unknown
            }
        }

        itertools::assert_equal(Words.lex("a bc").unwrap(), [
            Token::new(WORD, 0, 1),
            Token::new(SPACE, 1, 1),
            Token::new(WORD, 2, 2),
        ]);
        assert_eq!(Words.lex("").unwrap(), vec![]);
    }

    #[test]
    fn misbehaving_grammars() {
        fn stall(_: &str) -> Option<(TokenType, usize)> {
            Some((WORD, 0))
        }

        fn overrun(text: &str) -> Option<(TokenType, usize)> {
            Some((WORD, text.len() + 1))
        }

        let pulled = cell::Cell::new(0);
        let mut scanner = Scanner::new(stall, segments(&["abc"], &pulled), 4);
        assert_matches!(scanner.next(), Some(Err(LexError::Stalled { position: 4 })));
        assert_matches!(scanner.next(), None);

        let mut scanner = Scanner::new(overrun, segments(&["abc"], &pulled), 0);
        assert_matches!(scanner.next(), Some(Err(LexError::Overrun { position: 0, length: 4 })));
    }
}
