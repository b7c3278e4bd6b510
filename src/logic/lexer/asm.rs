//! Reference grammar for assembly-flavoured source. Every byte of input ends
//! up in some token, including whitespace, comments, and characters the
//! grammar doesn't otherwise recognise.

use logos::Logos;

use crate::logic::lexer;
use crate::model::token;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsmToken {
    #[regex(r"[ \t\f]+")]
    Whitespace,

    #[regex(r"\r?\n")]
    Eol,

    #[regex(r"//[^\r\n]*")]
    LineComment,

    #[token("/*", block_comment)]
    BlockComment,

    #[token("\"", string_literal)]
    StringLiteral,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    #[regex(r"[0-9][A-Za-z0-9_]*")]
    Number,

    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token(";")]
    Semicolon,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("/")]
    #[regex(r"[-+*%&|^~!=<>?@#$.]")]
    Operator,

    /* never produced by logos; anything it rejects becomes one of these, one character at a time */
    Unknown,
}

/* unterminated comments run to the end of the text */
fn block_comment(lex: &mut logos::Lexer<AsmToken>) {
    let remainder = lex.remainder();
    match remainder.find("*/") {
        Some(end) => lex.bump(end + 2),
        None => lex.bump(remainder.len()),
    }
}

/* unterminated strings stop at the end of the line */
fn string_literal(lex: &mut logos::Lexer<AsmToken>) {
    let remainder = lex.remainder();
    let mut escaped = false;

    for (index, c) in remainder.char_indices() {
        match c {
            '\r' | '\n' => return lex.bump(index),
            '"' if !escaped => return lex.bump(index + 1),
            '\\' => escaped = !escaped,
            _ => escaped = false,
        }
    }

    lex.bump(remainder.len());
}

impl AsmToken {
    const ALL: [AsmToken; 18] = [
        AsmToken::Whitespace,
        AsmToken::Eol,
        AsmToken::LineComment,
        AsmToken::BlockComment,
        AsmToken::StringLiteral,
        AsmToken::Identifier,
        AsmToken::Number,
        AsmToken::Comma,
        AsmToken::Colon,
        AsmToken::Semicolon,
        AsmToken::LParen,
        AsmToken::RParen,
        AsmToken::LBracket,
        AsmToken::RBracket,
        AsmToken::LBrace,
        AsmToken::RBrace,
        AsmToken::Operator,
        AsmToken::Unknown,
    ];

    pub fn ty(self) -> token::TokenType {
        token::TokenType(self as u16)
    }

    pub fn from_type(ty: token::TokenType) -> Option<AsmToken> {
        Self::ALL.iter().copied().find(|t| t.ty() == ty)
    }

    pub fn class(self) -> token::TokenClass {
        match self {
            AsmToken::Whitespace => token::TokenClass::Whitespace,
            AsmToken::Eol => token::TokenClass::Newline,
            AsmToken::LineComment | AsmToken::BlockComment => token::TokenClass::Comment,
            AsmToken::StringLiteral => token::TokenClass::StringLiteral,
            AsmToken::Identifier => token::TokenClass::Identifier,
            AsmToken::Number => token::TokenClass::Number,
            AsmToken::Comma
                | AsmToken::Colon
                | AsmToken::Semicolon
                | AsmToken::LParen
                | AsmToken::RParen
                | AsmToken::LBracket
                | AsmToken::RBracket
                | AsmToken::LBrace
                | AsmToken::RBrace
                | AsmToken::Operator => token::TokenClass::Punctuation,
            AsmToken::Unknown => token::TokenClass::Unknown,
        }
    }
}

/// Recognises the token at the front of `text`.
pub fn scan(text: &str) -> Option<(token::TokenType, usize)> {
    let mut lex = AsmToken::lexer(text);

    match lex.next()? {
        Ok(t) => Some((t.ty(), lex.span().len())),
        Err(()) => Some((AsmToken::Unknown.ty(), text.chars().next()?.len_utf8())),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AsmLexer;

impl lexer::Lexer for AsmLexer {
    fn run<'a>(&'a self, segments: lexer::Segments<'a>, offset: usize) -> lexer::Tokens<'a> {
        Box::new(lexer::Scanner::new(scan, segments, offset))
    }

    fn classify(&self, ty: token::TokenType) -> token::TokenClass {
        AsmToken::from_type(ty).map_or(token::TokenClass::Unknown, AsmToken::class)
    }
}
