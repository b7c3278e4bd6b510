//! Keeps the token stream of a live document current as the document is
//! edited. Each edit only relexes the tokens it touched, plus however many
//! following tokens it takes for the new tokens to line back up with the old
//! ones. Anything unexpected along the way falls back to lexing the whole
//! document again.

pub mod relex;

use std::sync;

use tracing::{event, instrument, Level};

use crate::config;
use crate::logic::cancel;
use crate::logic::lexer;
use crate::model::document;
use crate::model::document::change;
use crate::model::span::Span;
use crate::model::token;
use crate::model::token::collection;
use crate::model::versioned;
use crate::model::versioned::Versioned;

/// Where the tokenizer is in processing an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Invalidating,
    Relexing,
    Merging,
}

#[derive(Debug, Clone)]
pub struct TokenizerOptions {
    rebase_threshold: usize,
    verify_incremental: bool,
}

pub struct TokenizerOptionsBuilder {
    options: TokenizerOptions,
}

/// What consumers see after every update.
pub struct TokenizerResult {
    pub document: sync::Arc<document::Document>,
    pub tokens: collection::TokenCollection,

    /// Tokens the update added. After a full rescan, all of them.
    pub updated: Vec<token::Token>,
}

pub type Observer = Box<dyn FnMut(&sync::Arc<TokenizerResult>, &cancel::CancellationToken) + Send>;

pub struct Tokenizer {
    lexer: sync::Arc<dyn lexer::Lexer>,
    document: sync::Arc<document::Document>,
    tokens: collection::TokenCollection,
    options: TokenizerOptions,
    phase: Phase,
    fallbacks: u64,

    cancellation: cancel::Cancellation,
    observers: Vec<Observer>,
    host: sync::Arc<versioned::Host<TokenizerResult>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// There were no replacements, but the text changed anyway.
    EmptyChange,

    /// Rebuilding from scratch failed. The tokenizer is left without tokens
    /// until a later edit rebuilds successfully.
    Rebuild(RescanError),
}

/// Reasons the incremental path gives up and rescans the whole document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescanError {
    Join(change::JoinError),

    /// The edit doesn't start from the generation the tokens describe.
    VersionSkew { expected: u64, found: u64 },

    /// The edit touches text no token covers.
    Uncovered { edit: Span },

    OutOfBounds { span: Span, len: usize },
    Collection(collection::CollectionError),
    Lexer(lexer::LexError),

    /// The lexer's output didn't tile the text it was given.
    Divergence { expected: usize, found: usize },
}

impl Default for TokenizerOptions {
    fn default() -> TokenizerOptions {
        let config = config::get();

        TokenizerOptions {
            rebase_threshold: config.rebase_threshold,
            verify_incremental: config.verify_incremental,
        }
    }
}

impl TokenizerOptionsBuilder {
    pub fn new() -> TokenizerOptionsBuilder {
        TokenizerOptionsBuilder {
            options: TokenizerOptions::default()
        }
    }

    pub fn rebase_threshold(mut self, edits: usize) -> TokenizerOptionsBuilder {
        self.options.rebase_threshold = edits;
        self
    }

    pub fn verify_incremental(mut self) -> TokenizerOptionsBuilder {
        self.options.verify_incremental = true;
        self
    }

    pub fn build(self) -> TokenizerOptions {
        self.options
    }
}

impl Default for TokenizerOptionsBuilder {
    fn default() -> TokenizerOptionsBuilder {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new(document: sync::Arc<document::Document>, lexer: sync::Arc<dyn lexer::Lexer>) -> Result<Tokenizer, RescanError> {
        Self::with_options(document, lexer, TokenizerOptions::default())
    }

    pub fn with_options(document: sync::Arc<document::Document>, lexer: sync::Arc<dyn lexer::Lexer>, options: TokenizerOptions) -> Result<Tokenizer, RescanError> {
        let (tokens, updated) = Self::full_lex(lexer.as_ref(), &document)?;

        let result = sync::Arc::new(TokenizerResult {
            document: document.clone(),
            tokens: tokens.clone(),
            updated,
        });

        Ok(Tokenizer {
            lexer,
            document,
            tokens,
            options,
            phase: Phase::Idle,
            fallbacks: 0,
            cancellation: cancel::Cancellation::new(),
            observers: Vec::new(),
            host: sync::Arc::new(versioned::Host::from_arc(result)),
        })
    }

    /// Brings the tokens from `before` up to date with `after`, where
    /// `changes` turned one into the other.
    #[instrument(skip_all, fields(from = before.generation(), to = after.generation(), changes = changes.len()))]
    pub fn apply_change(&mut self, before: &sync::Arc<document::Document>, after: &sync::Arc<document::Document>, changes: &[change::TextChange]) -> Result<(), ApplyError> {
        if changes.is_empty() {
            if before.text() != after.text() {
                return Err(ApplyError::EmptyChange);
            }

            self.follow(after);
            return Ok(());
        }

        let cancellation = self.cancellation.supersede();

        match self.incremental(before, after, changes) {
            Ok((tokens, updated)) => {
                self.tokens = tokens;
                self.document = after.clone();
                self.phase = Phase::Idle;
                self.publish(updated, cancellation);
                Ok(())
            },
            Err(e) => {
                event!(Level::WARN, phase = ?self.phase, error = %e, "incremental tokenization failed, rescanning");
                self.fallbacks += 1;
                self.rebuild(after.clone(), cancellation)
            },
        }
    }

    pub fn apply_transition(&mut self, transition: &versioned::Transition<document::Document>) -> Result<(), ApplyError> {
        self.apply_change(&transition.before, &transition.after, &transition.record.changes)
    }

    /// Throws away all tokens and lexes the current document from scratch.
    #[instrument(skip(self), fields(generation = self.document.generation()))]
    pub fn rescan(&mut self) -> Result<(), ApplyError> {
        let cancellation = self.cancellation.supersede();
        self.rebuild(self.document.clone(), cancellation)
    }

    /* a change with no textual effect: keep the tokens, track the newer snapshot */
    fn follow(&mut self, after: &sync::Arc<document::Document>) {
        if after.version().uid() == self.document.version().uid() {
            while self.tokens.version() < after.generation() {
                self.tokens.advance(change::Edit::identity());
            }
        }

        self.document = after.clone();
    }

    fn incremental(&mut self, before: &document::Document, after: &document::Document, changes: &[change::TextChange]) -> Result<(collection::TokenCollection, Vec<token::Token>), RescanError> {
        if before.version().uid() != self.document.version().uid() || before.generation() != self.tokens.version() {
            return Err(RescanError::VersionSkew {
                expected: self.tokens.version(),
                found: before.generation(),
            });
        }

        let edit = change::Edit::join(changes)?;

        /* work on a copy so that a failure part way through leaves nothing half-merged */
        let mut tokens = self.tokens.clone();

        self.phase = Phase::Invalidating;
        let invalidation = relex::invalidate(&mut tokens, before, after, edit)?;

        self.phase = Phase::Relexing;
        let resync = relex::relex(&tokens, self.lexer.as_ref(), after, invalidation.span)?;

        self.phase = Phase::Merging;
        relex::merge(&mut tokens, &resync)?;

        if tokens.history().len() >= self.options.rebase_threshold.max(1) {
            tokens.compact()?;
        }

        event!(Level::DEBUG, removed = invalidation.removed.len() + resync.superseded.len(), added = resync.tokens.len(), "merged");

        let mut updated = resync.tokens;

        if self.options.verify_incremental {
            tokens.check_invariants()?;

            let expected = self.lexer.lex(after.text())?;
            if tokens.to_vec()? != expected {
                event!(Level::ERROR, generation = after.generation(), "incremental tokens differ from a full lex, adopting the full lex");
                self.fallbacks += 1;
                tokens = collection::TokenCollection::from_tokens(after.generation(), expected.iter().copied())?;
                updated = expected;
            }
        }

        Ok((tokens, updated))
    }

    fn full_lex(lexer: &dyn lexer::Lexer, document: &document::Document) -> Result<(collection::TokenCollection, Vec<token::Token>), RescanError> {
        let lexed = lexer.lex(document.text())?;

        /* the lexer has to tile the whole text */
        let mut cursor = 0;
        for token in &lexed {
            if token.span.start != cursor || token.span.is_empty() {
                return Err(RescanError::Divergence { expected: cursor, found: token.span.start });
            }
            cursor = token.span.end();
        }

        if cursor != document.len() {
            return Err(RescanError::Divergence { expected: document.len(), found: cursor });
        }

        let tokens = collection::TokenCollection::from_tokens(document.generation(), lexed.iter().copied())?;
        Ok((tokens, lexed))
    }

    fn rebuild(&mut self, document: sync::Arc<document::Document>, cancellation: cancel::CancellationToken) -> Result<(), ApplyError> {
        self.document = document;
        self.phase = Phase::Idle;

        match Self::full_lex(self.lexer.as_ref(), &self.document) {
            Ok((tokens, updated)) => {
                self.tokens = tokens;
                self.publish(updated, cancellation);
                Ok(())
            },
            Err(e) => {
                event!(Level::ERROR, error = %e, "full rescan failed");
                self.tokens = collection::TokenCollection::new(self.document.generation());
                self.publish(Vec::new(), cancellation);
                Err(ApplyError::Rebuild(e))
            },
        }
    }

    fn publish(&mut self, updated: Vec<token::Token>, cancellation: cancel::CancellationToken) {
        let result = sync::Arc::new(TokenizerResult {
            document: self.document.clone(),
            tokens: self.tokens.clone(),
            updated,
        });

        self.host.publish(result.clone());

        for observer in &mut self.observers {
            observer(&result, &cancellation);
        }
    }

    /// Registers a callback run synchronously after every update, together
    /// with a token that the next update cancels.
    pub fn subscribe(&mut self, observer: impl FnMut(&sync::Arc<TokenizerResult>, &cancel::CancellationToken) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// For consumers that would rather poll or await results.
    pub fn host(&self) -> &sync::Arc<versioned::Host<TokenizerResult>> {
        &self.host
    }

    pub fn current_result(&self) -> sync::Arc<TokenizerResult> {
        self.host.get()
    }

    pub fn get_tokens_in_range(&self, span: Span) -> Result<Vec<token::Token>, collection::CollectionError> {
        self.tokens.get_in_range(self.tokens.version(), span)
    }

    pub fn get_token_type(&self, ty: token::TokenType) -> token::TokenClass {
        self.lexer.classify(ty)
    }

    pub fn version(&self) -> &versioned::Version {
        self.document.version()
    }

    pub fn document(&self) -> &sync::Arc<document::Document> {
        &self.document
    }

    pub fn tokens(&self) -> &collection::TokenCollection {
        &self.tokens
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// How many times the incremental path has had to be abandoned.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks
    }
}

impl TokenizerResult {
    pub fn tokens_in_range(&self, span: Span) -> Result<Vec<token::Token>, collection::CollectionError> {
        self.tokens.get_in_range(self.tokens.version(), span)
    }
}

impl versioned::Versioned for TokenizerResult {
    fn version(&self) -> &versioned::Version {
        self.document.version()
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("document", &self.document)
            .field("tokens", &self.tokens)
            .field("phase", &self.phase)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for TokenizerResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenizerResult")
            .field("document", &self.document)
            .field("tokens", &self.tokens)
            .field("updated", &self.updated.len())
            .finish()
    }
}

impl From<change::JoinError> for RescanError {
    fn from(e: change::JoinError) -> RescanError {
        RescanError::Join(e)
    }
}

impl From<collection::CollectionError> for RescanError {
    fn from(e: collection::CollectionError) -> RescanError {
        RescanError::Collection(e)
    }
}

impl From<lexer::LexError> for RescanError {
    fn from(e: lexer::LexError) -> RescanError {
        RescanError::Lexer(e)
    }
}

impl std::fmt::Display for RescanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RescanError::Join(e) => write!(f, "{}", e),
            RescanError::VersionSkew { expected, found } => write!(f, "expected an edit from generation {}, got one from generation {}", expected, found),
            RescanError::Uncovered { edit } => write!(f, "edit at {} is not covered by any token", edit),
            RescanError::OutOfBounds { span, len } => write!(f, "{} lies outside of a document of length {}", span, len),
            RescanError::Collection(e) => write!(f, "{}", e),
            RescanError::Lexer(e) => write!(f, "{}", e),
            RescanError::Divergence { expected, found } => write!(f, "lexer output does not line up: expected offset {}, found {}", expected, found),
        }
    }
}

impl std::error::Error for RescanError {
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::EmptyChange => write!(f, "text changed without any replacements"),
            ApplyError::Rebuild(e) => write!(f, "full rescan failed: {}", e),
        }
    }
}

impl std::error::Error for ApplyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplyError::EmptyChange => None,
            ApplyError::Rebuild(e) => Some(e),
        }
    }
}
