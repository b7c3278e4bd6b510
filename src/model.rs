pub mod span;
pub mod versioned;
pub mod document;
pub mod token;
