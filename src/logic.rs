pub mod cancel;
pub mod lexer;
pub mod tokenizer;
