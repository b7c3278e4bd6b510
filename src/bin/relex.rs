//! Tokenizes a file, replays edits against it one at a time, and prints the
//! resulting tokens.
//!
//! Usage:
//!   relex `<path>` [-e `<start>..<end>=<text>`]... [-c `<config>`] [-v]...

use std::fs;
use std::path;
use std::process;
use std::sync;

use clap::Parser;
use itertools::Itertools;
use tracing::{event, Level};

use relex::config;
use relex::logic::lexer;
use relex::logic::lexer::asm;
use relex::logic::lexer::Lexer;
use relex::logic::tokenizer;
use relex::model::document;
use relex::model::span::Span;

#[derive(Parser, Debug)]
#[command(version, about = "Incrementally tokenizes assembly source")]
struct Args {
    /// File to tokenize
    path: path::PathBuf,

    /// Replace bytes START..END with TEXT. May be repeated; edits apply in order.
    #[arg(short, long = "edit", value_name = "START..END=TEXT", value_parser = parse_edit)]
    edits: Vec<(Span, String)>,

    /// Config file to use instead of $XDG_CONFIG_HOME/relex/config.toml
    #[arg(short, long)]
    config: Option<path::PathBuf>,

    /// More logging. Repeat for even more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_edit(arg: &str) -> Result<(Span, String), String> {
    let (range, text) = arg.split_once('=').ok_or("expected START..END=TEXT")?;
    let (start, end) = range.split_once("..").ok_or("expected START..END")?;

    let start: usize = start.parse().map_err(|e| format!("bad start offset: {}", e))?;
    let end: usize = end.parse().map_err(|e| format!("bad end offset: {}", e))?;
    let span = Span::between(start, end).ok_or("end comes before start")?;

    Ok((span, text.to_string()))
}

fn setup_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    match &args.config {
        Some(path) => config::load(path)?,
        None => config::load_default()?,
    }

    let text = fs::read_to_string(&args.path)?;
    let lexer: sync::Arc<dyn lexer::Lexer> = sync::Arc::new(asm::AsmLexer);
    let host = document::DocumentHost::new(document::Document::new(text));
    let mut tokenizer = tokenizer::Tokenizer::new(host.get(), lexer.clone())?;

    for (span, text) in args.edits {
        let transition = host.replace(&host.get(), span, text)?;
        tokenizer.apply_transition(&transition)?;

        let result = tokenizer.current_result();
        event!(Level::INFO, generation = tokenizer.version().generation(), updated = %result.updated.iter().map(|t| t.span).format(", "), "applied edit");
    }

    let document = tokenizer.document().clone();
    let tokens = tokenizer.tokens().to_vec()?;

    for token in &tokens {
        let text = document.slice(token.span).unwrap_or_default();
        println!("{:>6} {:>4} {:<12} {:?}", token.span.start, token.span.length, format!("{:?}", tokenizer.get_token_type(token.ty)), text);
    }

    let exact = lexer.lex(document.text())? == tokens;
    eprintln!("{} tokens, {} fallbacks, {}", tokens.len(), tokenizer.fallbacks(), if exact { "matches full lex" } else { "DIFFERS FROM FULL LEX" });

    if exact {
        Ok(())
    } else {
        Err("incremental result differs from a full lex".into())
    }
}

fn main() {
    let args = Args::parse();
    setup_tracing(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
