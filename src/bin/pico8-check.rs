//! # pico8-check
//!
//! A small CLI around [`pico8_lang::parse`] for manual inspection: feed it a
//! source file and it prints the diagnostics and document outline a language
//! server would surface. Demonstration/debugging tooling, not part of the
//! core library's contract.

use std::fs;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use pico8_lang::{CodeSymbol, ParseResult};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// The path to the PICO-8 source file.
    #[arg(index = 1)]
    file: std::path::PathBuf,

    /// Specify the log level of the tool.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    verbosity: LogLevel,

    /// Print the parsed AST instead of diagnostics and outline.
    #[arg(long)]
    dump_ast: bool,
}

#[derive(ValueEnum, Clone, Default, Debug)]
enum LogLevel {
    #[default]
    #[value(alias("0"))]
    Error,
    #[value(alias("1"))]
    Warn,
    #[value(alias("2"))]
    Info,
    #[value(alias("3"))]
    Debug,
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    simple_logger::init_with_level((&args.verbosity).into()).unwrap();

    let source = fs::read_to_string(&args.file)
        .with_context(|| format!("could not read file '{}'", args.file.display()))?;

    info!("parsing {}", args.file.display());
    let result = pico8_lang::parse(&source);

    if args.dump_ast {
        println!("{:#?}", result.ast);
        return Ok(());
    }

    report(&result, &source);
    if !result.errors.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn report(result: &ParseResult, source: &str) {
    for error in &result.errors {
        eprintln!("{}\n", error.render(source));
    }
    for warning in &result.warnings {
        eprintln!("{}\n", warning.render(source));
    }

    println!("outline:");
    for symbol in &result.symbols {
        print_symbol(symbol, 0);
    }
}

fn print_symbol(symbol: &CodeSymbol, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{indent}{:?} {} {}",
        symbol.kind, symbol.name, symbol.detail
    );
    for child in &symbol.children {
        print_symbol(child, depth + 1);
    }
}
