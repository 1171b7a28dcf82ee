//! Lexer, parser, and static-analysis core for the PICO-8 dialect of Lua.
//!
//! The crate exposes a single pure entry point, [`parse`], that turns source
//! text into an AST plus the three derived indices a language server needs:
//! a document outline (`symbols`), a definitions/usages index keyed by
//! source position (`definitions_usages`), and a nested scope tree
//! (`scopes`). Everything downstream of tokenizing — JSON-RPC transport,
//! diagnostic presentation, workspace discovery — is left to the caller.

pub mod ast;
pub mod bounds;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod symbols;

pub use ast::Chunk;
pub use bounds::{Bounds, Position};
pub use diagnostics::{ParseError, ParseErrorKind, Warning, WarningKind};
pub use scope::{DefUseIndex, DefinitionsUsages, Scope, ScopeTree};
pub use symbols::{CodeSymbol, SymbolKind};

/// The result of parsing and analyzing one document.
///
/// `errors` and `warnings` accumulate rather than short-circuit; a document
/// with syntax errors still yields a best-effort `ast` and fully populated
/// `symbols` / `definitions_usages` / `scopes`.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub ast: Chunk,
    pub errors: Vec<ParseError>,
    pub warnings: Vec<Warning>,
    pub symbols: Vec<CodeSymbol>,
    pub definitions_usages: DefUseIndex,
    pub scopes: ScopeTree,
}

/// Parses `source` and derives the outline, scope tree, and def/use index in
/// one pass. Total and deterministic: never panics, never blocks, and
/// touches no process-wide mutable state, so independent documents may be
/// parsed concurrently on separate threads.
pub fn parse(source: &str) -> ParseResult {
    log::debug!("parsing {} bytes", source.len());

    let mut parser = parser::Parser::new(source);
    let mut ast = parser.parse_chunk();
    let errors = parser.into_errors();

    // Resolution mutates `Identifier::is_local` to its final value, so it
    // must run before the outline is extracted.
    let (scopes, definitions_usages, warnings) = scope::resolve(&mut ast);
    let symbols = symbols::extract_symbols(&ast);

    log::debug!(
        "parse finished: {} errors, {} warnings, {} top-level symbols",
        errors.len(),
        warnings.len(),
        symbols.len()
    );

    ParseResult {
        ast,
        errors,
        warnings,
        symbols,
        definitions_usages,
        scopes,
    }
}
