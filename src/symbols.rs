//! Document outline extraction.
//!
//! Walks the AST pre-order and produces the nested [`CodeSymbol`] tree a
//! language server would use to back an outline view or breadcrumb bar.
//! This module only ever builds an in-memory tree; wiring it to a transport
//! layer (`tower_lsp_server`, `dashmap`-backed document state, and the like)
//! is a concern for the server that embeds this crate.

use serde::{Deserialize, Serialize};

use crate::ast::{Chunk, Expression, FunctionName, Statement};
use crate::bounds::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    LocalVariable,
    GlobalVariable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// The symbol's full extent, e.g. an entire function body.
    pub loc: Bounds,
    /// The range that should be highlighted when jumping to the symbol,
    /// e.g. just the function's name rather than its whole body.
    pub selection_loc: Bounds,
    /// A short human-readable signature, e.g. `function(a, b)`.
    pub detail: String,
    pub children: Vec<CodeSymbol>,
}

/// Extracts the top-level and nested symbol outline of a parsed chunk.
///
/// Global-assignment targets are collected separately from the rest of the
/// walk and appended at chunk level: a global written deep inside a
/// function or loop body still surfaces as a top-level symbol, regardless
/// of where in the tree the assignment textually sits.
pub fn extract_symbols(chunk: &Chunk) -> Vec<CodeSymbol> {
    let mut globals = Vec::new();
    let mut symbols = symbols_for_block(&chunk.body, &mut globals);
    symbols.extend(globals);
    symbols
}

fn symbols_for_block(body: &[Statement], globals: &mut Vec<CodeSymbol>) -> Vec<CodeSymbol> {
    let mut symbols = Vec::new();
    for stmt in body {
        collect_statement(stmt, &mut symbols, globals);
    }
    symbols
}

fn collect_statement(stmt: &Statement, out: &mut Vec<CodeSymbol>, globals: &mut Vec<CodeSymbol>) {
    match stmt {
        Statement::FunctionDeclaration {
            identifier,
            is_local,
            parameters,
            has_varargs,
            body,
            bounds,
        } => {
            let (name, selection_loc) = function_name_and_loc(identifier.as_ref(), *is_local, *bounds);
            let mut detail = String::from("function(");
            for (i, p) in parameters.iter().enumerate() {
                if i > 0 {
                    detail.push_str(", ");
                }
                detail.push_str(&p.name);
            }
            if *has_varargs {
                if !parameters.is_empty() {
                    detail.push_str(", ");
                }
                detail.push_str("...");
            }
            detail.push(')');

            out.push(CodeSymbol {
                name,
                kind: SymbolKind::Function,
                loc: *bounds,
                selection_loc,
                detail,
                children: symbols_for_block(body, globals),
            });
        }
        Statement::LocalStatement { names, init, bounds } => {
            for (i, id) in names.iter().enumerate() {
                let children = init
                    .get(i)
                    .map(|expr| symbols_for_expression_children(expr, globals))
                    .unwrap_or_default();
                out.push(CodeSymbol {
                    name: id.name.clone(),
                    kind: SymbolKind::LocalVariable,
                    loc: *bounds,
                    selection_loc: id.bounds,
                    detail: String::new(),
                    children,
                });
            }
        }
        Statement::AssignmentStatement {
            variables, init, bounds, ..
        } => {
            for (i, target) in variables.iter().enumerate() {
                if let Expression::Identifier(id) = target {
                    if !id.is_local {
                        let children = init
                            .get(i)
                            .map(|expr| symbols_for_expression_children(expr, globals))
                            .unwrap_or_default();
                        globals.push(CodeSymbol {
                            name: id.name.clone(),
                            kind: SymbolKind::GlobalVariable,
                            loc: *bounds,
                            selection_loc: id.bounds,
                            detail: String::new(),
                            children,
                        });
                    }
                }
            }
        }
        Statement::IfStatement { clauses, .. } => {
            for clause in clauses {
                out.extend(symbols_for_block(&clause.body, globals));
            }
        }
        Statement::WhileStatement { body, .. } | Statement::DoStatement { body, .. } => {
            out.extend(symbols_for_block(body, globals));
        }
        Statement::RepeatStatement { body, .. } => {
            out.extend(symbols_for_block(body, globals));
        }
        Statement::ForNumericStatement { body, .. } | Statement::ForGenericStatement { body, .. } => {
            out.extend(symbols_for_block(body, globals));
        }
        Statement::CallStatement { .. }
        | Statement::ReturnStatement { .. }
        | Statement::BreakStatement { .. }
        | Statement::GotoStatement { .. }
        | Statement::LabelStatement { .. }
        | Statement::IncludeStatement { .. } => {}
    }
}

/// Nested function expressions assigned as an initializer (e.g.
/// `local f = function() ... end`) still contribute their own outline
/// entries by descending into the closure body.
fn symbols_for_expression_children(expr: &Expression, globals: &mut Vec<CodeSymbol>) -> Vec<CodeSymbol> {
    match expr {
        Expression::FunctionExpression { body, .. } => symbols_for_block(body, globals),
        _ => Vec::new(),
    }
}

fn function_name_and_loc(
    identifier: Option<&FunctionName>,
    is_local: bool,
    fallback: Bounds,
) -> (String, Bounds) {
    match identifier {
        Some(name) => {
            let mut text = String::new();
            if is_local {
                text.push_str("local ");
            }
            for (i, seg) in name.path.iter().enumerate() {
                if i > 0 {
                    text.push('.');
                }
                text.push_str(&seg.name);
            }
            if let Some(method) = &name.method {
                text.push(':');
                text.push_str(&method.name);
            }
            (text, name.bounds)
        }
        None => ("<anonymous>".to_string(), fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn symbols_of(source: &str) -> Vec<CodeSymbol> {
        let mut parser = Parser::new(source);
        let ast = parser.parse_chunk();
        extract_symbols(&ast)
    }

    #[test]
    fn top_level_function_symbol() {
        let symbols = symbols_of("function f(a, b)\nend");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].kind, SymbolKind::Function);
        assert_eq!(symbols[0].name, "f");
        assert_eq!(symbols[0].detail, "function(a, b)");
    }

    #[test]
    fn nested_function_symbol() {
        let symbols = symbols_of("function outer()\n  function inner()\n  end\nend");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].children.len(), 1);
        assert_eq!(symbols[0].children[0].name, "inner");
    }

    #[test]
    fn local_and_global_variables() {
        let symbols = symbols_of("local x = 1\ny = 2");
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].kind, SymbolKind::LocalVariable);
        assert_eq!(symbols[0].name, "x");
        assert_eq!(symbols[1].kind, SymbolKind::GlobalVariable);
        assert_eq!(symbols[1].name, "y");
    }

    #[test]
    fn method_declaration_symbol_name() {
        let symbols = symbols_of("function t:m(a)\nend");
        assert_eq!(symbols[0].name, "t:m");
    }

    #[test]
    fn global_assigned_inside_function_is_promoted_to_chunk_level() {
        let symbols = symbols_of("function f()\n  score = 0\nend");
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].kind, SymbolKind::Function);
        assert!(symbols[0].children.is_empty());
        assert_eq!(symbols[1].kind, SymbolKind::GlobalVariable);
        assert_eq!(symbols[1].name, "score");
    }
}
