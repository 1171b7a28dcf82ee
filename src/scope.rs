//! Scope tree construction and definition/usage resolution.
//!
//! A single mutable walk over the AST that does three things at once: builds
//! a nested [`ScopeTree`], fills in every [`crate::ast::Identifier`]'s
//! `is_local` flag with its *final* resolution rather than a parse-time
//! guess, and builds a [`DefUseIndex`] keyed by stable integer handles.
//! Scopes live in an arena addressed by index rather than a tree of owning
//! pointers, so a scope and the defuse index can both reference a
//! [`Definition`] by id without an `Rc<RefCell<_>>` cycle between them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ast::{Chunk, Expression, FunctionName, Identifier, Statement};
use crate::bounds::Bounds;
use crate::diagnostics::{Warning, WarningKind};

pub type ScopeId = usize;
pub type DefinitionId = usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub bounds: Bounds,
    /// Locals (and, for the root scope, globals) declared directly in this
    /// scope, keyed by name.
    pub locals: HashMap<String, DefinitionId>,
}

impl Scope {
    /// Every identifier visible from this scope: its own locals, plus,
    /// walking outward through `parent` links, every local visible from
    /// each enclosing scope (the chunk-level globals live on the root
    /// scope, so they come out last). A name declared in an inner scope
    /// shadows an outer declaration of the same name.
    pub fn all_symbols(&self, tree: &ScopeTree, index: &DefUseIndex) -> Vec<Identifier> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut current = Some(self.id);
        while let Some(id) = current {
            let scope = tree.get(id);
            for (name, &def_id) in &scope.locals {
                if seen.insert(name.clone()) {
                    let def = &index.definitions[def_id];
                    out.push(Identifier {
                        name: def.name.clone(),
                        is_local: def.is_local,
                        bounds: def.bounds,
                    });
                }
            }
            current = scope.parent;
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeTree {
    pub scopes: Vec<Scope>,
    pub root: ScopeId,
}

impl ScopeTree {
    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    /// The innermost scope whose bounds contain `(line, column)`, if any.
    pub fn scope_at(&self, line: usize, column: usize) -> Option<ScopeId> {
        let mut best: Option<ScopeId> = None;
        for scope in &self.scopes {
            if scope.bounds.contains_position(line, column) {
                best = match best {
                    Some(b) if self.scopes[b].bounds.contains(&scope.bounds) => Some(scope.id),
                    Some(b) => Some(b),
                    None => Some(scope.id),
                };
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub scope: ScopeId,
    pub bounds: Bounds,
    pub is_local: bool,
}

/// One definition and every place it is read or written afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionsUsages {
    pub definition: DefinitionId,
    pub usages: Vec<Bounds>,
}

/// Positional definitions<->usages index: supports both "go to definition"
/// (via [`DefUseIndex::definition_at`]) and "find references" (via
/// [`DefUseIndex::usages_of`]) without either side owning the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefUseIndex {
    pub definitions: Vec<Definition>,
    entries: Vec<DefinitionsUsages>,
}

impl DefUseIndex {
    fn new() -> Self {
        DefUseIndex {
            definitions: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn usages_of(&self, id: DefinitionId) -> &[Bounds] {
        &self.entries[id].usages
    }

    /// The definition whose declaration or a usage covers `(line, column)`.
    pub fn definition_at(&self, line: usize, column: usize) -> Option<DefinitionId> {
        for (id, def) in self.definitions.iter().enumerate() {
            if def.bounds.contains_position(line, column) {
                return Some(id);
            }
        }
        for entry in &self.entries {
            if entry.usages.iter().any(|b| b.contains_position(line, column)) {
                return Some(entry.definition);
            }
        }
        None
    }
}

struct Resolver {
    tree: ScopeTree,
    index: DefUseIndex,
    scope_stack: Vec<ScopeId>,
    /// Definitions eligible for an unused-local warning: `local` statement
    /// names, `for` loop variables, and `local function` names. Parameters
    /// and globals are excluded, matching common Lua-linter convention.
    checkable: Vec<DefinitionId>,
    warnings: Vec<Warning>,
}

impl Resolver {
    fn new(root_bounds: Bounds) -> Self {
        let root = Scope {
            id: 0,
            parent: None,
            children: Vec::new(),
            bounds: root_bounds,
            locals: HashMap::new(),
        };
        Resolver {
            tree: ScopeTree {
                scopes: vec![root],
                root: 0,
            },
            index: DefUseIndex::new(),
            scope_stack: vec![0],
            checkable: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("root scope always present")
    }

    fn push_scope(&mut self, bounds: Bounds) -> ScopeId {
        let parent = self.current_scope();
        let id = self.tree.scopes.len();
        self.tree.scopes.push(Scope {
            id,
            parent: Some(parent),
            children: Vec::new(),
            bounds,
            locals: HashMap::new(),
        });
        self.tree.scopes[parent].children.push(id);
        self.scope_stack.push(id);
        id
    }

    fn pop_scope(&mut self) {
        let id = self.scope_stack.pop().expect("push/pop balanced");
        let locals: Vec<DefinitionId> = self.tree.scopes[id].locals.values().copied().collect();
        for def_id in locals {
            if self.checkable.contains(&def_id) && self.index.entries[def_id].usages.is_empty() {
                let def = &self.index.definitions[def_id];
                self.warnings.push(Warning::new(
                    WarningKind::UnusedLocal,
                    format!("unused local '{}'", def.name),
                    def.bounds,
                ));
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<DefinitionId> {
        for &scope_id in self.scope_stack.iter().rev() {
            if let Some(&def_id) = self.tree.scopes[scope_id].locals.get(name) {
                return Some(def_id);
            }
        }
        None
    }

    fn declare(&mut self, name: &str, bounds: Bounds, is_local: bool, checkable: bool) -> DefinitionId {
        if is_local {
            if let Some(shadowed) = self.lookup(name) {
                let shadowed_name = self.index.definitions[shadowed].name.clone();
                self.warnings.push(Warning::new(
                    WarningKind::Shadowing,
                    format!("local '{shadowed_name}' shadows an outer definition"),
                    bounds,
                ));
            }
        }

        let scope = self.current_scope();
        let def_id = self.index.definitions.len();
        self.index.definitions.push(Definition {
            name: name.to_string(),
            scope,
            bounds,
            is_local,
        });
        self.index.entries.push(DefinitionsUsages {
            definition: def_id,
            usages: Vec::new(),
        });
        self.tree.scopes[scope].locals.insert(name.to_string(), def_id);
        if checkable {
            self.checkable.push(def_id);
        }
        def_id
    }

    fn declare_local(&mut self, id: &mut Identifier, checkable: bool) {
        id.is_local = true;
        self.declare(&id.name, id.bounds, true, checkable);
    }

    /// Resolves a read of `id`: marks it local/global and records a usage,
    /// or — if nothing defines it anywhere in scope — warns once and
    /// registers a tentative global placeholder at the root scope, so that
    /// every later read of the same name links to that same definition
    /// instead of warning again.
    fn use_identifier(&mut self, id: &mut Identifier) {
        match self.lookup(&id.name) {
            Some(def_id) => {
                id.is_local = self.index.definitions[def_id].is_local;
                self.index.entries[def_id].usages.push(id.bounds);
            }
            None => {
                id.is_local = false;
                self.warnings.push(Warning::new(
                    WarningKind::UndefinedIdentifier,
                    format!("undefined identifier '{}'", id.name),
                    id.bounds,
                ));
                let root = self.tree.root;
                let def_id = self.index.definitions.len();
                self.index.definitions.push(Definition {
                    name: id.name.clone(),
                    scope: root,
                    bounds: id.bounds,
                    is_local: false,
                });
                self.index.entries.push(DefinitionsUsages {
                    definition: def_id,
                    usages: Vec::new(),
                });
                self.tree.scopes[root].locals.insert(id.name.clone(), def_id);
            }
        }
    }

    /// Resolves the root identifier of an assignment target (bare
    /// `x = ...`, or the root of `x.y = ...` / `x[y] = ...`): a write to an
    /// undefined name silently promotes it to a global instead of warning.
    fn use_or_declare_global(&mut self, id: &mut Identifier) {
        match self.lookup(&id.name) {
            Some(def_id) => {
                id.is_local = self.index.definitions[def_id].is_local;
                self.index.entries[def_id].usages.push(id.bounds);
            }
            None => {
                id.is_local = false;
                let root = self.tree.root;
                let def_id = self.index.definitions.len();
                self.index.definitions.push(Definition {
                    name: id.name.clone(),
                    scope: root,
                    bounds: id.bounds,
                    is_local: false,
                });
                self.index.entries.push(DefinitionsUsages {
                    definition: def_id,
                    usages: Vec::new(),
                });
                self.tree.scopes[root].locals.insert(id.name.clone(), def_id);
            }
        }
    }

    // ---- AST walk ---------------------------------------------------------

    fn resolve_block(&mut self, body: &mut [Statement]) {
        for stmt in body {
            self.resolve_statement(stmt);
        }
    }

    fn resolve_statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::LocalStatement { names, init, .. } => {
                for expr in init.iter_mut() {
                    self.resolve_expression(expr);
                }
                for name in names.iter_mut() {
                    self.declare_local(name, true);
                }
            }
            Statement::AssignmentStatement { variables, init, .. } => {
                for expr in init.iter_mut() {
                    self.resolve_expression(expr);
                }
                for target in variables.iter_mut() {
                    self.resolve_assignment_target(target);
                }
            }
            Statement::CallStatement { expression, .. } => {
                self.resolve_expression(expression);
            }
            Statement::IfStatement { clauses, .. } => {
                for clause in clauses {
                    if let Some(cond) = &mut clause.condition {
                        self.resolve_expression(cond);
                    }
                    self.push_scope(clause.bounds);
                    self.resolve_block(&mut clause.body);
                    self.pop_scope();
                }
            }
            Statement::WhileStatement { condition, body, bounds } => {
                self.resolve_expression(condition);
                self.push_scope(*bounds);
                self.resolve_block(body);
                self.pop_scope();
            }
            Statement::RepeatStatement { body, condition, bounds } => {
                // `until` may reference locals declared in the loop body, so
                // the condition is resolved inside the loop's own scope.
                self.push_scope(*bounds);
                self.resolve_block(body);
                self.resolve_expression(condition);
                self.pop_scope();
            }
            Statement::ForNumericStatement {
                variable,
                start,
                end,
                step,
                body,
                bounds,
            } => {
                self.resolve_expression(start);
                self.resolve_expression(end);
                if let Some(step) = step {
                    self.resolve_expression(step);
                }
                self.push_scope(*bounds);
                self.declare_local(variable, true);
                self.resolve_block(body);
                self.pop_scope();
            }
            Statement::ForGenericStatement {
                variables,
                iterators,
                body,
                bounds,
            } => {
                for expr in iterators.iter_mut() {
                    self.resolve_expression(expr);
                }
                self.push_scope(*bounds);
                for var in variables.iter_mut() {
                    self.declare_local(var, true);
                }
                self.resolve_block(body);
                self.pop_scope();
            }
            Statement::FunctionDeclaration {
                identifier,
                is_local,
                parameters,
                body,
                bounds,
                ..
            } => {
                self.resolve_function_name(identifier, *is_local);
                self.push_scope(*bounds);
                for param in parameters.iter_mut() {
                    self.declare_local(param, false);
                }
                self.resolve_block(body);
                self.pop_scope();
            }
            Statement::ReturnStatement { arguments, .. } => {
                for expr in arguments.iter_mut() {
                    self.resolve_expression(expr);
                }
            }
            Statement::DoStatement { body, bounds } => {
                self.push_scope(*bounds);
                self.resolve_block(body);
                self.pop_scope();
            }
            Statement::BreakStatement { .. }
            | Statement::GotoStatement { .. }
            | Statement::LabelStatement { .. }
            | Statement::IncludeStatement { .. } => {}
        }
    }

    /// `function name(...) ... end` is sugar for an assignment to `name`
    /// (or, for a method, to `name.path...method`): the root segment
    /// resolves like an assignment target, the rest are member names, not
    /// variable references.
    fn resolve_function_name(&mut self, identifier: &mut Option<FunctionName>, is_local: bool) {
        let Some(name) = identifier else { return };
        let Some(root) = name.path.first_mut() else {
            return;
        };
        if is_local {
            self.declare_local(root, true);
        } else {
            self.use_or_declare_global(root);
        }
    }

    fn resolve_assignment_target(&mut self, expr: &mut Expression) {
        match expr {
            Expression::Identifier(id) => self.use_or_declare_global(id),
            Expression::IndexExpression { base, index, .. } => {
                self.resolve_assignment_base(base);
                self.resolve_expression(index);
            }
            Expression::MemberExpression { base, .. } => {
                self.resolve_assignment_base(base);
            }
            other => self.resolve_expression(other),
        }
    }

    /// The root of an assignment target's base chain is resolved the same
    /// way a bare assignment target would be; anything nested inside it
    /// (e.g. the `t` in `t[k()].field = 1`) is resolved as an ordinary read.
    fn resolve_assignment_base(&mut self, expr: &mut Expression) {
        match expr {
            Expression::Identifier(id) => self.use_or_declare_global(id),
            Expression::IndexExpression { base, index, .. } => {
                self.resolve_assignment_base(base);
                self.resolve_expression(index);
            }
            Expression::MemberExpression { base, .. } => {
                self.resolve_assignment_base(base);
            }
            other => self.resolve_expression(other),
        }
    }

    fn resolve_expression(&mut self, expr: &mut Expression) {
        match expr {
            Expression::Identifier(id) => self.use_identifier(id),
            Expression::NumericLiteral { .. }
            | Expression::StringLiteral { .. }
            | Expression::BooleanLiteral { .. }
            | Expression::NilLiteral { .. }
            | Expression::VarargLiteral { .. } => {}
            Expression::BinaryExpression { left, right, .. }
            | Expression::LogicalExpression { left, right, .. } => {
                self.resolve_expression(left);
                self.resolve_expression(right);
            }
            Expression::UnaryExpression { argument, .. } => {
                self.resolve_expression(argument);
            }
            Expression::IndexExpression { base, index, .. } => {
                self.resolve_expression(base);
                self.resolve_expression(index);
            }
            Expression::MemberExpression { base, .. } => {
                self.resolve_expression(base);
            }
            Expression::CallExpression { base, arguments, .. } => {
                self.resolve_expression(base);
                for arg in arguments.iter_mut() {
                    self.resolve_expression(arg);
                }
            }
            Expression::TableCallExpression { base, argument, .. }
            | Expression::StringCallExpression { base, argument, .. } => {
                self.resolve_expression(base);
                self.resolve_expression(argument);
            }
            Expression::TableConstructorExpression { fields, .. } => {
                for field in fields.iter_mut() {
                    if let Some(key) = &mut field.key {
                        if matches!(field.kind, crate::ast::TableFieldKind::Keyed) {
                            self.resolve_expression(key);
                        }
                        // Named-field keys are bare identifiers used as
                        // string keys, not variable references.
                    }
                    self.resolve_expression(&mut field.value);
                }
            }
            Expression::FunctionExpression {
                parameters,
                body,
                bounds,
                ..
            } => {
                self.push_scope(*bounds);
                for param in parameters.iter_mut() {
                    self.declare_local(param, false);
                }
                self.resolve_block(body);
                self.pop_scope();
            }
        }
    }

    fn finish(self) -> (ScopeTree, DefUseIndex, Vec<Warning>) {
        (self.tree, self.index, self.warnings)
    }
}

/// Builds the scope tree and definitions/usages index for `ast`, mutating
/// every [`Identifier::is_local`] in place to its final resolution.
pub fn resolve(ast: &mut Chunk) -> (ScopeTree, DefUseIndex, Vec<Warning>) {
    let mut resolver = Resolver::new(ast.bounds);
    resolver.resolve_block(&mut ast.body);
    resolver.pop_scope(); // root: runs the same unused-local sweep as any other scope
    resolver.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Statement;
    use crate::parser::Parser;

    fn analyze(source: &str) -> (Chunk, ScopeTree, DefUseIndex, Vec<Warning>) {
        let mut parser = Parser::new(source);
        let mut ast = parser.parse_chunk();
        let (tree, index, warnings) = resolve(&mut ast);
        (ast, tree, index, warnings)
    }

    #[test]
    fn local_is_marked_local_at_use_site() {
        let (ast, _, _, warnings) = analyze("local x = 1\nprint(x)");
        assert!(!warnings.iter().any(|w| w.kind == WarningKind::UndefinedIdentifier));
        match &ast.body[1] {
            Statement::CallStatement { expression, .. } => match expression {
                Expression::CallExpression { arguments, .. } => {
                    assert!(matches!(&arguments[0], Expression::Identifier(id) if id.is_local));
                }
                other => panic!("expected call, got {other:?}"),
            },
            other => panic!("expected call statement, got {other:?}"),
        }
    }

    #[test]
    fn undefined_global_read_warns() {
        let (_, _, _, warnings) = analyze("print(missing)");
        assert!(warnings
            .iter()
            .any(|w| w.kind == WarningKind::UndefinedIdentifier && w.message.contains("missing")));
    }

    #[test]
    fn undeclared_assignment_creates_global_without_warning() {
        let (ast, tree, _, warnings) = analyze("score = 0");
        assert!(!warnings.iter().any(|w| w.kind == WarningKind::UndefinedIdentifier));
        match &ast.body[0] {
            Statement::AssignmentStatement { variables, .. } => {
                assert!(matches!(&variables[0], Expression::Identifier(id) if !id.is_local));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
        assert!(tree.scopes[tree.root].locals.contains_key("score"));
    }

    #[test]
    fn member_assignment_promotes_undefined_base_to_global() {
        let (_, tree, _, warnings) = analyze("foo.bar = 1");
        assert!(!warnings.iter().any(|w| w.kind == WarningKind::UndefinedIdentifier));
        assert!(tree.scopes[tree.root].locals.contains_key("foo"));
    }

    #[test]
    fn local_x_equals_x_binds_to_outer_scope() {
        let (ast, _, _, warnings) = analyze("x = 1\nlocal x = x");
        assert!(!warnings.iter().any(|w| w.kind == WarningKind::UndefinedIdentifier));
        match &ast.body[1] {
            Statement::LocalStatement { names, init, .. } => {
                assert!(names[0].is_local);
                assert!(matches!(&init[0], Expression::Identifier(id) if !id.is_local));
            }
            other => panic!("expected local statement, got {other:?}"),
        }
    }

    #[test]
    fn method_declaration_registers_self_without_unused_warning() {
        let (_, _, _, warnings) = analyze("function t:m()\nend");
        assert!(!warnings.iter().any(|w| w.kind == WarningKind::UnusedLocal && w.message.contains("self")));
    }

    #[test]
    fn unused_local_warns() {
        let (_, _, _, warnings) = analyze("local unused = 1\nreturn 0");
        assert!(warnings
            .iter()
            .any(|w| w.kind == WarningKind::UnusedLocal && w.message.contains("unused")));
    }

    #[test]
    fn shadowing_a_local_warns() {
        let (_, _, _, warnings) = analyze("local x = 1\ndo\nlocal x = 2\nprint(x)\nend");
        assert!(warnings.iter().any(|w| w.kind == WarningKind::Shadowing));
    }

    #[test]
    fn function_is_visible_inside_its_own_body_for_recursion() {
        let (_, _, _, warnings) = analyze("local function fact(n)\nif (n < 2) return 1\nreturn n * fact(n - 1)\nend");
        assert!(!warnings.iter().any(|w| w.kind == WarningKind::UndefinedIdentifier));
    }

    #[test]
    fn nested_scopes_have_correct_parent_chain() {
        let (_, tree, _, _) = analyze("function f()\nif true then\nlocal y = 1\nend\nend");
        assert_eq!(tree.scopes.len(), 3); // root, function body, if clause
        let if_scope = &tree.scopes[2];
        assert_eq!(if_scope.parent, Some(1));
    }

    #[test]
    fn repeated_undefined_read_warns_once_and_links_usages() {
        let (_, _, index, warnings) = analyze("print(missing)\nprint(missing)");
        let warning_count = warnings
            .iter()
            .filter(|w| w.kind == WarningKind::UndefinedIdentifier && w.message.contains("missing"))
            .count();
        assert_eq!(warning_count, 1);
        let def_id = index
            .definitions
            .iter()
            .position(|d| d.name == "missing")
            .expect("placeholder definition recorded");
        assert_eq!(index.usages_of(def_id).len(), 1);
    }

    #[test]
    fn all_symbols_walks_outward_and_dedups_shadowed_names() {
        let (_, tree, index, _) = analyze("x = 1\nfunction f()\nlocal x = 2\nlocal y = 3\nend");
        let func_scope = tree.get(1);
        let symbols = func_scope.all_symbols(&tree, &index);
        let names: Vec<&str> = symbols.iter().map(|i| i.name.as_str()).collect();
        assert!(names.contains(&"y"));
        assert_eq!(names.iter().filter(|&&n| n == "x").count(), 1);
        let x = symbols.iter().find(|i| i.name == "x").unwrap();
        assert!(x.is_local);
    }
}
