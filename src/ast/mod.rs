//! Exhaustive sum-type AST for the PICO-8 dialect.
//!
//! One `enum` variant per node kind, so every tree walk in `symbols.rs` /
//! `scope.rs` is checked exhaustively by the compiler.

use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub body: Vec<Statement>,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    IDivAssign,
    ModAssign,
    PowAssign,
    ConcatAssign,
    BAndAssign,
    BOrAssign,
    BXorAssign,
    ShlAssign,
    ShrAssign,
    UShrAssign,
    RotLAssign,
    RotRAssign,
}

impl AssignmentOperator {
    pub fn from_token_text(text: &str) -> Option<Self> {
        use AssignmentOperator::*;
        Some(match text {
            "=" => Assign,
            "+=" => AddAssign,
            "-=" => SubAssign,
            "*=" => MulAssign,
            "/=" => DivAssign,
            "\\=" => IDivAssign,
            "%=" => ModAssign,
            "^=" => PowAssign,
            "..=" => ConcatAssign,
            "&=" => BAndAssign,
            "|=" => BOrAssign,
            "^^=" => BXorAssign,
            "<<=" => ShlAssign,
            ">>=" => ShrAssign,
            ">>>=" => UShrAssign,
            "<<>=" => RotLAssign,
            ">><=" => RotRAssign,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        use AssignmentOperator::*;
        match self {
            Assign => "=",
            AddAssign => "+=",
            SubAssign => "-=",
            MulAssign => "*=",
            DivAssign => "/=",
            IDivAssign => "\\=",
            ModAssign => "%=",
            PowAssign => "^=",
            ConcatAssign => "..=",
            BAndAssign => "&=",
            BOrAssign => "|=",
            BXorAssign => "^^=",
            ShlAssign => "<<=",
            ShrAssign => ">>=",
            UShrAssign => ">>>=",
            RotLAssign => "<<>=",
            RotRAssign => ">><=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    /// Covers both the canonical `~=` and the PICO-8 synonym `!=`, already
    /// normalized by the parser.
    Ne,
    BOr,
    BXor,
    BAnd,
    Shl,
    Shr,
    UShr,
    RotL,
    RotR,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            Eq => "==",
            Ne => "~=",
            BOr => "|",
            BXor => "^^",
            BAnd => "&",
            Shl => "<<",
            Shr => ">>",
            UShr => ">>>",
            RotL => "<<>",
            RotR => ">><",
            Concat => "..",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            IDiv => "\\",
            Mod => "%",
            Pow => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Neg,
    Not,
    Len,
    BNot,
    /// PICO-8 peek unaries `@` (peek byte), `%` (peek word), `$` (peek dword).
    PeekByte,
    PeekWord,
    PeekDword,
}

impl UnaryOperator {
    pub fn as_str(&self) -> &'static str {
        use UnaryOperator::*;
        match self {
            Neg => "-",
            Not => "not",
            Len => "#",
            BNot => "~",
            PeekByte => "@",
            PeekWord => "%",
            PeekDword => "$",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub is_local: bool,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Identifier(Identifier),
    NumericLiteral {
        value: f64,
        raw: String,
        bounds: Bounds,
    },
    StringLiteral {
        value: String,
        raw: String,
        bounds: Bounds,
    },
    BooleanLiteral {
        value: bool,
        bounds: Bounds,
    },
    NilLiteral {
        bounds: Bounds,
    },
    VarargLiteral {
        bounds: Bounds,
    },
    BinaryExpression {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        bounds: Bounds,
    },
    LogicalExpression {
        operator: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        bounds: Bounds,
    },
    UnaryExpression {
        operator: UnaryOperator,
        argument: Box<Expression>,
        bounds: Bounds,
    },
    IndexExpression {
        base: Box<Expression>,
        index: Box<Expression>,
        bounds: Bounds,
    },
    MemberExpression {
        base: Box<Expression>,
        indexer: MemberIndexer,
        identifier: Identifier,
        bounds: Bounds,
    },
    CallExpression {
        base: Box<Expression>,
        arguments: Vec<Expression>,
        bounds: Bounds,
    },
    TableCallExpression {
        base: Box<Expression>,
        argument: Box<Expression>,
        bounds: Bounds,
    },
    StringCallExpression {
        base: Box<Expression>,
        argument: Box<Expression>,
        bounds: Bounds,
    },
    TableConstructorExpression {
        fields: Vec<TableField>,
        bounds: Bounds,
    },
    FunctionExpression {
        parameters: Vec<Identifier>,
        has_varargs: bool,
        body: Vec<Statement>,
        bounds: Bounds,
    },
}

impl Expression {
    pub fn bounds(&self) -> Bounds {
        match self {
            Expression::Identifier(id) => id.bounds,
            Expression::NumericLiteral { bounds, .. }
            | Expression::StringLiteral { bounds, .. }
            | Expression::BooleanLiteral { bounds, .. }
            | Expression::NilLiteral { bounds }
            | Expression::VarargLiteral { bounds }
            | Expression::BinaryExpression { bounds, .. }
            | Expression::LogicalExpression { bounds, .. }
            | Expression::UnaryExpression { bounds, .. }
            | Expression::IndexExpression { bounds, .. }
            | Expression::MemberExpression { bounds, .. }
            | Expression::CallExpression { bounds, .. }
            | Expression::TableCallExpression { bounds, .. }
            | Expression::StringCallExpression { bounds, .. }
            | Expression::TableConstructorExpression { bounds, .. }
            | Expression::FunctionExpression { bounds, .. } => *bounds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberIndexer {
    Dot,
    Colon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableFieldKind {
    List,
    Named,
    Keyed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableField {
    pub kind: TableFieldKind,
    /// Present for `Named` (an identifier used as a string key) and `Keyed`
    /// (an arbitrary key expression in `[k] = v`).
    pub key: Option<Expression>,
    pub value: Expression,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IfClauseKind {
    If,
    Elseif,
    Else,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfClause {
    pub kind: IfClauseKind,
    pub condition: Option<Expression>,
    pub body: Vec<Statement>,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionName {
    /// Dotted path segments, e.g. `a.b.c` -> `["a", "b", "c"]`.
    pub path: Vec<Identifier>,
    /// Present for a method declaration (`function t:m(...)`).
    pub method: Option<Identifier>,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    AssignmentStatement {
        operator: AssignmentOperator,
        variables: Vec<Expression>,
        init: Vec<Expression>,
        bounds: Bounds,
    },
    LocalStatement {
        names: Vec<Identifier>,
        init: Vec<Expression>,
        bounds: Bounds,
    },
    CallStatement {
        expression: Expression,
        bounds: Bounds,
    },
    IfStatement {
        clauses: Vec<IfClause>,
        bounds: Bounds,
    },
    WhileStatement {
        condition: Expression,
        body: Vec<Statement>,
        bounds: Bounds,
    },
    RepeatStatement {
        body: Vec<Statement>,
        condition: Expression,
        bounds: Bounds,
    },
    ForNumericStatement {
        variable: Identifier,
        start: Expression,
        end: Expression,
        step: Option<Expression>,
        body: Vec<Statement>,
        bounds: Bounds,
    },
    ForGenericStatement {
        variables: Vec<Identifier>,
        iterators: Vec<Expression>,
        body: Vec<Statement>,
        bounds: Bounds,
    },
    FunctionDeclaration {
        identifier: Option<FunctionName>,
        is_local: bool,
        parameters: Vec<Identifier>,
        has_varargs: bool,
        body: Vec<Statement>,
        bounds: Bounds,
    },
    ReturnStatement {
        arguments: Vec<Expression>,
        bounds: Bounds,
    },
    BreakStatement {
        bounds: Bounds,
    },
    GotoStatement {
        label: String,
        bounds: Bounds,
    },
    LabelStatement {
        name: String,
        bounds: Bounds,
    },
    DoStatement {
        body: Vec<Statement>,
        bounds: Bounds,
    },
    IncludeStatement {
        path: String,
        bounds: Bounds,
    },
}

impl Statement {
    pub fn bounds(&self) -> Bounds {
        match self {
            Statement::AssignmentStatement { bounds, .. }
            | Statement::LocalStatement { bounds, .. }
            | Statement::CallStatement { bounds, .. }
            | Statement::IfStatement { bounds, .. }
            | Statement::WhileStatement { bounds, .. }
            | Statement::RepeatStatement { bounds, .. }
            | Statement::ForNumericStatement { bounds, .. }
            | Statement::ForGenericStatement { bounds, .. }
            | Statement::FunctionDeclaration { bounds, .. }
            | Statement::ReturnStatement { bounds, .. }
            | Statement::BreakStatement { bounds }
            | Statement::GotoStatement { bounds, .. }
            | Statement::LabelStatement { bounds, .. }
            | Statement::DoStatement { bounds, .. }
            | Statement::IncludeStatement { bounds, .. } => *bounds,
        }
    }
}
