//! Constrained expression language for SCRIPT and DECISION nodes.
//!
//! Scripts and conditions are parsed into a small AST and evaluated by a
//! tree-walking interpreter over JSON values. The evaluator only sees the
//! execution context: there is no access to the host environment.
//!
//! # Grammar
//!
//! - Literals: numbers, `'single'` / `"double"` quoted strings, `true`,
//!   `false`, `null`
//! - Variables: bare identifiers read context variables; the reserved
//!   identifier `responses` reads API node responses by node id
//! - Access: `a.b`, `a["b"]`, `list[0]`, `.length` on arrays and strings
//! - Operators, loosest first: `||`, `&&`, `== != === !==`, `< <= > >=`,
//!   `+ -`, `* / %`, unary `! -`
//! - Statements (scripts only): `place = expr`, `+=`, `-=`, `*=`, `/=`, or a
//!   bare expression; separated by `;` or newlines
//!
//! # Example
//!
//! ```ignore
//! let mut ctx = ExecutionContext::new();
//! run_script("count = 2; label = 'n=' + count", &mut ctx)?;
//! assert!(eval_condition("count >= 2 && label != ''", &ctx)?);
//! ```

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

use thiserror::Error;

use crate::context::ExecutionContext;

pub use ast::{AssignOp, BinaryOp, Expr, LogicalOp, PathSegment, Place, Stmt, UnaryOp};
pub use eval::{evaluate, execute, is_truthy};
pub use parser::{parse_expression, parse_script};

/// Identifier that resolves to the API response map
pub const RESPONSES_IDENT: &str = "responses";

/// Maximum nesting depth accepted by the parser
pub const MAX_DEPTH: usize = 64;

/// Errors raised while parsing or evaluating expressions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("expected {expected} but found {found} at offset {offset}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        offset: usize,
    },

    #[error("expression nested deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("invalid assignment target at offset {offset}")]
    InvalidAssignmentTarget { offset: usize },

    #[error("'{0}' is not defined")]
    UndefinedVariable(String),

    #[error("'{0}' is read-only")]
    ReadOnly(String),

    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("cannot apply '{op}' to {operand}")]
    InvalidOperand {
        op: &'static str,
        operand: &'static str,
    },

    #[error("cannot read property '{property}' of null")]
    NullAccess { property: String },

    #[error("cannot set property on missing '{property}'")]
    MissingProperty { property: String },

    #[error("{found} cannot be used as an index")]
    InvalidIndex { found: &'static str },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("cannot assign into {found}")]
    NotAContainer { found: &'static str },

    #[error("arithmetic produced a non-finite number")]
    NonFiniteNumber,
}

/// Parse and evaluate a condition, coercing the result to a boolean
pub fn eval_condition(source: &str, ctx: &ExecutionContext) -> Result<bool, ExprError> {
    let expr = parse_expression(source)?;
    Ok(is_truthy(&evaluate(&expr, ctx)?))
}

/// Parse and run a script against the context
///
/// Statements run in order; mutations made before a failing statement stay
/// applied.
pub fn run_script(source: &str, ctx: &mut ExecutionContext) -> Result<(), ExprError> {
    let statements = parse_script(source)?;
    execute(&statements, ctx)
}
