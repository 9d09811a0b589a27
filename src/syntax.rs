//! Syntax module for region conditions
//!
//! This module provides the Abstract Syntax Tree types for the boolean
//! expressions written after `#ifdef` / `#ifndef`, with source location tracking.

use serde::{Deserialize, Serialize};

pub use crate::runtime::Value;

pub mod parser;

/// Represents a byte span in source text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Converts a byte span to 1-based (start line, end line) in `source`.
    pub fn line_range(&self, source: &str) -> (usize, usize) {
        let line_of = |offset: usize| source[..offset.min(source.len())].matches('\n').count() + 1;
        let last = if self.end > self.start { self.end - 1 } else { self.end };
        (line_of(self.start), line_of(last))
    }
}

/// Wrapper for carrying source span information with any value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

/// Canonical AST node type.
pub type AstNode = Spanned<Box<Expr>>;

/// Binary operators, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    StrictEq,
    StrictNe,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "||" => BinaryOp::Or,
            "&&" => BinaryOp::And,
            "===" => BinaryOp::StrictEq,
            "!==" => BinaryOp::StrictNe,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            _ => return None,
        })
    }
}

/// The core AST node for conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Value),
    Identifier(String),
    Not(AstNode),
    Binary {
        op: BinaryOp,
        left: AstNode,
        right: AstNode,
    },
}

impl Expr {
    /// Pretty-prints the expression with explicit grouping.
    pub fn pretty(&self) -> String {
        match self {
            Expr::Literal(Value::String(s)) => format!("{:?}", s),
            Expr::Literal(value) => value.to_string(),
            Expr::Identifier(name) => name.clone(),
            Expr::Not(inner) => format!("!{}", inner.value.pretty()),
            Expr::Binary { op, left, right } => format!(
                "({} {} {})",
                left.value.pretty(),
                op.symbol(),
                right.value.pretty()
            ),
        }
    }
}
