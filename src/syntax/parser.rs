//! Condition Parser
//!
//! Converts the condition text of a start marker into an AST with source
//! location tracking. Purely syntactic; names are resolved by the evaluator.

use crate::errors::{to_source_span, ErrorReporting, IfdefError, ReportContext, SourceContext};
use crate::syntax::{AstNode, BinaryOp, Expr, Span, Spanned, Value};
use pest::{error::Error, iterators::Pair, Parser};
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct ConditionParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse a condition into a single AST node.
///
/// Spans are relative to `source_text`; errors carry `source_context` so they
/// can be re-anchored into the enclosing file with [`IfdefError::with_source`].
pub fn parse(source_text: &str, source_context: &SourceContext) -> Result<AstNode, IfdefError> {
    let ctx = ReportContext::new(source_context.clone(), "condition");

    if source_text.trim().is_empty() {
        return Err(ctx.malformed_condition(
            source_text,
            "empty condition",
            to_source_span(Span::new(0, source_text.len())),
        ));
    }

    let mut pairs = ConditionParser::parse(Rule::condition, source_text)
        .map_err(|e| convert_parse_error(e, source_text, &ctx))?;

    // grammar guarantees condition -> or_expr ~ EOI
    let condition = pairs.next().ok_or_else(|| {
        ctx.malformed_condition(source_text, "empty parse tree", to_source_span(Span::default()))
    })?;
    let expr = condition.into_inner().next().ok_or_else(|| {
        ctx.malformed_condition(source_text, "missing expression", to_source_span(Span::default()))
    })?;

    build_ast_node(expr, source_text, &ctx)
}

// ============================================================================
// AST BUILDERS
// ============================================================================

fn build_ast_node(pair: Pair<Rule>, text: &str, ctx: &ReportContext) -> Result<AstNode, IfdefError> {
    let span = get_span(&pair);

    match pair.as_rule() {
        Rule::or_expr | Rule::and_expr | Rule::equality | Rule::relational => {
            build_binary_chain(pair, text, ctx)
        }

        Rule::unary => {
            let mut nots = 0usize;
            let mut operand = None;
            for inner in pair.into_inner() {
                if inner.as_rule() == Rule::not_op {
                    nots += 1;
                } else {
                    operand = Some(build_ast_node(inner, text, ctx)?);
                }
            }
            let mut node = operand.ok_or_else(|| {
                ctx.malformed_condition(text, "expected operand after `!`", to_source_span(span))
            })?;
            // `!!A` nests outward: the first `!` is the outermost node
            for _ in 0..nots {
                node = make_not(node, span);
            }
            Ok(node)
        }

        Rule::number => {
            let literal = pair.as_str();
            let value = literal.parse::<f64>().map_err(|_| {
                ctx.malformed_condition(text, &format!("invalid number `{}`", literal), to_source_span(span))
            })?;
            Ok(make_literal(Value::Number(value), span))
        }

        Rule::string => Ok(make_literal(Value::String(unescape_string(pair.as_str())), span)),

        Rule::boolean => Ok(make_literal(Value::Bool(pair.as_str() == "true"), span)),

        Rule::null => Ok(make_literal(Value::Null, span)),

        Rule::undefined => Ok(make_literal(Value::Undefined, span)),

        Rule::identifier => Ok(Spanned {
            value: Box::new(Expr::Identifier(pair.as_str().to_string())),
            span,
        }),

        rule => Err(ctx.malformed_condition(
            text,
            &format!("unsupported rule: {:?}", rule),
            to_source_span(span),
        )),
    }
}

/// Folds `operand (op operand)*` left-associatively.
fn build_binary_chain(pair: Pair<Rule>, text: &str, ctx: &ReportContext) -> Result<AstNode, IfdefError> {
    let span = get_span(&pair);
    let mut inner = pair.into_inner();

    let first = inner.next().ok_or_else(|| {
        ctx.malformed_condition(text, "expected operand", to_source_span(span))
    })?;
    let mut left = build_ast_node(first, text, ctx)?;

    while let Some(op_pair) = inner.next() {
        let op = BinaryOp::from_symbol(op_pair.as_str()).ok_or_else(|| {
            ctx.malformed_condition(
                text,
                &format!("unknown operator `{}`", op_pair.as_str()),
                to_source_span(get_span(&op_pair)),
            )
        })?;
        let right_pair = inner.next().ok_or_else(|| {
            ctx.malformed_condition(
                text,
                &format!("expected operand after `{}`", op.symbol()),
                to_source_span(get_span(&op_pair)),
            )
        })?;
        let right = build_ast_node(right_pair, text, ctx)?;
        left = make_binary(op, left, right);
    }

    Ok(left)
}

// ============================================================================
// AST CONSTRUCTORS
// ============================================================================

fn make_literal(value: Value, span: Span) -> AstNode {
    Spanned {
        value: Box::new(Expr::Literal(value)),
        span,
    }
}

fn make_not(inner: AstNode, span: Span) -> AstNode {
    Spanned {
        value: Box::new(Expr::Not(inner)),
        span,
    }
}

fn make_binary(op: BinaryOp, left: AstNode, right: AstNode) -> AstNode {
    let span = Span::new(left.span.start, right.span.end);
    Spanned {
        value: Box::new(Expr::Binary { op, left, right }),
        span,
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn get_span(pair: &Pair<Rule>) -> Span {
    Span {
        start: pair.as_span().start(),
        end: pair.as_span().end(),
    }
}

fn unescape_string(text: &str) -> String {
    // Remove surrounding quotes
    let inner = &text[1..text.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some(other) => result.push(other),
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

fn convert_parse_error(error: Error<Rule>, text: &str, ctx: &ReportContext) -> IfdefError {
    let span = match error.location {
        pest::error::InputLocation::Pos(pos) => Span {
            start: pos,
            end: pos,
        },
        pest::error::InputLocation::Span((start, end)) => Span { start, end },
    };

    let rendered = error.variant.message();
    let (open, close) = count_parens(text);
    let reason = if open > close {
        "missing closing parenthesis".to_string()
    } else if close > open {
        "unexpected closing parenthesis".to_string()
    } else if span.start >= text.len() {
        "unexpected end of condition".to_string()
    } else {
        rendered.to_string()
    };

    ctx.malformed_condition(text, &reason, to_source_span(span))
}

/// Counts `(` and `)` outside string literals.
fn count_parens(text: &str) -> (usize, usize) {
    let (mut open, mut close) = (0, 0);
    let mut quote: Option<char> = None;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => open += 1,
            (None, ')') => close += 1,
            (None, _) => {}
        }
    }
    (open, close)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(text: &str) -> Result<AstNode, IfdefError> {
        parse(text, &SourceContext::from_file("condition", text))
    }

    #[test]
    fn test_single_identifier() {
        let node = parse_str("DEBUG").unwrap();
        assert_eq!(*node.value, Expr::Identifier("DEBUG".into()));
        assert_eq!(node.span, Span::new(0, 5));
    }

    #[test]
    fn test_precedence_and_binds_tighter_than_or() {
        let node = parse_str("A || B && C").unwrap();
        assert_eq!(node.value.pretty(), "(A || (B && C))");
    }

    #[test]
    fn test_comparison_and_negation() {
        let node = parse_str("!MOBILE && PLATFORM == 'web'").unwrap();
        assert_eq!(node.value.pretty(), "(!MOBILE && (PLATFORM == \"web\"))");
    }

    #[test]
    fn test_parenthesized_grouping() {
        let node = parse_str("(A || B) && C").unwrap();
        assert_eq!(node.value.pretty(), "((A || B) && C)");
    }

    #[test]
    fn test_literals() {
        let node = parse_str("VERSION >= 2.5").unwrap();
        match &*node.value {
            Expr::Binary { op, right, .. } => {
                assert_eq!(*op, BinaryOp::Ge);
                assert_eq!(*right.value, Expr::Literal(Value::Number(2.5)));
            }
            other => panic!("expected binary, got {:?}", other),
        }
        assert!(parse_str("null").is_ok());
        assert!(parse_str("undefined").is_ok());
        assert!(parse_str("truely").is_ok());
    }

    #[test]
    fn test_unbalanced_parentheses_fail() {
        let err = parse_str("(A && B").unwrap_err();
        assert!(err.to_string().contains("missing closing parenthesis"));
    }

    #[test]
    fn test_parentheses_inside_strings_are_not_counted() {
        assert!(parse_str("PLATFORM == '('").is_ok());
        assert!(parse_str("PLATFORM == \")\" || A").is_ok());

        let err = parse_str("PLATFORM == '(' &&").unwrap_err();
        assert!(!err.to_string().contains("parenthesis"));

        let err = parse_str("(PLATFORM == ')'").unwrap_err();
        assert!(err.to_string().contains("missing closing parenthesis"));
    }

    #[test]
    fn test_dangling_operator_fails() {
        assert!(parse_str("A &&").is_err());
        assert!(parse_str("").is_err());
        assert!(parse_str("A B").is_err());
    }
}
