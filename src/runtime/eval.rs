//! Condition evaluation.
//!
//! Walks a parsed condition against a [`Definitions`] map. Evaluation is
//! pure: no definition is ever written and there is no ambient state, so
//! the same `(expression, definitions)` pair always gives the same answer.

use crate::errors::{IfdefError, SourceContext};
use crate::markers::MarkerKind;
use crate::runtime::{Definitions, Value};
use crate::syntax::{parser, AstNode, BinaryOp, Expr};

/// Evaluates the condition of a start marker.
///
/// Returns `Err` only when the condition does not parse; the caller reports
/// it and treats the region as excluded. Operands that cannot be compared
/// make the comparison `false`, and that happens before the `ifndef`
/// negation is applied.
pub fn evaluate(kind: MarkerKind, expression: &str, definitions: &Definitions) -> Result<bool, IfdefError> {
    let result = evaluate_value(expression, definitions)?.is_truthy();
    Ok(if kind.is_negated() { !result } else { result })
}

/// Evaluates a condition to its raw value without truthy coercion.
pub fn evaluate_value(expression: &str, definitions: &Definitions) -> Result<Value, IfdefError> {
    let source = SourceContext::from_file("condition", expression);
    let ast = parser::parse(expression, &source)?;
    Ok(EvaluationContext { definitions }.evaluate_node(&ast))
}

// ============================================================================
// EVALUATION CONTEXT
// ============================================================================

struct EvaluationContext<'a> {
    definitions: &'a Definitions,
}

impl EvaluationContext<'_> {
    fn evaluate_node(&self, node: &AstNode) -> Value {
        match &*node.value {
            Expr::Literal(value) => value.clone(),
            Expr::Identifier(name) => self.definitions.lookup(name),
            Expr::Not(inner) => Value::Bool(!self.evaluate_node(inner).is_truthy()),
            Expr::Binary { op, left, right } => self.evaluate_binary(*op, left, right),
        }
    }

    fn evaluate_binary(&self, op: BinaryOp, left: &AstNode, right: &AstNode) -> Value {
        let lhs = self.evaluate_node(left);

        // Logical operators short-circuit and yield an operand, not a bool
        let result = match op {
            BinaryOp::And if !lhs.is_truthy() => return lhs,
            BinaryOp::Or if lhs.is_truthy() => return lhs,
            BinaryOp::And | BinaryOp::Or => return self.evaluate_node(right),
            BinaryOp::StrictEq => strict_equals(&lhs, &self.evaluate_node(right)),
            BinaryOp::StrictNe => !strict_equals(&lhs, &self.evaluate_node(right)),
            BinaryOp::Eq => loose_equals(&lhs, &self.evaluate_node(right)),
            BinaryOp::Ne => !loose_equals(&lhs, &self.evaluate_node(right)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                // Unordered operands (NaN, undefined) fail every relational test
                match compare(&lhs, &self.evaluate_node(right)) {
                    Some(ordering) => match op {
                        BinaryOp::Lt => ordering.is_lt(),
                        BinaryOp::Le => ordering.is_le(),
                        BinaryOp::Gt => ordering.is_gt(),
                        _ => ordering.is_ge(),
                    },
                    None => false,
                }
            }
        };
        Value::Bool(result)
    }
}

// ============================================================================
// COMPARISON SEMANTICS
// ============================================================================

fn strict_equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }
}

fn loose_equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_)) => match (to_number(lhs), to_number(rhs)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => strict_equals(lhs, rhs),
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Orders two values: strings lexically, anything else numerically.
///
/// `null` counts as `0` here (but not for `==`); `undefined` and strings
/// that are not numbers have no order.
fn compare(lhs: &Value, rhs: &Value) -> Option<std::cmp::Ordering> {
    let numeric = |value: &Value| match value {
        Value::Null => Some(0.0),
        other => to_number(other),
    };
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => numeric(lhs)?.partial_cmp(&numeric(rhs)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Definitions {
        [
            ("DEBUG", Value::Bool(true)),
            ("MOBILE", Value::Bool(false)),
            ("PLATFORM", Value::String("web".into())),
            ("LEVEL", Value::Number(3.0)),
            ("PORT", Value::String("8080".into())),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_identifier_truthiness() {
        assert!(evaluate(MarkerKind::Ifdef, "DEBUG", &defs()).unwrap());
        assert!(!evaluate(MarkerKind::Ifdef, "MOBILE", &defs()).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "PLATFORM", &defs()).unwrap());
    }

    #[test]
    fn test_ifndef_negates() {
        assert!(!evaluate(MarkerKind::Ifndef, "DEBUG", &defs()).unwrap());
        assert!(evaluate(MarkerKind::RegionIfndef, "MOBILE", &defs()).unwrap());
    }

    #[test]
    fn test_undefined_names_are_falsy() {
        assert!(!evaluate(MarkerKind::Ifdef, "MISSING", &defs()).unwrap());
        assert!(evaluate(MarkerKind::Ifndef, "MISSING", &defs()).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "!MISSING", &defs()).unwrap());
    }

    #[test]
    fn test_logical_operators() {
        assert!(evaluate(MarkerKind::Ifdef, "DEBUG && !MOBILE", &defs()).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "MOBILE || DEBUG", &defs()).unwrap());
        assert!(!evaluate(MarkerKind::Ifdef, "MOBILE && MISSING", &defs()).unwrap());
        assert_eq!(
            evaluate_value("MISSING || PLATFORM", &defs()).unwrap(),
            Value::String("web".into())
        );
    }

    #[test]
    fn test_equality() {
        assert!(evaluate(MarkerKind::Ifdef, "PLATFORM == 'web'", &defs()).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "PLATFORM != \"ios\"", &defs()).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "PORT == 8080", &defs()).unwrap());
        assert!(!evaluate(MarkerKind::Ifdef, "PORT === 8080", &defs()).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "DEBUG == 1", &defs()).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "MISSING == null", &defs()).unwrap());
        assert!(!evaluate(MarkerKind::Ifdef, "MISSING === null", &defs()).unwrap());
    }

    #[test]
    fn test_relational() {
        assert!(evaluate(MarkerKind::Ifdef, "LEVEL >= 3", &defs()).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "LEVEL < 10", &defs()).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "PLATFORM > 'android'", &defs()).unwrap());
    }

    #[test]
    fn test_relational_coerces_mixed_operands() {
        let mut d = defs();
        d.insert("VERSION", Value::String("3".into()));
        assert!(evaluate(MarkerKind::Ifdef, "VERSION >= 2", &d).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "PORT > 80", &d).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "DEBUG > 0", &d).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "MOBILE < 1", &d).unwrap());
        assert!(evaluate(MarkerKind::Ifdef, "null < 1", &d).unwrap());
        // two strings still compare lexically
        assert!(!evaluate(MarkerKind::Ifdef, "PORT > '9'", &d).unwrap());
    }

    #[test]
    fn test_unordered_comparison_is_false_then_negated() {
        assert_eq!(evaluate_value("MISSING < 3", &defs()).unwrap(), Value::Bool(false));
        assert_eq!(evaluate_value("MISSING >= 3", &defs()).unwrap(), Value::Bool(false));
        assert_eq!(evaluate_value("PLATFORM < 3", &defs()).unwrap(), Value::Bool(false));
        assert!(!evaluate(MarkerKind::Ifdef, "DEBUG < 'x'", &defs()).unwrap());
        assert!(evaluate(MarkerKind::Ifndef, "DEBUG < 'x'", &defs()).unwrap());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = evaluate(MarkerKind::Ifndef, "(DEBUG", &defs()).unwrap_err();
        assert_eq!(err.kind.code_suffix(), "malformed_condition");
    }

    #[test]
    fn test_numeric_keys_are_not_bound() {
        let mut d = defs();
        d.insert("2", Value::Bool(false));
        assert!(evaluate(MarkerKind::Ifdef, "2", &d).unwrap());
    }
}
