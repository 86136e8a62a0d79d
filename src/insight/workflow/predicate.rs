// SPDX-License-Identifier: MIT

//! Branch rule predicates
//!
//! Branch decisions are declared as small comparison expressions over state
//! paths, e.g. `average_score >= 7` or `verdict == 'approved' and score > 3`.
//! Rules are parsed once at compile time and evaluated against the live
//! state when the branch's source node completes.

use super::state::WorkflowState;
use serde_json::Value;

/// A parsed branch rule expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `path op literal`
    Compare {
        path: String,
        op: CmpOp,
        value: Literal,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    True,
    False,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

/// Parse a rule expression string.
pub fn parse(input: &str) -> Result<Expr, String> {
    let input = input.trim();
    match input {
        "" => Err("empty rule expression".to_string()),
        "true" => Ok(Expr::True),
        "false" => Ok(Expr::False),
        _ => {
            if let Some((left, right)) = split_top_level(input, " or ") {
                return Ok(Expr::Or(Box::new(parse(left)?), Box::new(parse(right)?)));
            }
            if let Some((left, right)) = split_top_level(input, " and ") {
                return Ok(Expr::And(Box::new(parse(left)?), Box::new(parse(right)?)));
            }
            parse_compare(input)
        }
    }
}

/// Find `sep` outside quoted strings and split around it.
fn split_top_level<'a>(input: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    let mut in_string = false;
    for (i, c) in input.char_indices() {
        if c == '\'' || c == '"' {
            in_string = !in_string;
        } else if !in_string && input[i..].starts_with(sep) {
            return Some((&input[..i], &input[i + sep.len()..]));
        }
    }
    None
}

fn parse_compare(input: &str) -> Result<Expr, String> {
    // Two-character operators first so `>=` is not read as `>`
    const OPS: [(&str, CmpOp); 6] = [
        ("!=", CmpOp::NotEq),
        (">=", CmpOp::Gte),
        ("<=", CmpOp::Lte),
        ("==", CmpOp::Eq),
        (">", CmpOp::Gt),
        ("<", CmpOp::Lt),
    ];

    for (symbol, op) in OPS {
        if let Some((path, rest)) = split_top_level(input, symbol) {
            let path = path.trim();
            if path.is_empty() {
                return Err(format!("missing left-hand path in '{}'", input));
            }
            return Ok(Expr::Compare {
                path: path.to_string(),
                op,
                value: parse_literal(rest.trim())?,
            });
        }
    }

    Err(format!("could not parse rule expression '{}'", input))
}

fn parse_literal(input: &str) -> Result<Literal, String> {
    if input == "null" {
        return Ok(Literal::Null);
    }
    if input == "true" {
        return Ok(Literal::Bool(true));
    }
    if input == "false" {
        return Ok(Literal::Bool(false));
    }
    if (input.starts_with('\'') && input.ends_with('\'') && input.len() >= 2)
        || (input.starts_with('"') && input.ends_with('"') && input.len() >= 2)
    {
        return Ok(Literal::String(input[1..input.len() - 1].to_string()));
    }
    input
        .parse::<f64>()
        .map(Literal::Number)
        .map_err(|_| format!("could not parse literal '{}'", input))
}

/// Evaluate a parsed expression against workflow state.
pub fn eval(expr: &Expr, state: &WorkflowState) -> bool {
    match expr {
        Expr::True => true,
        Expr::False => false,
        Expr::And(l, r) => eval(l, state) && eval(r, state),
        Expr::Or(l, r) => eval(l, state) || eval(r, state),
        Expr::Compare { path, op, value } => compare(state.get_path(path), *op, value),
    }
}

fn compare(actual: Option<&Value>, op: CmpOp, expected: &Literal) -> bool {
    match op {
        CmpOp::Eq => literal_eq(actual, expected),
        CmpOp::NotEq => !literal_eq(actual, expected),
        CmpOp::Gt => numeric(actual, expected, |a, b| a > b),
        CmpOp::Gte => numeric(actual, expected, |a, b| a >= b),
        CmpOp::Lt => numeric(actual, expected, |a, b| a < b),
        CmpOp::Lte => numeric(actual, expected, |a, b| a <= b),
    }
}

fn literal_eq(actual: Option<&Value>, expected: &Literal) -> bool {
    match (actual, expected) {
        // A missing field compares equal to null
        (None | Some(Value::Null), Literal::Null) => true,
        (Some(Value::String(s)), Literal::String(e)) => s == e,
        (Some(Value::Bool(b)), Literal::Bool(e)) => b == e,
        (Some(Value::Number(n)), Literal::Number(e)) => {
            n.as_f64().map(|f| f == *e).unwrap_or(false)
        }
        _ => false,
    }
}

fn numeric<F: Fn(f64, f64) -> bool>(actual: Option<&Value>, expected: &Literal, cmp: F) -> bool {
    match (actual.and_then(Value::as_f64), expected) {
        (Some(a), Literal::Number(e)) => cmp(a, *e),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::workflow::state::StateSchema;
    use serde_json::json;

    fn state_with(pairs: &[(&str, Value)]) -> WorkflowState {
        let mut state = WorkflowState::new(StateSchema::new());
        state.apply(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        );
        state
    }

    #[test]
    fn test_parse_comparison() {
        let expr = parse("average_score >= 7").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                path: "average_score".to_string(),
                op: CmpOp::Gte,
                value: Literal::Number(7.0),
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("average_score").is_err());
        assert!(parse(">= 7").is_err());
        assert!(parse("score >= high").is_err());
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let expr = parse("average_score >= 7").unwrap();

        assert!(eval(&expr, &state_with(&[("average_score", json!(7.0))])));
        assert!(eval(&expr, &state_with(&[("average_score", json!(7.1))])));
        assert!(!eval(&expr, &state_with(&[("average_score", json!(6.999))])));
    }

    #[test]
    fn test_string_equality() {
        let state = state_with(&[("verdict", json!("approved"))]);
        assert!(eval(&parse("verdict == 'approved'").unwrap(), &state));
        assert!(!eval(&parse("verdict == 'rejected'").unwrap(), &state));
        assert!(eval(&parse("verdict != 'rejected'").unwrap(), &state));
    }

    #[test]
    fn test_numeric_operators() {
        let state = state_with(&[("score", json!(5))]);
        assert!(eval(&parse("score > 4").unwrap(), &state));
        assert!(eval(&parse("score < 6").unwrap(), &state));
        assert!(eval(&parse("score <= 5").unwrap(), &state));
        assert!(!eval(&parse("score > 5").unwrap(), &state));
    }

    #[test]
    fn test_and_or() {
        let state = state_with(&[("a", json!(1)), ("b", json!("x"))]);
        assert!(eval(&parse("a == 1 and b == 'x'").unwrap(), &state));
        assert!(!eval(&parse("a == 2 and b == 'x'").unwrap(), &state));
        assert!(eval(&parse("a == 2 or b == 'x'").unwrap(), &state));
        assert!(!eval(&parse("a == 2 or b == 'y'").unwrap(), &state));
    }

    #[test]
    fn test_missing_field() {
        let state = state_with(&[]);
        assert!(eval(&parse("missing == null").unwrap(), &state));
        assert!(!eval(&parse("missing >= 7").unwrap(), &state));
    }

    #[test]
    fn test_nested_path() {
        let state = state_with(&[("result", json!({"score": 9}))]);
        assert!(eval(&parse("result.score > 8").unwrap(), &state));
    }

    #[test]
    fn test_operator_inside_quotes_ignored() {
        let state = state_with(&[("note", json!("a >= b"))]);
        assert!(eval(&parse("note == 'a >= b'").unwrap(), &state));
    }

    #[test]
    fn test_literal_true_false() {
        let state = state_with(&[]);
        assert!(eval(&parse("true").unwrap(), &state));
        assert!(!eval(&parse("false").unwrap(), &state));
    }
}
