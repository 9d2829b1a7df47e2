//! Native function utilities and helpers
//!
//! Helpers for writing Rust functions that the evaluator can call: argument
//! checking, value extraction and conversion between lists and vectors.

use crate::error::{EvalResult, InterpreterError};
use crate::language::{Value, cons};
use crate::numeric::Number;

// ============================================================================
// Value Extraction Helpers
// ============================================================================

/// Extract a string from a Value
pub fn extract_string(name: &str, value: &Value) -> EvalResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(InterpreterError::type_error(
            name,
            format!("expected string, got {value}"),
        )),
    }
}

/// Extract a number from a Value
pub fn extract_number<'a>(name: &str, value: &'a Value) -> EvalResult<&'a Number> {
    value.as_number().ok_or_else(|| {
        InterpreterError::type_error(name, format!("expected number, got {value}"))
    })
}

/// Extract a non-negative index from a Value
pub fn extract_index(name: &str, value: &Value) -> EvalResult<usize> {
    match value {
        Value::Number(Number::Int(n)) if *n >= 0 => Ok(*n as usize),
        _ => Err(InterpreterError::type_error(
            name,
            format!("expected non-negative integer, got {value}"),
        )),
    }
}

// ============================================================================
// List Manipulation Helpers
// ============================================================================

/// Convert a proper list to a Vec<Value>
pub fn list_to_vec(list: &Value) -> EvalResult<Vec<Value>> {
    let mut result = Vec::new();
    let mut current = list;

    while let Value::Pair(cell) = current {
        result.push(cell.car.clone());
        current = &cell.cdr;
    }

    if !current.is_nil() {
        return Err(InterpreterError::type_error(
            "list",
            format!("expected proper list (ending in nil), got tail {current}"),
        ));
    }

    Ok(result)
}

/// Convert a Vec<Value> to a list ending in `tail`
pub fn vec_to_list(items: Vec<Value>, tail: Value) -> Value {
    items
        .into_iter()
        .rev()
        .fold(tail, |acc, item| cons(item, acc))
}

/// Convert an association list ((key . val) ...) to key-value pairs
pub fn alist_to_vec(alist: &Value) -> EvalResult<Vec<(Value, Value)>> {
    list_to_vec(alist)?
        .into_iter()
        .map(|entry| match entry {
            Value::Pair(pair) => Ok((pair.car.clone(), pair.cdr.clone())),
            other => Err(InterpreterError::type_error(
                "alist",
                format!("alist element must be a pair, got {other}"),
            )),
        })
        .collect()
}

// ============================================================================
// Argument Checking Helpers
// ============================================================================

/// Check that the number of arguments is exactly n
pub fn check_arity_exact(name: &str, args: &[Value], expected: usize) -> EvalResult<()> {
    if args.len() != expected {
        return Err(InterpreterError::signature(
            name,
            format!(
                "expected {expected} argument{}, got {}",
                if expected == 1 { "" } else { "s" },
                args.len()
            ),
        ));
    }
    Ok(())
}

/// Check that the number of arguments is at least n
pub fn check_arity_min(name: &str, args: &[Value], min: usize) -> EvalResult<()> {
    if args.len() < min {
        return Err(InterpreterError::signature(
            name,
            format!(
                "expected at least {min} argument{}, got {}",
                if min == 1 { "" } else { "s" },
                args.len()
            ),
        ));
    }
    Ok(())
}

/// Check that the number of arguments is in range [min, max]
pub fn check_arity_range(name: &str, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        return Err(InterpreterError::signature(
            name,
            format!("expected {min}-{max} arguments, got {}", args.len()),
        ));
    }
    Ok(())
}
