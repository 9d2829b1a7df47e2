//! Interpreter error types.
//!
//! Every failure raised by the data model, the list algebra, the registries
//! or the evaluator is an [`InterpreterError`]. Errors are never recovered
//! internally; they abort the current evaluation and travel back to the
//! caller through [`EvalResult`].

use std::fmt;

use thiserror::Error;

use crate::language::Value;

/// Categories of interpreter errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unbound symbol, unrecognized expression, non-callable applied
    Evaluation,
    /// Mismatched arity or list lengths
    Signature,
    /// A type guard rejected a value
    Type,
    /// A tagged value is malformed
    Value,
    /// Malformed tagged-form structure
    Syntax,
    /// An environment snapshot failed to merge
    Module,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Evaluation => "EVALUATION",
            ErrorKind::Signature => "SIGNATURE",
            ErrorKind::Type => "TYPE",
            ErrorKind::Value => "VALUE",
            ErrorKind::Syntax => "SYNTAX",
            ErrorKind::Module => "MODULE",
        };
        f.write_str(name)
    }
}

/// An interpreter error with the operation that raised it.
#[derive(Debug, Clone, Error)]
#[error("INTERPRETER ERROR: {kind} @ {location} : {message}{}", context(.expression))]
pub struct InterpreterError {
    /// The category of error
    pub kind: ErrorKind,
    /// Name of the operation that raised the error
    pub location: String,
    /// Human-readable description
    pub message: String,
    /// The expression being evaluated (if available)
    pub expression: Option<String>,
}

pub type EvalResult<T> = Result<T, InterpreterError>;

/// Widest expression shown in an error message
const EXPRESSION_WIDTH: usize = 60;

fn context(expression: &Option<String>) -> String {
    match expression {
        // Truncate long expressions
        Some(expr) if expr.chars().count() > EXPRESSION_WIDTH => {
            let head: String = expr.chars().take(EXPRESSION_WIDTH - 3).collect();
            format!(" in: {head}...")
        }
        Some(expr) => format!(" in: {expr}"),
        None => String::new(),
    }
}

/// Writer that accepts a fixed number of characters, then fails.
struct Bounded {
    text: String,
    room: usize,
}

impl fmt::Write for Bounded {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.room == 0 {
                return Err(fmt::Error);
            }
            self.text.push(c);
            self.room -= 1;
        }
        Ok(())
    }
}

impl InterpreterError {
    pub fn new(kind: ErrorKind, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            message: message.into(),
            expression: None,
        }
    }

    /// Attach the offending expression. Only as much of it is printed as
    /// an error message can show.
    pub fn with_expression(mut self, expr: &Value) -> Self {
        let mut out = Bounded {
            text: String::new(),
            room: EXPRESSION_WIDTH + 1,
        };
        // A full buffer stops the printer early; the prefix is what we want
        let _ = fmt::write(&mut out, format_args!("{expr}"));
        self.expression = Some(out.text);
        self
    }

    pub fn evaluation(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Evaluation, location, message)
    }

    pub fn signature(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Signature, location, message)
    }

    pub fn type_error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, location, message)
    }

    pub fn value(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, location, message)
    }

    pub fn syntax(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, location, message)
    }

    pub fn module(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Module, location, message)
    }

    /// Unbound symbol lookup failure.
    pub fn unbound(name: impl fmt::Display) -> Self {
        Self::evaluation("lookup", format!("unbound symbol {name}"))
    }
}
