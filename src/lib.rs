//! A symbolic-expression evaluator after McCarthy's "Recursive Functions of
//! Symbolic Expressions".
//!
//! The crate provides the data model (atoms, pairs and `NIL`), the
//! elementary list functions, an [`Environment`] holding three registries
//! (bound values, special forms, data types) and an evaluator that
//! dispatches tagged expressions through them. Expressions arrive already in
//! tree form; there is no reader.

pub mod config;
pub mod datatypes;
pub mod environment;
pub mod error;
pub mod interner;
pub mod interpreter;
pub mod language;
pub mod list;
pub mod native;
pub mod numeric;
pub mod stdlib;

// Re-export commonly used items for convenience
pub use config::EvalConfig;
pub use datatypes::{DataType, define_data_type, eval_data_value};
pub use environment::{Environment, Snapshot};
pub use error::{ErrorKind, EvalResult, InterpreterError};
pub use interner::Symbol;
pub use interpreter::{apply, eval, standard_environment, standard_environment_with};
pub use language::{
    Arity, ConsCell, LambdaCell, NativeFunction, SpecialForm, Value, car, cdr, cons, eq, is_atom,
    list,
};
pub use numeric::Number;
pub use stdlib::register_stdlib;
