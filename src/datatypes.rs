//! Data-type system
//!
//! A data type is a named pair of a type check and a constructor, registered
//! in an environment. Constructing a value checks the candidate eagerly and
//! returns the tagged pair `(<data-type> . <thunk>)`; the constructor itself
//! only runs when the thunk is forced by [`eval_data_value`].

use std::sync::Arc;

use tracing::debug;

use crate::environment::Environment;
use crate::error::{EvalResult, InterpreterError};
use crate::interner::Symbol;
use crate::language::{Arity, NativeFunction, Value, cons, is_atom};

pub type TypeCheck = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type Constructor = Arc<dyn Fn(Value) -> EvalResult<Value> + Send + Sync>;

pub struct DataType {
    pub label: Symbol,
    check: TypeCheck,
    constructor: Constructor,
}

impl DataType {
    pub fn new<C, K>(label: impl Into<Symbol>, check: C, constructor: K) -> Self
    where
        C: Fn(&Value) -> bool + Send + Sync + 'static,
        K: Fn(Value) -> EvalResult<Value> + Send + Sync + 'static,
    {
        DataType {
            label: label.into(),
            check: Arc::new(check),
            constructor: Arc::new(constructor),
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        (self.check)(value)
    }

    /// Build the tagged value for `value`, or fail with a type error naming
    /// this data type.
    pub fn construct(self: &Arc<Self>, value: Value) -> EvalResult<Value> {
        if !self.accepts(&value) {
            return Err(InterpreterError::type_error(
                self.label.resolve(),
                format!("{value} is not a valid {}", self.label),
            ));
        }

        let constructor = Arc::clone(&self.constructor);
        let thunk = NativeFunction::new(
            format!("{}-value", self.label),
            Arity::Exact(0),
            move |_, _| constructor(value.clone()),
        );
        Ok(cons(
            Value::DataType(Arc::clone(self)),
            Value::NativeFn(Arc::new(thunk)),
        ))
    }
}

/// Register a guarded constructor under `label` and return it.
pub fn define_data_type<C, K>(
    env: &Environment,
    label: impl Into<Symbol>,
    check: C,
    constructor: K,
) -> Arc<DataType>
where
    C: Fn(&Value) -> bool + Send + Sync + 'static,
    K: Fn(Value) -> EvalResult<Value> + Send + Sync + 'static,
{
    let data_type = Arc::new(DataType::new(label, check, constructor));
    env.define_type(Arc::clone(&data_type));
    data_type
}

/// Does `value` have the shape `(<data-type> . <native-fn>)`?
pub fn is_tagged_value(value: &Value) -> bool {
    match value {
        Value::Pair(cell) => {
            matches!(cell.car, Value::DataType(_)) && matches!(cell.cdr, Value::NativeFn(_))
        }
        _ => false,
    }
}

/// Unwrap a tagged value by forcing its payload.
///
/// Fails with a value error when the tag is not a data type registered in
/// `env`, or when the payload is not a zero-argument function.
pub fn eval_data_value(env: &Environment, tagged: &Value) -> EvalResult<Value> {
    let cell = match tagged {
        Value::Pair(cell) => cell,
        other => {
            return Err(InterpreterError::value(
                "eval-data",
                format!("undeclared value {other}"),
            ));
        }
    };

    let data_type = match &cell.car {
        Value::DataType(data_type) => data_type,
        other => {
            return Err(InterpreterError::value(
                "eval-data",
                format!("{other} is not a data type"),
            ));
        }
    };

    match env.lookup_type(data_type.label) {
        Some(registered) if Arc::ptr_eq(&registered, data_type) => {}
        _ => {
            return Err(InterpreterError::value(
                "eval-data",
                format!("data type {} is not registered", data_type.label),
            ));
        }
    }

    match &cell.cdr {
        Value::NativeFn(thunk) if thunk.arity == Arity::Exact(0) => {
            debug!(label = %data_type.label, "forcing data value");
            thunk.call(&[], env)
        }
        other => Err(InterpreterError::value(
            "eval-data",
            format!("undeclared value {other}"),
        )),
    }
}

// ============================================================================
// Built-in Data Types
// ============================================================================

pub fn is_proper_list(value: &Value) -> bool {
    let mut current = value;
    while let Value::Pair(cell) = current {
        current = &cell.cdr;
    }
    current.is_nil()
}

/// Kind predicates shared by the built-in data types and the `kind?`
/// functions of the standard library.
pub const KINDS: &[(&str, fn(&Value) -> bool)] = &[
    ("boolean", |v| matches!(v, Value::Bool(_))),
    ("number", |v| matches!(v, Value::Number(_))),
    ("string", |v| matches!(v, Value::String(_))),
    ("symbol", |v| matches!(v, Value::Symbol(_))),
    ("regexp", |v| matches!(v, Value::Regexp(_))),
    ("set", |v| matches!(v, Value::Set(_))),
    ("array", |v| matches!(v, Value::Array(_))),
    ("object", |v| matches!(v, Value::Object(_))),
    ("function", Value::is_callable),
    ("undefined", |v| matches!(v, Value::Undefined)),
    ("atom", is_atom),
    ("list", is_proper_list),
];

/// Register the built-in data types in `env`.
pub fn register_builtin_types(env: &Environment) {
    for &(label, check) in KINDS {
        define_data_type(env, label, check, Ok);
    }
    define_data_type(env, "true", |v| matches!(v, Value::Bool(true)), Ok);
    define_data_type(env, "false", |v| matches!(v, Value::Bool(false)), Ok);
}
