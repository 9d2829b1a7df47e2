use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use im::{HashSet as ImHashSet, OrdMap as ImOrdMap, Vector as ImVector};
use regex::Regex;

use crate::datatypes::DataType;
use crate::environment::Environment;
use crate::error::{EvalResult, InterpreterError};
use crate::interner::Symbol;
use crate::native::{check_arity_exact, check_arity_min, check_arity_range};
use crate::numeric::Number;

// ============================================================================
// Core Type System
// ============================================================================

/// An S-expression.
///
/// Everything except `Pair` is an atom. A `Pair` whose tail is `Nil` is an
/// atom as well (see [`is_atom`]), but it still takes part in list
/// structure.
#[derive(Clone)]
pub enum Value {
    /// The list terminator
    Nil,
    Undefined,
    Bool(bool),
    Number(Number),
    String(String),
    Symbol(Symbol),
    Regexp(Arc<Regex>),
    /// Opaque set of values
    Set(Arc<ImHashSet<Value>>),
    Array(Arc<ImVector<Value>>),
    Object(Arc<ImOrdMap<String, Value>>),
    Pair(Arc<ConsCell>),
    NativeFn(Arc<NativeFunction>),
    Lambda(Arc<LambdaCell>),
    Form(Arc<SpecialForm>),
    DataType(Arc<DataType>),
}

/// A pair. Slots are never mutated after construction.
pub struct ConsCell {
    pub car: Value,
    pub cdr: Value,
}

fn detach(slot: &mut Value, pending: &mut Vec<Arc<ConsCell>>) {
    if slot.is_pair() {
        if let Value::Pair(cell) = std::mem::replace(slot, Value::Nil) {
            pending.push(cell);
        }
    }
}

// Cells we hold the last reference to are unlinked onto a work stack, so
// long or deeply nested lists drop without recursing once per cell.
impl Drop for ConsCell {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach(&mut self.car, &mut pending);
        detach(&mut self.cdr, &mut pending);
        while let Some(cell) = pending.pop() {
            if let Ok(mut inner) = Arc::try_unwrap(cell) {
                detach(&mut inner.car, &mut pending);
                detach(&mut inner.cdr, &mut pending);
            }
        }
    }
}

/// Native function type - Rust closures callable from the evaluator
pub type NativeFn = Arc<dyn Fn(&[Value], &Environment) -> EvalResult<Value> + Send + Sync>;

/// Evaluation rule of a special form; receives the unevaluated argument list
pub type FormRule = Arc<dyn Fn(&Value, &Environment) -> EvalResult<Value> + Send + Sync>;

/// Number of arguments a native function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

pub struct NativeFunction {
    pub name: String,
    pub arity: Arity,
    func: NativeFn,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, arity: Arity, func: F) -> Self
    where
        F: Fn(&[Value], &Environment) -> EvalResult<Value> + Send + Sync + 'static,
    {
        NativeFunction {
            name: name.into(),
            arity,
            func: Arc::new(func),
        }
    }

    /// A zero-argument function returning `value`
    pub fn thunk(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, Arity::Exact(0), move |_, _| Ok(value.clone()))
    }

    pub fn call(&self, args: &[Value], env: &Environment) -> EvalResult<Value> {
        match self.arity {
            Arity::Exact(n) => check_arity_exact(&self.name, args, n)?,
            Arity::AtLeast(n) => check_arity_min(&self.name, args, n)?,
            Arity::Range(min, max) => check_arity_range(&self.name, args, min, max)?,
        }
        (self.func)(args, env)
    }
}

/// A lambda: a native function together with its parameter list.
pub struct LambdaCell {
    pub params: Vec<Symbol>,
    pub function: NativeFunction,
}

impl LambdaCell {
    pub fn new<F>(params: Vec<Symbol>, func: F) -> Self
    where
        F: Fn(&[Value], &Environment) -> EvalResult<Value> + Send + Sync + 'static,
    {
        let function = NativeFunction::new("lambda", Arity::Exact(params.len()), func);
        LambdaCell { params, function }
    }

    pub fn call(&self, args: &[Value], env: &Environment) -> EvalResult<Value> {
        self.function.call(args, env)
    }
}

pub struct SpecialForm {
    pub name: Symbol,
    rule: FormRule,
}

impl SpecialForm {
    pub fn new<F>(name: impl Into<Symbol>, rule: F) -> Self
    where
        F: Fn(&Value, &Environment) -> EvalResult<Value> + Send + Sync + 'static,
    {
        SpecialForm {
            name: name.into(),
            rule: Arc::new(rule),
        }
    }

    /// Apply the rule to an unevaluated argument list
    pub fn call(&self, args: &Value, env: &Environment) -> EvalResult<Value> {
        (self.rule)(args, env)
    }
}

// ============================================================================
// Constructors and Classification
// ============================================================================

impl Value {
    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn int(n: i64) -> Value {
        Value::Number(Number::Int(n))
    }

    pub fn float(x: f64) -> Value {
        Value::Number(Number::Float(x))
    }

    pub fn native<F>(name: impl Into<String>, arity: Arity, func: F) -> Value
    where
        F: Fn(&[Value], &Environment) -> EvalResult<Value> + Send + Sync + 'static,
    {
        Value::NativeFn(Arc::new(NativeFunction::new(name, arity, func)))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(_))
    }

    /// Callable by `apply` without further evaluation
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::NativeFn(_) | Value::Lambda(_) | Value::DataType(_))
    }

    /// Everything except `Nil`, `false` and `undefined` counts as true
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false) | Value::Undefined)
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Name of the value's kind, as used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Regexp(_) => "regexp",
            Value::Set(_) => "set",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Pair(_) => "pair",
            Value::NativeFn(_) => "native-fn",
            Value::Lambda(_) => "lambda",
            Value::Form(_) => "special-form",
            Value::DataType(_) => "data-type",
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

// ============================================================================
// Equality and Hashing
// ============================================================================

fn same_leaf(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) | (Value::Undefined, Value::Undefined) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Symbol(a), Value::Symbol(b)) => a == b,
        (Value::Regexp(a), Value::Regexp(b)) => a.as_str() == b.as_str(),
        (Value::Set(a), Value::Set(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a == b,
        (Value::NativeFn(a), Value::NativeFn(b)) => Arc::ptr_eq(a, b),
        (Value::Lambda(a), Value::Lambda(b)) => Arc::ptr_eq(a, b),
        (Value::Form(a), Value::Form(b)) => Arc::ptr_eq(a, b),
        (Value::DataType(a), Value::DataType(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

// Structural equality; the work stack keeps long and deep lists off the
// call stack.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending: Vec<(Value, Value)> = vec![(self.clone(), other.clone())];
        while let Some((a, b)) = pending.pop() {
            match (&a, &b) {
                (Value::Pair(x), Value::Pair(y)) => {
                    if !Arc::ptr_eq(x, y) {
                        pending.push((x.cdr.clone(), y.cdr.clone()));
                        pending.push((x.car.clone(), y.car.clone()));
                    }
                }
                _ => {
                    if !same_leaf(&a, &b) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut pending = vec![self];
        while let Some(current) = pending.pop() {
            std::mem::discriminant(current).hash(state);
            match current {
                Value::Pair(cell) => {
                    pending.push(&cell.cdr);
                    pending.push(&cell.car);
                }
                Value::Nil | Value::Undefined => {}
                Value::Bool(b) => b.hash(state),
                Value::Number(n) => n.hash(state),
                Value::String(s) => s.hash(state),
                Value::Symbol(s) => s.hash(state),
                Value::Regexp(r) => r.as_str().hash(state),
                Value::Set(s) => s.len().hash(state),
                Value::Array(a) => {
                    a.len().hash(state);
                    pending.extend(a.iter().rev());
                }
                Value::Object(o) => {
                    o.len().hash(state);
                    for key in o.keys() {
                        key.hash(state);
                    }
                }
                Value::NativeFn(f) => Arc::as_ptr(f).hash(state),
                Value::Lambda(l) => Arc::as_ptr(l).hash(state),
                Value::Form(f) => Arc::as_ptr(f).hash(state),
                Value::DataType(d) => Arc::as_ptr(d).hash(state),
            }
        }
    }
}

// ============================================================================
// Display Implementation
// ============================================================================

fn escape_string(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '\r' => result.push_str("\\r"),
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            c => result.push(c),
        }
    }
    result
}

enum Piece<'a> {
    Value(&'a Value),
    Text(&'static str),
    Key(&'a str),
}

// Printing walks an explicit stack of pieces, so deeply nested values print
// without recursing once per level.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut pending = vec![Piece::Value(self)];
        while let Some(piece) = pending.pop() {
            let value = match piece {
                Piece::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Piece::Key(key) => {
                    f.write_str(key)?;
                    continue;
                }
                Piece::Value(value) => value,
            };
            match value {
                Value::Nil => f.write_str("nil")?,
                Value::Undefined => f.write_str("undefined")?,
                Value::Bool(b) => f.write_str(if *b { "true" } else { "false" })?,
                Value::Number(n) => write!(f, "{n}")?,
                Value::String(s) => write!(f, "\"{}\"", escape_string(s))?,
                Value::Symbol(s) => write!(f, "{s}")?,
                Value::Regexp(r) => write!(f, "/{}/", r.as_str())?,
                Value::Set(set) => {
                    push_items(&mut pending, "#{", " ", "}", set.iter().map(Piece::Value));
                }
                Value::Array(arr) => {
                    push_items(&mut pending, "[", " ", "]", arr.iter().map(Piece::Value));
                }
                Value::Object(obj) => {
                    pending.push(Piece::Text("}"));
                    for (i, (key, val)) in obj.iter().enumerate().rev() {
                        pending.push(Piece::Value(val));
                        pending.push(Piece::Text(": "));
                        pending.push(Piece::Key(key));
                        if i > 0 {
                            pending.push(Piece::Text(", "));
                        }
                    }
                    pending.push(Piece::Text("{"));
                }
                Value::Pair(_) => {
                    let mut elements = Vec::new();
                    let mut current = value;
                    while let Value::Pair(cell) = current {
                        elements.push(&cell.car);
                        current = &cell.cdr;
                    }
                    pending.push(Piece::Text(")"));
                    if !current.is_nil() {
                        pending.push(Piece::Value(current));
                        pending.push(Piece::Text(" . "));
                    }
                    for (i, elem) in elements.into_iter().enumerate().rev() {
                        pending.push(Piece::Value(elem));
                        if i > 0 {
                            pending.push(Piece::Text(" "));
                        }
                    }
                    pending.push(Piece::Text("("));
                }
                Value::NativeFn(func) => write!(f, "<native-fn {}>", func.name)?,
                Value::Lambda(_) => f.write_str("<lambda>")?,
                Value::Form(form) => write!(f, "<special-form {}>", form.name)?,
                Value::DataType(dt) => write!(f, "<data-type {}>", dt.label)?,
            }
        }
        Ok(())
    }
}

/// Queue `open item sep item ... close` so the items print in order.
fn push_items<'a, I>(
    pending: &mut Vec<Piece<'a>>,
    open: &'static str,
    sep: &'static str,
    close: &'static str,
    items: I,
) where
    I: Iterator<Item = Piece<'a>>,
{
    let items: Vec<Piece<'a>> = items.collect();
    pending.push(Piece::Text(close));
    for (i, item) in items.into_iter().enumerate().rev() {
        pending.push(item);
        if i > 0 {
            pending.push(Piece::Text(sep));
        }
    }
    pending.push(Piece::Text(open));
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

// ============================================================================
// Primitive Operations
// ============================================================================

pub fn cons(car: Value, cdr: Value) -> Value {
    Value::Pair(Arc::new(ConsCell { car, cdr }))
}

/// Build a proper list from a slice
pub fn list(items: &[Value]) -> Value {
    items
        .iter()
        .rev()
        .fold(Value::Nil, |acc, item| cons(item.clone(), acc))
}

/// Head of a pair. `car(NIL)` is `NIL`.
pub fn car(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Pair(cell) => Ok(cell.car.clone()),
        Value::Nil => Ok(Value::Nil),
        _ => Err(InterpreterError::type_error(
            "car",
            format!("expected pair, got {value}"),
        )),
    }
}

/// Tail of a pair. `cdr(NIL)` is `NIL`.
pub fn cdr(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Pair(cell) => Ok(cell.cdr.clone()),
        Value::Nil => Ok(Value::Nil),
        _ => Err(InterpreterError::type_error(
            "cdr",
            format!("expected pair, got {value}"),
        )),
    }
}

pub fn caar(value: &Value) -> EvalResult<Value> {
    car(&car(value)?)
}

pub fn cadr(value: &Value) -> EvalResult<Value> {
    car(&cdr(value)?)
}

pub fn caddr(value: &Value) -> EvalResult<Value> {
    car(&cdr(&cdr(value)?)?)
}

pub fn cddr(value: &Value) -> EvalResult<Value> {
    cdr(&cdr(value)?)
}

pub fn cdar(value: &Value) -> EvalResult<Value> {
    cdr(&car(value)?)
}

/// Primitives are atoms, and so is a pair whose tail is `NIL`.
pub fn is_atom(value: &Value) -> bool {
    match value {
        Value::Pair(cell) => cell.cdr.is_nil(),
        _ => true,
    }
}

/// Identity comparison of atoms.
///
/// Numbers, strings, symbols and booleans compare by value; regular
/// expressions, collections and callables by identity. Singleton pairs are
/// `eq` when their heads are. For any other pair the answer is only `true`
/// for the very same cell.
pub fn eq(a: &Value, b: &Value) -> bool {
    let (mut a, mut b) = (a, b);
    loop {
        return match (a, b) {
            (Value::Pair(x), Value::Pair(y)) => {
                if Arc::ptr_eq(x, y) {
                    true
                } else if x.cdr.is_nil() && y.cdr.is_nil() {
                    a = &x.car;
                    b = &y.car;
                    continue;
                } else {
                    false
                }
            }
            (Value::Pair(_), _) | (_, Value::Pair(_)) => false,
            (Value::Regexp(x), Value::Regexp(y)) => Arc::ptr_eq(x, y),
            (Value::Set(x), Value::Set(y)) => Arc::ptr_eq(x, y),
            (Value::Array(x), Value::Array(y)) => Arc::ptr_eq(x, y),
            (Value::Object(x), Value::Object(y)) => Arc::ptr_eq(x, y),
            _ => same_leaf(a, b),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_nested_and_dotted() {
        let inner = list(&[Value::int(2), Value::string("s")]);
        let value = cons(Value::int(1), cons(inner, Value::symbol("tail")));
        assert_eq!(value.to_string(), "(1 (2 \"s\") . tail)");
    }

    #[test]
    fn test_structural_equality_and_hash_agree() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |v: &Value| {
            let mut hasher = DefaultHasher::new();
            v.hash(&mut hasher);
            hasher.finish()
        };
        let a = list(&[Value::int(1), Value::float(2.0)]);
        let b = list(&[Value::float(1.0), Value::int(2)]);
        assert_eq!(a, b);
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_eq_collections_by_identity() {
        let set = Value::Set(Arc::new(ImHashSet::unit(Value::int(1))));
        let same_contents = Value::Set(Arc::new(ImHashSet::unit(Value::int(1))));
        assert!(eq(&set, &set.clone()));
        assert!(!eq(&set, &same_contents));
        assert_eq!(set, same_contents);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Undefined.is_truthy());
        assert!(Value::int(0).is_truthy());
        assert!(Value::string("").is_truthy());
    }

    #[test]
    fn test_shared_tail_survives_drop() {
        let tail = list(&[Value::int(2), Value::int(3)]);
        let whole = cons(Value::int(1), tail.clone());
        drop(whole);
        assert_eq!(tail, list(&[Value::int(2), Value::int(3)]));
    }

    #[test]
    fn test_native_arity_is_checked() {
        let f = NativeFunction::new("two", Arity::Exact(2), |_, _| Ok(Value::Nil));
        let env = Environment::new();
        let err = f.call(&[Value::int(1)], &env).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Signature);
    }
}
