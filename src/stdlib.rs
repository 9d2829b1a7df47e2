//! Standard library native functions
//!
//! The primitive list algebra, arithmetic and kind predicates, bound as
//! native functions in an environment's value registry.

use std::cmp::Ordering;
use std::sync::Arc;

use im::{HashSet as ImHashSet, OrdMap as ImOrdMap, Vector as ImVector};
use regex::Regex;

use crate::datatypes::{KINDS, eval_data_value};
use crate::environment::Environment;
use crate::error::{EvalResult, InterpreterError};
use crate::language::{Arity, Value, caar, caddr, cadr, car, cdar, cddr, cdr, cons, eq};
use crate::list::{
    append, assoc, equal, first_atom, flatten, last_atom, length, member, pair, pairlis, reverse,
    sublis, subst,
};
use crate::native::{alist_to_vec, extract_index, extract_number, extract_string};
use crate::numeric::Number;

type Native = fn(&[Value], &Environment) -> EvalResult<Value>;

fn define(env: &Environment, name: &str, arity: Arity, func: Native) {
    env.bind(name, Value::native(name, arity, func));
}

// ============================================================================
// Data Model
// ============================================================================

fn car_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    car(&args[0])
}

fn cdr_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    cdr(&args[0])
}

fn cons_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(cons(args[0].clone(), args[1].clone()))
}

fn caar_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    caar(&args[0])
}

fn cadr_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    cadr(&args[0])
}

fn caddr_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    caddr(&args[0])
}

fn cddr_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    cddr(&args[0])
}

fn cdar_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    cdar(&args[0])
}

fn eq_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(Value::Bool(eq(&args[0], &args[1])))
}

fn null_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(Value::Bool(args[0].is_nil()))
}

// ============================================================================
// List Algebra
// ============================================================================

fn equal_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(Value::Bool(equal(&args[0], &args[1])))
}

/// (append x y ...) => all lists joined; the last one is shared
fn append_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(args
        .iter()
        .rev()
        .fold(Value::Nil, |acc, list| append(list, &acc)))
}

fn reverse_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(reverse(&args[0]))
}

fn member_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(Value::Bool(member(&args[0], &args[1])))
}

fn pair_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    pair(&args[0], &args[1])
}

/// (assoc key alist) => the value, or `undefined` when the key is absent
fn assoc_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(assoc(&args[0], &args[1]).unwrap_or(Value::Undefined))
}

fn subst_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(subst(&args[0], &args[1], &args[2]))
}

fn sublis_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(sublis(&args[0], &args[1]))
}

/// (pairlis keys vals [base])
fn pairlis_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    let base = args.get(2).cloned().unwrap_or(Value::Nil);
    pairlis(&args[0], &args[1], &base)
}

fn length_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(Value::int(length(&args[0]) as i64))
}

fn ff_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(first_atom(&args[0]))
}

fn lp_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(last_atom(&args[0]))
}

fn flatten_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(flatten(&args[0]))
}

// ============================================================================
// Logic
// ============================================================================

fn identity_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(args[0].clone())
}

fn not_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    Ok(Value::Bool(!args[0].is_truthy()))
}

/// (xor x...) => true when an odd number of arguments are true
fn xor_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    let trues = args.iter().filter(|arg| arg.is_truthy()).count();
    Ok(Value::Bool(trues % 2 == 1))
}

// ============================================================================
// Arithmetic
// ============================================================================

fn fold_numbers(
    name: &str,
    args: &[Value],
    identity: i64,
    op: fn(&Number, &Number) -> EvalResult<Number>,
) -> EvalResult<Value> {
    let numbers = args
        .iter()
        .map(|arg| extract_number(name, arg))
        .collect::<EvalResult<Vec<&Number>>>()?;

    let result = match numbers.as_slice() {
        [] => Number::Int(identity),
        [only] => op(&Number::Int(identity), only)?,
        [first, rest @ ..] => rest
            .iter()
            .try_fold((*first).clone(), |acc, n| op(&acc, n))?,
    };
    Ok(Value::Number(result))
}

fn add_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    fold_numbers("+", args, 0, Number::add)
}

fn sub_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    fold_numbers("-", args, 0, Number::sub)
}

fn mul_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    fold_numbers("*", args, 1, Number::mul)
}

fn div_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    fold_numbers("/", args, 1, Number::div)
}

fn mod_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    let a = extract_number("mod", &args[0])?;
    let b = extract_number("mod", &args[1])?;
    Ok(Value::Number(a.rem(b)?))
}

fn pow_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    let base = extract_number("pow", &args[0])?;
    let exponent = extract_number("pow", &args[1])?;
    Ok(Value::Number(base.pow(exponent)?))
}

fn compare_chain(name: &str, args: &[Value], holds: fn(Ordering) -> bool) -> EvalResult<Value> {
    let numbers = args
        .iter()
        .map(|arg| extract_number(name, arg))
        .collect::<EvalResult<Vec<&Number>>>()?;
    let result = numbers
        .windows(2)
        .all(|w| w[0].partial_cmp(w[1]).is_some_and(holds));
    Ok(Value::Bool(result))
}

fn lt_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    compare_chain("<", args, Ordering::is_lt)
}

fn gt_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    compare_chain(">", args, Ordering::is_gt)
}

fn le_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    compare_chain("<=", args, Ordering::is_le)
}

fn ge_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    compare_chain(">=", args, Ordering::is_ge)
}

fn num_eq_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    compare_chain("=", args, Ordering::is_eq)
}

// ============================================================================
// Collections
// ============================================================================

fn make_set_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    let set: ImHashSet<Value> = args.iter().cloned().collect();
    Ok(Value::Set(Arc::new(set)))
}

fn set_add_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    match &args[0] {
        Value::Set(set) => Ok(Value::Set(Arc::new(set.update(args[1].clone())))),
        other => Err(InterpreterError::type_error(
            "set-add",
            format!("expected set, got {other}"),
        )),
    }
}

fn set_contains_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    match &args[0] {
        Value::Set(set) => Ok(Value::Bool(set.contains(&args[1]))),
        other => Err(InterpreterError::type_error(
            "set-contains?",
            format!("expected set, got {other}"),
        )),
    }
}

fn make_array_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    let array: ImVector<Value> = args.iter().cloned().collect();
    Ok(Value::Array(Arc::new(array)))
}

fn array_ref_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    let index = extract_index("array-ref", &args[1])?;
    match &args[0] {
        Value::Array(array) => array.get(index).cloned().ok_or_else(|| {
            InterpreterError::value(
                "array-ref",
                format!("index {index} out of bounds (length {})", array.len()),
            )
        }),
        other => Err(InterpreterError::type_error(
            "array-ref",
            format!("expected array, got {other}"),
        )),
    }
}

/// (make-object alist) => object keyed by the alist's string or symbol keys
fn make_object_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    let mut object = ImOrdMap::new();
    for (key, value) in alist_to_vec(&args[0])? {
        let key = match key {
            Value::String(s) => s,
            Value::Symbol(sym) => sym.resolve(),
            other => {
                return Err(InterpreterError::type_error(
                    "make-object",
                    format!("object keys must be strings or symbols, got {other}"),
                ));
            }
        };
        object.insert(key, value);
    }
    Ok(Value::Object(Arc::new(object)))
}

fn object_get_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    let key = match &args[1] {
        Value::Symbol(sym) => sym.resolve(),
        other => extract_string("object-get", other)?,
    };
    match &args[0] {
        Value::Object(object) => Ok(object.get(&key).cloned().unwrap_or(Value::Undefined)),
        other => Err(InterpreterError::type_error(
            "object-get",
            format!("expected object, got {other}"),
        )),
    }
}

fn make_regexp_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    let pattern = extract_string("make-regexp", &args[0])?;
    let regex = Regex::new(&pattern).map_err(|e| {
        InterpreterError::value("make-regexp", format!("invalid pattern {pattern:?}: {e}"))
    })?;
    Ok(Value::Regexp(Arc::new(regex)))
}

fn re_match_fn(args: &[Value], _env: &Environment) -> EvalResult<Value> {
    let text = extract_string("re-match?", &args[1])?;
    match &args[0] {
        Value::Regexp(regex) => Ok(Value::Bool(regex.is_match(&text))),
        other => Err(InterpreterError::type_error(
            "re-match?",
            format!("expected regexp, got {other}"),
        )),
    }
}

// ============================================================================
// Data Types
// ============================================================================

fn eval_data_fn(args: &[Value], env: &Environment) -> EvalResult<Value> {
    eval_data_value(env, &args[0])
}

// ============================================================================
// Registration
// ============================================================================

/// Bind the standard library in `env`.
pub fn register_stdlib(env: &Environment) {
    use Arity::*;

    env.bind("nil", Value::Nil);
    env.bind("t", Value::Bool(true));

    // Data model
    define(env, "car", Exact(1), car_fn);
    define(env, "cdr", Exact(1), cdr_fn);
    define(env, "cons", Exact(2), cons_fn);
    define(env, "caar", Exact(1), caar_fn);
    define(env, "cadr", Exact(1), cadr_fn);
    define(env, "caddr", Exact(1), caddr_fn);
    define(env, "cddr", Exact(1), cddr_fn);
    define(env, "cdar", Exact(1), cdar_fn);
    define(env, "eq?", Exact(2), eq_fn);
    define(env, "null?", Exact(1), null_fn);

    // List algebra
    define(env, "equal?", Exact(2), equal_fn);
    define(env, "append", AtLeast(0), append_fn);
    define(env, "reverse", Exact(1), reverse_fn);
    define(env, "member?", Exact(2), member_fn);
    define(env, "pair", Exact(2), pair_fn);
    define(env, "assoc", Exact(2), assoc_fn);
    define(env, "subst", Exact(3), subst_fn);
    define(env, "sublis", Exact(2), sublis_fn);
    define(env, "pairlis", Range(2, 3), pairlis_fn);
    define(env, "length", Exact(1), length_fn);
    define(env, "ff", Exact(1), ff_fn);
    define(env, "lp", Exact(1), lp_fn);
    define(env, "flatten", Exact(1), flatten_fn);

    // Logic
    define(env, "identity", Exact(1), identity_fn);
    define(env, "not", Exact(1), not_fn);
    define(env, "xor", AtLeast(0), xor_fn);

    // Arithmetic
    define(env, "+", AtLeast(0), add_fn);
    define(env, "-", AtLeast(1), sub_fn);
    define(env, "*", AtLeast(0), mul_fn);
    define(env, "/", AtLeast(1), div_fn);
    define(env, "mod", Exact(2), mod_fn);
    define(env, "pow", Exact(2), pow_fn);
    define(env, "<", AtLeast(1), lt_fn);
    define(env, ">", AtLeast(1), gt_fn);
    define(env, "<=", AtLeast(1), le_fn);
    define(env, ">=", AtLeast(1), ge_fn);
    define(env, "=", AtLeast(1), num_eq_fn);

    // Collections
    define(env, "make-set", AtLeast(0), make_set_fn);
    define(env, "set-add", Exact(2), set_add_fn);
    define(env, "set-contains?", Exact(2), set_contains_fn);
    define(env, "make-array", AtLeast(0), make_array_fn);
    define(env, "array-ref", Exact(2), array_ref_fn);
    define(env, "make-object", Exact(1), make_object_fn);
    define(env, "object-get", Exact(2), object_get_fn);
    define(env, "make-regexp", Exact(1), make_regexp_fn);
    define(env, "re-match?", Exact(2), re_match_fn);

    // Data types
    define(env, "eval-data", Exact(1), eval_data_fn);

    // Kind predicates: boolean?, number?, ..., atom?, list?
    for &(kind, check) in KINDS {
        env.bind(
            format!("{kind}?").as_str(),
            Value::native(format!("{kind}?"), Exact(1), move |args, _env| {
                Ok(Value::Bool(check(&args[0])))
            }),
        );
    }
}
