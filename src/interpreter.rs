use std::sync::Arc;

use tracing::trace;

use crate::config::EvalConfig;
use crate::datatypes::{eval_data_value, is_tagged_value, register_builtin_types};
use crate::environment::Environment;
use crate::error::{EvalResult, InterpreterError};
use crate::interner::Symbol;
use crate::language::{ConsCell, LambdaCell, SpecialForm, Value, cons};
use crate::native::{check_arity_exact, list_to_vec};
use crate::stdlib::register_stdlib;

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluate `expr` in `env`.
///
/// Symbols resolve through the bound values, then the special forms, then
/// the data types. A pair whose head names a registry entry has its head
/// replaced by the definition and is evaluated again. Everything that is
/// neither a symbol nor a pair evaluates to itself.
pub fn eval(expr: &Value, env: &Environment) -> EvalResult<Value> {
    let _depth = env.enter().map_err(|err| err.with_expression(expr))?;
    trace!(%expr, "eval");

    match expr {
        Value::Symbol(name) => env
            .resolve(*name)
            .ok_or_else(|| InterpreterError::unbound(name)),
        Value::Pair(_) if is_tagged_value(expr) => eval_data_value(env, expr),
        Value::Pair(cell) => eval_form(cell, expr, env),
        _ => Ok(expr.clone()),
    }
}

fn eval_form(cell: &ConsCell, expr: &Value, env: &Environment) -> EvalResult<Value> {
    let args = &cell.cdr;
    let mut head = cell.car.clone();
    let mut rewrites = 0;
    let mut head_reduced = false;

    loop {
        match &head {
            // Tagged form: substitute the definition and go round again
            Value::Symbol(name) => {
                let name = *name;
                rewrites += 1;
                if rewrites > env.config().max_rewrites {
                    return Err(InterpreterError::evaluation(
                        "eval",
                        format!("{name} did not reduce after {} rewrites", rewrites - 1),
                    )
                    .with_expression(expr));
                }
                head = env
                    .resolve(name)
                    .ok_or_else(|| InterpreterError::unbound(name))?;
                trace!(%name, definition = %head, "rewrote tagged form");
            }
            Value::Form(form) => return form.call(args, env),
            Value::DataType(data_type) => {
                // A tag reached through rewriting still names a constructed value
                if matches!(args, Value::NativeFn(_)) {
                    let tagged = cons(Value::DataType(Arc::clone(data_type)), args.clone());
                    return eval_data_value(env, &tagged);
                }
                let values = eval_args(args, env)?;
                check_arity_exact(&data_type.label.resolve(), &values, 1)?;
                return data_type.construct(values[0].clone());
            }
            Value::NativeFn(_) | Value::Lambda(_) => {
                let values = eval_args(args, env)?;
                return apply(&head, &values, env);
            }
            Value::Pair(_) if !head_reduced => {
                head = eval(&head, env)?;
                head_reduced = true;
            }
            _ => {
                return Err(
                    InterpreterError::evaluation("eval", "unrecognized expression")
                        .with_expression(expr),
                );
            }
        }
    }
}

/// Evaluate each element of an argument list, left to right.
fn eval_args(args: &Value, env: &Environment) -> EvalResult<Vec<Value>> {
    let mut values = Vec::new();
    let mut current = args;
    while let Value::Pair(cell) = current {
        values.push(eval(&cell.car, env)?);
        current = &cell.cdr;
    }
    if !current.is_nil() {
        return Err(InterpreterError::syntax(
            "eval",
            format!("malformed argument list ending in {current}"),
        ));
    }
    Ok(values)
}

/// Apply a callable to already evaluated arguments.
///
/// A value that is not callable is evaluated once and retried.
pub fn apply(callable: &Value, args: &[Value], env: &Environment) -> EvalResult<Value> {
    if callable.is_callable() {
        return invoke(callable, args, env);
    }
    let reduced = eval(callable, env)?;
    if !reduced.is_callable() {
        return Err(InterpreterError::evaluation(
            "apply",
            format!("{callable} does not reduce to a function"),
        ));
    }
    invoke(&reduced, args, env)
}

fn invoke(callable: &Value, args: &[Value], env: &Environment) -> EvalResult<Value> {
    match callable {
        Value::NativeFn(func) => func.call(args, env),
        Value::Lambda(lambda) => lambda.call(args, env),
        Value::DataType(data_type) => {
            check_arity_exact(&data_type.label.resolve(), args, 1)?;
            data_type.construct(args[0].clone())
        }
        other => Err(InterpreterError::evaluation(
            "apply",
            format!("cannot apply non-function {other}"),
        )),
    }
}

/// Evaluate a body of expressions in order, returning the last value.
fn eval_body(body: &[Value], env: &Environment) -> EvalResult<Value> {
    let mut result = Value::Nil;
    for expr in body {
        result = eval(expr, env)?;
    }
    Ok(result)
}

// ============================================================================
// Special Forms
// ============================================================================

/// Elements of a special form's argument list, checked against a range.
fn form_args(name: &str, args: &Value, min: usize, max: Option<usize>) -> EvalResult<Vec<Value>> {
    let items = list_to_vec(args).map_err(|_| {
        InterpreterError::syntax(name, format!("malformed argument list {args}"))
    })?;
    let too_many = max.is_some_and(|max| items.len() > max);
    if items.len() < min || too_many {
        let expected = match max {
            Some(max) if max == min => format!("{min}"),
            Some(max) => format!("{min}-{max}"),
            None => format!("at least {min}"),
        };
        return Err(InterpreterError::syntax(
            name,
            format!("expected {expected} arguments, got {}", items.len()),
        ));
    }
    Ok(items)
}

fn form_symbol(name: &str, value: &Value) -> EvalResult<Symbol> {
    value.as_symbol().ok_or_else(|| {
        InterpreterError::syntax(name, format!("expected a symbol, got {value}"))
    })
}

/// (quote x) => x
fn quote_form(args: &Value, _env: &Environment) -> EvalResult<Value> {
    let items = form_args("quote", args, 1, Some(1))?;
    Ok(items[0].clone())
}

/// (cond (test expr...) ...) => value of the first clause whose test holds
fn cond_form(args: &Value, env: &Environment) -> EvalResult<Value> {
    for clause in form_args("cond", args, 0, None)? {
        let parts = form_args("cond", &clause, 1, None)?;
        let test = eval(&parts[0], env)?;
        if test.is_truthy() {
            return match parts.len() {
                1 => Ok(test),
                _ => eval_body(&parts[1..], env),
            };
        }
    }
    Ok(Value::Nil)
}

/// (lambda (params...) body...) => a lambda closing over the current scope
fn lambda_form(args: &Value, env: &Environment) -> EvalResult<Value> {
    let items = form_args("lambda", args, 2, None)?;
    let params = form_args("lambda", &items[0], 0, None)?
        .iter()
        .map(|param| form_symbol("lambda", param))
        .collect::<EvalResult<Vec<Symbol>>>()?;
    let body: Vec<Value> = items[1..].to_vec();

    let closure = env.clone();
    let names = params.clone();
    let lambda = LambdaCell::new(params, move |values, _caller| {
        let scope = closure.extend(&names, values);
        eval_body(&body, &scope)
    });
    Ok(Value::Lambda(Arc::new(lambda)))
}

/// (label name expr) => binds the value of expr to name and returns it
fn label_form(args: &Value, env: &Environment) -> EvalResult<Value> {
    let items = form_args("label", args, 2, Some(2))?;
    let name = form_symbol("label", &items[0])?;
    let value = eval(&items[1], env)?;
    env.bind(name, value.clone());
    Ok(value)
}

/// (define name expr) => binds the value of expr to name and returns name
fn define_form(args: &Value, env: &Environment) -> EvalResult<Value> {
    let items = form_args("define", args, 2, Some(2))?;
    let name = form_symbol("define", &items[0])?;
    let value = eval(&items[1], env)?;
    env.bind(name, value);
    Ok(Value::Symbol(name))
}

/// (and x...) => first false value, or the last value
fn and_form(args: &Value, env: &Environment) -> EvalResult<Value> {
    let mut result = Value::Bool(true);
    for expr in form_args("and", args, 0, None)? {
        result = eval(&expr, env)?;
        if !result.is_truthy() {
            break;
        }
    }
    Ok(result)
}

/// (or x...) => first true value, or the last value
fn or_form(args: &Value, env: &Environment) -> EvalResult<Value> {
    let mut result = Value::Bool(false);
    for expr in form_args("or", args, 0, None)? {
        result = eval(&expr, env)?;
        if result.is_truthy() {
            break;
        }
    }
    Ok(result)
}

/// Register the built-in special forms in `env`.
pub fn register_special_forms(env: &Environment) {
    env.define_form(SpecialForm::new("quote", quote_form));
    env.define_form(SpecialForm::new("cond", cond_form));
    env.define_form(SpecialForm::new("lambda", lambda_form));
    env.define_form(SpecialForm::new("label", label_form));
    env.define_form(SpecialForm::new("define", define_form));
    env.define_form(SpecialForm::new("and", and_form));
    env.define_form(SpecialForm::new("or", or_form));
}

// ============================================================================
// Standard Environment
// ============================================================================

/// A root environment with the special forms, the standard library and the
/// built-in data types registered.
pub fn standard_environment() -> Environment {
    standard_environment_with(EvalConfig::default())
}

pub fn standard_environment_with(config: EvalConfig) -> Environment {
    let env = Environment::with_config(config);
    register_special_forms(&env);
    register_stdlib(&env);
    register_builtin_types(&env);
    env
}
