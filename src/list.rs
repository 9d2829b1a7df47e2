//! Primitive list algebra over S-expressions.
//!
//! These are McCarthy's elementary functions (`equal`, `subst`, `append`,
//! `member`, `pair`, `assoc`, `sublis`, `pairlis`, ...). All of them are pure.
//! Walks along the CDR spine are loops with accumulators; walks over whole
//! trees keep their pending work in a `Vec`, so neither list length nor
//! nesting depth grows the call stack.
//!
//! Association lists are lists of dotted entries `(key . value)`.

use crate::error::{EvalResult, InterpreterError};
use crate::language::{Value, cons, eq, is_atom, list};
use crate::native::vec_to_list;

// ============================================================================
// Tree Walking
// ============================================================================

enum Task {
    Visit(Value),
    Join,
}

/// Copy `tree`, replacing every node for which `replace` returns a value.
/// Nodes that are not replaced are descended into when they are pairs and
/// kept as they are otherwise.
fn rebuild<F>(tree: &Value, mut replace: F) -> Value
where
    F: FnMut(&Value) -> Option<Value>,
{
    let mut tasks = vec![Task::Visit(tree.clone())];
    let mut built: Vec<Value> = Vec::new();

    while let Some(task) = tasks.pop() {
        match task {
            Task::Visit(node) => {
                if let Some(replacement) = replace(&node) {
                    built.push(replacement);
                } else if let Value::Pair(cell) = &node {
                    tasks.push(Task::Join);
                    tasks.push(Task::Visit(cell.cdr.clone()));
                    tasks.push(Task::Visit(cell.car.clone()));
                } else {
                    built.push(node);
                }
            }
            Task::Join => {
                let tail = built.pop().unwrap_or(Value::Nil);
                let head = built.pop().unwrap_or(Value::Nil);
                built.push(cons(head, tail));
            }
        }
    }

    built.pop().unwrap_or(Value::Nil)
}

// ============================================================================
// Elementary Functions
// ============================================================================

/// Structural equality: pairs are compared slot by slot, everything else
/// with [`eq`].
pub fn equal(x: &Value, y: &Value) -> bool {
    let mut pending = vec![(x.clone(), y.clone())];
    while let Some((a, b)) = pending.pop() {
        match (&a, &b) {
            (Value::Pair(p), Value::Pair(q)) => {
                pending.push((p.cdr.clone(), q.cdr.clone()));
                pending.push((p.car.clone(), q.car.clone()));
            }
            _ => {
                if !eq(&a, &b) {
                    return false;
                }
            }
        }
    }
    true
}

/// Replace every sub-tree of `z` that is `eq` to the atom `y` with `x`.
///
/// Singleton lists are atoms, so `y = ("x")` matches the tail `("x")` of
/// `(1 "x")` and `subst(9, ("x"), (1 "x"))` is `(1 . 9)`.
pub fn subst(x: &Value, y: &Value, z: &Value) -> Value {
    rebuild(z, |node| (is_atom(node) && eq(node, y)).then(|| x.clone()))
}

/// Prepend the elements of `x`, reversed, onto `acc`.
pub fn rev_append(x: &Value, acc: Value) -> Value {
    let mut acc = acc;
    let mut current = x;
    while let Value::Pair(cell) = current {
        acc = cons(cell.car.clone(), acc);
        current = &cell.cdr;
    }
    acc
}

pub fn reverse(x: &Value) -> Value {
    rev_append(x, Value::Nil)
}

/// Elements of `x` followed by `y`. The result shares `y`.
pub fn append(x: &Value, y: &Value) -> Value {
    if x.is_nil() {
        return y.clone();
    }
    rev_append(&reverse(x), y.clone())
}

/// Is some element of the list `y` `equal` to `x`?
pub fn member(x: &Value, y: &Value) -> bool {
    let mut current = y;
    while let Value::Pair(cell) = current {
        if equal(x, &cell.car) {
            return true;
        }
        current = &cell.cdr;
    }
    false
}

/// Number of cells along the CDR spine
pub fn length(x: &Value) -> usize {
    let mut count = 0;
    let mut current = x;
    while let Value::Pair(cell) = current {
        count += 1;
        current = &cell.cdr;
    }
    count
}

fn same_length(name: &str, x: &Value, y: &Value) -> EvalResult<()> {
    let (len_x, len_y) = (length(x), length(y));
    if len_x != len_y {
        return Err(InterpreterError::signature(
            name,
            format!("x and y must be of the same length, got {len_x} and {len_y}"),
        ));
    }
    Ok(())
}

/// Zip two lists into a list of two-element lists `((x1 y1) (x2 y2) ...)`.
pub fn pair(x: &Value, y: &Value) -> EvalResult<Value> {
    same_length("pair", x, y)?;

    let mut acc = Value::Nil;
    let (mut xs, mut ys) = (x, y);
    while let (Value::Pair(a), Value::Pair(b)) = (xs, ys) {
        acc = cons(list(&[a.car.clone(), b.car.clone()]), acc);
        xs = &a.cdr;
        ys = &b.cdr;
    }
    Ok(reverse(&acc))
}

/// Value of the first entry of `alist` whose key is `eq` to `key`.
///
/// `None` means the key is absent, which is different from a key bound to
/// `NIL`. Elements that are not pairs are skipped.
pub fn assoc(key: &Value, alist: &Value) -> Option<Value> {
    let mut current = alist;
    while let Value::Pair(cell) = current {
        if let Value::Pair(entry) = &cell.car {
            if eq(&entry.car, key) {
                return Some(entry.cdr.clone());
            }
        }
        current = &cell.cdr;
    }
    None
}

/// The value paired with `z` in `alist`, or `z` itself.
pub fn sub2(alist: &Value, z: &Value) -> Value {
    assoc(z, alist).unwrap_or_else(|| z.clone())
}

/// Simultaneous substitution: every leaf of `y` is replaced through `sub2`.
pub fn sublis(alist: &Value, y: &Value) -> Value {
    rebuild(y, |node| (!node.is_pair()).then(|| sub2(alist, node)))
}

/// Extend `base` with entries `(k . v)` zipped from `keys` and `vals`.
/// The new entries come first, in the order of `keys`.
pub fn pairlis(keys: &Value, vals: &Value, base: &Value) -> EvalResult<Value> {
    same_length("pairlis", keys, vals)?;

    let mut entries = Vec::new();
    let (mut ks, mut vs) = (keys, vals);
    while let (Value::Pair(k), Value::Pair(v)) = (ks, vs) {
        entries.push(cons(k.car.clone(), v.car.clone()));
        ks = &k.cdr;
        vs = &v.cdr;
    }
    Ok(vec_to_list(entries, base.clone()))
}

// ============================================================================
// Derived Functions
// ============================================================================

/// Leftmost leaf, following CARs (McCarthy's `ff`)
pub fn first_atom(x: &Value) -> Value {
    let mut current = x;
    while let Value::Pair(cell) = current {
        current = &cell.car;
    }
    current.clone()
}

/// Rightmost leaf: follows CDRs to the last element, then descends into it
pub fn last_atom(x: &Value) -> Value {
    let mut current = x;
    while let Value::Pair(cell) = current {
        current = if cell.cdr.is_nil() { &cell.car } else { &cell.cdr };
    }
    current.clone()
}

/// All non-NIL leaves of `x`, left to right, as a flat list
pub fn flatten(x: &Value) -> Value {
    let mut leaves = Vec::new();
    let mut pending = vec![x.clone()];
    while let Some(node) = pending.pop() {
        match node {
            Value::Pair(cell) => {
                pending.push(cell.cdr.clone());
                pending.push(cell.car.clone());
            }
            Value::Nil => {}
            leaf => leaves.push(leaf),
        }
    }
    vec_to_list(leaves, Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_without_replacement_copies() {
        let tree = list(&[Value::int(1), list(&[Value::int(2)]), Value::int(3)]);
        let copy = rebuild(&tree, |_| None);
        assert_eq!(copy, tree);
        match (&copy, &tree) {
            (Value::Pair(a), Value::Pair(b)) => assert!(!std::sync::Arc::ptr_eq(a, b)),
            _ => panic!("expected pairs"),
        }
    }

    #[test]
    fn test_rebuild_keeps_dotted_tails() {
        let tree = cons(Value::int(1), Value::int(2));
        let doubled = rebuild(&tree, |node| match node {
            Value::Number(_) => Some(Value::string("n")),
            _ => None,
        });
        assert_eq!(doubled, cons(Value::string("n"), Value::string("n")));
    }

    #[test]
    fn test_subst_reaches_nil_terminators() {
        let z = list(&[Value::int(1)]);
        assert_eq!(
            subst(&Value::int(9), &Value::Nil, &z),
            cons(Value::int(1), Value::int(9))
        );
    }
}
