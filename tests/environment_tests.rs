//! Tests for environments, registries, export and merge

use std::sync::Arc;

use mccarthy::{
    DataType, Environment, ErrorKind, Snapshot, SpecialForm, Symbol, Value, define_data_type,
    list,
};

fn quote_like(args: &Value, _env: &Environment) -> mccarthy::EvalResult<Value> {
    Ok(args.clone())
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_bind_and_lookup() {
    let env = Environment::new();
    env.bind("x", Value::int(1));
    assert_eq!(env.lookup("x"), Some(Value::int(1)));
    assert!(env.contains("x"));
    assert_eq!(env.lookup("y"), None);
    assert!(!env.contains("y"));
}

#[test]
fn test_rebind_replaces() {
    let env = Environment::new();
    env.bind("x", Value::int(1));
    env.bind("x", Value::int(2));
    assert_eq!(env.lookup("x"), Some(Value::int(2)));
    assert_eq!(env.export().values().len(), 1);
}

#[test]
fn test_unbind() {
    let env = Environment::new();
    env.bind("x", Value::int(1));
    assert_eq!(env.unbind("x"), Some(Value::int(1)));
    assert_eq!(env.lookup("x"), None);
    assert_eq!(env.unbind("x"), None);
}

#[test]
fn test_bound_nil_is_not_absent() {
    let env = Environment::new();
    env.bind("empty", Value::Nil);
    assert_eq!(env.lookup("empty"), Some(Value::Nil));
    assert!(env.contains("empty"));
}

// ============================================================================
// Scopes
// ============================================================================

#[test]
fn test_child_sees_parent() {
    let parent = Environment::new();
    parent.bind("x", Value::int(1));
    let child = parent.child();
    assert_eq!(child.lookup("x"), Some(Value::int(1)));
}

#[test]
fn test_child_shadows_parent() {
    let parent = Environment::new();
    parent.bind("x", Value::int(1));
    let child = parent.child();
    child.bind("x", Value::int(2));
    assert_eq!(child.lookup("x"), Some(Value::int(2)));
    assert_eq!(parent.lookup("x"), Some(Value::int(1)));
}

#[test]
fn test_unbind_only_touches_current_scope() {
    let parent = Environment::new();
    parent.bind("x", Value::int(1));
    let child = parent.child();
    assert_eq!(child.unbind("x"), None);
    assert_eq!(child.lookup("x"), Some(Value::int(1)));
}

#[test]
fn test_extend_binds_params() {
    let env = Environment::new();
    let params = [Symbol::new("a"), Symbol::new("b")];
    let scope = env.extend(&params, &[Value::int(1), Value::int(2)]);
    assert_eq!(scope.lookup("a"), Some(Value::int(1)));
    assert_eq!(scope.lookup("b"), Some(Value::int(2)));
    assert_eq!(env.lookup("a"), None);
}

// ============================================================================
// Forms and Types
// ============================================================================

#[test]
fn test_registries_are_independent() {
    let env = Environment::new();
    env.bind("thing", Value::int(1));
    env.define_form(SpecialForm::new("thing", quote_like));
    define_data_type(&env, "thing", |_| true, Ok);

    assert_eq!(env.lookup("thing"), Some(Value::int(1)));
    assert!(env.lookup_form("thing").is_some());
    assert!(env.lookup_type("thing").is_some());

    env.unbind("thing");
    assert!(env.lookup_form("thing").is_some());
}

#[test]
fn test_resolve_precedence() {
    let env = Environment::new();
    let name = Symbol::new("thing");
    define_data_type(&env, "thing", |_| true, Ok);
    assert!(matches!(env.resolve(name), Some(Value::DataType(_))));

    env.define_form(SpecialForm::new("thing", quote_like));
    assert!(matches!(env.resolve(name), Some(Value::Form(_))));

    env.bind("thing", Value::int(1));
    assert_eq!(env.resolve(name), Some(Value::int(1)));

    assert!(env.is_registered(name));
    assert!(!env.is_registered(Symbol::new("other")));
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_export_preserves_insertion_order() {
    let env = Environment::new();
    env.bind("c", Value::int(3));
    env.bind("a", Value::int(1));
    env.bind("b", Value::int(2));

    let snapshot = env.export();
    let names: Vec<String> = snapshot
        .values()
        .iter()
        .map(|(name, _)| name.resolve())
        .collect();
    assert_eq!(names, vec!["c", "a", "b"]);
}

#[test]
fn test_export_is_a_snapshot() {
    let env = Environment::new();
    env.bind("x", Value::int(1));
    let snapshot = env.export();
    env.bind("x", Value::int(2));
    env.bind("y", Value::int(3));

    assert_eq!(snapshot.get("x"), Some(&Value::int(1)));
    assert_eq!(snapshot.get("y"), None);
    assert_eq!(snapshot.len(), 1);
}

#[test]
fn test_export_flattens_scopes() {
    let parent = Environment::new();
    parent.bind("x", Value::int(1));
    parent.bind("y", Value::int(2));
    let child = parent.child();
    child.bind("y", Value::int(20));

    let snapshot = child.export();
    assert_eq!(snapshot.get("x"), Some(&Value::int(1)));
    assert_eq!(snapshot.get("y"), Some(&Value::int(20)));
}

#[test]
fn test_export_includes_forms_and_types() {
    let env = Environment::new();
    env.define_form(SpecialForm::new("q", quote_like));
    define_data_type(&env, "any", |_| true, Ok);
    let snapshot = env.export();
    assert_eq!(snapshot.forms().len(), 1);
    assert_eq!(snapshot.types().len(), 1);
    assert!(!snapshot.is_empty());
}

#[test]
fn test_snapshot_to_object() {
    let env = Environment::new();
    env.bind("x", Value::int(1));
    let Value::Object(object) = env.export().to_object() else {
        panic!("expected an object");
    };
    assert_eq!(object.get("x"), Some(&Value::int(1)));
}

// ============================================================================
// Merge
// ============================================================================

#[test]
fn test_merge_round_trip() {
    let source = Environment::new();
    source.bind("x", Value::int(1));
    source.define_form(SpecialForm::new("q", quote_like));
    define_data_type(&source, "any", |_| true, Ok);

    let target = Environment::new();
    target.merge(&source.export()).unwrap();
    assert_eq!(target.lookup("x"), Some(Value::int(1)));
    assert!(target.lookup_form("q").is_some());
    assert!(target.lookup_type("any").is_some());
}

#[test]
fn test_merge_into_child_scope() {
    let parent = Environment::new();
    let child = parent.child();
    child
        .merge(&Snapshot::new().with_value("x", Value::int(1)))
        .unwrap();
    assert_eq!(child.lookup("x"), Some(Value::int(1)));
    assert_eq!(parent.lookup("x"), None);
}

#[test]
fn test_merge_rejects_misfiled_form() {
    let env = Environment::new();
    let form = Arc::new(SpecialForm::new("q", quote_like));
    let snapshot = Snapshot::new()
        .with_value("x", Value::int(1))
        .with_form("not-q", form);

    let err = env.merge(&snapshot).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Module);
    // Nothing was installed
    assert_eq!(env.lookup("x"), None);
}

#[test]
fn test_merge_rejects_misfiled_type() {
    let env = Environment::new();
    let data_type = Arc::new(DataType::new("any", |_: &Value| true, Ok));
    let snapshot = Snapshot::new().with_type("other", data_type);
    let err = env.merge(&snapshot).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Module);
}

#[test]
fn test_merge_value_object() {
    let source = Environment::new();
    source.bind("x", Value::int(1));
    let module = source.export().to_object();

    let env = Environment::new();
    env.merge_value(&module).unwrap();
    assert_eq!(env.lookup("x"), Some(Value::int(1)));
}

#[test]
fn test_merge_value_alist() {
    let module = list(&[
        mccarthy::cons(Value::symbol("a"), Value::int(1)),
        mccarthy::cons(Value::string("b"), Value::int(2)),
    ]);
    let env = Environment::new();
    env.merge_value(&module).unwrap();
    assert_eq!(env.lookup("a"), Some(Value::int(1)));
    assert_eq!(env.lookup("b"), Some(Value::int(2)));
}

#[test]
fn test_merge_value_rejects_non_module() {
    let env = Environment::new();
    let err = env.merge_value(&Value::int(5)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Module);

    let err = env.merge_value(&list(&[Value::int(5)])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Module);
}
