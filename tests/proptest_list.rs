use mccarthy::list::{append, assoc, equal, length, member, pairlis, reverse, sublis, subst};
use mccarthy::{Value, car, cdr, cons, list};
use proptest::prelude::*;

// ============================================================================
// Strategies for Generating Values
// ============================================================================

/// Atoms drawn from a small pool so that generated trees share leaves
fn atom() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-50i64..50).prop_map(Value::int),
        prop_oneof![any::<f64>(), Just(f64::NAN), Just(-0.0)].prop_map(Value::float),
        "[a-e]".prop_map(|s| Value::string(s)),
        "[p-t]".prop_map(|s| Value::symbol(&s)),
        Just(Value::Nil),
        any::<bool>().prop_map(Value::Bool),
    ]
}

/// Arbitrary trees of nested lists over `atom()`
fn tree() -> impl Strategy<Value = Value> {
    atom().prop_recursive(4, 64, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(|items| list(&items))
    })
}

/// Proper lists of trees
fn proper_list() -> impl Strategy<Value = Value> {
    prop::collection::vec(tree(), 0..12).prop_map(|items| list(&items))
}

// ============================================================================
// Structural Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn equal_is_reflexive(x in tree()) {
        prop_assert!(equal(&x, &x));
        // A fresh copy shares no cells with the original
        prop_assert!(equal(&x, &sublis(&Value::Nil, &x)));
    }

    #[test]
    fn equal_is_symmetric(x in tree(), y in tree()) {
        prop_assert_eq!(equal(&x, &y), equal(&y, &x));
    }

    #[test]
    fn car_cdr_of_cons(x in tree(), y in tree()) {
        let z = cons(x.clone(), y.clone());
        prop_assert!(equal(&car(&z).unwrap(), &x));
        prop_assert!(equal(&cdr(&z).unwrap(), &y));
    }

    #[test]
    fn reverse_is_an_involution(x in proper_list()) {
        prop_assert!(equal(&reverse(&reverse(&x)), &x));
        prop_assert_eq!(length(&reverse(&x)), length(&x));
    }

    #[test]
    fn append_adds_lengths(x in proper_list(), y in proper_list()) {
        prop_assert_eq!(length(&append(&x, &y)), length(&x) + length(&y));
    }

    #[test]
    fn append_nil_is_identity(x in proper_list()) {
        prop_assert!(equal(&append(&Value::Nil, &x), &x));
        prop_assert!(equal(&append(&x, &Value::Nil), &x));
    }

    #[test]
    fn appended_elements_are_members(x in proper_list(), y in proper_list()) {
        let joined = append(&x, &y);
        let mut current = &x;
        while let Value::Pair(cell) = current {
            prop_assert!(member(&cell.car, &joined));
            current = &cell.cdr;
        }
    }

    #[test]
    fn subst_atom_for_itself_is_identity(z in tree(), y in atom()) {
        prop_assert!(equal(&subst(&y, &y, &z), &z));
    }

    #[test]
    fn pairlis_then_assoc(n in 0usize..10, base in proper_list()) {
        let keys: Vec<Value> = (0..n).map(|i| Value::symbol(&format!("k{i}"))).collect();
        let vals: Vec<Value> = (0..n).map(|i| Value::int(i as i64)).collect();
        let alist = pairlis(&list(&keys), &list(&vals), &Value::Nil).unwrap();
        for (key, val) in keys.iter().zip(vals.iter()) {
            prop_assert_eq!(assoc(key, &alist), Some(val.clone()));
        }
        prop_assert_eq!(length(&alist), n);
        prop_assert_eq!(assoc(&Value::symbol("missing"), &alist), None);

        let extended = pairlis(&list(&keys), &list(&vals), &base).unwrap();
        prop_assert_eq!(length(&extended), n + length(&base));
    }
}
