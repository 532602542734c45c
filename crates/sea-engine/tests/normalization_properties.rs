use proptest::prelude::*;
use sea_engine::Expression;

fn leaf() -> impl Strategy<Value = Expression> {
    prop_oneof![
        prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(|name| Expression::variable(name)),
        any::<bool>().prop_map(Expression::boolean),
        (0i64..100).prop_map(|n| Expression::number(n)),
        prop::sample::select(vec!["Warehouse", "Store"])
            .prop_map(|object| Expression::member_access(object, "capacity")),
    ]
}

fn expression() -> impl Strategy<Value = Expression> {
    leaf().prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Expression::and(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Expression::or(l, r)),
            inner.clone().prop_map(Expression::not),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Expression::eq(l, r)),
            (inner.clone(), inner).prop_map(|(l, r)| Expression::gt(l, r)),
        ]
    })
}

proptest! {
    #[test]
    fn and_or_are_order_insensitive(a in expression(), b in expression()) {
        let ab = Expression::and(a.clone(), b.clone()).normalize();
        let ba = Expression::and(b.clone(), a.clone()).normalize();
        prop_assert_eq!(&ab, &ba);
        prop_assert_eq!(ab.stable_hash(), ba.stable_hash());

        let ab = Expression::or(a.clone(), b.clone()).normalize();
        let ba = Expression::or(b, a).normalize();
        prop_assert_eq!(&ab, &ba);
        prop_assert_eq!(ab.stable_hash(), ba.stable_hash());
    }

    #[test]
    fn normalization_is_idempotent(e in expression()) {
        let once = e.normalize();
        let twice = once.inner_expression().normalize();
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.stable_hash(), twice.stable_hash());
    }

    #[test]
    fn stable_hash_is_repeatable(e in expression()) {
        prop_assert_eq!(e.stable_hash(), e.clone().normalize().stable_hash());
        prop_assert_eq!(e.stable_hash_hex(), e.stable_hash_hex());
        prop_assert!(e.is_equivalent(&e.normalize().into_inner()));
    }
}

#[test]
fn logical_simplifications() {
    let x = Expression::variable("x");
    let expected = x.normalize();

    let double_not = Expression::not(Expression::not(x.clone()));
    assert_eq!(double_not.normalize(), expected);

    let true_and = Expression::and(Expression::boolean(true), x.clone());
    assert_eq!(true_and.normalize(), expected);

    let false_or = Expression::or(Expression::boolean(false), x.clone());
    assert_eq!(false_or.normalize(), expected);

    let x_and_x = Expression::and(x.clone(), x.clone());
    assert_eq!(x_and_x.normalize(), expected);
    assert_eq!(x_and_x.normalize().inner_expression(), &x);
}

#[test]
fn different_expressions_hash_differently() {
    let a = Expression::gt(Expression::variable("a"), Expression::number(1));
    let b = Expression::gt(Expression::variable("a"), Expression::number(2));
    assert!(!a.is_equivalent(&b));
    assert_ne!(a.stable_hash(), b.stable_hash());

    let hex = a.stable_hash_hex();
    assert!(hex.starts_with("0x"));
    assert_eq!(hex.len(), 18);
}
