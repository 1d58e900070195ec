// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::task::TaskId;

#[test]
fn short_truncates_long_ids() {
    let id = TaskId::new("0123456789abcdef");
    assert_eq!(id.short(8), "01234567");
    assert_eq!(id.short(100), "0123456789abcdef");
    assert_eq!("abc".short(2), "ab");
}

#[test]
fn id_conversions_and_display() {
    let a: TaskId = "t-1".into();
    let b: TaskId = String::from("t-1").into();
    assert_eq!(a, b);
    assert_eq!(a, *"t-1");
    assert_eq!(a.to_string(), "t-1");
    assert_eq!(a.as_str(), "t-1");
}

#[test]
fn uuid_gen_produces_unique_ids() {
    let gen = UuidIdGen;
    let first = gen.next();
    let second = gen.next();
    assert_ne!(first, second);
    assert_eq!(first.len(), 36);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn short_never_exceeds_the_limit(id in "[a-z0-9-]{0,64}", n in 0usize..80) {
            let task_id = TaskId::new(id.clone());
            let shortened = task_id.short(n);
            prop_assert!(shortened.len() <= n);
            prop_assert!(id.starts_with(shortened));
        }
    }
}

#[test]
fn sequential_gen_is_deterministic() {
    let gen = SequentialIdGen::new("wi");
    assert_eq!(gen.next(), "wi-1");
    assert_eq!(gen.next(), "wi-2");

    let clone = gen.clone();
    assert_eq!(clone.next(), "wi-3");
    assert_eq!(gen.next(), "wi-4");
}
