//! Property-based tests for changeset replay.

use carry_replay::{
    apply, Changeset, Instruction, InternString, ObjectRef, Payload, Store, ValueType,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Create,
    Erase(u8),
    Set(u8, i64),
    Add(u8, i64),
    Insert(u8, u8, String),
    Remove(u8, u8),
    Swap(u8, u8, u8),
    Clear(u8),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Create),
        1 => any::<u8>().prop_map(Op::Erase),
        2 => (any::<u8>(), any::<i64>()).prop_map(|(o, v)| Op::Set(o, v)),
        2 => (any::<u8>(), -100i64..100).prop_map(|(o, v)| Op::Add(o, v)),
        3 => (any::<u8>(), 0u8..4, "[a-z]{0,8}").prop_map(|(o, i, s)| Op::Insert(o, i, s)),
        1 => (any::<u8>(), 0u8..4).prop_map(|(o, i)| Op::Remove(o, i)),
        1 => (any::<u8>(), 0u8..4, 0u8..4).prop_map(|(o, a, b)| Op::Swap(o, a, b)),
        1 => any::<u8>().prop_map(Op::Clear),
    ]
}

/// Changeset over `items { n: Int, tags: List<String> }`.
///
/// Object references pick among the objects created so far plus one past
/// the end, so some sequences fail partway through.
fn build(ops: &[Op]) -> Changeset {
    let mut changeset = Changeset::new(1);
    let items = changeset.intern("items");
    let n = changeset.intern("n");
    let tags = changeset.intern("tags");
    changeset
        .push(Instruction::AddTable {
            table: items,
            primary_key: None,
        })
        .push(Instruction::AddColumn {
            table: items,
            column: n,
            value_type: ValueType::Int,
            nullable: false,
            list: false,
            link_target: None,
        })
        .push(Instruction::AddColumn {
            table: items,
            column: tags,
            value_type: ValueType::String,
            nullable: false,
            list: true,
            link_target: None,
        })
        .push(Instruction::SelectTable { table: items });

    let mut created = 0u32;
    let pick = |o: u8, created: u32| ObjectRef::Created(o as u32 % (created + 1));
    let select = |changeset: &mut Changeset, object: ObjectRef, field: InternString| {
        changeset.push(Instruction::SelectField { object, field });
    };

    for op in ops {
        match op {
            Op::Create => {
                changeset.push(Instruction::CreateObject { primary_key: None });
                created += 1;
            }
            Op::Erase(o) => {
                changeset.push(Instruction::EraseObject {
                    object: pick(*o, created),
                });
            }
            Op::Set(o, v) => {
                changeset.push(Instruction::Set {
                    object: pick(*o, created),
                    field: n,
                    value: Payload::Int(*v),
                });
            }
            Op::Add(o, v) => {
                changeset.push(Instruction::AddInteger {
                    object: pick(*o, created),
                    field: n,
                    value: *v,
                });
            }
            Op::Insert(o, i, s) => {
                select(&mut changeset, pick(*o, created), tags);
                let range = changeset.add_string(s);
                changeset.push(Instruction::ListInsert {
                    index: *i as u32,
                    value: Payload::String(range),
                });
            }
            Op::Remove(o, i) => {
                select(&mut changeset, pick(*o, created), tags);
                changeset.push(Instruction::ListErase { index: *i as u32 });
            }
            Op::Swap(o, a, b) => {
                select(&mut changeset, pick(*o, created), tags);
                changeset.push(Instruction::ListSwap {
                    a: *a as u32,
                    b: *b as u32,
                });
            }
            Op::Clear(o) => {
                select(&mut changeset, pick(*o, created), tags);
                changeset.push(Instruction::ListClear);
            }
        }
    }
    changeset
}

fn snapshot_json(store: &Store) -> String {
    store.export_state().to_json().unwrap()
}

proptest! {
    #[test]
    fn prop_replay_is_deterministic(ops in prop::collection::vec(arb_op(), 0..40)) {
        let changeset = build(&ops);

        let mut a = Store::new(1);
        let mut b = Store::new(1);
        let result_a = apply(&mut a, &changeset, None);
        let result_b = apply(&mut b, &changeset, None);

        prop_assert_eq!(result_a, result_b);
        prop_assert_eq!(snapshot_json(&a), snapshot_json(&b));
    }

    #[test]
    fn prop_failure_leaves_prefix_state(ops in prop::collection::vec(arb_op(), 0..40)) {
        let changeset = build(&ops);
        let mut store = Store::new(1);

        if let Err(err) = apply(&mut store, &changeset, None) {
            let index = err.index().unwrap();
            let mut prefix = changeset.clone();
            prefix.instructions.truncate(index);

            let mut expected = Store::new(1);
            prop_assert!(apply(&mut expected, &prefix, None).is_ok());
            prop_assert_eq!(snapshot_json(&store), snapshot_json(&expected));
        }
    }

    #[test]
    fn prop_snapshot_roundtrip(ops in prop::collection::vec(arb_op(), 0..20)) {
        let changeset = build(&ops);
        let mut store = Store::new(1);
        let _ = apply(&mut store, &changeset, None);

        let json = snapshot_json(&store);
        let mut restored = Store::new(0);
        restored
            .import_state(carry_replay::StoreSnapshot::from_json(&json).unwrap())
            .unwrap();
        prop_assert_eq!(restored, store);
    }
}
