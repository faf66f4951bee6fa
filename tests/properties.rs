//! Property tests for the assignment engine.

use claimboard::{
    claim, is_unassigned, normalize, partition, save, RawTable, Row, Table, ValidatorId,
    STATUS_DONE,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn owner() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just(" ".to_string()),
        Just("alice".to_string()),
        Just("bob".to_string()),
        Just("Bob".to_string()),
    ]
}

fn row() -> impl Strategy<Value = Row> {
    (owner(), any::<bool>(), "[a-z ]{0,8}").prop_map(|(validator, done, label)| {
        let assigned = !validator.trim().is_empty();
        let mut row = Row::new("triage", label.clone(), "");
        row.validator = validator;
        if assigned && done {
            row.instruction_ats = label;
            row.status = STATUS_DONE.into();
        }
        row
    })
}

fn table() -> impl Strategy<Value = Table> {
    prop::collection::vec(row(), 0..40).prop_map(Table::from_rows)
}

fn user() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("alice".to_string()),
        Just("bob".to_string()),
        Just("Bob".to_string()),
        Just(" ".to_string()),
        Just(String::new()),
    ]
}

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!("nan")),
        any::<i64>().prop_map(|n| json!(n)),
        any::<bool>().prop_map(|b| json!(b)),
        "[a-zA-Z ]{0,6}".prop_map(|s| json!(s)),
    ]
}

#[derive(Clone, Debug)]
enum Op {
    Claim { user: &'static str, size: usize },
    Save { user: &'static str, index: usize },
}

fn op() -> impl Strategy<Value = Op> {
    let name = prop_oneof![Just("alice"), Just("bob"), Just("carol")];
    prop_oneof![
        (name.clone(), 0usize..12).prop_map(|(user, size)| Op::Claim { user, size }),
        (name, 0usize..45).prop_map(|(user, index)| Op::Save { user, index }),
    ]
}

proptest! {
    #[test]
    fn save_is_idempotent(
        mut table in table(),
        pick in any::<prop::sample::Index>(),
        label in "[A-Z0-9 ]{0,6}",
    ) {
        prop_assume!(!table.is_empty());
        let index = pick.index(table.len());
        if is_unassigned(&table.rows[index]) {
            table.rows[index].validator = "bob".into();
        }

        let owner = ValidatorId::new(table.rows[index].validator.clone()).unwrap();
        save(&mut table, index, &owner, &label).unwrap();
        let once = table.clone();
        save(&mut table, index, &owner, &label).unwrap();

        prop_assert_eq!(&table, &once);
        prop_assert_eq!(&table.rows[index].instruction_ats, &label);
        prop_assert_eq!(table.rows[index].status.as_str(), STATUS_DONE);
    }

    #[test]
    fn partitions_are_disjoint(table in table(), user in user()) {
        let p = partition(&table, &user);
        for i in &p.unassigned {
            prop_assert!(!p.mine_all.contains(i));
        }
        for i in &p.mine_pending {
            prop_assert!(p.mine_all.contains(i));
            prop_assert!(!table.rows[*i].is_done());
        }
    }

    #[test]
    fn claim_takes_first_min_k_m(mut table in table(), k in 0usize..60) {
        let before = partition(&table, "carol");
        let carol = ValidatorId::new("carol").unwrap();

        let claimed = claim(&mut table, &carol, k);

        let expected: Vec<usize> = before.unassigned.iter().copied().take(k).collect();
        prop_assert_eq!(claimed.len(), k.min(before.unassigned.len()));
        prop_assert_eq!(&claimed, &expected);
        for i in &claimed {
            prop_assert_eq!(table.rows[*i].validator.as_str(), "carol");
            prop_assert_eq!(table.rows[*i].status.as_str(), "");
        }
    }

    #[test]
    fn normalize_is_total(
        columns in prop::collection::vec("[a-z]{1,6}", 0..5),
        rows in prop::collection::vec(prop::collection::vec(cell(), 0..6), 0..10),
    ) {
        let columns: Vec<String> = columns
            .into_iter()
            .filter(|c| !["validator", "instruction_ats", "status"].contains(&c.as_str()))
            .collect();
        let raw = RawTable { columns, rows };
        let count = raw.len();
        let before = raw.rows.clone();

        let table = normalize(raw);
        let back = table.to_raw();

        prop_assert_eq!(table.len(), count);
        for column in ["validator", "instruction_ats", "status"] {
            prop_assert!(table.columns.iter().any(|c| c == column));
        }
        for row in &table.rows {
            prop_assert_eq!(row.validator.as_str(), "");
            prop_assert_eq!(row.instruction_ats.as_str(), "");
            prop_assert_eq!(row.status.as_str(), "");
        }
        for (stored, cells) in back.rows.iter().zip(&before) {
            prop_assert_eq!(&stored[..cells.len()], cells.as_slice());
        }
    }

    #[test]
    fn owners_never_revert(mut table in table(), ops in prop::collection::vec(op(), 0..20)) {
        for op in ops {
            let owners: Vec<String> = table.rows.iter().map(|r| r.validator.clone()).collect();

            match op {
                Op::Claim { user, size } => {
                    claim(&mut table, &ValidatorId::new(user).unwrap(), size);
                }
                Op::Save { user, index } => {
                    let _ = save(&mut table, index, &ValidatorId::new(user).unwrap(), "KAT 3");
                }
            }

            for (row, previous) in table.rows.iter().zip(&owners) {
                if !previous.trim().is_empty() {
                    prop_assert_eq!(&row.validator, previous);
                }
            }
        }
    }
}
