#[path = "../support/mod.rs"]
mod support;

use semaflow::error::FlowError;
use semaflow::model::{FlowJoin, JoinKey, JoinKind, SemanticFlow};

#[test]
fn test_fixture_flows_are_structurally_valid() {
    assert!(support::simple_flow().validate_structure().is_ok());
    assert!(support::joined_flow().validate_structure().is_ok());
}

#[test]
fn test_aliases_in_declaration_order() {
    let flow = support::joined_flow();
    let aliases: Vec<&str> = flow.aliases().collect();
    assert_eq!(aliases, vec!["o", "c"]);
}

#[test]
fn test_rejects_duplicate_alias() {
    let flow = support::joined_flow().with_join(FlowJoin {
        semantic_table: "customers".into(),
        alias: "c".into(),
        to_alias: "o".into(),
        kind: JoinKind::Left,
        keys: vec![JoinKey::new("customer_id", "id")],
    });
    assert!(matches!(
        flow.validate_structure(),
        Err(FlowError::CatalogInvalid(_))
    ));
}

#[test]
fn test_rejects_forward_join_target() {
    // "d" attaches to "x", which is declared later.
    let flow = SemanticFlow::new("bad", "orders", "o")
        .with_join(FlowJoin {
            semantic_table: "customers".into(),
            alias: "d".into(),
            to_alias: "x".into(),
            kind: JoinKind::Inner,
            keys: vec![JoinKey::new("customer_id", "id")],
        })
        .with_join(FlowJoin {
            semantic_table: "customers".into(),
            alias: "x".into(),
            to_alias: "o".into(),
            kind: JoinKind::Inner,
            keys: vec![JoinKey::new("customer_id", "id")],
        });
    let err = flow.validate_structure().unwrap_err();
    assert!(err.to_string().contains("not declared earlier"));
}

#[test]
fn test_rejects_empty_join_keys() {
    let flow = SemanticFlow::new("bad", "orders", "o").with_join(FlowJoin {
        semantic_table: "customers".into(),
        alias: "c".into(),
        to_alias: "o".into(),
        kind: JoinKind::Left,
        keys: vec![],
    });
    let err = flow.validate_structure().unwrap_err();
    assert!(err.to_string().contains("no join keys"));
}
