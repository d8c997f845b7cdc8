#[path = "../support/mod.rs"]
mod support;

use std::path::PathBuf;

use semaflow::handle::FlowHandle;
use semaflow::model::loader::load_catalog_dir;
use semaflow::planner::QueryRequest;

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/catalog")
}

#[test]
fn test_loads_tables_and_flows() {
    let (tables, flows) = load_catalog_dir(&fixture_dir()).unwrap();
    let table_names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(table_names, vec!["customers", "orders"]);
    let flow_names: Vec<&str> = flows.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(flow_names, vec!["sales", "simple"]);

    let sales = &flows[0];
    assert_eq!(sales.base_alias, "o");
    assert_eq!(sales.joins.len(), 1);
    assert_eq!(sales.joins[0].alias, "c");
    assert_eq!(sales.joins[0].to_alias, "o");
}

#[test]
fn test_from_dir_builds_a_working_handle() {
    let handle = FlowHandle::from_dir(fixture_dir(), vec![support::seeded_source()]).unwrap();
    let names: Vec<String> = handle.list_flows().into_iter().map(|f| f.name).collect();
    assert!(names.contains(&"sales".to_string()));
    assert!(names.contains(&"simple".to_string()));

    let mut request = QueryRequest::for_flow("simple");
    request.dimensions = vec!["o.status".into()];
    request.measures = vec!["o.order_total".into()];
    let sql = handle.build_sql(&request).unwrap();
    assert!(sql.contains("SELECT"));
    assert!(sql.contains("GROUP BY"));
}

#[test]
fn test_loaded_schema_carries_descriptions() {
    let handle = FlowHandle::from_dir(fixture_dir(), vec![support::seeded_source()]).unwrap();
    let schema = handle.get_flow("sales").unwrap();
    assert_eq!(schema.time_dimension.as_deref(), Some("o.created_at"));
    let country = schema
        .dimensions
        .iter()
        .find(|d| d.qualified_name == "c.country")
        .unwrap();
    assert_eq!(country.description.as_deref(), Some("Customer country"));
    assert_eq!(country.data_type.as_deref(), Some("string"));
}

#[test]
fn test_missing_directory_is_catalog_invalid() {
    let err = load_catalog_dir(&fixture_dir().join("nope")).unwrap_err();
    assert!(matches!(err, semaflow::FlowError::CatalogInvalid(_)));
}
