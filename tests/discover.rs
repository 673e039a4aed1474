mod common;

use std::collections::BTreeSet;

use common::{COLLECTION_URL, METADATA_URL, SimulatedCollection};
use soda_pull::discover::{self, ColumnManifest};

fn set(fields: &[&str]) -> BTreeSet<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

#[test]
fn discovery_queries_metadata_endpoint_once() {
    let collection = SimulatedCollection::permits(0);
    let fields = discover::discover_columns(&collection, COLLECTION_URL).expect("schema");

    assert_eq!(
        fields,
        set(&["borough", "issued_date", "permit_status", "work_type"])
    );
    let requests = collection.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, METADATA_URL);
    assert!(requests[0].query.is_empty());
}

#[test]
fn unmatched_url_is_unknown_schema_without_requests() {
    let collection = SimulatedCollection::permits(0);
    for url in [
        "https://data.cityofnewyork.us/api/views/rbx6-tga4.json",
        "https://data.cityofnewyork.us/resource/RBX6-TGA4.json",
        "not a url",
    ] {
        let fields = discover::discover_columns(&collection, url).expect("no error");
        assert!(fields.is_empty(), "{url}");
    }
    assert!(collection.requests().is_empty());
}

#[test]
fn metadata_failure_propagates_status() {
    let collection = SimulatedCollection::permits(0).failing_metadata(500);
    let err = discover::discover_columns(&collection, COLLECTION_URL).expect_err("fatal");
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains(METADATA_URL));
    assert!(err.to_string().contains("dataset abcd-1234"));
}

#[test]
fn metadata_url_keeps_host_and_port() {
    assert_eq!(
        discover::metadata_url("https://data.cityofnewyork.us/resource/w9ak-ipjd.json").as_deref(),
        Some("https://data.cityofnewyork.us/api/views/w9ak-ipjd.json")
    );
    assert_eq!(
        discover::metadata_url("http://127.0.0.1:8080/resource/6z8x-wfk4.json?$limit=1")
            .as_deref(),
        Some("http://127.0.0.1:8080/api/views/6z8x-wfk4.json")
    );
}

#[test]
fn manifest_keeps_requested_order_and_drops_unknowns() {
    let schema = set(&["a_first", "borough", "issued_date"]);
    let desired = vec![
        "issued_date".to_string(),
        "gone".to_string(),
        "borough".to_string(),
        "issued_date".to_string(),
    ];
    let manifest = ColumnManifest::resolve(&schema, &desired, Some("issued_date")).unwrap();
    assert_eq!(manifest.select_clause(), "issued_date, borough");
    assert_eq!(manifest.order_clause().as_deref(), Some("issued_date DESC"));
    assert!(!manifest.fallback);

    let fallback = ColumnManifest::resolve(&schema, &["gone".to_string()], None).unwrap();
    assert_eq!(fallback.select, vec!["a_first".to_string()]);
    assert!(fallback.fallback);

    assert!(ColumnManifest::resolve(&BTreeSet::new(), &desired, None).is_none());
}
