use std::fs;

use referral_core::{derive_graph, GraphConfig, Sex};
use referral_store::{JsonFileStore, RecordStore};
use serde_json::Value;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn stored_referrals_match_golden_graph() {
    let store = JsonFileStore::new(fixture_path("referrals.json"));
    let records = store.list().expect("Could not read fixture records");
    assert_eq!(records.len(), 3);

    let graph = derive_graph(&records, &GraphConfig::default());
    let actual = serde_json::to_value(&graph).expect("Could not serialize graph");

    let expected = fs::read_to_string(fixture_path("referral_graph.json"))
        .expect("Could not read golden graph");
    let expected: Value = serde_json::from_str(&expected).expect("Golden graph is invalid");

    assert_eq!(actual, expected);
}

#[test]
fn fixture_form_blanks_are_read_as_absent() {
    let store = JsonFileStore::new(fixture_path("referrals.json"));
    let records = store.list().unwrap();

    let beto = &records[1];
    assert_eq!(beto.birth_date, None);
    assert_eq!(beto.sex, Some(Sex::Male));
    assert!(!beto.contraceptive_applies());

    let ana = &records[0];
    assert!(ana.contraceptive_applies());
    assert!(ana.coordinates().is_some());
}
