use referral_core::{Coordinates, GraphConfig, NodeKind};
use referral_store::{
    ChangeKind, GraphFeed, JsonFileStore, MemoryStore, NewPatient, RecordStore, StoreError, Watched,
};

fn draft(name: &str, commune: &str, referrer: &str) -> NewPatient {
    NewPatient {
        name: name.to_string(),
        commune: commune.to_string(),
        referrer_name: referrer.to_string(),
        relationship: "colega".to_string(),
        ..NewPatient::default()
    }
}

#[test]
fn file_store_persists_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("patients.json");

    let mut store = JsonFileStore::new(&path);
    assert!(store.list().unwrap().is_empty());

    let records = store.create(draft("Ana", "Las Condes", "Dr. Pérez")).unwrap();
    assert_eq!(records.len(), 1);
    let id = records[0].id.clone();
    assert!(!id.is_empty());
    assert!(records[0].created_at > 0);

    let reopened = JsonFileStore::new(&path);
    let loaded = reopened.list().unwrap();
    assert_eq!(loaded, records);
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn update_preserves_identity_and_creation_time() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("patients.json"));

    let created = store.create(draft("Ana", "Las Condes", "Rosa")).unwrap().remove(0);

    let mut edited = created.clone();
    edited.name = "Ana Soto".to_string();
    edited.created_at = 0;
    edited.set_coordinates(Coordinates::new(-33.41, -70.57).unwrap());

    let records = store.update(edited).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, created.id);
    assert_eq!(records[0].created_at, created.created_at);
    assert_eq!(records[0].name, "Ana Soto");
    assert!(store.get(&created.id).unwrap().unwrap().coordinates().is_some());
}

#[test]
fn delete_removes_only_the_target() {
    let mut store = MemoryStore::new();
    store.create(draft("Ana", "Providencia", "Rosa")).unwrap();
    let records = store.create(draft("Beto", "Providencia", "Luis")).unwrap();
    let ana_id = records[0].id.clone();

    let remaining = store.delete(&ana_id).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "Beto");

    assert!(matches!(
        store.delete(&ana_id),
        Err(StoreError::RecordNotFound(id)) if id == ana_id
    ));
}

#[test]
fn created_ids_are_unique() {
    let mut store = MemoryStore::new();
    for i in 0..20 {
        store.create(draft(&format!("P{i}"), "Ñuñoa", "Rosa")).unwrap();
    }
    let mut ids: Vec<_> = store.list().unwrap().into_iter().map(|r| r.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20);
}

#[test]
fn corrupt_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patients.json");
    std::fs::write(&path, "{not json").unwrap();

    let store = JsonFileStore::new(&path);
    assert!(matches!(store.list(), Err(StoreError::Serialization(_))));
}

#[test]
fn watched_store_feeds_graph_recomputation() {
    let mut store = Watched::new(MemoryStore::new());
    let events = store.subscribe();
    let feed = GraphFeed::new(store.subscribe(), GraphConfig::default());

    let records = store.create(draft("Ana", "Providencia", "Rosa")).unwrap();
    let id = records[0].id.clone();
    store.create(draft("Beto", "Providencia", "Luis")).unwrap();

    let first = events.recv().unwrap();
    assert_eq!(first.change, ChangeKind::Created(id.clone()));
    assert_eq!(first.records.len(), 1);

    let graph = feed.latest().unwrap();
    assert_eq!(graph.stats().patients, 2);
    assert_eq!(graph.stats().locations, 1);
    assert_eq!(graph.incoming("location-providencia").count(), 2);

    store.delete(&id).unwrap();
    let graph = feed.next_graph().unwrap();
    assert_eq!(graph.stats().patients, 1);
    assert!(graph
        .nodes
        .iter()
        .all(|node| node.kind != NodeKind::Patient || node.id != id));
}

#[test]
fn failed_mutations_publish_nothing() {
    let mut store = Watched::new(MemoryStore::new());
    let events = store.subscribe();

    assert!(store.delete("missing").is_err());
    assert!(events.try_recv().is_err());
}

#[test]
fn dropped_subscribers_do_not_block_writes() {
    let mut store = Watched::new(MemoryStore::new());
    drop(store.subscribe());
    store.create(draft("Ana", "Maipú", "Rosa")).unwrap();
    assert_eq!(store.into_inner().list().unwrap().len(), 1);
}
