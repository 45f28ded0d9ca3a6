use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;

use entify::{
    export_rows, resolve, to_csv_string, ClusterSet, EnrichmentRuntime, EnrichmentRuntimeConfig,
    InMemoryRecordStore, RecordEnricher, ResolutionConfig,
};
use serde_json::{json, Value};

fn scored(left: &str, right: &str, p: f64) -> Value {
    json!({
        "unique_id_l": left,
        "unique_id_r": right,
        "first_name_l": format!("{left}-first"),
        "first_name_r": format!("{right}-first"),
        "match_probability": p,
    })
}

fn example_matches() -> Vec<Value> {
    vec![
        scored("A", "B", 0.9),
        scored("B", "C", 0.8),
        scored("D", "E", 0.95),
    ]
}

fn member_sets(set: &ClusterSet) -> Vec<BTreeSet<String>> {
    set.iter()
        .map(|c| c.entity_ids.iter().map(ToString::to_string).collect())
        .collect()
}

fn ids(raw: &[&str]) -> BTreeSet<String> {
    raw.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn chain_and_pair_form_two_clusters() {
    let out = resolve(&example_matches(), &ResolutionConfig::with_threshold(0.5)).unwrap();

    assert_eq!(member_sets(&out.clusters), vec![ids(&["A", "B", "C"]), ids(&["D", "E"])]);
    let first = &out.clusters.clusters()[0];
    assert_eq!((first.rank, first.size, first.edges.len()), (1, 3, 2));
    assert!((first.avg_score - 0.85).abs() < 1e-9);
    let second = &out.clusters.clusters()[1];
    assert_eq!((second.rank, second.size), (2, 2));
    assert!((second.avg_score - 0.95).abs() < 1e-9);
    assert_eq!(out.statistics.total_edges, 3);
}

#[test]
fn raising_the_threshold_splits_the_chain() {
    let out = resolve(&example_matches(), &ResolutionConfig::with_threshold(0.85)).unwrap();

    let sets = member_sets(&out.clusters);
    assert_eq!(sets.len(), 2);
    assert!(sets.contains(&ids(&["A", "B"])));
    assert!(sets.contains(&ids(&["D", "E"])));
    assert!(out.clusters.cluster_of("C").is_none());
}

#[test]
fn export_lists_every_member_with_rank_and_size() {
    let out = resolve(&example_matches(), &ResolutionConfig::with_threshold(0.5)).unwrap();
    let rows = export_rows(&out.clusters);
    assert_eq!(rows.len(), 5);

    let big_key = out.clusters.clusters()[0].stable_key.clone();
    for row in &rows[..3] {
        assert_eq!((row.cluster_rank, row.cluster_size), (1, 3));
        assert_eq!(row.cluster_id, big_key);
    }
    for row in &rows[3..] {
        assert_eq!((row.cluster_rank, row.cluster_size), (2, 2));
    }

    let csv = to_csv_string(&out.clusters).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("entity_id,cluster_id,cluster_number,cluster_size")
    );
    assert_eq!(lines.count(), 5);
}

#[test]
fn enrichment_falls_back_to_first_column() {
    let out = resolve(&example_matches(), &ResolutionConfig::with_threshold(0.5)).unwrap();

    let store = Arc::new(InMemoryRecordStore::new());
    store
        .load_csv(
            "input_data",
            "person_ref,first_name,city\nA,Ann,Oslo\nC,Cy,Rome\nE,Eve,Lima\n".as_bytes(),
        )
        .unwrap();

    let outcome = RecordEnricher::new(store, "input_data").enrich(&out.clusters);
    assert!(outcome.is_complete());
    assert_eq!(outcome.id_column.as_deref(), Some("person_ref"));
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.record("C").unwrap()["city"], json!("Rome"));

    let enriched = outcome.apply(&out.clusters);
    let b = enriched.clusters()[0]
        .entities
        .iter()
        .find(|e| e.id.as_str() == "B")
        .unwrap();
    assert_eq!(b.field("first_name"), Some(&json!("B-first")));
}

#[test]
fn config_file_drives_the_pipeline() {
    let config = ResolutionConfig::from_toml_str(
        r#"
        min_probability = 0.5
        [size_range]
        min = 3
        "#,
    )
    .unwrap();
    let out = resolve(&example_matches(), &config).unwrap();
    assert_eq!(member_sets(&out.clusters), vec![ids(&["A", "B", "C"])]);
    assert_eq!(out.clusters.clusters()[0].rank, 1);
}

#[test]
fn structured_and_flat_records_mix() {
    let raw = vec![
        json!({
            "left_entity": {"unique_id": 10, "name": "Ann"},
            "right_entity": {"unique_id": 11, "name": "Anne"},
            "match_probability": "0.91"
        }),
        json!({"id_l": 11, "id_r": 12, "match_probability": 0.7}),
        json!({"id_l": 12, "id_r": 13, "match_probability": "not a number"}),
    ];
    let out = resolve(&raw, &ResolutionConfig::default()).unwrap();
    assert_eq!(out.accepted, 2);
    assert_eq!(out.rejections.len(), 1);
    assert_eq!(out.rejections[0].code, "InvalidProbability");
    assert_eq!(member_sets(&out.clusters), vec![ids(&["10", "11", "12"])]);
}

#[test]
fn background_enrichment_keeps_only_the_newest_result() {
    let store = Arc::new(InMemoryRecordStore::new());
    store
        .load_csv("input_data", "unique_id,name\nA,Ann\nD,Dee\n".as_bytes())
        .unwrap();
    let runtime = EnrichmentRuntime::new(
        RecordEnricher::new(store, "input_data"),
        EnrichmentRuntimeConfig::default(),
    );

    let loose = resolve(&example_matches(), &ResolutionConfig::with_threshold(0.5)).unwrap();
    let strict = resolve(&example_matches(), &ResolutionConfig::with_threshold(0.92)).unwrap();

    let stale = runtime.submit(loose.clusters).unwrap();
    let fresh = runtime.submit(strict.clusters).unwrap();

    assert!(stale.join_latest().unwrap().is_none());
    let outcome = fresh
        .join_timeout(Duration::from_secs(5))
        .unwrap();
    assert_eq!(outcome.records.len(), 1);
    assert!(outcome.record("D").is_some());
}

#[test]
fn files_on_disk_round_through_config_store_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("entify.toml");
    let records_path = dir.path().join("people.csv");
    let export_path = dir.path().join("clusters.csv");

    fs::write(
        &config_path,
        "min_probability = 0.85\n[enrichment]\ntable = \"people\"\nid_column = \"unique_id\"\n",
    )
    .unwrap();
    fs::write(&records_path, "unique_id,name\nA,Ann\nB,Bo\nE,Eve\n").unwrap();

    let config = ResolutionConfig::from_toml_str(&fs::read_to_string(&config_path).unwrap()).unwrap();
    let out = resolve(&example_matches(), &config).unwrap();
    assert_eq!(out.clusters.len(), 2);

    let enrichment = config.enrichment.unwrap();
    let store = Arc::new(InMemoryRecordStore::new());
    let file = BufReader::new(File::open(&records_path).unwrap());
    assert_eq!(store.load_csv(&enrichment.table, file).unwrap(), 3);
    let outcome = RecordEnricher::new(store, enrichment.table)
        .with_id_column(enrichment.id_column.unwrap())
        .enrich(&out.clusters);
    assert_eq!(outcome.records.len(), 3);

    entify::write_csv(&outcome.apply(&out.clusters), File::create(&export_path).unwrap()).unwrap();
    let written = fs::read_to_string(&export_path).unwrap();
    assert_eq!(written.lines().count(), 5);
    assert!(written.lines().skip(1).all(|l| l.ends_with(",2")));
}
