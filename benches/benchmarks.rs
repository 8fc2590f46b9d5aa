use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use json_collections::{CollectionSchema, Record, RecordStore, RecordStoreHandle};
use serde_json::json;
use std::hint::black_box;
use std::time::Duration;

fn open_users(dir: &tempfile::TempDir) -> RecordStoreHandle {
    RecordStore::open([CollectionSchema::new(
        "users",
        "email",
        dir.path().join("users.json"),
    )])
    .unwrap()
}

fn user(i: usize) -> Record {
    json!({"email": format!("u{i}@x.com"), "name": format!("user {i}"), "age": i % 90})
        .as_object()
        .cloned()
        .unwrap()
}

fn fill(store: &RecordStore, size: usize) -> Vec<String> {
    (0..size)
        .map(|i| {
            let stored = store.upsert("users", user(i)).unwrap();
            stored["__id__"].as_str().unwrap().to_string()
        })
        .collect()
}

fn bench_upsert_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert_delete");
    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("users", size), &size, |b, &size| {
            let dir = tempfile::tempdir().unwrap();
            let store = open_users(&dir);
            b.iter(|| {
                let ids = fill(&store, size);
                for id in &ids {
                    black_box(store.delete_by_id("users", id).unwrap());
                }
            });
        });
    }
}

fn bench_find_by_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_by_id");
    for size in [100, 1000] {
        group.bench_with_input(BenchmarkId::new("users", size), &size, |b, &size| {
            let dir = tempfile::tempdir().unwrap();
            let store = open_users(&dir);
            let ids = fill(&store, size);
            let last = ids.last().unwrap();
            b.iter(|| black_box(store.find_by_id("users", last).unwrap()));
        });
    }
}

fn bench_batch_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_upsert");
    for size in [100, 1000] {
        group.bench_with_input(BenchmarkId::new("users", size), &size, |b, &size| {
            let dir = tempfile::tempdir().unwrap();
            let store = open_users(&dir);
            b.iter(|| {
                let batch: Vec<Record> = (0..size).map(user).collect();
                let stored = store.batch_upsert("users", batch).unwrap();
                for rec in stored.into_iter().flatten() {
                    store
                        .delete_by_id("users", rec["__id__"].as_str().unwrap())
                        .unwrap();
                }
            });
        });
    }
}

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(8));
    for size in [100, 1000, 10_000] {
        group.bench_with_input(BenchmarkId::new("users", size), &size, |b, &size| {
            let dir = tempfile::tempdir().unwrap();
            let store = open_users(&dir);
            fill(&store, size);
            b.iter(|| store.flush_collection("users").unwrap());
        });
    }
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_by_field");
    for size in [100, 1000] {
        group.bench_with_input(BenchmarkId::new("users", size), &size, |b, &size| {
            let dir = tempfile::tempdir().unwrap();
            let store = open_users(&dir);
            fill(&store, size);
            b.iter(|| black_box(store.filter_by_field("users", "age", &json!(42)).unwrap()));
        });
    }
}

criterion_group!(
    benches,
    bench_upsert_delete,
    bench_find_by_id,
    bench_batch_upsert,
    bench_flush,
    bench_filter,
);
criterion_main!(benches);
