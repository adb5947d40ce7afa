//! Realm manager benchmarks.
//!
//! Run with: `cargo bench --bench realm_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use thicket_editor::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A realm holding one chain-shaped family of `depth` entities plus `width`
/// children under its root. Returns the manager and the root id.
fn build_family(depth: usize, width: usize) -> (EditorRealmManager<'static>, SimpleGuid) {
    let mut realm = EditorRealmManager::new(ByteMirror::global(), EditorConfig::default());
    realm.new_realm();
    let root = realm.create_entity("Root").expect("create root");
    let mut parent = root;
    for i in 0..depth {
        let id = realm.create_entity(&format!("Link {i}")).expect("create link");
        realm.reparent_entity(id, parent).expect("reparent link");
        parent = id;
    }
    for i in 0..width {
        let id = realm.create_entity(&format!("Leaf {i}")).expect("create leaf");
        realm.reparent_entity(id, root).expect("reparent leaf");
    }
    (realm, root)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_duplicate_family(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplicate_family");
    for &size in &[10usize, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (realm, root) = build_family(size / 2, size / 2);
            b.iter_batched(
                || {
                    let mut copy = EditorRealmManager::new(ByteMirror::global(), EditorConfig::default());
                    copy.load_realm_from_str(&write_realm(realm.get_realm(), realm.settings(), false).expect("write"))
                        .expect("load");
                    copy
                },
                |mut copy| black_box(copy.duplicate_entity_with_children(root).expect("duplicate")),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    for &size in &[100usize, 1000] {
        let (realm, _) = build_family(size / 2, size / 2);
        group.bench_with_input(BenchmarkId::new("capture", size), realm.get_realm(), |b, entities| {
            b.iter(|| black_box(RealmSnapshot::capture(entities)));
        });
        group.bench_with_input(BenchmarkId::new("is_dirty", size), &realm, |b, realm| {
            b.iter(|| black_box(realm.is_dirty()));
        });
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let (realm, _) = build_family(200, 300);
    let text = write_realm(realm.get_realm(), realm.settings(), false).expect("write");
    c.bench_function("load_realm_500", |b| {
        b.iter(|| black_box(load_realm_from_str(&text).expect("load")));
    });
}

criterion_group!(benches, bench_duplicate_family, bench_snapshot, bench_load);
criterion_main!(benches);
