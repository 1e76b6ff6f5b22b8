use criterion::{criterion_group, criterion_main, Criterion};

use constdb::{Cdb, CdbWriter};

const LONG_KEY: &[u8] = b"this key is long enough to need several comparison chunks";

fn build_db(path: &std::path::Path, records: u32) {
    let mut w = CdbWriter::create(path).unwrap();
    for i in 0..records {
        let key = format!("key-{i:06}");
        let data = format!("value number {i}, padded out to a realistic size");
        w.add(key.as_bytes(), data.as_bytes()).unwrap();
    }
    w.add(LONG_KEY, b"found me").unwrap();
    w.finish().unwrap();
}

fn reader_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.cdb");
    build_db(&path, 10_000);

    c.bench_function("Cdb::open", |b| b.iter(|| Cdb::open(&path).unwrap()));
    c.bench_function("Cdb::get hit", |b| {
        let cdb = Cdb::open(&path).unwrap();
        b.iter(|| cdb.get(b"key-005000").unwrap().unwrap())
    });
    c.bench_function("Cdb::get miss", |b| {
        let cdb = Cdb::open(&path).unwrap();
        b.iter(|| cdb.get(b"no such key").unwrap())
    });
    c.bench_function("Cdb::get long key", |b| {
        let cdb = Cdb::open(&path).unwrap();
        b.iter(|| cdb.get(LONG_KEY).unwrap().unwrap())
    });
    c.bench_function("Cdb::find locations", |b| {
        let cdb = Cdb::open(&path).unwrap();
        b.iter(|| cdb.find(b"key-000123").next_location().unwrap())
    });
    c.bench_function("Cdb::iter full pass", |b| {
        let cdb = Cdb::open(&path).unwrap();
        b.iter(|| cdb.iter().map(|r| r.unwrap()).count())
    });
    c.bench_function("Cdb::keys full pass", |b| {
        let cdb = Cdb::open(&path).unwrap();
        b.iter(|| cdb.keys().map(|k| k.unwrap()).count())
    });
}

fn writer_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    c.bench_function("CdbWriter 1k records", |b| {
        let path = dir.path().join("write.cdb");
        b.iter(|| build_db(&path, 1_000))
    });
}

criterion_group!(benches, reader_benchmark, writer_benchmark);
criterion_main!(benches);
