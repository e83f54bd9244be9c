use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use refsample::{ReferenceSample, XYDataset};
use tempfile::tempdir;

const N_OBJECTS: i64 = 2_000;
const SED_POINTS: usize = 200;
const PDZ_BINS: usize = 100;
/// Small enough to rotate a few times per run.
const MAX_FILE_SIZE: u64 = 512 * 1024;

fn sed(id: i64) -> XYDataset {
    (0..SED_POINTS)
        .map(|i| (1000.0 + i as f64 * 5.0, (id as f64 + i as f64).sin().abs()))
        .collect()
}

fn pdz(id: i64) -> XYDataset {
    (0..PDZ_BINS)
        .map(|i| (i as f64 * 0.06, ((id + i as i64) % 7) as f64 / 7.0))
        .collect()
}

fn build_store(dir: &std::path::Path) -> ReferenceSample {
    let mut rs = ReferenceSample::create(dir.join("rs"), MAX_FILE_SIZE).unwrap();
    for id in 0..N_OBJECTS {
        rs.create_object(id).unwrap();
        rs.add_sed_data(id, &sed(id)).unwrap();
        rs.add_pdz_data(id, &pdz(id)).unwrap();
    }
    rs
}

fn write_benchmark(c: &mut Criterion) {
    c.bench_function("refsample_load_2k", |b| {
        b.iter_batched(
            || {
                let data: Vec<_> = (0..N_OBJECTS).map(|id| (id, sed(id), pdz(id))).collect();
                (tempdir().unwrap(), data)
            },
            |(dir, data)| {
                let mut rs = ReferenceSample::create(dir.path().join("rs"), MAX_FILE_SIZE).unwrap();
                for (id, s, p) in &data {
                    rs.create_object(*id).unwrap();
                    rs.add_sed_data(*id, s).unwrap();
                    rs.add_pdz_data(*id, p).unwrap();
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn read_benchmark(c: &mut Criterion) {
    c.bench_function("refsample_read_all_2k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let rs = build_store(dir.path());
                (dir, rs)
            },
            |(_dir, rs)| {
                for id in rs.ids() {
                    assert!(rs.get_sed_data(id).unwrap().is_some());
                    assert!(rs.get_pdz_data(id).unwrap().is_some());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn optimize_benchmark(c: &mut Criterion) {
    c.bench_function("refsample_optimize_2k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let rs = build_store(dir.path());
                (dir, rs)
            },
            |(_dir, mut rs)| {
                rs.optimize().unwrap();
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, write_benchmark, read_benchmark, optimize_benchmark);
criterion_main!(benches);
