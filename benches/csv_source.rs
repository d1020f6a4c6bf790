use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cadence::generate::{generate, DatasetParams};
use cadence::source::CsvSource;

fn bench_parse_full_day(c: &mut Criterion) {
    let rows = generate(&DatasetParams::default()).unwrap();
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in &rows {
        writer.serialize(row).unwrap();
    }
    let data = writer.into_inner().unwrap();
    let source = CsvSource::new("simple_day.csv");

    c.bench_function("parse_full_day", |b| {
        b.iter(|| source.parse(black_box(&data)).unwrap());
    });
}

fn bench_generate_full_day(c: &mut Criterion) {
    let params = DatasetParams::default();
    c.bench_function("generate_full_day", |b| {
        b.iter(|| generate(black_box(&params)).unwrap());
    });
}

criterion_group!(benches, bench_parse_full_day, bench_generate_full_day);
criterion_main!(benches);
