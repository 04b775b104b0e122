use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use csv::StringRecord;
use nppes_states::prelude::*;

// Synthetic chunk with filled taxonomy and identifier families
fn build_chunk(rows: usize) -> (ChunkTransformer, Vec<StringRecord>) {
    let headers = InputSchema::required_columns();
    let schema = InputSchema::resolve(&headers, None).expect("full header resolves");
    let states = ["CA", "NY", "TX", "FL", "ZZ", "WA"];

    let chunk = (0..rows)
        .map(|i| {
            let mut fields = vec![String::new(); headers.len()];
            fields[schema.selected[0]] = format!("{:010}", 1_000_000_000 + i);
            fields[schema.practice_state] = states[i % states.len()].to_string();
            for (n, &col) in schema.families[0].iter().take(3).enumerate() {
                fields[col] = format!("20{}Q00000X", n);
            }
            for &col in schema.families[3].iter().take(i % 8) {
                fields[col] = "MEDICAID-123".to_string();
            }
            StringRecord::from(fields)
        })
        .collect();

    (ChunkTransformer::new(schema), chunk)
}

fn benchmark_transform_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_chunk");
    for rows in [1_000, 10_000] {
        let (transformer, chunk) = build_chunk(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &chunk, |b, chunk| {
            b.iter(|| transformer.transform_chunk(black_box(chunk)))
        });
    }
    group.finish();
}

fn benchmark_accumulate(c: &mut Criterion) {
    let (transformer, chunk) = build_chunk(10_000);
    c.bench_function("accumulate_10k", |b| {
        b.iter(|| {
            let mut acc = StateAccumulator::new();
            acc.merge(transformer.transform_chunk(black_box(&chunk)));
            acc.routed()
        })
    });
}

fn benchmark_postal_normalization(c: &mut Criterion) {
    let inputs = ["90210", "902101234", "90210-1234", "9021", "nan", "ABCDE-FGHI"];
    c.bench_function("normalize_postal_code", |b| {
        b.iter(|| {
            for raw in inputs {
                black_box(normalize_postal_code(black_box(raw)));
            }
        })
    });
}

criterion_group!(
    benches,
    benchmark_transform_chunk,
    benchmark_accumulate,
    benchmark_postal_normalization
);
criterion_main!(benches);
