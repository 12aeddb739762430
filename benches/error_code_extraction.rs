//! Throughput of the error-code extractor (spec §4.2.5) over realistic
//! page text, across a range of page counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use krai_benches::benchmark_helpers::{benchmark_page_text, benchmark_pattern_registry};
use krai_core::extract::error_code::ErrorCodeExtractor;

fn benchmark_extract(c: &mut Criterion) {
    let registry = benchmark_pattern_registry();
    let extractor = ErrorCodeExtractor::new(&registry);

    let mut group = c.benchmark_group("error_code_extraction");
    for &page_count in &[1usize, 10, 50] {
        let pages: Vec<(u32, String)> = (0..page_count)
            .map(|i| (i as u32 + 1, benchmark_page_text(5)))
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(page_count),
            &pages,
            |b, pages| {
                b.iter(|| {
                    let (outcome, metrics) =
                        extractor.extract(black_box(pages), Some("acme")).unwrap();
                    black_box((outcome, metrics));
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_extract);
criterion_main!(benches);
