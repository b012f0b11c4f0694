//! Benchmarks for the hot decode paths.

use conveyor::records::{AdapterType, RelayMessage};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn relay_benchmark(c: &mut Criterion) {
    let job_body = r#"{"id":"job-1","job_name":"daily-report","job_type":"shell","priority":2,"status":"integrated"}"#;
    c.bench_function("decode_job", |b| {
        b.iter(|| RelayMessage::decode(black_box("integration"), black_box(job_body)))
    });

    c.bench_function("classify_cron", |b| {
        b.iter(|| AdapterType::from_cron(black_box("0 */5 * * * *")))
    });
}

criterion_group!(benches, relay_benchmark);
criterion_main!(benches);
