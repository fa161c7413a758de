use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use timetrace_core::{generator::generate_run, log::Replay, Verbosity};

fn bench_dump(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_dump");
    for &functions in &[100u32, 2_000u32] {
        // Deterministic run, stable across invocations.
        let events = generate_run(functions, 4, 2024);
        let n = events.iter().filter(|e| e.timestamp().is_some()).count();
        group.throughput(Throughput::Elements(n as u64));

        // Correlate + render into a null sink.
        group.bench_function(BenchmarkId::new("correlate_and_render", functions), |b| {
            b.iter_batched(
                || {
                    let mut replay = Replay::new();
                    replay
                        .apply_all(events.iter().cloned().map(Ok))
                        .expect("generated runs are valid");
                    replay.finish()
                },
                |(session, names)| {
                    let stats = session
                        .dump(std::io::sink(), names, Verbosity::Full)
                        .expect("null sink never fails");
                    black_box(stats);
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dump);
criterion_main!(benches);
