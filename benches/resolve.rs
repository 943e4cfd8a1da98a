use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use persona_arbiter::{Arbiter, ArbiterRuntime, ResolutionRequest, RuntimeConfig};

fn bench_strategies(c: &mut Criterion) {
    let arbiter = Arbiter::with_defaults().unwrap();
    let cases = [
        (
            "priority_based",
            ResolutionRequest::new("deploy to production", ["security", "performance"]).with_environment("production"),
        ),
        ("negotiation", ResolutionRequest::new("design rest-api", ["frontend", "backend"])),
        (
            "weighted_consensus",
            ResolutionRequest::new(
                "review the payment module architecture",
                ["architect", "security", "performance", "qa"],
            ),
        ),
        (
            "sequential_access",
            ResolutionRequest::new("tighten token checks", ["backend", "security"]).with_resource("src/api/auth/token.rs"),
        ),
        ("veto", ResolutionRequest::new("rm -rf /", ["security"])),
    ];

    let mut group = c.benchmark_group("resolve");
    group.throughput(Throughput::Elements(1));
    for (name, request) in &cases {
        group.bench_function(*name, |b| b.iter(|| arbiter.resolve(request)));
    }
    group.finish();
}

fn bench_runtime(c: &mut Criterion) {
    let arbiter = Arc::new(Arbiter::with_defaults().unwrap());
    let runtime = ArbiterRuntime::start(
        arbiter,
        RuntimeConfig {
            workers: 4,
            queue_capacity: 1024,
        },
    )
    .unwrap();
    let request = ResolutionRequest::new(
        "review the payment module architecture",
        ["architect", "security", "performance", "qa"],
    );

    let mut group = c.benchmark_group("runtime");
    group.throughput(Throughput::Elements(64));
    group.bench_function("batch_64", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..64).map(|_| runtime.submit(request.clone()).unwrap()).collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });
    group.finish();
}

fn bench_reload(c: &mut Criterion) {
    let arbiter = Arbiter::with_defaults().unwrap();
    let config = arbiter.snapshot().config().clone();
    c.bench_function("snapshot/reload", |b| b.iter(|| arbiter.reload(config.clone()).unwrap()));
}

criterion_group!(benches, bench_strategies, bench_runtime, bench_reload);
criterion_main!(benches);
