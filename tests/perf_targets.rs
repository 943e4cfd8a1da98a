use std::time::{Duration, Instant};

use persona_arbiter::{Arbiter, ResolutionRequest};

fn p99(durations: &mut [Duration]) -> Duration {
    durations.sort_unstable();
    if durations.is_empty() {
        return Duration::from_nanos(0);
    }
    let idx = ((durations.len() as f64) * 0.99).ceil() as usize;
    let idx = idx.saturating_sub(1).min(durations.len() - 1);
    durations[idx]
}

fn requests() -> Vec<ResolutionRequest> {
    vec![
        ResolutionRequest::new("deploy to production", ["security", "performance"]).with_environment("production"),
        ResolutionRequest::new("design rest-api", ["frontend", "backend"]),
        ResolutionRequest::new(
            "review the payment module architecture",
            ["architect", "security", "performance", "qa"],
        ),
        ResolutionRequest::new("tighten token checks", ["backend", "security"]).with_resource("src/api/auth/token.rs"),
        ResolutionRequest::new("rm -rf /", ["security"]).with_flag("skipValidation", true),
    ]
}

/// The p99 resolution time must fit the default 100ms budget. Single samples
/// may spike on a loaded machine; only the percentile is asserted.
#[test]
fn resolutions_stay_within_latency_budget() {
    let arbiter = Arbiter::with_defaults().unwrap();
    let budget = Duration::from_micros(arbiter.snapshot().config().latency_budget_micros);

    let mut samples = Vec::new();
    for request in requests() {
        for _ in 0..50 {
            let started = Instant::now();
            let _ = arbiter.resolve(&request);
            samples.push(started.elapsed());
        }
    }

    let p99 = p99(&mut samples);
    assert!(p99 < budget, "p99 {p99:?} exceeds budget {budget:?}");
}

/// Throughput report, only meaningful in release builds.
///
/// Run manually:
/// - `cargo test --release --test perf_targets -- --ignored --nocapture`
#[test]
#[ignore]
fn resolution_throughput_report() {
    assert!(!cfg!(debug_assertions), "throughput must be measured in --release");

    let arbiter = Arbiter::with_defaults().unwrap();
    let requests = requests();
    let iterations = 20_000;

    let started = Instant::now();
    for i in 0..iterations {
        let _ = arbiter.resolve(&requests[i % requests.len()]);
    }
    let elapsed = started.elapsed();
    let per_sec = (iterations as f64) / elapsed.as_secs_f64();
    println!("resolutions/sec: {per_sec:.0} ({iterations} in {elapsed:?})");
}
