//! Concurrent resolution while the configuration is being reloaded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use persona_arbiter::{
    Arbiter, ArbiterConfig, ArbiterRuntime, ResolutionRequest, ResolutionStrategy, RuntimeConfig,
};

fn config_with_gap(gap: u8) -> ArbiterConfig {
    let mut config = ArbiterConfig::default();
    config.thresholds.priority_gap = gap;
    config
}

#[test]
fn readers_always_see_a_whole_snapshot() {
    let arbiter = Arc::new(Arbiter::new(config_with_gap(3)).unwrap());
    let stop = Arc::new(AtomicBool::new(false));

    // With gap 3 the pair is priority-ordered; with gap 4 it falls through to
    // consensus. Anything else would mean a torn snapshot.
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let arbiter = Arc::clone(&arbiter);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let request = ResolutionRequest::new("deploy to production", ["security", "performance"])
                    .with_environment("production");
                let mut seen = 0u32;
                while !stop.load(Ordering::Relaxed) {
                    let res = arbiter.resolve(&request);
                    match res.strategy_used {
                        ResolutionStrategy::PriorityBased { gap: 3 } | ResolutionStrategy::WeightedConsensus { .. } => {}
                        other => panic!("unexpected strategy {other}"),
                    }
                    assert_eq!(res.ordered_roles[0].as_str(), "security");
                    seen += 1;
                }
                seen
            })
        })
        .collect();

    for i in 0..50 {
        let gap = if i % 2 == 0 { 4 } else { 3 };
        arbiter.reload(config_with_gap(gap)).unwrap();
        thread::sleep(Duration::from_millis(1));
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
}

#[test]
fn runtime_picks_up_reloads() {
    let arbiter = Arc::new(Arbiter::new(config_with_gap(3)).unwrap());
    let runtime = ArbiterRuntime::start(
        Arc::clone(&arbiter),
        RuntimeConfig {
            workers: 2,
            queue_capacity: 32,
        },
    )
    .unwrap();

    let request = ResolutionRequest::new("deploy to production", ["security", "performance"])
        .with_environment("production");

    let before = runtime.resolve(request.clone()).unwrap();
    assert_eq!(before.strategy_used, ResolutionStrategy::PriorityBased { gap: 3 });

    runtime.arbiter().reload(config_with_gap(4)).unwrap();
    let after = runtime.resolve(request).unwrap();
    assert!(matches!(after.strategy_used, ResolutionStrategy::WeightedConsensus { .. }));
}
