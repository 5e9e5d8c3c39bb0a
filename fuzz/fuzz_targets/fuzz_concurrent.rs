#![no_main]

//! Fuzz target for concurrent resolution
//!
//! Many threads resolve the same singleton while others invalidate it. Each
//! creation must be accounted for by the initial one or an invalidation call.
//! An invalidation racing an in-flight creation reports nothing removed, so
//! calls are counted rather than successful removals.

use arbitrary::Arbitrary;
use bindery::prelude::*;
use bindery::BindingKey;
use libfuzzer_sys::fuzz_target;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Barrier;
use std::thread;

#[allow(dead_code)]
#[derive(Debug, Arbitrary)]
struct SharedConfig {
    value: u32,
}

#[allow(dead_code)]
struct Service {
    serial: u64,
    config: Arc<SharedConfig>,
}

/// Thread operation
#[derive(Debug, Clone, Arbitrary)]
enum ThreadOp {
    Get,
    GetThroughProvider,
    GetThroughChild,
    TryGetMissing,
    Contains,
    Invalidate,
}

/// Concurrent test scenario
#[derive(Debug, Arbitrary)]
struct ConcurrentScenario {
    config: SharedConfig,
    // Number of threads (clamped to 1-8)
    thread_count: u8,
    ops_per_thread: Vec<ThreadOp>,
}

fuzz_target!(|scenario: ConcurrentScenario| {
    let created = Arc::new(AtomicU64::new(0));
    let invalidated = Arc::new(AtomicU64::new(0));

    let counter = Arc::clone(&created);
    let container = Container::builder()
        .bind::<SharedConfig>()
        .instance(scenario.config)
        .and_then(|b| {
            b.bind::<Service>().singleton(move |r| {
                Ok(Service {
                    serial: counter.fetch_add(1, Ordering::SeqCst),
                    config: r.get()?,
                })
            })
        })
        .expect("valid declarations")
        .build();

    let thread_count = (scenario.thread_count % 8).max(1) as usize;
    let ops = scenario.ops_per_thread;
    let barrier = Arc::new(Barrier::new(thread_count));

    let handles: Vec<_> = (0..thread_count)
        .map(|_| {
            let container = container.clone();
            let invalidated = Arc::clone(&invalidated);
            let barrier = Arc::clone(&barrier);
            let ops = ops.clone();

            thread::spawn(move || {
                barrier.wait();
                for op in ops.into_iter().take(50) {
                    match op {
                        ThreadOp::Get => {
                            container.get::<Service>().expect("service resolves");
                        }
                        ThreadOp::GetThroughProvider => {
                            let provider = container.provider::<Service>().expect("bound");
                            provider.get().expect("service resolves");
                        }
                        ThreadOp::GetThroughChild => {
                            container.child().build().get::<Service>().expect("inherited");
                        }
                        ThreadOp::TryGetMissing => {
                            assert!(container.try_get::<u64>().expect("no failure").is_none());
                        }
                        ThreadOp::Contains => {
                            assert!(container.contains::<Service>());
                        }
                        ThreadOp::Invalidate => {
                            invalidated.fetch_add(1, Ordering::SeqCst);
                            container.singletons().invalidate(&BindingKey::of::<Service>());
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("no thread panicked");
    }

    let created = created.load(Ordering::SeqCst);
    let invalidated = invalidated.load(Ordering::SeqCst);
    assert!(created <= invalidated + 1, "{created} creations for {invalidated} invalidations");

    // The container is still usable and caches again
    let a = container.get::<Service>().expect("service resolves");
    let b = container.get::<Service>().expect("service resolves");
    assert!(Arc::ptr_eq(&a, &b));
});
