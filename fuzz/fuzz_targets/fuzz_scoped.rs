#![no_main]

//! Fuzz target for scoped bindings
//!
//! Drives a keyed scope through random resolutions, invalidations and
//! closes, checking instance identity against a model of each session's
//! cache.

use arbitrary::Arbitrary;
use bindery::prelude::*;
use bindery::{BindingKey, KeyedScope, NotFoundReason};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct Session(u8);

#[allow(dead_code)]
#[derive(Debug)]
struct Cart {
    serial: u64,
}

/// Operations on the scope
#[derive(Debug, Arbitrary)]
enum ScopedOp {
    Resolve(u8),
    ResolveThroughChild(u8),
    ResolveWithoutContext,
    Invalidate(u8),
    Clear(u8),
    Close(u8),
}

fuzz_target!(|ops: Vec<ScopedOp>| {
    let serial = Arc::new(AtomicU64::new(0));
    let sessions = Arc::new(KeyedScope::new(|session: &Session| session.0 % 8));

    let counter = Arc::clone(&serial);
    let root = Container::builder()
        .bind::<Cart>()
        .scoped(Arc::clone(&sessions), move |_| {
            Ok(Cart {
                serial: counter.fetch_add(1, Ordering::SeqCst),
            })
        })
        .expect("valid declaration")
        .build();
    let child = root.child().build();

    let key = BindingKey::of::<Cart>();
    let mut model: HashMap<u8, Arc<Cart>> = HashMap::new();

    // Limit operations to prevent OOM
    for op in ops.into_iter().take(100) {
        match op {
            ScopedOp::Resolve(id) | ScopedOp::ResolveThroughChild(id) => {
                let container = match op {
                    ScopedOp::Resolve(_) => &root,
                    _ => &child,
                };
                let cart = container
                    .on(Session(id))
                    .get::<Cart>()
                    .expect("scoped resolution");
                match model.get(&(id % 8)) {
                    Some(cached) => assert!(Arc::ptr_eq(cached, &cart)),
                    None => {
                        model.insert(id % 8, cart);
                    }
                }
            }
            ScopedOp::ResolveWithoutContext => {
                let err = root.get::<Cart>().unwrap_err();
                assert!(matches!(
                    err,
                    DiError::NotFound {
                        reason: NotFoundReason::MissingContext { .. },
                        ..
                    }
                ));
            }
            ScopedOp::Invalidate(id) => {
                let had = model.remove(&(id % 8)).is_some();
                assert_eq!(sessions.invalidate(&(id % 8), &key), had);
            }
            ScopedOp::Clear(id) => {
                sessions.clear(&(id % 8));
                model.remove(&(id % 8));
            }
            ScopedOp::Close(id) => {
                sessions.close(&(id % 8));
                model.remove(&(id % 8));
                assert!(sessions.cache_if_open(&(id % 8)).is_none());
            }
        }
    }

    assert!(sessions.open_scopes() <= 8);
});
