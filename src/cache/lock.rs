use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock the cache arena, carrying on if a previous holder panicked.
///
/// Every arena mutation finishes relinking before it can panic, so the state
/// behind a poisoned lock is still consistent. The poison flag is cleared so
/// the warning fires once per incident.
pub(crate) fn lock_arena<'a, T>(lock: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!(
            target = "pokedex::cache",
            op, "cache lock was poisoned; continuing with recovered state"
        );
        lock.clear_poison();
        poisoned.into_inner()
    })
}
