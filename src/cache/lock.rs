use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock a cache mutex, recovering the guard if a previous holder panicked.
///
/// Cache state is only ever replaced wholesale, so a poisoned guard holds
/// either the old or the new value and is safe to keep using.
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, target: &'static str) -> MutexGuard<'a, T> {
  match mutex.lock() {
    Ok(guard) => guard,
    Err(poisoned) => {
      warn!(
        target_cache = target,
        result = "poisoned_recovered",
        "Recovered from poisoned cache lock"
      );
      poisoned.into_inner()
    }
  }
}
