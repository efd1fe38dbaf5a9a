// ABOUTME: Per-term async locks serializing votes on the same term
// ABOUTME: Entries are weak so the registry only holds terms with a vote in flight

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held while a vote on one term is being recorded and evaluated
pub struct TermGuard {
    _guard: OwnedMutexGuard<()>,
}

#[derive(Default)]
pub struct TermLocks {
    inner: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl TermLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `term_id`. Different terms never contend.
    pub async fn lock(&self, term_id: &str) -> TermGuard {
        let mutex = {
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            map.retain(|_, entry| entry.strong_count() > 0);

            match map.get(term_id).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let created = Arc::new(AsyncMutex::new(()));
                    map.insert(term_id.to_string(), Arc::downgrade(&created));
                    created
                }
            }
        };

        TermGuard {
            _guard: mutex.lock_owned().await,
        }
    }

    /// Number of terms with a live lock
    pub fn active(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }
}
