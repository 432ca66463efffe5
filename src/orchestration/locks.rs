use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per benchmark name, so writes to a benchmark are serialized while
/// different benchmarks proceed in parallel.
#[derive(Debug, Default)]
pub struct BenchmarkLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BenchmarkLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`. Released when the guard is dropped.
    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
