use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Serializes enrichment runs on the same entity within this process.
#[derive(Debug, Clone, Default)]
pub struct EntityLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`; released when the guard drops.
    pub async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on.
            map.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(map.entry(id).or_default())
        };
        entry.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_id_is_exclusive() {
        let locks = EntityLocks::new();
        let id = Uuid::now_v7();
        let guard = locks.lock(id).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_ids_do_not_block() {
        let locks = EntityLocks::new();
        let _a = locks.lock(Uuid::now_v7()).await;
        let _b = locks.lock(Uuid::now_v7()).await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = EntityLocks::new();
        drop(locks.lock(Uuid::now_v7()).await);
        let _held = locks.lock(Uuid::now_v7()).await;
        assert_eq!(locks.len(), 1);
    }
}
