//! Per-dialog exclusive locks
//!
//! Every operation that touches a subscription record, its body cache or its
//! registry slot holds the owning dialog's lock. Distinct dialogs never
//! contend. The guard is released when dropped, on every exit path.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::types::DialogId;

/// Guard proving the owning dialog is locked
pub type DialogGuard = OwnedMutexGuard<()>;

/// Table of dialog locks keyed by dialog ID
#[derive(Debug, Clone, Default)]
pub struct DialogLocks {
    locks: Arc<DashMap<DialogId, Arc<Mutex<()>>>>,
}

impl DialogLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `dialog`
    pub async fn lock(&self, dialog: DialogId) -> DialogGuard {
        let mutex = self
            .locks
            .entry(dialog)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        trace!("Locking dialog {}", dialog);
        mutex.lock_owned().await
    }

    /// Whether `dialog` is locked right now
    pub fn is_locked(&self, dialog: DialogId) -> bool {
        self.locks
            .get(&dialog)
            .map_or(false, |m| m.try_lock().is_err())
    }

    /// Forget the lock of a dialog whose last subscription ended
    pub fn remove(&self, dialog: DialogId) {
        self.locks.remove(&dialog);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_dialog_serializes() {
        let locks = DialogLocks::new();
        let dialog = DialogId::new();
        let guard = locks.lock(dialog).await;
        assert!(locks.is_locked(dialog));

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(dialog).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert!(!locks.is_locked(dialog));
    }

    #[tokio::test]
    async fn test_different_dialogs_do_not_contend() {
        let locks = DialogLocks::new();
        let _a = locks.lock(DialogId::new()).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(DialogId::new())).await;
        assert!(b.is_ok());
    }
}
