//! Per-node reader/writer lock driven by explicit acquire and release calls.
//!
//! Lock and unlock arrive as separate remote calls, so the usual scoped
//! guard types cannot express the protocol; the lock instead keeps explicit
//! reader and writer counts and callers release exactly what they acquired.

use tokio::sync::{Mutex, Notify};

use crate::error::{DfsError, DfsResult};

/// Mode requested when locking a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many holders, read-only view of the node.
    Shared,
    /// Single holder, the node may be mutated.
    Exclusive,
}

#[derive(Default)]
struct LockState {
    readers: usize,
    writer: bool,
    writers_waiting: usize,
}

/// Reader/writer lock on one tree node.
///
/// Waiting writers block new readers, so a stream of shared acquisitions
/// cannot starve an exclusive one.
#[derive(Default)]
pub struct NodeLock {
    state: Mutex<LockState>,
    changed: Notify,
}

impl NodeLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock is held in `mode`.
    pub async fn acquire(&self, mode: LockMode) {
        if mode == LockMode::Exclusive {
            self.state.lock().await.writers_waiting += 1;
        }
        loop {
            // The future must exist before the state check, otherwise a
            // release between check and await is lost.
            let notified = self.changed.notified();
            {
                let mut state = self.state.lock().await;
                match mode {
                    LockMode::Shared => {
                        if !state.writer && state.writers_waiting == 0 {
                            state.readers += 1;
                            return;
                        }
                    }
                    LockMode::Exclusive => {
                        if !state.writer && state.readers == 0 {
                            state.writer = true;
                            state.writers_waiting -= 1;
                            return;
                        }
                    }
                }
            }
            notified.await;
        }
    }

    /// Releases one holder in `mode`. Fails if the lock is not held that way.
    pub async fn release(&self, mode: LockMode) -> DfsResult<()> {
        {
            let mut state = self.state.lock().await;
            match mode {
                LockMode::Shared => {
                    if state.readers == 0 {
                        return Err(DfsError::invalid("node is not locked for shared access"));
                    }
                    state.readers -= 1;
                }
                LockMode::Exclusive => {
                    if !state.writer {
                        return Err(DfsError::invalid("node is not locked for exclusive access"));
                    }
                    state.writer = false;
                }
            }
        }
        self.changed.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn readers_coexist() {
        let lock = NodeLock::new();
        lock.acquire(LockMode::Shared).await;
        lock.acquire(LockMode::Shared).await;
        lock.release(LockMode::Shared).await.unwrap();
        lock.release(LockMode::Shared).await.unwrap();
    }

    #[tokio::test]
    async fn release_without_acquire_fails() {
        let lock = NodeLock::new();
        assert!(lock.release(LockMode::Shared).await.is_err());
        assert!(lock.release(LockMode::Exclusive).await.is_err());

        lock.acquire(LockMode::Shared).await;
        assert!(lock.release(LockMode::Exclusive).await.is_err());
        lock.release(LockMode::Shared).await.unwrap();
    }

    #[tokio::test]
    async fn writer_excludes_everyone() {
        let lock = Arc::new(NodeLock::new());
        let holders = Arc::new(AtomicUsize::new(0));

        lock.acquire(LockMode::Exclusive).await;

        let mut tasks = Vec::new();
        for i in 0..8 {
            let lock = lock.clone();
            let holders = holders.clone();
            let mode = if i % 2 == 0 { LockMode::Shared } else { LockMode::Exclusive };
            tasks.push(tokio::spawn(async move {
                lock.acquire(mode).await;
                holders.fetch_add(1, Ordering::SeqCst);
                lock.release(mode).await.unwrap();
            }));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(holders.load(Ordering::SeqCst), 0);

        lock.release(LockMode::Exclusive).await.unwrap();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(holders.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn waiting_writer_blocks_new_readers() {
        let lock = Arc::new(NodeLock::new());
        lock.acquire(LockMode::Shared).await;

        let writer = {
            let lock = lock.clone();
            tokio::spawn(async move {
                lock.acquire(LockMode::Exclusive).await;
                lock.release(LockMode::Exclusive).await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let reader = {
            let lock = lock.clone();
            tokio::spawn(async move {
                lock.acquire(LockMode::Shared).await;
                lock.release(LockMode::Shared).await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader.is_finished());

        lock.release(LockMode::Shared).await.unwrap();
        writer.await.unwrap();
        reader.await.unwrap();
    }
}
