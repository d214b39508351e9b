use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::Id;

/// A resource whose committed schedule or head count an admission reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Course(Id),
    Teacher(Id),
    Student(Id),
}

/// Per-resource mutual exclusion for read-check-write admissions.
///
/// An admission holds the locks of every resource it reads from until its write has
/// landed, so two requests touching the same course, teacher or student run one
/// after the other. Requests on disjoint resources don't wait on each other.
#[derive(Default)]
pub struct AdmissionLocks {
    slots: DashMap<LockKey, Arc<Mutex<()>>>,
}

/// Held locks; released on drop. A slot nobody else is waiting on leaves the table
/// with its last holder.
pub struct AdmissionGuard<'a> {
    locks: &'a AdmissionLocks,
    held: Vec<(LockKey, OwnedMutexGuard<()>)>,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        for (key, guard) in self.held.drain(..) {
            drop(guard);
            // The table's own handle is the only one left once no holder or waiter remains.
            self.locks
                .slots
                .remove_if(&key, |_, slot| Arc::strong_count(slot) == 1);
        }
    }
}

impl AdmissionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every key. Keys are taken in sorted order to prevent deadlocks.
    pub async fn acquire(&self, keys: &[LockKey]) -> AdmissionGuard<'_> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut held = Vec::with_capacity(keys.len());
        for key in keys {
            let slot = self.slots.entry(key).or_default().value().clone();
            held.push((key, slot.lock_owned().await));
        }
        AdmissionGuard { locks: self, held }
    }

    /// Number of resources currently held or waited on.
    pub fn tracked(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(AdmissionLocks::new());
        let guard = locks.acquire(&[LockKey::Course(1)]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(&[LockKey::Course(1), LockKey::Student(3)]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should get the lock once it's released")
            .unwrap();
    }

    #[tokio::test]
    async fn disjoint_keys_do_not_block() {
        let locks = AdmissionLocks::new();
        let _a = locks.acquire(&[LockKey::Course(1), LockKey::Teacher(7)]).await;
        let b = tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire(&[LockKey::Course(2), LockKey::Teacher(8)]),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn opposite_orders_do_not_deadlock() {
        let locks = Arc::new(AdmissionLocks::new());
        let mut tasks = Vec::new();
        for i in 0..50 {
            let locks = locks.clone();
            tasks.push(tokio::spawn(async move {
                let keys = if i % 2 == 0 {
                    [LockKey::Student(3), LockKey::Course(1)]
                } else {
                    [LockKey::Course(1), LockKey::Student(3)]
                };
                let _g = locks.acquire(&keys).await;
                tokio::task::yield_now().await;
            }));
        }
        for t in tasks {
            tokio::time::timeout(Duration::from_secs(5), t).await.unwrap().unwrap();
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn released_slots_leave_the_table() {
        let locks = Arc::new(AdmissionLocks::new());
        let guard = locks.acquire(&[LockKey::Course(1), LockKey::Teacher(7)]).await;
        assert_eq!(locks.tracked(), 2);

        // A waiter keeps its slot alive past the first release.
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(&[LockKey::Course(1)]).await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert!(locks.tracked() <= 1);

        waiter.await.unwrap();
        assert_eq!(locks.tracked(), 0);

        for id in 0..100 {
            drop(locks.acquire(&[LockKey::Student(id)]).await);
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn duplicate_keys_are_taken_once() {
        let locks = AdmissionLocks::new();
        let acquired = tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire(&[LockKey::Teacher(7), LockKey::Teacher(7)]),
        )
        .await;
        assert!(acquired.is_ok());
    }
}
