//! Bounded cache of recently dispatched notifications.

use std::collections::{HashSet, VecDeque};

use super::{Notification, NotificationType};

/// Notifications are duplicates when type, record and second all match.
pub type DedupKey = (NotificationType, String, i64);

pub fn dedup_key(notification: &Notification) -> DedupKey {
    (
        notification.kind,
        notification.data.record_id.clone(),
        notification.timestamp.timestamp(),
    )
}

/// Insertion-ordered set that evicts its oldest key when full.
#[derive(Debug)]
pub struct DedupCache {
    capacity: usize,
    order: VecDeque<DedupKey>,
    seen: HashSet<DedupKey>,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Record `key`. Returns false if it was already present.
    pub fn insert(&mut self, key: DedupKey) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.seen.insert(key);
        true
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.order.len()
    }
}
