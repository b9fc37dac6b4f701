//! In-memory conversation context, one bounded list per (community, channel).
//!
//! Nothing here survives a restart. The lock is only ever held for the
//! duration of a single synchronous map operation.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use kudachat_core::Message;

/// Identifies one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey {
    pub community: String,
    pub channel: String,
}

impl ContextKey {
    pub fn new(community: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            community: community.into(),
            channel: channel.into(),
        }
    }
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.community, self.channel)
    }
}

/// Recent history per conversation. The cache never trims on its own.
#[derive(Debug, Default)]
pub struct ContextCache {
    lists: RwLock<HashMap<ContextKey, Vec<Message>>>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, creating the list if needed.
    pub fn push(&self, key: &ContextKey, entry: Message) {
        self.write().entry(key.clone()).or_default().push(entry);
    }

    /// Keep only the last `limit` entries of a list.
    pub fn trim(&self, key: &ContextKey, limit: usize) {
        if let Some(list) = self.write().get_mut(key) {
            if list.len() > limit {
                let excess = list.len() - limit;
                list.drain(..excess);
            }
        }
    }

    /// A copy of the list, empty if the key was never seen.
    pub fn get(&self, key: &ContextKey) -> Vec<Message> {
        self.read().get(key).cloned().unwrap_or_default()
    }

    pub fn clear(&self, key: &ContextKey) {
        self.write().remove(key);
    }

    pub fn len(&self, key: &ContextKey) -> usize {
        self.read().get(key).map_or(0, Vec::len)
    }

    pub fn contains(&self, key: &ContextKey) -> bool {
        self.read().contains_key(key)
    }

    // A panic while holding the lock cannot leave a list half-updated, so a
    // poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ContextKey, Vec<Message>>> {
        self.lists.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ContextKey, Vec<Message>>> {
        self.lists.write().unwrap_or_else(|e| e.into_inner())
    }
}
