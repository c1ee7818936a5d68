//! In-process conversation store
//!
//! Mirrors the Redis semantics the engine relies on (TTL on strings, LTRIM
//! index rules, set membership). Expiry is measured on tokio's clock so
//! paused-time tests see keys expire deterministically.

use super::{ConversationStore, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(Vec<String>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the live entry map after dropping expired keys
    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> T) -> T {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        entries.retain(|_, e| !e.is_expired(now));
        f(&mut entries)
    }
}

/// Resolve Redis-style inclusive `[start, stop]` into a half-open range
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize + 1))
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_entries(|entries| match entries.get(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.with_entries(|entries| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Str(value.to_string()),
                    expires_at: ttl.map(|t| Instant::now() + t),
                },
            );
        });
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.with_entries(|entries| {
            entries.remove(key);
        });
        Ok(())
    }

    async fn list_append(&self, key: &str, value: &str) -> StoreResult<()> {
        self.with_entries(|entries| {
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::live(Value::List(Vec::new())));
            match &mut entry.value {
                Value::List(list) => {
                    list.push(value.to_string());
                    Ok(())
                }
                _ => Err(StoreError::WrongType(key.to_string())),
            }
        })
    }

    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> StoreResult<()> {
        self.with_entries(|entries| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(());
            };
            let Value::List(list) = &mut entry.value else {
                return Err(StoreError::WrongType(key.to_string()));
            };
            match resolve_range(list.len(), start, stop) {
                Some((from, to)) => {
                    list.truncate(to);
                    list.drain(..from);
                }
                None => list.clear(),
            }
            if list.is_empty() {
                entries.remove(key);
            }
            Ok(())
        })
    }

    async fn list_range(&self, key: &str) -> StoreResult<Vec<String>> {
        self.with_entries(|entries| match entries.get(key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(list.clone()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        })
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        self.with_entries(|entries| match entries.get(key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        })
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.with_entries(|entries| {
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::live(Value::Set(BTreeSet::new())));
            match &mut entry.value {
                Value::Set(set) => Ok(set.insert(member.to_string())),
                _ => Err(StoreError::WrongType(key.to_string())),
            }
        })
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.with_entries(|entries| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(false);
            };
            let Value::Set(set) = &mut entry.value else {
                return Err(StoreError::WrongType(key.to_string()));
            };
            let removed = set.remove(member);
            if set.is_empty() {
                entries.remove(key);
            }
            Ok(removed)
        })
    }
}
