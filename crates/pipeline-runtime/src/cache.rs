// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Result cache.
//!
//! [`CacheStore`] is the outbound seam to whatever store holds finished
//! artifacts. [`MemoryCache`] is the bundled implementation.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Key/value store with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the live value under `key`, if any.
    async fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration);
}

/// Stable cache key over `(prompt, style)`.
///
/// Each field is length-prefixed so that no two distinct pairs encode to
/// the same bytes, and an absent style differs from an empty one.
pub fn cache_key(prompt: &str, style: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update((prompt.len() as u64).to_le_bytes());
    hasher.update(prompt.as_bytes());
    match style {
        Some(style) => {
            hasher.update([1u8]);
            hasher.update((style.len() as u64).to_le_bytes());
            hasher.update(style.as_bytes());
        }
        None => hasher.update([0u8]),
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
    inserted_seq: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// Process-local cache with TTL expiry and a size bound.
///
/// When full, expired entries are purged first; if that frees nothing the
/// oldest insertion is evicted.
#[derive(Debug)]
pub struct MemoryCache {
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut state = self.lock();
        let expired = state.entries.get(key)?.expires_at <= Instant::now();
        if expired {
            state.entries.remove(key);
            return None;
        }
        state.entries.get(key).map(|e| e.value.clone())
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let mut state = self.lock();
        if !state.entries.contains_key(key) && state.entries.len() >= self.max_entries {
            state.entries.retain(|_, e| e.expires_at > now);
            if state.entries.len() >= self.max_entries {
                let oldest = state
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_seq)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    tracing::debug!("cache full ({} entries); evicting {oldest}", self.max_entries);
                    state.entries.remove(&oldest);
                }
            }
        }
        let inserted_seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
                inserted_seq,
            },
        );
    }
}
