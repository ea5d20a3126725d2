// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cache facade (component I).
//!
//! Owns the manifest repository (G), the artifacts repository (H),
//! statistics and configuration (E), and composes their locks (F) into
//! the ordering the rest of the engine relies on: every manifest-shard
//! lock ascending, then every artifact-shard lock ascending, then the
//! statistics lock last. Administrative eviction takes the full
//! composite; a single request takes only the handful of shard locks it
//! actually touches, in the same relative order, so the two never
//! deadlock against each other.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::artifacts::CompilerArtifactsRepository;
use crate::env::RuntimeConfig;
use crate::error::Result;
use crate::lock::{LockGuard, NamedLock};
use crate::manifest::ManifestRepository;
use crate::stats::{Configuration, Statistics};

const SHARD_HEX: &[u8] = b"0123456789abcdef";

/// Every two-hex-character shard prefix, in ascending order.
fn shard_prefixes() -> impl Iterator<Item = String> {
    SHARD_HEX.iter().flat_map(|hi| {
        SHARD_HEX
            .iter()
            .map(move |lo| format!("{}{}", *hi as char, *lo as char))
    })
}

/// A set of [`LockGuard`]s released in the reverse of their acquisition
/// order when dropped, per the facade's composite-lock contract.
pub struct LockSet(Vec<LockGuard>);

impl Drop for LockSet {
    fn drop(&mut self) {
        while self.0.pop().is_some() {}
    }
}

/// The on-disk cache: manifests, artifacts, statistics, configuration,
/// and the locks that guard every mutation of them.
pub struct Cache {
    root: PathBuf,
    manifests: ManifestRepository,
    artifacts: CompilerArtifactsRepository,
    lock_timeout: Duration,
}

impl Cache {
    /// Open the cache rooted at `config.cache_dir`. Does not touch disk
    /// beyond what's needed to derive paths; directories are created
    /// lazily by the repositories and locks that need them.
    pub fn open(config: &RuntimeConfig) -> Self {
        Self {
            root: config.cache_dir.clone(),
            manifests: ManifestRepository::new(config.cache_dir.join("manifests")),
            artifacts: CompilerArtifactsRepository::new(config.cache_dir.join("objects")),
            lock_timeout: config.lock_timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifests(&self) -> &ManifestRepository {
        &self.manifests
    }

    pub fn artifacts(&self) -> &CompilerArtifactsRepository {
        &self.artifacts
    }

    fn lock_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.txt")
    }

    pub fn stats_path(&self) -> PathBuf {
        self.root.join("stats.txt")
    }

    fn named_lock(&self, name: impl Into<String>) -> NamedLock {
        NamedLock::new(self.lock_dir(), name, self.lock_timeout)
    }

    /// Lock the manifest shard holding `manifest_hash`.
    pub fn lock_manifest_shard(&self, manifest_hash: &str) -> Result<LockGuard> {
        let shard = &manifest_hash[..manifest_hash.len().min(2)];
        self.named_lock(format!("manifest-{shard}")).acquire()
    }

    /// Lock the artifact shard holding `key`.
    pub fn lock_artifact_shard(&self, key: &str) -> Result<LockGuard> {
        let shard = &key[..key.len().min(2)];
        self.named_lock(format!("artifact-{shard}")).acquire()
    }

    /// Lock statistics/configuration (they share one lock; both are tiny
    /// single-file stores touched together at the end of a request).
    pub fn lock_stats(&self) -> Result<LockGuard> {
        self.named_lock("stats").acquire()
    }

    /// Acquire every manifest-shard lock, then every artifact-shard lock,
    /// then the statistics lock — the full composite used by eviction and
    /// "clear all". Released in reverse order on drop.
    pub fn lock_all(&self) -> Result<LockSet> {
        let mut guards = Vec::with_capacity(256 + 256 + 1);
        for shard in shard_prefixes() {
            guards.push(self.named_lock(format!("manifest-{shard}")).acquire()?);
        }
        for shard in shard_prefixes() {
            guards.push(self.named_lock(format!("artifact-{shard}")).acquire()?);
        }
        guards.push(self.named_lock("stats").acquire()?);
        Ok(LockSet(guards))
    }

    /// Run `f` with statistics open under the statistics lock, saving
    /// afterward if dirty. Matches the "load on open, mutate, save on
    /// close of scope, scope nested inside the lock" discipline.
    pub fn with_stats<R>(&self, f: impl FnOnce(&mut Statistics) -> R) -> Result<R> {
        let _guard = self.lock_stats()?;
        let mut stats = Statistics::open(self.stats_path());
        let result = f(&mut stats);
        stats.save()?;
        Ok(result)
    }

    /// Run `f` with configuration open under the statistics lock.
    pub fn with_config<R>(&self, f: impl FnOnce(&mut Configuration) -> R) -> Result<R> {
        let _guard = self.lock_stats()?;
        let mut config = Configuration::open(self.config_path());
        let result = f(&mut config);
        config.save()?;
        Ok(result)
    }

    pub fn maximum_cache_size(&self) -> Result<u64> {
        self.with_config(|c| c.maximum_cache_size())
    }

    /// Evict manifests and artifacts down toward `target_bytes`.
    ///
    /// 1. no-op if current size is already under target.
    /// 2. free an extra 10% (`effective = 0.9 * target`) to amortize the
    ///    next several compiles before eviction runs again.
    /// 3. split the freed budget 10% manifests / 90% artifacts.
    /// 4. clean manifests to their budget (atime-MRU retention).
    /// 5. clean artifacts to their budget (atime-LRU eviction).
    /// 6. update `CacheSize`/`CacheEntries` to the post-eviction reality.
    pub fn clean(&self, target_bytes: u64) -> Result<()> {
        // Holds every shard lock plus the stats lock for the whole pass, so
        // reads/writes of statistics here go straight through `Statistics`
        // rather than `with_stats`/`with_config` — those acquire the stats
        // lock themselves, and re-acquiring a lock this thread already
        // holds would deadlock against itself on a plain file lock.
        let _lock = self.lock_all()?;

        let mut stats = Statistics::open(self.stats_path());
        let current_size = stats.cache_size();
        if current_size < target_bytes {
            return Ok(());
        }

        let effective = (target_bytes as f64 * 0.9) as u64;
        let manifest_budget = (effective as f64 * 0.10) as u64;
        let artifact_budget = effective - manifest_budget;

        let manifest_bytes = self.manifests.clean(manifest_budget)?;
        let (artifact_entries, artifact_bytes) = self.artifacts.clean(artifact_budget)?;

        stats.set_cache_size(manifest_bytes + artifact_bytes);
        stats.set_cache_entries(artifact_entries);
        stats.save()?;
        Ok(())
    }

    /// After a successful artifact insertion: if the cache is at or above
    /// its configured maximum, run an eviction pass back down to it.
    pub fn clean_if_needed(&self) -> Result<()> {
        let max = self.maximum_cache_size()?;
        let current = self.with_stats(|s| s.cache_size())?;
        if current >= max {
            self.clean(max)?;
        }
        Ok(())
    }

    /// Administrative `-C`: evict everything.
    pub fn clear_all(&self) -> Result<()> {
        self.clean(0)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
