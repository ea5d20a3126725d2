#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::*;
use crate::env::RuntimeConfig;
use tempfile::tempdir;

fn open_cache(dir: &Path) -> Cache {
    let config = RuntimeConfig::from_lookup(move |name| {
        if name == "CLCACHE_DIR" {
            Some(dir.to_string_lossy().into_owned())
        } else {
            None
        }
    });
    Cache::open(&config)
}

#[test]
fn with_stats_round_trips_across_reopen() {
    let dir = tempdir().unwrap();
    let cache = open_cache(dir.path());

    cache.with_stats(|s| s.register_cache_hit()).unwrap();
    cache.with_stats(|s| s.register_cache_hit()).unwrap();

    let hits = cache.with_stats(|s| s.num_cache_hits()).unwrap();
    assert_eq!(hits, 2);
}

#[test]
fn with_config_round_trips_across_reopen() {
    let dir = tempdir().unwrap();
    let cache = open_cache(dir.path());

    cache
        .with_config(|c| c.set_maximum_cache_size(12345))
        .unwrap();

    assert_eq!(cache.maximum_cache_size().unwrap(), 12345);
}

#[test]
fn maximum_cache_size_defaults_when_unset() {
    let dir = tempdir().unwrap();
    let cache = open_cache(dir.path());
    assert_eq!(
        cache.maximum_cache_size().unwrap(),
        crate::env::DEFAULT_MAX_CACHE_SIZE
    );
}

#[test]
fn lock_all_acquires_every_shard_in_ascending_order_and_releases_cleanly() {
    let dir = tempdir().unwrap();
    let cache = open_cache(dir.path());

    {
        let _locks = cache.lock_all().unwrap();
    }
    // Dropped; a fresh acquisition must not deadlock against itself.
    let _locks = cache.lock_all().unwrap();
}

#[test]
fn clean_is_a_noop_below_target() {
    let dir = tempdir().unwrap();
    let cache = open_cache(dir.path());
    cache.with_stats(|s| s.set_cache_size(10)).unwrap();

    cache.clean(1_000_000).unwrap();

    assert_eq!(cache.with_stats(|s| s.cache_size()).unwrap(), 10);
}

#[test]
fn clear_all_empties_manifests_and_artifacts() {
    let dir = tempdir().unwrap();
    let cache = open_cache(dir.path());

    let shard = cache.manifests().section("ab");
    let manifest = Manifest::new(vec![ManifestEntry::new(
        vec!["header.h".to_string()],
        "includes-hash",
        "object-hash",
    )]);
    shard.set_manifest("abcd", &manifest).unwrap();

    let artifact_shard = cache.artifacts().section("ab");
    let object = dir.path().join("fake.obj");
    std::fs::write(&object, b"object bytes").unwrap();
    artifact_shard
        .set_entry("abcd1234", &object, "stdout", "", false)
        .unwrap();

    cache
        .with_stats(|s| {
            s.set_cache_size(200);
            s.set_cache_entries(1);
        })
        .unwrap();

    cache.clear_all().unwrap();

    assert!(!artifact_shard.has_entry("abcd1234"));
    assert_eq!(cache.with_stats(|s| s.cache_size()).unwrap(), 0);
    assert_eq!(cache.with_stats(|s| s.num_cache_entries()).unwrap(), 0);
}

#[test]
fn clean_if_needed_triggers_once_at_the_configured_maximum() {
    let dir = tempdir().unwrap();
    let cache = open_cache(dir.path());

    cache.with_config(|c| c.set_maximum_cache_size(100)).unwrap();
    cache
        .with_stats(|s| s.set_cache_size(50))
        .unwrap();
    cache.clean_if_needed().unwrap();
    assert_eq!(cache.with_stats(|s| s.cache_size()).unwrap(), 50);

    cache
        .with_stats(|s| s.set_cache_size(150))
        .unwrap();
    cache.clean_if_needed().unwrap();
    // Nothing was actually inserted on disk, so the eviction pass settles
    // at zero bytes retained rather than the unreachable target.
    assert_eq!(cache.with_stats(|s| s.cache_size()).unwrap(), 0);
}
