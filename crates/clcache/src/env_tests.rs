// SPDX-License-Identifier: MIT

use super::*;
use std::collections::HashMap;

fn lookup_from(map: &HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> + '_ {
    move |name| map.get(name).map(|v| v.to_string())
}

#[test]
fn defaults_when_nothing_set() {
    let map = HashMap::new();
    let cfg = RuntimeConfig::from_lookup(lookup_from(&map));
    assert!(!cfg.disabled);
    assert!(!cfg.no_direct);
    assert!(!cfg.hardlink);
    assert!(cfg.base_dir.is_none());
    assert!(cfg.compiler_path.is_none());
    assert_eq!(cfg.lock_timeout, Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS));
}

#[test]
fn cache_dir_overridden() {
    let mut map = HashMap::new();
    map.insert(CLCACHE_DIR, "/tmp/mycache");
    let cfg = RuntimeConfig::from_lookup(lookup_from(&map));
    assert_eq!(cfg.cache_dir, PathBuf::from("/tmp/mycache"));
}

#[test]
fn cache_dir_defaults_under_home() {
    let mut map = HashMap::new();
    map.insert("HOME", "/home/bob");
    let cfg = RuntimeConfig::from_lookup(lookup_from(&map));
    assert_eq!(cfg.cache_dir, PathBuf::from("/home/bob/clcache"));
}

#[test]
fn bool_flags_are_presence_only() {
    let mut map = HashMap::new();
    map.insert(CLCACHE_DISABLE, "");
    map.insert(CLCACHE_NODIRECT, "0");
    let cfg = RuntimeConfig::from_lookup(lookup_from(&map));
    assert!(cfg.disabled);
    assert!(cfg.no_direct, "presence alone selects no-direct mode, value is ignored");
}

#[test]
fn invalid_lock_timeout_falls_back_to_default() {
    let mut map = HashMap::new();
    map.insert(CLCACHE_LOCK_TIMEOUT_MS, "not-a-number");
    let cfg = RuntimeConfig::from_lookup(lookup_from(&map));
    assert_eq!(cfg.lock_timeout, Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS));
}

#[test]
fn lock_timeout_parsed() {
    let mut map = HashMap::new();
    map.insert(CLCACHE_LOCK_TIMEOUT_MS, "250");
    let cfg = RuntimeConfig::from_lookup(lookup_from(&map));
    assert_eq!(cfg.lock_timeout, Duration::from_millis(250));
}

#[test]
fn resolve_compiler_path_prefers_configured_path() {
    let mut map = HashMap::new();
    map.insert(CLCACHE_CL, "/opt/msvc/cl.exe");
    let cfg = RuntimeConfig::from_lookup(lookup_from(&map));
    assert_eq!(
        cfg.resolve_compiler_path(None),
        Some(PathBuf::from("/opt/msvc/cl.exe"))
    );
}

#[test]
fn search_path_skips_the_wrapper_itself() {
    let dir = tempfile::tempdir().unwrap();
    let cl = dir.path().join("cl.exe");
    std::fs::write(&cl, b"").unwrap();

    let path_var = dir.path().to_string_lossy().into_owned();
    assert_eq!(search_path(&path_var, &["cl.exe", "cl"], Some(&cl)), None);
    assert_eq!(
        search_path(&path_var, &["cl.exe", "cl"], None),
        Some(cl)
    );
}
