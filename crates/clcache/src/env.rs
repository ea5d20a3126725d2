//! Environment variables consumed by the cache engine.
//!
//! One constant per row in the environment-variable table; `RuntimeConfig`
//! reads them once at process start and is threaded through the
//! orchestrator from there (see DESIGN NOTES: "Global mutable state").

/// Root directory for the cache; default `<home>/clcache`.
pub const CLCACHE_DIR: &str = "CLCACHE_DIR";
/// Absolute path to the real compiler binary; else searched on `PATH`.
pub const CLCACHE_CL: &str = "CLCACHE_CL";
/// If set, bypass the cache entirely.
pub const CLCACHE_DISABLE: &str = "CLCACHE_DISABLE";
/// If set, select preprocessor-mode (no-direct) keying.
pub const CLCACHE_NODIRECT: &str = "CLCACHE_NODIRECT";
/// Absolute prefix for portable path folding.
pub const CLCACHE_BASEDIR: &str = "CLCACHE_BASEDIR";
/// If set, prefer hard-linking artifacts over copying.
pub const CLCACHE_HARDLINK: &str = "CLCACHE_HARDLINK";
/// Override the default lock-acquisition timeout, in milliseconds.
pub const CLCACHE_LOCK_TIMEOUT_MS: &str = "CLCACHE_LOCK_TIMEOUT_MS";
/// If set, emit trace diagnostics.
pub const CLCACHE_LOG: &str = "CLCACHE_LOG";
/// Prepended to the argument vector before analysis.
pub const CL: &str = "CL";
/// Appended to the argument vector before analysis.
pub const CL_EXTRA: &str = "_CL_";

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default lock-acquisition timeout (10,000 ms).
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;

/// Default maximum cache size: roughly 1 GiB.
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 1024 * 1024 * 1000;

/// Process-wide configuration, resolved once from the environment.
///
/// Threaded through the orchestrator instead of re-read from `std::env`
/// deep inside library code, so tests can construct it directly without
/// mutating process environment.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Root directory holding `config.txt`, `stats.txt`, `manifests/`, `objects/`.
    pub cache_dir: PathBuf,
    /// Absolute path to the real compiler, if resolved.
    pub compiler_path: Option<PathBuf>,
    /// Bypass the cache entirely.
    pub disabled: bool,
    /// Force preprocessor-mode keying.
    pub no_direct: bool,
    /// Absolute prefix folded to `?` in stored paths.
    pub base_dir: Option<PathBuf>,
    /// Prefer hard-linking artifacts into place.
    pub hardlink: bool,
    /// Lock-acquisition timeout.
    pub lock_timeout: Duration,
    /// Emit trace diagnostics.
    pub trace_log: bool,
}

impl RuntimeConfig {
    /// Resolve configuration from the current process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve configuration from an arbitrary name-lookup function.
    ///
    /// Kept separate from [`Self::from_env`] so tests can exercise the
    /// resolution logic without mutating the real process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let cache_dir = lookup(CLCACHE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_cache_dir(&lookup));

        let compiler_path = lookup(CLCACHE_CL).map(PathBuf::from);

        let lock_timeout_ms = lookup(CLCACHE_LOCK_TIMEOUT_MS)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_LOCK_TIMEOUT_MS);

        Self {
            cache_dir,
            compiler_path,
            disabled: lookup(CLCACHE_DISABLE).is_some(),
            no_direct: lookup(CLCACHE_NODIRECT).is_some(),
            base_dir: lookup(CLCACHE_BASEDIR).map(PathBuf::from),
            hardlink: lookup(CLCACHE_HARDLINK).is_some(),
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            trace_log: lookup(CLCACHE_LOG).is_some(),
        }
    }
}

fn default_cache_dir(lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
    let home = lookup("HOME")
        .or_else(|| lookup("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join("clcache")
}

impl RuntimeConfig {
    /// The real compiler to invoke: `compiler_path` if configured, else the
    /// first `PATH` entry named `names` that isn't `wrapper_exe` itself —
    /// this binary is commonly installed under the real compiler's own name
    /// earlier on `PATH`, so naively taking the first match would recurse
    /// into itself.
    pub fn resolve_compiler_path(&self, wrapper_exe: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = &self.compiler_path {
            return Some(path.clone());
        }
        let path_var = std::env::var("PATH").ok()?;
        search_path(&path_var, &["cl.exe", "cl"], wrapper_exe)
    }
}

fn search_path(path_var: &str, names: &[&str], wrapper_exe: Option<&Path>) -> Option<PathBuf> {
    for dir in std::env::split_paths(path_var) {
        for name in names {
            let candidate = dir.join(name);
            if !candidate.is_file() {
                continue;
            }
            if Some(candidate.as_path()) == wrapper_exe {
                continue;
            }
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
