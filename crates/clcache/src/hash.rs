//! Hashing and path utilities (component A).
//!
//! All cache identity hashes are MD5: non-cryptographic, fast, and more
//! than enough entropy for the cardinalities this cache ever stores.
//! Collisions are a correctness non-goal here, not a security one.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use md5::{Digest, Md5};

use crate::error::{Error, Result};

/// Placeholder substituted for a configured base-dir prefix in stored paths.
pub const FOLD_PLACEHOLDER: char = '?';

/// Hash the contents of `path`, optionally mixing in `extra` before finalizing.
///
/// `extra` lets callers fold additional identity data (a normalized command
/// line, a format version) into the same digest as the file content without
/// a second hash-and-concatenate pass.
pub fn file_hash(path: &Path, extra: Option<&str>) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.to_path_buf())
        } else {
            Error::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let mut hasher = Md5::new();
    hasher.update(&bytes);
    if let Some(extra) = extra {
        hasher.update(extra.as_bytes());
    }
    Ok(hex(&hasher.finalize()))
}

/// Hash the UTF-8 bytes of a string.
pub fn string_hash(s: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(s.as_bytes());
    hex(&hasher.finalize())
}

/// Derive the compiler identity: `hash("<mtime>|<size>|<implVersion>")`.
///
/// Changing either the compiler binary (upgrade) or `impl_version` (cache
/// format change) invalidates every cache entry, since this hash feeds the
/// manifest hash (direct mode) and the preprocessor-mode key alike.
pub fn compiler_identity(compiler_path: &Path, impl_version: &str) -> Result<String> {
    let meta = std::fs::metadata(compiler_path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(compiler_path.to_path_buf())
        } else {
            Error::Io {
                path: compiler_path.to_path_buf(),
                source,
            }
        }
    })?;

    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .unwrap_or_default();

    let identity = format!(
        "{}.{}|{}|{}",
        mtime.as_secs(),
        mtime.subsec_nanos(),
        meta.len(),
        impl_version
    );
    Ok(string_hash(&identity))
}

fn hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Normalize a path for stable, cross-invocation hashing and comparison.
///
/// Lowercases, converts `\` to `/`, collapses repeated separators, and
/// strips a trailing separator (except at the root).
pub fn normalize_path(path: &str) -> String {
    let lowered = path.to_lowercase().replace('\\', "/");

    let mut collapsed = String::with_capacity(lowered.len());
    let mut prev_slash = false;
    for c in lowered.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        collapsed.push(c);
    }

    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }
    collapsed
}

/// Fold a configured absolute base-dir prefix to [`FOLD_PLACEHOLDER`].
///
/// Matching is case-insensitive (this platform's filesystem semantics).
/// Paths outside `base_dir`, or when no `base_dir` is configured, pass
/// through unchanged (normalized only).
pub fn fold_path(path: &Path, base_dir: Option<&Path>) -> String {
    let normalized = normalize_path(&path.to_string_lossy());

    let Some(base_dir) = base_dir else {
        return normalized;
    };
    let base_normalized = normalize_path(&base_dir.to_string_lossy());

    if let Some(rest) = normalized.strip_prefix(&base_normalized) {
        format!("{FOLD_PLACEHOLDER}{rest}")
    } else {
        normalized
    }
}

/// Reverse [`fold_path`]. Fails loudly if `folded` starts with the
/// placeholder but no `base_dir` was configured to expand it against.
pub fn expand_path(folded: &str, base_dir: Option<&Path>) -> Result<PathBuf> {
    match folded.strip_prefix(FOLD_PLACEHOLDER) {
        Some(rest) => match base_dir {
            Some(base_dir) => Ok(PathBuf::from(format!(
                "{}{rest}",
                normalize_path(&base_dir.to_string_lossy())
            ))),
            None => Err(Error::UnconfiguredBaseDir(folded.to_string())),
        },
        None => Ok(PathBuf::from(folded)),
    }
}

/// The source-basename-without-extension, mirroring the original
/// implementation's helper used to derive a default object-file name.
pub fn basename_without_extension(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let base = normalized
        .rsplit('/')
        .next()
        .unwrap_or(&normalized)
        .to_string();
    match base.rfind('.') {
        Some(idx) if idx > 0 => base[..idx].to_string(),
        _ => base,
    }
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod tests;
