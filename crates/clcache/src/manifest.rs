//! Manifest repository (component G).
//!
//! Sharded by the first two hex characters of the manifest hash (256
//! shards) to keep any one directory small. Each manifest is a bounded,
//! MRU-ordered list of entries mapping an includes-content hash to an
//! object hash; reading a file whose format version does not match
//! this implementation's, or that fails to parse, yields "absent"
//! rather than an error — a corrupt or stale manifest is just a cold
//! cache, never a crash.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::{self, string_hash};
use crate::jsonstore::write_atomic;

/// Bump when the on-disk shape changes; older/newer files are "absent".
const MANIFEST_FORMAT_VERSION: u32 = 2;

/// Folded into the manifest-hash input alongside the compiler identity
/// and normalized command line, so a manifest hashing scheme change
/// invalidates old manifests the same way a compiler upgrade does.
const MANIFEST_HASH_FORMAT_VERSION: u32 = MANIFEST_FORMAT_VERSION;

/// `/MP*` flags never affect the compiled object, only this process's
/// own fan-out; they must not perturb the manifest hash.
fn strip_mp_flags(argv: &[String]) -> impl Iterator<Item = &String> {
    argv.iter()
        .filter(|t| !t.starts_with("/MP") && !t.starts_with("-MP"))
}

/// Fold every occurrence of `base_dir` inside `token` (case-insensitive)
/// to the base-dir placeholder, covering both input-file paths and
/// `/I<path>`-shaped include-search-path flags without needing to parse
/// the flag grammar: any token carrying the build-tree prefix becomes
/// portable across machines with the same `base_dir` configured.
fn fold_token(token: &str, base_dir: Option<&Path>) -> String {
    let Some(base_dir) = base_dir else {
        return token.replace('\\', "/");
    };
    let normalized_token = token.replace('\\', "/");
    let base = hash::normalize_path(&base_dir.to_string_lossy());
    let lower = normalized_token.to_lowercase();
    match lower.find(&base) {
        Some(idx) => format!(
            "{}{}{}",
            &normalized_token[..idx],
            hash::FOLD_PLACEHOLDER,
            &normalized_token[idx + base.len()..]
        ),
        None => normalized_token,
    }
}

/// Derive the direct-mode manifest hash: `fileHash(source, additional)`
/// where `additional` folds in the compiler identity, the `/MP*`-stripped
/// and base-dir-folded command line, and the manifest format version —
/// so a compiler upgrade, a differently-shaped invocation, or a manifest
/// schema change all invalidate previously recorded manifests.
pub fn manifest_hash(
    source: &Path,
    argv: &[String],
    compiler_identity: &str,
    base_dir: Option<&Path>,
) -> Result<String> {
    let normalized_argv: Vec<String> = strip_mp_flags(argv)
        .map(|t| fold_token(t, base_dir))
        .collect();
    let extra = format!(
        "{compiler_identity}|{}|{MANIFEST_HASH_FORMAT_VERSION}",
        normalized_argv.join(" ")
    );
    hash::file_hash(source, Some(&extra))
}

/// Entry key for a manifest hash plus an includes-content hash: the
/// manifest hash must participate so two different source files that
/// happen to produce the same include-content set don't collide.
pub fn entry_key(manifest_hash: &str, includes_content_hash: &str) -> String {
    string_hash(&format!("{manifest_hash}{includes_content_hash}"))
}

/// Maximum number of entries retained per manifest before the oldest
/// (least-recently-touched) is evicted to make room for a new one.
const MAX_ENTRIES_PER_MANIFEST: usize = 100;

/// `(includeFiles, includesContentHash, objectHash)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub include_files: Vec<String>,
    pub includes_content_hash: String,
    pub object_hash: String,
}

impl ManifestEntry {
    pub fn new(
        include_files: Vec<String>,
        includes_content_hash: impl Into<String>,
        object_hash: impl Into<String>,
    ) -> Self {
        Self {
            include_files,
            includes_content_hash: includes_content_hash.into(),
            object_hash: object_hash.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OnDiskManifest {
    version: u32,
    entries: Vec<ManifestEntry>,
}

/// An ordered sequence of [`ManifestEntry`], newest (MRU) at position 0.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Move the entry at `index` to the front (MRU position).
    pub fn touch(&mut self, index: usize) {
        if index == 0 || index >= self.entries.len() {
            return;
        }
        let entry = self.entries.remove(index);
        self.entries.insert(0, entry);
    }

    /// Insert `entry` at MRU position, evicting the oldest if full.
    pub fn insert_mru(&mut self, entry: ManifestEntry) {
        if self.entries.len() >= MAX_ENTRIES_PER_MANIFEST {
            self.entries.pop();
        }
        self.entries.insert(0, entry);
    }
}

/// Sharded store of [`Manifest`]s under `<root>/manifests/<hh>/<H>.json`.
pub struct ManifestRepository {
    root: PathBuf,
}

impl ManifestRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The shard directory for a given manifest hash.
    pub fn section(&self, manifest_hash: &str) -> ManifestSection<'_> {
        let shard = shard_of(manifest_hash);
        ManifestSection {
            root: &self.root,
            dir: self.root.join(shard),
        }
    }

    /// Hash over a sorted, deduplicated list of per-header content
    /// hashes, joined with `,`. Order-sensitive only after sorting:
    /// callers must pass the hashes they want included, already in the
    /// set they want hashed (sorting/dedup happens here).
    pub fn includes_content_hash_for_hashes(hashes: &[String]) -> String {
        let mut sorted: Vec<&str> = hashes.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();
        string_hash(&sorted.join(","))
    }

    /// Gather every manifest across all shards with size and atime,
    /// retain newest-by-atime up to `target_bytes`, delete the rest.
    /// Returns the bytes retained.
    pub fn clean(&self, target_bytes: u64) -> Result<u64> {
        let mut files = collect_files_with_atime(&self.root, "json")?;
        // Newest atime first: keep the most recently touched manifests.
        files.sort_by(|a, b| b.atime.cmp(&a.atime));

        let mut retained = 0u64;
        for file in &files {
            if retained + file.size <= target_bytes {
                retained += file.size;
            } else {
                let _ = std::fs::remove_file(&file.path);
            }
        }
        Ok(retained)
    }
}

/// One shard (two-hex-char directory) of the manifest repository.
pub struct ManifestSection<'a> {
    root: &'a Path,
    dir: PathBuf,
}

impl ManifestSection<'_> {
    pub fn manifest_section_dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self, manifest_hash: &str) -> PathBuf {
        self.dir.join(format!("{manifest_hash}.json"))
    }

    /// Load the manifest for `manifest_hash`, or `None` if absent,
    /// unreadable, malformed, or at a different format version.
    pub fn get_manifest(&self, manifest_hash: &str) -> Option<Manifest> {
        let text = std::fs::read_to_string(self.manifest_path(manifest_hash)).ok()?;
        let on_disk: OnDiskManifest = serde_json::from_str(&text).ok()?;
        if on_disk.version != MANIFEST_FORMAT_VERSION {
            return None;
        }
        Some(Manifest::new(on_disk.entries))
    }

    /// Write `manifest` via temp file + rename.
    pub fn set_manifest(&self, manifest_hash: &str, manifest: &Manifest) -> Result<()> {
        let on_disk = OnDiskManifest {
            version: MANIFEST_FORMAT_VERSION,
            entries: manifest.entries.clone(),
        };
        let text = serde_json::to_string_pretty(&on_disk)?;
        write_atomic(&self.manifest_path(manifest_hash), text.as_bytes())?;
        Ok(())
    }

    /// The repository root this shard belongs to, for callers that need
    /// to derive sibling shard paths (e.g. the composite lock).
    pub fn repository_root(&self) -> &Path {
        self.root
    }
}

fn shard_of(hash: &str) -> &str {
    &hash[..hash.len().min(2)]
}

pub(crate) struct FileWithAtime {
    pub path: PathBuf,
    pub size: u64,
    pub atime: SystemTime,
}

pub(crate) fn collect_files_with_atime(root: &Path, extension: &str) -> Result<Vec<FileWithAtime>> {
    let mut out = Vec::new();
    let Ok(shards) = std::fs::read_dir(root) else {
        return Ok(out);
    };
    for shard in shards.flatten() {
        let Ok(entries) = std::fs::read_dir(shard.path()) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            let atime = meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH);
            out.push(FileWithAtime {
                path,
                size: meta.len(),
                atime,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
