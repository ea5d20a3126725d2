//! Compiler-artifacts repository (component H).
//!
//! Sharded by the first two hex characters of the artifact key, same
//! layout convention as the manifest repository. Each entry is a
//! directory containing `object`, `output.txt` (always, even empty),
//! and `stderr.txt` (only when non-empty). Installation prefers a hard
//! link over a copy when configured to, falling back to copy on any
//! cross-device or permission failure, and always lands through a
//! temporary path plus rename so a concurrent reader never sees a
//! half-populated entry directory.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, Result};

/// `(objectFile, stdoutText, stderrText)`, read back out of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerArtifact {
    pub object_file: PathBuf,
    pub stdout: String,
    pub stderr: String,
}

/// Sharded store of compiler artifacts under `<root>/objects/<hh>/<H>/`.
pub struct CompilerArtifactsRepository {
    root: PathBuf,
}

impl CompilerArtifactsRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn section(&self, key: &str) -> CompilerArtifactsSection<'_> {
        let shard = &key[..key.len().min(2)];
        CompilerArtifactsSection {
            root: &self.root,
            dir: self.root.join(shard),
        }
    }

    /// Gather every entry with its object's size and atime, delete
    /// oldest-atime-first until the running total is below `target_bytes`.
    /// Returns `(entries_retained, bytes_retained)`.
    pub fn clean(&self, target_bytes: u64) -> Result<(u64, u64)> {
        let mut objects = collect_object_files(&self.root)?;
        objects.sort_by(|a, b| a.atime.cmp(&b.atime));

        let total: u64 = objects.iter().map(|o| o.size).sum();
        let mut running = total;
        let mut retained_entries = objects.len() as u64;
        let mut retained_bytes = total;

        for object in &objects {
            if running <= target_bytes {
                break;
            }
            if let Some(entry_dir) = object.path.parent() {
                let _ = std::fs::remove_dir_all(entry_dir);
            }
            running -= object.size;
            retained_bytes -= object.size;
            retained_entries -= 1;
        }

        Ok((retained_entries, retained_bytes))
    }
}

/// One shard of the artifacts repository.
pub struct CompilerArtifactsSection<'a> {
    root: &'a Path,
    dir: PathBuf,
}

impl CompilerArtifactsSection<'_> {
    pub fn compiler_artifacts_section_dir(&self) -> &Path {
        &self.dir
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    pub fn cached_object_name(&self, key: &str) -> PathBuf {
        self.entry_dir(key).join("object")
    }

    fn output_path(&self, key: &str) -> PathBuf {
        self.entry_dir(key).join("output.txt")
    }

    fn stderr_path(&self, key: &str) -> PathBuf {
        self.entry_dir(key).join("stderr.txt")
    }

    pub fn has_entry(&self, key: &str) -> bool {
        self.entry_dir(key).is_dir()
    }

    /// Install `object_path` plus captured output streams under `key`.
    ///
    /// Builds the whole entry in a temporary sibling directory and
    /// renames it into place, so `has_entry` never observes a partial
    /// directory for a concurrent reader.
    pub fn set_entry(
        &self,
        key: &str,
        object_path: &Path,
        stdout: &str,
        stderr: &str,
        hardlink: bool,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|source| Error::Io {
            path: self.dir.clone(),
            source,
        })?;

        let tmp_dir = self.dir.join(format!(".tmp-{key}"));
        if tmp_dir.exists() {
            std::fs::remove_dir_all(&tmp_dir).map_err(|source| Error::Io {
                path: tmp_dir.clone(),
                source,
            })?;
        }
        std::fs::create_dir_all(&tmp_dir).map_err(|source| Error::Io {
            path: tmp_dir.clone(),
            source,
        })?;

        install_object(object_path, &tmp_dir.join("object"), hardlink)?;
        std::fs::write(tmp_dir.join("output.txt"), stdout).map_err(|source| Error::Io {
            path: tmp_dir.join("output.txt"),
            source,
        })?;
        if !stderr.is_empty() {
            std::fs::write(tmp_dir.join("stderr.txt"), stderr).map_err(|source| Error::Io {
                path: tmp_dir.join("stderr.txt"),
                source,
            })?;
        }

        let final_dir = self.entry_dir(key);
        if final_dir.exists() {
            std::fs::remove_dir_all(&final_dir).map_err(|source| Error::Io {
                path: final_dir.clone(),
                source,
            })?;
        }
        std::fs::rename(&tmp_dir, &final_dir).map_err(|source| Error::Io {
            path: final_dir,
            source,
        })?;
        Ok(())
    }

    /// Read back the artifact triple. A missing `stderr.txt` is empty.
    pub fn get_entry(&self, key: &str) -> Result<CompilerArtifact> {
        let object_file = self.cached_object_name(key);
        if !object_file.exists() {
            return Err(Error::NotFound(object_file));
        }
        let stdout = std::fs::read_to_string(self.output_path(key)).unwrap_or_default();
        let stderr = std::fs::read_to_string(self.stderr_path(key)).unwrap_or_default();
        Ok(CompilerArtifact {
            object_file,
            stdout,
            stderr,
        })
    }

    /// Touch the cached object's atime/mtime, keeping eviction ordering
    /// meaningful after a hard-link replay.
    pub fn touch(&self, key: &str) -> Result<()> {
        let path = self.cached_object_name(key);
        let now = filetime::FileTime::now();
        filetime::set_file_times(&path, now, now).map_err(|source| Error::Io { path, source })
    }

    pub fn repository_root(&self) -> &Path {
        self.root
    }
}

fn install_object(source: &Path, dest: &Path, hardlink: bool) -> Result<()> {
    if hardlink {
        if std::fs::hard_link(source, dest).is_ok() {
            return Ok(());
        }
    }
    std::fs::copy(source, dest).map_err(|source_err| Error::Io {
        path: dest.to_path_buf(),
        source: source_err,
    })?;
    Ok(())
}

struct ObjectFile {
    path: PathBuf,
    size: u64,
    atime: SystemTime,
}

fn collect_object_files(root: &Path) -> Result<Vec<ObjectFile>> {
    let mut out = Vec::new();
    let Ok(shards) = std::fs::read_dir(root) else {
        return Ok(out);
    };
    for shard in shards.flatten() {
        let Ok(entries) = std::fs::read_dir(shard.path()) else {
            continue;
        };
        for entry_dir in entries.flatten() {
            let object_path = entry_dir.path().join("object");
            let Ok(meta) = std::fs::metadata(&object_path) else {
                continue;
            };
            let atime = meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH);
            out.push(ObjectFile {
                path: object_path,
                size: meta.len(),
                atime,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
