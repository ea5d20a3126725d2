// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator (component J).
//!
//! Turns a raw, not-yet-expanded argument vector into a finished compile:
//! environment prepend/append, response-file expansion, analysis, a
//! bounded fan-out over `/MP[N]` when more than one source file is given,
//! then either direct-mode or preprocessor-mode key derivation, a cache
//! probe, and — on a miss — a real compile plus a store.
//!
//! The one invariant threaded through every path here: this layer never
//! turns a build the real compiler would have completed into a failure.
//! Anything that can't be analyzed, keyed, or locked in time falls back to
//! invoking the real compiler with the caller's own argument vector.

use std::path::{Path, PathBuf};

use crate::analyzer::{self, AnalyzedRequest, ArgumentShape};
use crate::cache::Cache;
use crate::compiler::{CompilerInvoker, CompilerOutput};
use crate::env::RuntimeConfig;
use crate::error::{AnalysisError, Result};
use crate::hash;
use crate::includes;
use crate::manifest::{self, Manifest, ManifestEntry, ManifestRepository};
use crate::tokenizer;

/// Bumped whenever the on-disk key derivation changes shape, folded into
/// both the direct-mode manifest hash and the preprocessor-mode key so an
/// upgrade invalidates every entry rather than silently misreading one.
pub const IMPL_VERSION: &str = "2";

/// Every flag name `strip_no_direct_flags` needs to recognize, with the
/// shape governing how its value is consumed. This mirrors [`analyzer`]'s
/// own flag table (and must include every name that shares a prefix with
/// one actually stripped below — `EH` alongside `E` — so longest-match
/// classification resolves `/EHsc` to `EH`, not to `E`).
const NO_DIRECT_FLAG_TABLE: &[(&str, fn(String) -> ArgumentShape)] = &[
    ("AI", ArgumentShape::T3),
    ("C", ArgumentShape::T2),
    ("EH", ArgumentShape::T2),
    ("E", ArgumentShape::T2),
    ("P", ArgumentShape::T2),
    ("FI", ArgumentShape::T3),
    ("u", ArgumentShape::T2),
    ("X", ArgumentShape::T2),
    ("FU", ArgumentShape::T3),
    ("D", ArgumentShape::T3),
    ("EP", ArgumentShape::T2),
    ("Fx", ArgumentShape::T2),
    ("U", ArgumentShape::T3),
    ("I", ArgumentShape::T3),
    ("Fo", ArgumentShape::T3),
    ("MP", ArgumentShape::T2),
    ("c", ArgumentShape::T2),
];

/// Flags dropped before hashing a preprocessor-mode command line: either
/// they only affect how/where the result is written or how many jobs run
/// concurrently, or (for macro/include flags) their effect is already
/// folded into the preprocessed text the hash also covers. `EH` is
/// classified (see [`NO_DIRECT_FLAG_TABLE`]) but deliberately absent here:
/// it changes the exception-handling model and therefore object identity,
/// so it must survive into the hash.
const NO_DIRECT_STRIP_NAMES: &[&str] = &[
    "AI", "C", "E", "P", "FI", "u", "X", "FU", "D", "EP", "Fx", "U", "I", "Fo", "MP", "c",
];

/// The outcome of running one request through the orchestrator, whether
/// served from cache or compiled for real.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CompileOutcome {
    fn from_compiler(output: CompilerOutput) -> Self {
        Self {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Why a direct-mode request missed, carrying whatever was already learned
/// on the way to the miss so the recompile path doesn't redo that work.
enum DirectMiss {
    /// A manifest entry matched the included set, but its artifact had
    /// already been evicted from the artifacts repository.
    Evicted { cachekey: String },
    /// A manifest exists, but no entry's included set matched.
    HeaderChanged,
    /// No manifest exists at all for this source/command-line/compiler.
    SourceChanged,
}

/// Ties configuration, the cache, and a compiler invoker together for the
/// lifetime of one top-level request. `C` is generic rather than a trait
/// object so tests can substitute a zero-cost in-process fake.
pub struct Orchestrator<'a, C: CompilerInvoker + Sync> {
    config: &'a RuntimeConfig,
    cache: &'a Cache,
    compiler: &'a C,
}

impl<'a, C: CompilerInvoker + Sync> Orchestrator<'a, C> {
    pub fn new(config: &'a RuntimeConfig, cache: &'a Cache, compiler: &'a C) -> Self {
        Self {
            config,
            cache,
            compiler,
        }
    }

    /// Run one top-level invocation: `argv` is the driver's own argument
    /// vector, before `CL`/`_CL_` extension or `@file` expansion.
    pub fn run(&self, argv: &[String], cwd: &Path) -> Result<CompileOutcome> {
        if self.config.disabled {
            return self.invoke_real_compiler(argv, cwd);
        }

        let extended = tokenizer::extend_command_line_from_environment(
            argv,
            std::env::var(crate::env::CL).ok().as_deref(),
            std::env::var(crate::env::CL_EXTRA).ok().as_deref(),
        );

        let expanded = match tokenizer::expand_command_line(&extended) {
            Ok(expanded) => expanded,
            Err(_) => return self.invoke_real_compiler(&extended, cwd),
        };

        match analyzer::analyze(&expanded, cwd) {
            Err(err) => {
                self.register_analysis_error(&err)?;
                self.invoke_real_compiler(&expanded, cwd)
            }
            Ok(req) if req.input_files.len() > 1 => self.fan_out(&expanded, &req, cwd),
            Ok(req) => self.process_single(&expanded, &req, cwd),
        }
    }

    fn resolve_compiler_path(&self) -> Result<PathBuf> {
        let wrapper = std::env::current_exe().ok();
        self.config
            .resolve_compiler_path(wrapper.as_deref())
            .ok_or_else(|| crate::error::Error::NotFound(PathBuf::from("cl.exe")))
    }

    fn invoke_real_compiler(&self, argv: &[String], cwd: &Path) -> Result<CompileOutcome> {
        let compiler_path = self.resolve_compiler_path()?;
        let out = self.compiler.invoke(&compiler_path, argv, cwd)?;
        Ok(CompileOutcome::from_compiler(out))
    }

    fn register_analysis_error(&self, err: &AnalysisError) -> Result<()> {
        self.cache.with_stats(|s| match err {
            AnalysisError::NoSourceFile => s.register_call_without_source_file(),
            AnalysisError::MultipleSourceFilesComplex => {
                s.register_call_with_multiple_source_files()
            }
            AnalysisError::CalledForLink => s.register_call_for_linking(),
            AnalysisError::CalledWithPch => s.register_call_with_pch(),
            AnalysisError::ExternalDebugInfo => s.register_call_for_external_debug_info(),
            AnalysisError::CalledForPreprocessing => s.register_call_for_preprocessing(),
            AnalysisError::InvalidArgument(_) => s.register_call_with_invalid_argument(),
        })?;
        Ok(())
    }

    /// How many worker threads to run for a multi-source-file invocation:
    /// no `/MP` at all means strictly sequential (`1`); `/MP` with no
    /// number means one per available core; `/MPn` means `n`.
    fn fan_out_concurrency(mp: Option<Option<u32>>) -> usize {
        match mp {
            None => 1,
            Some(None) => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Some(Some(n)) => n.max(1) as usize,
        }
    }

    /// Compile each of `req.input_files` as if it had been the sole source
    /// file on its own command line, across a bounded pool of worker
    /// threads, and fold the individual exit codes into one: the first
    /// non-zero code wins, matching the real driver's own behavior when one
    /// of several translation units in a batch fails.
    fn fan_out(&self, argv: &[String], req: &AnalyzedRequest, cwd: &Path) -> Result<CompileOutcome> {
        let sources: Vec<String> = req
            .input_files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let concurrency = Self::fan_out_concurrency(req.mp).min(sources.len().max(1));

        let (work_tx, work_rx) = crossbeam_channel::unbounded::<String>();
        for source in &sources {
            let _ = work_tx.send(source.clone());
        }
        drop(work_tx);

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<Result<CompileOutcome>>();

        std::thread::scope(|scope| {
            for _ in 0..concurrency {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let sources = &sources;
                scope.spawn(move || {
                    while let Ok(source) = work_rx.recv() {
                        let single_argv = single_source_argv(argv, sources, &source);
                        let outcome = match analyzer::analyze(&single_argv, cwd) {
                            Ok(single_req) => self.process_single(&single_argv, &single_req, cwd),
                            Err(err) => self
                                .register_analysis_error(&err)
                                .and_then(|()| self.invoke_real_compiler(&single_argv, cwd)),
                        };
                        let _ = result_tx.send(outcome);
                    }
                });
            }
            drop(result_tx);
        });

        let mut exit_code = 0;
        let mut first_failure: Option<Result<CompileOutcome>> = None;
        for _ in 0..sources.len() {
            match result_rx.recv() {
                Ok(Ok(outcome)) => {
                    if exit_code == 0 && outcome.exit_code != 0 {
                        exit_code = outcome.exit_code;
                    }
                }
                Ok(Err(err)) if first_failure.is_none() => {
                    first_failure = Some(Err(err));
                }
                _ => {}
            }
        }
        if let Some(failure) = first_failure {
            return failure;
        }
        Ok(CompileOutcome {
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    fn process_single(
        &self,
        argv: &[String],
        req: &AnalyzedRequest,
        cwd: &Path,
    ) -> Result<CompileOutcome> {
        let source = &req.input_files[0];
        let object_file = req
            .object_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(source));
        let dest = if object_file.is_absolute() {
            object_file
        } else {
            cwd.join(object_file)
        };

        if self.config.no_direct {
            self.process_no_direct(argv, &dest, cwd)
        } else {
            self.process_direct(argv, source, &dest, cwd)
        }
    }

    /// Preprocessor mode: key on the compiler identity, the command line
    /// with output- and concurrency-affecting flags stripped, and the
    /// preprocessed text itself, since that text already reflects every
    /// header the compile would read.
    fn process_no_direct(&self, argv: &[String], dest: &Path, cwd: &Path) -> Result<CompileOutcome> {
        let compiler_path = self.resolve_compiler_path()?;
        let compiler_identity = hash::compiler_identity(&compiler_path, IMPL_VERSION)?;

        let preprocess_argv = preprocessor_argv(argv);
        let pre = self.compiler.invoke(&compiler_path, &preprocess_argv, cwd)?;
        if pre.exit_code != 0 {
            return Ok(CompileOutcome {
                exit_code: pre.exit_code,
                stdout: String::new(),
                stderr: pre.stderr,
            });
        }

        let normalized = strip_no_direct_flags(argv).join(" ");
        let key = hash::string_hash(&format!(
            "{compiler_identity}|{normalized}|{}",
            pre.stdout
        ));

        {
            let _lock = self.cache.lock_artifact_shard(&key)?;
            let section = self.cache.artifacts().section(&key);
            if section.has_entry(&key) {
                let artifact = section.get_entry(&key)?;
                replace_destination(&artifact.object_file, dest, self.config.hardlink)?;
                section.touch(&key)?;
                self.cache.with_stats(|s| s.register_cache_hit())?;
                return Ok(CompileOutcome {
                    exit_code: 0,
                    stdout: artifact.stdout,
                    stderr: artifact.stderr,
                });
            }
        }

        let real = self.compiler.invoke(&compiler_path, argv, cwd)?;
        if real.exit_code == 0 && dest.exists() {
            let size = std::fs::metadata(dest)
                .map_err(|source| crate::error::Error::Io { path: dest.to_path_buf(), source })?
                .len();
            {
                let _lock = self.cache.lock_artifact_shard(&key)?;
                self.cache.artifacts().section(&key).set_entry(
                    &key,
                    dest,
                    &real.stdout,
                    &real.stderr,
                    self.config.hardlink,
                )?;
            }
            self.cache.with_stats(|s| {
                s.register_cache_miss();
                s.register_cache_entry(size);
            })?;
            self.cache.clean_if_needed()?;
        }
        Ok(CompileOutcome::from_compiler(real))
    }

    /// Direct mode: key on the source file plus the command line, look up
    /// the manifest, and walk its entries MRU-first for one whose recorded
    /// headers still hash to the same included set.
    fn process_direct(
        &self,
        argv: &[String],
        source: &Path,
        dest: &Path,
        cwd: &Path,
    ) -> Result<CompileOutcome> {
        let compiler_path = self.resolve_compiler_path()?;
        let compiler_identity = hash::compiler_identity(&compiler_path, IMPL_VERSION)?;
        let base_dir = self.config.base_dir.as_deref();
        let mhash = manifest::manifest_hash(source, argv, &compiler_identity, base_dir)?;

        let mut miss = DirectMiss::SourceChanged;
        {
            let _manifest_lock = self.cache.lock_manifest_shard(&mhash)?;
            let section = self.cache.manifests().section(&mhash);
            if let Some(mut existing) = section.get_manifest(&mhash) {
                miss = DirectMiss::HeaderChanged;
                let mut matched = None;
                for (idx, entry) in existing.entries().iter().enumerate() {
                    let Some(hashes) = header_hashes_for_entry(entry, base_dir) else {
                        continue;
                    };
                    if ManifestRepository::includes_content_hash_for_hashes(&hashes)
                        == entry.includes_content_hash
                    {
                        matched = Some((idx, entry.object_hash.clone()));
                        break;
                    }
                }
                if let Some((idx, key)) = matched {
                    existing.touch(idx);
                    section.set_manifest(&mhash, &existing)?;

                    let artifact_lock = self.cache.lock_artifact_shard(&key)?;
                    let artifact_section = self.cache.artifacts().section(&key);
                    if artifact_section.has_entry(&key) {
                        let artifact = artifact_section.get_entry(&key)?;
                        replace_destination(&artifact.object_file, dest, self.config.hardlink)?;
                        artifact_section.touch(&key)?;
                        drop(artifact_lock);
                        self.cache.with_stats(|s| s.register_cache_hit())?;
                        return Ok(CompileOutcome {
                            exit_code: 0,
                            stdout: artifact.stdout,
                            stderr: artifact.stderr,
                        });
                    }
                    drop(artifact_lock);
                    miss = DirectMiss::Evicted { cachekey: key };
                }
            }
        }

        self.recompile_direct(&compiler_path, argv, source, dest, &mhash, base_dir, miss, cwd)
    }

    #[allow(clippy::too_many_arguments)]
    fn recompile_direct(
        &self,
        compiler_path: &Path,
        argv: &[String],
        source: &Path,
        dest: &Path,
        mhash: &str,
        base_dir: Option<&Path>,
        miss: DirectMiss,
        cwd: &Path,
    ) -> Result<CompileOutcome> {
        let mut recompile_argv = argv.to_vec();
        let injected_show_includes = !argv.iter().any(|a| a == "/showIncludes");
        if injected_show_includes {
            recompile_argv.push("/showIncludes".to_string());
        }

        let real = self.compiler.invoke(compiler_path, &recompile_argv, cwd)?;
        let on_stderr = includes::includes_on_stderr(argv);
        let raw_stream = if on_stderr { &real.stderr } else { &real.stdout };
        let (include_paths, cleaned) =
            includes::parse_includes(raw_stream, &source.to_string_lossy(), injected_show_includes);
        let (stdout, stderr) = if on_stderr {
            (real.stdout.clone(), cleaned)
        } else {
            (cleaned, real.stderr.clone())
        };

        if real.exit_code != 0 {
            return Ok(CompileOutcome {
                exit_code: real.exit_code,
                stdout,
                stderr,
            });
        }

        let mut header_hashes = Vec::with_capacity(include_paths.len());
        for include in &include_paths {
            header_hashes.push(hash::file_hash(Path::new(include), None)?);
        }
        let includes_content_hash =
            ManifestRepository::includes_content_hash_for_hashes(&header_hashes);

        let cachekey = match &miss {
            DirectMiss::Evicted { cachekey } => cachekey.clone(),
            DirectMiss::HeaderChanged | DirectMiss::SourceChanged => {
                manifest::entry_key(mhash, &includes_content_hash)
            }
        };

        let mut stored_size = None;
        if dest.exists() {
            let size = std::fs::metadata(dest)
                .map_err(|source| crate::error::Error::Io { path: dest.to_path_buf(), source })?
                .len();
            let _artifact_lock = self.cache.lock_artifact_shard(&cachekey)?;
            self.cache.artifacts().section(&cachekey).set_entry(
                &cachekey,
                dest,
                &stdout,
                &stderr,
                self.config.hardlink,
            )?;
            stored_size = Some(size);
        }

        if !matches!(miss, DirectMiss::Evicted { .. }) {
            let include_files: Vec<String> = include_paths
                .iter()
                .map(|p| hash::fold_path(Path::new(p), base_dir))
                .collect();
            let _manifest_lock = self.cache.lock_manifest_shard(mhash)?;
            let section = self.cache.manifests().section(mhash);
            let mut manifest = section.get_manifest(mhash).unwrap_or_else(Manifest::default);
            manifest.insert_mru(ManifestEntry::new(
                include_files,
                includes_content_hash,
                cachekey,
            ));
            section.set_manifest(mhash, &manifest)?;
        }

        self.cache.with_stats(|s| {
            match &miss {
                DirectMiss::Evicted { .. } => s.register_evicted_miss(),
                DirectMiss::HeaderChanged => s.register_header_changed_miss(),
                DirectMiss::SourceChanged => s.register_source_changed_miss(),
            }
            if let Some(size) = stored_size {
                s.register_cache_entry(size);
            }
        })?;
        self.cache.clean_if_needed()?;

        Ok(CompileOutcome {
            exit_code: 0,
            stdout,
            stderr,
        })
    }
}

/// Hash every recorded header for a manifest entry, expanding base-dir
/// placeholders first. `None` if any header is missing, so the caller
/// skips this entry silently rather than registering a miss subclass for
/// a header that simply no longer exists.
fn header_hashes_for_entry(entry: &ManifestEntry, base_dir: Option<&Path>) -> Option<Vec<String>> {
    let mut hashes = Vec::with_capacity(entry.include_files.len());
    for folded in &entry.include_files {
        let expanded = hash::expand_path(folded, base_dir).ok()?;
        hashes.push(hash::file_hash(&expanded, None).ok()?);
    }
    Some(hashes)
}

/// Build the argv for one source file out of a multi-source-file request:
/// every other input file is dropped, `/MP*` flags are dropped (they only
/// govern this process's own fan-out, not a single child compile), and
/// `source` is the sole remaining input.
fn single_source_argv(argv: &[String], all_sources: &[String], source: &str) -> Vec<String> {
    argv.iter()
        .filter(|t| !t.starts_with("/MP") && !t.starts_with("-MP"))
        .filter(|t| !all_sources.iter().any(|s| s != source && *t == s))
        .cloned()
        .collect()
}

/// Build the preprocessor-mode probe command line: drop `/c` (compile to
/// object) and add `/EP` (preprocess to stdout, no `#line` directives).
fn preprocessor_argv(argv: &[String]) -> Vec<String> {
    let mut out: Vec<String> = argv.iter().filter(|t| t.as_str() != "/c").cloned().collect();
    out.push("/EP".to_string());
    out
}

/// Drop flags from a command line that can't affect preprocessor-mode
/// output or object identity, so the same logical invocation from two
/// different build-tree layouts or job counts still hashes identically.
///
/// Each token is classified by its exact flag name (reusing the
/// analyzer's longest-match table lookup) rather than by a raw string
/// prefix, so a token is only dropped when it names a flag in
/// [`NO_DIRECT_STRIP_NAMES`] itself, never merely one that starts with
/// the same letters as one — `/EHsc` classifies as `EH`, which isn't in
/// the strip set, and survives untouched. A dropped flag whose value
/// lives in the next token (the `T3`/`T4` shapes, unattached) takes that
/// token with it.
fn strip_no_direct_flags(argv: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(argv.len());
    let mut i = 0;
    while i < argv.len() {
        let token = &argv[i];
        let Some(body) = token.strip_prefix('/').or_else(|| token.strip_prefix('-')) else {
            out.push(token.clone());
            i += 1;
            continue;
        };
        let Some((shape, rest)) = analyzer::longest_flag_match(body, NO_DIRECT_FLAG_TABLE) else {
            out.push(token.clone());
            i += 1;
            continue;
        };
        let consumed = match &shape {
            ArgumentShape::T1(_) | ArgumentShape::T2(_) => 1,
            ArgumentShape::T3(_) if rest.is_empty() && i + 1 < argv.len() => 2,
            ArgumentShape::T3(_) => 1,
            ArgumentShape::T4(_) if i + 1 < argv.len() => 2,
            ArgumentShape::T4(_) => 1,
        };
        if !NO_DIRECT_STRIP_NAMES.contains(&shape.name()) {
            out.extend(argv[i..i + consumed].iter().cloned());
        }
        i += consumed;
    }
    out
}

/// Replace `dest` with a copy (or hard link, if configured) of
/// `cached_object`, creating `dest`'s parent directory if needed.
fn replace_destination(cached_object: &Path, dest: &Path, hardlink: bool) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| crate::error::Error::Io { path: parent.to_path_buf(), source })?;
    }
    if dest.exists() {
        std::fs::remove_file(dest)
            .map_err(|source| crate::error::Error::Io { path: dest.to_path_buf(), source })?;
    }
    if hardlink && std::fs::hard_link(cached_object, dest).is_ok() {
        return Ok(());
    }
    std::fs::copy(cached_object, dest)
        .map_err(|source| crate::error::Error::Io { path: dest.to_path_buf(), source })?;
    Ok(())
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
