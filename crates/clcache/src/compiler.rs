//! Real-compiler invocation (component J support).
//!
//! Spawning the actual compiler is the one boundary this crate cannot
//! exercise in CI against the genuine MSVC toolchain, so it sits behind
//! a small trait. Production wires up [`SpawnedCompiler`]; tests swap in
//! a fake binary (`src/bin/fake_cl.rs`) that mimics just enough of the
//! compiler's `/showIncludes` and exit-code behavior to drive the
//! orchestrator end to end.

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// The outcome of invoking the real compiler.
#[derive(Debug, Clone)]
pub struct CompilerOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Abstraction over "run the real compiler with this argv".
///
/// `cwd` matters because the real driver resolves every relative path on
/// its command line (source files, `/Fo` destinations, `/I` search paths)
/// against its own working directory, not the cache engine's — so a
/// `SpawnedCompiler` must set it explicitly rather than inherit whatever
/// directory the orchestrator process happens to be running in.
pub trait CompilerInvoker {
    fn invoke(&self, compiler_path: &Path, argv: &[String], cwd: &Path) -> Result<CompilerOutput>;
}

/// Spawns `compiler_path` as a child process, capturing stdout/stderr.
pub struct SpawnedCompiler;

impl CompilerInvoker for SpawnedCompiler {
    fn invoke(&self, compiler_path: &Path, argv: &[String], cwd: &Path) -> Result<CompilerOutput> {
        let output = Command::new(compiler_path)
            .args(argv)
            .current_dir(cwd)
            .output()
            .map_err(|source| Error::Io {
                path: compiler_path.to_path_buf(),
                source,
            })?;

        Ok(CompilerOutput {
            exit_code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
