//! Stand-in for the real MSVC compiler driver, used only by tests.
//!
//! Understands just enough of `/c`, `/Fo`, `/showIncludes`, `/E`, `/EP`,
//! `/P` to let the orchestrator's integration tests exercise a full
//! cache hit/miss cycle without an actual MSVC toolchain. Behavior is
//! steered by environment variables rather than more flags, since real
//! compiler flags are already spoken for:
//! - `FAKE_CL_EXIT_CODE`: if set, exit with this code and do nothing else.
//! - `FAKE_CL_INCLUDES`: comma-separated header paths to report via
//!   `/showIncludes` notes (and which are hashed into the fake object).

use std::env;
use std::path::PathBuf;

fn main() {
    let argv: Vec<String> = env::args().skip(1).collect();

    if let Ok(code) = env::var("FAKE_CL_EXIT_CODE") {
        if let Ok(code) = code.parse::<i32>() {
            std::process::exit(code);
        }
    }

    let preprocessing = argv.iter().any(|a| matches!(a.as_str(), "/E" | "/EP" | "/P"));
    let show_includes = argv.iter().any(|a| a == "/showIncludes");

    let mut fo: Option<String> = None;
    let mut source: Option<String> = None;
    let mut i = 0;
    while i < argv.len() {
        let arg = &argv[i];
        if let Some(rest) = arg.strip_prefix("/Fo") {
            if rest.is_empty() {
                i += 1;
                fo = argv.get(i).cloned();
            } else {
                fo = Some(rest.to_string());
            }
        } else if !arg.starts_with('/') && !arg.starts_with('-') {
            source = Some(arg.clone());
        }
        i += 1;
    }

    let source = source.unwrap_or_else(|| "unknown.cpp".to_string());
    let basename = PathBuf::from(&source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());

    let includes: Vec<String> = env::var("FAKE_CL_INCLUDES")
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    if preprocessing {
        let source_text = std::fs::read_to_string(&source).unwrap_or_default();
        print!("{source_text}");
        std::process::exit(0);
    }

    let mut source_hash = std::fs::read(&source)
        .map(|bytes| bytes.iter().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u64)))
        .unwrap_or(0);
    for include in &includes {
        let bytes = std::fs::read(include).unwrap_or_default();
        source_hash = bytes
            .iter()
            .fold(source_hash, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u64));
    }

    let object_path = fo.unwrap_or_else(|| format!("{basename}.obj"));
    let object_path = if object_path.ends_with('/') || object_path.ends_with('\\') {
        format!("{object_path}{basename}.obj")
    } else {
        object_path
    };
    if let Some(parent) = PathBuf::from(&object_path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&object_path, source_hash.to_le_bytes());

    println!("{basename}.cpp");
    if show_includes {
        for include in &includes {
            println!("Note: including file: {include}");
        }
    }

    std::process::exit(0);
}
