//! `#include` trace parser (component K).
//!
//! Parses `/showIncludes` diagnostic lines: a word, a colon, a space, a
//! translated phrase of letters and spaces, a colon, one or more
//! spaces, then the header path starting at the first non-whitespace
//! character. The phrase is locale-dependent (`Note: including file:`
//! in English, but translated in other languages), so only its shape
//! is matched, never its exact text.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static INCLUDE_NOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\S+:\s+[\p{L} ]+:\s+(\S.*?)\s*$").expect("valid regex"));

/// Parse `#include` notes out of `compiler_output`, returning the
/// lowercased, deduplicated header paths in compiler discovery order,
/// and (when `strip` is set) the output with every matching line removed.
///
/// `source_file` is excluded from the returned set even if it happens to
/// appear in a note (it never legitimately would, but defends against a
/// self-referential edge case in pathological compiler output).
pub fn parse_includes(
    compiler_output: &str,
    source_file: &str,
    strip: bool,
) -> (Vec<String>, String) {
    let source_lower = source_file.to_lowercase();
    let mut includes = Vec::new();
    let mut kept_lines = Vec::new();

    for line in compiler_output.lines() {
        if let Some(captures) = INCLUDE_NOTE.captures(line) {
            let path = captures[1].to_lowercase();
            if path != source_lower && !includes.contains(&path) {
                includes.push(path);
            }
            if !strip {
                kept_lines.push(line);
            }
        } else {
            kept_lines.push(line);
        }
    }

    let mut output = kept_lines.join("\n");
    if compiler_output.ends_with('\n') && !output.is_empty() {
        output.push('\n');
    }
    (includes, output)
}

/// Whether `/showIncludes` notes should be read from stderr instead of
/// stdout: true when any of `/E`, `/EP`, `/P` is among the flags.
pub fn includes_on_stderr(argv: &[String]) -> bool {
    argv.iter()
        .any(|a| matches!(a.as_str(), "/E" | "/EP" | "/P"))
}

#[cfg(test)]
#[path = "includes_tests.rs"]
mod tests;
