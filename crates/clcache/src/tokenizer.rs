//! Command-line tokenizing and response-file expansion (component B).
//!
//! `split_commands_file` implements the MSVC/CRT argv quoting rules: a
//! backslash run is only special when it is immediately followed by a
//! `"`; an even run collapses to half as many backslashes and toggles
//! the quoted region, an odd run collapses to half (rounded down) plus
//! one literal `"` with no toggle. Whitespace (space, tab, CR, LF)
//! splits tokens only outside a quoted region.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Split response-file (or `CL`/`_CL_`) text into argv-style tokens.
pub fn split_commands_file(content: &str) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    let n = chars.len();

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut has_current = false;
    let mut quoted = false;
    let mut i = 0;

    while i < n {
        let c = chars[i];

        if !quoted && matches!(c, ' ' | '\t' | '\n' | '\r') {
            if has_current {
                tokens.push(std::mem::take(&mut current));
                has_current = false;
            }
            i += 1;
            continue;
        }

        if c == '\\' {
            let mut count = 0;
            while i < n && chars[i] == '\\' {
                count += 1;
                i += 1;
            }
            has_current = true;
            if i < n && chars[i] == '"' {
                current.extend(std::iter::repeat('\\').take(count / 2));
                if count % 2 == 1 {
                    current.push('"');
                } else {
                    quoted = !quoted;
                }
                i += 1;
            } else {
                current.extend(std::iter::repeat('\\').take(count));
            }
            continue;
        }

        if c == '"' {
            quoted = !quoted;
            has_current = true;
            i += 1;
            continue;
        }

        current.push(c);
        has_current = true;
        i += 1;
    }

    if has_current {
        tokens.push(current);
    }

    tokens
}

const MAX_RESPONSE_FILE_DEPTH: usize = 64;

/// Recursively expand `@file` response-file tokens in `argv`.
///
/// Response files are decoded with a BOM sniff (UTF-32/UTF-16, either
/// endianness, else UTF-8) before being re-split and re-scanned for
/// further `@file` tokens. Recursion is bounded; a response file that
/// references itself past the bound is left unexpanded rather than
/// looping forever.
pub fn expand_command_line(argv: &[String]) -> Result<Vec<String>> {
    expand_command_line_at_depth(argv, 0)
}

fn expand_command_line_at_depth(argv: &[String], depth: usize) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(argv.len());
    for arg in argv {
        match arg.strip_prefix('@') {
            Some(filename) if depth < MAX_RESPONSE_FILE_DEPTH => {
                let path = PathBuf::from(filename);
                let bytes = std::fs::read(&path).map_err(|source| {
                    if source.kind() == std::io::ErrorKind::NotFound {
                        Error::NotFound(path.clone())
                    } else {
                        Error::Io { path: path.clone(), source }
                    }
                })?;
                let text = decode_response_file(&bytes);
                let tokens = split_commands_file(&text);
                out.extend(expand_command_line_at_depth(&tokens, depth + 1)?);
            }
            _ => out.push(arg.clone()),
        }
    }
    Ok(out)
}

/// Decode response-file bytes, sniffing a BOM to pick the encoding.
///
/// Falls back to UTF-8 (lossy) when no recognized BOM is present, which
/// also covers the common no-BOM UTF-8 case.
fn decode_response_file(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        return decode_utf32(&bytes[4..], u32::from_be_bytes);
    }
    if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        return decode_utf32(&bytes[4..], u32::from_le_bytes);
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return decode_utf16(&bytes[2..], u16::from_be_bytes);
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return decode_utf16(&bytes[2..], u16::from_le_bytes);
    }
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn decode_utf32(bytes: &[u8], from_bytes: fn([u8; 4]) -> u32) -> String {
    bytes
        .chunks_exact(4)
        .filter_map(|chunk| {
            let arr = [chunk[0], chunk[1], chunk[2], chunk[3]];
            char::from_u32(from_bytes(arr))
        })
        .collect()
}

fn decode_utf16(bytes: &[u8], from_bytes: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| from_bytes([chunk[0], chunk[1]]))
        .collect();
    char::decode_utf16(units)
        .map(|r| r.unwrap_or('\u{FFFD}'))
        .collect()
}

/// Prepend `CL` and append `_CL_` environment-variable tokens around `argv`,
/// matching the real compiler driver's own response-file-like convention.
pub fn extend_command_line_from_environment(
    argv: &[String],
    cl: Option<&str>,
    cl_extra: Option<&str>,
) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(cl) = cl {
        out.extend(split_commands_file(cl));
    }
    out.extend(argv.iter().cloned());
    if let Some(extra) = cl_extra {
        out.extend(split_commands_file(extra));
    }
    out
}

#[cfg(test)]
#[path = "tokenizer_tests.rs"]
mod tests;
