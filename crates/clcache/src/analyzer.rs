//! Command-line analyzer (component C).
//!
//! Classifies each flag-prefixed token into one of four argument shapes
//! (longest flag-name match wins) and walks the fixed decision tree that
//! turns a raw argv into either a set of input files plus a derived
//! object-file path, or a closed-set [`AnalysisError`].
//!
//! The flag table below only lists the flags this decision tree actually
//! inspects. The real compiler accepts hundreds more; every token that
//! doesn't match a known name is treated as an opaque, ignored flag
//! rather than an error, since this cache only needs to agree with the
//! compiler on the handful of flags that change its own behavior.

use std::path::{Path, PathBuf};

use crate::error::AnalysisError;
use crate::hash::{basename_without_extension, normalize_path};

/// A flag-table entry: which shape governs how its value is extracted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgumentShape {
    /// `/NAMEp` — value required, attached, non-empty.
    T1(String),
    /// `/NAME[p]` — value optional, attached.
    T2(String),
    /// `/NAME[ ]p` — value required, attached or from the next token.
    T3(String),
    /// `/NAME p` — value required, always from the next token.
    T4(String),
}

impl ArgumentShape {
    /// The exact flag name this shape was classified under.
    pub(crate) fn name(&self) -> &str {
        match self {
            Self::T1(n) | Self::T2(n) | Self::T3(n) | Self::T4(n) => n,
        }
    }
}

const FLAG_TABLE: &[(&str, fn(String) -> ArgumentShape)] = &[
    ("showIncludes", ArgumentShape::T2),
    ("Zi", ArgumentShape::T2),
    ("EP", ArgumentShape::T2),
    ("EH", ArgumentShape::T2),
    ("Tc", ArgumentShape::T1),
    ("Tp", ArgumentShape::T1),
    ("Fo", ArgumentShape::T3),
    ("MP", ArgumentShape::T2),
    ("Yc", ArgumentShape::T2),
    ("Yu", ArgumentShape::T2),
    ("E", ArgumentShape::T2),
    ("P", ArgumentShape::T2),
    ("c", ArgumentShape::T2),
];

enum Classified {
    InputFile,
    Link,
    Unknown,
    Known(ArgumentShape, Option<String>),
}

/// Match `body` against every name in `table`, returning the shape
/// constructed from the *longest* matching name and the text left over
/// after it. Longest-match-wins is what keeps a short name (`E`) from
/// swallowing an unrelated longer one that happens to share its prefix
/// (`EH`, as in `/EHsc`).
pub(crate) fn longest_flag_match<'a>(
    body: &'a str,
    table: &[(&str, fn(String) -> ArgumentShape)],
) -> Option<(ArgumentShape, &'a str)> {
    table
        .iter()
        .filter_map(|(name, ctor)| body.strip_prefix(name).map(|rest| (*name, *ctor, rest)))
        .max_by_key(|(name, _, _)| name.len())
        .map(|(name, ctor, rest)| (ctor(name.to_string()), rest))
}

fn classify_one(tokens: &[String], i: usize) -> Result<(Classified, usize), AnalysisError> {
    let token = &tokens[i];

    if token.eq_ignore_ascii_case("link") {
        return Ok((Classified::Link, 1));
    }

    if !token.starts_with('/') && !token.starts_with('-') {
        return Ok((Classified::InputFile, 1));
    }

    let body = &token[1..];
    if let Some((shape, rest)) = longest_flag_match(body, FLAG_TABLE) {
        return match &shape {
            ArgumentShape::T1(_) => {
                if rest.is_empty() {
                    Err(AnalysisError::InvalidArgument(token.clone()))
                } else {
                    Ok((Classified::Known(shape, Some(rest.to_string())), 1))
                }
            }
            ArgumentShape::T2(_) => {
                let value = if rest.is_empty() { None } else { Some(rest.to_string()) };
                Ok((Classified::Known(shape, value), 1))
            }
            ArgumentShape::T3(_) => {
                if !rest.is_empty() {
                    Ok((Classified::Known(shape, Some(rest.to_string())), 1))
                } else if let Some(next) = tokens.get(i + 1) {
                    Ok((Classified::Known(shape, Some(next.clone())), 2))
                } else {
                    Err(AnalysisError::InvalidArgument(token.clone()))
                }
            }
            ArgumentShape::T4(_) => {
                if let Some(next) = tokens.get(i + 1) {
                    Ok((Classified::Known(shape, Some(next.clone())), 2))
                } else {
                    Err(AnalysisError::InvalidArgument(token.clone()))
                }
            }
        };
    }

    Ok((Classified::Unknown, 1))
}

struct ParsedCommandLine {
    input_files: Vec<String>,
    present: std::collections::HashSet<String>,
    fo_value: Option<String>,
    mp: Option<Option<u32>>,
    tc_tp_present: bool,
    link_present: bool,
}

impl ParsedCommandLine {
    fn flag_present(&self, name: &str) -> bool {
        self.present.contains(name)
    }
}

fn parse(argv: &[String]) -> Result<ParsedCommandLine, AnalysisError> {
    let mut parsed = ParsedCommandLine {
        input_files: Vec::new(),
        present: std::collections::HashSet::new(),
        fo_value: None,
        mp: None,
        tc_tp_present: false,
        link_present: false,
    };

    let mut i = 0;
    while i < argv.len() {
        let (classified, consumed) = classify_one(argv, i)?;
        match classified {
            Classified::InputFile => parsed.input_files.push(argv[i].clone()),
            Classified::Link => parsed.link_present = true,
            Classified::Unknown => {}
            Classified::Known(shape, value) => {
                let name = match &shape {
                    ArgumentShape::T1(n)
                    | ArgumentShape::T2(n)
                    | ArgumentShape::T3(n)
                    | ArgumentShape::T4(n) => n.clone(),
                };
                parsed.present.insert(name.clone());
                match name.as_str() {
                    "Fo" => parsed.fo_value = value,
                    "Tc" | "Tp" => parsed.tc_tp_present = true,
                    "MP" => parsed.mp = Some(value.and_then(|v| v.parse::<u32>().ok())),
                    _ => {}
                }
            }
        }
        i += consumed;
    }

    Ok(parsed)
}

/// The result of a successful [`analyze`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedRequest {
    /// Every input (non-flag, non-response-file) token, in argv order.
    pub input_files: Vec<PathBuf>,
    /// Derived object-file destination; only set for a single input file.
    pub object_file: Option<PathBuf>,
    /// Parsed `/MP[N]` flag: absent, present with no N, or present with N.
    pub mp: Option<Option<u32>>,
}

/// Classify `argv` per the fixed decision tree, or return the first
/// [`AnalysisError`] that applies. `cwd` is only consulted to resolve
/// whether a `/Fo` value names an existing directory (§4.C step 8).
pub fn analyze(argv: &[String], cwd: &Path) -> Result<AnalyzedRequest, AnalysisError> {
    let parsed = parse(argv)?;

    if parsed.input_files.is_empty() {
        return Err(AnalysisError::NoSourceFile);
    }
    if parsed.flag_present("E") || parsed.flag_present("EP") || parsed.flag_present("P") {
        return Err(AnalysisError::CalledForPreprocessing);
    }
    if parsed.flag_present("Zi") {
        return Err(AnalysisError::ExternalDebugInfo);
    }
    if parsed.flag_present("Yc") || parsed.flag_present("Yu") {
        return Err(AnalysisError::CalledWithPch);
    }
    if parsed.link_present || !parsed.flag_present("c") {
        return Err(AnalysisError::CalledForLink);
    }
    if parsed.input_files.len() > 1 && parsed.tc_tp_present {
        return Err(AnalysisError::MultipleSourceFilesComplex);
    }

    let input_files: Vec<PathBuf> = parsed.input_files.iter().map(PathBuf::from).collect();

    if input_files.len() > 1 {
        return Ok(AnalyzedRequest {
            input_files,
            object_file: None,
            mp: parsed.mp,
        });
    }

    let object_file = derive_object_file(&input_files[0], parsed.fo_value.as_deref(), cwd);
    Ok(AnalyzedRequest {
        input_files,
        object_file: Some(object_file),
        mp: parsed.mp,
    })
}

/// `/Fo`'s value names the destination object file directly unless it
/// names a directory (trailing separator, or an existing directory on
/// disk), in which case the source's basename is appended to it.
fn derive_object_file(source: &Path, fo_value: Option<&str>, cwd: &Path) -> PathBuf {
    match fo_value {
        Some(value) => {
            let normalized = normalize_path(value);
            let names_directory = normalized.ends_with('/') || {
                let candidate = Path::new(value);
                let resolved = if candidate.is_absolute() {
                    candidate.to_path_buf()
                } else {
                    cwd.join(candidate)
                };
                resolved.is_dir()
            };
            if names_directory {
                let basename = basename_without_extension(&source.to_string_lossy());
                let sep = if normalized.ends_with('/') { "" } else { "/" };
                PathBuf::from(format!("{normalized}{sep}{basename}.obj"))
            } else {
                PathBuf::from(value)
            }
        }
        None => {
            let basename = basename_without_extension(&source.to_string_lossy());
            PathBuf::from(format!("{basename}.obj"))
        }
    }
}

#[cfg(test)]
#[path = "analyzer_tests.rs"]
mod tests;
