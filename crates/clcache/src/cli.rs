// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface (component: Ambient CLI surface).
//!
//! clcache's argv is a hosting shim around `cl.exe`: invoked as
//! `clcache foo.cpp /Fooutput.obj` there is no subcommand, `foo.cpp` is
//! just another compiler argument. Administrative commands are
//! recognized by an exact match against the leading argument(s) before
//! anything reaches clap's derive parser, which would otherwise choke on
//! (or silently misparse) a `/Fo...`-shaped compiler flag as an unknown
//! option. [`Cli`] exists only to generate `--help` text; the actual
//! classification happens in [`parse_argv`].

use clap::{CommandFactory, Parser};

/// Administrative commands recognized ahead of a compile request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    /// `-s`: print the statistics report.
    Stats,
    /// `-c`: evict down to the configured maximum size.
    Clean,
    /// `-C`: evict everything.
    ClearAll,
    /// `-z`: reset resettable counters.
    Reset,
    /// `-M N`: set `MaximumCacheSize` to N bytes.
    SetMaxSize(u64),
    /// `--help`/`-h`: print usage and exit.
    Help,
}

/// What the raw argv resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Admin(AdminCommand),
    /// Not recognized as an administrative command: forward untouched
    /// to the analyzer/orchestrator.
    Compile(Vec<String>),
}

/// clap surface used solely to render `--help`/`--version`; never used
/// to parse a live argv (see module docs for why).
#[derive(Parser)]
#[command(name = "clcache")]
#[command(version, about = "Compiler cache for the Microsoft C/C++ compiler", long_about = None)]
pub struct Cli {
    /// Print the statistics report
    #[arg(short = 's')]
    pub stats: bool,
    /// Evict the cache down to its configured maximum size
    #[arg(short = 'c')]
    pub clean: bool,
    /// Evict the cache entirely
    #[arg(short = 'C')]
    pub clear_all: bool,
    /// Reset resettable statistics counters
    #[arg(short = 'z')]
    pub reset: bool,
    /// Set the maximum cache size, in bytes
    #[arg(short = 'M', value_name = "BYTES")]
    pub max_size: Option<u64>,
}

/// Classify `argv` (program name already stripped) as an administrative
/// command, or as a compile request to forward untouched.
///
/// Returns `Err` only for a recognized administrative flag given a bad
/// argument (`-M` with a non-numeric or zero size); anything that
/// doesn't match an administrative flag exactly is assumed to be a
/// compiler argument, however `-`/`/`-shaped it looks.
pub fn parse_argv(argv: &[String]) -> Result<Invocation, String> {
    match argv.first().map(String::as_str) {
        Some("--help") | Some("-h") if argv.len() == 1 => Ok(Invocation::Admin(AdminCommand::Help)),
        Some("-s") if argv.len() == 1 => Ok(Invocation::Admin(AdminCommand::Stats)),
        Some("-c") if argv.len() == 1 => Ok(Invocation::Admin(AdminCommand::Clean)),
        Some("-C") if argv.len() == 1 => Ok(Invocation::Admin(AdminCommand::ClearAll)),
        Some("-z") if argv.len() == 1 => Ok(Invocation::Admin(AdminCommand::Reset)),
        Some("-M") if argv.len() == 2 => {
            let raw = &argv[1];
            let bytes: u64 = raw
                .parse()
                .map_err(|_| format!("-M argument must be a positive integer: {raw}"))?;
            if bytes < 1 {
                return Err("-M argument must be at least 1".to_string());
            }
            Ok(Invocation::Admin(AdminCommand::SetMaxSize(bytes)))
        }
        Some("-M") => Err("-M requires exactly one argument".to_string()),
        _ => Ok(Invocation::Compile(argv.to_vec())),
    }
}

/// Print `--help` via clap's generated usage text.
pub fn print_help() {
    let _ = Cli::command().print_help();
    println!();
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
