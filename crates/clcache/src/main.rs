// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! clcache CLI entry point.
//!
//! Administrative flags (`-s`, `-c`, `-C`, `-z`, `-M`, `--help`) are
//! recognized directly from `argv` ahead of a compile request; anything
//! else is handed to [`Orchestrator::run`] verbatim, which is itself
//! responsible for bypassing the cache when `CLCACHE_DISABLE` is set.
//! Administrative commands exit 0/1 via [`ExitCode`]; a compile request
//! exits with the real compiler's own code, since callers (build systems)
//! depend on it verbatim.

use tracing_subscriber::{EnvFilter, fmt};

use clcache::cli::{self, AdminCommand, Invocation};
use clcache::compiler::SpawnedCompiler;
use clcache::env::RuntimeConfig;
use clcache::error::ExitCode;
use clcache::runner::Orchestrator;
use clcache::{Cache, Error};

fn init_logging(trace_log: bool) {
    let filter = EnvFilter::try_from_env("CLCACHE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if trace_log { "debug" } else { "off" }));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let config = RuntimeConfig::from_env();
    init_logging(config.trace_log);

    let code = match run(&config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("clcache: {e}");
            match e.downcast_ref::<Error>() {
                Some(err) => ExitCode::from(err) as i32,
                None => ExitCode::InternalError as i32,
            }
        }
    };

    std::process::exit(code);
}

/// Dispatch on the classified invocation. Returns the process exit code
/// directly rather than [`ExitCode`], since a compile request's exit
/// code is the real compiler's own and isn't one of the three
/// administrative values.
fn run(config: &RuntimeConfig) -> anyhow::Result<i32> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    match cli::parse_argv(&argv) {
        Ok(Invocation::Admin(cmd)) => Ok(run_admin(config, cmd)? as i32),
        Ok(Invocation::Compile(argv)) => run_compile(config, &argv),
        Err(message) => {
            eprintln!("clcache: {message}");
            Ok(ExitCode::ArgumentError as i32)
        }
    }
}

fn run_admin(config: &RuntimeConfig, cmd: AdminCommand) -> anyhow::Result<ExitCode> {
    match cmd {
        AdminCommand::Help => {
            cli::print_help();
            Ok(ExitCode::Success)
        }
        AdminCommand::Stats => {
            print_stats_report(config)?;
            Ok(ExitCode::Success)
        }
        AdminCommand::Clean => {
            let cache = Cache::open(config);
            let max = cache.maximum_cache_size()?;
            cache.clean(max)?;
            Ok(ExitCode::Success)
        }
        AdminCommand::ClearAll => {
            let cache = Cache::open(config);
            cache.clear_all()?;
            Ok(ExitCode::Success)
        }
        AdminCommand::Reset => {
            let cache = Cache::open(config);
            cache.with_stats(|s| s.reset())?;
            Ok(ExitCode::Success)
        }
        AdminCommand::SetMaxSize(bytes) => {
            let cache = Cache::open(config);
            cache.with_config(|c| c.set_maximum_cache_size(bytes))?;
            Ok(ExitCode::Success)
        }
    }
}

fn print_stats_report(config: &RuntimeConfig) -> anyhow::Result<()> {
    let cache = Cache::open(config);
    let (hits, misses, evicted, header_changed, source_changed, entries, size) =
        cache.with_stats(|s| {
            (
                s.num_cache_hits(),
                s.num_cache_misses(),
                s.num_evicted_misses(),
                s.num_header_changed_misses(),
                s.num_source_changed_misses(),
                s.num_cache_entries(),
                s.cache_size(),
            )
        })?;
    let max_size = cache.maximum_cache_size()?;

    println!("clcache statistics:");
    println!("  cache directory         {}", cache.root().display());
    println!("  cache hits              {hits}");
    println!("  cache misses            {misses}");
    println!("    evicted               {evicted}");
    println!("    header changed        {header_changed}");
    println!("    source changed        {source_changed}");
    println!("  cache entries           {entries}");
    println!("  cache size              {size}");
    println!("  cache max size          {max_size}");
    Ok(())
}

fn run_compile(config: &RuntimeConfig, argv: &[String]) -> anyhow::Result<i32> {
    let cache = Cache::open(config);
    let compiler = SpawnedCompiler;
    let orchestrator = Orchestrator::new(config, &cache, &compiler);
    let cwd = std::env::current_dir()?;

    let outcome = orchestrator.run(argv, &cwd)?;
    print!("{}", outcome.stdout);
    eprint!("{}", outcome.stderr);

    Ok(outcome.exit_code)
}
