// crates/timetrace-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use timetrace_core::{
    config::{PluginArg, TraceOptions},
    generator::generate_run,
    io::{stream_event_log_auto, trace_path_for, write_event_log_auto, write_trace_file},
    log::Replay,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Name the options are registered under (`-fplugin-arg-timetrace-...`).
const PLUGIN: &str = "timetrace";

#[derive(Parser, Debug)]
#[command(
    name = "timetrace",
    about = "Compile-phase timeline tool",
    long_about = "Compile-phase timeline tool.\n\nReplay recorded compiler events into Chrome trace-event documents, generate synthetic runs, and summarize traces.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Correlate a recorded event log and write its trace document.
    Replay {
        /// Input event log (JSON/JSONL/CBOR)
        #[arg(long)]
        events: PathBuf,

        /// Output trace path (default: `<events>.trace.json`)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Plugin option as `key[=value]`, e.g. `verbose-decl=2`; repeatable
        #[arg(long = "plugin-arg", value_name = "KEY[=VALUE]")]
        plugin_args: Vec<PluginArg>,

        /// Host compiler version the log was recorded with
        #[arg(long, requires = "built_for")]
        host_version: Option<String>,

        /// Compiler version the recording plugin was built for
        #[arg(long, requires = "host_version")]
        built_for: Option<String>,
    },

    /// Generate a synthetic, well-formed compile run as an event log.
    /// If --out ends with `.jsonl`, writes NDJSON for streaming.
    Simulate {
        /// Number of functions (>0)
        #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u32).range(1..))]
        functions: u32,

        /// Maximum header nesting depth
        #[arg(long, default_value_t = 3)]
        depth: u8,

        /// RNG seed
        #[arg(long, default_value_t = 2024)]
        seed: u64,

        /// Output event log path (CBOR/JSON/JSONL)
        #[arg(long, default_value = "events.jsonl")]
        out: PathBuf,
    },

    /// Summarize a trace document.
    Inspect {
        /// Input trace document
        #[arg(long)]
        trace: PathBuf,

        /// Number of longest intervals to list
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Replay {
            events,
            out,
            plugin_args,
            host_version,
            built_for,
        } => {
            let versions = built_for.as_deref().zip(host_version.as_deref());
            replay(events, out, &plugin_args, versions)
        }

        Cmd::Simulate {
            functions,
            depth,
            seed,
            out,
        } => simulate(functions, depth, seed, out),

        Cmd::Inspect { trace, top } => inspect(trace, top),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn replay(
    events: PathBuf,
    out: Option<PathBuf>,
    plugin_args: &[PluginArg],
    versions: Option<(&str, &str)>,
) -> Result<()> {
    let options = TraceOptions::from_plugin_args(PLUGIN, plugin_args)?;
    if let Some((built_for, host)) = versions {
        options.check_version(PLUGIN, built_for, host)?;
    }
    let out = out.unwrap_or_else(|| trace_path_for(&events));

    info!(events=%events.display(), out=%out.display(), verbosity=%options.decl_verbosity, "replaying event log");
    let stream = stream_event_log_auto(&events).context("open event log")?;
    let mut replay = Replay::new();
    replay
        .apply_all(stream)
        .with_context(|| format!("reading {}", events.display()))?;
    let (session, names) = replay.finish();

    let stats = write_trace_file(&out, session, names, options.decl_verbosity)?;
    println!(
        "Replayed {} → {} ({} entries, {} matched, {} unmatched)",
        events.display(),
        out.display(),
        stats.entries,
        stats.matches,
        stats.mismatches
    );
    Ok(())
}

fn simulate(functions: u32, depth: u8, seed: u64, out: PathBuf) -> Result<()> {
    info!(functions, depth, seed, "generating synthetic compile run");
    let events = generate_run(functions, depth, seed);
    let n = events.len();

    write_event_log_auto(&out, events)
        .with_context(|| format!("writing event log to {}", out.display()))?;

    println!(
        "Simulated run: functions={functions}, depth={depth}, seed={seed} → {n} lines → {}",
        out.display()
    );
    Ok(())
}

/// Suffixes the writer appends to unmatched events.
const ORPHAN_SUFFIXES: [&str; 6] = [
    " (start)",
    " (end)",
    " (enter)",
    " (leave)",
    " (finish)",
    " (cancelled)",
];

fn inspect(trace: PathBuf, top: usize) -> Result<()> {
    info!(trace=%trace.display(), "inspecting trace");
    let bytes = std::fs::read(&trace).with_context(|| format!("open {}", trace.display()))?;
    let doc: Value = serde_json::from_slice(&bytes).context("parse trace document")?;
    let Some(entries) = doc.as_array() else {
        bail!("{} is not a trace-event array", trace.display());
    };

    let mut intervals = Vec::new();
    let (mut instants, mut orphans) = (0usize, 0usize);
    for e in entries {
        let name = e["name"].as_str().unwrap_or_default();
        if ORPHAN_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            orphans += 1;
        }
        match (e["ph"].as_str(), e["dur"].as_f64()) {
            (Some("X"), Some(dur)) => intervals.push((dur, name)),
            _ => instants += 1,
        }
    }

    println!(
        "{}: {} entries ({} intervals, {} instants, {} unmatched)",
        trace.display(),
        entries.len(),
        intervals.len(),
        instants,
        orphans
    );

    intervals.sort_by(|a, b| b.0.total_cmp(&a.0));
    for (dur, name) in intervals.into_iter().take(top) {
        println!("  {dur:>12.3} us  {name}");
    }
    Ok(())
}
