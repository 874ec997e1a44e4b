//! # bawm - Main Entry Point
//!
//! Loads the sensors, attaches them all-or-nothing, prints a ready message,
//! and keeps them attached until SIGINT/SIGTERM. Runs with no flags; see
//! `bawm --help` for the optional ones.

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use std::time::{Duration, Instant};

use bawm::analysis::{classify, Reporter, Snapshot, Thresholds};
use bawm::cli::Args;
use bawm::collector::Collector;
use bawm::domain::{AttachError, LoadError};
use bawm::export::export_to_file;
use bawm::preflight::run_preflight_checks;
use bawm::profiling::{preregister, read_snapshot, AyaBackend, SENSORS};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_LOAD: i32 = 3;
const EXIT_ATTACH: i32 = 4;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<LoadError>().is_some() {
        return EXIT_LOAD;
    }
    if err.downcast_ref::<AttachError>().is_some() {
        return EXIT_ATTACH;
    }
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

#[tokio::main(flavor = "current_thread")]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    // Run pre-flight checks before anything else
    run_preflight_checks(&args.pin_dir)?;

    // ── Load: object + pinned store, then every program ─────────────────
    let mut backend = AyaBackend::open(&args.pin_dir, args.unpin_on_exit)?;
    if args.preregister {
        preregister(backend.ebpf_mut())?;
    }
    let mut collector = Collector::open_and_load(backend)?;

    // ── Attach all sensors or none ──────────────────────────────────────
    collector.attach()?;

    let baseline = match collector.backend() {
        Some(backend) => read_snapshot(backend.ebpf())?,
        None => Snapshot::default(),
    };

    if !quiet {
        println!("bawm v{}", env!("CARGO_PKG_VERSION"));
        println!("sensors: {} attached", SENSORS.len());
        println!("counters: {baseline}");
        println!("Program loaded and attached. Press Ctrl-C to exit.");
    }

    // ── Run until signaled ──────────────────────────────────────────────
    let thresholds = Thresholds::for_host();
    let mut reporter = (args.report_secs > 0)
        .then(|| Reporter::new(thresholds, Duration::from_secs(args.report_secs)));
    if let Some(reporter) = reporter.as_mut() {
        reporter.observe(baseline, Instant::now());
    }

    let reason = collector
        .run_until_signaled(Duration::from_millis(args.poll_ms), |backend| {
            let Some(reporter) = reporter.as_mut() else {
                return;
            };
            match read_snapshot(backend.ebpf()) {
                Ok(snapshot) => {
                    if let Some(report) = reporter.observe(snapshot, Instant::now()) {
                        println!("{report}");
                    }
                }
                Err(e) => warn!("Failed to read counters: {e:#}"),
            }
        })
        .await?;

    // ── Read-out and shutdown ───────────────────────────────────────────
    let final_counters = match collector.backend() {
        Some(backend) => Some(read_snapshot(backend.ebpf())?),
        None => None,
    };

    if let (Some(path), Some(counters)) = (&args.export, &final_counters) {
        let classification = classify(&counters.delta_since(&baseline), &thresholds);
        export_to_file(path, counters, classification).context("Failed to export counters")?;
        if !quiet {
            println!("saved: {}", path.display());
        }
    }

    collector.shutdown();

    if !quiet {
        match final_counters {
            Some(counters) => eprintln!("\n{reason}: {counters}"),
            None => eprintln!("\n{reason}"),
        }
    }

    Ok(())
}
