//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::profiling::DEFAULT_PIN_DIR;

#[derive(Parser, Debug)]
#[command(
    name = "bawm",
    about = "Count kernel events per load domain into a pinned eBPF map",
    after_help = "\
EXAMPLES:
    sudo bawm                                Attach sensors until Ctrl-C
    sudo bawm --report-secs 3                Log the dominant load every 3s
    sudo bawm --unpin-on-exit --export c.json  Dump counters, then drop the store"
)]
pub struct Args {
    /// bpffs directory the counter store is pinned under
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PIN_DIR)]
    pub pin_dir: PathBuf,

    /// Remove the pinned counter store on exit
    #[arg(long)]
    pub unpin_on_exit: bool,

    /// Create all counter slots before attaching
    #[arg(long)]
    pub preregister: bool,

    /// Wake-up interval of the run loop in milliseconds
    #[arg(long, value_name = "MS", default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_ms: u64,

    /// Log counter deltas and the dominant load every N seconds (0 = off)
    #[arg(long, value_name = "SECS", default_value = "0")]
    pub report_secs: u64,

    /// Write the final counters to FILE as JSON
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
