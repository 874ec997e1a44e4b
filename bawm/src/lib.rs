//! # bawm - Kernel-Event Counting Profiler
//!
//! bawm counts kernel events in five load domains (CPU context switches,
//! block I/O issue, page allocation, network enqueue, runnable threads) into
//! a pinned eBPF hash map that outlives the collector process.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    eBPF Programs (Kernel)                       │
//! │  sched_switch ×2 · sched_wakeup · block_rq_issue ·              │
//! │  mm_page_alloc · net_dev_queue                                  │
//! │         │ get_or_create + atomic add / clamped sub              │
//! │         ▼                                                       │
//! │  ┌──────────────────────────────┐                               │
//! │  │ bawm_counters (pinned hash)  │◀──── other readers            │
//! │  └──────────────────────────────┘                               │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ attach / detach, snapshots
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     bawm (This Crate)                           │
//! │  preflight → Collector (load → attach → wait → shutdown)        │
//! │                 │                                               │
//! │                 ▼                                               │
//! │  analysis (Snapshot, classify, Reporter) → export (JSON)        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`collector`]: attach lifecycle behind the [`SensorBackend`](collector::SensorBackend) seam
//! - [`profiling`]: sensor table, aya backend, counter store access
//! - [`analysis`]: snapshots, interval deltas, dominant-load classification
//! - [`export`]: JSON snapshot of the final counters
//! - [`preflight`]: privilege, kernel and bpffs checks
//! - [`cli`]: command-line arguments
//! - [`domain`]: core types and error taxonomy
//!
//! The counting protocol itself (keys, slot creation, clamped decrement,
//! handlers) lives in `bawm-common` and is shared with the eBPF object.

pub mod analysis;
pub mod cli;
pub mod collector;
pub mod domain;
pub mod export;
pub mod preflight;
pub mod profiling;
