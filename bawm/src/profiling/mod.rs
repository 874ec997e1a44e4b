//! Profiling core modules
//!
//! - Sensor table (program ↔ tracepoint ↔ domain)
//! - eBPF program loading and the aya sensor backend
//! - Counter store access (pre-registration, snapshots, unpinning)
//! - CPU utilities

pub mod cpu_utils;
pub mod ebpf_setup;
pub mod sensors;
pub mod store;

// Re-export common types
pub use cpu_utils::online_cpus;
pub use ebpf_setup::{AyaBackend, DEFAULT_PIN_DIR};
pub use sensors::{Sensor, SENSORS};
pub use store::{preregister, preregister_slots, read_snapshot, CounterTable};
