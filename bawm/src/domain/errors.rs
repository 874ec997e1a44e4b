//! Structured error types for bawm
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Event-context failures never reach userspace; everything here is fatal to
//! the collector and maps to a distinct exit code in `main`.

use thiserror::Error;

/// The eBPF object, a program, or the counter store could not be materialized
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to load eBPF object: {0}")]
    Object(String),

    #[error("Program {0} not found in eBPF object")]
    ProgramMissing(String),

    #[error("Program {program} rejected by the kernel: {error}")]
    Verification { program: String, error: String },

    #[error("Counter store {0} not found in eBPF object")]
    StoreMissing(String),

    #[error("Failed to prepare counter store: {0}")]
    Store(String),
}

/// A program could not be wired to (or unwired from) its tracepoint
#[derive(Error, Debug)]
pub enum AttachError {
    #[error("Failed to attach {program} to {tracepoint}: {error}")]
    Attach { program: String, tracepoint: String, error: String },

    #[error("Failed to detach {program}: {error}")]
    Detach { program: String, error: String },

    #[error("Collector has already been shut down")]
    ShutDown,
}

/// The run loop could not wait for its stop signal
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write snapshot file: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
