//! # eBPF Program Loading and Attachment
//!
//! Loads compiled eBPF bytecode, pins the counter store, and attaches the
//! sensor programs to their kernel tracepoints.
//!
//! ## Functions
//!
//! - [`load_ebpf_program()`] - Load eBPF bytecode with the store pinned under a bpffs dir
//! - [`AyaBackend`] - [`SensorBackend`] over an [`Ebpf`] object
//!
//! ## Attachment Points
//!
//! All sensors are tracepoints; see [`SENSORS`](super::SENSORS).

use std::path::{Path, PathBuf};

use aya::{
    include_bytes_aligned,
    programs::{trace_point::TracePointLinkId, TracePoint},
    Ebpf, EbpfLoader,
};
use aya_log::EbpfLogger;
use log::{info, warn};

use crate::collector::SensorBackend;
use crate::domain::{AttachError, LoadError};
use crate::profiling::{store, Sensor};

/// Default bpffs directory the counter store is pinned under
pub const DEFAULT_PIN_DIR: &str = "/sys/fs/bpf";

/// Load the eBPF program binary
///
/// The counter map is declared pinned-by-name, so the loader either reuses an
/// existing pin under `pin_dir` or creates and pins a fresh map there.
///
/// Always uses the release build because debug builds with recent Rust nightlies (1.94+)
/// pull in formatting code (`LowerHex`) that's incompatible with BPF.
///
/// # Errors
/// Returns [`LoadError::Object`] if the object cannot be parsed or its maps created
pub fn load_ebpf_program(pin_dir: &Path) -> Result<Ebpf, LoadError> {
    EbpfLoader::new()
        .map_pin_path(pin_dir)
        .load(include_bytes_aligned!("../../../target/bpfel-unknown-none/release/bawm"))
        .map_err(|e| LoadError::Object(e.to_string()))
}

/// Forward kernel-side debug records to `log`
fn init_ebpf_logger(bpf: &mut Ebpf) {
    if let Err(e) = EbpfLogger::init(bpf) {
        warn!("Failed to initialize eBPF logger: {e}");
    }
}

/// Sensor backend driving real tracepoints through aya
pub struct AyaBackend {
    bpf: Ebpf,
    pin_dir: PathBuf,
    unpin_on_exit: bool,
}

impl AyaBackend {
    /// Load the eBPF object and open the pinned counter store
    ///
    /// # Errors
    /// Returns [`LoadError`] if the object cannot be loaded
    pub fn open(pin_dir: &Path, unpin_on_exit: bool) -> Result<Self, LoadError> {
        let mut bpf = load_ebpf_program(pin_dir)?;
        init_ebpf_logger(&mut bpf);
        info!("✓ Counter store pinned at {}", store::pin_path(pin_dir).display());
        Ok(Self { bpf, pin_dir: pin_dir.to_path_buf(), unpin_on_exit })
    }

    #[must_use]
    pub fn ebpf(&self) -> &Ebpf {
        &self.bpf
    }

    pub fn ebpf_mut(&mut self) -> &mut Ebpf {
        &mut self.bpf
    }

    fn tracepoint(&mut self, program: &str) -> Result<&mut TracePoint, String> {
        self.bpf
            .program_mut(program)
            .ok_or_else(|| format!("{program} program not found"))?
            .try_into()
            .map_err(|e: aya::programs::ProgramError| e.to_string())
    }
}

impl SensorBackend for AyaBackend {
    type Link = TracePointLinkId;

    fn load(&mut self, sensor: &Sensor) -> Result<(), LoadError> {
        let program =
            self.tracepoint(sensor.program).map_err(|_| LoadError::ProgramMissing(sensor.program.to_string()))?;
        program.load().map_err(|e| LoadError::Verification {
            program: sensor.program.to_string(),
            error: e.to_string(),
        })
    }

    fn attach(&mut self, sensor: &Sensor) -> Result<Self::Link, AttachError> {
        let attach_err = |error: String| AttachError::Attach {
            program: sensor.program.to_string(),
            tracepoint: sensor.tracepoint.to_string(),
            error,
        };
        let program = self.tracepoint(sensor.program).map_err(attach_err)?;
        program
            .attach(sensor.tracepoint.category, sensor.tracepoint.name)
            .map_err(|e| attach_err(e.to_string()))
    }

    fn detach(&mut self, sensor: &Sensor, link: Self::Link) -> Result<(), AttachError> {
        let detach_err = |error: String| AttachError::Detach { program: sensor.program.to_string(), error };
        let program = self.tracepoint(sensor.program).map_err(detach_err)?;
        program.detach(link).map_err(|e| detach_err(e.to_string()))
    }

    /// Drop the object, closing every program and map fd
    ///
    /// The pinned store survives unless `unpin_on_exit` was requested.
    fn release(self) {
        let Self { bpf, pin_dir, unpin_on_exit } = self;
        drop(bpf);
        if unpin_on_exit {
            match store::unpin(&pin_dir) {
                Ok(true) => info!("✓ Unpinned {}", store::pin_path(&pin_dir).display()),
                Ok(false) => warn!("Counter store was not pinned under {}", pin_dir.display()),
                Err(e) => warn!("Failed to unpin counter store: {e}"),
            }
        }
    }
}
