//! Counter snapshot export
//!
//! Writes the final state of the counter store as JSON so it can be compared
//! across runs or fed to other tools.
//!
//! ```json
//! {
//!   "counters": { "cpu": 1204, "io": 31, "mem": 880, "parallel": 3 },
//!   "load": "CPU",
//!   "parallel_saturated": false
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::analysis::{Classification, LoadClass, Snapshot};
use crate::domain::ExportError;

#[derive(Serialize)]
struct SnapshotExport {
    counters: BTreeMap<&'static str, u64>,
    load: LoadClass,
    parallel_saturated: bool,
}

/// Serialize `counters` and their classification to `writer`
///
/// Absent slots are omitted from `counters`.
///
/// # Errors
/// Returns an error if serialization or the write fails
pub fn export_snapshot<W: Write>(
    mut writer: W,
    counters: &Snapshot,
    classification: Classification,
) -> Result<(), ExportError> {
    let export = SnapshotExport {
        counters: counters.iter().map(|(domain, value)| (domain.name(), value)).collect(),
        load: classification.load,
        parallel_saturated: classification.parallel_saturated,
    };
    serde_json::to_writer_pretty(&mut writer, &export)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// [`export_snapshot`] into a newly created file at `path`
///
/// # Errors
/// Returns [`ExportError::WriteFailed`] if the file cannot be created
pub fn export_to_file(
    path: &Path,
    counters: &Snapshot,
    classification: Classification,
) -> Result<(), ExportError> {
    let file = File::create(path)
        .map_err(|e| ExportError::WriteFailed(format!("{}: {e}", path.display())))?;
    export_snapshot(BufWriter::new(file), counters, classification)
}
