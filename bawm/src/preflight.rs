//! Pre-flight checks for bawm
//!
//! Validates system requirements before attempting to load eBPF programs.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Minimum kernel version: BPF atomic compare-and-swap landed in 5.12
const MIN_KERNEL_VERSION: (u32, u32) = (5, 12);

/// Run all pre-flight checks before eBPF loading
///
/// # Errors
/// Returns the first unmet requirement
pub fn run_preflight_checks(pin_dir: &Path) -> Result<()> {
    check_privileges()?;
    check_kernel_version()?;
    check_pin_dir(pin_dir)?;
    Ok(())
}

/// Check if running with sufficient privileges for eBPF
fn check_privileges() -> Result<()> {
    // Check if running as root
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    // CAP_BPF + CAP_PERFMON would be enough on 5.8+, but checking
    // capabilities needs another dependency; require root for now.
    bail!(
        "Permission denied: bawm requires root privileges to load eBPF programs.\n\n\
         Run with: sudo bawm"
    );
}

/// Parse "major.minor" out of a release string like "6.1.0-arch1-1"
fn parse_kernel_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor))
}

/// Check if the kernel version is sufficient for eBPF features
fn check_kernel_version() -> Result<()> {
    let version_str = std::fs::read_to_string("/proc/version")
        .context("Failed to read kernel version from /proc/version")?;

    // Parse version like "Linux version 5.15.0-generic ..." or "Linux version 6.1.0-arch1-1 ..."
    let release = version_str.split_whitespace().nth(2).unwrap_or("unknown");

    let Some((major, minor)) = parse_kernel_release(release) else {
        // Can't parse, assume it's fine
        return Ok(());
    };

    if (major, minor) < MIN_KERNEL_VERSION {
        bail!(
            "Kernel version {}.{} is too old.\n\n\
             bawm requires Linux {}.{} or newer for BPF atomic compare-and-swap.\n\
             Current kernel: {}",
            major,
            minor,
            MIN_KERNEL_VERSION.0,
            MIN_KERNEL_VERSION.1,
            release
        );
    }

    Ok(())
}

/// Check that the pin directory exists (bpffs mounted)
fn check_pin_dir(pin_dir: &Path) -> Result<()> {
    if !pin_dir.is_dir() {
        bail!(
            "Pin directory not found: {}\n\n\
             The counter store is pinned on a BPF filesystem. Mount one with:\n  \
             mount -t bpf bpf /sys/fs/bpf",
            pin_dir.display()
        );
    }
    Ok(())
}
