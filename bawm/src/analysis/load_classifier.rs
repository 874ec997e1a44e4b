//! Dominant-load classification
//!
//! Turns one interval's counter deltas into a single verdict. Each domain is
//! "high" when its delta reaches its threshold; the verdict picks the first
//! high domain in priority order NET, IO, CPU, MEM, and falls back to IDLE.
//! PARALLEL does not take part in the verdict; it is reported as saturated
//! when the runnable gauge reaches the number of online CPUs.

use std::fmt;

use log::warn;
use serde::Serialize;

use crate::analysis::Snapshot;
use crate::domain::Domain;
use crate::profiling::online_cpus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoadClass {
    Cpu,
    Io,
    Mem,
    Net,
    Idle,
}

impl fmt::Display for LoadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadClass::Cpu => "CPU",
            LoadClass::Io => "IO",
            LoadClass::Mem => "MEM",
            LoadClass::Net => "NET",
            LoadClass::Idle => "IDLE",
        };
        f.write_str(label)
    }
}

/// Per-domain "high load" thresholds for one reporting interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub cpu: u64,
    pub io: u64,
    pub mem: u64,
    pub net: u64,
    /// Runnable threads at which the host counts as saturated
    pub parallel: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { cpu: 1000, io: 1000, mem: 2000, net: 1000, parallel: 1 }
    }
}

impl Thresholds {
    /// Defaults with the PARALLEL threshold set to the online CPU count
    #[must_use]
    pub fn for_host() -> Self {
        let parallel = match online_cpus() {
            Ok(cpus) if !cpus.is_empty() => cpus.len() as u64,
            Ok(_) => 1,
            Err(e) => {
                warn!("{e:#}; assuming a single CPU for the parallel threshold");
                1
            }
        };
        Self { parallel, ..Self::default() }
    }

    #[must_use]
    pub fn get(&self, domain: Domain) -> u64 {
        match domain {
            Domain::Cpu => self.cpu,
            Domain::Io => self.io,
            Domain::Mem => self.mem,
            Domain::Net => self.net,
            Domain::Parallel => self.parallel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub load: LoadClass,
    pub parallel_saturated: bool,
}

const PRIORITY: [(Domain, LoadClass); 4] = [
    (Domain::Net, LoadClass::Net),
    (Domain::Io, LoadClass::Io),
    (Domain::Cpu, LoadClass::Cpu),
    (Domain::Mem, LoadClass::Mem),
];

/// Classify one interval's deltas
#[must_use]
pub fn classify(delta: &Snapshot, thresholds: &Thresholds) -> Classification {
    let is_high = |domain: Domain| delta.value(domain) >= thresholds.get(domain);

    let load = PRIORITY
        .iter()
        .find(|(domain, _)| is_high(*domain))
        .map_or(LoadClass::Idle, |(_, class)| *class);

    Classification { load, parallel_saturated: is_high(Domain::Parallel) }
}
