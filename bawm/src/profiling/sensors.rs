//! Sensor table
//!
//! One entry per eBPF program: which tracepoint it hooks and which domain it
//! counts. The order is the attach order; detach runs in reverse.

use crate::domain::{Domain, Tracepoint};

/// A (domain, kernel event point) pair backed by one eBPF program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sensor {
    /// Program name in the eBPF object
    pub program: &'static str,
    pub tracepoint: Tracepoint,
    pub domain: Domain,
}

pub const SENSORS: [Sensor; 6] = [
    Sensor {
        program: "cpu_sched_switch",
        tracepoint: Tracepoint { category: "sched", name: "sched_switch" },
        domain: Domain::Cpu,
    },
    Sensor {
        program: "io_block_rq_issue",
        tracepoint: Tracepoint { category: "block", name: "block_rq_issue" },
        domain: Domain::Io,
    },
    Sensor {
        program: "mem_mm_page_alloc",
        tracepoint: Tracepoint { category: "kmem", name: "mm_page_alloc" },
        domain: Domain::Mem,
    },
    Sensor {
        program: "net_net_dev_queue",
        tracepoint: Tracepoint { category: "net", name: "net_dev_queue" },
        domain: Domain::Net,
    },
    Sensor {
        program: "parallel_sched_wakeup",
        tracepoint: Tracepoint { category: "sched", name: "sched_wakeup" },
        domain: Domain::Parallel,
    },
    Sensor {
        program: "parallel_sched_switch",
        tracepoint: Tracepoint { category: "sched", name: "sched_switch" },
        domain: Domain::Parallel,
    },
];
