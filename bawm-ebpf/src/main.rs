//! # eBPF Kernel-Side Sensors
//!
//! Tracepoint programs that run inside the Linux kernel and bump one counter
//! per event in the pinned `bawm_counters` map.
//!
//! ## Programs
//!
//! | Program                 | Tracepoint             | Domain   |
//! |-------------------------|------------------------|----------|
//! | `cpu_sched_switch`      | `sched/sched_switch`   | CPU      |
//! | `io_block_rq_issue`     | `block/block_rq_issue` | IO       |
//! | `mem_mm_page_alloc`     | `kmem/mm_page_alloc`   | MEM      |
//! | `net_net_dev_queue`     | `net/net_dev_queue`    | NET      |
//! | `parallel_sched_wakeup` | `sched/sched_wakeup`   | PARALLEL |
//! | `parallel_sched_switch` | `sched/sched_switch`   | PARALLEL |
//!
//! Every program is straight-line: look up (or create) the slot, one atomic
//! update, return 0. A missing slot drops the event and emits a debug record.
//!
//! ## Build
//!
//! Always compiled in release mode with BPF CPU v3 (atomic compare-and-swap):
//! ```bash
//! cargo xtask build-ebpf --release
//! ```

#![no_std]
#![no_main]
#![allow(unused_unsafe)]

use core::sync::atomic::AtomicU64;

use aya_ebpf::{
    macros::{map, tracepoint},
    maps::HashMap,
    programs::TracePointContext,
};
use aya_log_ebpf::debug;
use bawm_common::{
    handlers, CounterSlotMiss, CounterStore, DomainKey, InsertError, BPF_NOEXIST,
    COUNTER_STORE_CAPACITY, SCHED_SWITCH_PREV_STATE_OFFSET,
};

// ============================================================================
// eBPF Maps - Shared data structures between kernel and userspace
// ============================================================================

/// Map: Domain key → Counter
///
/// - **Max Entries**: 1024 (five keys in use)
/// - **Pinning**: by name, so it outlives the collector and can be reopened
/// - **Usage**: Kernel updates slots in place with atomics, userspace reads
#[map(name = "bawm_counters")]
static COUNTERS: HashMap<u64, u64> = HashMap::pinned(COUNTER_STORE_CAPACITY, 0);

/// [`CounterStore`] over the pinned kernel map
struct PinnedCounters;

impl CounterStore for PinnedCounters {
    fn lookup(&self, key: DomainKey) -> Option<&AtomicU64> {
        let ptr = COUNTERS.get_ptr_mut(&key)?;
        // SAFETY: hash map values are 8-byte aligned and stay valid while the
        // element exists; slots are never deleted while programs are attached.
        Some(unsafe { AtomicU64::from_ptr(ptr) })
    }

    fn insert_if_absent(&self, key: DomainKey) -> Result<(), InsertError> {
        COUNTERS.insert(&key, &0, BPF_NOEXIST).map_err(|code| InsertError::from_errno(code.into()))
    }
}

fn finish(ctx: &TracePointContext, result: Result<(), CounterSlotMiss>) -> u32 {
    if let Err(miss) = result {
        debug!(ctx, "dropped event: no counter slot for key {}", miss.key);
    }
    0
}

// ============================================================================
// eBPF Program Hooks
// ============================================================================

/// Hook: `sched/sched_switch` → CPU context switches
#[tracepoint]
pub fn cpu_sched_switch(ctx: TracePointContext) -> u32 {
    finish(&ctx, handlers::on_context_switch(&PinnedCounters))
}

/// Hook: `block/block_rq_issue` → IO requests
#[tracepoint]
pub fn io_block_rq_issue(ctx: TracePointContext) -> u32 {
    finish(&ctx, handlers::on_block_rq_issue(&PinnedCounters))
}

/// Hook: `kmem/mm_page_alloc` → MEM page allocations
#[tracepoint]
pub fn mem_mm_page_alloc(ctx: TracePointContext) -> u32 {
    finish(&ctx, handlers::on_page_alloc(&PinnedCounters))
}

/// Hook: `net/net_dev_queue` → NET enqueued packets
#[tracepoint]
pub fn net_net_dev_queue(ctx: TracePointContext) -> u32 {
    finish(&ctx, handlers::on_net_dev_queue(&PinnedCounters))
}

/// Hook: `sched/sched_wakeup` → PARALLEL runnable++
#[tracepoint]
pub fn parallel_sched_wakeup(ctx: TracePointContext) -> u32 {
    finish(&ctx, handlers::on_sched_wakeup(&PinnedCounters))
}

/// Hook: `sched/sched_switch` → PARALLEL runnable-- when the thread leaves the pool
#[tracepoint]
pub fn parallel_sched_switch(ctx: TracePointContext) -> u32 {
    // Layout from /sys/kernel/debug/tracing/events/sched/sched_switch/format
    let Ok(prev_state) = (unsafe { ctx.read_at::<i64>(SCHED_SWITCH_PREV_STATE_OFFSET) }) else {
        return 0;
    };
    finish(&ctx, handlers::on_sched_switch_runnable(&PinnedCounters, prev_state))
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
