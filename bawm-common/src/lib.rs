//! # Shared Counting Protocol (eBPF ↔ Userspace)
//!
//! Everything both sides of the kernel boundary must agree on: the domain key
//! space, the name and capacity of the pinned counter store, the tracepoint
//! argument layouts, and the counting protocol itself.
//!
//! The protocol is written against the [`CounterStore`] trait so the same
//! handler code runs inside the eBPF programs (backed by the kernel hash map)
//! and in tests (backed by an in-memory table hammered from many threads).
//!
//! ## Key Types
//!
//! - [`Domain`] - The five monitored domains and their store keys
//! - [`CounterStore`] - Lookup / insert-if-absent seam over the shared table
//! - [`get_or_create`], [`atomic_add`], [`atomic_sub_clamped`] - Slot protocol
//! - [`handlers`] - One entry point per kernel event
//! - [`SchedSwitchArgs`] - Tracepoint arguments from `sched_switch`

#![no_std]

#[cfg(test)]
extern crate std;

pub mod handlers;

use core::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Counter Store Constants
// ============================================================================

/// Name of the counter map, and of its pin under the bpffs directory
pub const COUNTER_STORE_NAME: &str = "bawm_counters";

/// Maximum entries of the counter map (only five keys are ever used)
pub const COUNTER_STORE_CAPACITY: u32 = 1024;

/// Map update flag: create a new element only if it does not exist
pub const BPF_NOEXIST: u64 = 1;

/// Errno returned by a map update with `BPF_NOEXIST` when the key is present
pub const EEXIST: i64 = 17;

/// Errno returned by a hash map update when the map is full
pub const E2BIG: i64 = 7;

/// Compare-and-swap attempts allowed for one clamped decrement
///
/// Keeps the loop bounded for the verifier. Exhausting the budget drops the
/// decrement, which errs toward overcounting runnable threads.
pub const CLAMPED_SUB_ATTEMPTS: usize = 8;

// ============================================================================
// Domains
// ============================================================================

/// Key of a counter slot in the store
pub type DomainKey = u64;

/// Number of monitored domains
pub const DOMAIN_COUNT: usize = 5;

/// A monitored kernel subsystem
///
/// Each domain owns exactly one slot in the counter store. Keys are distinct
/// and fixed; readers in other processes address slots by these values.
#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    /// Scheduler context switches
    Cpu = 0,
    /// Block-device requests issued
    Io = 1,
    /// Page allocations
    Mem = 2,
    /// Packets enqueued on network devices
    Net = 3,
    /// Approximate runnable thread count (gauge, floored at zero)
    Parallel = 4,
}

impl Domain {
    /// All domains in key order
    pub const ALL: [Domain; DOMAIN_COUNT] =
        [Domain::Cpu, Domain::Io, Domain::Mem, Domain::Net, Domain::Parallel];

    #[must_use]
    pub const fn key(self) -> DomainKey {
        self as DomainKey
    }

    #[must_use]
    pub const fn from_key(key: DomainKey) -> Option<Self> {
        match key {
            0 => Some(Domain::Cpu),
            1 => Some(Domain::Io),
            2 => Some(Domain::Mem),
            3 => Some(Domain::Net),
            4 => Some(Domain::Parallel),
            _ => None,
        }
    }

    /// Lowercase label used in logs and exports
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Domain::Cpu => "cpu",
            Domain::Io => "io",
            Domain::Mem => "mem",
            Domain::Net => "net",
            Domain::Parallel => "parallel",
        }
    }

    /// Whether the slot is a gauge (moves both ways) rather than a monotonic counter
    #[must_use]
    pub const fn is_gauge(self) -> bool {
        matches!(self, Domain::Parallel)
    }
}

// ============================================================================
// Counter Store Protocol
// ============================================================================

/// An event fired but no slot exists or could be created for its domain
///
/// Non-fatal: the single event is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterSlotMiss {
    pub key: DomainKey,
}

/// Why an insert-if-absent did not create a slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertError {
    /// Another writer created the slot first
    Exists,
    /// The store has no free entries
    Full,
    /// Any other negative errno from the map update
    Other(i64),
}

impl InsertError {
    /// Classify the return code of a kernel map update
    #[must_use]
    pub const fn from_errno(code: i64) -> Self {
        match -code {
            EEXIST => InsertError::Exists,
            E2BIG => InsertError::Full,
            _ => InsertError::Other(code),
        }
    }
}

/// Shared keyed table of 64-bit counters
///
/// Implementations must make `insert_if_absent` atomic: when several callers
/// race on the same absent key, exactly one creates it (value 0) and the rest
/// get [`InsertError::Exists`]. Slots returned by `lookup` must stay valid for
/// the borrow of the store.
pub trait CounterStore {
    fn lookup(&self, key: DomainKey) -> Option<&AtomicU64>;

    fn insert_if_absent(&self, key: DomainKey) -> Result<(), InsertError>;
}

/// Find the slot for `domain`, creating a zeroed one if it is absent
///
/// A losing creator discards its proposal and re-reads the winner's slot, so
/// every concurrent caller converges on the same slot.
///
/// # Errors
/// Returns [`CounterSlotMiss`] if the slot is still missing after the insert
/// attempt (for example because the store is full).
pub fn get_or_create<S: CounterStore + ?Sized>(
    store: &S,
    domain: Domain,
) -> Result<&AtomicU64, CounterSlotMiss> {
    let key = domain.key();
    if let Some(slot) = store.lookup(key) {
        return Ok(slot);
    }

    // Exists means another core won the race; the re-read picks its slot up.
    let _ = store.insert_if_absent(key);

    store.lookup(key).ok_or(CounterSlotMiss { key })
}

/// Lock-free increment of a slot
pub fn atomic_add(slot: &AtomicU64, delta: u64) {
    slot.fetch_add(delta, Ordering::Relaxed);
}

/// Lock-free decrement of a slot that never goes below `floor`
///
/// If subtracting `delta` would cross the floor, the slot is set to the floor
/// instead. A slot already at or below the floor is left untouched.
///
/// Returns the value the slot holds after the call, or `None` if every
/// compare-and-swap attempt lost to a concurrent writer and the decrement was
/// dropped.
pub fn atomic_sub_clamped(slot: &AtomicU64, delta: u64, floor: u64) -> Option<u64> {
    sub_clamped(slot, delta, floor)
}

/// Load and compare-and-swap of one 64-bit slot
trait CasSlot {
    fn load(&self) -> u64;

    fn compare_exchange(&self, current: u64, next: u64) -> Result<u64, u64>;
}

impl CasSlot for AtomicU64 {
    fn load(&self) -> u64 {
        AtomicU64::load(self, Ordering::Relaxed)
    }

    fn compare_exchange(&self, current: u64, next: u64) -> Result<u64, u64> {
        AtomicU64::compare_exchange(self, current, next, Ordering::Relaxed, Ordering::Relaxed)
    }
}

fn sub_clamped<S: CasSlot>(slot: &S, delta: u64, floor: u64) -> Option<u64> {
    let mut current = slot.load();

    for _ in 0..CLAMPED_SUB_ATTEMPTS {
        if current <= floor {
            return Some(current);
        }

        let next = if current - floor > delta { current - delta } else { floor };

        match slot.compare_exchange(current, next) {
            Ok(_) => return Some(next),
            Err(actual) => current = actual,
        }
    }

    None
}

// ============================================================================
// Tracepoint Layouts
// ============================================================================

/// `prev_state` of a thread that was still running when switched out
pub const TASK_RUNNING: i64 = 0;

/// Bit the kernel reports in `prev_state` when the switch was a preemption
///
/// `__trace_sched_switch_state()` returns `TASK_REPORT_MAX` for preempted
/// tasks, whatever their nominal state.
pub const TASK_REPORT_MAX: i64 = 0x100;

/// Tracepoint arguments for `sched/sched_switch`
///
/// Layout from `/sys/kernel/debug/tracing/events/sched/sched_switch/format`.
/// Only `prev_state` is read by the handlers; the rest pins the offsets.
///
/// - **prev_***: The thread being switched OUT (going off-CPU)
/// - **next_***: The thread being switched IN (going on-CPU)
#[repr(C)]
pub struct SchedSwitchArgs {
    /// Common tracepoint fields
    #[allow(clippy::pub_underscore_fields)]
    pub __unused__: u64,

    pub prev_comm: [u8; 16],

    pub prev_pid: i32,

    pub prev_prio: i32,

    /// State of the thread being switched out
    ///
    /// - `0` (`TASK_RUNNING`): still runnable, e.g. yielded
    /// - `1` (`TASK_INTERRUPTIBLE`): sleeping
    /// - `2` (`TASK_UNINTERRUPTIBLE`): blocked on I/O
    /// - `TASK_REPORT_MAX` bit: preempted
    pub prev_state: i64,

    pub next_comm: [u8; 16],

    pub next_pid: i32,

    pub next_prio: i32,
}

/// Byte offset of `prev_state` inside the `sched_switch` context
pub const SCHED_SWITCH_PREV_STATE_OFFSET: usize = core::mem::offset_of!(SchedSwitchArgs, prev_state);


#[cfg(test)]
mod tests {
    use super::test_store::SimStore;
    use super::*;
    use std::thread;

    #[test]
    fn test_domain_keys_are_distinct() {
        for (i, a) in Domain::ALL.iter().enumerate() {
            for b in &Domain::ALL[i + 1..] {
                assert_ne!(a.key(), b.key());
            }
            assert_eq!(Domain::from_key(a.key()), Some(*a));
        }
        assert_eq!(Domain::Net.key(), 3);
        assert_eq!(Domain::from_key(5), None);
    }

    #[test]
    fn test_get_or_create_creates_zeroed_slot() {
        let store = SimStore::new();
        assert!(store.read(Domain::Mem.key()).is_none());

        let slot = get_or_create(&store, Domain::Mem).unwrap();
        assert_eq!(slot.load(Ordering::SeqCst), 0);
        assert_eq!(store.read(Domain::Mem.key()), Some(0));
    }

    #[test]
    fn test_get_or_create_reports_miss_when_full() {
        let store = SimStore::full();
        let err = get_or_create(&store, Domain::Net).unwrap_err();
        assert_eq!(err, CounterSlotMiss { key: 3 });
    }

    #[test]
    fn test_concurrent_creators_converge_on_one_slot() {
        let store = SimStore::new();
        let slots: std::vec::Vec<usize> = thread::scope(|s| {
            let handles: std::vec::Vec<_> = (0..16)
                .map(|_| {
                    s.spawn(|| {
                        let slot = get_or_create(&store, Domain::Io).unwrap();
                        core::ptr::from_ref(slot) as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(slots.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_atomic_sub_clamped_floors_at_zero() {
        let slot = AtomicU64::new(2);
        assert_eq!(atomic_sub_clamped(&slot, 5, 0), Some(0));
        assert_eq!(slot.load(Ordering::SeqCst), 0);

        assert_eq!(atomic_sub_clamped(&slot, 1, 0), Some(0));
        assert_eq!(slot.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_atomic_sub_clamped_respects_nonzero_floor() {
        let slot = AtomicU64::new(10);
        assert_eq!(atomic_sub_clamped(&slot, 3, 5), Some(7));
        assert_eq!(atomic_sub_clamped(&slot, 3, 5), Some(5));
        assert_eq!(atomic_sub_clamped(&slot, 3, 5), Some(5));
    }

    /// Slot where another core bumps the value before each of our swaps lands
    struct ContendedSlot {
        value: AtomicU64,
        lost_swaps: core::sync::atomic::AtomicUsize,
    }

    impl ContendedSlot {
        fn new(value: u64, lost_swaps: usize) -> Self {
            Self {
                value: AtomicU64::new(value),
                lost_swaps: core::sync::atomic::AtomicUsize::new(lost_swaps),
            }
        }
    }

    impl CasSlot for ContendedSlot {
        fn load(&self) -> u64 {
            self.value.load(Ordering::SeqCst)
        }

        fn compare_exchange(&self, current: u64, next: u64) -> Result<u64, u64> {
            let remaining = self.lost_swaps.load(Ordering::SeqCst);
            if remaining > 0 {
                self.lost_swaps.store(remaining - 1, Ordering::SeqCst);
                // A concurrent wakeup lands first.
                return Err(self.value.fetch_add(1, Ordering::SeqCst) + 1);
            }
            self.value.compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
        }
    }

    #[test]
    fn test_exhausted_swap_budget_drops_decrement() {
        let slot = ContendedSlot::new(4, CLAMPED_SUB_ATTEMPTS);

        assert_eq!(sub_clamped(&slot, 1, 0), None);
        // Every concurrent wakeup kept, the decrement lost: overcount by one.
        assert_eq!(slot.load(), 4 + CLAMPED_SUB_ATTEMPTS as u64);
    }

    #[test]
    fn test_last_swap_attempt_still_lands() {
        let slot = ContendedSlot::new(4, CLAMPED_SUB_ATTEMPTS - 1);
        let bumped = 4 + (CLAMPED_SUB_ATTEMPTS - 1) as u64;

        assert_eq!(sub_clamped(&slot, 1, 0), Some(bumped - 1));
        assert_eq!(slot.load(), bumped - 1);
    }

    #[test]
    fn test_contended_decrement_never_crosses_floor() {
        let slot = ContendedSlot::new(3, 3);
        // Concurrent wakeups raise the value; the clamp still lands on the floor.
        assert_eq!(sub_clamped(&slot, 10, 2), Some(2));
        assert_eq!(slot.load(), 2);
    }

    #[test]
    fn test_insert_error_from_errno() {
        assert_eq!(InsertError::from_errno(-17), InsertError::Exists);
        assert_eq!(InsertError::from_errno(-7), InsertError::Full);
        assert_eq!(InsertError::from_errno(-22), InsertError::Other(-22));
    }

    #[test]
    fn test_prev_state_offset_matches_tracepoint_format() {
        assert_eq!(SCHED_SWITCH_PREV_STATE_OFFSET, 32);
    }
}
