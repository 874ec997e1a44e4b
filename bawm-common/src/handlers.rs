//! Per-domain event handlers
//!
//! Each function is the whole body of one kernel event hook: find the
//! domain's slot, apply one atomic update, return. They never block, never
//! loop beyond [`CLAMPED_SUB_ATTEMPTS`](crate::CLAMPED_SUB_ATTEMPTS), and the
//! only error they report is a [`CounterSlotMiss`] for the caller to drop.

use crate::{
    atomic_add, atomic_sub_clamped, get_or_create, CounterSlotMiss, CounterStore, Domain,
    TASK_REPORT_MAX, TASK_RUNNING,
};

fn increment<S: CounterStore + ?Sized>(store: &S, domain: Domain) -> Result<(), CounterSlotMiss> {
    let slot = get_or_create(store, domain)?;
    atomic_add(slot, 1);
    Ok(())
}

/// `sched/sched_switch`: one context switch, voluntary or not
///
/// # Errors
/// Returns [`CounterSlotMiss`] if the CPU slot could not be obtained.
pub fn on_context_switch<S: CounterStore + ?Sized>(store: &S) -> Result<(), CounterSlotMiss> {
    increment(store, Domain::Cpu)
}

/// `block/block_rq_issue`: one block request handed to the driver
///
/// # Errors
/// Returns [`CounterSlotMiss`] if the IO slot could not be obtained.
pub fn on_block_rq_issue<S: CounterStore + ?Sized>(store: &S) -> Result<(), CounterSlotMiss> {
    increment(store, Domain::Io)
}

/// `kmem/mm_page_alloc`: one page allocation
///
/// # Errors
/// Returns [`CounterSlotMiss`] if the MEM slot could not be obtained.
pub fn on_page_alloc<S: CounterStore + ?Sized>(store: &S) -> Result<(), CounterSlotMiss> {
    increment(store, Domain::Mem)
}

/// `net/net_dev_queue`: one packet enqueued on a device
///
/// # Errors
/// Returns [`CounterSlotMiss`] if the NET slot could not be obtained.
pub fn on_net_dev_queue<S: CounterStore + ?Sized>(store: &S) -> Result<(), CounterSlotMiss> {
    increment(store, Domain::Net)
}

/// `sched/sched_wakeup`: a thread became runnable
///
/// # Errors
/// Returns [`CounterSlotMiss`] if the PARALLEL slot could not be obtained.
pub fn on_sched_wakeup<S: CounterStore + ?Sized>(store: &S) -> Result<(), CounterSlotMiss> {
    increment(store, Domain::Parallel)
}

/// Whether a thread switched out with `prev_state` stays in the runnable pool
#[must_use]
pub const fn is_still_runnable(prev_state: i64) -> bool {
    prev_state == TASK_RUNNING || prev_state & TASK_REPORT_MAX != 0
}

/// `sched/sched_switch`: a thread left the CPU
///
/// Only a thread leaving the runnable pool (sleeping, blocking, exiting)
/// decrements the gauge; preemption leaves it unchanged. The slot is created
/// either way so the key appears on the first switch.
///
/// # Errors
/// Returns [`CounterSlotMiss`] if the PARALLEL slot could not be obtained.
pub fn on_sched_switch_runnable<S: CounterStore + ?Sized>(
    store: &S,
    prev_state: i64,
) -> Result<(), CounterSlotMiss> {
    let slot = get_or_create(store, Domain::Parallel)?;
    if !is_still_runnable(prev_state) {
        // Contended decrements are dropped; the gauge is approximate.
        let _ = atomic_sub_clamped(slot, 1, 0);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_store::SimStore;
    use std::thread;
    use std::vec::Vec;

    const TASK_INTERRUPTIBLE: i64 = 1;
    const TASK_UNINTERRUPTIBLE: i64 = 2;

    fn parallel(store: &SimStore) -> Option<u64> {
        store.read(Domain::Parallel.key())
    }

    #[test]
    fn test_fresh_store_scenario() {
        let store = SimStore::new();

        on_context_switch(&store).unwrap();
        on_block_rq_issue(&store).unwrap();
        on_page_alloc(&store).unwrap();
        on_page_alloc(&store).unwrap();

        assert_eq!(store.read(Domain::Cpu.key()), Some(1));
        assert_eq!(store.read(Domain::Io.key()), Some(1));
        assert_eq!(store.read(Domain::Mem.key()), Some(2));
        assert_eq!(store.read(Domain::Net.key()), None);
        assert_eq!(parallel(&store), None);
    }

    #[test]
    fn test_mem_and_net_do_not_share_a_slot() {
        let store = SimStore::new();
        on_page_alloc(&store).unwrap();
        on_net_dev_queue(&store).unwrap();
        on_net_dev_queue(&store).unwrap();

        assert_eq!(store.read(Domain::Mem.key()), Some(1));
        assert_eq!(store.read(Domain::Net.key()), Some(2));
    }

    #[test]
    fn test_first_event_is_counted() {
        let store = SimStore::new();
        on_context_switch(&store).unwrap();
        assert_eq!(store.read(Domain::Cpu.key()), Some(1));
    }

    #[test]
    fn test_parallel_sequence() {
        let store = SimStore::new();
        let mut seen = Vec::new();

        on_sched_wakeup(&store).unwrap();
        seen.push(parallel(&store).unwrap());
        on_sched_wakeup(&store).unwrap();
        seen.push(parallel(&store).unwrap());
        on_sched_switch_runnable(&store, TASK_RUNNING).unwrap();
        seen.push(parallel(&store).unwrap());
        on_sched_switch_runnable(&store, TASK_INTERRUPTIBLE).unwrap();
        seen.push(parallel(&store).unwrap());

        assert_eq!(seen, [1, 2, 2, 1]);
    }

    #[test]
    fn test_wakeup_then_block_is_net_zero() {
        let store = SimStore::new();
        on_sched_wakeup(&store).unwrap();
        let before = parallel(&store).unwrap();

        on_sched_wakeup(&store).unwrap();
        on_sched_switch_runnable(&store, TASK_UNINTERRUPTIBLE).unwrap();

        assert_eq!(parallel(&store), Some(before));
    }

    #[test]
    fn test_preemption_is_a_no_op() {
        let store = SimStore::new();
        on_sched_wakeup(&store).unwrap();

        on_sched_switch_runnable(&store, TASK_RUNNING).unwrap();
        on_sched_switch_runnable(&store, TASK_REPORT_MAX).unwrap();
        on_sched_switch_runnable(&store, TASK_REPORT_MAX | TASK_INTERRUPTIBLE).unwrap();

        assert_eq!(parallel(&store), Some(1));
    }

    #[test]
    fn test_switch_creates_parallel_slot_at_zero() {
        let store = SimStore::new();
        on_sched_switch_runnable(&store, TASK_INTERRUPTIBLE).unwrap();
        assert_eq!(parallel(&store), Some(0));
    }

    #[test]
    fn test_slot_miss_drops_event() {
        let store = SimStore::full();
        assert!(on_context_switch(&store).is_err());
        assert!(on_sched_switch_runnable(&store, TASK_INTERRUPTIBLE).is_err());
        assert_eq!(store.read(Domain::Cpu.key()), None);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        const CORES: usize = 8;
        const EVENTS_PER_CORE: usize = 10_000;

        let store = SimStore::new();
        thread::scope(|s| {
            for _ in 0..CORES {
                s.spawn(|| {
                    for _ in 0..EVENTS_PER_CORE {
                        on_block_rq_issue(&store).unwrap();
                    }
                });
            }
        });

        assert_eq!(store.read(Domain::Io.key()), Some((CORES * EVENTS_PER_CORE) as u64));
    }

    #[test]
    fn test_parallel_never_negative_under_unordered_events() {
        const CORES: usize = 8;
        const ROUNDS: usize = 5_000;

        let store = SimStore::new();
        on_sched_wakeup(&store).unwrap();

        thread::scope(|s| {
            // Switch-heavy cores outrun the wakeups they pair with.
            for core in 0..CORES {
                let store = &store;
                s.spawn(move || {
                    for round in 0..ROUNDS {
                        if core % 2 == 0 && round % 3 == 0 {
                            on_sched_wakeup(store).unwrap();
                        } else {
                            on_sched_switch_runnable(store, TASK_INTERRUPTIBLE).unwrap();
                        }
                    }
                });
            }
            // Observer: the gauge must read as a valid non-negative count at
            // every point, never a wrapped-around u64.
            s.spawn(|| {
                for _ in 0..ROUNDS {
                    let value = parallel(&store).unwrap();
                    assert!(value <= (CORES * ROUNDS) as u64 + 1);
                }
            });
        });

        let value = parallel(&store).unwrap();
        assert!(value <= (CORES * ROUNDS) as u64 + 1);
    }
}
