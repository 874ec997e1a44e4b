//! Counter store access from userspace
//!
//! The store is created by the kernel loader and pinned by name; userspace
//! only pre-registers slots, reads them, and removes the pin.

use anyhow::{Context, Result};
use std::borrow::BorrowMut;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use aya::maps::{HashMap, MapData, MapError};
use aya::Ebpf;
use bawm_common::{BPF_NOEXIST, COUNTER_STORE_NAME};
use log::info;

use crate::analysis::Snapshot;
use crate::domain::{Domain, DomainKey, LoadError};

/// Path of the pinned counter store under `pin_dir`
#[must_use]
pub fn pin_path(pin_dir: &Path) -> PathBuf {
    pin_dir.join(COUNTER_STORE_NAME)
}

/// Remove the pin so the store dies with its last reference
///
/// Returns `false` if nothing was pinned.
///
/// # Errors
/// Returns an error if the pin exists but cannot be removed
pub fn unpin(pin_dir: &Path) -> io::Result<bool> {
    match std::fs::remove_file(pin_path(pin_dir)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Userspace handle on the counter store's slots
pub trait CounterTable {
    type Error: fmt::Display;

    /// Whether a slot exists for `key`
    ///
    /// # Errors
    /// Returns the table's error if the lookup fails for any reason other than
    /// an absent key
    fn contains(&self, key: DomainKey) -> Result<bool, Self::Error>;

    /// Create a zero slot for `key`, failing if one already exists
    ///
    /// # Errors
    /// Returns the table's error if no slot was created
    fn insert_if_absent(&mut self, key: DomainKey) -> Result<(), Self::Error>;
}

impl<T: BorrowMut<MapData>> CounterTable for HashMap<T, u64, u64> {
    type Error = MapError;

    fn contains(&self, key: DomainKey) -> Result<bool, MapError> {
        match self.get(&key, 0) {
            Ok(_) => Ok(true),
            Err(MapError::KeyNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn insert_if_absent(&mut self, key: DomainKey) -> Result<(), MapError> {
        self.insert(key, 0, BPF_NOEXIST)
    }
}

/// Create a zero slot for every domain that has none yet
///
/// Existing slots (for example from a previous run against the same pin)
/// keep their values. Returns how many slots were created.
///
/// # Errors
/// Returns [`LoadError::StoreMissing`] or [`LoadError::Store`] if the map is
/// unavailable or an insert fails for a reason other than a concurrent create
pub fn preregister(bpf: &mut Ebpf) -> Result<usize, LoadError> {
    let mut map: HashMap<_, u64, u64> = HashMap::try_from(
        bpf.map_mut(COUNTER_STORE_NAME)
            .ok_or_else(|| LoadError::StoreMissing(COUNTER_STORE_NAME.to_string()))?,
    )
    .map_err(|e| LoadError::Store(e.to_string()))?;

    let created = preregister_slots(&mut map)?;
    info!("✓ Pre-registered {created} counter slots");
    Ok(created)
}

/// Insert-if-absent every domain slot of `table`
///
/// # Errors
/// Returns [`LoadError::Store`] naming the domain whose slot is still missing
pub fn preregister_slots<T: CounterTable>(table: &mut T) -> Result<usize, LoadError> {
    let mut created = 0;
    for domain in Domain::ALL {
        let key = domain.key();
        let store_err = |e: T::Error| LoadError::Store(format!("{}: {e}", domain.name()));

        if table.contains(key).map_err(store_err)? {
            continue;
        }
        match table.insert_if_absent(key) {
            Ok(()) => created += 1,
            // A handler may have created the slot between the lookup and the insert.
            Err(e) => {
                if !table.contains(key).map_err(store_err)? {
                    return Err(store_err(e));
                }
            }
        }
    }
    Ok(created)
}

/// Read every present slot of the counter store
///
/// # Errors
/// Returns an error if the map is missing or a lookup fails for a reason
/// other than an absent key
pub fn read_snapshot(bpf: &Ebpf) -> Result<Snapshot> {
    let map: HashMap<_, u64, u64> = HashMap::try_from(
        bpf.map(COUNTER_STORE_NAME).context("bawm_counters map not found")?,
    )?;

    Snapshot::from_lookup(|domain| match map.get(&domain.key(), 0) {
        Ok(value) => Ok(Some(value)),
        Err(MapError::KeyNotFound) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {} counter", domain.name())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// In-memory counter table
    ///
    /// `racer` simulates a handler that creates its slot (with value 1) after
    /// our lookup misses but before our insert lands.
    #[derive(Default)]
    struct MemTable {
        slots: BTreeMap<DomainKey, u64>,
        capacity: Option<usize>,
        racer: Option<DomainKey>,
    }

    impl CounterTable for MemTable {
        type Error = String;

        fn contains(&self, key: DomainKey) -> Result<bool, String> {
            Ok(self.slots.contains_key(&key))
        }

        fn insert_if_absent(&mut self, key: DomainKey) -> Result<(), String> {
            if self.racer == Some(key) {
                self.slots.insert(key, 1);
            }
            if self.slots.contains_key(&key) {
                return Err("File exists (os error 17)".to_string());
            }
            if self.capacity.is_some_and(|cap| self.slots.len() >= cap) {
                return Err("Argument list too long (os error 7)".to_string());
            }
            self.slots.insert(key, 0);
            Ok(())
        }
    }

    #[test]
    fn test_preregister_creates_every_slot() {
        let mut table = MemTable::default();

        assert_eq!(preregister_slots(&mut table).unwrap(), Domain::ALL.len());
        for domain in Domain::ALL {
            assert_eq!(table.slots.get(&domain.key()), Some(&0), "{}", domain.name());
        }
    }

    #[test]
    fn test_preregister_keeps_existing_values() {
        let mut table = MemTable::default();
        table.slots.insert(Domain::Cpu.key(), 42);
        table.slots.insert(Domain::Parallel.key(), 3);

        assert_eq!(preregister_slots(&mut table).unwrap(), 3);
        assert_eq!(table.slots[&Domain::Cpu.key()], 42);
        assert_eq!(table.slots[&Domain::Parallel.key()], 3);
        assert_eq!(table.slots[&Domain::Net.key()], 0);
    }

    #[test]
    fn test_preregister_lost_race_is_success() {
        let mut table = MemTable { racer: Some(Domain::Io.key()), ..MemTable::default() };

        assert_eq!(preregister_slots(&mut table).unwrap(), Domain::ALL.len() - 1);
        // The handler's event is kept, not overwritten with zero.
        assert_eq!(table.slots[&Domain::Io.key()], 1);
    }

    #[test]
    fn test_preregister_full_store_names_domain() {
        let mut table = MemTable { capacity: Some(2), ..MemTable::default() };

        let err = preregister_slots(&mut table).unwrap_err();
        assert!(matches!(err, LoadError::Store(ref msg) if msg.starts_with("mem:")), "{err}");
    }

    #[test]
    fn test_pin_path() {
        assert_eq!(pin_path(Path::new("/sys/fs/bpf")), PathBuf::from("/sys/fs/bpf/bawm_counters"));
    }

    #[test]
    fn test_unpin_removes_pin_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(pin_path(dir.path()), b"").unwrap();

        assert!(unpin(dir.path()).unwrap());
        assert!(!unpin(dir.path()).unwrap());
    }
}
