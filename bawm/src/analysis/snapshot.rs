//! Point-in-time view of the counter store

use std::fmt;

use bawm_common::DOMAIN_COUNT;

use crate::domain::Domain;

/// Values of every domain slot at one instant; `None` where the slot is absent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    values: [Option<u64>; DOMAIN_COUNT],
}

const fn index(domain: Domain) -> usize {
    match domain {
        Domain::Cpu => 0,
        Domain::Io => 1,
        Domain::Mem => 2,
        Domain::Net => 3,
        Domain::Parallel => 4,
    }
}

impl Snapshot {
    /// Build a snapshot by looking up each domain in turn
    ///
    /// # Errors
    /// Propagates the first lookup error
    pub fn from_lookup<E>(
        mut lookup: impl FnMut(Domain) -> Result<Option<u64>, E>,
    ) -> Result<Self, E> {
        let mut snapshot = Self::default();
        for domain in Domain::ALL {
            snapshot.values[index(domain)] = lookup(domain)?;
        }
        Ok(snapshot)
    }

    #[must_use]
    pub fn with(mut self, domain: Domain, value: u64) -> Self {
        self.values[index(domain)] = Some(value);
        self
    }

    #[must_use]
    pub fn get(&self, domain: Domain) -> Option<u64> {
        self.values[index(domain)]
    }

    /// Value of the slot, treating an absent slot as zero
    #[must_use]
    pub fn value(&self, domain: Domain) -> u64 {
        self.get(domain).unwrap_or(0)
    }

    /// Present slots in key order
    pub fn iter(&self) -> impl Iterator<Item = (Domain, u64)> + '_ {
        Domain::ALL.into_iter().filter_map(|d| self.get(d).map(|v| (d, v)))
    }

    /// Change since `previous`
    ///
    /// Monotonic counters become interval deltas. A counter that went
    /// backwards (store recreated under a new pin) is reported from zero.
    /// The PARALLEL gauge is carried over as its current value.
    #[must_use]
    pub fn delta_since(&self, previous: &Snapshot) -> Snapshot {
        let mut delta = Snapshot::default();
        for domain in Domain::ALL {
            delta.values[index(domain)] = self.get(domain).map(|current| {
                if domain.is_gauge() {
                    current
                } else {
                    let before = previous.value(domain);
                    if current >= before { current - before } else { current }
                }
            });
        }
        delta
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, domain) in Domain::ALL.into_iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match self.get(domain) {
                Some(v) => write!(f, "{}={v}", domain.name())?,
                None => write!(f, "{}=-", domain.name())?,
            }
        }
        Ok(())
    }
}
