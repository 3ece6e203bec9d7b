//! Set reconciliation between current and desired records
//!
//! [`diff`] splits two record lists into the records to create, the records to
//! keep (refreshing metadata only) and the records to delete. Membership is
//! decided by a [`RecordKeyer`]; for A records the key is the address, so a
//! record that only moved between devices, or was re-ordered, is never
//! deleted and recreated.
//!
//! ```text
//! current ──► key ──┐                 ┌──► update (current record, id kept)
//!                   ├──► keyed join ──┼──► delete (current only)
//! desired ──► key ──┘                 └──► create (desired only)
//! ```

use crate::record::AddressRecord;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::net::IpAddr;

/// Maps a record to the key used for set membership
///
/// Must be pure and deterministic. Closures `Fn(&T) -> K` implement it, so a
/// different identity notion can be plugged into [`diff`] without changes.
pub trait RecordKeyer<T> {
    /// Key type compared for equality
    type Key: Eq + Hash;

    /// Compute the key of a record
    fn key(&self, record: &T) -> Self::Key;
}

impl<T, K, F> RecordKeyer<T> for F
where
    F: Fn(&T) -> K,
    K: Eq + Hash,
{
    type Key = K;

    fn key(&self, record: &T) -> K {
        self(record)
    }
}

/// Keys address records by their address value
#[derive(Debug, Clone, Copy, Default)]
pub struct ByAddress;

impl RecordKeyer<AddressRecord> for ByAddress {
    type Key = IpAddr;

    fn key(&self, record: &AddressRecord) -> IpAddr {
        record.address
    }
}

/// The three-way split produced by [`diff`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation<T> {
    /// Desired records absent from the current set
    pub create: Vec<T>,
    /// Current records also present in the desired set
    pub update: Vec<T>,
    /// Current records absent from the desired set
    pub delete: Vec<T>,
}

impl<T> Reconciliation<T> {
    /// True when applying this reconciliation changes the record set
    pub fn changes_membership(&self) -> bool {
        !self.create.is_empty() || !self.delete.is_empty()
    }

    /// True when there is nothing to create, update or delete
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

impl<T> Default for Reconciliation<T> {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            update: Vec::new(),
            delete: Vec::new(),
        }
    }
}

/// Records indexed by key, last write wins, first-seen order kept
struct Keyed<'a, T, K> {
    index: HashMap<K, usize>,
    slots: Vec<(K, &'a T)>,
}

impl<'a, T, K: Eq + Hash + Clone> Keyed<'a, T, K> {
    fn build<R>(records: &'a [T], keyer: &R) -> Self
    where
        R: RecordKeyer<T, Key = K>,
    {
        let mut index: HashMap<K, usize> = HashMap::with_capacity(records.len());
        let mut slots: Vec<(K, &'a T)> = Vec::with_capacity(records.len());

        for record in records {
            let key = keyer.key(record);
            match index.entry(key.clone()) {
                // duplicate key on the same side: replace, keep the position
                Entry::Occupied(slot) => slots[*slot.get()].1 = record,
                Entry::Vacant(slot) => {
                    slot.insert(slots.len());
                    slots.push((key, record));
                }
            }
        }

        Self { index, slots }
    }

    fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }
}

/// Compute the create / update / delete split between `current` and `desired`
///
/// - desired-only keys → `create` (the desired record)
/// - keys on both sides → `update` (the **current** record, so its remote id is kept)
/// - current-only keys → `delete` (the current record)
///
/// Duplicate keys within one side collapse to the last record with that key.
/// Inputs are not modified. Output order follows first appearance of each key
/// but callers must not rely on it.
pub fn diff<T, R>(current: &[T], desired: &[T], keyer: &R) -> Reconciliation<T>
where
    T: Clone,
    R: RecordKeyer<T>,
    R::Key: Clone,
{
    let current = Keyed::build(current, keyer);
    let desired = Keyed::build(desired, keyer);

    let mut result = Reconciliation::default();

    for (key, record) in &desired.slots {
        if !current.contains(key) {
            result.create.push((*record).clone());
        }
    }

    for (key, record) in &current.slots {
        if desired.contains(key) {
            result.update.push((*record).clone());
        } else {
            result.delete.push((*record).clone());
        }
    }

    result
}
