//! Per-object connection tables.
//!
//! Each signal-emitting object owns a table mapping its signals to the list
//! of connection records attached to them. Records carry their own id and
//! are revocable independently, which is what makes `disconnect` work; the
//! table also supports purging every record aimed at a given endpoint when
//! that endpoint is disposed.

use rustc_hash::FxHashMap;
use std::hash::Hash;

use crate::arena::DynamicHandle;
use crate::ids::{ConnectionId, NativeHandle, SlotId};
use crate::signature::Signature;

/// Target of a connection: a native slot or a dynamic object's slot entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// A slot on a compile-time-introspectable object, dispatched natively.
    Native {
        object: NativeHandle,
        slot: Signature,
    },
    /// A slot-table entry on a dynamic object, dispatched through its
    /// script callable.
    Script {
        object: DynamicHandle,
        slot: SlotId,
    },
}

impl Endpoint {
    /// Whether this endpoint targets the given dynamic object.
    pub fn targets_dynamic(&self, handle: DynamicHandle) -> bool {
        matches!(self, Endpoint::Script { object, .. } if *object == handle)
    }

    /// Whether this endpoint targets the given native object.
    pub fn targets_native(&self, handle: NativeHandle) -> bool {
        matches!(self, Endpoint::Native { object, .. } if *object == handle)
    }
}

/// One installed connection.
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub target: Endpoint,
}

/// Connection records of one source object, keyed by signal.
///
/// Dynamic objects key by [`crate::SignalId`]; the host graph keys native
/// sources by signature hash.
#[derive(Debug)]
pub struct ConnectionTable<K> {
    by_signal: FxHashMap<K, Vec<ConnectionRecord>>,
    next_id: u64,
}

impl<K: Eq + Hash + Copy> ConnectionTable<K> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            by_signal: FxHashMap::default(),
            next_id: 0,
        }
    }

    /// Attach `target` to `signal`.
    ///
    /// Connections are deduplicated: if an identical target is already
    /// attached to this signal, the existing record is kept and `None` is
    /// returned.
    pub fn attach(&mut self, signal: K, target: Endpoint) -> Option<ConnectionId> {
        let records = self.by_signal.entry(signal).or_default();
        if records.iter().any(|r| r.target == target) {
            return None;
        }
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;
        records.push(ConnectionRecord { id, target });
        Some(id)
    }

    /// Remove every record on `signal` whose target equals `target`.
    ///
    /// Returns the number of records removed.
    pub fn detach(&mut self, signal: K, target: &Endpoint) -> usize {
        let Some(records) = self.by_signal.get_mut(&signal) else {
            return 0;
        };
        let before = records.len();
        records.retain(|r| r.target != *target);
        before - records.len()
    }

    /// Remove every record whose target satisfies `pred`, across all
    /// signals. Used to sever connections into a disposed object.
    pub fn purge_targets(&mut self, pred: impl Fn(&Endpoint) -> bool) -> usize {
        let mut removed = 0;
        for records in self.by_signal.values_mut() {
            let before = records.len();
            records.retain(|r| !pred(&r.target));
            removed += before - records.len();
        }
        removed
    }

    /// The records attached to `signal`.
    pub fn records(&self, signal: K) -> &[ConnectionRecord] {
        self.by_signal.get(&signal).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `signal` has at least one record attached.
    pub fn has_records(&self, signal: K) -> bool {
        !self.records(signal).is_empty()
    }

    /// Total number of records across all signals.
    pub fn len(&self) -> usize {
        self.by_signal.values().map(Vec::len).sum()
    }

    /// Whether the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Copy> Default for ConnectionTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SignalId;

    fn native_target(index: u32) -> Endpoint {
        Endpoint::Native {
            object: NativeHandle::new(index),
            slot: Signature::parse("onPing()").unwrap(),
        }
    }

    #[test]
    fn attach_and_lookup() {
        let mut table: ConnectionTable<SignalId> = ConnectionTable::new();
        let signal = SignalId::new(0);
        assert!(!table.has_records(signal));

        table.attach(signal, native_target(1)).unwrap();
        assert!(table.has_records(signal));
        assert_eq!(table.records(signal).len(), 1);
    }

    #[test]
    fn duplicate_attach_is_deduplicated() {
        let mut table: ConnectionTable<SignalId> = ConnectionTable::new();
        let signal = SignalId::new(0);

        assert!(table.attach(signal, native_target(1)).is_some());
        assert!(table.attach(signal, native_target(1)).is_none());
        assert_eq!(table.records(signal).len(), 1);

        // A different target is a new record.
        assert!(table.attach(signal, native_target(2)).is_some());
        assert_eq!(table.records(signal).len(), 2);
    }

    #[test]
    fn detach_removes_matching_records() {
        let mut table: ConnectionTable<SignalId> = ConnectionTable::new();
        let signal = SignalId::new(0);
        table.attach(signal, native_target(1));
        table.attach(signal, native_target(2));

        assert_eq!(table.detach(signal, &native_target(1)), 1);
        assert_eq!(table.records(signal).len(), 1);
        assert_eq!(table.detach(signal, &native_target(1)), 0);
    }

    #[test]
    fn connection_ids_are_unique_per_table() {
        let mut table: ConnectionTable<SignalId> = ConnectionTable::new();
        let a = table.attach(SignalId::new(0), native_target(1)).unwrap();
        let b = table.attach(SignalId::new(1), native_target(1)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn purge_severs_by_endpoint() {
        let mut table: ConnectionTable<SignalId> = ConnectionTable::new();
        table.attach(SignalId::new(0), native_target(1));
        table.attach(SignalId::new(1), native_target(1));
        table.attach(SignalId::new(1), native_target(2));

        let gone = NativeHandle::new(1);
        assert_eq!(table.purge_targets(|t| t.targets_native(gone)), 2);
        assert_eq!(table.len(), 1);
    }
}
