//! Read-only adapter over compile-time objects.
//!
//! The bridge sees a native object through two things only: its
//! introspectable signal/slot catalog ([`ObjectMeta`]), used to validate
//! connections, and its own dispatch entry point
//! ([`NativeObject::invoke_slot`]). Arguments reaching a native slot pass
//! through the queue untouched; no marshalling is involved on this side of
//! the boundary.

use rustc_hash::FxHashMap;

use crate::sig_hash::SigHash;
use crate::signature::Signature;
use crate::value::HostValue;

/// The fixed signal/slot catalog of one native class.
#[derive(Debug, Default)]
pub struct ObjectMeta {
    class_name: &'static str,
    signals: Vec<Signature>,
    signal_index: FxHashMap<SigHash, usize>,
    slots: Vec<Signature>,
    slot_index: FxHashMap<SigHash, usize>,
}

impl ObjectMeta {
    /// Create an empty catalog for `class_name`.
    pub fn new(class_name: &'static str) -> Self {
        Self {
            class_name,
            ..Self::default()
        }
    }

    /// The class name, used in connection failure reports.
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// Declare a signal.
    pub fn add_signal(&mut self, signature: Signature) {
        let hash = SigHash::of(&signature);
        self.signal_index.insert(hash, self.signals.len());
        self.signals.push(signature);
    }

    /// Declare a slot.
    pub fn add_slot(&mut self, signature: Signature) {
        let hash = SigHash::of(&signature);
        self.slot_index.insert(hash, self.slots.len());
        self.slots.push(signature);
    }

    /// Exact-signature signal lookup.
    pub fn signal(&self, signature: &Signature) -> Option<&Signature> {
        self.signal_index
            .get(&SigHash::of(signature))
            .map(|&i| &self.signals[i])
    }

    /// Exact-signature slot lookup.
    pub fn slot(&self, signature: &Signature) -> Option<&Signature> {
        self.slot_index
            .get(&SigHash::of(signature))
            .map(|&i| &self.slots[i])
    }

    /// Whether the catalog declares this exact signal.
    pub fn has_signal(&self, signature: &Signature) -> bool {
        self.signal(signature).is_some()
    }

    /// Whether the catalog declares this exact slot.
    pub fn has_slot(&self, signature: &Signature) -> bool {
        self.slot(signature).is_some()
    }
}

/// A compile-time object participating in the bridge.
///
/// Implementors expose their catalog through [`ObjectMeta`] and perform
/// their own dispatch in `invoke_slot`; the bridge only ever calls slots
/// that the catalog declared and that a validated connection targeted,
/// truncated to the slot's declared arity.
pub trait NativeObject {
    /// The object's introspectable catalog.
    fn meta(&self) -> &ObjectMeta;

    /// Execute the slot named by `slot` with the given arguments.
    fn invoke_slot(&mut self, slot: &Signature, args: &[HostValue]);
}
