//! Dynamic objects: runtime-populated signal and slot catalogs.
//!
//! A dynamic object is a host object whose signal/slot catalog is built at
//! run time instead of compile time. Signals and slots are keyed by
//! normalized signature hash; ids are assigned sequentially on first use and
//! never reused. The slot table is append-only, a slot id simply being its
//! index. The object also owns its connection table (per-signal record
//! lists) and its emitter namespace, the script-visible callables installed
//! by the connection protocol.

use rustc_hash::FxHashMap;

use crate::callable::ScriptCallable;
use crate::connection::ConnectionTable;
use crate::error::DispatchError;
use crate::ids::{ScriptRef, SignalId, SlotId};
use crate::marshal::Marshaller;
use crate::sig_hash::SigHash;
use crate::signature::Signature;
use crate::value::{HostValue, ScriptStack};

/// A synthetic signal emitter installed into the object's script-visible
/// namespace after a successful connect.
///
/// Calling it marshals positional scripting arguments through the signal's
/// marshaller list and emits the signal.
pub struct Emitter {
    signature: Signature,
    marshallers: Vec<&'static dyn Marshaller>,
}

impl Emitter {
    /// Create an emitter for `signature` with its resolved marshaller list.
    pub fn new(signature: Signature, marshallers: Vec<&'static dyn Marshaller>) -> Self {
        Self {
            signature,
            marshallers,
        }
    }

    /// The full signal signature this emitter raises.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Marshal a scripting call stack into an owned argument vector.
    ///
    /// A value of the wrong dynamic type aborts the whole emit; nothing is
    /// enqueued with a partially converted vector.
    pub fn marshal_args(&self, stack: &ScriptStack) -> Result<Vec<HostValue>, DispatchError> {
        let mut args = Vec::with_capacity(self.marshallers.len());
        for (index, marshaller) in self.marshallers.iter().enumerate() {
            match marshaller.marshal(stack, index) {
                Some(value) => args.push(value),
                None => {
                    return Err(DispatchError::ArgumentMismatch {
                        index,
                        tag: marshaller.type_tag(),
                    });
                }
            }
        }
        Ok(args)
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("signature", &self.signature.to_string())
            .finish()
    }
}

/// A host object with a runtime-defined signal/slot catalog.
pub struct DynamicObject {
    script_table: ScriptRef,
    signal_ids: FxHashMap<SigHash, SignalId>,
    signal_sigs: Vec<Signature>,
    slot_ids: FxHashMap<SigHash, SlotId>,
    slots: Vec<ScriptCallable>,
    connections: ConnectionTable<SignalId>,
    emitters: FxHashMap<String, Emitter>,
}

impl DynamicObject {
    /// Create an empty dynamic object whose script-side table is
    /// `script_table`.
    pub fn new(script_table: ScriptRef) -> Self {
        Self {
            script_table,
            signal_ids: FxHashMap::default(),
            signal_sigs: Vec::new(),
            slot_ids: FxHashMap::default(),
            slots: Vec::new(),
            connections: ConnectionTable::new(),
            emitters: FxHashMap::default(),
        }
    }

    /// The strong reference to this object's script-side table.
    pub fn script_table(&self) -> ScriptRef {
        self.script_table
    }

    /// Record a use of `signature` as a signal, assigning the next
    /// sequential id if it is unseen. Idempotent for the same normalized
    /// signature.
    pub fn register_signal_use(&mut self, signature: &Signature) -> SignalId {
        let hash = SigHash::of(signature);
        if let Some(&id) = self.signal_ids.get(&hash) {
            return id;
        }
        let id = SignalId::new(self.signal_sigs.len() as u32);
        self.signal_ids.insert(hash, id);
        self.signal_sigs.push(signature.clone());
        id
    }

    /// The id assigned to `signature`, if it was ever registered.
    pub fn signal_id(&self, signature: &Signature) -> Option<SignalId> {
        self.signal_ids.get(&SigHash::of(signature)).copied()
    }

    /// The signature registered under `id`.
    pub fn signal_signature(&self, id: SignalId) -> Option<&Signature> {
        self.signal_sigs.get(id.index() as usize)
    }

    /// Register `signature` as a slot backed by `callable`.
    ///
    /// First registration wins: if the signature is already present, the
    /// existing id is returned together with the rejected callable so the
    /// caller can release whatever it owns.
    pub fn register_slot(
        &mut self,
        signature: &Signature,
        callable: ScriptCallable,
    ) -> (SlotId, Option<ScriptCallable>) {
        let hash = SigHash::of(signature);
        if let Some(&id) = self.slot_ids.get(&hash) {
            return (id, Some(callable));
        }
        let id = SlotId::new(self.slots.len() as u32);
        self.slot_ids.insert(hash, id);
        self.slots.push(callable);
        (id, None)
    }

    /// The id assigned to a slot `signature`, if registered.
    pub fn slot_id(&self, signature: &Signature) -> Option<SlotId> {
        self.slot_ids.get(&SigHash::of(signature)).copied()
    }

    /// The callable stored at `id`.
    pub fn slot(&self, id: SlotId) -> Option<&ScriptCallable> {
        self.slots.get(id.index() as usize)
    }

    /// Number of entries in the slot table.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Install (or replace) the emitter published under the bare signal
    /// name. Reconnecting the same signal reuses the entry instead of
    /// stacking duplicates.
    pub fn install_emitter(&mut self, emitter: Emitter) {
        self.emitters
            .insert(emitter.signature().name().to_string(), emitter);
    }

    /// The emitter published under `name`.
    pub fn emitter(&self, name: &str) -> Option<&Emitter> {
        self.emitters.get(name)
    }

    /// This object's connection table.
    pub fn connections(&self) -> &ConnectionTable<SignalId> {
        &self.connections
    }

    /// Mutable access to this object's connection table.
    pub fn connections_mut(&mut self) -> &mut ConnectionTable<SignalId> {
        &mut self.connections
    }

    /// Consume the object, yielding the callables its slot table owned.
    /// Used at disposal time to release their script references.
    pub fn into_callables(self) -> Vec<ScriptCallable> {
        self.slots
    }
}

impl std::fmt::Debug for DynamicObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicObject")
            .field("script_table", &self.script_table)
            .field("signals", &self.signal_sigs.len())
            .field("slots", &self.slots.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::MarshallerRegistry;

    fn sig(text: &str) -> Signature {
        Signature::parse(text).unwrap()
    }

    fn callable(method: &str) -> ScriptCallable {
        ScriptCallable::new(ScriptRef::new(0), method, Vec::new())
    }

    #[test]
    fn signal_ids_are_sequential_and_idempotent() {
        let mut object = DynamicObject::new(ScriptRef::new(0));
        let a = object.register_signal_use(&sig("ready(int)"));
        let b = object.register_signal_use(&sig("closed()"));
        assert_eq!(a, SignalId::new(0));
        assert_eq!(b, SignalId::new(1));

        // Same normalized signature, same id.
        assert_eq!(object.register_signal_use(&sig("ready( int )")), a);
        assert_eq!(object.signal_id(&sig("ready(int)")), Some(a));
        assert_eq!(object.signal_signature(a), Some(&sig("ready(int)")));
    }

    #[test]
    fn unregistered_signal_has_no_id() {
        let object = DynamicObject::new(ScriptRef::new(0));
        assert_eq!(object.signal_id(&sig("never()")), None);
    }

    #[test]
    fn slot_first_registration_wins() {
        let mut object = DynamicObject::new(ScriptRef::new(0));
        let (id, rejected) = object.register_slot(&sig("onReady(int)"), callable("first"));
        assert_eq!(id, SlotId::new(0));
        assert!(rejected.is_none());

        let (again, rejected) = object.register_slot(&sig("onReady(int)"), callable("second"));
        assert_eq!(again, id);
        // The new callable is handed back, the stored one is untouched.
        assert_eq!(rejected.unwrap().method(), "second");
        assert_eq!(object.slot(id).unwrap().method(), "first");
        assert_eq!(object.slot_count(), 1);
    }

    #[test]
    fn emitter_install_replaces() {
        let registry = MarshallerRegistry::global();
        let mut object = DynamicObject::new(ScriptRef::new(0));

        let one = sig("ready(int)");
        let list = registry.marshaller_list(&one).unwrap();
        object.install_emitter(Emitter::new(one.clone(), list));
        assert_eq!(object.emitter("ready").unwrap().signature(), &one);

        // Reinstalling under the same bare name replaces the entry.
        let two = sig("ready(int,string)");
        let list = registry.marshaller_list(&two).unwrap();
        object.install_emitter(Emitter::new(two.clone(), list));
        assert_eq!(object.emitter("ready").unwrap().signature(), &two);
    }

    #[test]
    fn emitter_marshals_positionally() {
        let registry = MarshallerRegistry::global();
        let signature = sig("ready(int,string)");
        let list = registry.marshaller_list(&signature).unwrap();
        let emitter = Emitter::new(signature, list);

        let mut stack = ScriptStack::new();
        stack.push(3);
        stack.push("x");
        let args = emitter.marshal_args(&stack).unwrap();
        assert_eq!(args, vec![HostValue::Int(3), HostValue::Str("x".into())]);
    }

    #[test]
    fn emitter_aborts_on_bad_argument() {
        let registry = MarshallerRegistry::global();
        let signature = sig("ready(int)");
        let list = registry.marshaller_list(&signature).unwrap();
        let emitter = Emitter::new(signature, list);

        let mut stack = ScriptStack::new();
        stack.push("not an int");
        let err = emitter.marshal_args(&stack).unwrap_err();
        assert_eq!(err, DispatchError::ArgumentMismatch { index: 0, tag: "int" });
    }
}
