//! The bridge facade: connection protocol and queued dispatch.
//!
//! A [`Bridge`] owns everything that participates in one host object graph:
//! the arena of dynamic objects, the registered native objects, the script
//! runtime table, and the delivery queue. Dynamic objects are parented to
//! the bridge, so dropping it tears everything down.
//!
//! ## Connection protocol
//!
//! `connect` picks one of four wiring strategies by inspecting whether each
//! endpoint is dynamic or native:
//!
//! 1. native → native: both catalogs are validated, then the record lands in
//!    the host graph's own table; no marshalling is involved.
//! 2. dynamic → native: the signal is registered on the source (assigning an
//!    id if new) and a synthetic emitter is installed into the source's
//!    script-visible namespace under the bare signal name.
//! 3. native → dynamic: the slot is registered on the target, bound to a
//!    fresh script callable for the target's method of the same bare name.
//! 4. dynamic → dynamic: both registrations plus the emitter, linked by a
//!    bridge-internal record.
//!
//! Every case re-validates signature compatibility and, where marshalling is
//! involved, resolves every type tag up front; a connection that would fail
//! at dispatch time is refused at connect time instead.
//!
//! ## Delivery
//!
//! Emits never call handlers synchronously. They append to the FIFO queue
//! and return; [`Bridge::dispatch_pending`] drains the queue on a later
//! event-loop iteration. A delivery whose destination was disposed in the
//! meantime is dropped, never dispatched into a freed target.

use tracing::{debug, trace, warn};

use slotwire_core::{
    BridgeError, ConnectError, ConnectionTable, DeliveryQueue, DeliveryTarget, DynamicHandle,
    DynamicObject, Emitter, Endpoint, HostValue, MarshallerRegistry, NativeHandle, NativeObject,
    ObjectArena, ScriptCallable, ScriptStack, SigHash, Signature, SlotId,
};

use crate::script::{ScriptMethod, ScriptReceiver, ScriptRuntime};

/// Either kind of connectable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Dynamic(DynamicHandle),
    Native(NativeHandle),
}

impl From<DynamicHandle> for Handle {
    fn from(handle: DynamicHandle) -> Self {
        Handle::Dynamic(handle)
    }
}

impl From<NativeHandle> for Handle {
    fn from(handle: NativeHandle) -> Self {
        Handle::Native(handle)
    }
}

/// Outcome of one [`Bridge::dispatch_pending`] drain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Deliveries that reached their target.
    pub delivered: usize,
    /// Deliveries dropped because the destination was disposed.
    pub dropped: usize,
    /// Deliveries aborted because an argument failed to unmarshal.
    pub failed: usize,
}

struct NativeEntry {
    object: Box<dyn NativeObject>,
    connections: ConnectionTable<SigHash>,
}

/// One host object graph with an embedded script runtime.
#[derive(Default)]
pub struct Bridge {
    objects: ObjectArena,
    natives: Vec<Option<NativeEntry>>,
    queue: DeliveryQueue,
    script: ScriptRuntime,
}

impl Bridge {
    /// Create an empty bridge.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Object management
    // ========================================================================

    /// Create a dynamic object parented to this bridge.
    ///
    /// The object starts with an empty catalog and an empty script-side
    /// table pinned in the runtime.
    pub fn create_dynamic_object(&mut self) -> DynamicHandle {
        let table = self.script.pin(ScriptReceiver::new());
        let handle = self.objects.insert(DynamicObject::new(table));
        debug!(%handle, "dynamic object created");
        handle
    }

    /// Register a native object with the host graph.
    pub fn register_native(&mut self, object: Box<dyn NativeObject>) -> NativeHandle {
        let handle = NativeHandle::new(self.natives.len() as u32);
        self.natives.push(Some(NativeEntry {
            object,
            connections: ConnectionTable::new(),
        }));
        handle
    }

    /// Whether `handle` still refers to a live dynamic object.
    pub fn is_live(&self, handle: DynamicHandle) -> bool {
        self.objects.contains(handle)
    }

    /// Dispose a dynamic object.
    ///
    /// Releases every script reference the object owned, severs all
    /// connections referencing it, and invalidates every copy of the
    /// handle. Deliveries already queued for the object are dropped at
    /// dispatch time. Returns whether the handle was live.
    pub fn dispose(&mut self, handle: DynamicHandle) -> bool {
        let Some(object) = self.objects.remove(handle) else {
            return false;
        };
        let table = object.script_table();
        for callable in object.into_callables() {
            self.script.release(callable.receiver());
        }
        self.script.release(table);

        for (_, other) in self.objects.iter_mut() {
            other.connections_mut().purge_targets(|t| t.targets_dynamic(handle));
        }
        for entry in self.natives.iter_mut().flatten() {
            entry.connections.purge_targets(|t| t.targets_dynamic(handle));
        }
        debug!(%handle, "dynamic object disposed");
        true
    }

    /// Remove a native object from the host graph, severing all connections
    /// referencing it. Queued deliveries into it are dropped at dispatch
    /// time. Returns whether the handle was live.
    pub fn remove_native(&mut self, handle: NativeHandle) -> bool {
        let index = handle.index() as usize;
        let Some(slot) = self.natives.get_mut(index) else {
            return false;
        };
        if slot.take().is_none() {
            return false;
        }
        for (_, object) in self.objects.iter_mut() {
            object.connections_mut().purge_targets(|t| t.targets_native(handle));
        }
        for entry in self.natives.iter_mut().flatten() {
            entry.connections.purge_targets(|t| t.targets_native(handle));
        }
        true
    }

    /// Define (or redefine) a method on a dynamic object's script table.
    pub fn define_method(&mut self, handle: DynamicHandle, name: &str, method: ScriptMethod) -> bool {
        let Some(object) = self.objects.get(handle) else {
            return false;
        };
        let table = object.script_table();
        match self.script.receiver_mut(table) {
            Some(receiver) => {
                receiver.define(name, method);
                true
            }
            None => false,
        }
    }

    /// Remove a method from a dynamic object's script table.
    ///
    /// Connections targeting the method stay installed; dispatch into the
    /// missing method becomes a silent no-op.
    pub fn clear_method(&mut self, handle: DynamicHandle, name: &str) -> bool {
        let Some(object) = self.objects.get(handle) else {
            return false;
        };
        let table = object.script_table();
        self.script
            .receiver_mut(table)
            .map(|receiver| receiver.clear(name))
            .unwrap_or(false)
    }

    /// Whether the object's script-visible namespace has an emitter under
    /// `name`.
    pub fn has_emitter(&self, handle: DynamicHandle, name: &str) -> bool {
        self.objects
            .get(handle)
            .map(|o| o.emitter(name).is_some())
            .unwrap_or(false)
    }

    // ========================================================================
    // Connection protocol
    // ========================================================================

    /// Install a queued connection from `signal` on `src` to `slot` on
    /// `dst`.
    ///
    /// Connections are deduplicated: re-connecting an identical quadruple
    /// keeps the existing record, and an emit still delivers once.
    pub fn connect(
        &mut self,
        src: Handle,
        signal: &str,
        dst: Handle,
        slot: &str,
    ) -> Result<(), ConnectError> {
        let signal_sig = Signature::parse(signal)?;
        let slot_sig = Signature::parse(slot)?;

        if !slot_sig.accepts(&signal_sig) {
            return Err(ConnectError::IncompatibleSignature {
                signal: signal_sig.to_string(),
                slot: slot_sig.to_string(),
            });
        }

        match (src, dst) {
            (Handle::Native(s), Handle::Native(t)) => {
                self.connect_native_to_native(s, &signal_sig, t, &slot_sig)
            }
            (Handle::Dynamic(s), Handle::Native(t)) => {
                self.connect_dynamic_to_native(s, &signal_sig, t, &slot_sig)
            }
            (Handle::Native(s), Handle::Dynamic(t)) => {
                self.connect_native_to_dynamic(s, &signal_sig, t, &slot_sig)
            }
            (Handle::Dynamic(s), Handle::Dynamic(t)) => {
                self.connect_dynamic_to_dynamic(s, &signal_sig, t, &slot_sig)
            }
        }
    }

    /// Boolean-result variant of [`Bridge::connect`], the scripting-facing
    /// surface: refusals are logged and folded to `false`.
    pub fn try_connect(&mut self, src: Handle, signal: &str, dst: Handle, slot: &str) -> bool {
        match self.connect(src, signal, dst, slot) {
            Ok(()) => true,
            Err(err) => {
                warn!(signal, slot, %err, "connection refused");
                false
            }
        }
    }

    /// Remove every connection matching the quadruple.
    ///
    /// Returns whether any record was removed. Stale handles and
    /// never-registered signatures remove nothing.
    pub fn disconnect(
        &mut self,
        src: Handle,
        signal: &str,
        dst: Handle,
        slot: &str,
    ) -> Result<bool, ConnectError> {
        let signal_sig = Signature::parse(signal)?;
        let slot_sig = Signature::parse(slot)?;

        let target = match dst {
            Handle::Native(t) => Endpoint::Native {
                object: t,
                slot: slot_sig,
            },
            Handle::Dynamic(t) => {
                let Some(slot_id) = self.objects.get(t).and_then(|o| o.slot_id(&slot_sig)) else {
                    return Ok(false);
                };
                Endpoint::Script {
                    object: t,
                    slot: slot_id,
                }
            }
        };

        let removed = match src {
            Handle::Dynamic(s) => {
                let Some(object) = self.objects.get_mut(s) else {
                    return Ok(false);
                };
                let Some(signal_id) = object.signal_id(&signal_sig) else {
                    return Ok(false);
                };
                object.connections_mut().detach(signal_id, &target)
            }
            Handle::Native(s) => {
                let Some(entry) = self.native_entry_mut(s) else {
                    return Ok(false);
                };
                entry.connections.detach(SigHash::of(&signal_sig), &target)
            }
        };
        Ok(removed > 0)
    }

    fn connect_native_to_native(
        &mut self,
        src: NativeHandle,
        signal: &Signature,
        dst: NativeHandle,
        slot: &Signature,
    ) -> Result<(), ConnectError> {
        self.check_native_signal(src, signal)?;
        self.check_native_slot(dst, slot)?;

        let target = Endpoint::Native {
            object: dst,
            slot: slot.clone(),
        };
        let entry = self.native_entry_mut(src).ok_or(ConnectError::StaleNativeObject)?;
        if entry.connections.attach(SigHash::of(signal), target).is_none() {
            debug!(%signal, %slot, "duplicate connection ignored");
        }
        Ok(())
    }

    fn connect_dynamic_to_native(
        &mut self,
        src: DynamicHandle,
        signal: &Signature,
        dst: NativeHandle,
        slot: &Signature,
    ) -> Result<(), ConnectError> {
        if !self.objects.contains(src) {
            return Err(ConnectError::StaleObject);
        }
        self.check_native_slot(dst, slot)?;
        let marshallers = MarshallerRegistry::global().marshaller_list(signal)?;

        let object = self.objects.get_mut(src).ok_or(ConnectError::StaleObject)?;
        let signal_id = object.register_signal_use(signal);
        object.install_emitter(Emitter::new(signal.clone(), marshallers));

        let target = Endpoint::Native {
            object: dst,
            slot: slot.clone(),
        };
        if object.connections_mut().attach(signal_id, target).is_none() {
            debug!(%signal, %slot, "duplicate connection ignored");
        }
        Ok(())
    }

    fn connect_native_to_dynamic(
        &mut self,
        src: NativeHandle,
        signal: &Signature,
        dst: DynamicHandle,
        slot: &Signature,
    ) -> Result<(), ConnectError> {
        self.check_native_signal(src, signal)?;
        if !self.objects.contains(dst) {
            return Err(ConnectError::StaleObject);
        }
        let slot_id = self.register_script_slot(dst, slot)?;

        let target = Endpoint::Script {
            object: dst,
            slot: slot_id,
        };
        let entry = self.native_entry_mut(src).ok_or(ConnectError::StaleNativeObject)?;
        if entry.connections.attach(SigHash::of(signal), target).is_none() {
            debug!(%signal, %slot, "duplicate connection ignored");
        }
        Ok(())
    }

    fn connect_dynamic_to_dynamic(
        &mut self,
        src: DynamicHandle,
        signal: &Signature,
        dst: DynamicHandle,
        slot: &Signature,
    ) -> Result<(), ConnectError> {
        if !self.objects.contains(src) || !self.objects.contains(dst) {
            return Err(ConnectError::StaleObject);
        }
        let emit_marshallers = MarshallerRegistry::global().marshaller_list(signal)?;
        let slot_id = self.register_script_slot(dst, slot)?;

        let object = self.objects.get_mut(src).ok_or(ConnectError::StaleObject)?;
        let signal_id = object.register_signal_use(signal);
        object.install_emitter(Emitter::new(signal.clone(), emit_marshallers));

        let target = Endpoint::Script {
            object: dst,
            slot: slot_id,
        };
        if object.connections_mut().attach(signal_id, target).is_none() {
            debug!(%signal, %slot, "duplicate connection ignored");
        }
        Ok(())
    }

    /// Register `slot` on the target dynamic object, binding a fresh script
    /// callable unless the signature already has one (first registration
    /// wins).
    fn register_script_slot(
        &mut self,
        dst: DynamicHandle,
        slot: &Signature,
    ) -> Result<SlotId, ConnectError> {
        let marshallers = MarshallerRegistry::global().marshaller_list(slot)?;

        let object = self.objects.get(dst).ok_or(ConnectError::StaleObject)?;
        if let Some(existing) = object.slot_id(slot) {
            return Ok(existing);
        }

        let table = object.script_table();
        self.script.retain(table);
        let callable = ScriptCallable::new(table, slot.name(), marshallers);

        let object = self.objects.get_mut(dst).ok_or(ConnectError::StaleObject)?;
        let (slot_id, rejected) = object.register_slot(slot, callable);
        if let Some(rejected) = rejected {
            // First registration wins; the unused callable's ref goes back.
            self.script.release(rejected.receiver());
        }
        Ok(slot_id)
    }

    fn check_native_signal(
        &self,
        handle: NativeHandle,
        signal: &Signature,
    ) -> Result<(), ConnectError> {
        let entry = self.native_entry(handle).ok_or(ConnectError::StaleNativeObject)?;
        let meta = entry.object.meta();
        if !meta.has_signal(signal) {
            return Err(ConnectError::NoSuchNativeMember {
                class: meta.class_name().to_string(),
                member: signal.to_string(),
            });
        }
        Ok(())
    }

    fn check_native_slot(
        &self,
        handle: NativeHandle,
        slot: &Signature,
    ) -> Result<(), ConnectError> {
        let entry = self.native_entry(handle).ok_or(ConnectError::StaleNativeObject)?;
        let meta = entry.object.meta();
        if !meta.has_slot(slot) {
            return Err(ConnectError::NoSuchNativeMember {
                class: meta.class_name().to_string(),
                member: slot.to_string(),
            });
        }
        Ok(())
    }

    fn native_entry(&self, handle: NativeHandle) -> Option<&NativeEntry> {
        self.natives.get(handle.index() as usize)?.as_ref()
    }

    fn native_entry_mut(&mut self, handle: NativeHandle) -> Option<&mut NativeEntry> {
        self.natives.get_mut(handle.index() as usize)?.as_mut()
    }

    // ========================================================================
    // Emitting
    // ========================================================================

    /// Call the emitter published under `name` on a dynamic object's
    /// script-visible namespace, with positional scripting arguments.
    ///
    /// Equivalent to emitting the connected signal signature. Returns
    /// whether at least one connection existed; an unknown emitter name
    /// delivers nothing. A wrong-typed argument aborts the whole emit.
    pub fn call_emitter(
        &mut self,
        handle: DynamicHandle,
        name: &str,
        stack: &ScriptStack,
    ) -> Result<bool, BridgeError> {
        let object = self
            .objects
            .get(handle)
            .ok_or(ConnectError::StaleObject)
            .map_err(BridgeError::from)?;
        let Some(emitter) = object.emitter(name) else {
            trace!(name, "no emitter under that name");
            return Ok(false);
        };
        let signature = emitter.signature().clone();
        let args = emitter.marshal_args(stack).map_err(BridgeError::from)?;
        Ok(self.emit_from_dynamic(handle, &signature, args))
    }

    /// Emit `signal` from a dynamic object with already-marshalled
    /// arguments.
    ///
    /// Emitting a signal that was never registered is a silent no-op
    /// reporting `false`; script code may emit signals no one has connected
    /// yet.
    pub fn emit_dynamic(
        &mut self,
        handle: DynamicHandle,
        signal: &str,
        args: Vec<HostValue>,
    ) -> Result<bool, BridgeError> {
        let signature = Signature::parse(signal).map_err(BridgeError::from)?;
        if !self.objects.contains(handle) {
            return Err(ConnectError::StaleObject.into());
        }
        Ok(self.emit_from_dynamic(handle, &signature, args))
    }

    /// Emit a declared signal from a native object.
    pub fn emit_native(
        &mut self,
        handle: NativeHandle,
        signal: &str,
        args: Vec<HostValue>,
    ) -> Result<bool, BridgeError> {
        let signature = Signature::parse(signal).map_err(BridgeError::from)?;
        self.check_native_signal(handle, &signature)
            .map_err(BridgeError::from)?;

        let hash = SigHash::of(&signature);
        let entry = self
            .native_entry(handle)
            .ok_or(ConnectError::StaleNativeObject)
            .map_err(BridgeError::from)?;
        let targets: Vec<Endpoint> = entry
            .connections
            .records(hash)
            .iter()
            .map(|r| r.target.clone())
            .collect();
        Ok(self.enqueue_all(&targets, args))
    }

    fn emit_from_dynamic(
        &mut self,
        handle: DynamicHandle,
        signature: &Signature,
        args: Vec<HostValue>,
    ) -> bool {
        let Some(object) = self.objects.get(handle) else {
            return false;
        };
        let Some(signal_id) = object.signal_id(signature) else {
            trace!(signal = %signature, "emit of unregistered signal, not delivered");
            return false;
        };
        let targets: Vec<Endpoint> = object
            .connections()
            .records(signal_id)
            .iter()
            .map(|r| r.target.clone())
            .collect();
        self.enqueue_all(&targets, args)
    }

    fn enqueue_all(&mut self, targets: &[Endpoint], args: Vec<HostValue>) -> bool {
        if targets.is_empty() {
            return false;
        }
        for target in targets {
            let delivery_target = match target {
                Endpoint::Native { object, slot } => DeliveryTarget::Native {
                    object: *object,
                    slot: slot.clone(),
                },
                Endpoint::Script { object, slot } => DeliveryTarget::Script {
                    object: *object,
                    slot: *slot,
                },
            };
            self.queue.push(delivery_target, args.clone());
        }
        true
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Number of deliveries waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drain the delivery queue in FIFO order.
    ///
    /// Deliveries whose destination has been disposed are dropped; a
    /// delivery whose arguments fail to unmarshal is aborted and reported,
    /// and the drain continues.
    pub fn dispatch_pending(&mut self) -> DispatchStats {
        let mut stats = DispatchStats::default();
        while let Some(delivery) = self.queue.pop() {
            match delivery.target {
                DeliveryTarget::Native { object, slot } => {
                    let index = object.index() as usize;
                    match self.natives.get_mut(index).and_then(Option::as_mut) {
                        Some(entry) => {
                            let argc = slot.arity().min(delivery.args.len());
                            entry.object.invoke_slot(&slot, &delivery.args[..argc]);
                            stats.delivered += 1;
                        }
                        None => {
                            trace!(seq = delivery.seq, "destination removed, delivery dropped");
                            stats.dropped += 1;
                        }
                    }
                }
                DeliveryTarget::Script { object, slot } => {
                    let Some(target) = self.objects.get(object) else {
                        trace!(seq = delivery.seq, "destination disposed, delivery dropped");
                        stats.dropped += 1;
                        continue;
                    };
                    // A connection can only reference a slot its object
                    // registered; a missing entry means the slot table was
                    // torn down under a live connection.
                    let callable = target
                        .slot(slot)
                        .unwrap_or_else(|| panic!("connection references invalid {slot}"));
                    match callable.unmarshal_args(&delivery.args) {
                        Ok(stack) => {
                            let receiver = callable.receiver();
                            let method = callable.method();
                            if !self.script.invoke(receiver, method, stack.values()) {
                                trace!(method, "receiver does not define the method, skipped");
                            }
                            stats.delivered += 1;
                        }
                        Err(err) => {
                            warn!(seq = delivery.seq, %err, "dispatch aborted");
                            stats.failed += 1;
                        }
                    }
                }
            }
        }
        stats
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("dynamic_objects", &self.objects.len())
            .field("pending", &self.queue.len())
            .finish()
    }
}
