//! Core mechanism of the slotwire dynamic object bridge.
//!
//! This crate holds everything below the embedding surface: boundary value
//! types, the marshalling registry, signature parsing, dynamic objects and
//! their script callables, per-object connection tables, the generational
//! object arena, the FIFO delivery queue, and the native-object adapter.
//! The `slotwire` crate on top of it provides the `Bridge` facade (the
//! connection protocol and dispatch loop) and the script runtime table.

pub mod arena;
pub mod callable;
pub mod connection;
pub mod error;
pub mod ids;
pub mod marshal;
pub mod native;
pub mod object;
pub mod queue;
pub mod sig_hash;
pub mod signature;
pub mod value;

pub use arena::{DynamicHandle, ObjectArena};
pub use callable::ScriptCallable;
pub use connection::{ConnectionRecord, ConnectionTable, Endpoint};
pub use error::{BridgeError, ConnectError, DispatchError, ParseError};
pub use ids::{ConnectionId, NativeHandle, ScriptRef, SignalId, SlotId};
pub use marshal::{Marshaller, MarshallerRegistry, RegistryInitError};
pub use native::{NativeObject, ObjectMeta};
pub use object::{DynamicObject, Emitter};
pub use queue::{Delivery, DeliveryQueue, DeliveryTarget};
pub use sig_hash::SigHash;
pub use signature::Signature;
pub use value::{HostValue, ScriptStack, ScriptValue};
