//! Dynamic signal/slot bridge between an embedded script runtime and an
//! event-driven host.
//!
//! Scripts create [`bridge::Bridge`]-owned dynamic objects whose signal and
//! slot catalogs are populated at run time, and connect them, in any
//! direction, to native objects whose catalogs are fixed at compile time.
//! Call arguments cross the static/dynamic boundary through a type
//! marshalling registry; all deliveries are queued and run on a later
//! event-loop iteration, never inside the emitting call frame.
//!
//! # Example
//!
//! ```
//! use slotwire::prelude::*;
//!
//! let mut bridge = Bridge::new();
//! let source = bridge.create_dynamic_object();
//! let sink = bridge.create_dynamic_object();
//!
//! bridge.define_method(sink, "onData", Box::new(|args| {
//!     assert_eq!(args[0], ScriptValue::Int(3));
//! }));
//!
//! assert!(bridge.try_connect(
//!     source.into(), "data(int)",
//!     sink.into(), "onData(int)",
//! ));
//!
//! let mut stack = ScriptStack::new();
//! stack.push(3);
//! bridge.call_emitter(source, "data", &stack).unwrap();
//!
//! // Nothing runs until the event loop turns.
//! let stats = bridge.dispatch_pending();
//! assert_eq!(stats.delivered, 1);
//! ```

pub mod bridge;
pub mod script;

pub use bridge::{Bridge, DispatchStats, Handle};
pub use script::{ScriptMethod, ScriptReceiver, ScriptRuntime};

// Re-export the core surface so embedders need a single dependency.
pub use slotwire_core::{
    BridgeError, ConnectError, ConnectionId, DispatchError, DynamicHandle, DynamicObject, Emitter,
    HostValue, Marshaller, MarshallerRegistry, NativeHandle, NativeObject, ObjectMeta, ParseError,
    ScriptCallable, ScriptRef, ScriptStack, ScriptValue, SigHash, Signature, SignalId, SlotId,
};

pub mod prelude {
    pub use crate::bridge::{Bridge, DispatchStats, Handle};
    pub use crate::script::{ScriptMethod, ScriptReceiver, ScriptRuntime};
    pub use slotwire_core::{
        BridgeError, ConnectError, DispatchError, HostValue, Marshaller, MarshallerRegistry,
        NativeObject, ObjectMeta, ParseError, ScriptStack, ScriptValue, Signature,
    };
}
