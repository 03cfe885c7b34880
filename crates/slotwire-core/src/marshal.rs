//! Type marshalling between scripting values and host values.
//!
//! A [`Marshaller`] is a bidirectional converter for one type tag:
//! `marshal` extracts one positional argument from the scripting call stack
//! and converts it to an owned [`HostValue`]; `unmarshal` pushes a host
//! value back onto the stack as a [`ScriptValue`]. Disposal of converted
//! values is ownership-based: host values are owned sum-type data, dropped
//! by whoever consumes them.
//!
//! The [`MarshallerRegistry`] maps type tags to marshallers. The process
//! holds one registry, read-only after initialization, so concurrent lookups
//! need no synchronization. Built-in tags: `int`, `int64`, `bool`, `string`,
//! `bytes`. A host may install an extended registry once, before first use.
//!
//! `marshal` returns `None` (not an error) when the value at the position
//! has the wrong dynamic type; callers decide how to react. Resolving a
//! signature to a marshaller list is strict: an unknown tag is a
//! connect-time [`ConnectError::UnknownTypeTag`].

use std::sync::OnceLock;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::error::ConnectError;
use crate::signature::Signature;
use crate::value::{HostValue, ScriptStack, ScriptValue};

static GLOBAL: OnceLock<MarshallerRegistry> = OnceLock::new();

/// Bidirectional converter between scripting and host values for one tag.
pub trait Marshaller: Send + Sync {
    /// The type tag this marshaller serves.
    fn type_tag(&self) -> &'static str;

    /// Extract and convert the argument at `index` from the stack.
    ///
    /// Returns `None` if the value at that position has the wrong dynamic
    /// type. Callers must check.
    fn marshal(&self, stack: &ScriptStack, index: usize) -> Option<HostValue>;

    /// Push a host value back onto the scripting stack.
    ///
    /// Returns `false` if the value's variant does not belong to this tag,
    /// in which case nothing is pushed.
    fn unmarshal(&self, value: &HostValue, stack: &mut ScriptStack) -> bool;
}

/// The registry was already initialized when `install` was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("marshaller registry already initialized")]
pub struct RegistryInitError;

/// Maps type tags to marshallers.
#[derive(Default)]
pub struct MarshallerRegistry {
    entries: FxHashMap<&'static str, Box<dyn Marshaller>>,
}

impl MarshallerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in marshallers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(IntMarshaller));
        registry.register(Box::new(Int64Marshaller));
        registry.register(Box::new(BoolMarshaller));
        registry.register(Box::new(StrMarshaller));
        registry.register(Box::new(BytesMarshaller));
        registry
    }

    /// Register a marshaller under its own tag, replacing any previous one.
    pub fn register(&mut self, marshaller: Box<dyn Marshaller>) {
        self.entries.insert(marshaller.type_tag(), marshaller);
    }

    /// Look up the marshaller for `tag`.
    ///
    /// An unknown tag yields `None`; that is not an error by itself.
    pub fn get(&self, tag: &str) -> Option<&dyn Marshaller> {
        self.entries.get(tag).map(|m| m.as_ref())
    }

    /// Resolve every tag of `signature` to a marshaller, in order.
    ///
    /// Strict: a tag with no registered marshaller fails with
    /// [`ConnectError::UnknownTypeTag`] instead of yielding a placeholder.
    pub fn marshaller_list<'a>(
        &'a self,
        signature: &Signature,
    ) -> Result<Vec<&'a dyn Marshaller>, ConnectError> {
        signature
            .params()
            .iter()
            .map(|tag| {
                self.get(tag).ok_or_else(|| ConnectError::UnknownTypeTag {
                    tag: tag.clone(),
                })
            })
            .collect()
    }

    /// The process-wide registry.
    ///
    /// Initialized with the built-in set on first access unless a custom
    /// registry was installed earlier.
    pub fn global() -> &'static MarshallerRegistry {
        GLOBAL.get_or_init(Self::with_builtins)
    }

    /// Install `registry` as the process-wide registry.
    ///
    /// Must happen before the first call to [`MarshallerRegistry::global`];
    /// afterwards the registry is read-only and installation fails.
    pub fn install(registry: MarshallerRegistry) -> Result<(), RegistryInitError> {
        GLOBAL.set(registry).map_err(|_| RegistryInitError)
    }
}

// ============================================================================
// Built-in marshallers
// ============================================================================

/// Accept a scripting value as an integer if it is one, including floats
/// with zero fraction.
fn as_integer(value: &ScriptValue) -> Option<i64> {
    match value {
        ScriptValue::Int(v) => Some(*v),
        ScriptValue::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
        _ => None,
    }
}

/// 32-bit integer, range-checked.
struct IntMarshaller;

impl Marshaller for IntMarshaller {
    fn type_tag(&self) -> &'static str {
        "int"
    }

    fn marshal(&self, stack: &ScriptStack, index: usize) -> Option<HostValue> {
        let v = as_integer(stack.get(index)?)?;
        i32::try_from(v).ok().map(HostValue::Int)
    }

    fn unmarshal(&self, value: &HostValue, stack: &mut ScriptStack) -> bool {
        match value {
            HostValue::Int(v) => {
                stack.push(ScriptValue::Int(*v as i64));
                true
            }
            _ => false,
        }
    }
}

/// 64-bit integer.
struct Int64Marshaller;

impl Marshaller for Int64Marshaller {
    fn type_tag(&self) -> &'static str {
        "int64"
    }

    fn marshal(&self, stack: &ScriptStack, index: usize) -> Option<HostValue> {
        as_integer(stack.get(index)?).map(HostValue::Int64)
    }

    fn unmarshal(&self, value: &HostValue, stack: &mut ScriptStack) -> bool {
        match value {
            HostValue::Int64(v) => {
                stack.push(ScriptValue::Int(*v));
                true
            }
            _ => false,
        }
    }
}

/// Boolean. Never fails: scripting truthiness coerces any value, and a
/// missing argument reads as nil.
struct BoolMarshaller;

impl Marshaller for BoolMarshaller {
    fn type_tag(&self) -> &'static str {
        "bool"
    }

    fn marshal(&self, stack: &ScriptStack, index: usize) -> Option<HostValue> {
        let truthy = stack.get(index).map(ScriptValue::is_truthy).unwrap_or(false);
        Some(HostValue::Bool(truthy))
    }

    fn unmarshal(&self, value: &HostValue, stack: &mut ScriptStack) -> bool {
        match value {
            HostValue::Bool(v) => {
                stack.push(ScriptValue::Bool(*v));
                true
            }
            _ => false,
        }
    }
}

/// UTF-8 string. Accepts scripting strings, UTF-8 byte buffers, and numeric
/// coercion.
struct StrMarshaller;

impl Marshaller for StrMarshaller {
    fn type_tag(&self) -> &'static str {
        "string"
    }

    fn marshal(&self, stack: &ScriptStack, index: usize) -> Option<HostValue> {
        match stack.get(index)? {
            ScriptValue::Str(s) => Some(HostValue::Str(s.clone())),
            ScriptValue::Bytes(b) => String::from_utf8(b.clone()).ok().map(HostValue::Str),
            ScriptValue::Int(v) => Some(HostValue::Str(v.to_string())),
            ScriptValue::Number(n) => Some(HostValue::Str(n.to_string())),
            _ => None,
        }
    }

    fn unmarshal(&self, value: &HostValue, stack: &mut ScriptStack) -> bool {
        match value {
            HostValue::Str(s) => {
                stack.push(ScriptValue::Str(s.clone()));
                true
            }
            _ => false,
        }
    }
}

/// Raw byte buffer. Accepts scripting strings and byte buffers.
struct BytesMarshaller;

impl Marshaller for BytesMarshaller {
    fn type_tag(&self) -> &'static str {
        "bytes"
    }

    fn marshal(&self, stack: &ScriptStack, index: usize) -> Option<HostValue> {
        match stack.get(index)? {
            ScriptValue::Bytes(b) => Some(HostValue::Bytes(b.clone())),
            ScriptValue::Str(s) => Some(HostValue::Bytes(s.clone().into_bytes())),
            _ => None,
        }
    }

    fn unmarshal(&self, value: &HostValue, stack: &mut ScriptStack) -> bool {
        match value {
            HostValue::Bytes(b) => {
                stack.push(ScriptValue::Bytes(b.clone()));
                true
            }
            _ => false,
        }
    }
}
