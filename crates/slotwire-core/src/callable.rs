//! Script-side call targets stored in slot tables.

use crate::error::DispatchError;
use crate::ids::ScriptRef;
use crate::marshal::Marshaller;
use crate::value::{HostValue, ScriptStack};

/// A reference to a scripting-side method plus the marshaller list needed to
/// unmarshal an incoming call's arguments.
///
/// The callable holds a strong reference into the script runtime's registry
/// table (kept alive explicitly, released when the owning object is
/// disposed) identifying a receiver object, plus the bare method name to
/// call on it. It is owned by exactly one slot-table entry but may be the
/// target of any number of connections.
pub struct ScriptCallable {
    receiver: ScriptRef,
    method: String,
    marshallers: Vec<&'static dyn Marshaller>,
}

impl ScriptCallable {
    /// Create a callable for `method` on the receiver behind `receiver`.
    pub fn new(
        receiver: ScriptRef,
        method: impl Into<String>,
        marshallers: Vec<&'static dyn Marshaller>,
    ) -> Self {
        Self {
            receiver,
            method: method.into(),
            marshallers,
        }
    }

    /// The strong reference to the receiver object.
    pub fn receiver(&self) -> ScriptRef {
        self.receiver
    }

    /// The bare method name invoked on the receiver.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Number of arguments this callable unmarshals (the slot's arity).
    pub fn arity(&self) -> usize {
        self.marshallers.len()
    }

    /// Unmarshal an incoming argument vector into a scripting call stack.
    ///
    /// Only the first `arity()` arguments are consumed; trailing signal
    /// arguments beyond the slot's declared parameters are dropped. A value
    /// whose variant does not match its position's marshaller aborts the
    /// whole conversion: delivering a corrupted argument vector is worse
    /// than delivering nothing.
    pub fn unmarshal_args(&self, args: &[HostValue]) -> Result<ScriptStack, DispatchError> {
        let mut stack = ScriptStack::new();
        for (index, marshaller) in self.marshallers.iter().enumerate() {
            let tag = marshaller.type_tag();
            let Some(value) = args.get(index) else {
                return Err(DispatchError::ArgumentMismatch { index, tag });
            };
            if !marshaller.unmarshal(value, &mut stack) {
                return Err(DispatchError::ArgumentMismatch { index, tag });
            }
        }
        Ok(stack)
    }
}

impl std::fmt::Debug for ScriptCallable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptCallable")
            .field("receiver", &self.receiver)
            .field("method", &self.method)
            .field("arity", &self.arity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::MarshallerRegistry;
    use crate::signature::Signature;
    use crate::value::ScriptValue;

    fn callable_for(slot: &str) -> ScriptCallable {
        let sig = Signature::parse(slot).unwrap();
        let marshallers = MarshallerRegistry::global().marshaller_list(&sig).unwrap();
        ScriptCallable::new(ScriptRef::new(0), sig.name().to_string(), marshallers)
    }

    #[test]
    fn unmarshals_in_order() {
        let callable = callable_for("onData(int,string)");
        let stack = callable
            .unmarshal_args(&[HostValue::Int(3), HostValue::Str("x".into())])
            .unwrap();
        assert_eq!(
            stack.values(),
            &[ScriptValue::Int(3), ScriptValue::Str("x".into())]
        );
    }

    #[test]
    fn drops_trailing_signal_arguments() {
        let callable = callable_for("onData(int)");
        let stack = callable
            .unmarshal_args(&[HostValue::Int(3), HostValue::Str("extra".into())])
            .unwrap();
        assert_eq!(stack.values(), &[ScriptValue::Int(3)]);
    }

    #[test]
    fn mismatched_variant_aborts() {
        let callable = callable_for("onData(int,string)");
        let err = callable
            .unmarshal_args(&[HostValue::Str("no".into()), HostValue::Str("x".into())])
            .unwrap_err();
        assert_eq!(err, DispatchError::ArgumentMismatch { index: 0, tag: "int" });
    }

    #[test]
    fn missing_argument_aborts() {
        let callable = callable_for("onData(int,string)");
        let err = callable.unmarshal_args(&[HostValue::Int(1)]).unwrap_err();
        assert_eq!(err, DispatchError::ArgumentMismatch { index: 1, tag: "string" });
    }
}
