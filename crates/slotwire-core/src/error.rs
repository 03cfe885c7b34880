//! Unified error types for the bridge.
//!
//! This module provides a consistent error type hierarchy for the signature
//! parser, the connection protocol, and the queued dispatch path.
//!
//! ## Error Hierarchy
//!
//! ```text
//! BridgeError (top-level wrapper)
//! ├── ParseError    - Malformed signature text
//! ├── ConnectError  - Refused connections (non-fatal, reported to the caller)
//! └── DispatchError - Failures while delivering a queued call
//! ```
//!
//! Everything that originates from caller-supplied signatures or object
//! references is recoverable and returned as a value. Only bridge-internal
//! invariant violations (an invalid slot id reaching dispatch) are fatal.

use thiserror::Error;

/// Errors produced while parsing a signature string.
///
/// Signature text uses the form `name(tag,tag,...)`. Malformed input is
/// always surfaced as an error, never silently truncated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The text has no `(` introducing a parameter list.
    #[error("signature '{text}' has no parameter list")]
    MissingParameterList { text: String },

    /// The parameter list was opened but never closed with `)`.
    #[error("signature '{text}' has no closing parenthesis")]
    UnterminatedParameterList { text: String },

    /// Characters follow the closing `)`.
    #[error("signature '{text}' has trailing characters after ')'")]
    TrailingCharacters { text: String },

    /// The bare name before `(` is empty.
    #[error("signature '{text}' has an empty name")]
    EmptyName { text: String },

    /// A parameter position between commas is empty.
    #[error("signature '{text}' has an empty type tag")]
    EmptyTypeTag { text: String },
}

/// Reasons a connection request is refused.
///
/// All of these are non-fatal: `connect` reports them to the caller and
/// installs nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// One of the signature strings did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The slot's parameter types are not a prefix of the signal's.
    #[error("cannot connect signal '{signal}' to slot '{slot}'")]
    IncompatibleSignature { signal: String, slot: String },

    /// A referenced native signal or slot does not exist on the object.
    #[error("native object '{class}' has no member '{member}'")]
    NoSuchNativeMember { class: String, member: String },

    /// A signature references a type tag with no registered marshaller.
    ///
    /// Surfaced at connection time, not deferred to dispatch time.
    #[error("no marshaller registered for type tag '{tag}'")]
    UnknownTypeTag { tag: String },

    /// A handle refers to an object that has already been disposed.
    #[error("object handle is stale")]
    StaleObject,

    /// A handle refers to a native object that was removed from the host.
    #[error("native object handle is stale")]
    StaleNativeObject,
}

/// Failures while marshalling or delivering a queued call.
///
/// A failed delivery aborts that one dispatch; the queue keeps draining.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// An argument's dynamic type did not match the marshaller for its
    /// position. The whole call is aborted rather than delivered with a
    /// corrupted argument vector.
    #[error("argument {index} does not marshal as '{tag}'")]
    ArgumentMismatch { index: usize, tag: &'static str },
}

/// Top-level error wrapper for unified handling at the embedding surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
