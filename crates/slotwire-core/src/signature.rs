//! Call signature parsing and compatibility.
//!
//! A signature is textual: a bare method or signal name followed by an
//! ordered parameter type tag list, `name(tag,tag,...)`. Signatures are
//! normalized (ASCII whitespace stripped) before parsing, so `"ping( int )"`
//! and `"ping(int)"` are the same signature.
//!
//! Compatibility follows the observer-connection rule: a slot may accept a
//! *prefix* of the signal's arguments, in order, with exactly matching tags.
//! Extra trailing signal arguments are dropped at dispatch time.

use std::fmt;

use crate::error::ParseError;

/// A parsed call signature: bare name plus ordered type tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    name: String,
    params: Vec<String>,
}

impl Signature {
    /// Parse signature text of the form `name(tag,tag,...)`.
    ///
    /// The text is normalized first: all ASCII whitespace is removed.
    /// Malformed input fails with a [`ParseError`]; in particular a missing
    /// closing parenthesis is an error, never a silent truncation.
    ///
    /// # Examples
    ///
    /// ```
    /// use slotwire_core::Signature;
    ///
    /// let sig = Signature::parse("dataReady(int, bytes)").unwrap();
    /// assert_eq!(sig.name(), "dataReady");
    /// assert_eq!(sig.params(), &["int".to_string(), "bytes".to_string()]);
    ///
    /// assert!(Signature::parse("dataReady(int").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let normalized: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();

        let Some(open) = normalized.find('(') else {
            return Err(ParseError::MissingParameterList { text: normalized });
        };
        let Some(close) = normalized.rfind(')') else {
            return Err(ParseError::UnterminatedParameterList { text: normalized });
        };
        if close != normalized.len() - 1 {
            return Err(ParseError::TrailingCharacters { text: normalized });
        }
        if close < open {
            return Err(ParseError::MissingParameterList { text: normalized });
        }

        let name = &normalized[..open];
        if name.is_empty() {
            return Err(ParseError::EmptyName { text: normalized });
        }

        let list = &normalized[open + 1..close];
        let params = if list.is_empty() {
            Vec::new()
        } else {
            let mut params = Vec::new();
            for tag in list.split(',') {
                if tag.is_empty() {
                    return Err(ParseError::EmptyTypeTag { text: normalized });
                }
                params.push(tag.to_string());
            }
            params
        };

        Ok(Self {
            name: name.to_string(),
            params,
        })
    }

    /// The bare method or signal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordered parameter type tags.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether a slot with this signature can be attached to `signal`.
    ///
    /// True iff this signature's tags are a prefix of (or equal to) the
    /// signal's tags, in the same order.
    pub fn accepts(&self, signal: &Signature) -> bool {
        self.params.len() <= signal.params.len()
            && self.params.iter().zip(&signal.params).all(|(a, b)| a == b)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(","))
    }
}
