//! The scripting-side registry table.
//!
//! The bridge keeps script receiver objects alive explicitly, the way an
//! embedded interpreter's registry table does: [`ScriptRuntime::pin`] hands
//! out a strong [`ScriptRef`], further owners call
//! [`ScriptRuntime::retain`], and an entry is freed only when every
//! reference has been released. Scope rules of the scripting side play no
//! part in these lifetimes.
//!
//! A receiver is a table of named methods. Script code is free to redefine
//! or clear a method at any time, including while connections targeting it
//! exist; dispatch into a missing method is a silent no-op, since optional
//! handlers are allowed to be absent.

use rustc_hash::FxHashMap;

use slotwire_core::{ScriptRef, ScriptValue};

/// A method body on the scripting side.
pub type ScriptMethod = Box<dyn FnMut(&[ScriptValue])>;

/// A scripting-side object: a table of named methods.
#[derive(Default)]
pub struct ScriptReceiver {
    methods: FxHashMap<String, ScriptMethod>,
}

impl ScriptReceiver {
    /// Create a receiver with no methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) the method `name`.
    pub fn define(&mut self, name: impl Into<String>, method: ScriptMethod) {
        self.methods.insert(name.into(), method);
    }

    /// Remove the method `name`. Returns whether it existed.
    pub fn clear(&mut self, name: &str) -> bool {
        self.methods.remove(name).is_some()
    }

    /// Whether the receiver currently defines `name`.
    pub fn has(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }
}

impl std::fmt::Debug for ScriptReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptReceiver")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct RegistryEntry {
    receiver: ScriptReceiver,
    ref_count: u32,
}

/// Registry of pinned script receivers.
#[derive(Default)]
pub struct ScriptRuntime {
    entries: Vec<Option<RegistryEntry>>,
    free_list: Vec<u32>,
}

impl ScriptRuntime {
    /// Create an empty runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `receiver` into the registry with one strong reference.
    pub fn pin(&mut self, receiver: ScriptReceiver) -> ScriptRef {
        let entry = RegistryEntry {
            receiver,
            ref_count: 1,
        };
        if let Some(index) = self.free_list.pop() {
            self.entries[index as usize] = Some(entry);
            ScriptRef::new(index)
        } else {
            let index = self.entries.len() as u32;
            self.entries.push(Some(entry));
            ScriptRef::new(index)
        }
    }

    /// Add a strong reference to an existing entry.
    pub fn retain(&mut self, reference: ScriptRef) -> bool {
        match self.entry_mut(reference) {
            Some(entry) => {
                entry.ref_count += 1;
                true
            }
            None => false,
        }
    }

    /// Drop one strong reference; the entry is freed when none remain.
    ///
    /// Returns whether the entry was freed by this release.
    pub fn release(&mut self, reference: ScriptRef) -> bool {
        let index = reference.index() as usize;
        let Some(Some(entry)) = self.entries.get_mut(index) else {
            return false;
        };
        entry.ref_count -= 1;
        if entry.ref_count == 0 {
            self.entries[index] = None;
            self.free_list.push(reference.index());
            true
        } else {
            false
        }
    }

    /// The receiver behind `reference`, if still pinned.
    pub fn receiver(&self, reference: ScriptRef) -> Option<&ScriptReceiver> {
        self.entries
            .get(reference.index() as usize)?
            .as_ref()
            .map(|e| &e.receiver)
    }

    /// Mutable access to the receiver behind `reference`.
    pub fn receiver_mut(&mut self, reference: ScriptRef) -> Option<&mut ScriptReceiver> {
        self.entry_mut(reference).map(|e| &mut e.receiver)
    }

    /// Call `method` on the referenced receiver with positional arguments.
    ///
    /// A missing entry or a method the receiver no longer defines is a
    /// silent no-op; returns whether a method actually ran.
    pub fn invoke(&mut self, reference: ScriptRef, method: &str, args: &[ScriptValue]) -> bool {
        let Some(entry) = self.entry_mut(reference) else {
            return false;
        };
        match entry.receiver.methods.get_mut(method) {
            Some(body) => {
                body(args);
                true
            }
            None => false,
        }
    }

    fn entry_mut(&mut self, reference: ScriptRef) -> Option<&mut RegistryEntry> {
        self.entries
            .get_mut(reference.index() as usize)?
            .as_mut()
    }
}

impl std::fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let live = self.entries.iter().filter(|e| e.is_some()).count();
        f.debug_struct("ScriptRuntime").field("live", &live).finish()
    }
}
