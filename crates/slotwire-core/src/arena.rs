//! Generational arena for dynamic objects.
//!
//! Handles crossing the scripting boundary are not raw pointers but
//! generation-checked indices into this arena: a handle held by script code
//! after its object is disposed is detectable as stale instead of being
//! dereferenced. Disposal removes the object and bumps the slot's
//! generation, so a reused slot never validates an old handle.

use std::fmt;

use crate::object::DynamicObject;

/// Handle to a dynamic object in the arena.
///
/// Safe to copy into script userdata; the generation prevents
/// use-after-dispose.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DynamicHandle {
    index: u32,
    generation: u32,
}

impl DynamicHandle {
    /// Slot index inside the arena.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation the handle was issued for.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for DynamicHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DynamicHandle({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for DynamicHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dynamic_{}v{}", self.index, self.generation)
    }
}

struct ArenaSlot {
    generation: u32,
    object: Option<DynamicObject>,
}

/// Storage for all dynamic objects of one bridge.
#[derive(Default)]
pub struct ObjectArena {
    slots: Vec<ArenaSlot>,
    free_list: Vec<u32>,
}

impl ObjectArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object, reusing a freed slot when one is available.
    pub fn insert(&mut self, object: DynamicObject) -> DynamicHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            DynamicHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(ArenaSlot {
                generation: 0,
                object: Some(object),
            });
            DynamicHandle {
                index,
                generation: 0,
            }
        }
    }

    /// The object behind `handle`, or `None` if the handle is stale.
    pub fn get(&self, handle: DynamicHandle) -> Option<&DynamicObject> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_ref()
    }

    /// Mutable access to the object behind `handle`.
    pub fn get_mut(&mut self, handle: DynamicHandle) -> Option<&mut DynamicObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_mut()
    }

    /// Whether `handle` still refers to a live object.
    pub fn contains(&self, handle: DynamicHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Remove the object behind `handle`, invalidating every copy of it.
    ///
    /// Returns the removed object so the caller can release what it owns.
    /// Removing through a stale handle returns `None` and changes nothing.
    pub fn remove(&mut self, handle: DynamicHandle) -> Option<DynamicObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.object.is_none() {
            return None;
        }
        let object = slot.object.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        object
    }

    /// Iterate over every live object with its handle.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (DynamicHandle, &mut DynamicObject)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.object.as_mut().map(move |object| {
                (
                    DynamicHandle {
                        index: index as u32,
                        generation,
                    },
                    object,
                )
            })
        })
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.object.is_some()).count()
    }

    /// Whether the arena holds no live objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ScriptRef;

    fn object() -> DynamicObject {
        DynamicObject::new(ScriptRef::new(0))
    }

    #[test]
    fn insert_and_get() {
        let mut arena = ObjectArena::new();
        let handle = arena.insert(object());
        assert!(arena.contains(handle));
        assert!(arena.get(handle).is_some());
    }

    #[test]
    fn remove_invalidates_handle() {
        let mut arena = ObjectArena::new();
        let handle = arena.insert(object());
        assert!(arena.remove(handle).is_some());
        assert!(!arena.contains(handle));
        assert!(arena.remove(handle).is_none());
    }

    #[test]
    fn reused_slot_rejects_old_generation() {
        let mut arena = ObjectArena::new();
        let old = arena.insert(object());
        arena.remove(old);

        let new = arena.insert(object());
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert!(arena.get(old).is_none());
        assert!(arena.get(new).is_some());
    }

    #[test]
    fn len_counts_live_objects() {
        let mut arena = ObjectArena::new();
        let a = arena.insert(object());
        let _b = arena.insert(object());
        assert_eq!(arena.len(), 2);
        arena.remove(a);
        assert_eq!(arena.len(), 1);
        assert!(!arena.is_empty());
    }
}
