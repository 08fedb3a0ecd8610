use slotmap::{Key, SlotMap, new_key_type};

new_key_type! { pub struct ResourceKey; }
new_key_type! { pub struct CommandListKey; }

new_key_type! { pub struct HeapKey; }
new_key_type! { pub struct RootSignatureKey; }

new_key_type! { pub struct QueueKey; }
new_key_type! { pub struct FenceKey; }

/// Index of the intercepted call that produced an event.
pub type CallIndex = u64;

/// Hands out keys for one object kind. A released key is never handed out again,
/// so a destroy followed by a create always yields a fresh identity.
pub struct KeyArena<K: Key> {
    slots: SlotMap<K, ()>,
}

impl<K: Key> Default for KeyArena<K> {
    fn default() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }
}

impl<K: Key> KeyArena<K> {
    pub fn allocate(&mut self) -> K {
        self.slots.insert(())
    }

    pub fn release(&mut self, key: K) -> bool {
        self.slots.remove(key).is_some()
    }

    pub fn is_live(&self, key: K) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
