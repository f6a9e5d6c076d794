//! Generational record storage.
//!
//! Records are addressed by small copyable keys instead of pointers. Removing a
//! record bumps the generation of its slot, so a key held by a dependent record
//! simply stops resolving once its target is gone.

use std::fmt;
use std::marker::PhantomData;

const NIL: u32 = u32::MAX;

/// Index and generation packed into one key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Conversion between a typed key and the raw slot id.
pub trait Key: Copy + Eq {
    fn from_id(id: SlotId) -> Self;

    fn as_id(self) -> SlotId;
}

impl Key for SlotId {
    #[inline(always)]
    fn from_id(id: SlotId) -> Self {
        id
    }

    #[inline(always)]
    fn as_id(self) -> SlotId {
        self
    }
}

/// Declares a key newtype so keys of different record kinds can't be mixed.
macro_rules! new_key_type {
    ($($(#[$meta:meta])* $vis:vis struct $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            $vis struct $name($crate::arena::SlotId);

            impl $crate::arena::Key for $name {
                #[inline(always)]
                fn from_id(id: $crate::arena::SlotId) -> Self {
                    $name(id)
                }

                #[inline(always)]
                fn as_id(self) -> $crate::arena::SlotId {
                    self.0
                }
            }
        )*
    };
}
pub(crate) use new_key_type;

struct Slot<V> {
    // Odd while occupied, even while vacant.
    generation: u32,
    value: Option<V>,
    next_free: u32,
}

pub struct Arena<K, V> {
    slots: Vec<Slot<V>>,
    len: u32,
    free_list_head: u32,
    marker: PhantomData<fn(K) -> K>,
}

impl<K, V> Default for Arena<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Arena<K, V> {
    #[inline]
    pub fn new() -> Self {
        Arena {
            slots: Vec::new(),
            len: 0,
            free_list_head: NIL,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }
}

impl<K: Key, V> Arena<K, V> {
    pub fn insert(&mut self, value: V) -> K {
        let id = if self.free_list_head != NIL {
            let index = self.free_list_head;
            let slot = &mut self.slots[index as usize];
            self.free_list_head = slot.next_free;

            slot.generation = slot.generation.wrapping_add(1);
            slot.value = Some(value);
            slot.next_free = NIL;

            SlotId {
                index,
                generation: slot.generation,
            }
        } else {
            if self.slots.len() == (NIL - 1) as usize {
                capacity_overflow();
            }

            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                value: Some(value),
                next_free: NIL,
            });

            SlotId {
                index,
                generation: 1,
            }
        };

        self.len += 1;

        K::from_id(id)
    }

    pub fn remove(&mut self, key: K) -> Option<V> {
        let id = key.as_id();
        let slot = self.slots.get_mut(id.index as usize)?;

        if slot.generation != id.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        slot.next_free = self.free_list_head;
        self.free_list_head = id.index;
        self.len -= 1;

        Some(value)
    }

    #[inline]
    pub fn get(&self, key: K) -> Option<&V> {
        let id = key.as_id();
        let slot = self.slots.get(id.index as usize)?;

        if slot.generation == id.generation {
            slot.value.as_ref()
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        let id = key.as_id();
        let slot = self.slots.get_mut(id.index as usize)?;

        if slot.generation == id.generation {
            slot.value.as_mut()
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            let id = SlotId {
                index: index as u32,
                generation: slot.generation,
            };

            Some((K::from_id(id), value))
        })
    }
}

#[inline(never)]
fn capacity_overflow() -> ! {
    panic!("capacity overflow");
}
