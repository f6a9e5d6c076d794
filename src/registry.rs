//! Handle → record lookup.
//!
//! One table per record kind, each an arena plus a handle index. The ash handle
//! types key the lookups, so a surface handle can never be used to find a
//! swapchain record. The registry has no locking of its own; the layer keeps it
//! behind its global mutex.

use std::collections::HashMap;
use std::hash::Hash;

use ash::vk;

use crate::arena::{Arena, Key};
use crate::records::{
    DeviceKey, DeviceRecord, InstanceKey, InstanceRecord, PhysicalDeviceKey,
    PhysicalDeviceRecord, QueueKey, QueueRecord, SurfaceKey, SurfaceRecord, SwapchainKey,
    SwapchainRecord,
};

/// A record kind stored in the registry.
pub trait Record: Sized + 'static {
    type Handle: Copy + Eq + Hash;
    type Key: Key + Hash;

    fn handle(&self) -> Self::Handle;

    fn table(registry: &HandleRegistry) -> &Table<Self>;

    fn table_mut(registry: &mut HandleRegistry) -> &mut Table<Self>;
}

/// Vulkan handles with a record kind.
pub trait TrackedHandle: Copy + Eq + Hash {
    type Record: Record<Handle = Self>;
}

/// Keys that resolve to a record kind.
pub trait RecordKey: Key + Hash + 'static {
    type Record: Record<Key = Self>;
}

pub type KeyOf<H> = <<H as TrackedHandle>::Record as Record>::Key;

pub struct Table<R: Record> {
    arena: Arena<R::Key, R>,
    index: HashMap<R::Handle, R::Key>,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Table {
            arena: Arena::new(),
            index: HashMap::new(),
        }
    }
}

macro_rules! tracked {
    ($($record:ty => $handle:ty, $key:ty, $field:ident;)*) => {
        $(
            impl Record for $record {
                type Handle = $handle;
                type Key = $key;

                #[inline]
                fn handle(&self) -> $handle {
                    self.handle
                }

                #[inline]
                fn table(registry: &HandleRegistry) -> &Table<Self> {
                    &registry.$field
                }

                #[inline]
                fn table_mut(registry: &mut HandleRegistry) -> &mut Table<Self> {
                    &mut registry.$field
                }
            }

            impl TrackedHandle for $handle {
                type Record = $record;
            }

            impl RecordKey for $key {
                type Record = $record;
            }
        )*
    };
}

tracked! {
    InstanceRecord => vk::Instance, InstanceKey, instances;
    PhysicalDeviceRecord => vk::PhysicalDevice, PhysicalDeviceKey, physical_devices;
    DeviceRecord => vk::Device, DeviceKey, devices;
    SurfaceRecord => vk::SurfaceKHR, SurfaceKey, surfaces;
    SwapchainRecord => vk::SwapchainKHR, SwapchainKey, swapchains;
    QueueRecord => vk::Queue, QueueKey, queues;
}

#[derive(Default)]
pub struct HandleRegistry {
    instances: Table<InstanceRecord>,
    physical_devices: Table<PhysicalDeviceRecord>,
    devices: Table<DeviceRecord>,
    surfaces: Table<SurfaceRecord>,
    swapchains: Table<SwapchainRecord>,
    queues: Table<QueueRecord>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absence is the normal answer for handles never registered or already
    /// destroyed.
    #[inline]
    pub fn find<H: TrackedHandle>(&self, handle: H) -> Option<KeyOf<H>> {
        <H::Record as Record>::table(self).index.get(&handle).copied()
    }

    #[inline]
    pub fn lookup<H: TrackedHandle>(&self, handle: H) -> Option<&H::Record> {
        let key = self.find(handle)?;
        <H::Record as Record>::table(self).arena.get(key)
    }

    #[inline]
    pub fn lookup_mut<H: TrackedHandle>(&mut self, handle: H) -> Option<&mut H::Record> {
        let key = self.find(handle)?;
        <H::Record as Record>::table_mut(self).arena.get_mut(key)
    }

    #[inline]
    pub fn get<K: RecordKey>(&self, key: K) -> Option<&K::Record> {
        <K::Record as Record>::table(self).arena.get(key)
    }

    #[inline]
    pub fn get_mut<K: RecordKey>(&mut self, key: K) -> Option<&mut K::Record> {
        <K::Record as Record>::table_mut(self).arena.get_mut(key)
    }

    /// Follows a back-reference. `None` if it was severed or its target is gone.
    #[inline]
    pub fn resolve<K: RecordKey>(&self, key: Option<K>) -> Option<&K::Record> {
        self.get(key?)
    }

    #[inline]
    pub fn contains<K: RecordKey>(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Registers a record. A record already registered under the same handle is
    /// erased first, so keys to it stop resolving.
    pub fn insert<R: Record>(&mut self, record: R) -> R::Key {
        let handle = record.handle();
        let table = R::table_mut(self);

        if let Some(old) = table.index.remove(&handle) {
            table.arena.remove(old);
        }

        let key = table.arena.insert(record);
        table.index.insert(handle, key);
        key
    }

    /// Removes a record. Dependents' back-references must be severed first.
    pub fn erase<H: TrackedHandle>(&mut self, handle: H) -> Option<H::Record> {
        let table = <H::Record as Record>::table_mut(self);
        let key = table.index.remove(&handle)?;
        table.arena.remove(key)
    }

    pub fn remove<K: RecordKey>(&mut self, key: K) -> Option<K::Record> {
        let table = <K::Record as Record>::table_mut(self);
        let record = table.arena.remove(key)?;
        table.index.remove(&record.handle());
        Some(record)
    }

    pub fn len<R: Record>(&self) -> usize {
        R::table(self).arena.len()
    }

    pub fn iter<R: Record>(&self) -> impl Iterator<Item = (R::Key, &R)> + '_ {
        R::table(self).arena.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{InstanceExtensions, SurfaceKind};
    use ash::vk::Handle;

    #[test]
    fn find_insert_erase() {
        let mut registry = HandleRegistry::new();
        let instance = vk::Instance::from_raw(0x100);

        assert!(registry.find(instance).is_none());

        let key = registry.insert(InstanceRecord::new(instance, InstanceExtensions::default()));
        assert_eq!(registry.find(instance), Some(key));
        assert_eq!(registry.lookup(instance).map(|r| r.handle), Some(instance));
        assert!(registry.contains(key));

        let erased = registry.erase(instance).unwrap();
        assert_eq!(erased.handle, instance);
        assert!(registry.find(instance).is_none());
        assert!(registry.get(key).is_none());
        assert!(registry.erase(instance).is_none());
    }

    #[test]
    fn overwrite_invalidates_old_key() {
        let mut registry = HandleRegistry::new();
        let surface = vk::SurfaceKHR::from_raw(0x200);

        let first = registry.insert(SurfaceRecord::new(surface, SurfaceKind::Xcb, None));
        let second = registry.insert(SurfaceRecord::new(surface, SurfaceKind::Wayland, None));

        assert_ne!(first, second);
        assert!(registry.get(first).is_none());
        assert_eq!(registry.lookup(surface).map(|r| r.kind), Some(SurfaceKind::Wayland));
        assert_eq!(registry.len::<SurfaceRecord>(), 1);
    }

    #[test]
    fn kinds_are_separate() {
        let mut registry = HandleRegistry::new();
        let raw = 0x300;

        registry.insert(SurfaceRecord::new(
            vk::SurfaceKHR::from_raw(raw),
            SurfaceKind::Win32,
            None,
        ));

        // Same numeric value, different kind.
        assert!(registry.find(vk::SwapchainKHR::from_raw(raw)).is_none());
        assert!(registry.find(vk::SurfaceKHR::from_raw(raw)).is_some());
    }

    #[test]
    fn remove_by_key_clears_index() {
        let mut registry = HandleRegistry::new();
        let queue = vk::Queue::from_raw(0x400);
        let key = registry.insert(QueueRecord {
            handle: queue,
            device: None,
            queue_family_index: 1,
        });

        assert_eq!(registry.remove(key).map(|r| r.queue_family_index), Some(1));
        assert!(registry.find(queue).is_none());
        assert_eq!(registry.iter::<QueueRecord>().count(), 0);
    }

    #[test]
    fn resolve_none_and_stale() {
        let mut registry = HandleRegistry::new();
        assert!(registry.resolve::<InstanceKey>(None).is_none());

        let instance = vk::Instance::from_raw(0x500);
        let key = registry.insert(InstanceRecord::new(instance, InstanceExtensions::default()));
        assert!(registry.resolve(Some(key)).is_some());

        registry.erase(instance);
        assert!(registry.resolve(Some(key)).is_none());
    }
}
