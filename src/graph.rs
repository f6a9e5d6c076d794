//! Parent/child edges between registry records.
//!
//! instance → physical device → device → swapchain → image,
//! instance → surface → swapchain, device → queue.
//!
//! Creation links a new record to its parents. Destruction of a parent severs
//! every edge pointing at it and reports the children that were still alive,
//! so the caller can turn them into findings. Teardown always completes,
//! whatever it finds.

use ash::vk;

use crate::records::{
    DeviceExtensions, DeviceKey, DeviceRecord, ImageRecord, InstanceExtensions, InstanceKey,
    InstanceRecord, PhysicalDeviceKey, PhysicalDeviceRecord, QueueKey, QueueRecord, SurfaceKey,
    SurfaceKind, SurfaceRecord, SwapchainKey, SwapchainRecord,
};
use crate::registry::HandleRegistry;

/// Children an instance still had when it was destroyed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InstanceTeardown {
    pub surfaces: Vec<vk::SurfaceKHR>,
    pub devices: Vec<vk::Device>,
    pub physical_devices_removed: usize,
}

/// Children a device or surface still had when it was destroyed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SwapchainOrphans {
    pub swapchains: Vec<vk::SwapchainKHR>,
}

impl HandleRegistry {
    pub fn link_instance(
        &mut self,
        handle: vk::Instance,
        extensions: InstanceExtensions,
    ) -> InstanceKey {
        self.insert(InstanceRecord::new(handle, extensions))
    }

    /// Registers enumerated physical devices. Devices seen before keep their
    /// cached query state and are re-linked to `instance`.
    pub fn link_physical_devices(
        &mut self,
        instance: vk::Instance,
        handles: &[vk::PhysicalDevice],
    ) -> Vec<PhysicalDeviceKey> {
        let instance_key = self.find(instance);
        let mut keys = Vec::with_capacity(handles.len());

        for &handle in handles {
            let key = match self.find(handle) {
                Some(key) => {
                    if let Some(record) = self.get_mut(key) {
                        record.instance = instance_key;
                    }
                    key
                }
                None => self.insert(PhysicalDeviceRecord::new(handle, instance_key)),
            };

            if let Some(record) = instance_key.and_then(|k| self.get_mut(k)) {
                record.physical_devices.insert(handle, key);
            }
            keys.push(key);
        }

        keys
    }

    pub fn link_device(
        &mut self,
        handle: vk::Device,
        physical_device: vk::PhysicalDevice,
        extensions: DeviceExtensions,
    ) -> DeviceKey {
        let physical_device_key = self.find(physical_device);
        let key = self.insert(DeviceRecord::new(handle, physical_device_key, extensions));

        if let Some(record) = physical_device_key.and_then(|k| self.get_mut(k)) {
            record.devices.insert(key);
        }

        key
    }

    pub fn link_surface(
        &mut self,
        instance: vk::Instance,
        handle: vk::SurfaceKHR,
        kind: SurfaceKind,
    ) -> SurfaceKey {
        let instance_key = self.find(instance);
        let key = self.insert(SurfaceRecord::new(handle, kind, instance_key));

        if let Some(record) = instance_key.and_then(|k| self.get_mut(k)) {
            record.surfaces.insert(handle, key);
        }

        key
    }

    pub fn link_swapchain(
        &mut self,
        device: vk::Device,
        surface: vk::SurfaceKHR,
        handle: vk::SwapchainKHR,
    ) -> SwapchainKey {
        let device_key = self.find(device);
        let surface_key = self.find(surface);
        let key = self.insert(SwapchainRecord::new(handle, device_key, surface_key));

        if let Some(record) = device_key.and_then(|k| self.get_mut(k)) {
            record.swapchains.insert(handle, key);
        }
        if let Some(record) = surface_key.and_then(|k| self.get_mut(k)) {
            record.swapchains.insert(handle, key);
        }

        key
    }

    pub fn link_queue(
        &mut self,
        device: vk::Device,
        handle: vk::Queue,
        queue_family_index: u32,
    ) -> QueueKey {
        let device_key = self.find(device);
        let key = self.insert(QueueRecord {
            handle,
            device: device_key,
            queue_family_index,
        });

        if let Some(record) = device_key.and_then(|k| self.get_mut(k)) {
            record.queues.insert(handle, key);
        }

        key
    }

    /// Records the images written by a fetch call. Images already known at the
    /// same index keep their ownership state.
    pub fn link_swapchain_images(&mut self, swapchain: vk::SwapchainKHR, images: &[vk::Image]) {
        let Some(key) = self.find(swapchain) else {
            return;
        };
        let Some(record) = self.get_mut(key) else {
            return;
        };

        for (index, &image) in images.iter().enumerate() {
            match record.image_records.get_mut(index) {
                Some(existing) if existing.handle == image => {}
                Some(existing) => {
                    *existing = ImageRecord {
                        handle: image,
                        swapchain: Some(key),
                        acquired_by_app: false,
                    };
                }
                None => record.image_records.push(ImageRecord {
                    handle: image,
                    swapchain: Some(key),
                    acquired_by_app: false,
                }),
            }
        }
        record.images.record_fetch(images.len() as u32);
    }

    /// Severs an instance from its surfaces and (through its physical devices)
    /// its devices, removes its physical devices and then the instance itself.
    pub fn detach_instance(&mut self, instance: vk::Instance) -> Option<InstanceTeardown> {
        let key = self.find(instance)?;
        let (surfaces, physical_devices) = {
            let record = self.get(key)?;
            (
                record.surfaces.values().copied().collect::<Vec<_>>(),
                record.physical_devices.values().copied().collect::<Vec<_>>(),
            )
        };

        let mut teardown = InstanceTeardown::default();

        for surface_key in surfaces {
            if let Some(surface) = self.get_mut(surface_key) {
                surface.instance = None;
                teardown.surfaces.push(surface.handle);
            }
        }

        for physical_device_key in physical_devices {
            let devices = match self.get(physical_device_key) {
                // Re-enumerated by another instance since.
                Some(record) if record.instance != Some(key) => continue,
                Some(record) => record.devices.iter().copied().collect::<Vec<_>>(),
                None => continue,
            };

            for device_key in devices {
                if let Some(device) = self.get_mut(device_key) {
                    device.physical_device = None;
                    teardown.devices.push(device.handle);
                }
            }

            self.remove(physical_device_key);
            teardown.physical_devices_removed += 1;
        }

        self.remove(key);

        Some(teardown)
    }

    /// Severs a device from its swapchains, queues and physical device, then
    /// removes it. Swapchains left without any parent are removed too.
    pub fn detach_device(&mut self, device: vk::Device) -> Option<SwapchainOrphans> {
        let key = self.find(device)?;
        let (swapchains, queues, physical_device) = {
            let record = self.get(key)?;
            (
                record.swapchains.values().copied().collect::<Vec<_>>(),
                record.queues.values().copied().collect::<Vec<_>>(),
                record.physical_device,
            )
        };

        let mut orphans = SwapchainOrphans::default();

        for swapchain_key in swapchains {
            let Some(swapchain) = self.get_mut(swapchain_key) else {
                continue;
            };
            swapchain.device = None;
            if let Some(handle) = swapchain.orphan() {
                orphans.swapchains.push(handle);
            }
            let surface = swapchain.surface;
            if !surface.is_some_and(|k| self.contains(k)) {
                self.remove(swapchain_key);
            }
        }

        for queue_key in queues {
            self.remove(queue_key);
        }

        if let Some(record) = physical_device.and_then(|k| self.get_mut(k)) {
            record.devices.remove(&key);
        }

        self.remove(key);

        Some(orphans)
    }

    /// Severs a surface from its swapchains, instance and the physical devices
    /// that queried it, then removes it. Swapchains left without any parent are
    /// removed too.
    pub fn detach_surface(&mut self, surface: vk::SurfaceKHR) -> Option<SwapchainOrphans> {
        let key = self.find(surface)?;
        let (swapchains, instance) = {
            let record = self.get(key)?;
            (
                record.swapchains.values().copied().collect::<Vec<_>>(),
                record.instance,
            )
        };

        let mut orphans = SwapchainOrphans::default();

        for swapchain_key in swapchains {
            let Some(swapchain) = self.get_mut(swapchain_key) else {
                continue;
            };
            swapchain.surface = None;
            if let Some(handle) = swapchain.orphan() {
                orphans.swapchains.push(handle);
            }
            let device = swapchain.device;
            if !device.is_some_and(|k| self.contains(k)) {
                self.remove(swapchain_key);
            }
        }

        if let Some(record) = instance.and_then(|k| self.get_mut(k)) {
            record.surfaces.remove(&surface);
        }

        let physical_devices: Vec<_> = self
            .iter::<PhysicalDeviceRecord>()
            .filter(|(_, record)| record.supported_surfaces.contains_key(&key))
            .map(|(k, _)| k)
            .collect();
        for physical_device_key in physical_devices {
            if let Some(record) = self.get_mut(physical_device_key) {
                record.supported_surfaces.remove(&key);
            }
        }

        self.remove(key);

        Some(orphans)
    }

    /// Unlinks a swapchain from its device and surface and removes it together
    /// with its images.
    pub fn detach_swapchain(&mut self, swapchain: vk::SwapchainKHR) -> Option<SwapchainRecord> {
        let key = self.find(swapchain)?;
        let (device, surface) = {
            let record = self.get(key)?;
            (record.device, record.surface)
        };

        if let Some(record) = device.and_then(|k| self.get_mut(k)) {
            record.swapchains.remove(&swapchain);
        }
        if let Some(record) = surface.and_then(|k| self.get_mut(k)) {
            record.swapchains.remove(&swapchain);
        }

        self.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    struct World {
        registry: HandleRegistry,
        instance: vk::Instance,
        physical_device: vk::PhysicalDevice,
        device: vk::Device,
        surface: vk::SurfaceKHR,
        swapchain: vk::SwapchainKHR,
    }

    fn world() -> World {
        let mut registry = HandleRegistry::new();
        let instance = vk::Instance::from_raw(0x1);
        let physical_device = vk::PhysicalDevice::from_raw(0x2);
        let device = vk::Device::from_raw(0x3);
        let surface = vk::SurfaceKHR::from_raw(0x4);
        let swapchain = vk::SwapchainKHR::from_raw(0x5);

        registry.link_instance(instance, InstanceExtensions::default());
        registry.link_physical_devices(instance, &[physical_device]);
        registry.link_device(device, physical_device, DeviceExtensions::default());
        registry.link_surface(instance, surface, SurfaceKind::Xcb);
        registry.link_swapchain(device, surface, swapchain);
        registry.link_swapchain_images(
            swapchain,
            &[vk::Image::from_raw(0x10), vk::Image::from_raw(0x11)],
        );

        World {
            registry,
            instance,
            physical_device,
            device,
            surface,
            swapchain,
        }
    }

    #[test]
    fn links_are_bidirectional() {
        let w = world();
        let r = &w.registry;

        let instance_key = r.find(w.instance).unwrap();
        let physical_device = r.lookup(w.physical_device).unwrap();
        assert_eq!(physical_device.instance, Some(instance_key));
        assert!(physical_device.devices.contains(&r.find(w.device).unwrap()));

        let swapchain = r.lookup(w.swapchain).unwrap();
        assert_eq!(swapchain.device, r.find(w.device));
        assert_eq!(swapchain.surface, r.find(w.surface));
        assert_eq!(swapchain.image_records.len(), 2);
        assert_eq!(swapchain.image_records[1].swapchain, r.find(w.swapchain));

        assert!(r.lookup(w.surface).unwrap().swapchains.contains_key(&w.swapchain));
        assert!(r.lookup(w.instance).unwrap().surfaces.contains_key(&w.surface));
    }

    #[test]
    fn device_teardown_orphans_swapchains() {
        let mut w = world();

        let orphans = w.registry.detach_device(w.device).unwrap();
        assert_eq!(orphans.swapchains, [w.swapchain]);

        let swapchain = w.registry.lookup(w.swapchain).unwrap();
        assert_eq!(swapchain.device, None);
        assert!(swapchain.image_records.is_empty());
        assert!(w.registry.find(w.device).is_none());
        assert!(w.registry.lookup(w.physical_device).unwrap().devices.is_empty());

        assert!(w.registry.detach_device(w.device).is_none());
    }

    #[test]
    fn surface_teardown_orphans_swapchains() {
        let mut w = world();

        let orphans = w.registry.detach_surface(w.surface).unwrap();
        assert_eq!(orphans.swapchains, [w.swapchain]);
        assert_eq!(w.registry.lookup(w.swapchain).unwrap().surface, None);
        assert!(w.registry.lookup(w.instance).unwrap().surfaces.is_empty());
        assert!(w.registry.find(w.surface).is_none());
    }

    #[test]
    fn swapchain_reported_once_and_dropped_with_last_parent() {
        let mut w = world();

        let orphans = w.registry.detach_device(w.device).unwrap();
        assert_eq!(orphans.swapchains, [w.swapchain]);
        assert!(w.registry.lookup(w.swapchain).unwrap().orphaned);

        let orphans = w.registry.detach_surface(w.surface).unwrap();
        assert!(orphans.swapchains.is_empty());
        assert!(w.registry.find(w.swapchain).is_none());
        assert_eq!(w.registry.len::<SwapchainRecord>(), 0);
    }

    #[test]
    fn swapchain_without_tracked_surface_goes_with_device() {
        let mut w = world();
        let stray = vk::SwapchainKHR::from_raw(0x6);
        w.registry
            .link_swapchain(w.device, vk::SurfaceKHR::from_raw(0xdead), stray);

        let orphans = w.registry.detach_device(w.device).unwrap();
        assert_eq!(orphans.swapchains.len(), 2);
        assert!(w.registry.find(stray).is_none());
        assert!(w.registry.find(w.swapchain).is_some());
    }

    #[test]
    fn instance_teardown_reports_surfaces_and_devices() {
        let mut w = world();

        let teardown = w.registry.detach_instance(w.instance).unwrap();
        assert_eq!(teardown.surfaces, [w.surface]);
        assert_eq!(teardown.devices, [w.device]);
        assert_eq!(teardown.physical_devices_removed, 1);

        assert_eq!(w.registry.lookup(w.surface).unwrap().instance, None);
        assert_eq!(w.registry.lookup(w.device).unwrap().physical_device, None);
        assert!(w.registry.find(w.physical_device).is_none());
        assert!(w.registry.find(w.instance).is_none());
    }

    #[test]
    fn clean_teardown_has_no_orphans() {
        let mut w = world();

        assert!(w.registry.detach_swapchain(w.swapchain).is_some());
        assert_eq!(
            w.registry.detach_surface(w.surface).unwrap(),
            SwapchainOrphans::default()
        );
        assert_eq!(
            w.registry.detach_device(w.device).unwrap(),
            SwapchainOrphans::default()
        );

        let teardown = w.registry.detach_instance(w.instance).unwrap();
        assert!(teardown.surfaces.is_empty());
        assert!(teardown.devices.is_empty());
    }

    #[test]
    fn re_enumeration_keeps_cached_state() {
        let mut w = world();
        let key = w.registry.find(w.physical_device).unwrap();
        w.registry.get_mut(key).unwrap().queue_families.record_sizing(3);

        let keys = w.registry.link_physical_devices(w.instance, &[w.physical_device]);
        assert_eq!(keys, [key]);
        assert_eq!(
            w.registry.get(key).unwrap().queue_families.known(),
            Some(3)
        );
    }

    #[test]
    fn image_state_survives_refetch() {
        let mut w = world();
        w.registry.lookup_mut(w.swapchain).unwrap().image_records[0].acquired_by_app = true;

        w.registry.link_swapchain_images(w.swapchain, &[vk::Image::from_raw(0x10)]);
        let swapchain = w.registry.lookup(w.swapchain).unwrap();
        assert!(swapchain.image_records[0].acquired_by_app);
        assert_eq!(swapchain.image_records.len(), 2);
    }
}
