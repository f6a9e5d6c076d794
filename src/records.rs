//! Per-handle metadata kept by the registry.
//!
//! Relationships are stored as arena keys. A `None` back-reference means the
//! parent was destroyed first; a `Some` key whose target no longer resolves
//! means the same thing and is checked wherever the key is used.

use std::collections::{HashMap, HashSet};

use ash::vk;

use crate::arena::new_key_type;

new_key_type! {
    pub struct InstanceKey;
    pub struct PhysicalDeviceKey;
    pub struct DeviceKey;
    pub struct SurfaceKey;
    pub struct SwapchainKey;
    pub struct QueueKey;
}

/// What the layer knows about a counted property of a physical device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Knowledge {
    #[default]
    Unknown,
    Known(u32),
}

/// Outcome of checking a fetch call against the sizing call before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchCheck {
    Ok,
    /// No sizing call has been seen.
    NoPriorSizing,
    /// More elements requested than the sizing call reported.
    TooLarge { requested: u32, reported: u32 },
}

/// Bookkeeping for the sizing/fetch two-call query pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountCache {
    sized: Option<u32>,
    knowledge: Knowledge,
}

impl CountCache {
    /// The count returned by a sizing call (output array null).
    pub fn record_sizing(&mut self, count: u32) {
        self.sized = Some(count);
        self.knowledge = Knowledge::Known(count);
    }

    /// The count written by a fetch call. A truncated fetch doesn't shrink a
    /// count that is already known.
    pub fn record_fetch(&mut self, count: u32) {
        if self.knowledge == Knowledge::Unknown {
            self.knowledge = Knowledge::Known(count);
        }
    }

    pub fn check_fetch(&self, requested: u32) -> FetchCheck {
        match self.sized {
            None => FetchCheck::NoPriorSizing,
            Some(reported) if requested > reported => FetchCheck::TooLarge {
                requested,
                reported,
            },
            Some(_) => FetchCheck::Ok,
        }
    }

    #[inline]
    pub fn knowledge(&self) -> Knowledge {
        self.knowledge
    }

    #[inline]
    pub fn known(&self) -> Option<u32> {
        match self.knowledge {
            Knowledge::Known(count) => Some(count),
            Knowledge::Unknown => None,
        }
    }
}

/// Instance-level extensions the layer cares about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InstanceExtensions {
    pub surface: bool,
    pub display: bool,
}

impl InstanceExtensions {
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut extensions = Self::default();
        for name in names {
            match name {
                "VK_KHR_surface" => extensions.surface = true,
                "VK_KHR_display" => extensions.display = true,
                _ => {}
            }
        }
        extensions
    }
}

/// Device-level extensions the layer cares about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceExtensions {
    pub swapchain: bool,
}

impl DeviceExtensions {
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        DeviceExtensions {
            swapchain: names.into_iter().any(|name| name == "VK_KHR_swapchain"),
        }
    }
}

#[derive(Debug)]
pub struct InstanceRecord {
    pub handle: vk::Instance,
    pub extensions: InstanceExtensions,
    /// Non-owning; the records live in the registry's physical device table.
    pub physical_devices: HashMap<vk::PhysicalDevice, PhysicalDeviceKey>,
    pub surfaces: HashMap<vk::SurfaceKHR, SurfaceKey>,
}

impl InstanceRecord {
    pub fn new(handle: vk::Instance, extensions: InstanceExtensions) -> Self {
        InstanceRecord {
            handle,
            extensions,
            physical_devices: HashMap::new(),
            surfaces: HashMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct PhysicalDeviceRecord {
    pub handle: vk::PhysicalDevice,
    pub instance: Option<InstanceKey>,
    pub devices: HashSet<DeviceKey>,
    pub queue_families: CountCache,
    pub display_planes: CountCache,
    /// Surfaces queried through `vkGetPhysicalDeviceSurfaceSupportKHR`, with the
    /// answer for each queue family asked about.
    pub supported_surfaces: HashMap<SurfaceKey, HashMap<u32, bool>>,
}

impl PhysicalDeviceRecord {
    pub fn new(handle: vk::PhysicalDevice, instance: Option<InstanceKey>) -> Self {
        PhysicalDeviceRecord {
            handle,
            instance,
            devices: HashSet::new(),
            queue_families: CountCache::default(),
            display_planes: CountCache::default(),
            supported_surfaces: HashMap::new(),
        }
    }

    pub fn record_surface_support(&mut self, surface: SurfaceKey, family: u32, supported: bool) {
        self.supported_surfaces
            .entry(surface)
            .or_default()
            .insert(family, supported);
    }
}

#[derive(Debug)]
pub struct DeviceRecord {
    pub handle: vk::Device,
    pub physical_device: Option<PhysicalDeviceKey>,
    pub extensions: DeviceExtensions,
    pub swapchains: HashMap<vk::SwapchainKHR, SwapchainKey>,
    pub queues: HashMap<vk::Queue, QueueKey>,
}

impl DeviceRecord {
    pub fn new(
        handle: vk::Device,
        physical_device: Option<PhysicalDeviceKey>,
        extensions: DeviceExtensions,
    ) -> Self {
        DeviceRecord {
            handle,
            physical_device,
            extensions,
            swapchains: HashMap::new(),
            queues: HashMap::new(),
        }
    }
}

/// Which platform entry point created a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    Android,
    Mir,
    Wayland,
    Win32,
    Xcb,
    Xlib,
    DisplayPlane,
}

#[derive(Debug)]
pub struct SurfaceRecord {
    pub handle: vk::SurfaceKHR,
    pub kind: SurfaceKind,
    pub instance: Option<InstanceKey>,
    pub swapchains: HashMap<vk::SwapchainKHR, SwapchainKey>,
    /// Answers of support queries against this surface, by queue family.
    pub queue_family_support: HashMap<u32, bool>,
}

impl SurfaceRecord {
    pub fn new(handle: vk::SurfaceKHR, kind: SurfaceKind, instance: Option<InstanceKey>) -> Self {
        SurfaceRecord {
            handle,
            kind,
            instance,
            swapchains: HashMap::new(),
            queue_family_support: HashMap::new(),
        }
    }

    pub fn set_queue_family_support(&mut self, family: u32, supported: bool) {
        self.queue_family_support.insert(family, supported);
    }

    pub fn queue_family_support(&self, family: u32) -> Option<bool> {
        self.queue_family_support.get(&family).copied()
    }
}

#[derive(Debug)]
pub struct ImageRecord {
    pub handle: vk::Image,
    pub swapchain: Option<SwapchainKey>,
    pub acquired_by_app: bool,
}

#[derive(Debug)]
pub struct SwapchainRecord {
    pub handle: vk::SwapchainKHR,
    pub device: Option<DeviceKey>,
    pub surface: Option<SurfaceKey>,
    pub images: CountCache,
    /// Indexed by swapchain image index.
    pub image_records: Vec<ImageRecord>,
    /// Set once a parent was destroyed while the swapchain was alive.
    pub orphaned: bool,
}

impl SwapchainRecord {
    pub fn new(
        handle: vk::SwapchainKHR,
        device: Option<DeviceKey>,
        surface: Option<SurfaceKey>,
    ) -> Self {
        SwapchainRecord {
            handle,
            device,
            surface,
            images: CountCache::default(),
            image_records: Vec::new(),
            orphaned: false,
        }
    }

    /// Drops the images of a swapchain whose parent went away. Returns the
    /// handle the first time only, so each swapchain is reported once.
    pub fn orphan(&mut self) -> Option<vk::SwapchainKHR> {
        self.image_records.clear();
        if std::mem::replace(&mut self.orphaned, true) {
            None
        } else {
            Some(self.handle)
        }
    }
}

#[derive(Debug)]
pub struct QueueRecord {
    pub handle: vk::Queue,
    pub device: Option<DeviceKey>,
    pub queue_family_index: u32,
}
