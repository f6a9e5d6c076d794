//! The checks run at each intercepted entry point.
//!
//! Every rule reads the registry and appends findings; none of them mutate
//! state. Whether a finding stops the call is decided by the entry point.

use std::collections::HashSet;

use ash::vk;

use crate::codes::{MessageCode, SwapchainError, ValidationError};
use crate::graph::{InstanceTeardown, SwapchainOrphans};
use crate::records::{CountCache, FetchCheck, Knowledge, SurfaceKind};
use crate::registry::HandleRegistry;
use crate::report::{Finding, ReportObject};

/// Call sites that validate a queue family index. Each has its own code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueFamilySite {
    SurfaceSupport,
    Win32Presentation,
    XcbPresentation,
    XlibPresentation,
    WaylandPresentation,
    MirPresentation,
    CreateSwapchain,
}

impl QueueFamilySite {
    pub const ALL: [QueueFamilySite; 7] = [
        QueueFamilySite::SurfaceSupport,
        QueueFamilySite::Win32Presentation,
        QueueFamilySite::XcbPresentation,
        QueueFamilySite::XlibPresentation,
        QueueFamilySite::WaylandPresentation,
        QueueFamilySite::MirPresentation,
        QueueFamilySite::CreateSwapchain,
    ];

    pub fn code(self) -> ValidationError {
        match self {
            QueueFamilySite::SurfaceSupport => ValidationError::SurfaceSupportQueueFamilyIndex,
            QueueFamilySite::Win32Presentation => {
                ValidationError::Win32PresentationQueueFamilyIndex
            }
            QueueFamilySite::XcbPresentation => ValidationError::XcbPresentationQueueFamilyIndex,
            QueueFamilySite::XlibPresentation => ValidationError::XlibPresentationQueueFamilyIndex,
            QueueFamilySite::WaylandPresentation => {
                ValidationError::WaylandPresentationQueueFamilyIndex
            }
            QueueFamilySite::MirPresentation => ValidationError::MirPresentationQueueFamilyIndex,
            QueueFamilySite::CreateSwapchain => ValidationError::CreateSwapchainQueueFamilyIndex,
        }
    }

    pub fn function(self) -> &'static str {
        match self {
            QueueFamilySite::SurfaceSupport => "vkGetPhysicalDeviceSurfaceSupportKHR",
            QueueFamilySite::Win32Presentation => "vkGetPhysicalDeviceWin32PresentationSupportKHR",
            QueueFamilySite::XcbPresentation => "vkGetPhysicalDeviceXcbPresentationSupportKHR",
            QueueFamilySite::XlibPresentation => "vkGetPhysicalDeviceXlibPresentationSupportKHR",
            QueueFamilySite::WaylandPresentation => {
                "vkGetPhysicalDeviceWaylandPresentationSupportKHR"
            }
            QueueFamilySite::MirPresentation => "vkGetPhysicalDeviceMirPresentationSupportKHR",
            QueueFamilySite::CreateSwapchain => "vkCreateSwapchainKHR",
        }
    }
}

/// Call sites that validate a display plane index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaneSite {
    SupportedDisplays,
    Capabilities,
}

impl PlaneSite {
    fn function(self) -> &'static str {
        match self {
            PlaneSite::SupportedDisplays => "vkGetDisplayPlaneSupportedDisplaysKHR",
            PlaneSite::Capabilities => "vkGetDisplayPlaneCapabilitiesKHR",
        }
    }
}

/// The parts of `VkSwapchainCreateInfoKHR` the rules look at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapchainParams {
    pub surface: vk::SurfaceKHR,
    pub sharing_mode: vk::SharingMode,
    /// `None` when `pQueueFamilyIndices` is null.
    pub queue_family_indices: Option<Vec<u32>>,
    pub old_swapchain: vk::SwapchainKHR,
}

impl SwapchainParams {
    pub fn exclusive(surface: vk::SurfaceKHR) -> Self {
        SwapchainParams {
            surface,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_indices: None,
            old_swapchain: vk::SwapchainKHR::null(),
        }
    }
}

fn invalid_handle<O: ReportObject>(object: O, function: &'static str, kind: &'static str) -> Finding {
    Finding::error(
        object,
        SwapchainError::InvalidHandle,
        "{}() called with a non-valid {} ({}).",
    )
    .arg(function)
    .arg(kind)
    .handle_arg(object)
}

/// Flags a physical device the layer never saw enumerated.
pub fn check_physical_device(
    registry: &HandleRegistry,
    physical_device: vk::PhysicalDevice,
    function: &'static str,
    out: &mut Vec<Finding>,
) -> bool {
    if registry.find(physical_device).is_some() {
        return true;
    }
    out.push(invalid_handle(physical_device, function, "VkPhysicalDevice"));
    false
}

/// Bounds-checks a queue family index against the cached family count.
pub fn check_queue_family_index(
    registry: &HandleRegistry,
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    site: QueueFamilySite,
    out: &mut Vec<Finding>,
) {
    let Some(record) = registry.lookup(physical_device) else {
        return;
    };

    match record.queue_families.knowledge() {
        Knowledge::Unknown => out.push(
            Finding::warning(
                physical_device,
                SwapchainError::DidNotQueryQueueFamilies,
                "{}() called with queueFamilyIndex {} before \
                 vkGetPhysicalDeviceQueueFamilyProperties() was called.",
            )
            .arg(site.function())
            .arg(queue_family_index),
        ),
        Knowledge::Known(count) if queue_family_index >= count => out.push(
            Finding::error(
                physical_device,
                site.code(),
                "{}() called with a queueFamilyIndex that is too large ({}); \
                 the max is {} (as returned by vkGetPhysicalDeviceQueueFamilyProperties).",
            )
            .arg(site.function())
            .arg(queue_family_index)
            .arg(i64::from(count) - 1),
        ),
        Knowledge::Known(_) => {}
    }
}

/// P3: the fetch half of a two-call query against the sizing half.
pub fn check_fetch_count<O: ReportObject>(
    cache: &CountCache,
    requested: u32,
    object: O,
    function: &'static str,
    out: &mut Vec<Finding>,
) {
    match cache.check_fetch(requested) {
        FetchCheck::Ok => {}
        FetchCheck::NoPriorSizing => out.push(
            Finding::warning(
                object,
                SwapchainError::PriorCount,
                "{}() called with non-NULL count ({}) and output array, but no prior \
                 call with a NULL output array was seen.",
            )
            .arg(function)
            .arg(requested),
        ),
        FetchCheck::TooLarge {
            requested,
            reported,
        } => out.push(
            Finding::error(
                object,
                SwapchainError::InvalidCount,
                "{}() called with a count ({}) greater than the value ({}) returned \
                 when the output array was NULL.",
            )
            .arg(function)
            .arg(requested)
            .arg(reported),
        ),
    }
}

pub fn check_queue_family_properties(
    registry: &HandleRegistry,
    physical_device: vk::PhysicalDevice,
    requested: Option<u32>,
    out: &mut Vec<Finding>,
) {
    const FUNCTION: &str = "vkGetPhysicalDeviceQueueFamilyProperties";

    if !check_physical_device(registry, physical_device, FUNCTION, out) {
        return;
    }
    if let (Some(requested), Some(record)) = (requested, registry.lookup(physical_device)) {
        check_fetch_count(&record.queue_families, requested, physical_device, FUNCTION, out);
    }
}

fn check_instance_extension(
    registry: &HandleRegistry,
    instance: vk::Instance,
    display: bool,
    function: &'static str,
    out: &mut Vec<Finding>,
) {
    let Some(record) = registry.lookup(instance) else {
        return;
    };
    let (enabled, name) = if display {
        (record.extensions.display, "VK_KHR_display")
    } else {
        (record.extensions.surface, "VK_KHR_surface")
    };
    if !enabled {
        out.push(
            Finding::error(
                instance,
                SwapchainError::ExtNotEnabledButUsed,
                "{}() called even though the {} extension was not enabled for this VkInstance.",
            )
            .arg(function)
            .arg(name),
        );
    }
}

fn check_display_enabled_for(
    registry: &HandleRegistry,
    physical_device: vk::PhysicalDevice,
    function: &'static str,
    out: &mut Vec<Finding>,
) {
    let instance = registry
        .lookup(physical_device)
        .and_then(|record| registry.resolve(record.instance))
        .map(|record| record.handle);
    if let Some(instance) = instance {
        check_instance_extension(registry, instance, true, function, out);
    }
}

fn check_device_extension(
    registry: &HandleRegistry,
    device: vk::Device,
    function: &'static str,
    out: &mut Vec<Finding>,
) -> bool {
    let Some(record) = registry.lookup(device) else {
        out.push(invalid_handle(device, function, "VkDevice"));
        return false;
    };
    if !record.extensions.swapchain {
        out.push(
            Finding::error(
                device,
                SwapchainError::ExtNotEnabledButUsed,
                "{}() called even though the VK_KHR_swapchain extension was not enabled \
                 for this VkDevice.",
            )
            .arg(function),
        );
    }
    true
}

pub fn check_create_device(
    registry: &HandleRegistry,
    physical_device: vk::PhysicalDevice,
    out: &mut Vec<Finding>,
) {
    check_physical_device(registry, physical_device, "vkCreateDevice", out);
}

pub fn check_get_device_queue(
    registry: &HandleRegistry,
    device: vk::Device,
    queue_family_index: u32,
    out: &mut Vec<Finding>,
) {
    const FUNCTION: &str = "vkGetDeviceQueue";

    let Some(record) = registry.lookup(device) else {
        out.push(invalid_handle(device, FUNCTION, "VkDevice"));
        return;
    };
    let Some(physical_device) = registry.resolve(record.physical_device) else {
        return;
    };
    // No code of its own for "did not query" here; only the bound is checked.
    if let Some(count) = physical_device.queue_families.known() {
        if queue_family_index >= count {
            out.push(
                Finding::error(
                    device,
                    SwapchainError::QueueFamilyIndexTooLarge,
                    "{}() called with a queueFamilyIndex that is too large ({}); \
                     the max is {} (as returned by vkGetPhysicalDeviceQueueFamilyProperties).",
                )
                .arg(FUNCTION)
                .arg(queue_family_index)
                .arg(i64::from(count) - 1),
            );
        }
    }
}

pub fn check_surface_support(
    registry: &HandleRegistry,
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    surface: vk::SurfaceKHR,
    out: &mut Vec<Finding>,
) {
    const FUNCTION: &str = "vkGetPhysicalDeviceSurfaceSupportKHR";

    if !check_physical_device(registry, physical_device, FUNCTION, out) {
        return;
    }
    if registry.find(surface).is_none() {
        out.push(invalid_handle(surface, FUNCTION, "VkSurfaceKHR"));
    }
    check_queue_family_index(
        registry,
        physical_device,
        queue_family_index,
        QueueFamilySite::SurfaceSupport,
        out,
    );
}

pub fn check_presentation_support(
    registry: &HandleRegistry,
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    site: QueueFamilySite,
    out: &mut Vec<Finding>,
) {
    if check_physical_device(registry, physical_device, site.function(), out) {
        check_queue_family_index(registry, physical_device, queue_family_index, site, out);
    }
}

pub fn check_create_surface(
    registry: &HandleRegistry,
    instance: vk::Instance,
    kind: SurfaceKind,
    function: &'static str,
    out: &mut Vec<Finding>,
) {
    if registry.find(instance).is_none() {
        out.push(invalid_handle(instance, function, "VkInstance"));
        return;
    }
    check_instance_extension(registry, instance, false, function, out);
    if kind == SurfaceKind::DisplayPlane {
        check_instance_extension(registry, instance, true, function, out);
    }
}

pub fn check_destroy_surface(
    registry: &HandleRegistry,
    instance: vk::Instance,
    surface: vk::SurfaceKHR,
    out: &mut Vec<Finding>,
) {
    const FUNCTION: &str = "vkDestroySurfaceKHR";

    if surface == vk::SurfaceKHR::null() {
        return;
    }
    let Some(record) = registry.lookup(surface) else {
        out.push(invalid_handle(surface, FUNCTION, "VkSurfaceKHR"));
        return;
    };
    let owner = registry.resolve(record.instance).map(|r| r.handle);
    if owner.is_some_and(|owner| owner != instance) {
        out.push(
            Finding::error(
                instance,
                SwapchainError::InvalidHandle,
                "{}() called with VkSurfaceKHR {} which was created on a different VkInstance.",
            )
            .arg(FUNCTION)
            .handle_arg(surface),
        );
    }
}

pub fn check_display_plane_properties(
    registry: &HandleRegistry,
    physical_device: vk::PhysicalDevice,
    requested: Option<u32>,
    out: &mut Vec<Finding>,
) {
    const FUNCTION: &str = "vkGetPhysicalDeviceDisplayPlanePropertiesKHR";

    if !check_physical_device(registry, physical_device, FUNCTION, out) {
        return;
    }
    check_display_enabled_for(registry, physical_device, FUNCTION, out);
    if let (Some(requested), Some(record)) = (requested, registry.lookup(physical_device)) {
        check_fetch_count(&record.display_planes, requested, physical_device, FUNCTION, out);
    }
}

pub fn check_display_plane_index(
    registry: &HandleRegistry,
    physical_device: vk::PhysicalDevice,
    plane_index: u32,
    site: PlaneSite,
    out: &mut Vec<Finding>,
) {
    let function = site.function();
    if !check_physical_device(registry, physical_device, function, out) {
        return;
    }
    check_display_enabled_for(registry, physical_device, function, out);

    let Some(record) = registry.lookup(physical_device) else {
        return;
    };
    match record.display_planes.knowledge() {
        Knowledge::Unknown => out.push(
            Finding::warning(
                physical_device,
                SwapchainError::GetSupportedDisplaysWithoutQuery,
                "Potential problem with calling {}() without first querying \
                 vkGetPhysicalDeviceDisplayPlanePropertiesKHR.",
            )
            .arg(function),
        ),
        Knowledge::Known(count) if plane_index >= count => {
            let finding = match site {
                PlaneSite::SupportedDisplays => Finding::error(
                    physical_device,
                    ValidationError::SupportedDisplaysPlaneIndex,
                    "{}(): planeIndex {} must be in the range [0, {}] that was returned by \
                     vkGetPhysicalDeviceDisplayPlanePropertiesKHR. Do you have the plane \
                     index hardcoded?",
                ),
                PlaneSite::Capabilities => Finding::error(
                    physical_device,
                    SwapchainError::PlaneIndexTooLarge,
                    "{}(): planeIndex {} must be in the range [0, {}] that was returned by \
                     vkGetPhysicalDeviceDisplayPlanePropertiesKHR. Do you have the plane \
                     index hardcoded?",
                ),
            };
            out.push(
                finding
                    .arg(function)
                    .arg(plane_index)
                    .arg(i64::from(count) - 1),
            );
        }
        Knowledge::Known(_) => {}
    }
}

pub fn check_create_swapchain(
    registry: &HandleRegistry,
    device: vk::Device,
    params: &SwapchainParams,
    out: &mut Vec<Finding>,
) {
    const FUNCTION: &str = "vkCreateSwapchainKHR";

    let device_known = check_device_extension(registry, device, FUNCTION, out);

    let surface_key = registry.find(params.surface);
    if surface_key.is_none() {
        out.push(invalid_handle(params.surface, FUNCTION, "VkSurfaceKHR"));
    }

    let physical_device = registry
        .lookup(device)
        .and_then(|record| registry.resolve(record.physical_device));

    // Without a surface or a physical device there is nothing left to compare.
    if let (Some(surface_key), Some(physical_device)) = (surface_key, physical_device) {
        match physical_device.supported_surfaces.get(&surface_key) {
            None => out.push(
                Finding::error(
                    device,
                    ValidationError::CreateSwapchainUnsupportedSurface,
                    "{}() called with pCreateInfo->surface {} that was not seen as supported \
                     by vkGetPhysicalDeviceSurfaceSupportKHR() for VkPhysicalDevice {}.",
                )
                .arg(FUNCTION)
                .handle_arg(params.surface)
                .handle_arg(physical_device.handle),
            ),
            Some(families) if !families.values().any(|&supported| supported) => out.push(
                Finding::error(
                    device,
                    SwapchainError::CreateUnsupportedSurface,
                    "{}() called with pCreateInfo->surface {} that \
                     vkGetPhysicalDeviceSurfaceSupportKHR() reported as not supported by any \
                     queue family of VkPhysicalDevice {}.",
                )
                .arg(FUNCTION)
                .handle_arg(params.surface)
                .handle_arg(physical_device.handle),
            ),
            Some(_) => {}
        }
    }

    match params.sharing_mode {
        vk::SharingMode::EXCLUSIVE => {}
        vk::SharingMode::CONCURRENT => {
            let indices = params.queue_family_indices.as_deref().unwrap_or(&[]);
            if indices.len() <= 1 {
                out.push(
                    Finding::error(
                        device,
                        ValidationError::CreateSwapchainSharingQueueFamilies,
                        "{}() called with imageSharingMode VK_SHARING_MODE_CONCURRENT, but \
                         pQueueFamilyIndices is NULL or queueFamilyIndexCount ({}) is not \
                         greater than 1.",
                    )
                    .arg(FUNCTION)
                    .arg(indices.len())
                    .blocking(),
                );
            }

            let mut seen = HashSet::new();
            if let Some(&repeated) = indices.iter().find(|&&index| !seen.insert(index)) {
                out.push(
                    Finding::error(
                        device,
                        SwapchainError::CreateSwapBadSharingValues,
                        "{}() called with imageSharingMode VK_SHARING_MODE_CONCURRENT and \
                         queue family {} listed more than once in pQueueFamilyIndices.",
                    )
                    .arg(FUNCTION)
                    .arg(repeated)
                    .blocking(),
                );
            }

            if device_known && !indices.is_empty() {
                if let Some(physical_device) = physical_device {
                    let mut found = Vec::new();
                    for &index in indices {
                        check_queue_family_index(
                            registry,
                            physical_device.handle,
                            index,
                            QueueFamilySite::CreateSwapchain,
                            &mut found,
                        );
                    }
                    // One "did not query" warning per call is enough.
                    let mut warned = false;
                    for finding in found {
                        if finding.code == MessageCode::from(SwapchainError::DidNotQueryQueueFamilies) {
                            if warned {
                                continue;
                            }
                            warned = true;
                            out.push(finding);
                        } else {
                            out.push(finding.blocking());
                        }
                    }
                }
            }
        }
        other => out.push(
            Finding::error(
                device,
                SwapchainError::CreateSwapBadSharingMode,
                "{}() called with a non-supported pCreateInfo->imageSharingMode ({}).",
            )
            .arg(FUNCTION)
            .arg(other.as_raw())
            .blocking(),
        ),
    }
}

pub fn check_destroy_swapchain(
    registry: &HandleRegistry,
    device: vk::Device,
    swapchain: vk::SwapchainKHR,
    out: &mut Vec<Finding>,
) {
    const FUNCTION: &str = "vkDestroySwapchainKHR";

    check_device_extension(registry, device, FUNCTION, out);
    if swapchain == vk::SwapchainKHR::null() {
        return;
    }
    let Some(record) = registry.lookup(swapchain) else {
        out.push(invalid_handle(swapchain, FUNCTION, "VkSwapchainKHR"));
        return;
    };
    let owner = registry.resolve(record.device).map(|r| r.handle);
    if owner.is_some_and(|owner| owner != device) {
        out.push(
            Finding::error(
                device,
                SwapchainError::DestroySwapDiffDevice,
                "{}() called with a different VkDevice than the VkSwapchainKHR {} was \
                 created with.",
            )
            .arg(FUNCTION)
            .handle_arg(swapchain),
        );
    }
}

pub fn check_get_swapchain_images(
    registry: &HandleRegistry,
    device: vk::Device,
    swapchain: vk::SwapchainKHR,
    requested: Option<u32>,
    out: &mut Vec<Finding>,
) {
    const FUNCTION: &str = "vkGetSwapchainImagesKHR";

    check_device_extension(registry, device, FUNCTION, out);
    let Some(record) = registry.lookup(swapchain) else {
        out.push(invalid_handle(swapchain, FUNCTION, "VkSwapchainKHR"));
        return;
    };
    if let Some(requested) = requested {
        check_fetch_count(&record.images, requested, swapchain, FUNCTION, out);
    }
}

pub fn check_acquire_next_image(
    registry: &HandleRegistry,
    device: vk::Device,
    swapchain: vk::SwapchainKHR,
    semaphore: vk::Semaphore,
    fence: vk::Fence,
    out: &mut Vec<Finding>,
) {
    const FUNCTION: &str = "vkAcquireNextImageKHR";

    check_device_extension(registry, device, FUNCTION, out);
    if registry.find(swapchain).is_none() {
        out.push(invalid_handle(swapchain, FUNCTION, "VkSwapchainKHR"));
    }
    if semaphore == vk::Semaphore::null() && fence == vk::Fence::null() {
        out.push(
            Finding::error(
                device,
                SwapchainError::NoSyncForAcquire,
                "{}() called with both the semaphore and fence parameters set to \
                 VK_NULL_HANDLE (at least one should be used).",
            )
            .arg(FUNCTION),
        );
    }
}

pub fn check_queue_present(
    registry: &HandleRegistry,
    queue: vk::Queue,
    presents: &[(vk::SwapchainKHR, u32)],
    out: &mut Vec<Finding>,
) {
    const FUNCTION: &str = "vkQueuePresentKHR";

    let queue_family = registry.lookup(queue).map(|r| r.queue_family_index);

    for (i, &(swapchain, image_index)) in presents.iter().enumerate() {
        let Some(record) = registry.lookup(swapchain) else {
            out.push(invalid_handle(swapchain, FUNCTION, "VkSwapchainKHR"));
            continue;
        };

        if let Some(count) = record.images.known() {
            if image_index >= count {
                out.push(
                    Finding::error(
                        swapchain,
                        SwapchainError::IndexTooLarge,
                        "{}() called for pPresentInfo->pImageIndices[{}], which is too large \
                         ({}); there are only {} images.",
                    )
                    .arg(FUNCTION)
                    .arg(i)
                    .arg(image_index)
                    .arg(count),
                );
                continue;
            }
        }

        if let Some(image) = record.image_records.get(image_index as usize) {
            if !image.acquired_by_app {
                out.push(
                    Finding::error(
                        swapchain,
                        SwapchainError::IndexNotInUse,
                        "{}() returned index {} for an image that is not owned by the \
                         application.",
                    )
                    .arg(FUNCTION)
                    .arg(image_index),
                );
            }
        }

        let surface = registry.resolve(record.surface);
        if let (Some(family), Some(surface)) = (queue_family, surface) {
            if surface.queue_family_support(family) == Some(false) {
                out.push(
                    Finding::error(
                        queue,
                        SwapchainError::SurfaceNotSupportedWithQueue,
                        "{}() called with a swapchain whose surface {} is not supported for \
                         presentation by queue family {}.",
                    )
                    .arg(FUNCTION)
                    .handle_arg(surface.handle)
                    .arg(family),
                );
            }
        }
    }
}

pub fn destroy_instance_findings(instance: vk::Instance, teardown: &InstanceTeardown) -> Vec<Finding> {
    let surfaces = teardown.surfaces.iter().map(|&surface| {
        Finding::error(
            instance,
            SwapchainError::DelObjectBeforeChildren,
            "vkDestroyInstance() called on VkInstance {} before its VkSurfaceKHR {} was destroyed.",
        )
        .handle_arg(instance)
        .handle_arg(surface)
    });
    let devices = teardown.devices.iter().map(|&device| {
        Finding::error(
            instance,
            SwapchainError::DelObjectBeforeChildren,
            "vkDestroyInstance() called on VkInstance {} before its VkDevice {} was destroyed.",
        )
        .handle_arg(instance)
        .handle_arg(device)
    });
    surfaces.chain(devices).collect()
}

fn orphaned_swapchain_findings<O: ReportObject>(
    parent: O,
    function: &'static str,
    parent_kind: &'static str,
    orphans: &SwapchainOrphans,
) -> Vec<Finding> {
    orphans
        .swapchains
        .iter()
        .map(|&swapchain| {
            Finding::error(
                parent,
                SwapchainError::DelObjectBeforeChildren,
                "{}() called on {} {} before its VkSwapchainKHR {} was destroyed.",
            )
            .arg(function)
            .arg(parent_kind)
            .handle_arg(parent)
            .handle_arg(swapchain)
        })
        .collect()
}

pub fn destroy_device_findings(device: vk::Device, orphans: &SwapchainOrphans) -> Vec<Finding> {
    orphaned_swapchain_findings(device, "vkDestroyDevice", "VkDevice", orphans)
}

pub fn destroy_surface_findings(
    surface: vk::SurfaceKHR,
    orphans: &SwapchainOrphans,
) -> Vec<Finding> {
    orphaned_swapchain_findings(surface, "vkDestroySurfaceKHR", "VkSurfaceKHR", orphans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use crate::records::{DeviceExtensions, InstanceExtensions};
    use crate::report::Severity;
    use std::collections::HashMap;

    const INSTANCE: u64 = 0x1;
    const PHYSICAL_DEVICE: u64 = 0x2;
    const DEVICE: u64 = 0x3;
    const SURFACE: u64 = 0x4;

    fn registry() -> HandleRegistry {
        let mut registry = HandleRegistry::new();
        let instance = vk::Instance::from_raw(INSTANCE);
        let physical_device = vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE);
        registry.link_instance(
            instance,
            InstanceExtensions {
                surface: true,
                display: true,
            },
        );
        registry.link_physical_devices(instance, &[physical_device]);
        registry.link_device(
            vk::Device::from_raw(DEVICE),
            physical_device,
            DeviceExtensions { swapchain: true },
        );
        registry.link_surface(instance, vk::SurfaceKHR::from_raw(SURFACE), SurfaceKind::Xcb);
        registry
    }

    fn set_queue_families(registry: &mut HandleRegistry, count: u32) {
        registry
            .lookup_mut(vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE))
            .unwrap()
            .queue_families
            .record_sizing(count);
    }

    fn codes(findings: &[Finding]) -> Vec<MessageCode> {
        findings.iter().map(|f| f.code).collect()
    }

    #[test]
    fn queue_family_bounds_per_site() {
        let mut registry = registry();
        set_queue_families(&mut registry, 3);
        let physical_device = vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE);

        for site in QueueFamilySite::ALL {
            let mut out = Vec::new();
            check_queue_family_index(&registry, physical_device, 2, site, &mut out);
            assert!(out.is_empty(), "{:?}", site);

            check_queue_family_index(&registry, physical_device, 3, site, &mut out);
            assert_eq!(codes(&out), [MessageCode::from(site.code())]);
            assert_eq!(out[0].severity, Severity::Error);
            assert!(out[0].message().contains("too large (3)"));
            assert!(out[0].message().contains("the max is 2"));
        }
    }

    #[test]
    fn site_codes_are_distinct() {
        let mut codes: Vec<_> = QueueFamilySite::ALL.iter().map(|s| s.code() as i32).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), QueueFamilySite::ALL.len());
    }

    #[test]
    fn unknown_queue_families_warn() {
        let registry = registry();
        let mut out = Vec::new();
        check_queue_family_index(
            &registry,
            vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE),
            7,
            QueueFamilySite::XcbPresentation,
            &mut out,
        );
        assert_eq!(
            codes(&out),
            [MessageCode::from(SwapchainError::DidNotQueryQueueFamilies)]
        );
        assert_eq!(out[0].severity, Severity::Warning);
    }

    #[test]
    fn unknown_physical_device() {
        let registry = registry();
        let mut out = Vec::new();
        check_surface_support(
            &registry,
            vk::PhysicalDevice::from_raw(0xdead),
            0,
            vk::SurfaceKHR::from_raw(SURFACE),
            &mut out,
        );
        assert_eq!(codes(&out), [MessageCode::from(SwapchainError::InvalidHandle)]);
    }

    #[test]
    fn create_swapchain_requires_support_query() {
        let mut registry = registry();
        let device = vk::Device::from_raw(DEVICE);
        let surface = vk::SurfaceKHR::from_raw(SURFACE);
        let params = SwapchainParams::exclusive(surface);

        let mut out = Vec::new();
        check_create_swapchain(&registry, device, &params, &mut out);
        assert_eq!(
            codes(&out),
            [MessageCode::from(ValidationError::CreateSwapchainUnsupportedSurface)]
        );
        assert!(!out[0].blocking);

        let surface_key = registry.find(surface).unwrap();
        registry
            .lookup_mut(vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE))
            .unwrap()
            .supported_surfaces
            .insert(surface_key, HashMap::from([(0, false), (1, true)]));

        out.clear();
        check_create_swapchain(&registry, device, &params, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn queried_but_unsupported_surface() {
        let mut registry = registry();
        let surface = vk::SurfaceKHR::from_raw(SURFACE);
        let surface_key = registry.find(surface).unwrap();
        registry
            .lookup_mut(vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE))
            .unwrap()
            .supported_surfaces
            .insert(surface_key, HashMap::from([(0, false)]));

        let mut out = Vec::new();
        check_create_swapchain(
            &registry,
            vk::Device::from_raw(DEVICE),
            &SwapchainParams::exclusive(surface),
            &mut out,
        );
        assert_eq!(
            codes(&out),
            [MessageCode::from(SwapchainError::CreateUnsupportedSurface)]
        );
        assert!(out[0].message().contains("not supported by any queue family"));
    }

    #[test]
    fn concurrent_sharing_repeated_family() {
        let mut registry = registry();
        set_queue_families(&mut registry, 3);
        let surface = vk::SurfaceKHR::from_raw(SURFACE);
        let surface_key = registry.find(surface).unwrap();
        registry
            .lookup_mut(vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE))
            .unwrap()
            .supported_surfaces
            .insert(surface_key, HashMap::from([(0, true)]));

        let mut params = SwapchainParams::exclusive(surface);
        params.sharing_mode = vk::SharingMode::CONCURRENT;
        params.queue_family_indices = Some(vec![1, 0, 1]);

        let mut out = Vec::new();
        check_create_swapchain(&registry, vk::Device::from_raw(DEVICE), &params, &mut out);
        assert_eq!(
            codes(&out),
            [MessageCode::from(SwapchainError::CreateSwapBadSharingValues)]
        );
        assert!(out[0].blocking);
        assert!(out[0].message().contains("queue family 1"));
    }

    #[test]
    fn device_queue_family_bound() {
        let mut registry = registry();
        let device = vk::Device::from_raw(DEVICE);

        let mut out = Vec::new();
        check_get_device_queue(&registry, device, 7, &mut out);
        assert!(out.is_empty());

        set_queue_families(&mut registry, 2);
        check_get_device_queue(&registry, device, 1, &mut out);
        assert!(out.is_empty());

        check_get_device_queue(&registry, device, 2, &mut out);
        assert_eq!(
            codes(&out),
            [MessageCode::from(SwapchainError::QueueFamilyIndexTooLarge)]
        );
        assert!(out[0].message().contains("the max is 1"));

        out.clear();
        check_get_device_queue(&registry, vk::Device::from_raw(0xdead), 0, &mut out);
        assert_eq!(codes(&out), [MessageCode::from(SwapchainError::InvalidHandle)]);
    }

    #[test]
    fn concurrent_sharing_needs_two_families() {
        let mut registry = registry();
        set_queue_families(&mut registry, 2);
        let surface = vk::SurfaceKHR::from_raw(SURFACE);
        let surface_key = registry.find(surface).unwrap();
        registry
            .lookup_mut(vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE))
            .unwrap()
            .supported_surfaces
            .insert(surface_key, HashMap::from([(0, true), (1, true)]));

        let mut params = SwapchainParams::exclusive(surface);
        params.sharing_mode = vk::SharingMode::CONCURRENT;

        for indices in [None, Some(vec![0])] {
            params.queue_family_indices = indices;
            let mut out = Vec::new();
            check_create_swapchain(&registry, vk::Device::from_raw(DEVICE), &params, &mut out);
            assert_eq!(
                codes(&out),
                [MessageCode::from(ValidationError::CreateSwapchainSharingQueueFamilies)]
            );
            assert!(out[0].blocking);
        }

        params.queue_family_indices = Some(vec![0, 1]);
        let mut out = Vec::new();
        check_create_swapchain(&registry, vk::Device::from_raw(DEVICE), &params, &mut out);
        assert!(out.is_empty());

        params.queue_family_indices = Some(vec![0, 2, 5]);
        check_create_swapchain(&registry, vk::Device::from_raw(DEVICE), &params, &mut out);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|f| f.blocking));
        assert!(out
            .iter()
            .all(|f| f.code == MessageCode::from(ValidationError::CreateSwapchainQueueFamilyIndex)));
    }

    #[test]
    fn swapchain_functions_need_extension() {
        let mut registry = registry();
        let device = vk::Device::from_raw(0x30);
        registry.link_device(
            device,
            vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE),
            DeviceExtensions::default(),
        );

        let mut out = Vec::new();
        check_acquire_next_image(
            &registry,
            device,
            vk::SwapchainKHR::from_raw(0x99),
            vk::Semaphore::from_raw(1),
            vk::Fence::null(),
            &mut out,
        );
        assert_eq!(
            codes(&out),
            [
                MessageCode::from(SwapchainError::ExtNotEnabledButUsed),
                MessageCode::from(SwapchainError::InvalidHandle),
            ]
        );
    }

    #[test]
    fn plane_index_checks() {
        let mut registry = registry();
        let physical_device = vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE);

        let mut out = Vec::new();
        check_display_plane_index(
            &registry,
            physical_device,
            0,
            PlaneSite::SupportedDisplays,
            &mut out,
        );
        assert_eq!(
            codes(&out),
            [MessageCode::from(SwapchainError::GetSupportedDisplaysWithoutQuery)]
        );
        assert_eq!(out[0].severity, Severity::Warning);

        registry
            .lookup_mut(physical_device)
            .unwrap()
            .display_planes
            .record_sizing(2);

        out.clear();
        check_display_plane_index(&registry, physical_device, 1, PlaneSite::Capabilities, &mut out);
        assert!(out.is_empty());

        check_display_plane_index(
            &registry,
            physical_device,
            2,
            PlaneSite::SupportedDisplays,
            &mut out,
        );
        check_display_plane_index(&registry, physical_device, 2, PlaneSite::Capabilities, &mut out);
        assert_eq!(
            codes(&out),
            [
                MessageCode::from(ValidationError::SupportedDisplaysPlaneIndex),
                MessageCode::from(SwapchainError::PlaneIndexTooLarge),
            ]
        );
        assert!(out[0].message().contains("[0, 1]"));
    }

    #[test]
    fn display_queries_need_display_extension() {
        let mut registry = HandleRegistry::new();
        let instance = vk::Instance::from_raw(INSTANCE);
        let physical_device = vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE);
        registry.link_instance(instance, InstanceExtensions::default());
        registry.link_physical_devices(instance, &[physical_device]);

        let mut out = Vec::new();
        check_display_plane_properties(&registry, physical_device, None, &mut out);
        assert_eq!(
            codes(&out),
            [MessageCode::from(SwapchainError::ExtNotEnabledButUsed)]
        );
    }

    #[test]
    fn present_checks_ownership_and_bounds() {
        let mut registry = registry();
        let device = vk::Device::from_raw(DEVICE);
        let surface = vk::SurfaceKHR::from_raw(SURFACE);
        let swapchain = vk::SwapchainKHR::from_raw(0x5);
        let queue = vk::Queue::from_raw(0x6);

        registry.link_swapchain(device, surface, swapchain);
        registry.link_queue(device, queue, 1);
        registry.lookup_mut(swapchain).unwrap().images.record_sizing(2);
        registry.link_swapchain_images(
            swapchain,
            &[vk::Image::from_raw(0x10), vk::Image::from_raw(0x11)],
        );
        registry.lookup_mut(swapchain).unwrap().image_records[0].acquired_by_app = true;
        registry.lookup_mut(surface).unwrap().queue_family_support = HashMap::from([(0, true), (1, false)]);

        let mut out = Vec::new();
        check_queue_present(&registry, queue, &[(swapchain, 0), (swapchain, 1), (swapchain, 2)], &mut out);
        assert_eq!(
            codes(&out),
            [
                MessageCode::from(SwapchainError::SurfaceNotSupportedWithQueue),
                MessageCode::from(SwapchainError::IndexNotInUse),
                MessageCode::from(SwapchainError::SurfaceNotSupportedWithQueue),
                MessageCode::from(SwapchainError::IndexTooLarge),
            ]
        );
    }

    #[test]
    fn teardown_findings_count_children() {
        let teardown = InstanceTeardown {
            surfaces: vec![vk::SurfaceKHR::from_raw(0x4)],
            devices: vec![vk::Device::from_raw(0x3), vk::Device::from_raw(0x33)],
            physical_devices_removed: 1,
        };
        let findings = destroy_instance_findings(vk::Instance::from_raw(0x1), &teardown);
        assert_eq!(findings.len(), 3);
        assert!(findings[0].message().contains("0x1"));
        assert!(findings[0].message().contains("0x4"));

        let orphans = SwapchainOrphans {
            swapchains: vec![vk::SwapchainKHR::from_raw(0x5)],
        };
        assert_eq!(destroy_device_findings(vk::Device::from_raw(0x3), &orphans).len(), 1);
        assert_eq!(
            destroy_surface_findings(vk::SurfaceKHR::from_raw(0x4), &orphans).len(),
            1
        );
    }
}
