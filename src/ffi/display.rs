use ash::vk;

use super::surface::create_surface;
use super::{layer, missing, next_fn, null_pointer};
use crate::records::SurfaceKind;
use crate::rules::PlaneSite;

type PfnGetDisplayPlaneProperties = unsafe extern "system" fn(
    vk::PhysicalDevice,
    *mut u32,
    *mut vk::DisplayPlanePropertiesKHR,
) -> vk::Result;
type PfnGetSupportedDisplays =
    unsafe extern "system" fn(vk::PhysicalDevice, u32, *mut u32, *mut vk::DisplayKHR) -> vk::Result;
type PfnGetPlaneCapabilities = unsafe extern "system" fn(
    vk::PhysicalDevice,
    vk::DisplayModeKHR,
    u32,
    *mut vk::DisplayPlaneCapabilitiesKHR,
) -> vk::Result;
type PfnCreateDisplayPlaneSurface = unsafe extern "system" fn(
    vk::Instance,
    *const vk::DisplaySurfaceCreateInfoKHR,
    *const vk::AllocationCallbacks,
    *mut vk::SurfaceKHR,
) -> vk::Result;

pub(crate) unsafe extern "system" fn get_physical_device_display_plane_properties(
    physical_device: vk::PhysicalDevice,
    p_property_count: *mut u32,
    p_properties: *mut vk::DisplayPlanePropertiesKHR,
) -> vk::Result {
    let Some(next) = next_fn!(instance physical_device, "vkGetPhysicalDeviceDisplayPlanePropertiesKHR" as PfnGetDisplayPlaneProperties)
    else {
        return missing("vkGetPhysicalDeviceDisplayPlanePropertiesKHR");
    };
    if p_property_count.is_null() {
        return null_pointer("vkGetPhysicalDeviceDisplayPlanePropertiesKHR", "pPropertyCount");
    }

    let requested = (!p_properties.is_null()).then(|| *p_property_count);
    layer().display_plane_properties(physical_device, requested, || {
        let result = next(physical_device, p_property_count, p_properties);
        (result, *p_property_count)
    })
}

pub(crate) unsafe extern "system" fn get_display_plane_supported_displays(
    physical_device: vk::PhysicalDevice,
    plane_index: u32,
    p_display_count: *mut u32,
    p_displays: *mut vk::DisplayKHR,
) -> vk::Result {
    let Some(next) = next_fn!(instance physical_device, "vkGetDisplayPlaneSupportedDisplaysKHR" as PfnGetSupportedDisplays)
    else {
        return missing("vkGetDisplayPlaneSupportedDisplaysKHR");
    };
    layer().display_plane_query(PlaneSite::SupportedDisplays, physical_device, plane_index, || {
        next(physical_device, plane_index, p_display_count, p_displays)
    })
}

pub(crate) unsafe extern "system" fn get_display_plane_capabilities(
    physical_device: vk::PhysicalDevice,
    mode: vk::DisplayModeKHR,
    plane_index: u32,
    p_capabilities: *mut vk::DisplayPlaneCapabilitiesKHR,
) -> vk::Result {
    let Some(next) = next_fn!(instance physical_device, "vkGetDisplayPlaneCapabilitiesKHR" as PfnGetPlaneCapabilities)
    else {
        return missing("vkGetDisplayPlaneCapabilitiesKHR");
    };
    layer().display_plane_query(PlaneSite::Capabilities, physical_device, plane_index, || {
        next(physical_device, mode, plane_index, p_capabilities)
    })
}

pub(crate) unsafe extern "system" fn create_display_plane_surface(
    instance: vk::Instance,
    p_create_info: *const vk::DisplaySurfaceCreateInfoKHR,
    p_allocator: *const vk::AllocationCallbacks,
    p_surface: *mut vk::SurfaceKHR,
) -> vk::Result {
    const NAME: &str = "vkCreateDisplayPlaneSurfaceKHR";
    let Some(next) = next_fn!(instance instance, "vkCreateDisplayPlaneSurfaceKHR" as PfnCreateDisplayPlaneSurface)
    else {
        return missing(NAME);
    };
    create_surface(instance, SurfaceKind::DisplayPlane, NAME, p_surface, || {
        next(instance, p_create_info, p_allocator, p_surface)
    })
}
