//! WSI surface creation and the queue family support queries.
//!
//! Platform connection handles are passed through untouched, so they are
//! declared as opaque pointers rather than pulling in window-system types.

use std::ffi::c_void;

use ash::vk;

use super::{layer, missing, next_fn, null_pointer, status};
use crate::records::SurfaceKind;
use crate::rules::QueueFamilySite;

type PfnCreateSurface<Info> = unsafe extern "system" fn(
    vk::Instance,
    *const Info,
    *const vk::AllocationCallbacks,
    *mut vk::SurfaceKHR,
) -> vk::Result;
type PfnDestroySurface =
    unsafe extern "system" fn(vk::Instance, vk::SurfaceKHR, *const vk::AllocationCallbacks);
type PfnGetSurfaceSupport = unsafe extern "system" fn(
    vk::PhysicalDevice,
    u32,
    vk::SurfaceKHR,
    *mut vk::Bool32,
) -> vk::Result;

type PfnWin32PresentationSupport = unsafe extern "system" fn(vk::PhysicalDevice, u32) -> vk::Bool32;
type PfnXcbPresentationSupport =
    unsafe extern "system" fn(vk::PhysicalDevice, u32, *mut c_void, u32) -> vk::Bool32;
type PfnXlibPresentationSupport =
    unsafe extern "system" fn(vk::PhysicalDevice, u32, *mut c_void, libc::c_ulong) -> vk::Bool32;
type PfnWaylandPresentationSupport =
    unsafe extern "system" fn(vk::PhysicalDevice, u32, *mut c_void) -> vk::Bool32;
type PfnMirPresentationSupport =
    unsafe extern "system" fn(vk::PhysicalDevice, u32, *mut c_void) -> vk::Bool32;

/// Shared tail of every `vkCreate*SurfaceKHR`.
pub(super) unsafe fn create_surface(
    instance: vk::Instance,
    kind: SurfaceKind,
    function: &'static str,
    p_surface: *mut vk::SurfaceKHR,
    call: impl FnOnce() -> vk::Result,
) -> vk::Result {
    if p_surface.is_null() {
        return null_pointer(function, "pSurface");
    }
    status(layer().create_surface(instance, kind, function, || {
        let result = call();
        result.result_with_success(*p_surface)
    }))
}

macro_rules! surface_creator {
    ($fn_name:ident, $name:literal, $info:ty, $kind:expr) => {
        pub(crate) unsafe extern "system" fn $fn_name(
            instance: vk::Instance,
            p_create_info: *const $info,
            p_allocator: *const vk::AllocationCallbacks,
            p_surface: *mut vk::SurfaceKHR,
        ) -> vk::Result {
            let Some(next) = next_fn!(instance instance, $name as PfnCreateSurface<$info>) else {
                return missing($name);
            };
            create_surface(instance, $kind, $name, p_surface, || {
                next(instance, p_create_info, p_allocator, p_surface)
            })
        }
    };
}

surface_creator!(
    create_android_surface,
    "vkCreateAndroidSurfaceKHR",
    vk::AndroidSurfaceCreateInfoKHR,
    SurfaceKind::Android
);
// VK_KHR_mir_surface has left the registry; its create info is opaque here.
surface_creator!(
    create_mir_surface,
    "vkCreateMirSurfaceKHR",
    c_void,
    SurfaceKind::Mir
);
surface_creator!(
    create_wayland_surface,
    "vkCreateWaylandSurfaceKHR",
    vk::WaylandSurfaceCreateInfoKHR,
    SurfaceKind::Wayland
);
surface_creator!(
    create_win32_surface,
    "vkCreateWin32SurfaceKHR",
    vk::Win32SurfaceCreateInfoKHR,
    SurfaceKind::Win32
);
surface_creator!(
    create_xcb_surface,
    "vkCreateXcbSurfaceKHR",
    vk::XcbSurfaceCreateInfoKHR,
    SurfaceKind::Xcb
);
surface_creator!(
    create_xlib_surface,
    "vkCreateXlibSurfaceKHR",
    vk::XlibSurfaceCreateInfoKHR,
    SurfaceKind::Xlib
);

pub(crate) unsafe extern "system" fn destroy_surface(
    instance: vk::Instance,
    surface: vk::SurfaceKHR,
    p_allocator: *const vk::AllocationCallbacks,
) {
    let next = next_fn!(instance instance, "vkDestroySurfaceKHR" as PfnDestroySurface);
    layer().destroy_surface(instance, surface, || match next {
        Some(next) => next(instance, surface, p_allocator),
        None => log::warn!("vkDestroySurfaceKHR: {:?} has no next link", instance),
    });
}

pub(crate) unsafe extern "system" fn get_physical_device_surface_support(
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    surface: vk::SurfaceKHR,
    p_supported: *mut vk::Bool32,
) -> vk::Result {
    let Some(next) = next_fn!(instance physical_device, "vkGetPhysicalDeviceSurfaceSupportKHR" as PfnGetSurfaceSupport)
    else {
        return missing("vkGetPhysicalDeviceSurfaceSupportKHR");
    };
    if p_supported.is_null() {
        return null_pointer("vkGetPhysicalDeviceSurfaceSupportKHR", "pSupported");
    }
    status(
        layer().surface_support(physical_device, queue_family_index, surface, || {
            let result = next(physical_device, queue_family_index, surface, p_supported);
            result.result_with_success(*p_supported == vk::TRUE)
        }),
    )
}

fn unresolved(function: &'static str) -> vk::Bool32 {
    missing(function);
    vk::FALSE
}

pub(crate) unsafe extern "system" fn get_physical_device_win32_presentation_support(
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
) -> vk::Bool32 {
    const NAME: &str = "vkGetPhysicalDeviceWin32PresentationSupportKHR";
    let Some(next) = next_fn!(instance physical_device, "vkGetPhysicalDeviceWin32PresentationSupportKHR" as PfnWin32PresentationSupport)
    else {
        return unresolved(NAME);
    };
    layer().presentation_support(
        QueueFamilySite::Win32Presentation,
        physical_device,
        queue_family_index,
        || next(physical_device, queue_family_index),
    )
}

pub(crate) unsafe extern "system" fn get_physical_device_xcb_presentation_support(
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    connection: *mut c_void,
    visual_id: u32,
) -> vk::Bool32 {
    const NAME: &str = "vkGetPhysicalDeviceXcbPresentationSupportKHR";
    let Some(next) = next_fn!(instance physical_device, "vkGetPhysicalDeviceXcbPresentationSupportKHR" as PfnXcbPresentationSupport)
    else {
        return unresolved(NAME);
    };
    layer().presentation_support(
        QueueFamilySite::XcbPresentation,
        physical_device,
        queue_family_index,
        || next(physical_device, queue_family_index, connection, visual_id),
    )
}

pub(crate) unsafe extern "system" fn get_physical_device_xlib_presentation_support(
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    dpy: *mut c_void,
    visual_id: libc::c_ulong,
) -> vk::Bool32 {
    const NAME: &str = "vkGetPhysicalDeviceXlibPresentationSupportKHR";
    let Some(next) = next_fn!(instance physical_device, "vkGetPhysicalDeviceXlibPresentationSupportKHR" as PfnXlibPresentationSupport)
    else {
        return unresolved(NAME);
    };
    layer().presentation_support(
        QueueFamilySite::XlibPresentation,
        physical_device,
        queue_family_index,
        || next(physical_device, queue_family_index, dpy, visual_id),
    )
}

pub(crate) unsafe extern "system" fn get_physical_device_wayland_presentation_support(
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    display: *mut c_void,
) -> vk::Bool32 {
    const NAME: &str = "vkGetPhysicalDeviceWaylandPresentationSupportKHR";
    let Some(next) = next_fn!(instance physical_device, "vkGetPhysicalDeviceWaylandPresentationSupportKHR" as PfnWaylandPresentationSupport)
    else {
        return unresolved(NAME);
    };
    layer().presentation_support(
        QueueFamilySite::WaylandPresentation,
        physical_device,
        queue_family_index,
        || next(physical_device, queue_family_index, display),
    )
}

pub(crate) unsafe extern "system" fn get_physical_device_mir_presentation_support(
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    connection: *mut c_void,
) -> vk::Bool32 {
    const NAME: &str = "vkGetPhysicalDeviceMirPresentationSupportKHR";
    let Some(next) = next_fn!(instance physical_device, "vkGetPhysicalDeviceMirPresentationSupportKHR" as PfnMirPresentationSupport)
    else {
        return unresolved(NAME);
    };
    layer().presentation_support(
        QueueFamilySite::MirPresentation,
        physical_device,
        queue_family_index,
        || next(physical_device, queue_family_index, connection),
    )
}
