//! Loader-facing glue: dispatch keys, the link to the next layer and the
//! `extern "system"` functions handed out by the proc-addr lookups.
//!
//! Everything here converts raw pointers into values and hands them to
//! [`SwapchainLayer`]; no validation happens at this level.

pub(crate) mod chain;
mod debug;
mod device;
mod display;
mod instance;
mod surface;
mod swapchain;

use std::collections::HashMap;
use std::ffi::{c_char, CStr};
use std::mem;
use std::slice;
use std::sync::OnceLock;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use parking_lot::RwLock;

use crate::config::LayerSettings;
use crate::entry_points::EntryPoint;
use crate::error::LayerError;
use crate::layer::{SwapchainLayer, Written};

pub type PfnGetPhysicalDeviceProcAddr =
    unsafe extern "system" fn(vk::Instance, *const c_char) -> vk::PFN_vkVoidFunction;

#[derive(Clone, Copy)]
struct InstanceDispatch {
    instance: vk::Instance,
    next_gipa: vk::PFN_vkGetInstanceProcAddr,
    next_gpdpa: Option<PfnGetPhysicalDeviceProcAddr>,
}

#[derive(Clone, Copy)]
struct DeviceDispatch {
    device: vk::Device,
    next_gdpa: vk::PFN_vkGetDeviceProcAddr,
}

/// Next-link entry points, keyed by dispatch key.
#[derive(Default)]
struct DispatchMaps {
    instances: RwLock<HashMap<usize, InstanceDispatch>>,
    devices: RwLock<HashMap<usize, DeviceDispatch>>,
}

fn maps() -> &'static DispatchMaps {
    static MAPS: OnceLock<DispatchMaps> = OnceLock::new();
    MAPS.get_or_init(DispatchMaps::default)
}

/// The layer instance serving this process.
pub fn layer() -> &'static SwapchainLayer {
    static LAYER: OnceLock<SwapchainLayer> = OnceLock::new();
    LAYER.get_or_init(|| SwapchainLayer::new(LayerSettings::from_env()))
}

/// The loader stores its dispatch table pointer in the first word of every
/// dispatchable object. Physical devices share their instance's key, queues
/// their device's.
///
/// # Safety
///
/// `handle` must be a live dispatchable handle or null.
unsafe fn dispatch_key<H: Handle>(handle: H) -> Option<usize> {
    let raw = handle.as_raw();
    if raw == 0 {
        return None;
    }
    Some(*(raw as *const usize))
}

unsafe fn register_instance(
    instance: vk::Instance,
    next_gipa: vk::PFN_vkGetInstanceProcAddr,
    next_gpdpa: Option<PfnGetPhysicalDeviceProcAddr>,
) {
    if let Some(key) = dispatch_key(instance) {
        maps().instances.write().insert(
            key,
            InstanceDispatch {
                instance,
                next_gipa,
                next_gpdpa,
            },
        );
    }
}

/// Drops the next-link entry saved under `key`. The key has to be read before
/// the object is destroyed, since its first word is gone afterwards.
fn unregister_instance(key: Option<usize>) {
    if let Some(key) = key {
        maps().instances.write().remove(&key);
    }
}

unsafe fn register_device(device: vk::Device, next_gdpa: vk::PFN_vkGetDeviceProcAddr) {
    if let Some(key) = dispatch_key(device) {
        maps()
            .devices
            .write()
            .insert(key, DeviceDispatch { device, next_gdpa });
    }
}

fn unregister_device(key: Option<usize>) {
    if let Some(key) = key {
        maps().devices.write().remove(&key);
    }
}

unsafe fn instance_dispatch<H: Handle>(handle: H) -> Option<InstanceDispatch> {
    let key = dispatch_key(handle)?;
    maps().instances.read().get(&key).copied()
}

/// The instance a physical device (or instance) belongs to, as the loader sees it.
pub(crate) unsafe fn owning_instance<H: Handle>(handle: H) -> vk::Instance {
    instance_dispatch(handle).map_or(vk::Instance::null(), |d| d.instance)
}

/// Asks the next link for an instance-level command. `name` is NUL terminated.
pub(crate) unsafe fn next_instance_proc<H: Handle>(
    handle: H,
    name: &'static str,
) -> vk::PFN_vkVoidFunction {
    let dispatch = instance_dispatch(handle)?;
    (dispatch.next_gipa)(dispatch.instance, name.as_ptr().cast())
}

/// Asks the next link for a device-level command. `name` is NUL terminated.
pub(crate) unsafe fn next_device_proc<H: Handle>(
    handle: H,
    name: &'static str,
) -> vk::PFN_vkVoidFunction {
    let key = dispatch_key(handle)?;
    let dispatch = maps().devices.read().get(&key).copied()?;
    (dispatch.next_gdpa)(dispatch.device, name.as_ptr().cast())
}

pub(crate) unsafe fn next_instance_gipa(instance: vk::Instance, name: *const c_char) -> vk::PFN_vkVoidFunction {
    let dispatch = instance_dispatch(instance)?;
    (dispatch.next_gipa)(instance, name)
}

pub(crate) unsafe fn next_device_gdpa(device: vk::Device, name: *const c_char) -> vk::PFN_vkVoidFunction {
    let key = dispatch_key(device)?;
    let dispatch = maps().devices.read().get(&key).copied()?;
    (dispatch.next_gdpa)(device, name)
}

pub(crate) unsafe fn next_instance_gpdpa(
    instance: vk::Instance,
    name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    let next = instance_dispatch(instance)?.next_gpdpa?;
    next(instance, name)
}

/// Resolves a command from the next link into its typed function pointer.
macro_rules! next_fn {
    (instance $handle:expr, $name:literal as $pfn:ty) => {
        $crate::ffi::next_instance_proc($handle, concat!($name, "\0"))
            .map(|f| std::mem::transmute::<unsafe extern "system" fn(), $pfn>(f))
    };
    (device $handle:expr, $name:literal as $pfn:ty) => {
        $crate::ffi::next_device_proc($handle, concat!($name, "\0"))
            .map(|f| std::mem::transmute::<unsafe extern "system" fn(), $pfn>(f))
    };
}
pub(crate) use next_fn;

fn missing(function: &'static str) -> vk::Result {
    let err = LayerError::MissingEntryPoint(function);
    log::error!("{}", err);
    err.to_vk_result()
}

fn null_pointer(function: &'static str, parameter: &'static str) -> vk::Result {
    let err = LayerError::NullPointer(parameter);
    log::error!("{}(): {}", function, err);
    err.to_vk_result()
}

fn status<T>(result: VkResult<T>) -> vk::Result {
    match result {
        Ok(_) => vk::Result::SUCCESS,
        Err(err) => err,
    }
}

/// Reads the outcome of a two-call enumeration after the next link returned.
unsafe fn written<H: Copy>(result: vk::Result, p_count: *const u32, p_items: *const H) -> Written<H> {
    if !matches!(result, vk::Result::SUCCESS | vk::Result::INCOMPLETE) || p_count.is_null() {
        return Written::count(result, 0);
    }
    if p_items.is_null() {
        Written::count(result, *p_count)
    } else {
        Written::handles(result, slice::from_raw_parts(p_items, *p_count as usize).to_vec())
    }
}

/// Extension names out of a create-info. Names that aren't UTF-8 are skipped.
unsafe fn c_str_list<'a>(count: u32, names: *const *const c_char) -> Vec<&'a str> {
    if names.is_null() {
        return Vec::new();
    }
    slice::from_raw_parts(names, count as usize)
        .iter()
        .filter(|name| !name.is_null())
        .filter_map(|&name| CStr::from_ptr(name).to_str().ok())
        .collect()
}

macro_rules! pfn {
    ($f:expr) => {
        Some(mem::transmute::<*const (), unsafe extern "system" fn()>($f as *const ()))
    };
}

/// The layer's own implementation of an intercepted command.
pub(crate) fn entry_point_address(entry: EntryPoint) -> vk::PFN_vkVoidFunction {
    unsafe {
        match entry {
            EntryPoint::GetInstanceProcAddr => pfn!(crate::vkGetInstanceProcAddr),
            EntryPoint::GetDeviceProcAddr => pfn!(crate::vkGetDeviceProcAddr),
            EntryPoint::EnumerateInstanceLayerProperties => {
                pfn!(crate::vkEnumerateInstanceLayerProperties)
            }
            EntryPoint::EnumerateInstanceExtensionProperties => {
                pfn!(crate::vkEnumerateInstanceExtensionProperties)
            }
            EntryPoint::EnumerateDeviceLayerProperties => {
                pfn!(crate::vkEnumerateDeviceLayerProperties)
            }
            EntryPoint::EnumerateDeviceExtensionProperties => {
                pfn!(crate::vkEnumerateDeviceExtensionProperties)
            }
            EntryPoint::CreateInstance => pfn!(instance::create_instance),
            EntryPoint::DestroyInstance => pfn!(instance::destroy_instance),
            EntryPoint::EnumeratePhysicalDevices => pfn!(instance::enumerate_physical_devices),
            EntryPoint::GetPhysicalDeviceQueueFamilyProperties => {
                pfn!(instance::get_physical_device_queue_family_properties)
            }
            EntryPoint::CreateDevice => pfn!(instance::create_device),
            EntryPoint::CreateDebugReportCallbackEXT => {
                pfn!(debug::create_debug_report_callback)
            }
            EntryPoint::DestroyDebugReportCallbackEXT => {
                pfn!(debug::destroy_debug_report_callback)
            }
            EntryPoint::DestroySurfaceKHR => pfn!(surface::destroy_surface),
            EntryPoint::GetPhysicalDeviceSurfaceSupportKHR => {
                pfn!(surface::get_physical_device_surface_support)
            }
            EntryPoint::GetPhysicalDeviceDisplayPlanePropertiesKHR => {
                pfn!(display::get_physical_device_display_plane_properties)
            }
            EntryPoint::GetDisplayPlaneSupportedDisplaysKHR => {
                pfn!(display::get_display_plane_supported_displays)
            }
            EntryPoint::GetDisplayPlaneCapabilitiesKHR => {
                pfn!(display::get_display_plane_capabilities)
            }
            EntryPoint::CreateDisplayPlaneSurfaceKHR => {
                pfn!(display::create_display_plane_surface)
            }
            EntryPoint::CreateAndroidSurfaceKHR => pfn!(surface::create_android_surface),
            EntryPoint::CreateMirSurfaceKHR => pfn!(surface::create_mir_surface),
            EntryPoint::GetPhysicalDeviceMirPresentationSupportKHR => {
                pfn!(surface::get_physical_device_mir_presentation_support)
            }
            EntryPoint::CreateWaylandSurfaceKHR => pfn!(surface::create_wayland_surface),
            EntryPoint::GetPhysicalDeviceWaylandPresentationSupportKHR => {
                pfn!(surface::get_physical_device_wayland_presentation_support)
            }
            EntryPoint::CreateWin32SurfaceKHR => pfn!(surface::create_win32_surface),
            EntryPoint::GetPhysicalDeviceWin32PresentationSupportKHR => {
                pfn!(surface::get_physical_device_win32_presentation_support)
            }
            EntryPoint::CreateXcbSurfaceKHR => pfn!(surface::create_xcb_surface),
            EntryPoint::GetPhysicalDeviceXcbPresentationSupportKHR => {
                pfn!(surface::get_physical_device_xcb_presentation_support)
            }
            EntryPoint::CreateXlibSurfaceKHR => pfn!(surface::create_xlib_surface),
            EntryPoint::GetPhysicalDeviceXlibPresentationSupportKHR => {
                pfn!(surface::get_physical_device_xlib_presentation_support)
            }
            EntryPoint::DestroyDevice => pfn!(device::destroy_device),
            EntryPoint::GetDeviceQueue => pfn!(device::get_device_queue),
            EntryPoint::CreateSwapchainKHR => pfn!(swapchain::create_swapchain),
            EntryPoint::DestroySwapchainKHR => pfn!(swapchain::destroy_swapchain),
            EntryPoint::GetSwapchainImagesKHR => pfn!(swapchain::get_swapchain_images),
            EntryPoint::AcquireNextImageKHR => pfn!(swapchain::acquire_next_image),
            EntryPoint::QueuePresentKHR => pfn!(swapchain::queue_present),
        }
    }
}
