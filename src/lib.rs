//! `VK_LAYER_LUNARG_swapchain`: a Vulkan layer that tracks WSI objects
//! (instances, physical devices, devices, surfaces, swapchains) and reports
//! misuse of the surface and swapchain extensions.
//!
//! The loader talks to the exported functions in this file and to the
//! `extern "system"` functions in [`ffi`]; everything they decide is done by
//! [`layer::SwapchainLayer`] over the object graph in [`registry`].

pub mod arena;
pub mod codes;
pub mod config;
pub mod entry_points;
pub mod error;
mod ffi;
pub mod graph;
pub mod layer;
pub mod records;
pub mod registry;
pub mod report;
pub mod rules;

use ash::vk;
use libc::c_char;
use std::{ffi::CStr, ptr};

use config::LayerSettings;
use error::LayerError;
use ffi::next_fn;

pub const LAYER_NAME: &str = "VK_LAYER_LUNARG_swapchain";
const LAYER_VERSION: u32 = 1;
const LAYER_SPEC_VERSION: u32 = vk::API_VERSION_1_0;
const LAYER_DESCRIPTION: &str = "LunarG Validation Layer";

const DEBUG_REPORT_EXTENSION: &str = "VK_EXT_debug_report";
const DEBUG_REPORT_SPEC_VERSION: u32 = 6;

pub const MIN_INTERFACE_VERSION: u32 = 1;
pub const MAX_INTERFACE_VERSION: u32 = 2;

const LAYER_NEGOTIATE_INTERFACE_STRUCT: u32 = 1;

/// `VkNegotiateLayerInterface` from the loader-layer interface.
#[repr(C)]
pub struct NegotiateLayerInterface {
    pub s_type: u32,
    pub p_next: *mut libc::c_void,
    pub loader_layer_interface_version: u32,
    pub pfn_get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,
    pub pfn_get_device_proc_addr: Option<vk::PFN_vkGetDeviceProcAddr>,
    pub pfn_get_physical_device_proc_addr: Option<ffi::PfnGetPhysicalDeviceProcAddr>,
}

// Initialize logging (called once per instance, later calls are no-ops)
pub(crate) fn init_logging(settings: &LayerSettings) {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(filter) = &settings.log_filter {
        builder.parse_filters(filter);
    }
    let _ = builder.try_init();
}

/// Picks the interface version to run with, given the loader's maximum.
pub fn negotiate_interface_version(loader_version: u32) -> Result<u32, LayerError> {
    if loader_version < MIN_INTERFACE_VERSION {
        return Err(LayerError::UnsupportedInterface(loader_version));
    }
    Ok(loader_version.min(MAX_INTERFACE_VERSION))
}

fn fill_c_str<const N: usize>(dst: &mut [c_char; N], src: &str) {
    let len = src.len().min(N - 1);
    for (slot, &byte) in dst.iter_mut().zip(&src.as_bytes()[..len]) {
        *slot = byte as c_char;
    }
    dst[len] = 0;
}

pub fn layer_properties() -> vk::LayerProperties {
    let mut properties = vk::LayerProperties {
        spec_version: LAYER_SPEC_VERSION,
        implementation_version: LAYER_VERSION,
        ..Default::default()
    };
    fill_c_str(&mut properties.layer_name, LAYER_NAME);
    fill_c_str(&mut properties.description, LAYER_DESCRIPTION);
    properties
}

pub fn instance_extension_properties() -> [vk::ExtensionProperties; 1] {
    let mut debug_report = vk::ExtensionProperties {
        spec_version: DEBUG_REPORT_SPEC_VERSION,
        ..Default::default()
    };
    fill_c_str(&mut debug_report.extension_name, DEBUG_REPORT_EXTENSION);
    [debug_report]
}

/// Two-call enumeration: a null array asks for the count, a short array gets
/// what fits and `VK_INCOMPLETE`.
///
/// # Safety
///
/// `p_count` must be valid for reads and writes; `p_items`, when not null,
/// must hold `*p_count` elements.
pub unsafe fn copy_out<T: Copy>(items: &[T], p_count: *mut u32, p_items: *mut T) -> vk::Result {
    if p_count.is_null() {
        return LayerError::NullPointer("pPropertyCount").to_vk_result();
    }
    if p_items.is_null() {
        *p_count = items.len() as u32;
        return vk::Result::SUCCESS;
    }

    let written = (*p_count as usize).min(items.len());
    ptr::copy_nonoverlapping(items.as_ptr(), p_items, written);
    *p_count = written as u32;
    if written < items.len() {
        vk::Result::INCOMPLETE
    } else {
        vk::Result::SUCCESS
    }
}

enum LayerQuery {
    Ours,
    Other,
    Unnamed,
}

unsafe fn layer_query(p_layer_name: *const c_char) -> LayerQuery {
    if p_layer_name.is_null() {
        return LayerQuery::Unnamed;
    }
    if CStr::from_ptr(p_layer_name).to_bytes() == LAYER_NAME.as_bytes() {
        LayerQuery::Ours
    } else {
        LayerQuery::Other
    }
}

unsafe fn requested_name<'a>(p_name: *const c_char) -> Option<&'a str> {
    if p_name.is_null() {
        return None;
    }
    CStr::from_ptr(p_name).to_str().ok()
}

#[no_mangle]
pub unsafe extern "system" fn vkNegotiateLoaderLayerInterfaceVersion(
    p_version_struct: *mut NegotiateLayerInterface,
) -> vk::Result {
    init_logging(ffi::layer().settings());

    if p_version_struct.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    let interface = &mut *p_version_struct;
    if interface.s_type != LAYER_NEGOTIATE_INTERFACE_STRUCT {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }

    let version = match negotiate_interface_version(interface.loader_layer_interface_version) {
        Ok(version) => version,
        Err(err) => {
            log::error!("{}: {}", LAYER_NAME, err);
            return err.to_vk_result();
        }
    };
    log::info!("{}: negotiated loader interface version {}", LAYER_NAME, version);

    if version >= 2 {
        interface.pfn_get_instance_proc_addr = Some(vkGetInstanceProcAddr);
        interface.pfn_get_device_proc_addr = Some(vkGetDeviceProcAddr);
        interface.pfn_get_physical_device_proc_addr = Some(vk_layerGetPhysicalDeviceProcAddr);
    }
    interface.loader_layer_interface_version = version;
    vk::Result::SUCCESS
}

#[no_mangle]
pub unsafe extern "system" fn vkGetInstanceProcAddr(
    instance: vk::Instance,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    let name = requested_name(p_name)?;
    log::trace!("vkGetInstanceProcAddr({:?}, {})", instance, name);

    match entry_points::lookup_instance(name) {
        Some(entry) => ffi::entry_point_address(entry),
        None => ffi::next_instance_gipa(instance, p_name),
    }
}

#[no_mangle]
pub unsafe extern "system" fn vkGetDeviceProcAddr(
    device: vk::Device,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    let name = requested_name(p_name)?;
    log::trace!("vkGetDeviceProcAddr({:?}, {})", device, name);

    match entry_points::lookup_device(name) {
        Some(entry) => ffi::entry_point_address(entry),
        None => ffi::next_device_gdpa(device, p_name),
    }
}

#[no_mangle]
pub unsafe extern "system" fn vk_layerGetPhysicalDeviceProcAddr(
    instance: vk::Instance,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    let name = requested_name(p_name)?;
    match entry_points::lookup_physical_device(name) {
        Some(entry) => ffi::entry_point_address(entry),
        None => ffi::next_instance_gpdpa(instance, p_name),
    }
}

#[no_mangle]
pub unsafe extern "system" fn vkEnumerateInstanceLayerProperties(
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    copy_out(&[layer_properties()], p_property_count, p_properties)
}

#[no_mangle]
pub unsafe extern "system" fn vkEnumerateDeviceLayerProperties(
    _physical_device: vk::PhysicalDevice,
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    copy_out(&[layer_properties()], p_property_count, p_properties)
}

#[no_mangle]
pub unsafe extern "system" fn vkEnumerateInstanceExtensionProperties(
    p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    match layer_query(p_layer_name) {
        LayerQuery::Ours => copy_out(
            &instance_extension_properties(),
            p_property_count,
            p_properties,
        ),
        // The loader only asks a layer about its own extensions.
        LayerQuery::Other | LayerQuery::Unnamed => vk::Result::ERROR_LAYER_NOT_PRESENT,
    }
}

#[no_mangle]
pub unsafe extern "system" fn vkEnumerateDeviceExtensionProperties(
    physical_device: vk::PhysicalDevice,
    p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    match layer_query(p_layer_name) {
        LayerQuery::Ours => copy_out::<vk::ExtensionProperties>(&[], p_property_count, p_properties),
        LayerQuery::Other => vk::Result::ERROR_LAYER_NOT_PRESENT,
        LayerQuery::Unnamed => {
            let next = next_fn!(instance physical_device, "vkEnumerateDeviceExtensionProperties" as vk::PFN_vkEnumerateDeviceExtensionProperties);
            match next {
                Some(next) => next(physical_device, p_layer_name, p_property_count, p_properties),
                None => vk::Result::ERROR_LAYER_NOT_PRESENT,
            }
        }
    }
}
