//! The loader's layer chain: link structures threaded through the pNext of
//! `VkInstanceCreateInfo` and `VkDeviceCreateInfo`.

use std::ffi::c_void;
use std::ptr;

use ash::vk;

use super::PfnGetPhysicalDeviceProcAddr;
use crate::error::LayerError;

pub const LOADER_INSTANCE_CREATE_INFO: vk::StructureType = vk::StructureType::from_raw(47);
pub const LOADER_DEVICE_CREATE_INFO: vk::StructureType = vk::StructureType::from_raw(48);
pub const LAYER_LINK_INFO: u32 = 0;

#[repr(C)]
pub struct LayerInstanceLink {
    pub p_next: *mut LayerInstanceLink,
    pub pfn_next_get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,
    pub pfn_next_get_phys_dev_proc_addr: Option<PfnGetPhysicalDeviceProcAddr>,
}

#[repr(C)]
pub struct LayerInstanceCreateInfo {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub function: u32,
    pub u_layer_info: *mut LayerInstanceLink,
}

#[repr(C)]
pub struct LayerDeviceLink {
    pub p_next: *mut LayerDeviceLink,
    pub pfn_next_get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,
    pub pfn_next_get_device_proc_addr: Option<vk::PFN_vkGetDeviceProcAddr>,
}

#[repr(C)]
pub struct LayerDeviceCreateInfo {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub function: u32,
    pub u_layer_info: *mut LayerDeviceLink,
}

#[derive(Clone, Copy)]
pub struct InstanceChain {
    pub next_gipa: vk::PFN_vkGetInstanceProcAddr,
    pub next_gpdpa: Option<PfnGetPhysicalDeviceProcAddr>,
}

#[derive(Clone, Copy)]
pub struct DeviceChain {
    pub next_gipa: vk::PFN_vkGetInstanceProcAddr,
    pub next_gdpa: vk::PFN_vkGetDeviceProcAddr,
}

/// Walks `p_next` for the loader structure of type `s_type` carrying link info.
unsafe fn find_link_info(mut p: *const c_void, s_type: vk::StructureType) -> *mut c_void {
    while !p.is_null() {
        let base = &*(p as *const vk::BaseInStructure);
        if base.s_type == s_type {
            // Instance and device variants share their layout up to the union.
            let info = &*(p as *const LayerInstanceCreateInfo);
            if info.function == LAYER_LINK_INFO && !info.u_layer_info.is_null() {
                return p as *mut c_void;
            }
        }
        p = base.p_next as *const c_void;
    }
    ptr::null_mut()
}

/// Reads this layer's link and moves the chain on to the next layer, which
/// will read the create-info after us.
///
/// # Safety
///
/// `create_info` must point to a valid `VkInstanceCreateInfo` whose chain may
/// be modified.
pub unsafe fn take_instance_link(
    create_info: *const vk::InstanceCreateInfo,
) -> Result<InstanceChain, LayerError> {
    let info = find_link_info((*create_info).p_next, LOADER_INSTANCE_CREATE_INFO)
        as *mut LayerInstanceCreateInfo;
    if info.is_null() {
        return Err(LayerError::MissingLinkInfo("instance"));
    }
    let link = &*(*info).u_layer_info;
    let next_gipa = link
        .pfn_next_get_instance_proc_addr
        .ok_or(LayerError::MissingLinkInfo("instance"))?;
    let chain = InstanceChain {
        next_gipa,
        next_gpdpa: link.pfn_next_get_phys_dev_proc_addr,
    };
    (*info).u_layer_info = link.p_next;
    Ok(chain)
}

/// Device counterpart of [`take_instance_link`].
///
/// # Safety
///
/// `create_info` must point to a valid `VkDeviceCreateInfo` whose chain may
/// be modified.
pub unsafe fn take_device_link(
    create_info: *const vk::DeviceCreateInfo,
) -> Result<DeviceChain, LayerError> {
    let info = find_link_info((*create_info).p_next, LOADER_DEVICE_CREATE_INFO)
        as *mut LayerDeviceCreateInfo;
    if info.is_null() {
        return Err(LayerError::MissingLinkInfo("device"));
    }
    let link = &*(*info).u_layer_info;
    let (Some(next_gipa), Some(next_gdpa)) = (
        link.pfn_next_get_instance_proc_addr,
        link.pfn_next_get_device_proc_addr,
    ) else {
        return Err(LayerError::MissingLinkInfo("device"));
    };
    (*info).u_layer_info = link.p_next;
    Ok(DeviceChain {
        next_gipa,
        next_gdpa,
    })
}
