use std::ffi::{c_char, CStr};
use std::ptr;

use ash::vk;
use VkLayer_swapchain as layer;

fn name(bytes: &'static [u8]) -> *const c_char {
    CStr::from_bytes_with_nul(bytes).unwrap().as_ptr()
}

#[test]
fn global_commands_resolve_without_instance() {
    for command in [
        &b"vkGetInstanceProcAddr\0"[..],
        b"vkCreateInstance\0",
        b"vkEnumerateInstanceLayerProperties\0",
        b"vkEnumerateInstanceExtensionProperties\0",
    ] {
        let pfn = unsafe { layer::vkGetInstanceProcAddr(vk::Instance::null(), name(command)) };
        assert!(pfn.is_some(), "{:?}", CStr::from_bytes_with_nul(command));
    }
}

#[test]
fn intercepted_commands_resolve_to_the_layer() {
    let gipa = unsafe {
        layer::vkGetInstanceProcAddr(vk::Instance::null(), name(b"vkGetInstanceProcAddr\0"))
    };
    assert_eq!(
        gipa.map(|f| f as usize),
        Some(layer::vkGetInstanceProcAddr as usize)
    );

    let present = unsafe {
        layer::vkGetInstanceProcAddr(vk::Instance::null(), name(b"vkQueuePresentKHR\0"))
    };
    let present_from_device =
        unsafe { layer::vkGetDeviceProcAddr(vk::Device::null(), name(b"vkQueuePresentKHR\0")) };
    assert!(present.is_some());
    assert_eq!(
        present.map(|f| f as usize),
        present_from_device.map(|f| f as usize)
    );
}

#[test]
fn unknown_commands_without_a_chain() {
    unsafe {
        assert!(layer::vkGetInstanceProcAddr(vk::Instance::null(), name(b"vkCmdDraw\0")).is_none());
        assert!(layer::vkGetDeviceProcAddr(vk::Device::null(), name(b"vkCmdDraw\0")).is_none());
        assert!(layer::vkGetInstanceProcAddr(vk::Instance::null(), ptr::null()).is_none());
    }
}

#[test]
fn device_lookup_hides_instance_commands() {
    let pfn = unsafe { layer::vkGetDeviceProcAddr(vk::Device::null(), name(b"vkCreateInstance\0")) };
    assert!(pfn.is_none());
}

#[test]
fn physical_device_lookup() {
    unsafe {
        let support = layer::vk_layerGetPhysicalDeviceProcAddr(
            vk::Instance::null(),
            name(b"vkGetPhysicalDeviceSurfaceSupportKHR\0"),
        );
        assert!(support.is_some());

        let destroy = layer::vk_layerGetPhysicalDeviceProcAddr(
            vk::Instance::null(),
            name(b"vkDestroyInstance\0"),
        );
        assert!(destroy.is_none());
    }
}

#[test]
fn negotiation() {
    let mut interface = layer::NegotiateLayerInterface {
        s_type: 1,
        p_next: ptr::null_mut(),
        loader_layer_interface_version: 3,
        pfn_get_instance_proc_addr: None,
        pfn_get_device_proc_addr: None,
        pfn_get_physical_device_proc_addr: None,
    };
    let result = unsafe { layer::vkNegotiateLoaderLayerInterfaceVersion(&mut interface) };
    assert_eq!(result, vk::Result::SUCCESS);
    assert_eq!(interface.loader_layer_interface_version, 2);
    assert!(interface.pfn_get_instance_proc_addr.is_some());
    assert!(interface.pfn_get_device_proc_addr.is_some());
    assert!(interface.pfn_get_physical_device_proc_addr.is_some());

    interface.loader_layer_interface_version = 0;
    let result = unsafe { layer::vkNegotiateLoaderLayerInterfaceVersion(&mut interface) };
    assert_eq!(result, vk::Result::ERROR_INITIALIZATION_FAILED);
}

#[test]
fn layer_enumeration() {
    let mut count = 0;
    unsafe {
        assert_eq!(
            layer::vkEnumerateInstanceLayerProperties(&mut count, ptr::null_mut()),
            vk::Result::SUCCESS
        );
        assert_eq!(count, 1);

        let mut properties = [vk::LayerProperties::default()];
        assert_eq!(
            layer::vkEnumerateInstanceLayerProperties(&mut count, properties.as_mut_ptr()),
            vk::Result::SUCCESS
        );
        let layer_name = CStr::from_ptr(properties[0].layer_name.as_ptr());
        assert_eq!(layer_name.to_str().unwrap(), "VK_LAYER_LUNARG_swapchain");

        count = 0;
        assert_eq!(
            layer::vkEnumerateDeviceLayerProperties(
                vk::PhysicalDevice::null(),
                &mut count,
                properties.as_mut_ptr()
            ),
            vk::Result::INCOMPLETE
        );
        assert_eq!(count, 0);
    }
}

#[test]
fn extension_enumeration() {
    let ours = name(b"VK_LAYER_LUNARG_swapchain\0");
    let mut count = 0;
    unsafe {
        assert_eq!(
            layer::vkEnumerateInstanceExtensionProperties(ours, &mut count, ptr::null_mut()),
            vk::Result::SUCCESS
        );
        assert_eq!(count, 1);

        let mut extensions = [vk::ExtensionProperties::default(); 2];
        count = 2;
        assert_eq!(
            layer::vkEnumerateInstanceExtensionProperties(ours, &mut count, extensions.as_mut_ptr()),
            vk::Result::SUCCESS
        );
        assert_eq!(count, 1);
        let extension = CStr::from_ptr(extensions[0].extension_name.as_ptr());
        assert_eq!(extension.to_str().unwrap(), "VK_EXT_debug_report");

        assert_eq!(
            layer::vkEnumerateInstanceExtensionProperties(
                name(b"VK_LAYER_other\0"),
                &mut count,
                ptr::null_mut()
            ),
            vk::Result::ERROR_LAYER_NOT_PRESENT
        );

        count = 7;
        assert_eq!(
            layer::vkEnumerateDeviceExtensionProperties(
                vk::PhysicalDevice::null(),
                ours,
                &mut count,
                ptr::null_mut()
            ),
            vk::Result::SUCCESS
        );
        assert_eq!(count, 0);
    }
}
