use std::ffi::c_char;
use std::mem;

use ash::vk;

use super::{chain, layer, missing, next_fn, null_pointer, status, written};
use crate::records::{DeviceExtensions, InstanceExtensions};

pub(crate) unsafe extern "system" fn create_instance(
    p_create_info: *const vk::InstanceCreateInfo,
    p_allocator: *const vk::AllocationCallbacks,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    let layer = layer();
    crate::init_logging(layer.settings());

    if p_create_info.is_null() {
        return null_pointer("vkCreateInstance", "pCreateInfo");
    }
    if p_instance.is_null() {
        return null_pointer("vkCreateInstance", "pInstance");
    }
    let chain = match chain::take_instance_link(p_create_info) {
        Ok(chain) => chain,
        Err(err) => {
            log::error!("vkCreateInstance: {}", err);
            return err.to_vk_result();
        }
    };
    let Some(next) = (chain.next_gipa)(vk::Instance::null(), b"vkCreateInstance\0".as_ptr().cast())
    else {
        return missing("vkCreateInstance");
    };
    let next: vk::PFN_vkCreateInstance = mem::transmute(next);

    let info = &*p_create_info;
    let extensions = InstanceExtensions::from_names(super::c_str_list(
        info.enabled_extension_count,
        info.pp_enabled_extension_names,
    ));

    let created = layer.create_instance(extensions, || {
        let result = next(p_create_info, p_allocator, p_instance);
        result.result_with_success(*p_instance)
    });
    if let Ok(instance) = created {
        super::register_instance(instance, chain.next_gipa, chain.next_gpdpa);
    }
    status(created)
}

pub(crate) unsafe extern "system" fn destroy_instance(
    instance: vk::Instance,
    p_allocator: *const vk::AllocationCallbacks,
) {
    let key = super::dispatch_key(instance);
    let next = next_fn!(instance instance, "vkDestroyInstance" as vk::PFN_vkDestroyInstance);
    layer().destroy_instance(instance, || match next {
        Some(next) => next(instance, p_allocator),
        None => log::warn!("vkDestroyInstance: {:?} has no next link", instance),
    });
    super::unregister_instance(key);
}

pub(crate) unsafe extern "system" fn enumerate_physical_devices(
    instance: vk::Instance,
    p_physical_device_count: *mut u32,
    p_physical_devices: *mut vk::PhysicalDevice,
) -> vk::Result {
    let Some(next) = next_fn!(instance instance, "vkEnumeratePhysicalDevices" as vk::PFN_vkEnumeratePhysicalDevices)
    else {
        return missing("vkEnumeratePhysicalDevices");
    };
    if p_physical_device_count.is_null() {
        return null_pointer("vkEnumeratePhysicalDevices", "pPhysicalDeviceCount");
    }
    layer().enumerate_physical_devices(instance, || {
        let result = next(instance, p_physical_device_count, p_physical_devices);
        written(result, p_physical_device_count, p_physical_devices)
    })
}

pub(crate) unsafe extern "system" fn get_physical_device_queue_family_properties(
    physical_device: vk::PhysicalDevice,
    p_queue_family_property_count: *mut u32,
    p_queue_family_properties: *mut vk::QueueFamilyProperties,
) {
    let Some(next) = next_fn!(instance physical_device, "vkGetPhysicalDeviceQueueFamilyProperties" as vk::PFN_vkGetPhysicalDeviceQueueFamilyProperties)
    else {
        missing("vkGetPhysicalDeviceQueueFamilyProperties");
        return;
    };
    if p_queue_family_property_count.is_null() {
        return next(
            physical_device,
            p_queue_family_property_count,
            p_queue_family_properties,
        );
    }

    let requested =
        (!p_queue_family_properties.is_null()).then(|| *p_queue_family_property_count);
    layer().queue_family_properties(physical_device, requested, || {
        next(
            physical_device,
            p_queue_family_property_count,
            p_queue_family_properties,
        );
        *p_queue_family_property_count
    });
}

pub(crate) unsafe extern "system" fn create_device(
    physical_device: vk::PhysicalDevice,
    p_create_info: *const vk::DeviceCreateInfo,
    p_allocator: *const vk::AllocationCallbacks,
    p_device: *mut vk::Device,
) -> vk::Result {
    if p_create_info.is_null() {
        return null_pointer("vkCreateDevice", "pCreateInfo");
    }
    if p_device.is_null() {
        return null_pointer("vkCreateDevice", "pDevice");
    }
    let chain = match chain::take_device_link(p_create_info) {
        Ok(chain) => chain,
        Err(err) => {
            log::error!("vkCreateDevice: {}", err);
            return err.to_vk_result();
        }
    };
    let instance = super::owning_instance(physical_device);
    let name: *const c_char = b"vkCreateDevice\0".as_ptr().cast();
    let Some(next) = (chain.next_gipa)(instance, name) else {
        return missing("vkCreateDevice");
    };
    let next: vk::PFN_vkCreateDevice = mem::transmute(next);

    let info = &*p_create_info;
    let extensions = DeviceExtensions::from_names(super::c_str_list(
        info.enabled_extension_count,
        info.pp_enabled_extension_names,
    ));

    let created = layer().create_device(physical_device, extensions, || {
        let result = next(physical_device, p_create_info, p_allocator, p_device);
        result.result_with_success(*p_device)
    });
    if let Ok(device) = created {
        super::register_device(device, chain.next_gdpa);
    }
    status(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::{maps, register_instance};
    use ash::vk::Handle;
    use std::ffi::CStr;

    const TABLE: usize = 0xbeef_1000;

    unsafe extern "system" fn driver_destroy_instance(
        instance: vk::Instance,
        _p_allocator: *const vk::AllocationCallbacks,
    ) {
        *(instance.as_raw() as *mut usize) = 0;
    }

    unsafe extern "system" fn driver_gipa(
        _instance: vk::Instance,
        name: *const c_char,
    ) -> vk::PFN_vkVoidFunction {
        match CStr::from_ptr(name).to_bytes() {
            b"vkDestroyInstance" => Some(mem::transmute::<
                vk::PFN_vkDestroyInstance,
                unsafe extern "system" fn(),
            >(driver_destroy_instance)),
            _ => None,
        }
    }

    #[test]
    fn destroy_forgets_the_dispatch_entry() {
        let mut object = [TABLE];
        let instance = vk::Instance::from_raw(object.as_mut_ptr() as u64);

        unsafe {
            register_instance(instance, driver_gipa, None);
            assert!(maps().instances.read().contains_key(&TABLE));

            destroy_instance(instance, std::ptr::null());
        }
        assert_eq!(object[0], 0);
        assert!(!maps().instances.read().contains_key(&TABLE));
    }

    #[test]
    fn null_instance_pointer_is_rejected() {
        let info = vk::InstanceCreateInfo::default();
        let result = unsafe { create_instance(&info, std::ptr::null(), std::ptr::null_mut()) };
        assert_eq!(result, vk::Result::ERROR_VALIDATION_FAILED_EXT);
    }
}
