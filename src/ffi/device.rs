use ash::vk;

use super::{layer, missing, next_fn};

pub(crate) unsafe extern "system" fn destroy_device(
    device: vk::Device,
    p_allocator: *const vk::AllocationCallbacks,
) {
    let key = super::dispatch_key(device);
    let next = next_fn!(device device, "vkDestroyDevice" as vk::PFN_vkDestroyDevice);
    layer().destroy_device(device, || match next {
        Some(next) => next(device, p_allocator),
        None => log::warn!("vkDestroyDevice: {:?} has no next link", device),
    });
    super::unregister_device(key);
}

pub(crate) unsafe extern "system" fn get_device_queue(
    device: vk::Device,
    queue_family_index: u32,
    queue_index: u32,
    p_queue: *mut vk::Queue,
) {
    let Some(next) = next_fn!(device device, "vkGetDeviceQueue" as vk::PFN_vkGetDeviceQueue) else {
        missing("vkGetDeviceQueue");
        return;
    };
    if p_queue.is_null() {
        return next(device, queue_family_index, queue_index, p_queue);
    }
    layer().get_device_queue(device, queue_family_index, || {
        next(device, queue_family_index, queue_index, p_queue);
        *p_queue
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::{maps, register_device};
    use ash::vk::Handle;
    use std::ffi::{c_char, CStr};
    use std::mem;

    const TABLE: usize = 0xbeef_0000;

    unsafe extern "system" fn driver_destroy_device(
        device: vk::Device,
        _p_allocator: *const vk::AllocationCallbacks,
    ) {
        // The driver frees the object, dispatch word included.
        *(device.as_raw() as *mut usize) = 0;
    }

    unsafe extern "system" fn driver_gdpa(
        _device: vk::Device,
        name: *const c_char,
    ) -> vk::PFN_vkVoidFunction {
        match CStr::from_ptr(name).to_bytes() {
            b"vkDestroyDevice" => Some(mem::transmute::<
                vk::PFN_vkDestroyDevice,
                unsafe extern "system" fn(),
            >(driver_destroy_device)),
            _ => None,
        }
    }

    #[test]
    fn destroy_forgets_the_dispatch_entry() {
        let mut object = [TABLE];
        let device = vk::Device::from_raw(object.as_mut_ptr() as u64);

        unsafe {
            register_device(device, driver_gdpa);
            assert!(maps().devices.read().contains_key(&TABLE));

            destroy_device(device, std::ptr::null());
        }
        assert_eq!(object[0], 0);
        assert!(!maps().devices.read().contains_key(&TABLE));
    }
}
