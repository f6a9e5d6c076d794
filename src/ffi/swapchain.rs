use std::slice;

use ash::vk;

use super::{layer, missing, next_fn, null_pointer, status, written};
use crate::rules::SwapchainParams;

type PfnCreateSwapchain = unsafe extern "system" fn(
    vk::Device,
    *const vk::SwapchainCreateInfoKHR,
    *const vk::AllocationCallbacks,
    *mut vk::SwapchainKHR,
) -> vk::Result;
type PfnDestroySwapchain =
    unsafe extern "system" fn(vk::Device, vk::SwapchainKHR, *const vk::AllocationCallbacks);
type PfnGetSwapchainImages =
    unsafe extern "system" fn(vk::Device, vk::SwapchainKHR, *mut u32, *mut vk::Image) -> vk::Result;
type PfnAcquireNextImage = unsafe extern "system" fn(
    vk::Device,
    vk::SwapchainKHR,
    u64,
    vk::Semaphore,
    vk::Fence,
    *mut u32,
) -> vk::Result;
type PfnQueuePresent = unsafe extern "system" fn(vk::Queue, *const vk::PresentInfoKHR) -> vk::Result;

unsafe fn swapchain_params(info: &vk::SwapchainCreateInfoKHR) -> SwapchainParams {
    let queue_family_indices = (!info.p_queue_family_indices.is_null()).then(|| {
        slice::from_raw_parts(
            info.p_queue_family_indices,
            info.queue_family_index_count as usize,
        )
        .to_vec()
    });
    SwapchainParams {
        surface: info.surface,
        sharing_mode: info.image_sharing_mode,
        queue_family_indices,
        old_swapchain: info.old_swapchain,
    }
}

pub(crate) unsafe extern "system" fn create_swapchain(
    device: vk::Device,
    p_create_info: *const vk::SwapchainCreateInfoKHR,
    p_allocator: *const vk::AllocationCallbacks,
    p_swapchain: *mut vk::SwapchainKHR,
) -> vk::Result {
    let Some(next) = next_fn!(device device, "vkCreateSwapchainKHR" as PfnCreateSwapchain) else {
        return missing("vkCreateSwapchainKHR");
    };
    if p_create_info.is_null() {
        return null_pointer("vkCreateSwapchainKHR", "pCreateInfo");
    }
    if p_swapchain.is_null() {
        return null_pointer("vkCreateSwapchainKHR", "pSwapchain");
    }

    let params = swapchain_params(&*p_create_info);
    status(layer().create_swapchain(device, &params, || {
        let result = next(device, p_create_info, p_allocator, p_swapchain);
        result.result_with_success(*p_swapchain)
    }))
}

pub(crate) unsafe extern "system" fn destroy_swapchain(
    device: vk::Device,
    swapchain: vk::SwapchainKHR,
    p_allocator: *const vk::AllocationCallbacks,
) {
    let next = next_fn!(device device, "vkDestroySwapchainKHR" as PfnDestroySwapchain);
    layer().destroy_swapchain(device, swapchain, || match next {
        Some(next) => next(device, swapchain, p_allocator),
        None => log::warn!("vkDestroySwapchainKHR: {:?} has no next link", device),
    });
}

pub(crate) unsafe extern "system" fn get_swapchain_images(
    device: vk::Device,
    swapchain: vk::SwapchainKHR,
    p_swapchain_image_count: *mut u32,
    p_swapchain_images: *mut vk::Image,
) -> vk::Result {
    let Some(next) = next_fn!(device device, "vkGetSwapchainImagesKHR" as PfnGetSwapchainImages) else {
        return missing("vkGetSwapchainImagesKHR");
    };
    if p_swapchain_image_count.is_null() {
        return null_pointer("vkGetSwapchainImagesKHR", "pSwapchainImageCount");
    }

    let requested = (!p_swapchain_images.is_null()).then(|| *p_swapchain_image_count);
    layer().get_swapchain_images(device, swapchain, requested, || {
        let result = next(device, swapchain, p_swapchain_image_count, p_swapchain_images);
        written(result, p_swapchain_image_count, p_swapchain_images)
    })
}

pub(crate) unsafe extern "system" fn acquire_next_image(
    device: vk::Device,
    swapchain: vk::SwapchainKHR,
    timeout: u64,
    semaphore: vk::Semaphore,
    fence: vk::Fence,
    p_image_index: *mut u32,
) -> vk::Result {
    let Some(next) = next_fn!(device device, "vkAcquireNextImageKHR" as PfnAcquireNextImage) else {
        return missing("vkAcquireNextImageKHR");
    };
    if p_image_index.is_null() {
        return null_pointer("vkAcquireNextImageKHR", "pImageIndex");
    }
    layer().acquire_next_image(device, swapchain, semaphore, fence, || {
        let result = next(device, swapchain, timeout, semaphore, fence, p_image_index);
        (result, *p_image_index)
    })
}

pub(crate) unsafe extern "system" fn queue_present(
    queue: vk::Queue,
    p_present_info: *const vk::PresentInfoKHR,
) -> vk::Result {
    let Some(next) = next_fn!(device queue, "vkQueuePresentKHR" as PfnQueuePresent) else {
        return missing("vkQueuePresentKHR");
    };
    if p_present_info.is_null() {
        return null_pointer("vkQueuePresentKHR", "pPresentInfo");
    }

    let info = &*p_present_info;
    let presents: Vec<(vk::SwapchainKHR, u32)> =
        if info.p_swapchains.is_null() || info.p_image_indices.is_null() {
            Vec::new()
        } else {
            let count = info.swapchain_count as usize;
            slice::from_raw_parts(info.p_swapchains, count)
                .iter()
                .copied()
                .zip(slice::from_raw_parts(info.p_image_indices, count).iter().copied())
                .collect()
        };
    layer().queue_present(queue, &presents, || next(queue, p_present_info))
}
