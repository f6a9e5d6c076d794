//! `VK_EXT_debug_report`: application callbacks become report sinks.

use std::ffi::{c_void, CString};
use std::sync::Arc;

use ash::vk;

use super::{layer, missing, next_fn, null_pointer, status};
use crate::report::{Finding, ReportSink, LAYER_PREFIX};

type PfnCreateDebugReportCallback = unsafe extern "system" fn(
    vk::Instance,
    *const vk::DebugReportCallbackCreateInfoEXT,
    *const vk::AllocationCallbacks,
    *mut vk::DebugReportCallbackEXT,
) -> vk::Result;
type PfnDestroyDebugReportCallback = unsafe extern "system" fn(
    vk::Instance,
    vk::DebugReportCallbackEXT,
    *const vk::AllocationCallbacks,
);

/// Forwards findings matching `flags` to an application callback.
pub struct CallbackSink {
    flags: vk::DebugReportFlagsEXT,
    callback: unsafe extern "system" fn(
        vk::DebugReportFlagsEXT,
        vk::DebugReportObjectTypeEXT,
        u64,
        usize,
        i32,
        *const libc::c_char,
        *const libc::c_char,
        *mut c_void,
    ) -> vk::Bool32,
    user_data: usize,
}

impl CallbackSink {
    pub fn new(info: &vk::DebugReportCallbackCreateInfoEXT) -> Option<Self> {
        Some(CallbackSink {
            flags: info.flags,
            callback: info.pfn_callback?,
            user_data: info.p_user_data as usize,
        })
    }
}

impl ReportSink for CallbackSink {
    fn report(&self, finding: &Finding) -> bool {
        let flags = finding.severity.flags();
        if !self.flags.intersects(flags) {
            return false;
        }
        let prefix = CString::new(LAYER_PREFIX).unwrap_or_default();
        let message = CString::new(finding.message()).unwrap_or_default();
        let skip = unsafe {
            (self.callback)(
                flags,
                finding.object_type,
                finding.object,
                0,
                finding.code.value(),
                prefix.as_ptr(),
                message.as_ptr(),
                self.user_data as *mut c_void,
            )
        };
        skip == vk::TRUE
    }
}

pub(crate) unsafe extern "system" fn create_debug_report_callback(
    instance: vk::Instance,
    p_create_info: *const vk::DebugReportCallbackCreateInfoEXT,
    p_allocator: *const vk::AllocationCallbacks,
    p_callback: *mut vk::DebugReportCallbackEXT,
) -> vk::Result {
    let Some(next) = next_fn!(instance instance, "vkCreateDebugReportCallbackEXT" as PfnCreateDebugReportCallback)
    else {
        return missing("vkCreateDebugReportCallbackEXT");
    };
    if p_create_info.is_null() {
        return null_pointer("vkCreateDebugReportCallbackEXT", "pCreateInfo");
    }
    if p_callback.is_null() {
        return null_pointer("vkCreateDebugReportCallbackEXT", "pCallback");
    }

    let result = next(instance, p_create_info, p_allocator, p_callback);
    let created = result.result_with_success(*p_callback);
    if let Ok(callback) = created {
        match CallbackSink::new(&*p_create_info) {
            Some(sink) => layer().register_debug_callback(instance, callback, Arc::new(sink)),
            None => log::warn!("Debug report callback {:?} has no pfnCallback", callback),
        }
    }
    status(created)
}

pub(crate) unsafe extern "system" fn destroy_debug_report_callback(
    instance: vk::Instance,
    callback: vk::DebugReportCallbackEXT,
    p_allocator: *const vk::AllocationCallbacks,
) {
    layer().unregister_debug_callback(callback);
    if let Some(next) = next_fn!(instance instance, "vkDestroyDebugReportCallbackEXT" as PfnDestroyDebugReportCallback)
    {
        next(instance, callback, p_allocator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::SwapchainError;
    use ash::vk::Handle;
    use std::ffi::CStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    unsafe extern "system" fn counting_callback(
        _flags: vk::DebugReportFlagsEXT,
        object_type: vk::DebugReportObjectTypeEXT,
        object: u64,
        _location: usize,
        _code: i32,
        prefix: *const libc::c_char,
        message: *const libc::c_char,
        user_data: *mut c_void,
    ) -> vk::Bool32 {
        assert_eq!(object_type, vk::DebugReportObjectTypeEXT::DEVICE);
        assert_eq!(object, 0x30);
        assert_eq!(CStr::from_ptr(prefix).to_str().unwrap(), LAYER_PREFIX);
        assert!(!CStr::from_ptr(message).to_bytes().is_empty());
        let calls = &*(user_data as *const AtomicUsize);
        calls.fetch_add(1, Ordering::SeqCst);
        vk::TRUE
    }

    #[test]
    fn callback_receives_matching_findings() {
        let calls = AtomicUsize::new(0);
        let info = vk::DebugReportCallbackCreateInfoEXT {
            flags: vk::DebugReportFlagsEXT::ERROR,
            pfn_callback: Some(counting_callback),
            p_user_data: &calls as *const AtomicUsize as *mut c_void,
            ..Default::default()
        };
        let sink = CallbackSink::new(&info).unwrap();
        let device = vk::Device::from_raw(0x30);

        let error = Finding::error(device, SwapchainError::InvalidHandle, "bad {}").arg(1);
        assert!(sink.report(&error));

        let warning = Finding::warning(device, SwapchainError::PriorCount, "early");
        assert!(!sink.report(&warning));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_is_required() {
        let info = vk::DebugReportCallbackCreateInfoEXT::default();
        assert!(CallbackSink::new(&info).is_none());
    }
}
