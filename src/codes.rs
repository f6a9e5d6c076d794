//! Message codes carried by every finding.
//!
//! Log-triage tooling keys on these numbers, so the values are frozen. Two
//! tables coexist: the layer's own `SwapchainError` enumeration, numbered in
//! declaration order, and the later validation-error ids shared with the rest
//! of the validation layers.

use std::fmt;

/// The layer-local code table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SwapchainError {
    /// Handle used that isn't currently valid.
    InvalidHandle = 0,
    /// Pointer set to NULL instead of pointing to valid memory.
    NullPointer = 1,
    /// WSI function called without enabling its extension.
    ExtNotEnabledButUsed = 2,
    /// Parent destroyed before its children.
    DelObjectBeforeChildren = 3,
    /// `vkCreateSwapchainKHR` with a surface no queue family reported support for.
    CreateUnsupportedSurface = 4,
    // 5 was the surface-capabilities query warning; not tracked here.
    /// `vkCreateSwapchainKHR` with a bad `imageSharingMode`.
    CreateSwapBadSharingMode = 6,
    /// `vkCreateSwapchainKHR` with repeated queue families for concurrent sharing.
    CreateSwapBadSharingValues = 7,
    /// `vkDestroySwapchainKHR` called with a different device than the creator.
    DestroySwapDiffDevice = 8,
    /// `vkAcquireNextImageKHR` with neither a semaphore nor a fence.
    NoSyncForAcquire = 9,
    /// `vkQueuePresentKHR` with an image index that is too large.
    IndexTooLarge = 10,
    /// `vkQueuePresentKHR` with an image the application doesn't own.
    IndexNotInUse = 11,
    /// Fetch call without a prior sizing call.
    PriorCount = 12,
    /// Fetch call asking for more than the sizing call reported.
    InvalidCount = 13,
    /// Queue family index used before the queue family count was queried.
    DidNotQueryQueueFamilies = 14,
    /// `vkGetDeviceQueue` with a queue family index not less than the queried count.
    QueueFamilyIndexTooLarge = 15,
    /// Surface presented from a queue family that doesn't support it.
    SurfaceNotSupportedWithQueue = 16,
    /// Display plane queries before `vkGetPhysicalDeviceDisplayPlanePropertiesKHR`.
    GetSupportedDisplaysWithoutQuery = 17,
    /// Plane index not less than the queried plane count.
    PlaneIndexTooLarge = 18,
}

/// Ids from the unique validation-error table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ValidationError {
    /// `vkGetPhysicalDeviceSurfaceSupportKHR::queueFamilyIndex`.
    SurfaceSupportQueueFamilyIndex = 1889,
    /// `vkGetPhysicalDeviceMirPresentationSupportKHR::queueFamilyIndex`.
    MirPresentationQueueFamilyIndex = 1893,
    /// `vkGetPhysicalDeviceWaylandPresentationSupportKHR::queueFamilyIndex`.
    WaylandPresentationQueueFamilyIndex = 1896,
    /// `vkGetPhysicalDeviceWin32PresentationSupportKHR::queueFamilyIndex`.
    Win32PresentationQueueFamilyIndex = 1899,
    /// `vkGetPhysicalDeviceXcbPresentationSupportKHR::queueFamilyIndex`.
    XcbPresentationQueueFamilyIndex = 1901,
    /// `vkGetPhysicalDeviceXlibPresentationSupportKHR::queueFamilyIndex`.
    XlibPresentationQueueFamilyIndex = 1904,
    /// `vkGetDisplayPlaneSupportedDisplaysKHR::planeIndex`.
    SupportedDisplaysPlaneIndex = 1857,
    /// `VkSwapchainCreateInfoKHR::surface` not supported by the device.
    CreateSwapchainUnsupportedSurface = 1922,
    /// `VkSwapchainCreateInfoKHR::pQueueFamilyIndices` with concurrent sharing.
    CreateSwapchainSharingQueueFamilies = 2061,
    /// `VkSwapchainCreateInfoKHR::pQueueFamilyIndices` entry out of range.
    CreateSwapchainQueueFamilyIndex = 2062,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageCode {
    Legacy(SwapchainError),
    Unique(ValidationError),
}

impl MessageCode {
    /// The number handed to debug-report callbacks.
    #[inline]
    pub fn value(self) -> i32 {
        match self {
            MessageCode::Legacy(code) => code as i32,
            MessageCode::Unique(code) => code as i32,
        }
    }
}

impl From<SwapchainError> for MessageCode {
    #[inline]
    fn from(code: SwapchainError) -> Self {
        MessageCode::Legacy(code)
    }
}

impl From<ValidationError> for MessageCode {
    #[inline]
    fn from(code: ValidationError) -> Self {
        MessageCode::Unique(code)
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageCode::Legacy(code) => write!(f, "SWAPCHAIN_{:?}({})", code, *code as i32),
            MessageCode::Unique(code) => write!(f, "VALIDATION_ERROR_{:05}", *code as i32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_codes_are_frozen() {
        assert_eq!(MessageCode::from(SwapchainError::InvalidHandle).value(), 0);
        assert_eq!(
            MessageCode::from(SwapchainError::DelObjectBeforeChildren).value(),
            3
        );
        assert_eq!(
            MessageCode::from(SwapchainError::QueueFamilyIndexTooLarge).value(),
            15
        );
        assert_eq!(
            MessageCode::from(SwapchainError::CreateSwapBadSharingMode).value(),
            6
        );
        assert_eq!(MessageCode::from(SwapchainError::PlaneIndexTooLarge).value(), 18);
    }

    #[test]
    fn display_names_table() {
        let code = MessageCode::from(ValidationError::SupportedDisplaysPlaneIndex);
        assert_eq!(code.to_string(), "VALIDATION_ERROR_01857");
        assert_eq!(code.value(), 1857);
    }
}
