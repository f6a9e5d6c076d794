//! Names of the Vulkan commands the layer intercepts.
//!
//! Proc-addr lookups resolve a name to an [`EntryPoint`] first and only ask the
//! next link in the chain when that fails, so an intercepted name can never be
//! shadowed by a lower layer.

/// Which dispatchable object a command is called through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    /// Callable with a null instance.
    Global,
    Instance,
    PhysicalDevice,
    Device,
}

/// Interception tables, searched in the order of [`Table::INSTANCE_ORDER`] or
/// [`Table::DEVICE_ORDER`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Instance,
    Device,
    Swapchain,
}

impl Table {
    pub const INSTANCE_ORDER: [Table; 3] = [Table::Instance, Table::Device, Table::Swapchain];
    pub const DEVICE_ORDER: [Table; 2] = [Table::Device, Table::Swapchain];

    pub fn find(self, name: &str) -> Option<EntryPoint> {
        EntryPoint::from_name(name).filter(|entry| entry.table() == self)
    }
}

macro_rules! entry_points {
    ($($variant:ident => $name:literal, $table:ident, $level:ident;)*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum EntryPoint {
            $($variant,)*
        }

        impl EntryPoint {
            pub const ALL: &'static [EntryPoint] = &[$(EntryPoint::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(EntryPoint::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<EntryPoint> {
                match name {
                    $($name => Some(EntryPoint::$variant),)*
                    _ => None,
                }
            }

            pub fn table(self) -> Table {
                match self {
                    $(EntryPoint::$variant => Table::$table,)*
                }
            }

            pub fn level(self) -> Level {
                match self {
                    $(EntryPoint::$variant => Level::$level,)*
                }
            }
        }
    };
}

entry_points! {
    GetInstanceProcAddr => "vkGetInstanceProcAddr", Instance, Global;
    CreateInstance => "vkCreateInstance", Instance, Global;
    EnumerateInstanceLayerProperties => "vkEnumerateInstanceLayerProperties", Instance, Global;
    EnumerateInstanceExtensionProperties => "vkEnumerateInstanceExtensionProperties", Instance, Global;
    DestroyInstance => "vkDestroyInstance", Instance, Instance;
    EnumeratePhysicalDevices => "vkEnumeratePhysicalDevices", Instance, Instance;
    EnumerateDeviceLayerProperties => "vkEnumerateDeviceLayerProperties", Instance, PhysicalDevice;
    EnumerateDeviceExtensionProperties => "vkEnumerateDeviceExtensionProperties", Instance, PhysicalDevice;
    GetPhysicalDeviceQueueFamilyProperties => "vkGetPhysicalDeviceQueueFamilyProperties", Instance, PhysicalDevice;
    CreateDevice => "vkCreateDevice", Instance, PhysicalDevice;
    CreateDebugReportCallbackEXT => "vkCreateDebugReportCallbackEXT", Instance, Instance;
    DestroyDebugReportCallbackEXT => "vkDestroyDebugReportCallbackEXT", Instance, Instance;
    DestroySurfaceKHR => "vkDestroySurfaceKHR", Instance, Instance;
    GetPhysicalDeviceSurfaceSupportKHR => "vkGetPhysicalDeviceSurfaceSupportKHR", Instance, PhysicalDevice;
    GetPhysicalDeviceDisplayPlanePropertiesKHR => "vkGetPhysicalDeviceDisplayPlanePropertiesKHR", Instance, PhysicalDevice;
    GetDisplayPlaneSupportedDisplaysKHR => "vkGetDisplayPlaneSupportedDisplaysKHR", Instance, PhysicalDevice;
    GetDisplayPlaneCapabilitiesKHR => "vkGetDisplayPlaneCapabilitiesKHR", Instance, PhysicalDevice;
    CreateDisplayPlaneSurfaceKHR => "vkCreateDisplayPlaneSurfaceKHR", Instance, Instance;
    CreateAndroidSurfaceKHR => "vkCreateAndroidSurfaceKHR", Instance, Instance;
    CreateMirSurfaceKHR => "vkCreateMirSurfaceKHR", Instance, Instance;
    GetPhysicalDeviceMirPresentationSupportKHR => "vkGetPhysicalDeviceMirPresentationSupportKHR", Instance, PhysicalDevice;
    CreateWaylandSurfaceKHR => "vkCreateWaylandSurfaceKHR", Instance, Instance;
    GetPhysicalDeviceWaylandPresentationSupportKHR => "vkGetPhysicalDeviceWaylandPresentationSupportKHR", Instance, PhysicalDevice;
    CreateWin32SurfaceKHR => "vkCreateWin32SurfaceKHR", Instance, Instance;
    GetPhysicalDeviceWin32PresentationSupportKHR => "vkGetPhysicalDeviceWin32PresentationSupportKHR", Instance, PhysicalDevice;
    CreateXcbSurfaceKHR => "vkCreateXcbSurfaceKHR", Instance, Instance;
    GetPhysicalDeviceXcbPresentationSupportKHR => "vkGetPhysicalDeviceXcbPresentationSupportKHR", Instance, PhysicalDevice;
    CreateXlibSurfaceKHR => "vkCreateXlibSurfaceKHR", Instance, Instance;
    GetPhysicalDeviceXlibPresentationSupportKHR => "vkGetPhysicalDeviceXlibPresentationSupportKHR", Instance, PhysicalDevice;

    GetDeviceProcAddr => "vkGetDeviceProcAddr", Device, Device;
    DestroyDevice => "vkDestroyDevice", Device, Device;
    GetDeviceQueue => "vkGetDeviceQueue", Device, Device;

    CreateSwapchainKHR => "vkCreateSwapchainKHR", Swapchain, Device;
    DestroySwapchainKHR => "vkDestroySwapchainKHR", Swapchain, Device;
    GetSwapchainImagesKHR => "vkGetSwapchainImagesKHR", Swapchain, Device;
    AcquireNextImageKHR => "vkAcquireNextImageKHR", Swapchain, Device;
    QueuePresentKHR => "vkQueuePresentKHR", Swapchain, Device;
}

/// Resolution for `vkGetInstanceProcAddr`: instance table, then device, then
/// swapchain.
pub fn lookup_instance(name: &str) -> Option<EntryPoint> {
    Table::INSTANCE_ORDER
        .iter()
        .find_map(|table| table.find(name))
}

/// Resolution for `vkGetDeviceProcAddr`. Instance-level commands are not
/// returned from a device.
pub fn lookup_device(name: &str) -> Option<EntryPoint> {
    Table::DEVICE_ORDER.iter().find_map(|table| table.find(name))
}

/// Resolution for `vk_layerGetPhysicalDeviceProcAddr`.
pub fn lookup_physical_device(name: &str) -> Option<EntryPoint> {
    lookup_instance(name).filter(|entry| entry.level() == Level::PhysicalDevice)
}
