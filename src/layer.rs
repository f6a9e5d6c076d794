//! The interception logic behind every exported entry point.
//!
//! Each method follows the same shape: validate under the registry lock,
//! release it and deliver the findings, call the next link in the chain, then
//! lock again to record what the call produced. The next link is passed in as
//! a closure so this module never touches raw pointers.

use std::sync::Arc;

use ash::prelude::VkResult;
use ash::vk;
use parking_lot::{Mutex, MutexGuard};

use crate::config::LayerSettings;
use crate::records::{DeviceExtensions, InstanceExtensions, SurfaceKind};
use crate::registry::HandleRegistry;
use crate::report::{Finding, LogSink, ReportSink, Reporter, Severity};
use crate::rules::{self, PlaneSite, QueueFamilySite, SwapchainParams};

/// Output of an enumeration call that hands back handles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Written<H> {
    pub result: vk::Result,
    pub count: u32,
    pub handles: Vec<H>,
}

impl<H> Written<H> {
    /// A sizing call: only the count was written.
    pub fn count(result: vk::Result, count: u32) -> Self {
        Written {
            result,
            count,
            handles: Vec::new(),
        }
    }

    pub fn handles(result: vk::Result, handles: Vec<H>) -> Self {
        Written {
            result,
            count: handles.len() as u32,
            handles,
        }
    }

    fn succeeded(&self) -> bool {
        matches!(self.result, vk::Result::SUCCESS | vk::Result::INCOMPLETE)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Verdict {
    skip: bool,
    blocking: bool,
    errors: bool,
}

fn presented(result: vk::Result) -> bool {
    matches!(result, vk::Result::SUCCESS | vk::Result::SUBOPTIMAL_KHR)
}

pub struct SwapchainLayer {
    registry: Mutex<HandleRegistry>,
    reporter: Reporter,
    settings: LayerSettings,
}

impl SwapchainLayer {
    pub fn new(settings: LayerSettings) -> Self {
        let reporter = Reporter::new();
        reporter.add_sink(Arc::new(LogSink::new(settings.report_flags)));
        SwapchainLayer {
            registry: Mutex::new(HandleRegistry::new()),
            reporter,
            settings,
        }
    }

    pub fn settings(&self) -> &LayerSettings {
        &self.settings
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Locks the registry. Never hold the guard across a call down the chain.
    pub fn registry(&self) -> MutexGuard<'_, HandleRegistry> {
        self.registry.lock()
    }

    fn validate(&self, check: impl FnOnce(&HandleRegistry, &mut Vec<Finding>)) -> Verdict {
        let findings = {
            let registry = self.registry.lock();
            let mut findings = Vec::new();
            check(&registry, &mut findings);
            findings
        };

        Verdict {
            skip: self.reporter.emit(&findings),
            blocking: findings.iter().any(|f| f.blocking),
            errors: findings.iter().any(|f| f.severity == Severity::Error),
        }
    }

    /// Entry points that only observe still refuse the call in strict mode.
    /// Destroy calls never consult this.
    fn strict_refuses(&self, verdict: Verdict) -> bool {
        self.settings.strict_gating && (verdict.skip || verdict.errors)
    }

    pub fn create_instance(
        &self,
        extensions: InstanceExtensions,
        create: impl FnOnce() -> VkResult<vk::Instance>,
    ) -> VkResult<vk::Instance> {
        let instance = create()?;
        log::debug!("Tracking instance {:?} ({:?})", instance, extensions);
        self.registry.lock().link_instance(instance, extensions);
        Ok(instance)
    }

    pub fn destroy_instance(&self, instance: vk::Instance, destroy: impl FnOnce()) {
        let teardown = self.registry.lock().detach_instance(instance);
        if let Some(teardown) = teardown {
            log::debug!(
                "Untracked instance {:?} and {} physical devices",
                instance,
                teardown.physical_devices_removed
            );
            self.reporter
                .emit(&rules::destroy_instance_findings(instance, &teardown));
        }

        destroy();
        self.reporter.remove_instance_callbacks(instance);
    }

    /// `vkEnumeratePhysicalDevices`. Only fetch calls register handles.
    pub fn enumerate_physical_devices(
        &self,
        instance: vk::Instance,
        enumerate: impl FnOnce() -> Written<vk::PhysicalDevice>,
    ) -> vk::Result {
        let written = enumerate();
        if written.succeeded() && !written.handles.is_empty() {
            self.registry
                .lock()
                .link_physical_devices(instance, &written.handles);
        }
        written.result
    }

    /// `vkGetPhysicalDeviceQueueFamilyProperties`. `requested` is `None` for the
    /// sizing call; `query` returns the count the next link wrote.
    pub fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
        requested: Option<u32>,
        query: impl FnOnce() -> u32,
    ) {
        self.validate(|registry, out| {
            rules::check_queue_family_properties(registry, physical_device, requested, out)
        });

        let count = query();
        if let Some(record) = self.registry.lock().lookup_mut(physical_device) {
            match requested {
                None => record.queue_families.record_sizing(count),
                Some(_) => record.queue_families.record_fetch(count),
            }
        }
    }

    pub fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        extensions: DeviceExtensions,
        create: impl FnOnce() -> VkResult<vk::Device>,
    ) -> VkResult<vk::Device> {
        self.validate(|registry, out| rules::check_create_device(registry, physical_device, out));

        let device = create()?;
        log::debug!("Tracking device {:?} on {:?}", device, physical_device);
        self.registry
            .lock()
            .link_device(device, physical_device, extensions);
        Ok(device)
    }

    pub fn destroy_device(&self, device: vk::Device, destroy: impl FnOnce()) {
        let orphans = self.registry.lock().detach_device(device);
        if let Some(orphans) = orphans {
            self.reporter
                .emit(&rules::destroy_device_findings(device, &orphans));
        }
        destroy();
    }

    pub fn get_device_queue(
        &self,
        device: vk::Device,
        queue_family_index: u32,
        get: impl FnOnce() -> vk::Queue,
    ) -> vk::Queue {
        self.validate(|registry, out| {
            rules::check_get_device_queue(registry, device, queue_family_index, out)
        });

        let queue = get();
        if queue != vk::Queue::null() {
            self.registry
                .lock()
                .link_queue(device, queue, queue_family_index);
        }
        queue
    }

    pub fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
        query: impl FnOnce() -> VkResult<bool>,
    ) -> VkResult<bool> {
        let verdict = self.validate(|registry, out| {
            rules::check_surface_support(registry, physical_device, queue_family_index, surface, out)
        });
        if self.strict_refuses(verdict) {
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        }

        let supported = query()?;

        let mut registry = self.registry.lock();
        let Some(surface_key) = registry.find(surface) else {
            return Ok(supported);
        };
        let out_of_range = registry
            .lookup(physical_device)
            .and_then(|record| record.queue_families.known())
            .is_some_and(|count| queue_family_index >= count);
        if out_of_range {
            return Ok(supported);
        }

        if let Some(record) = registry.lookup_mut(physical_device) {
            record.record_surface_support(surface_key, queue_family_index, supported);
        }
        if let Some(record) = registry.get_mut(surface_key) {
            record.set_queue_family_support(queue_family_index, supported);
        }
        Ok(supported)
    }

    /// The platform `vkGetPhysicalDevice*PresentationSupportKHR` queries.
    pub fn presentation_support(
        &self,
        site: QueueFamilySite,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        query: impl FnOnce() -> vk::Bool32,
    ) -> vk::Bool32 {
        let verdict = self.validate(|registry, out| {
            rules::check_presentation_support(
                registry,
                physical_device,
                queue_family_index,
                site,
                out,
            )
        });
        if self.strict_refuses(verdict) {
            return vk::FALSE;
        }
        query()
    }

    pub fn display_plane_properties(
        &self,
        physical_device: vk::PhysicalDevice,
        requested: Option<u32>,
        query: impl FnOnce() -> (vk::Result, u32),
    ) -> vk::Result {
        let verdict = self.validate(|registry, out| {
            rules::check_display_plane_properties(registry, physical_device, requested, out)
        });
        if verdict.skip {
            return vk::Result::ERROR_VALIDATION_FAILED_EXT;
        }

        let (result, count) = query();
        if matches!(result, vk::Result::SUCCESS | vk::Result::INCOMPLETE) {
            if let Some(record) = self.registry.lock().lookup_mut(physical_device) {
                match requested {
                    None => record.display_planes.record_sizing(count),
                    Some(_) => record.display_planes.record_fetch(count),
                }
            }
        }
        result
    }

    /// `vkGetDisplayPlaneSupportedDisplaysKHR` and
    /// `vkGetDisplayPlaneCapabilitiesKHR`.
    pub fn display_plane_query(
        &self,
        site: PlaneSite,
        physical_device: vk::PhysicalDevice,
        plane_index: u32,
        query: impl FnOnce() -> vk::Result,
    ) -> vk::Result {
        let verdict = self.validate(|registry, out| {
            rules::check_display_plane_index(registry, physical_device, plane_index, site, out)
        });
        if verdict.skip {
            return vk::Result::ERROR_VALIDATION_FAILED_EXT;
        }
        query()
    }

    pub fn create_surface(
        &self,
        instance: vk::Instance,
        kind: SurfaceKind,
        function: &'static str,
        create: impl FnOnce() -> VkResult<vk::SurfaceKHR>,
    ) -> VkResult<vk::SurfaceKHR> {
        let verdict = self.validate(|registry, out| {
            rules::check_create_surface(registry, instance, kind, function, out)
        });
        if self.strict_refuses(verdict) {
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        }

        let surface = create()?;
        log::debug!("Tracking {:?} surface {:?}", kind, surface);
        self.registry.lock().link_surface(instance, surface, kind);
        Ok(surface)
    }

    pub fn destroy_surface(
        &self,
        instance: vk::Instance,
        surface: vk::SurfaceKHR,
        destroy: impl FnOnce(),
    ) {
        // Destruction is never refused, strict or not.
        self.validate(|registry, out| {
            rules::check_destroy_surface(registry, instance, surface, out)
        });

        let orphans = self.registry.lock().detach_surface(surface);
        if let Some(orphans) = orphans {
            self.reporter
                .emit(&rules::destroy_surface_findings(surface, &orphans));
        }
        destroy();
    }

    pub fn create_swapchain(
        &self,
        device: vk::Device,
        params: &SwapchainParams,
        create: impl FnOnce() -> VkResult<vk::SwapchainKHR>,
    ) -> VkResult<vk::SwapchainKHR> {
        let verdict =
            self.validate(|registry, out| rules::check_create_swapchain(registry, device, params, out));
        if verdict.blocking || verdict.skip {
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        }

        let swapchain = create()?;
        log::debug!("Tracking swapchain {:?} on {:?}", swapchain, device);
        self.registry
            .lock()
            .link_swapchain(device, params.surface, swapchain);
        Ok(swapchain)
    }

    pub fn destroy_swapchain(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        destroy: impl FnOnce(),
    ) {
        self.validate(|registry, out| {
            rules::check_destroy_swapchain(registry, device, swapchain, out)
        });
        self.registry.lock().detach_swapchain(swapchain);
        destroy();
    }

    pub fn get_swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        requested: Option<u32>,
        query: impl FnOnce() -> Written<vk::Image>,
    ) -> vk::Result {
        let verdict = self.validate(|registry, out| {
            rules::check_get_swapchain_images(registry, device, swapchain, requested, out)
        });
        if verdict.skip {
            return vk::Result::ERROR_VALIDATION_FAILED_EXT;
        }

        let written = query();
        if written.succeeded() {
            let mut registry = self.registry.lock();
            match requested {
                None => {
                    if let Some(record) = registry.lookup_mut(swapchain) {
                        record.images.record_sizing(written.count);
                    }
                }
                Some(_) => registry.link_swapchain_images(swapchain, &written.handles),
            }
        }
        written.result
    }

    /// `acquire` returns the result and the image index written by the next link.
    pub fn acquire_next_image(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
        fence: vk::Fence,
        acquire: impl FnOnce() -> (vk::Result, u32),
    ) -> vk::Result {
        let verdict = self.validate(|registry, out| {
            rules::check_acquire_next_image(registry, device, swapchain, semaphore, fence, out)
        });
        if verdict.skip {
            return vk::Result::ERROR_VALIDATION_FAILED_EXT;
        }

        let (result, image_index) = acquire();
        if presented(result) {
            let mut registry = self.registry.lock();
            let image = registry
                .lookup_mut(swapchain)
                .and_then(|record| record.image_records.get_mut(image_index as usize));
            if let Some(image) = image {
                image.acquired_by_app = true;
            }
        }
        result
    }

    pub fn queue_present(
        &self,
        queue: vk::Queue,
        presents: &[(vk::SwapchainKHR, u32)],
        present: impl FnOnce() -> vk::Result,
    ) -> vk::Result {
        let verdict =
            self.validate(|registry, out| rules::check_queue_present(registry, queue, presents, out));
        if verdict.skip {
            return vk::Result::ERROR_VALIDATION_FAILED_EXT;
        }

        let result = present();
        if presented(result) {
            let mut registry = self.registry.lock();
            for &(swapchain, image_index) in presents {
                let image = registry
                    .lookup_mut(swapchain)
                    .and_then(|record| record.image_records.get_mut(image_index as usize));
                if let Some(image) = image {
                    image.acquired_by_app = false;
                }
            }
        }
        result
    }

    /// Registers an application debug-report callback once the next link has
    /// created it.
    pub fn register_debug_callback(
        &self,
        instance: vk::Instance,
        callback: vk::DebugReportCallbackEXT,
        sink: Arc<dyn ReportSink>,
    ) {
        self.reporter.add_callback(instance, callback, sink);
    }

    pub fn unregister_debug_callback(&self, callback: vk::DebugReportCallbackEXT) {
        if !self.reporter.remove_callback(callback) {
            log::debug!("Debug report callback {:?} was not registered", callback);
        }
    }
}
