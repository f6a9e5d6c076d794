//! Structured findings and the sinks they are delivered to.
//!
//! Validation code never formats messages itself. It builds [`Finding`]s
//! carrying a template and its arguments, and the [`Reporter`] hands them to
//! every registered sink once the registry lock has been released.

use std::fmt;
use std::sync::Arc;

use ash::vk::{self, Handle};
use parking_lot::{Mutex, RwLock};

use crate::codes::MessageCode;

/// Name reported as the layer prefix of every message.
pub const LAYER_PREFIX: &str = "Swapchain";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Information,
    PerformanceWarning,
    Warning,
    Error,
}

impl Severity {
    #[inline]
    pub fn flags(self) -> vk::DebugReportFlagsEXT {
        match self {
            Severity::Debug => vk::DebugReportFlagsEXT::DEBUG,
            Severity::Information => vk::DebugReportFlagsEXT::INFORMATION,
            Severity::PerformanceWarning => vk::DebugReportFlagsEXT::PERFORMANCE_WARNING,
            Severity::Warning => vk::DebugReportFlagsEXT::WARNING,
            Severity::Error => vk::DebugReportFlagsEXT::ERROR,
        }
    }

    #[inline]
    pub fn log_level(self) -> log::Level {
        match self {
            Severity::Debug => log::Level::Debug,
            Severity::Information => log::Level::Info,
            Severity::PerformanceWarning | Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

/// Vulkan objects a finding can point at.
pub trait ReportObject: Handle + Copy {
    const OBJECT_TYPE: vk::DebugReportObjectTypeEXT;
}

macro_rules! report_objects {
    ($($ty:ty => $object_type:ident,)*) => {
        $(
            impl ReportObject for $ty {
                const OBJECT_TYPE: vk::DebugReportObjectTypeEXT =
                    vk::DebugReportObjectTypeEXT::$object_type;
            }
        )*
    };
}

report_objects! {
    vk::Instance => INSTANCE,
    vk::PhysicalDevice => PHYSICAL_DEVICE,
    vk::Device => DEVICE,
    vk::Queue => QUEUE,
    vk::Image => IMAGE,
    vk::SurfaceKHR => SURFACE_KHR,
    vk::SwapchainKHR => SWAPCHAIN_KHR,
    vk::DisplayModeKHR => DISPLAY_MODE_KHR,
    vk::DebugReportCallbackEXT => DEBUG_REPORT_CALLBACK_EXT,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub object_type: vk::DebugReportObjectTypeEXT,
    pub object: u64,
    pub code: MessageCode,
    /// Message with one `{}` per argument.
    pub template: &'static str,
    pub args: Vec<String>,
    /// Malformed parameters that make the entry point refuse the call.
    pub blocking: bool,
}

impl Finding {
    pub fn new<O: ReportObject>(
        severity: Severity,
        object: O,
        code: impl Into<MessageCode>,
        template: &'static str,
    ) -> Self {
        Finding {
            severity,
            object_type: O::OBJECT_TYPE,
            object: object.as_raw(),
            code: code.into(),
            template,
            args: Vec::new(),
            blocking: false,
        }
    }

    #[inline]
    pub fn error<O: ReportObject>(
        object: O,
        code: impl Into<MessageCode>,
        template: &'static str,
    ) -> Self {
        Self::new(Severity::Error, object, code, template)
    }

    #[inline]
    pub fn warning<O: ReportObject>(
        object: O,
        code: impl Into<MessageCode>,
        template: &'static str,
    ) -> Self {
        Self::new(Severity::Warning, object, code, template)
    }

    #[must_use]
    pub fn arg(mut self, arg: impl fmt::Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Formats a handle argument the way the messages print them.
    #[must_use]
    pub fn handle_arg(self, handle: impl Handle) -> Self {
        self.arg(format!("{:#x}", handle.as_raw()))
    }

    #[must_use]
    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    /// Substitutes the arguments into the template. Missing arguments leave the
    /// placeholder in place; surplus arguments are ignored.
    pub fn message(&self) -> String {
        let mut out = String::with_capacity(self.template.len() + 16 * self.args.len());
        let mut args = self.args.iter();
        let mut rest = self.template;

        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            match args.next() {
                Some(arg) => out.push_str(arg),
                None => out.push_str("{}"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);

        out
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} object {:?} {:#x}: {}",
            LAYER_PREFIX,
            self.code,
            self.object_type,
            self.object,
            self.message()
        )
    }
}

/// Receiver of findings.
pub trait ReportSink: Send + Sync {
    /// Returns `true` when the sink asks for the triggering call to be skipped.
    fn report(&self, finding: &Finding) -> bool;
}

/// Writes findings to the `log` facade.
pub struct LogSink {
    flags: vk::DebugReportFlagsEXT,
}

impl LogSink {
    pub fn new(flags: vk::DebugReportFlagsEXT) -> Self {
        LogSink { flags }
    }
}

impl ReportSink for LogSink {
    fn report(&self, finding: &Finding) -> bool {
        if self.flags.intersects(finding.severity.flags()) {
            log::log!(target: "swapchain", finding.severity.log_level(), "{}", finding);
        }
        false
    }
}

/// Keeps every finding in memory.
#[derive(Default)]
pub struct MemorySink {
    findings: Mutex<Vec<Finding>>,
    skip: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that asks for every reported call to be skipped.
    pub fn skipping() -> Self {
        MemorySink {
            findings: Mutex::new(Vec::new()),
            skip: true,
        }
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.findings.lock().clone()
    }

    pub fn take(&self) -> Vec<Finding> {
        std::mem::take(&mut *self.findings.lock())
    }

    pub fn count(&self, code: impl Into<MessageCode>) -> usize {
        let code = code.into();
        self.findings.lock().iter().filter(|f| f.code == code).count()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.lock().is_empty()
    }
}

impl ReportSink for MemorySink {
    fn report(&self, finding: &Finding) -> bool {
        self.findings.lock().push(finding.clone());
        self.skip
    }
}

struct SinkEntry {
    callback: Option<vk::DebugReportCallbackEXT>,
    owner: Option<vk::Instance>,
    sink: Arc<dyn ReportSink>,
}

/// Fans findings out to all sinks.
#[derive(Default)]
pub struct Reporter {
    sinks: RwLock<Vec<SinkEntry>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink that lives as long as the reporter.
    pub fn add_sink(&self, sink: Arc<dyn ReportSink>) {
        self.sinks.write().push(SinkEntry {
            callback: None,
            owner: None,
            sink,
        });
    }

    /// Adds a sink created through `vkCreateDebugReportCallbackEXT`.
    pub fn add_callback(
        &self,
        instance: vk::Instance,
        callback: vk::DebugReportCallbackEXT,
        sink: Arc<dyn ReportSink>,
    ) {
        self.sinks.write().push(SinkEntry {
            callback: Some(callback),
            owner: Some(instance),
            sink,
        });
    }

    pub fn remove_callback(&self, callback: vk::DebugReportCallbackEXT) -> bool {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|entry| entry.callback != Some(callback));
        sinks.len() != before
    }

    /// Drops the callbacks an instance still owns when it is destroyed.
    pub fn remove_instance_callbacks(&self, instance: vk::Instance) -> usize {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|entry| entry.owner != Some(instance));
        before - sinks.len()
    }

    /// Delivers the findings. Returns `true` if any sink asked to skip the call.
    pub fn emit(&self, findings: &[Finding]) -> bool {
        if findings.is_empty() {
            return false;
        }

        // Sinks may call back into Vulkan, so they run without the lock held.
        let sinks: Vec<Arc<dyn ReportSink>> =
            self.sinks.read().iter().map(|entry| entry.sink.clone()).collect();

        let mut skip = false;
        for finding in findings {
            for sink in &sinks {
                skip |= sink.report(finding);
            }
        }
        skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{SwapchainError, ValidationError};

    #[test]
    fn message_substitution() {
        let finding = Finding::error(
            vk::PhysicalDevice::from_raw(0x10),
            ValidationError::SurfaceSupportQueueFamilyIndex,
            "queueFamilyIndex {} too large, max is {}",
        )
        .arg(5)
        .arg(2);

        assert_eq!(finding.message(), "queueFamilyIndex 5 too large, max is 2");
        assert_eq!(finding.object, 0x10);
        assert_eq!(finding.object_type, vk::DebugReportObjectTypeEXT::PHYSICAL_DEVICE);
        assert!(!finding.blocking);
    }

    #[test]
    fn missing_args_keep_placeholder() {
        let finding = Finding::warning(
            vk::Instance::from_raw(1),
            SwapchainError::PriorCount,
            "{} and {}",
        )
        .arg("a");
        assert_eq!(finding.message(), "a and {}");
    }

    #[test]
    fn handle_args_are_hex() {
        let finding = Finding::error(
            vk::Instance::from_raw(1),
            SwapchainError::DelObjectBeforeChildren,
            "surface {}",
        )
        .handle_arg(vk::SurfaceKHR::from_raw(0xabc));
        assert_eq!(finding.message(), "surface 0xabc");
    }

    #[test]
    fn emit_collects_skip_requests() {
        let reporter = Reporter::new();
        let quiet = Arc::new(MemorySink::new());
        reporter.add_sink(quiet.clone());

        let finding = Finding::error(
            vk::Device::from_raw(2),
            SwapchainError::InvalidHandle,
            "bad",
        );
        assert!(!reporter.emit(&[finding.clone()]));

        let callback = vk::DebugReportCallbackEXT::from_raw(9);
        let loud = Arc::new(MemorySink::skipping());
        reporter.add_callback(vk::Instance::from_raw(1), callback, loud.clone());
        assert!(reporter.emit(&[finding.clone()]));
        assert_eq!(quiet.findings().len(), 2);
        assert_eq!(loud.count(SwapchainError::InvalidHandle), 1);

        assert!(reporter.remove_callback(callback));
        assert!(!reporter.remove_callback(callback));
        assert!(!reporter.emit(&[finding]));
    }

    #[test]
    fn instance_callbacks_are_dropped_with_instance() {
        let reporter = Reporter::new();
        let instance = vk::Instance::from_raw(1);
        for raw in 1..=3 {
            reporter.add_callback(
                instance,
                vk::DebugReportCallbackEXT::from_raw(raw),
                Arc::new(MemorySink::new()),
            );
        }
        reporter.add_sink(Arc::new(MemorySink::new()));

        assert_eq!(reporter.remove_instance_callbacks(instance), 3);
        assert_eq!(reporter.remove_instance_callbacks(instance), 0);
    }

    #[test]
    fn empty_emit_is_free() {
        let reporter = Reporter::new();
        assert!(!reporter.emit(&[]));
    }
}
