//! Layer settings.
//!
//! Built from defaults, then an optional JSON file named by
//! `VK_SWAPCHAIN_CONFIG` (with the `config_file` feature), then environment
//! overrides. A broken setting never keeps the layer from loading.

use ash::vk;

use crate::error::LayerError;

pub const CONFIG_VAR: &str = "VK_SWAPCHAIN_CONFIG";
pub const REPORT_FLAGS_VAR: &str = "VK_SWAPCHAIN_REPORT_FLAGS";
pub const STRICT_VAR: &str = "VK_SWAPCHAIN_STRICT";
pub const LOG_VAR: &str = "VK_SWAPCHAIN_LOG";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerSettings {
    /// Severities written to the log.
    pub report_flags: vk::DebugReportFlagsEXT,
    /// Refuse calls with error findings at entry points that would otherwise
    /// only observe.
    pub strict_gating: bool,
    /// `env_logger` filter.
    pub log_filter: Option<String>,
}

impl Default for LayerSettings {
    fn default() -> Self {
        LayerSettings {
            report_flags: vk::DebugReportFlagsEXT::ERROR | vk::DebugReportFlagsEXT::WARNING,
            strict_gating: false,
            log_filter: None,
        }
    }
}

#[cfg(feature = "config_file")]
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSettings {
    report_flags: Option<Vec<String>>,
    strict_gating: Option<bool>,
    log_filter: Option<String>,
}

pub fn parse_report_flag(flag: &str) -> Result<vk::DebugReportFlagsEXT, LayerError> {
    Ok(match flag.trim().to_ascii_lowercase().as_str() {
        "error" => vk::DebugReportFlagsEXT::ERROR,
        "warn" | "warning" => vk::DebugReportFlagsEXT::WARNING,
        "perf" => vk::DebugReportFlagsEXT::PERFORMANCE_WARNING,
        "info" => vk::DebugReportFlagsEXT::INFORMATION,
        "debug" => vk::DebugReportFlagsEXT::DEBUG,
        _ => return Err(LayerError::UnknownReportFlag(flag.trim().to_string())),
    })
}

/// Parses a comma separated flag list such as `error,warn,perf`.
pub fn parse_report_flags(list: &str) -> Result<vk::DebugReportFlagsEXT, LayerError> {
    list.split(',')
        .filter(|flag| !flag.trim().is_empty())
        .try_fold(vk::DebugReportFlagsEXT::empty(), |flags, flag| {
            Ok(flags | parse_report_flag(flag)?)
        })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl LayerSettings {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = LayerSettings::default();

        if let Some(path) = lookup(CONFIG_VAR) {
            if let Err(err) = settings.apply_file(&path) {
                log::warn!("Ignoring swapchain layer configuration: {}", err);
            }
        }

        if let Err(err) = settings.apply_overrides(&lookup) {
            log::warn!("Ignoring {}: {}", REPORT_FLAGS_VAR, err);
        }

        settings
    }

    fn apply_overrides(
        &mut self,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<(), LayerError> {
        if let Some(value) = lookup(STRICT_VAR) {
            match parse_bool(&value) {
                Some(strict) => self.strict_gating = strict,
                None => log::warn!("Ignoring {}={:?}", STRICT_VAR, value),
            }
        }
        if let Some(filter) = lookup(LOG_VAR).or_else(|| lookup("RUST_LOG")) {
            self.log_filter = Some(filter);
        }
        if let Some(list) = lookup(REPORT_FLAGS_VAR) {
            self.report_flags = parse_report_flags(&list)?;
        }
        Ok(())
    }

    #[cfg(feature = "config_file")]
    fn apply_file(&mut self, path: &str) -> Result<(), LayerError> {
        let content = std::fs::read_to_string(path).map_err(|source| LayerError::ConfigIo {
            path: path.to_string(),
            source,
        })?;
        let file: FileSettings =
            serde_json::from_str(&content).map_err(|source| LayerError::ConfigParse {
                path: path.to_string(),
                source,
            })?;

        if let Some(flags) = file.report_flags {
            self.report_flags = flags
                .iter()
                .try_fold(vk::DebugReportFlagsEXT::empty(), |acc, flag| {
                    Ok::<_, LayerError>(acc | parse_report_flag(flag)?)
                })?;
        }
        if let Some(strict) = file.strict_gating {
            self.strict_gating = strict;
        }
        if file.log_filter.is_some() {
            self.log_filter = file.log_filter;
        }
        Ok(())
    }

    #[cfg(not(feature = "config_file"))]
    fn apply_file(&mut self, path: &str) -> Result<(), LayerError> {
        log::debug!(
            "{} is set to {} but the layer was built without config_file support",
            CONFIG_VAR,
            path
        );
        Ok(())
    }
}
