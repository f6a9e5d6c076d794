use ash::vk;
use thiserror::Error;

/// Failures of the layer's own machinery, as opposed to application misuse
/// (which becomes a finding).
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("loader did not provide a {0} link info in the create-info chain")]
    MissingLinkInfo(&'static str),
    #[error("next layer does not expose {0}")]
    MissingEntryPoint(&'static str),
    #[error("null pointer passed for {0}")]
    NullPointer(&'static str),
    #[error("unsupported loader interface version {0}")]
    UnsupportedInterface(u32),
    #[error("unknown report flag {0:?}")]
    UnknownReportFlag(String),
    #[error("failed to read configuration {path}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[cfg(feature = "config_file")]
    #[error("failed to parse configuration {path}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LayerError {
    pub fn to_vk_result(&self) -> vk::Result {
        match self {
            LayerError::MissingLinkInfo(_) | LayerError::UnsupportedInterface(_) => {
                vk::Result::ERROR_INITIALIZATION_FAILED
            }
            LayerError::MissingEntryPoint(_) => vk::Result::ERROR_EXTENSION_NOT_PRESENT,
            LayerError::NullPointer(_) => vk::Result::ERROR_VALIDATION_FAILED_EXT,
            LayerError::UnknownReportFlag(_) | LayerError::ConfigIo { .. } => {
                vk::Result::ERROR_INITIALIZATION_FAILED
            }
            #[cfg(feature = "config_file")]
            LayerError::ConfigParse { .. } => vk::Result::ERROR_INITIALIZATION_FAILED,
        }
    }
}

impl From<LayerError> for vk::Result {
    fn from(err: LayerError) -> Self {
        err.to_vk_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_vk_result() {
        assert_eq!(
            LayerError::MissingLinkInfo("instance").to_vk_result(),
            vk::Result::ERROR_INITIALIZATION_FAILED
        );
        assert_eq!(
            vk::Result::from(LayerError::NullPointer("pCreateInfo")),
            vk::Result::ERROR_VALIDATION_FAILED_EXT
        );
        assert_eq!(
            LayerError::UnknownReportFlag("loud".into()).to_string(),
            "unknown report flag \"loud\""
        );
    }
}
