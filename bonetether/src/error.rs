use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid setting '{field}': {message}")]
    InvalidSettings { field: String, message: String },

    #[error("bone topology has a linearization cycle through '{bone}'")]
    TopologyCycle { bone: String },

    #[error("bone topology descriptor at index {index} describes '{bone}'")]
    TopologyMisplacedBone { index: usize, bone: String },

    #[error("unknown bone: {name}")]
    UnknownBone { name: String },

    #[cfg(feature = "json")]
    #[error("failed to parse settings JSON: {message}")]
    JsonParse { message: String },
}

impl Error {
    pub(crate) fn invalid_settings(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidSettings {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
