use thiserror::Error;

use crate::value::Metadata;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("Invalid JSON data: {details}")]
    InvalidJsonData { details: String },

    #[error("No update configuration found for this platform")]
    DataNotFound,

    #[error("No configuration entry matches this device")]
    RequirementsNotSatisfied { metadata: Option<Metadata> },

    #[error("Configuration entry has neither a required nor a latest version")]
    MissingConfigurationVersion,

    #[error("Could not determine installed version: {details}")]
    InvalidCurrentVersion { details: String },

    #[error("Missing or invalid bundle identifier")]
    InvalidBundleId,

    #[error("{0}")]
    Unknown(String),
}

impl CheckError {
    pub fn invalid_json(details: impl Into<String>) -> Self {
        Self::InvalidJsonData {
            details: details.into(),
        }
    }

    pub fn invalid_json_from<E>(error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::invalid_json(error.to_string())
    }

    pub fn invalid_current_version(details: impl Into<String>) -> Self {
        Self::InvalidCurrentVersion {
            details: details.into(),
        }
    }

    pub fn unknown_from<E>(error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::Unknown(error.to_string())
    }
}

/// Failure writing a notification flag to its backing store.
#[derive(Error, Debug)]
pub enum NotifyStoreError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Serialize {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl NotifyStoreError {
    #[must_use]
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    #[must_use]
    pub fn serialize(context: &'static str, source: serde_json::Error) -> Self {
        Self::Serialize { context, source }
    }
}
