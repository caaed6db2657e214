use log::debug;

use crate::error::CheckError;
use crate::version::Version;

/// Facts about the running app and device, supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    pub app_version: Option<String>,
    pub build_number: Option<String>,
    pub os_version: Option<String>,
    pub bundle_id: Option<String>,
}

impl HostInfo {
    #[must_use]
    pub fn new(app_version: impl Into<String>) -> Self {
        Self {
            app_version: Some(app_version.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_build_number(mut self, build_number: impl Into<String>) -> Self {
        self.build_number = Some(build_number.into());
        self
    }

    #[must_use]
    pub fn with_os_version(mut self, os_version: impl Into<String>) -> Self {
        self.os_version = Some(os_version.into());
        self
    }

    #[must_use]
    pub fn with_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }

    /// The installed app version, with the build number as its build
    /// component unless the version string already carries one.
    ///
    /// # Errors
    /// Returns [`CheckError::InvalidCurrentVersion`] when the app version is
    /// missing or cannot be parsed, or when a build number is given but is
    /// not an unsigned integer.
    pub fn installed_version(&self) -> Result<Version, CheckError> {
        let app_version = non_empty(self.app_version.as_deref())
            .ok_or_else(|| CheckError::invalid_current_version("app version is missing"))?;

        let build_number = non_empty(self.build_number.as_deref());
        if let Some(build) = build_number
            && !is_unsigned_integer(build)
        {
            return Err(CheckError::invalid_current_version(format!(
                "build number {build:?} is not an unsigned integer"
            )));
        }

        let raw = match build_number {
            Some(build) if !app_version.contains('-') => format!("{app_version}-{build}"),
            _ => app_version.to_string(),
        };

        raw.parse::<Version>()
            .map_err(|error| CheckError::invalid_current_version(error.to_string()))
    }

    /// The device OS version, or `None` when absent or unparsable.
    #[must_use]
    pub fn os_version(&self) -> Option<Version> {
        let raw = non_empty(self.os_version.as_deref())?;
        raw.parse::<Version>()
            .map_err(|error| debug!("Ignoring unparsable OS version {raw:?}: {error}"))
            .ok()
    }
}

fn is_unsigned_integer(value: &str) -> bool {
    value.bytes().all(|byte| byte.is_ascii_digit()) && value.parse::<u64>().is_ok()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
