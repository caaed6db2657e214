use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::document::{
    ConfigurationDocument, ConfigurationEntry, NotificationFrequency, Platform, merge_metadata,
};
use crate::error::CheckError;
use crate::host::HostInfo;
use crate::notify::NotifyPolicy;
use crate::requirements::RequirementChecks;
use crate::selector::select;
use crate::value::Metadata;
use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    NoUpdateAvailable,
    RequiredUpdateNeeded,
    NewUpdateAvailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateResult {
    /// The highest of the required, latest, and installed versions.
    pub update_version: Version,
    pub update_state: UpdateState,
    pub applied_entry: ConfigurationEntry,
    pub metadata: Option<Metadata>,
}

/// Caller choices that shape a check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    pub platform: Platform,
    /// Replaces the frequency declared by the configuration entry.
    pub frequency_override: Option<NotificationFrequency>,
    /// Only consulted by app-store lookups.
    pub track_phased_release: bool,
}

/// Compute the update state for an already selected entry.
///
/// Under once-semantics a "new update" result marks the latest version as
/// notified before returning.
///
/// # Errors
/// Returns [`CheckError::MissingConfigurationVersion`] when the entry has
/// neither a required nor a latest version.
pub fn resolve(
    entry: &ConfigurationEntry,
    document_metadata: Option<&Metadata>,
    installed: Version,
    policy: &NotifyPolicy,
    frequency_override: Option<NotificationFrequency>,
) -> Result<UpdateResult, CheckError> {
    if !entry.has_versions() {
        return Err(CheckError::MissingConfigurationVersion);
    }

    let frequency = frequency_override.unwrap_or(entry.notification_frequency);
    let update_state = update_state(
        entry.required_version,
        entry.latest_version,
        installed,
        frequency,
        policy,
    );

    let update_version = [entry.required_version, entry.latest_version]
        .into_iter()
        .flatten()
        .fold(installed, Version::max);

    debug!("Resolved {update_state:?} for installed {installed}, offering {update_version}");

    Ok(UpdateResult {
        update_version,
        update_state,
        applied_entry: entry.clone(),
        metadata: merge_metadata(document_metadata, entry.metadata.as_ref()),
    })
}

pub(crate) fn update_state(
    required: Option<Version>,
    latest: Option<Version>,
    installed: Version,
    frequency: NotificationFrequency,
    policy: &NotifyPolicy,
) -> UpdateState {
    if required.is_some_and(|required| required > installed) {
        return UpdateState::RequiredUpdateNeeded;
    }

    let Some(latest) = latest.filter(|latest| *latest > installed) else {
        return UpdateState::NoUpdateAvailable;
    };

    let should_notify = match frequency {
        NotificationFrequency::Always => true,
        NotificationFrequency::Once => policy.notify_once(&latest),
    };

    if should_notify {
        UpdateState::NewUpdateAvailable
    } else {
        debug!("Version {latest} was already notified");
        UpdateState::NoUpdateAvailable
    }
}

/// Decode configuration bytes, select the applicable entry, and resolve it.
///
/// # Errors
/// Fails with the first applicable of, in order:
/// [`CheckError::InvalidJsonData`], [`CheckError::DataNotFound`],
/// [`CheckError::RequirementsNotSatisfied`],
/// [`CheckError::MissingConfigurationVersion`],
/// [`CheckError::InvalidCurrentVersion`].
pub fn check_configuration(
    bytes: &[u8],
    options: &CheckOptions,
    host: &HostInfo,
    checks: &RequirementChecks,
    policy: &NotifyPolicy,
) -> Result<UpdateResult, CheckError> {
    let document = ConfigurationDocument::decode(bytes, options.platform)?;

    if document.entries.as_ref().is_none_or(Vec::is_empty) {
        return Err(CheckError::DataNotFound);
    }

    let Some(entry) = select(&document, host.os_version().as_ref(), checks) else {
        return Err(CheckError::RequirementsNotSatisfied {
            metadata: document.metadata.clone(),
        });
    };

    if !entry.has_versions() {
        return Err(CheckError::MissingConfigurationVersion);
    }

    let installed = host.installed_version()?;
    let result = resolve(
        entry,
        document.metadata.as_ref(),
        installed,
        policy,
        options.frequency_override,
    )?;

    info!(
        "Update check for {}: {:?} ({})",
        options.platform, result.update_state, result.update_version
    );
    Ok(result)
}
