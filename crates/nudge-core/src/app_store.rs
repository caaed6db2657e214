//! Update checks backed by the public app-store lookup API instead of a
//! custom configuration document.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::CheckError;
use crate::host::HostInfo;
use crate::notify::NotifyPolicy;
use crate::resolver::{CheckOptions, UpdateState, update_state};
use crate::version::Version;

/// How long after release a store version counts as still rolling out.
pub const PHASED_RELEASE_DAYS: i64 = 7;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLookup {
    #[serde(default)]
    result_count: u64,
    #[serde(default)]
    results: Vec<RawStoreRelease>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStoreRelease {
    version: String,
    #[serde(default)]
    minimum_os_version: Option<String>,
    #[serde(default)]
    current_version_release_date: Option<String>,
    #[serde(default)]
    track_view_url: Option<String>,
    #[serde(default)]
    release_notes: Option<String>,
}

/// The newest release listed by an app-store lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreRelease {
    pub version: Version,
    pub minimum_os_version: Option<Version>,
    pub release_date: Option<DateTime<Utc>>,
    pub track_view_url: Option<String>,
    pub release_notes: Option<String>,
}

impl StoreRelease {
    /// Decode an app-store lookup response and take its first result.
    ///
    /// # Errors
    /// Returns [`CheckError::InvalidJsonData`] for malformed JSON or an
    /// unparsable store version, and [`CheckError::DataNotFound`] when the
    /// lookup has no results.
    pub fn decode(bytes: &[u8]) -> Result<Self, CheckError> {
        let lookup: RawLookup =
            serde_json::from_slice(bytes).map_err(CheckError::invalid_json_from)?;

        if lookup.result_count == 0 {
            return Err(CheckError::DataNotFound);
        }
        let Some(raw) = lookup.results.into_iter().next() else {
            return Err(CheckError::DataNotFound);
        };

        let version = raw.version.parse::<Version>().map_err(|error| {
            CheckError::invalid_json(format!("store version {:?}: {error}", raw.version))
        })?;

        let minimum_os_version = raw.minimum_os_version.as_deref().and_then(|value| {
            value
                .parse::<Version>()
                .map_err(|error| warn!("Ignoring store minimum OS version {value:?}: {error}"))
                .ok()
        });

        let release_date = raw
            .current_version_release_date
            .as_deref()
            .and_then(|value| {
                DateTime::parse_from_rfc3339(value)
                    .map_err(|error| warn!("Ignoring store release date {value:?}: {error}"))
                    .ok()
            })
            .map(|date| date.with_timezone(&Utc));

        Ok(Self {
            version,
            minimum_os_version,
            release_date,
            track_view_url: raw.track_view_url,
            release_notes: raw.release_notes,
        })
    }

    /// Whether the release is still inside its phased rollout window at `now`.
    #[must_use]
    pub fn is_phased_release_in_progress(&self, now: DateTime<Utc>) -> bool {
        self.release_date
            .is_some_and(|released| now < released + Duration::days(PHASED_RELEASE_DAYS))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppStoreUpdate {
    pub update_version: Version,
    pub update_state: UpdateState,
    pub release: StoreRelease,
    /// Always `false` unless phased-release tracking was requested.
    pub phase_release_in_progress: bool,
}

/// Resolve an app-store lookup response against the installed app.
///
/// The store path never reports a required update.
///
/// # Errors
/// Fails with the first applicable of, in order:
/// [`CheckError::InvalidJsonData`], [`CheckError::DataNotFound`],
/// [`CheckError::RequirementsNotSatisfied`] (device OS below the store
/// minimum), [`CheckError::InvalidCurrentVersion`].
pub fn check_app_store(
    bytes: &[u8],
    options: &CheckOptions,
    host: &HostInfo,
    policy: &NotifyPolicy,
    now: DateTime<Utc>,
) -> Result<AppStoreUpdate, CheckError> {
    let release = StoreRelease::decode(bytes)?;

    if let (Some(device_os), Some(minimum)) = (host.os_version(), release.minimum_os_version)
        && device_os < minimum
    {
        debug!("Store release needs OS {minimum}, device has {device_os}");
        return Err(CheckError::RequirementsNotSatisfied { metadata: None });
    }

    let installed = host.installed_version()?;
    let frequency = options.frequency_override.unwrap_or_default();
    let update_state = update_state(None, Some(release.version), installed, frequency, policy);
    let phase_release_in_progress =
        options.track_phased_release && release.is_phased_release_in_progress(now);

    info!(
        "App store check: {update_state:?} ({} available, {installed} installed)",
        release.version
    );

    Ok(AppStoreUpdate {
        update_version: release.version.max(installed),
        update_state,
        release,
        phase_release_in_progress,
    })
}
