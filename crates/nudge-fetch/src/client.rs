use log::{debug, warn};
use nudge_core::{
    AppStoreUpdate, CheckError, CheckOptions, HostInfo, NotifyPolicy, RequirementChecks,
    UpdateResult,
};

use crate::error::FetchError;

pub const APP_STORE_LOOKUP_URL: &str = "https://itunes.apple.com/lookup";

const CONFIGURATION: &str = "update configuration";
const APP_STORE_LOOKUP: &str = "app store lookup";

/// Build the lookup URL for `bundle_id`, optionally scoped to a storefront
/// country code.
///
/// # Errors
/// Returns [`CheckError::InvalidBundleId`] when the bundle identifier is empty
/// or contains characters outside `[A-Za-z0-9._-]`.
pub fn lookup_url(bundle_id: &str, country: Option<&str>) -> Result<reqwest::Url, CheckError> {
    let bundle_id = bundle_id.trim();
    let valid = !bundle_id.is_empty()
        && bundle_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'));
    if !valid {
        return Err(CheckError::InvalidBundleId);
    }

    let mut params = vec![("bundleId", bundle_id)];
    if let Some(country) = country.map(str::trim).filter(|c| !c.is_empty()) {
        params.push(("country", country));
    }

    reqwest::Url::parse_with_params(APP_STORE_LOOKUP_URL, &params)
        .map_err(CheckError::unknown_from)
}

async fn fetch_bytes(
    client: &reqwest::Client,
    url: reqwest::Url,
    what: &'static str,
) -> Result<Vec<u8>, FetchError> {
    debug!("Fetching {what} from {url}");

    let response = client
        .get(url)
        .header("User-Agent", "nudge")
        .send()
        .await
        .map_err(|source| FetchError::Request { what, source })?;

    if !response.status().is_success() {
        let status = response.status();
        let body_snippet = response
            .text()
            .await
            .ok()
            .map(|body| response_snippet(&body, 160))
            .unwrap_or_default();
        return Err(FetchError::HttpStatus {
            what,
            status,
            body_snippet,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| FetchError::Body { what, source })?;
    Ok(body.to_vec())
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

/// Download the raw configuration document.
///
/// # Errors
/// Returns an error when the URL is invalid, the request fails, or the
/// server answers with a non-success status.
pub async fn fetch_configuration(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, CheckError> {
    let url = reqwest::Url::parse(url).map_err(CheckError::unknown_from)?;
    Ok(fetch_bytes(client, url, CONFIGURATION).await?)
}

/// Download the raw app-store lookup response for `bundle_id`.
///
/// # Errors
/// Returns [`CheckError::InvalidBundleId`] for an unusable bundle id and
/// [`CheckError::Unknown`] for transport failures.
pub async fn fetch_app_store_lookup(
    client: &reqwest::Client,
    bundle_id: &str,
    country: Option<&str>,
) -> Result<Vec<u8>, CheckError> {
    let url = lookup_url(bundle_id, country)?;
    Ok(fetch_bytes(client, url, APP_STORE_LOOKUP).await?)
}

/// Fetch a configuration document and resolve it for this host.
///
/// # Errors
/// Returns transport failures as [`CheckError::Unknown`], otherwise the
/// errors of [`nudge_core::check_configuration`].
pub async fn check_remote_configuration(
    client: &reqwest::Client,
    url: &str,
    options: &CheckOptions,
    host: &HostInfo,
    checks: &RequirementChecks,
    policy: &NotifyPolicy,
) -> Result<UpdateResult, CheckError> {
    let bytes = fetch_configuration(client, url)
        .await
        .inspect_err(|error| warn!("Configuration fetch failed: {error}"))?;
    nudge_core::check_configuration(&bytes, options, host, checks, policy)
}

/// Look up the host's bundle id in the app store and resolve the result.
///
/// # Errors
/// Returns [`CheckError::InvalidBundleId`] when the host has no usable bundle
/// id, transport failures as [`CheckError::Unknown`], otherwise the errors of
/// [`nudge_core::check_app_store`].
pub async fn check_app_store(
    client: &reqwest::Client,
    country: Option<&str>,
    options: &CheckOptions,
    host: &HostInfo,
    policy: &NotifyPolicy,
) -> Result<AppStoreUpdate, CheckError> {
    let bundle_id = host
        .bundle_id
        .as_deref()
        .ok_or(CheckError::InvalidBundleId)?;
    let bytes = fetch_app_store_lookup(client, bundle_id, country)
        .await
        .inspect_err(|error| warn!("App store lookup failed: {error}"))?;
    nudge_core::check_app_store(&bytes, options, host, policy, chrono::Utc::now())
}
