use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::CheckError;
use crate::value::{Metadata, RequirementValue, ScalarMap, Value, scalar_fields};
use crate::version::Version;

const META_KEY: &str = "meta";

/// Target operating system whose entries should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Ios,
    Macos,
}

impl Platform {
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Macos => "macos",
        }
    }

    /// Key used by older configuration files, read only when [`Self::key`] is
    /// absent.
    #[must_use]
    pub fn legacy_key(self) -> &'static str {
        match self {
            Self::Ios => "iOS",
            Self::Macos => "macOS",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "macos" => Ok(Self::Macos),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationFrequency {
    #[default]
    Once,
    Always,
}

impl NotificationFrequency {
    fn from_config(raw: Option<&str>) -> Self {
        match raw {
            None => Self::default(),
            Some(raw) => raw.parse::<Self>().unwrap_or_else(|()| {
                warn!("Unknown notification frequency {raw:?}, falling back to once");
                Self::default()
            }),
        }
    }
}

impl FromStr for NotificationFrequency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("once") {
            Ok(Self::Once)
        } else if s.eq_ignore_ascii_case("always") {
            Ok(Self::Always)
        } else {
            Err(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RequirementSet {
    pub required_os_version: Option<Version>,
    pub user_defined: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationEntry {
    pub required_version: Option<Version>,
    pub latest_version: Option<Version>,
    pub notification_frequency: NotificationFrequency,
    pub requirements: Option<RequirementSet>,
    pub metadata: Option<Metadata>,
}

impl ConfigurationEntry {
    #[must_use]
    pub fn has_versions(&self) -> bool {
        self.required_version.is_some() || self.latest_version.is_some()
    }
}

/// A decoded update configuration for one platform.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigurationDocument {
    /// `None` when neither the platform key nor its legacy alias is present.
    pub entries: Option<Vec<ConfigurationEntry>>,
    pub metadata: Option<Metadata>,
}

#[derive(Deserialize)]
struct RawRequirements {
    #[serde(default)]
    required_os_version: Option<Version>,
    #[serde(flatten)]
    user_defined: ScalarMap<RequirementValue>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    required_version: Option<Version>,
    #[serde(default)]
    last_version_available: Option<Version>,
    #[serde(default)]
    notify_last_version_frequency: Option<String>,
    #[serde(default)]
    requirements: Option<RawRequirements>,
    #[serde(default)]
    meta: Option<serde_json::Value>,
}

impl From<RawEntry> for ConfigurationEntry {
    fn from(raw: RawEntry) -> Self {
        Self {
            required_version: raw.required_version,
            latest_version: raw.last_version_available,
            notification_frequency: NotificationFrequency::from_config(
                raw.notify_last_version_frequency.as_deref(),
            ),
            requirements: raw.requirements.map(|requirements| RequirementSet {
                required_os_version: requirements.required_os_version,
                user_defined: requirements
                    .user_defined
                    .0
                    .into_iter()
                    .map(|(key, value)| (key, value.0))
                    .collect(),
            }),
            metadata: raw.meta.and_then(|meta| decode_metadata(meta, "entry")),
        }
    }
}

impl ConfigurationDocument {
    /// Decode configuration JSON, keeping only the entries for `platform`.
    ///
    /// Entries with malformed versions or requirement values are dropped
    /// individually.
    ///
    /// # Errors
    /// Returns [`CheckError::InvalidJsonData`] when `bytes` is not JSON, the
    /// top level is not an object, or the platform value is not an array of
    /// objects.
    pub fn decode(bytes: &[u8], platform: Platform) -> Result<Self, CheckError> {
        let root: serde_json::Value =
            serde_json::from_slice(bytes).map_err(CheckError::invalid_json_from)?;
        let serde_json::Value::Object(mut root) = root else {
            return Err(CheckError::invalid_json("top-level value is not an object"));
        };

        let metadata = root
            .remove(META_KEY)
            .and_then(|meta| decode_metadata(meta, "document"));

        let raw_entries = match root.remove(platform.key()) {
            Some(value) => Some(value),
            None => root.remove(platform.legacy_key()),
        };

        let entries = match raw_entries {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Array(items)) => Some(decode_entries(items, platform)?),
            Some(_) => {
                return Err(CheckError::invalid_json(format!(
                    "\"{platform}\" is not an array"
                )));
            }
        };

        Ok(Self { entries, metadata })
    }

    /// Entry metadata merged over document metadata; entry keys win.
    #[must_use]
    pub fn merged_metadata(&self, entry: &ConfigurationEntry) -> Option<Metadata> {
        merge_metadata(self.metadata.as_ref(), entry.metadata.as_ref())
    }
}

fn decode_entries(
    items: Vec<serde_json::Value>,
    platform: Platform,
) -> Result<Vec<ConfigurationEntry>, CheckError> {
    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            return Err(CheckError::invalid_json(format!(
                "\"{platform}\" entry {index} is not an object"
            )));
        }
        match serde_json::from_value::<RawEntry>(item) {
            Ok(raw) => entries.push(raw.into()),
            Err(error) => warn!("Dropping {platform} configuration entry {index}: {error}"),
        }
    }
    debug!("Decoded {} {platform} configuration entries", entries.len());
    Ok(entries)
}

/// Keep the scalar fields of a `meta` object. Anything other than an object
/// is ignored.
fn decode_metadata(value: serde_json::Value, scope: &str) -> Option<Metadata> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Object(fields) => Some(scalar_fields(fields)),
        _ => {
            warn!("Ignoring {scope} metadata that is not an object");
            None
        }
    }
}

pub(crate) fn merge_metadata(
    document: Option<&Metadata>,
    entry: Option<&Metadata>,
) -> Option<Metadata> {
    match (document, entry) {
        (None, None) => None,
        (Some(document), None) => Some(document.clone()),
        (None, Some(entry)) => Some(entry.clone()),
        (Some(document), Some(entry)) => {
            let mut merged = document.clone();
            merged.extend(entry.iter().map(|(k, v)| (k.clone(), v.clone())));
            Some(merged)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decode(
        value: &serde_json::Value,
        platform: Platform,
    ) -> Result<ConfigurationDocument, CheckError> {
        let bytes = serde_json::to_vec(value).expect("fixture serializes");
        ConfigurationDocument::decode(&bytes, platform)
    }

    #[test]
    fn decodes_entry_fields() {
        let document = decode(
            &json!({
                "ios": [{
                    "required_version": "2.0",
                    "last_version_available": "3.0",
                    "notify_last_version_frequency": "ALWAYS",
                    "requirements": { "required_os_version": "10.0", "channel": "beta" },
                    "meta": { "title": "New!" }
                }]
            }),
            Platform::Ios,
        )
        .expect("document decodes");

        let entries = document.entries.expect("ios entries present");
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.required_version, Some(Version::new(2, 0, 0, 0)));
        assert_eq!(entry.latest_version, Some(Version::new(3, 0, 0, 0)));
        assert_eq!(entry.notification_frequency, NotificationFrequency::Always);
        let requirements = entry.requirements.as_ref().expect("requirements present");
        assert_eq!(requirements.required_os_version, Some(Version::new(10, 0, 0, 0)));
        assert_eq!(requirements.user_defined["channel"], Value::from("beta"));
        assert!(!requirements.user_defined.contains_key("required_os_version"));
        assert_eq!(
            entry.metadata.as_ref().map(|m| m["title"].clone()),
            Some(Value::from("New!"))
        );
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(matches!(
            ConfigurationDocument::decode(b"{not json", Platform::Ios),
            Err(CheckError::InvalidJsonData { .. })
        ));
        assert!(matches!(
            decode(&json!([1, 2, 3]), Platform::Ios),
            Err(CheckError::InvalidJsonData { .. })
        ));
    }

    #[test]
    fn platform_value_must_be_an_array_of_objects() {
        assert!(matches!(
            decode(&json!({"ios": {"required_version": "1"}}), Platform::Ios),
            Err(CheckError::InvalidJsonData { .. })
        ));
        assert!(matches!(
            decode(&json!({"ios": ["1.0"]}), Platform::Ios),
            Err(CheckError::InvalidJsonData { .. })
        ));
    }

    #[test]
    fn other_platforms_and_unknown_keys_are_ignored() {
        let document = decode(
            &json!({
                "macos": "not even an array",
                "android": [{"anything": true}],
                "schema": 4,
                "ios": [{"last_version_available": "1.2"}]
            }),
            Platform::Ios,
        )
        .expect("document decodes");

        assert_eq!(document.entries.map(|e| e.len()), Some(1));
    }

    #[test]
    fn missing_platform_key_yields_no_entry_list() {
        let document =
            decode(&json!({"macos": []}), Platform::Ios).expect("document decodes");
        assert!(document.entries.is_none());

        let document = decode(&json!({"ios": []}), Platform::Ios).expect("document decodes");
        assert_eq!(document.entries, Some(Vec::new()));
    }

    #[test]
    fn legacy_key_is_used_only_when_primary_is_absent() {
        let document = decode(
            &json!({"iOS": [{"last_version_available": "1.0"}]}),
            Platform::Ios,
        )
        .expect("document decodes");
        assert_eq!(document.entries.map(|e| e.len()), Some(1));

        let document = decode(
            &json!({
                "macos": [{"last_version_available": "2.0"}],
                "macOS": [{"last_version_available": "1.0"}, {"last_version_available": "1.1"}]
            }),
            Platform::Macos,
        )
        .expect("document decodes");
        let entries = document.entries.expect("macos entries present");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].latest_version, Some(Version::new(2, 0, 0, 0)));
    }

    #[test]
    fn malformed_entries_are_dropped_individually() {
        let document = decode(
            &json!({
                "ios": [
                    {"required_version": "abc"},
                    {"requirements": {"required_os_version": "x.y"}},
                    {"last_version_available": 3},
                    {"last_version_available": "4.1"}
                ]
            }),
            Platform::Ios,
        )
        .expect("document decodes");

        let entries = document.entries.expect("ios entries present");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].latest_version, Some(Version::new(4, 1, 0, 0)));
    }

    #[test]
    fn null_user_defined_requirement_decodes_as_true() {
        let document = decode(
            &json!({
                "ios": [{
                    "last_version_available": "1.0",
                    "requirements": {"required_os_version": "1", "is_beta": null, "cohort": 7}
                }]
            }),
            Platform::Ios,
        )
        .expect("document decodes");

        let entries = document.entries.expect("ios entries present");
        let requirements = entries[0].requirements.as_ref().expect("requirements present");
        assert_eq!(requirements.user_defined["is_beta"], Value::Bool(true));
        assert_eq!(requirements.user_defined["cohort"].as_i64(), Some(7));
    }

    #[test]
    fn frequency_defaults_to_once() {
        let document = decode(
            &json!({
                "ios": [
                    {"last_version_available": "1"},
                    {"last_version_available": "1", "notify_last_version_frequency": "weekly"},
                    {"last_version_available": "1", "notify_last_version_frequency": "once"}
                ]
            }),
            Platform::Ios,
        )
        .expect("document decodes");

        let entries = document.entries.expect("ios entries present");
        assert!(
            entries
                .iter()
                .all(|e| e.notification_frequency == NotificationFrequency::Once)
        );
    }

    #[test]
    fn entry_metadata_wins_over_document_metadata() {
        let document = decode(
            &json!({
                "meta": {"title": "Document", "support": "help@example.com"},
                "ios": [{"last_version_available": "1", "meta": {"title": "Entry"}}]
            }),
            Platform::Ios,
        )
        .expect("document decodes");

        let entries = document.entries.clone().expect("ios entries present");
        let merged = document
            .merged_metadata(&entries[0])
            .expect("merged metadata present");
        assert_eq!(merged["title"], Value::from("Entry"));
        assert_eq!(merged["support"], Value::from("help@example.com"));
    }

    #[test]
    fn malformed_document_metadata_is_ignored() {
        let document = decode(
            &json!({"meta": ["not", "a", "map"], "ios": []}),
            Platform::Ios,
        )
        .expect("document decodes");
        assert!(document.metadata.is_none());
    }

    #[test]
    fn nested_metadata_and_requirement_values_are_skipped_not_fatal() {
        let document = decode(
            &json!({
                "meta": {"links": ["a", "b"], "contact": "ops"},
                "ios": [{
                    "last_version_available": "3.0",
                    "requirements": {"required_os_version": "10.0", "regions": ["eu"], "channel": "beta"},
                    "meta": {"changelog": {"en": "Fixes"}, "title": "3.0"}
                }, {
                    "last_version_available": "3.1",
                    "meta": "release notes"
                }]
            }),
            Platform::Ios,
        )
        .expect("document decodes");

        assert_eq!(
            document.metadata,
            Some(Metadata::from([("contact".to_string(), Value::from("ops"))]))
        );

        let entries = document.entries.as_ref().expect("ios entries present");
        assert_eq!(entries.len(), 2);

        let requirements = entries[0].requirements.as_ref().expect("requirements present");
        assert_eq!(requirements.required_os_version, Some(Version::new(10, 0, 0, 0)));
        assert!(!requirements.user_defined.contains_key("regions"));
        assert_eq!(requirements.user_defined["channel"], Value::from("beta"));
        assert_eq!(
            entries[0].metadata,
            Some(Metadata::from([("title".to_string(), Value::from("3.0"))]))
        );
        assert!(entries[1].metadata.is_none());
    }

    #[test]
    fn merge_metadata_returns_none_without_sources() {
        assert!(merge_metadata(None, None).is_none());
    }

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("iOS".parse::<Platform>(), Ok(Platform::Ios));
        assert_eq!("MACOS".parse::<Platform>(), Ok(Platform::Macos));
        assert!("android".parse::<Platform>().is_err());
    }
}
