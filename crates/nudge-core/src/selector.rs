use log::debug;

use crate::document::{ConfigurationDocument, ConfigurationEntry};
use crate::requirements::RequirementChecks;
use crate::version::Version;

/// Pick the first entry this device is eligible for.
///
/// An entry is eligible only when it declares a required OS version, the
/// device OS version is known and at least that version, and every
/// registered requirement check passes.
#[must_use]
pub fn select<'a>(
    document: &'a ConfigurationDocument,
    device_os: Option<&Version>,
    checks: &RequirementChecks,
) -> Option<&'a ConfigurationEntry> {
    let entries = document.entries.as_deref()?;
    let device_os = device_os?;

    entries.iter().enumerate().find_map(|(index, entry)| {
        let requirements = entry.requirements.as_ref()?;
        let required_os = requirements.required_os_version.as_ref()?;
        if device_os < required_os {
            debug!("Entry {index} needs OS {required_os}, device has {device_os}");
            return None;
        }
        if !checks.evaluate(Some(requirements)) {
            debug!("Entry {index} rejected by requirement checks");
            return None;
        }
        Some(entry)
    })
}
