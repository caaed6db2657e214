use std::fmt::Write as _;

use nudge_core::{AppStoreUpdate, CheckError, Metadata, UpdateResult, UpdateState};
use serde::Serialize;

fn state_line(state: UpdateState, version: impl std::fmt::Display) -> String {
    match state {
        UpdateState::RequiredUpdateNeeded => format!("Update required: {version}"),
        UpdateState::NewUpdateAvailable => format!("Update available: {version}"),
        UpdateState::NoUpdateAvailable => "No update available".to_string(),
    }
}

fn write_metadata(out: &mut String, metadata: Option<&Metadata>) {
    for (key, value) in metadata.into_iter().flatten() {
        let _ = writeln!(out, "  {key}: {value}");
    }
}

pub fn describe_update(result: &UpdateResult) -> String {
    let mut out = state_line(result.update_state, result.update_version);
    out.push('\n');
    write_metadata(&mut out, result.metadata.as_ref());
    out
}

pub fn describe_store_update(update: &AppStoreUpdate) -> String {
    let mut out = state_line(update.update_state, update.update_version);
    out.push('\n');
    if update.phase_release_in_progress {
        out.push_str("  phased release in progress\n");
    }
    if let Some(url) = &update.release.track_view_url {
        let _ = writeln!(out, "  store: {url}");
    }
    if let Some(notes) = &update.release.release_notes {
        let _ = writeln!(out, "  notes: {notes}");
    }
    out
}

pub fn describe_error(error: &CheckError) -> String {
    let mut out = format!("error: {error}\n");
    if let CheckError::RequirementsNotSatisfied { metadata } = error {
        write_metadata(&mut out, metadata.as_ref());
    }
    out
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}
