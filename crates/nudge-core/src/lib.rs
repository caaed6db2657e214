//! Update-check core for nudge.
//!
//! Everything here is synchronous and transport-free:
//! - Version parsing and ordering.
//! - Configuration document decoding and entry selection.
//! - Update resolution with once/always notification tracking.
//! - App-store lookup resolution.

mod app_store;
mod document;
mod error;
mod host;
mod notify;
mod requirements;
mod resolver;
mod selector;
mod value;
mod version;

/// App-store lookup decoding and resolution.
pub use app_store::{AppStoreUpdate, PHASED_RELEASE_DAYS, StoreRelease, check_app_store};
/// Decoded configuration model.
pub use document::{
    ConfigurationDocument, ConfigurationEntry, NotificationFrequency, Platform, RequirementSet,
};
pub use error::{CheckError, NotifyStoreError};
/// Host-supplied facts about the app and device.
pub use host::HostInfo;
/// Persisted "already notified" tracking.
pub use notify::{MemoryNotifyStore, NOTIFIED_KEY_PREFIX, NotifyPolicy, NotifyStore};
pub use requirements::RequirementChecks;
/// Update resolution and the full configuration pipeline.
pub use resolver::{CheckOptions, UpdateResult, UpdateState, check_configuration, resolve};
pub use selector::select;
pub use value::{Metadata, Value};
pub use version::{Version, VersionParseError};
