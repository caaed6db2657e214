mod notify_store;
mod paths;

pub use notify_store::FileNotifyStore;
pub use paths::{AppPaths, AppPathsError};
