//! Site registry: the static catalog of supported chat sites merged with user preferences.

pub mod catalog;
pub mod errors;
pub mod model;
pub mod prefs;
pub mod registry;

pub use catalog::builtin_sites;
pub use errors::SiteError;
pub use model::{InjectionMethod, SiteConfig};
pub use prefs::{JsonFilePreferences, MemoryPreferences, Preferences, PreferencesStore};
pub use registry::SiteRegistry;
