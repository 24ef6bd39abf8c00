//! # conclave-settings
//!
//! Configuration with layered sources. In priority order:
//! 1. **Compiled defaults**: [`ConclaveSettings::default()`]
//! 2. **User file**: `~/.conclave/settings.json`, deep-merged over defaults
//! 3. **Environment variables**: `CONCLAVE_*` overrides
//!
//! ```no_run
//! let settings = conclave_settings::load_settings().unwrap_or_default();
//! println!("workspace: {}", settings.workspace.root);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
