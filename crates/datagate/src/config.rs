//! Process-wide options.
//!
//! Options are installed once with [`configure`], before any validation runs,
//! and read without locking afterwards. Engines copy the relevant defaults
//! when they are created.
//!
//! ```rust,ignore
//! datagate::configure(GlobalOptions::default().stop_on_error(false))?;
//! ```

use serde::Deserialize;
use std::sync::OnceLock;

use crate::error::ConfigError;

/// Default limit for request bodies (10 MiB).
pub const DEFAULT_MAX_FORM_SIZE: usize = 10 * 1024 * 1024;

/// Defaults shared by every engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GlobalOptions {
    /// Stop a run at the first failing field
    pub stop_on_error: bool,
    /// Skip absent or empty values unless the validator is `required`
    pub skip_on_empty: bool,
    /// Largest request body accepted by `from_request`, in bytes
    pub max_form_size: usize,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            skip_on_empty: true,
            max_form_size: DEFAULT_MAX_FORM_SIZE,
        }
    }
}

impl GlobalOptions {
    /// Set whether runs stop at the first failure.
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// Set the default skip-empty policy.
    pub fn skip_on_empty(mut self, skip: bool) -> Self {
        self.skip_on_empty = skip;
        self
    }

    /// Set the request body limit.
    pub fn max_form_size(mut self, bytes: usize) -> Self {
        self.max_form_size = bytes;
        self
    }

    /// Read options from `DATAGATE_*` environment variables.
    ///
    /// Unset variables keep their defaults, e.g. `DATAGATE_STOP_ON_ERROR=false`
    /// only changes `stop_on_error`.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self, ConfigError> {
        envy::prefixed("DATAGATE_")
            .from_env::<Self>()
            .map_err(|e| ConfigError::Options(e.to_string()))
    }
}

static GLOBAL: OnceLock<GlobalOptions> = OnceLock::new();

/// Install the global options.
///
/// Fails if options were already installed or already read.
pub fn configure(options: GlobalOptions) -> Result<(), ConfigError> {
    GLOBAL
        .set(options)
        .map_err(|_| ConfigError::GlobalAlreadyInitialized)?;
    trace_debug!(options = ?global_options(), "global options installed");
    Ok(())
}

/// The global options, falling back to defaults when none were installed.
pub fn global_options() -> &'static GlobalOptions {
    GLOBAL.get_or_init(GlobalOptions::default)
}
