//! Interception configuration

use crate::error::{NavKitError, NavKitResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment switch that disables all external launch requests.
pub const ENV_DISABLE_EXTERNAL_REQUESTS: &str = "NAVKIT_DISABLE_EXTERNAL_REQUESTS";

/// Environment switch for the form-redirect gesture requirement.
pub const ENV_BLOCK_FORM_REDIRECTS_WITHOUT_GESTURE: &str =
    "NAVKIT_BLOCK_FORM_REDIRECTS_WITHOUT_GESTURE";

/// Configuration of the navigation interception engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// Package identity of the embedding application itself
    pub application_package: String,

    /// Private storage of the embedder; file URLs below it need no grant
    pub private_data_dir: PathBuf,

    /// Disable external launch requests entirely
    pub disable_external_requests: bool,

    /// Refuse form-submit redirects to external handlers without a user gesture
    pub block_form_redirects_without_gesture: bool,

    /// The embedder launches instant apps itself, so the instant-app
    /// resolver never counts as a specialized handler
    pub handles_instant_apps_internally: bool,

    /// Close the originating surface after a confirmed private-mode launch
    pub close_surface_on_incognito_launch: bool,

    /// Only act on navigations while the embedding application is in the
    /// foreground
    pub application_must_be_in_foreground: bool,

    /// Package of the application marketplace
    pub market_package: String,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            application_package: "org.navkit.browser".to_string(),
            private_data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("navkit"),
            disable_external_requests: false,
            block_form_redirects_without_gesture: false,
            handles_instant_apps_internally: false,
            close_surface_on_incognito_launch: true,
            application_must_be_in_foreground: true,
            market_package: "com.android.vending".to_string(),
        }
    }
}

impl InterceptConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> NavKitResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> NavKitResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading intercept config");
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Apply the runtime switches from the process environment.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(value) = env_flag(ENV_DISABLE_EXTERNAL_REQUESTS) {
            self.disable_external_requests = value;
        }
        if let Some(value) = env_flag(ENV_BLOCK_FORM_REDIRECTS_WITHOUT_GESTURE) {
            self.block_form_redirects_without_gesture = value;
        }
        self
    }

    /// URL prefix of the private data directory (`file://<dir>`).
    pub fn private_data_url_prefix(&self) -> String {
        format!("file://{}", self.private_data_dir.display())
    }

    fn validate(&self) -> NavKitResult<()> {
        if self.application_package.trim().is_empty() {
            return Err(NavKitError::config("application_package must not be empty"));
        }
        if self.market_package.trim().is_empty() {
            return Err(NavKitError::config("market_package must not be empty"));
        }
        Ok(())
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        other => {
            warn!(switch = name, value = other, "Ignoring unrecognized switch value");
            None
        }
    }
}
