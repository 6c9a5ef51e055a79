//! Harness configuration
//!
//! Defaults target the development setup (frontend on :3000, API on :3003).
//! A YAML file may override any subset; command-line flags override both.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bloglist_common::UserProfile;

use crate::error::{E2eError, E2eResult};
use crate::playwright::PlaywrightConfig;
use crate::server::AppConfig;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct E2eConfig {
    /// Application under test
    pub app: AppConfig,

    /// Browser settings
    pub playwright: PlaywrightConfig,

    /// Wait bounds
    pub timeouts: Timeouts,

    /// User registered after every reset
    pub root_user: UserProfile,

    /// Where `test-results.json` is written
    pub output_dir: PathBuf,
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            playwright: PlaywrightConfig::default(),
            timeouts: Timeouts::default(),
            root_user: UserProfile::root(),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl E2eConfig {
    /// Load configuration from a YAML file, falling back to defaults when
    /// the file does not exist
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_yaml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> E2eResult<()> {
        for (field, url) in [
            ("app.frontend_url", &self.app.frontend_url),
            ("app.api_url", &self.app.api_url),
        ] {
            reqwest::Url::parse(url)
                .map_err(|e| E2eError::Config(format!("{}: {} ({})", field, url, e)))?;
        }
        if self.timeouts.action.is_zero() || self.timeouts.response.is_zero() {
            return Err(E2eError::Config("timeouts must be non-zero".to_string()));
        }
        if self.root_user.username.is_empty() {
            return Err(E2eError::Config("root_user.username must be set".to_string()));
        }
        Ok(())
    }
}

/// Upper bounds for every suspension point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Element visibility, text and click waits
    #[serde(with = "duration_ms", rename = "action_ms")]
    pub action: Duration,

    /// Page loads
    #[serde(with = "duration_ms", rename = "navigation_ms")]
    pub navigation: Duration,

    /// Network responses awaited after an action
    #[serde(with = "duration_ms", rename = "response_ms")]
    pub response: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            action: Duration::from_secs(5),
            navigation: Duration::from_secs(30),
            response: Duration::from_secs(10),
        }
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
