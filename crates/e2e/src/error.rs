//! Error types for E2E testing

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Application failed to start: {0}")]
    ServerStartup(String),

    #[error("Application health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npm install -D @playwright/test && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Bridge protocol error: {0}")]
    Bridge(String),

    #[error("Setup failed during {step}: {source}")]
    Setup {
        step: String,
        #[source]
        source: Box<E2eError>,
    },

    #[error("{endpoint} returned {status}: {message}")]
    Fixture {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Username already taken: {username}")]
    Conflict { username: String },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Unhandled {0} dialog")]
    UnhandledDialog(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    Data(#[from] bloglist_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

/// How a failed scenario is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Reset or fixture seeding failed before any assertion ran
    Setup,
    Timeout,
    Assertion,
    UnhandledDialog,
    Other,
}

impl E2eError {
    pub fn setup(step: impl Into<String>, source: E2eError) -> Self {
        E2eError::Setup {
            step: step.into(),
            source: Box::new(source),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            E2eError::Setup { .. } => FailureKind::Setup,
            E2eError::Timeout(_) => FailureKind::Timeout,
            E2eError::Http(e) if e.is_timeout() => FailureKind::Timeout,
            E2eError::AssertionFailed(_) => FailureKind::Assertion,
            E2eError::UnhandledDialog(_) => FailureKind::UnhandledDialog,
            _ => FailureKind::Other,
        }
    }
}
