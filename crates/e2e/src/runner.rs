//! Scenario runner: per-scenario reset, page lifecycle and reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::config::E2eConfig;
use crate::error::{E2eError, E2eResult, FailureKind};
use crate::fixture::FixtureClient;
use crate::helpers::BlogApp;
use crate::page::PageFactory;
use crate::scenarios::{Scenario, ScenarioContext};

/// Outcome of a single scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { kind: FailureKind, message: String },
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            Outcome::Passed => None,
            Outcome::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs scenarios one at a time against a shared application.
///
/// The backend is reset before every scenario; scenarios never run
/// concurrently because they share that backend.
pub struct ScenarioRunner {
    config: E2eConfig,
    fixtures: FixtureClient,
    pages: Arc<dyn PageFactory>,
}

impl ScenarioRunner {
    pub fn new(config: E2eConfig, fixtures: FixtureClient, pages: Arc<dyn PageFactory>) -> Self {
        Self {
            config,
            fixtures,
            pages,
        }
    }

    pub fn config(&self) -> &E2eConfig {
        &self.config
    }

    /// Run the whole suite
    pub async fn run_all(&self) -> SuiteResult {
        self.run_scenarios(&Scenario::ALL).await
    }

    /// Run scenarios carrying `tag`
    pub async fn run_tagged(&self, tag: &str) -> SuiteResult {
        let selected: Vec<Scenario> = Scenario::ALL
            .into_iter()
            .filter(|s| s.has_tag(tag))
            .collect();
        self.run_scenarios(&selected).await
    }

    /// Run a specific scenario by name
    pub async fn run_named(&self, name: &str) -> E2eResult<SuiteResult> {
        let scenario = Scenario::by_name(name)
            .ok_or_else(|| E2eError::Config(format!("Scenario not found: {}", name)))?;
        Ok(self.run_scenarios(&[scenario]).await)
    }

    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::with_capacity(scenarios.len());

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            let result = self.run_scenario(*scenario).await;
            match &result.outcome {
                Outcome::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
                Outcome::Failed { kind, message } => {
                    error!("✗ {} [{:?}] - {}", result.name, kind, message)
                }
            }
            results.push(result);
        }

        let passed = results.iter().filter(|r| r.passed()).count();
        let failed = results.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        SuiteResult {
            total: scenarios.len(),
            passed,
            failed,
            skipped: 0,
            started_at,
            duration_ms,
            results,
        }
    }

    /// Run one scenario, never propagating its failure
    pub async fn run_scenario(&self, scenario: Scenario) -> TestResult {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario);

        let result = match self.setup().await {
            Ok(()) => self.execute(scenario).await,
            Err(e) => Err(e),
        };

        TestResult {
            name: scenario.name().to_string(),
            outcome: match result {
                Ok(()) => Outcome::Passed,
                Err(e) => Outcome::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                },
            },
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Reset the backend and register the root user
    async fn setup(&self) -> E2eResult<()> {
        self.fixtures
            .reset_environment()
            .await
            .map_err(|e| E2eError::setup("reset", e))?;

        let root = &self.config.root_user;
        self.fixtures
            .register_user(root)
            .await
            .map_err(|e| E2eError::setup(format!("register {}", root.username), e))
    }

    async fn execute(&self, scenario: Scenario) -> E2eResult<()> {
        let page = self.pages.new_page().await?;
        let app = BlogApp::new(page, self.config.timeouts);

        if let Err(e) = app.open(&self.config.app.frontend_url).await {
            let _ = app.close().await;
            return Err(e);
        }

        let mut ctx = ScenarioContext {
            app,
            fixtures: &self.fixtures,
            config: &self.config,
        };
        let result = scenario.run(&mut ctx).await;

        if let Err(e) = ctx.app.close().await {
            debug!("Closing page after {} failed: {}", scenario, e);
        }
        result
    }

    /// Write results to `test-results.json` in the output directory
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }

    /// Fail fast when the API is not reachable at all
    pub async fn preflight(&self) -> E2eResult<()> {
        if self.fixtures.is_healthy(&self.config.app.health_path).await {
            Ok(())
        } else {
            Err(E2eError::setup(
                "preflight",
                E2eError::ServerStartup(format!("{} is not answering", self.fixtures.api_url())),
            ))
        }
    }
}
