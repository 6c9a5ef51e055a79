//! Application management - optionally launching the bloglist frontend and
//! backend, and waiting until both answer

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use bloglist_common::{DEFAULT_API_URL, DEFAULT_FRONTEND_URL};

use crate::config::duration_ms;
use crate::error::{E2eError, E2eResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
const STOP_GRACE: Duration = Duration::from_secs(2);

/// A process to start before the suite, e.g. `npm run start:test`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Where the application lives and how to bring it up
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub frontend_url: String,
    pub api_url: String,

    /// API path polled for readiness
    pub health_path: String,

    /// Processes to spawn; empty when the app is started externally
    pub launch: Vec<LaunchSpec>,

    #[serde(with = "duration_ms", rename = "startup_timeout_ms")]
    pub startup_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            health_path: "/api/blogs".to_string(),
            launch: Vec::new(),
            startup_timeout: Duration::from_secs(60),
        }
    }
}

/// Handle to the application processes this harness started
pub struct AppHandle {
    children: Vec<Child>,
    frontend_url: String,
    api_url: String,
}

impl AppHandle {
    /// Spawn the configured processes and wait for the app to be healthy
    pub async fn start(config: &AppConfig) -> E2eResult<Self> {
        let mut handle = AppHandle {
            children: Vec::new(),
            frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        };

        for spec in &config.launch {
            info!("Spawning {} {}", spec.program, spec.args.join(" "));

            let mut cmd = Command::new(&spec.program);
            cmd.args(&spec.args)
                .envs(&spec.env)
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            if let Some(cwd) = &spec.cwd {
                cmd.current_dir(cwd);
            }

            let child = cmd.spawn().map_err(|e| {
                E2eError::ServerStartup(format!("Failed to spawn {}: {}", spec.program, e))
            })?;
            handle.children.push(child);
        }

        let api_health = format!("{}{}", handle.api_url, config.health_path);
        handle.wait_for_healthy(&api_health, config.startup_timeout).await?;
        let frontend = handle.frontend_url.clone();
        handle.wait_for_healthy(&frontend, config.startup_timeout).await?;

        info!("Application is healthy at {}", handle.frontend_url);
        Ok(handle)
    }

    /// Poll `url` until it answers 2xx or `budget` runs out
    async fn wait_for_healthy(&self, url: &str, budget: Duration) -> E2eResult<()> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let deadline = Instant::now() + budget;
        let mut attempts = 0;

        info!("Waiting for {}", url);
        loop {
            attempts += 1;
            match client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("{} healthy after {} attempt(s)", url, attempts);
                    return Ok(());
                }
                Ok(resp) => warn!("{} answered {}", url, resp.status()),
                // Nothing listening yet.
                Err(e) if e.is_connect() => {}
                Err(e) => warn!("Health check of {} failed: {}", url, e),
            }

            if Instant::now() >= deadline {
                return Err(E2eError::ServerHealthCheck(attempts));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Send SIGTERM to every spawned process, then kill whatever is still
    /// running once the grace period is over
    pub fn stop(&mut self) -> E2eResult<()> {
        if self.children.is_empty() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            for child in &self.children {
                info!("Terminating application process {}", child.id());
                let _ = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM);
            }
        }

        let deadline = std::time::Instant::now() + STOP_GRACE;
        for mut child in self.children.drain(..) {
            while matches!(child.try_wait(), Ok(None)) && std::time::Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(50));
            }
            if let Ok(None) = child.try_wait() {
                warn!("Process {} outlived the grace period, killing it", child.id());
                let _ = child.kill();
            }
            let _ = child.wait();
        }
        Ok(())
    }
}

impl Drop for AppHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
