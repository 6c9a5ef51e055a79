//! E2E harness entry point
//!
//! Runs the bloglist scenario suite in a real browser.
//! Run with: cargo run --package bloglist-e2e -- --project-dir ../bloglist-frontend

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bloglist_e2e::playwright::{Browser, PlaywrightBrowser};
use bloglist_e2e::server::AppHandle;
use bloglist_e2e::{E2eConfig, FixtureClient, ScenarioRunner};

#[derive(Parser, Debug)]
#[command(name = "bloglist-e2e")]
#[command(about = "End-to-end scenarios for the bloglist application")]
#[command(version)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, default_value = "e2e.yaml")]
    config: PathBuf,

    /// Run only scenarios carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific scenario by name
    #[arg(short, long)]
    name: Option<String>,

    /// List scenarios and exit
    #[arg(long)]
    list: bool,

    /// Frontend URL
    #[arg(long, env = "BLOGLIST_FRONTEND_URL")]
    frontend_url: Option<String>,

    /// Backend API URL
    #[arg(long, env = "BLOGLIST_API_URL")]
    api_url: Option<String>,

    /// Directory whose node_modules provides @playwright/test
    #[arg(long, env = "BLOGLIST_PLAYWRIGHT_DIR")]
    project_dir: Option<PathBuf>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, env = "BLOGLIST_BROWSER")]
    browser: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn apply_overrides(config: &mut E2eConfig, args: &Args) -> anyhow::Result<()> {
    if let Some(url) = &args.frontend_url {
        config.app.frontend_url = url.clone();
    }
    if let Some(url) = &args.api_url {
        config.app.api_url = url.clone();
    }
    if let Some(dir) = &args.project_dir {
        config.playwright.project_dir = dir.clone();
    }
    if let Some(browser) = &args.browser {
        config.playwright.browser = browser.parse::<Browser>()?;
    }
    if args.headed {
        config.playwright.headless = false;
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    config.validate()?;
    Ok(())
}

async fn async_main(args: Args) -> anyhow::Result<bool> {
    if args.list {
        for scenario in bloglist_e2e::Scenario::ALL {
            println!("{:<40} {}", scenario.name(), scenario.tags().join(","));
        }
        return Ok(true);
    }

    let mut config = E2eConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    apply_overrides(&mut config, &args)?;

    let _app = AppHandle::start(&config.app)
        .await
        .context("application did not become healthy")?;

    let fixtures = FixtureClient::new(config.app.api_url.clone(), config.timeouts.response)?;
    let browser = Arc::new(
        PlaywrightBrowser::launch(config.playwright.clone(), config.timeouts)
            .await
            .context("launching browser")?,
    );

    let runner = ScenarioRunner::new(config, fixtures, browser.clone());
    runner.preflight().await?;

    let results = if let Some(name) = &args.name {
        runner.run_named(name).await?
    } else if let Some(tag) = &args.tag {
        runner.run_tagged(tag).await
    } else {
        runner.run_all().await
    };

    runner.write_results(&results)?;
    drop(runner);

    if let Ok(browser) = Arc::try_unwrap(browser) {
        browser.close().await?;
    }

    info!("{} of {} scenario(s) passed", results.passed, results.total);
    Ok(results.success())
}
