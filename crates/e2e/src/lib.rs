//! Bloglist E2E Test Framework
//!
//! This crate provides a Rust-controlled E2E testing framework that:
//! - Resets and seeds the bloglist backend through its REST API
//! - Controls Playwright via a long-lived Node bridge speaking line-delimited JSON
//! - Wraps common UI flows (login, creating, liking, removing blogs) in helpers
//! - Runs the scenario suite with a backend reset before every scenario
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  E2E Scenario Runner (Rust)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                             │
//! │    ├── setup()         reset + register root user           │
//! │    ├── new_page()      -> Box<dyn Page>                     │
//! │    └── run(Scenario)   -> TestResult                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BlogApp (helpers)          FixtureClient (reqwest)         │
//! │    ├── login / attempt_login  ├── reset_environment         │
//! │    ├── login_if_needed        ├── register_user             │
//! │    ├── create_blog -> BlogId  ├── authenticate -> Session   │
//! │    ├── open_blog / like_blog  └── create_blog_with_attrs    │
//! │    └── remove_blog                                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page trait ── PlaywrightPage ── node bridge.js ── browser  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod fixture;
pub mod helpers;
pub mod locator;
pub mod page;
pub mod playwright;
pub mod runner;
pub mod scenarios;
pub mod server;

pub use config::{E2eConfig, Timeouts};
pub use error::{E2eError, E2eResult, FailureKind};
pub use fixture::FixtureClient;
pub use helpers::{BlogApp, BlogState, SessionState};
pub use locator::{DialogKind, DialogPolicy, Expectation, Locator, ResponseMatcher, WaitState};
pub use page::{Page, PageFactory};
pub use runner::{Outcome, ScenarioRunner, SuiteResult, TestResult};
pub use scenarios::{Scenario, ScenarioContext};
