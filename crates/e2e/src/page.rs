//! Browser page abstraction
//!
//! `Page` is the seam between the interaction helpers and the engine that
//! drives the browser. The production implementation is
//! [`crate::playwright::PlaywrightPage`].

use async_trait::async_trait;
use std::time::Duration;

use crate::error::E2eResult;
use crate::locator::{DialogPolicy, Expectation, Locator, ResponseMatcher, WaitState};

/// A single browser tab in its own context
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to an absolute URL
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn reload(&self) -> E2eResult<()>;

    /// Click the element, waiting for it to be actionable
    async fn click(&self, locator: &Locator) -> E2eResult<()>;

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()>;

    /// Visibility right now, without waiting
    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool>;

    async fn count(&self, locator: &Locator) -> E2eResult<usize>;

    /// Inner text of every match, in document order
    async fn inner_texts(&self, locator: &Locator) -> E2eResult<Vec<String>>;

    /// Wait for the element to reach `state`.
    ///
    /// Running out of time is an [`E2eError::Timeout`](crate::E2eError::Timeout),
    /// not an assertion failure.
    async fn wait_for(
        &self,
        locator: &Locator,
        state: WaitState,
        timeout: Duration,
    ) -> E2eResult<()>;

    /// Wait until `expectation` holds or fail after `timeout`
    async fn expect(
        &self,
        locator: &Locator,
        expectation: &Expectation,
        timeout: Duration,
    ) -> E2eResult<()>;

    /// Click and resolve with the JSON body of the first response matching
    /// `matcher`. The response listener is armed before the click.
    async fn click_and_wait_for_response(
        &self,
        locator: &Locator,
        matcher: &ResponseMatcher,
        timeout: Duration,
    ) -> E2eResult<serde_json::Value>;

    async fn set_dialog_policy(&self, policy: DialogPolicy) -> E2eResult<()>;

    /// Close the page and its context
    async fn close(&self) -> E2eResult<()>;
}

/// Hands out fresh, isolated pages
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn new_page(&self) -> E2eResult<Box<dyn Page>>;
}
