//! Page interaction primitives for the bloglist frontend
//!
//! `BlogApp` wraps a [`Page`] with the named operations scenarios are built
//! from. Every operation that triggers a network call suspends on either a
//! matched response or an engine-side expectation, bounded by the
//! configured timeouts.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use bloglist_common::{Blog, BlogId, Credentials, Session};

use crate::config::Timeouts;
use crate::error::{E2eError, E2eResult};
use crate::locator::{
    DialogKind, DialogPolicy, Expectation, Locator, ResponseMatcher, WaitState,
};
use crate::page::Page;

static LIKES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"likes\s+(\d+)").expect("valid regex"));

/// Whether the frontend currently shows an authenticated session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedIn,
    LoggedOut,
}

/// Visible state of a single blog row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlogState {
    Collapsed,
    Expanded,
    Deleted,
}

/// Control whose presence denotes an authenticated session
pub fn session_indicator() -> Locator {
    Locator::button("logout")
}

/// Extract the like count from text such as `likes 3 like`
pub fn parse_like_count(text: &str) -> Option<u64> {
    LIKES_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Counter text showing exactly `count` likes; `likes 1` must not match
/// `likes 12`
pub fn like_count_is(count: u64) -> Expectation {
    Expectation::MatchesText(format!(r"\blikes\s+{}\b", count))
}

/// The bloglist frontend, driven through one page
pub struct BlogApp {
    page: Box<dyn Page>,
    timeouts: Timeouts,
    session: Option<Session>,
}

impl BlogApp {
    pub fn new(page: Box<dyn Page>, timeouts: Timeouts) -> Self {
        Self {
            page,
            timeouts,
            session: None,
        }
    }

    pub fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Session established by the last successful login, if any
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub async fn open(&self, url: &str) -> E2eResult<()> {
        debug!("Opening {}", url);
        self.page.goto(url).await
    }

    pub async fn reload(&self) -> E2eResult<()> {
        self.page.reload().await
    }

    pub async fn session_state(&self) -> E2eResult<SessionState> {
        if self.page.is_visible(&session_indicator()).await? {
            Ok(SessionState::LoggedIn)
        } else {
            Ok(SessionState::LoggedOut)
        }
    }

    async fn submit_login(&self, username: &str, password: &str) -> E2eResult<()> {
        self.page.click(&Locator::button("login")).await?;
        self.page.fill(&Locator::label("username"), username).await?;
        self.page.fill(&Locator::label("password"), password).await?;
        self.page.click(&Locator::button("login")).await
    }

    /// Log in through the form and wait for the session indicator.
    ///
    /// An indicator that never shows up is a timeout.
    pub async fn login(&mut self, username: &str, password: &str) -> E2eResult<Session> {
        info!("Logging in as {}", username);
        self.submit_login(username, password).await?;
        self.page
            .wait_for(&session_indicator(), WaitState::Visible, self.timeouts.action)
            .await?;

        let session = Session::ui(username);
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Submit the login form without waiting for success
    pub async fn attempt_login(&mut self, username: &str, password: &str) -> E2eResult<()> {
        debug!("Attempting login as {}", username);
        self.submit_login(username, password).await
    }

    /// Log in unless a session is already active
    pub async fn login_if_needed(&mut self, credentials: &Credentials) -> E2eResult<Session> {
        match self.session_state().await? {
            SessionState::LoggedIn => {
                debug!("Already logged in, skipping login");
                let session = self
                    .session
                    .clone()
                    .unwrap_or_else(|| Session::ui(credentials.username.clone()));
                self.session = Some(session.clone());
                Ok(session)
            }
            SessionState::LoggedOut => {
                self.login(&credentials.username, &credentials.password).await
            }
        }
    }

    pub async fn logout(&mut self) -> E2eResult<()> {
        self.page.click(&session_indicator()).await?;
        self.page
            .wait_for(&Locator::button("login"), WaitState::Visible, self.timeouts.action)
            .await?;
        self.session = None;
        Ok(())
    }

    /// Create a blog through the form and return the id from the API response.
    ///
    /// Returns only once the new blog's heading is visible in the list.
    pub async fn create_blog(&self, title: &str, author: &str, url: &str) -> E2eResult<BlogId> {
        info!("Creating blog \"{}\"", title);
        self.page.click(&Locator::button("new blog")).await?;
        self.page.fill(&Locator::label("title:"), title).await?;
        self.page.fill(&Locator::label("author:"), author).await?;
        self.page.fill(&Locator::label("url:"), url).await?;

        let body = self
            .page
            .click_and_wait_for_response(
                &Locator::button("create"),
                &ResponseMatcher::post("/api/blogs"),
                self.timeouts.response,
            )
            .await?;
        let blog: Blog = serde_json::from_value(body)?;

        self.expect_visible_text(&blog.heading()).await?;
        debug!("Blog \"{}\" has id {}", title, blog.id);
        Ok(blog.id)
    }

    pub fn blog_row(&self, id: &BlogId) -> Locator {
        Locator::test_id(id.test_id())
    }

    /// `blog` items containing `title`
    pub fn blog_by_title(&self, title: &str) -> Locator {
        Locator::test_id("blog").filter_text(title)
    }

    /// Every rendered blog item, in display order
    pub fn blog_items(&self) -> Locator {
        Locator::test_id("blog")
    }

    pub async fn blog_state(&self, id: &BlogId) -> E2eResult<BlogState> {
        let row = self.blog_row(id);
        if self.page.count(&row).await? == 0 {
            return Ok(BlogState::Deleted);
        }
        if self.page.is_visible(&Locator::button("view").within(row)).await? {
            Ok(BlogState::Collapsed)
        } else {
            Ok(BlogState::Expanded)
        }
    }

    /// Expand the blog row; a row that is already expanded is left alone
    pub async fn open_blog(&self, id: &BlogId) -> E2eResult<()> {
        match self.blog_state(id).await? {
            BlogState::Collapsed => {
                self.page
                    .click(&Locator::button("view").within(self.blog_row(id)))
                    .await
            }
            BlogState::Expanded => Ok(()),
            BlogState::Deleted => Err(E2eError::AssertionFailed(format!(
                "blog {} is not displayed",
                id
            ))),
        }
    }

    /// Click like `times` times, checking the counter after every click.
    ///
    /// Returns the final count.
    pub async fn like_blog(&self, id: &BlogId, times: u64) -> E2eResult<u64> {
        let counter = Locator::test_id(id.likes_test_id());
        let start = match self.page.inner_texts(&counter).await?.first() {
            Some(text) => parse_like_count(text).unwrap_or(0),
            None => 0,
        };

        let like = Locator::test_id(id.like_test_id());
        let mut total = start;
        for _ in 0..times {
            self.page.click(&like).await?;
            total += 1;
            self.page
                .expect(&counter, &like_count_is(total), self.timeouts.action)
                .await?;
        }
        debug!("Blog {} now has {} likes", id, total);
        Ok(total)
    }

    /// Whether the current session is offered the remove control
    pub async fn can_remove(&self, id: &BlogId) -> E2eResult<bool> {
        self.page
            .is_visible(&Locator::button("remove").within(self.blog_row(id)))
            .await
    }

    /// Remove an expanded blog, accepting the confirmation dialog
    pub async fn remove_blog(&self, id: &BlogId, heading: &str) -> E2eResult<()> {
        info!("Removing blog {}", id);
        self.page
            .set_dialog_policy(DialogPolicy::Accept {
                expect: Some(DialogKind::Confirm),
            })
            .await?;

        let result = async {
            self.page
                .click(&Locator::button("remove").within(self.blog_row(id)))
                .await?;
            self.expect_hidden_text(heading).await
        }
        .await;

        let restored = self.page.set_dialog_policy(DialogPolicy::Unset).await;
        match (result, restored) {
            (Err(e), Err(restore)) => {
                warn!("Restoring dialog policy after failed removal: {}", restore);
                Err(e)
            }
            (result, restored) => result.and(restored),
        }
    }

    /// Like counts parsed from every expanded blog item, in display order
    pub async fn displayed_like_counts(&self) -> E2eResult<Vec<u64>> {
        let texts = self.page.inner_texts(&self.blog_items()).await?;
        Ok(texts.iter().filter_map(|t| parse_like_count(t)).collect())
    }

    /// Expand every displayed blog
    pub async fn open_all_blogs(&self) -> E2eResult<()> {
        let view = Locator::button("view").within(self.blog_items());
        let collapsed = self.page.count(&view).await?;
        for _ in 0..collapsed {
            self.page.click(&view.clone().first()).await?;
        }
        Ok(())
    }

    pub async fn expect_visible_text(&self, text: &str) -> E2eResult<()> {
        self.page
            .expect(&Locator::text(text), &Expectation::Visible, self.timeouts.action)
            .await
    }

    pub async fn expect_hidden_text(&self, text: &str) -> E2eResult<()> {
        self.page
            .expect(&Locator::text(text), &Expectation::Hidden, self.timeouts.action)
            .await
    }

    pub async fn expect(&self, locator: &Locator, expectation: Expectation) -> E2eResult<()> {
        self.page.expect(locator, &expectation, self.timeouts.action).await
    }

    /// Close the underlying page
    pub async fn close(self) -> E2eResult<()> {
        self.page.close().await
    }
}
