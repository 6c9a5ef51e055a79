//! The bloglist scenario suite
//!
//! Each scenario starts from a freshly reset backend with the root user
//! registered and a page opened on the frontend; see
//! [`crate::runner::ScenarioRunner`].

use std::fmt;

use bloglist_common::{ordered_by_likes, NewBlog, UserProfile};

use crate::config::E2eConfig;
use crate::error::{E2eError, E2eResult};
use crate::fixture::FixtureClient;
use crate::helpers::{like_count_is, session_indicator, BlogApp};
use crate::locator::{Expectation, Locator};

/// Everything a scenario body can touch
pub struct ScenarioContext<'a> {
    pub app: BlogApp,
    pub fixtures: &'a FixtureClient,
    pub config: &'a E2eConfig,
}

impl ScenarioContext<'_> {
    fn root(&self) -> &UserProfile {
        &self.config.root_user
    }

    async fn login_root(&mut self) -> E2eResult<()> {
        let credentials = self.config.root_user.credentials();
        self.app.login_if_needed(&credentials).await?;
        let banner = logged_in_banner(self.root());
        self.app.expect_visible_text(&banner).await
    }

    async fn login_as(&mut self, user: &UserProfile) -> E2eResult<()> {
        self.app.login(&user.username, &user.password).await?;
        self.app.expect_visible_text(&logged_in_banner(user)).await
    }
}

fn logged_in_banner(user: &UserProfile) -> String {
    format!("{} logged in", user.name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    LoginFormIsShown,
    LoginSucceeds,
    LoginFailsWithWrongCredentials,
    BlogCanBeCreated,
    BlogCanBeLiked,
    LikesCountedPerClick,
    OwnerCanDeleteBlog,
    OthersCannotDeleteBlog,
    OnlyCreatorSeesRemove,
    BlogsOrderedByLikes,
}

impl Scenario {
    pub const ALL: [Scenario; 10] = [
        Scenario::LoginFormIsShown,
        Scenario::LoginSucceeds,
        Scenario::LoginFailsWithWrongCredentials,
        Scenario::BlogCanBeCreated,
        Scenario::BlogCanBeLiked,
        Scenario::LikesCountedPerClick,
        Scenario::OwnerCanDeleteBlog,
        Scenario::OthersCannotDeleteBlog,
        Scenario::OnlyCreatorSeesRemove,
        Scenario::BlogsOrderedByLikes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::LoginFormIsShown => "login-form-is-shown",
            Scenario::LoginSucceeds => "login-succeeds",
            Scenario::LoginFailsWithWrongCredentials => "login-fails-with-wrong-credentials",
            Scenario::BlogCanBeCreated => "blog-can-be-created",
            Scenario::BlogCanBeLiked => "blog-can-be-liked",
            Scenario::LikesCountedPerClick => "likes-counted-per-click",
            Scenario::OwnerCanDeleteBlog => "owner-can-delete-blog",
            Scenario::OthersCannotDeleteBlog => "others-cannot-delete-blog",
            Scenario::OnlyCreatorSeesRemove => "only-creator-sees-remove",
            Scenario::BlogsOrderedByLikes => "blogs-ordered-by-likes",
        }
    }

    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            Scenario::LoginFormIsShown => &["login", "smoke"],
            Scenario::LoginSucceeds | Scenario::LoginFailsWithWrongCredentials => &["login"],
            Scenario::BlogCanBeCreated => &["blogs", "smoke"],
            Scenario::BlogCanBeLiked | Scenario::LikesCountedPerClick => &["blogs", "likes"],
            Scenario::OwnerCanDeleteBlog
            | Scenario::OthersCannotDeleteBlog
            | Scenario::OnlyCreatorSeesRemove => &["blogs", "delete"],
            Scenario::BlogsOrderedByLikes => &["blogs", "likes", "ordering"],
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(&tag)
    }

    pub fn by_name(name: &str) -> Option<Scenario> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub async fn run(&self, ctx: &mut ScenarioContext<'_>) -> E2eResult<()> {
        match self {
            Scenario::LoginFormIsShown => login_form_is_shown(ctx).await,
            Scenario::LoginSucceeds => login_succeeds(ctx).await,
            Scenario::LoginFailsWithWrongCredentials => login_fails(ctx).await,
            Scenario::BlogCanBeCreated => blog_can_be_created(ctx).await,
            Scenario::BlogCanBeLiked => blog_can_be_liked(ctx).await,
            Scenario::LikesCountedPerClick => likes_counted_per_click(ctx).await,
            Scenario::OwnerCanDeleteBlog => owner_can_delete_blog(ctx).await,
            Scenario::OthersCannotDeleteBlog => others_cannot_delete_blog(ctx).await,
            Scenario::OnlyCreatorSeesRemove => only_creator_sees_remove(ctx).await,
            Scenario::BlogsOrderedByLikes => blogs_ordered_by_likes(ctx).await,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

async fn login_form_is_shown(ctx: &mut ScenarioContext<'_>) -> E2eResult<()> {
    ctx.app.page().click(&Locator::button("login")).await?;
    ctx.app.expect_visible_text("Log in to application").await
}

async fn login_succeeds(ctx: &mut ScenarioContext<'_>) -> E2eResult<()> {
    let root = ctx.root().clone();
    ctx.login_as(&root).await
}

async fn login_fails(ctx: &mut ScenarioContext<'_>) -> E2eResult<()> {
    let username = ctx.root().username.clone();
    ctx.app.attempt_login(&username, "wrong").await?;
    ctx.app.expect_visible_text("wrong username or password").await?;
    ctx.app.expect(&session_indicator(), Expectation::Hidden).await
}

async fn blog_can_be_created(ctx: &mut ScenarioContext<'_>) -> E2eResult<()> {
    ctx.login_root().await?;
    ctx.app
        .create_blog("Testing with Playwright", "Playwright Author", "http://playwright.dev")
        .await?;
    ctx.app
        .expect_visible_text("Testing with Playwright Playwright Author")
        .await
}

async fn blog_can_be_liked(ctx: &mut ScenarioContext<'_>) -> E2eResult<()> {
    ctx.login_root().await?;
    let id = ctx
        .app
        .create_blog("Liking blogs", "Like Author", "http://like.dev")
        .await?;
    ctx.app.open_blog(&id).await?;
    ctx.app.like_blog(&id, 1).await?;
    ctx.app.expect_visible_text("likes 1").await
}

async fn likes_counted_per_click(ctx: &mut ScenarioContext<'_>) -> E2eResult<()> {
    ctx.login_root().await?;
    let id = ctx
        .app
        .create_blog("Counting likes", "Count Author", "http://count.dev")
        .await?;
    ctx.app.open_blog(&id).await?;
    // Opening twice must not collapse the row again.
    ctx.app.open_blog(&id).await?;

    let total = ctx.app.like_blog(&id, 3).await?;
    if total != 3 {
        return Err(E2eError::AssertionFailed(format!(
            "expected 3 likes, counter shows {}",
            total
        )));
    }
    ctx.app
        .expect(&Locator::test_id(id.likes_test_id()), like_count_is(3))
        .await
}

async fn owner_can_delete_blog(ctx: &mut ScenarioContext<'_>) -> E2eResult<()> {
    ctx.login_root().await?;
    let id = ctx
        .app
        .create_blog("Deleting blogs", "Delete Author", "http://delete.dev")
        .await?;
    ctx.app.open_blog(&id).await?;
    ctx.app.remove_blog(&id, "Deleting blogs Delete Author").await?;

    let remaining = ctx.fixtures.list_blogs().await?;
    if remaining.iter().any(|b| b.id == id) {
        return Err(E2eError::AssertionFailed(format!(
            "blog {} still returned by the API after removal",
            id
        )));
    }
    Ok(())
}

/// Create a blog as root, then view it as `other`
async fn view_as_other_user(
    ctx: &mut ScenarioContext<'_>,
    blog: &NewBlog,
    other: &UserProfile,
) -> E2eResult<bloglist_common::BlogId> {
    ctx.login_root().await?;
    let id = ctx.app.create_blog(&blog.title, &blog.author, &blog.url).await?;
    ctx.app.logout().await?;

    ctx.fixtures
        .register_user(other)
        .await
        .map_err(|e| E2eError::setup(format!("register {}", other.username), e))?;
    ctx.login_as(other).await?;

    ctx.app.open_blog(&id).await?;
    ctx.app
        .expect(
            &Locator::button("remove").within(ctx.app.blog_row(&id)),
            Expectation::Hidden,
        )
        .await?;
    if ctx.app.can_remove(&id).await? {
        return Err(E2eError::AssertionFailed(format!(
            "{} was offered removal of a blog they do not own",
            other.username
        )));
    }
    Ok(id)
}

async fn others_cannot_delete_blog(ctx: &mut ScenarioContext<'_>) -> E2eResult<()> {
    let blog = NewBlog::new("Other users blog", "Other Author", "http://other.dev");
    let other = UserProfile::new("Second User", "seconduser", "password123");
    view_as_other_user(ctx, &blog, &other).await?;
    Ok(())
}

async fn only_creator_sees_remove(ctx: &mut ScenarioContext<'_>) -> E2eResult<()> {
    let blog = NewBlog::new(
        "Visibility of delete button",
        "Visibility Author",
        "http://visibility.dev",
    );
    let other = UserProfile::new("Third User", "thirduser", "password456");
    let id = view_as_other_user(ctx, &blog, &other).await?;

    ctx.app.logout().await?;
    let root = ctx.root().clone();
    ctx.login_as(&root).await?;
    ctx.app.open_blog(&id).await?;
    ctx.app
        .expect(
            &Locator::button("remove").within(ctx.app.blog_row(&id)),
            Expectation::Visible,
        )
        .await
}

async fn blogs_ordered_by_likes(ctx: &mut ScenarioContext<'_>) -> E2eResult<()> {
    let session = ctx
        .fixtures
        .authenticate(&ctx.root().credentials())
        .await
        .map_err(|e| E2eError::setup("authenticate via API", e))?;
    let token = session.token.as_ref();

    let seeds = [
        NewBlog::new("First Blog", "Author One", "http://first.dev").with_likes(1),
        NewBlog::new("Second Blog", "Author Two", "http://second.dev").with_likes(2),
        NewBlog::new("Third Blog", "Author Three", "http://third.dev").with_likes(3),
    ];
    for blog in &seeds {
        ctx.fixtures
            .create_blog_with_attributes(blog, token)
            .await
            .map_err(|e| E2eError::setup(format!("seed {}", blog.title), e))?;
    }

    ctx.login_root().await?;
    ctx.app.reload().await?;

    let items = ctx.app.blog_items();
    for (index, title) in ["Third Blog", "Second Blog", "First Blog"].into_iter().enumerate() {
        ctx.app
            .expect(
                &items.clone().nth(index),
                Expectation::ContainsText(title.to_string()),
            )
            .await?;
    }

    ctx.app.open_all_blogs().await?;
    let counts = ctx.app.displayed_like_counts().await?;
    if counts != [3, 2, 1] || !ordered_by_likes(&counts) {
        return Err(E2eError::AssertionFailed(format!(
            "expected like counts [3, 2, 1], displayed {:?}",
            counts
        )));
    }
    Ok(())
}
