//! Interaction helpers against the fake frontend

mod common;

use bloglist_common::{Credentials, NewBlog, UserProfile};
use bloglist_e2e::{
    BlogApp, BlogState, E2eError, Expectation, FailureKind, Locator, SessionState, Timeouts,
};
use common::{Faults, TestEnv, FRONTEND_URL};

async fn app(env: &TestEnv) -> BlogApp {
    app_with(env, Faults::default()).await
}

async fn app_with(env: &TestEnv, faults: Faults) -> BlogApp {
    let app = BlogApp::new(env.page_with(faults), Timeouts::default());
    app.open(FRONTEND_URL).await.unwrap();
    app
}

async fn logged_in(env: &TestEnv) -> BlogApp {
    logged_in_with(env, Faults::default()).await
}

async fn logged_in_with(env: &TestEnv, faults: Faults) -> BlogApp {
    let mut app = app_with(env, faults).await;
    app.login("mluukkai", "salainen").await.unwrap();
    app
}

#[tokio::test]
async fn login_establishes_session() {
    let env = TestEnv::seeded().await;
    let mut app = app(&env).await;
    assert_eq!(app.session_state().await.unwrap(), SessionState::LoggedOut);

    let session = app.login("mluukkai", "salainen").await.unwrap();

    assert_eq!(session.username, "mluukkai");
    assert!(session.token.is_none());
    assert_eq!(app.session_state().await.unwrap(), SessionState::LoggedIn);
    app.expect_visible_text("Matti Luukkainen logged in").await.unwrap();
}

#[tokio::test]
async fn login_with_wrong_password_times_out_waiting_for_session() {
    let env = TestEnv::seeded().await;
    let mut app = app(&env).await;

    let err = app.login("mluukkai", "wrong").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Timeout);
    assert!(matches!(err, E2eError::Timeout(_)), "got {}", err);
    assert!(app.session().is_none());
}

#[tokio::test]
async fn attempt_login_does_not_wait_for_success() {
    let env = TestEnv::seeded().await;
    let mut app = app(&env).await;

    app.attempt_login("mluukkai", "wrong").await.unwrap();

    app.expect_visible_text("wrong username or password").await.unwrap();
    assert_eq!(app.session_state().await.unwrap(), SessionState::LoggedOut);
}

#[tokio::test]
async fn login_if_needed_short_circuits_when_logged_in() {
    let env = TestEnv::seeded().await;
    let mut app = app(&env).await;
    let credentials = Credentials::new("mluukkai", "salainen");

    let first = app.login_if_needed(&credentials).await.unwrap();
    // A second full login would fail: the login button is gone.
    let second = app.login_if_needed(&credentials).await.unwrap();

    assert_eq!(first, second);
    assert!(app.login("mluukkai", "salainen").await.is_err());
}

#[tokio::test]
async fn logout_clears_session() {
    let env = TestEnv::seeded().await;
    let mut app = logged_in(&env).await;

    app.logout().await.unwrap();

    assert!(app.session().is_none());
    assert_eq!(app.session_state().await.unwrap(), SessionState::LoggedOut);
}

#[tokio::test]
async fn create_blog_returns_id_from_response() {
    let env = TestEnv::seeded().await;
    let app = logged_in(&env).await;

    let id = app
        .create_blog("Testing with Playwright", "Playwright Author", "http://playwright.dev")
        .await
        .unwrap();

    let stored = env.store.blog(&id).expect("blog stored");
    assert_eq!(stored.title, "Testing with Playwright");
    assert_eq!(app.blog_state(&id).await.unwrap(), BlogState::Collapsed);
    assert_eq!(app.page().count(&app.blog_by_title("Testing with Playwright")).await.unwrap(), 1);
}

#[tokio::test]
async fn create_blog_without_title_fails() {
    let env = TestEnv::seeded().await;
    let app = logged_in(&env).await;

    let err = app.create_blog("", "Nobody", "http://nowhere.dev").await.unwrap_err();

    assert!(matches!(err, E2eError::Playwright(_)), "got {}", err);
    assert!(env.store.blogs().is_empty());
}

#[tokio::test]
async fn open_blog_is_idempotent() {
    let env = TestEnv::seeded().await;
    let app = logged_in(&env).await;
    let id = app.create_blog("Open me", "Author", "http://open.dev").await.unwrap();

    app.open_blog(&id).await.unwrap();
    app.open_blog(&id).await.unwrap();

    assert_eq!(app.blog_state(&id).await.unwrap(), BlogState::Expanded);
}

#[tokio::test]
async fn like_blog_counts_each_click() {
    let env = TestEnv::seeded().await;
    let app = logged_in(&env).await;
    let id = app.create_blog("Liking blogs", "Like Author", "http://like.dev").await.unwrap();
    app.open_blog(&id).await.unwrap();

    assert_eq!(app.like_blog(&id, 0).await.unwrap(), 0);
    assert_eq!(app.like_blog(&id, 3).await.unwrap(), 3);
    assert_eq!(app.like_blog(&id, 1).await.unwrap(), 4);

    assert_eq!(env.store.blog(&id).map(|b| b.likes), Some(4));
    app.expect(
        &Locator::test_id(id.likes_test_id()),
        Expectation::ContainsText("likes 4".to_string()),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn like_blog_rejects_counter_that_overshoots() {
    let env = TestEnv::seeded().await;
    let faults = Faults {
        extra_likes_per_click: 9,
        ..Faults::default()
    };
    let app = logged_in_with(&env, faults).await;
    let id = app.create_blog("Liking blogs", "Like Author", "http://like.dev").await.unwrap();
    app.open_blog(&id).await.unwrap();

    let err = app.like_blog(&id, 1).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Assertion);
    assert_eq!(env.store.blog(&id).map(|b| b.likes), Some(10));
}

#[tokio::test]
async fn remove_blog_accepts_confirmation() {
    let env = TestEnv::seeded().await;
    let app = logged_in(&env).await;
    let id = app.create_blog("Deleting blogs", "Delete Author", "http://delete.dev").await.unwrap();
    app.open_blog(&id).await.unwrap();
    assert!(app.can_remove(&id).await.unwrap());

    app.remove_blog(&id, "Deleting blogs Delete Author").await.unwrap();

    assert_eq!(app.blog_state(&id).await.unwrap(), BlogState::Deleted);
    assert!(env.store.blog(&id).is_none());
    assert!(app.open_blog(&id).await.is_err());
}

#[tokio::test]
async fn failed_removal_error_survives_policy_reset_failure() {
    let env = TestEnv::seeded().await;
    let faults = Faults {
        dialog_reset_fails: true,
        ..Faults::default()
    };
    let mut app = logged_in_with(&env, faults).await;
    let id = app.create_blog("Not yours", "Root Author", "http://root.dev").await.unwrap();
    app.logout().await.unwrap();
    let other = UserProfile::new("Second User", "seconduser", "password123");
    env.fixtures.register_user(&other).await.unwrap();
    app.login(&other.username, &other.password).await.unwrap();
    app.open_blog(&id).await.unwrap();

    let err = app.remove_blog(&id, "Not yours Root Author").await.unwrap_err();

    // The missing remove button, not the policy reset, is reported.
    assert_eq!(err.kind(), FailureKind::Timeout, "got {}", err);
    assert!(env.store.blog(&id).is_some());
}

#[tokio::test]
async fn policy_reset_failure_is_reported_after_successful_removal() {
    let env = TestEnv::seeded().await;
    let faults = Faults {
        dialog_reset_fails: true,
        ..Faults::default()
    };
    let app = logged_in_with(&env, faults).await;
    let id = app.create_blog("Deleting blogs", "Delete Author", "http://delete.dev").await.unwrap();
    app.open_blog(&id).await.unwrap();

    let err = app.remove_blog(&id, "Deleting blogs Delete Author").await.unwrap_err();

    assert!(matches!(err, E2eError::Playwright(_)), "got {}", err);
    assert!(env.store.blog(&id).is_none());
}

#[tokio::test]
async fn confirm_without_handler_is_unhandled_dialog() {
    let env = TestEnv::seeded().await;
    let app = logged_in(&env).await;
    let id = app.create_blog("Deleting blogs", "Delete Author", "http://delete.dev").await.unwrap();
    app.open_blog(&id).await.unwrap();

    let err = app
        .page()
        .click(&Locator::button("remove").within(app.blog_row(&id)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::UnhandledDialog);
    assert!(env.store.blog(&id).is_some());
}

#[tokio::test]
async fn non_owner_has_no_remove_control() {
    let env = TestEnv::seeded().await;
    let mut app = logged_in(&env).await;
    let id = app.create_blog("Other users blog", "Other Author", "http://other.dev").await.unwrap();
    app.logout().await.unwrap();

    let other = UserProfile::new("Second User", "seconduser", "password123");
    env.fixtures.register_user(&other).await.unwrap();
    app.login(&other.username, &other.password).await.unwrap();
    app.open_blog(&id).await.unwrap();

    assert!(!app.can_remove(&id).await.unwrap());
    app.expect(&Locator::button("remove"), Expectation::Hidden).await.unwrap();
    app.expect(&Locator::button("like").within(app.blog_row(&id)), Expectation::Visible)
        .await
        .unwrap();
}

#[tokio::test]
async fn blogs_are_displayed_most_liked_first() {
    let env = TestEnv::seeded().await;
    let session = env
        .fixtures
        .authenticate(&UserProfile::root().credentials())
        .await
        .unwrap();
    for (title, likes) in [("First Blog", 1), ("Third Blog", 3), ("Second Blog", 2)] {
        env.fixtures
            .create_blog_with_attributes(
                &NewBlog::new(title, "Author", "http://blog.dev").with_likes(likes),
                session.token.as_ref(),
            )
            .await
            .unwrap();
    }
    let app = logged_in(&env).await;
    app.reload().await.unwrap();

    app.open_all_blogs().await.unwrap();

    assert_eq!(app.displayed_like_counts().await.unwrap(), vec![3, 2, 1]);
    let titles = app.page().inner_texts(&app.blog_items()).await.unwrap();
    assert!(titles[0].starts_with("Third Blog"));
    assert!(titles[2].starts_with("First Blog"));
}
