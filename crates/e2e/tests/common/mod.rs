//! In-process fake of the bloglist application
//!
//! `Store` holds users and blogs. The same store backs an axum server that
//! speaks the bloglist REST API and a `FakePage` that renders the frontend
//! as a small tree of roles, labels, test ids and text, so helpers and
//! scenarios run without a browser.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bloglist_common::{Blog, BlogId, BlogOwner, Credentials, NewBlog, UserProfile};
use bloglist_e2e::locator::By;
use bloglist_e2e::{
    DialogKind, DialogPolicy, E2eConfig, E2eError, E2eResult, Expectation, FixtureClient,
    Locator, Page, PageFactory, ResponseMatcher, WaitState,
};
use regex::Regex;

pub const FRONTEND_URL: &str = "http://fake.local";

#[derive(Default)]
struct StoreState {
    users: Vec<UserProfile>,
    blogs: Vec<Blog>,
    next_id: u64,
}

/// Shared backend state
#[derive(Clone, Default)]
pub struct Store(Arc<Mutex<StoreState>>);

impl Store {
    pub fn reset(&self) {
        let mut state = self.0.lock();
        state.users.clear();
        state.blogs.clear();
    }

    pub fn add_user(&self, profile: UserProfile) -> Result<(), String> {
        let mut state = self.0.lock();
        if state.users.iter().any(|u| u.username == profile.username) {
            return Err("expected `username` to be unique".to_string());
        }
        state.users.push(profile);
        Ok(())
    }

    pub fn user(&self, username: &str) -> Option<UserProfile> {
        self.0.lock().users.iter().find(|u| u.username == username).cloned()
    }

    pub fn check_credentials(&self, credentials: &Credentials) -> Option<UserProfile> {
        self.user(&credentials.username)
            .filter(|u| u.password == credentials.password)
    }

    pub fn token_for(username: &str) -> String {
        format!("token-{}", username)
    }

    pub fn user_for_token(&self, token: &str) -> Option<UserProfile> {
        token.strip_prefix("token-").and_then(|username| self.user(username))
    }

    pub fn create_blog(&self, owner: &UserProfile, blog: &NewBlog) -> Result<Blog, String> {
        if blog.title.is_empty() || blog.url.is_empty() {
            return Err("title and url are required".to_string());
        }
        let mut state = self.0.lock();
        state.next_id += 1;
        let created = Blog {
            id: BlogId::new(format!("b{}", state.next_id)),
            title: blog.title.clone(),
            author: blog.author.clone(),
            url: blog.url.clone(),
            likes: blog.likes.unwrap_or(0),
            user: Some(BlogOwner::User {
                id: format!("u-{}", owner.username),
                username: owner.username.clone(),
                name: Some(owner.name.clone()),
            }),
        };
        state.blogs.push(created.clone());
        Ok(created)
    }

    /// Blogs in display order: most liked first, ties by creation
    pub fn blogs(&self) -> Vec<Blog> {
        let mut blogs = self.0.lock().blogs.clone();
        blogs.sort_by(|a, b| b.likes.cmp(&a.likes));
        blogs
    }

    pub fn blog(&self, id: &BlogId) -> Option<Blog> {
        self.0.lock().blogs.iter().find(|b| &b.id == id).cloned()
    }

    pub fn like(&self, id: &BlogId, amount: u64) {
        if let Some(blog) = self.0.lock().blogs.iter_mut().find(|b| &b.id == id) {
            blog.likes += amount;
        }
    }

    /// Only the owner may delete
    pub fn delete(&self, id: &BlogId, username: &str) -> bool {
        let mut state = self.0.lock();
        let before = state.blogs.len();
        state.blogs.retain(|b| {
            !(&b.id == id && b.user.as_ref().and_then(|u| u.username()) == Some(username))
        });
        state.blogs.len() != before
    }
}

// ---------------------------------------------------------------------------
// REST API
// ---------------------------------------------------------------------------

type ApiResponse = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: &str) -> ApiResponse {
    (status, Json(json!({ "error": message })))
}

async fn reset(State(store): State<Store>) -> StatusCode {
    store.reset();
    StatusCode::NO_CONTENT
}

async fn create_user(State(store): State<Store>, Json(profile): Json<UserProfile>) -> ApiResponse {
    let username = profile.username.clone();
    match store.add_user(profile) {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "username": username }))),
        Err(message) => api_error(StatusCode::BAD_REQUEST, &message),
    }
}

async fn login(State(store): State<Store>, Json(credentials): Json<Credentials>) -> ApiResponse {
    match store.check_credentials(&credentials) {
        Some(user) => (
            StatusCode::OK,
            Json(json!({
                "token": Store::token_for(&user.username),
                "username": user.username,
                "name": user.name,
            })),
        ),
        None => api_error(StatusCode::UNAUTHORIZED, "invalid username or password"),
    }
}

async fn list_blogs(State(store): State<Store>) -> Json<Vec<Blog>> {
    Json(store.blogs())
}

async fn create_blog(
    State(store): State<Store>,
    headers: HeaderMap,
    Json(blog): Json<NewBlog>,
) -> ApiResponse {
    let owner = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| store.user_for_token(token));
    let Some(owner) = owner else {
        return api_error(StatusCode::UNAUTHORIZED, "token invalid");
    };
    match store.create_blog(&owner, &blog) {
        Ok(created) => (StatusCode::CREATED, Json(json!(created))),
        Err(message) => api_error(StatusCode::BAD_REQUEST, &message),
    }
}

/// Serve the API on an ephemeral port and return its base URL
pub async fn spawn_api(store: Store) -> String {
    let app = Router::new()
        .route("/api/testing/reset", post(reset))
        .route("/api/users", post(create_user))
        .route("/api/login", post(login))
        .route("/api/blogs", get(list_blogs).post(create_blog))
        .with_state(store);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake api");
    let addr = listener.local_addr().expect("fake api addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake api server");
    });
    format!("http://{}", addr)
}

// ---------------------------------------------------------------------------
// Frontend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Action {
    OpenLogin,
    SubmitLogin,
    CancelLogin,
    Logout,
    OpenBlogForm,
    CreateBlog,
    CancelBlog,
    View(BlogId),
    Hide(BlogId),
    Like(BlogId),
    Remove(BlogId),
}

#[derive(Debug, Clone, Default)]
struct Node {
    role: Option<&'static str>,
    name: String,
    label: Option<String>,
    test_id: Option<String>,
    text: String,
    action: Option<Action>,
    children: Vec<Node>,
}

impl Node {
    fn text(text: impl Into<String>) -> Self {
        Node {
            text: text.into(),
            ..Default::default()
        }
    }

    fn button(name: &str, action: Action) -> Self {
        Node {
            role: Some("button"),
            name: name.to_string(),
            text: name.to_string(),
            action: Some(action),
            ..Default::default()
        }
    }

    fn input(label: &str) -> Self {
        Node {
            role: Some("textbox"),
            name: label.to_string(),
            label: Some(label.to_string()),
            ..Default::default()
        }
    }

    fn group(test_id: Option<String>, children: Vec<Node>) -> Self {
        Node {
            test_id,
            children,
            ..Default::default()
        }
    }

    fn with_test_id(mut self, id: String) -> Self {
        self.test_id = Some(id);
        self
    }

    fn full_text(&self) -> String {
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(self.text.clone());
        }
        for child in &self.children {
            let text = child.full_text();
            if !text.is_empty() {
                parts.push(text);
            }
        }
        parts.join(" ")
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn text_matches(have: &str, want: &str, exact: bool) -> bool {
    if exact {
        have.trim() == want
    } else {
        normalize(have).contains(&normalize(want))
    }
}

fn node_matches(node: &Node, by: &By) -> bool {
    match by {
        By::Role { role, name, exact } => {
            node.role == Some(role.as_str()) && text_matches(&node.name, name, *exact)
        }
        By::Label { text } => node
            .label
            .as_deref()
            .map_or(false, |label| text_matches(label, text, false)),
        By::Text { text, exact } => !node.text.is_empty() && text_matches(&node.text, text, *exact),
        By::TestId { id } => node.test_id.as_deref() == Some(id.as_str()),
    }
}

fn collect<'n>(node: &'n Node, by: &By, out: &mut Vec<&'n Node>) {
    if node_matches(node, by) {
        out.push(node);
    }
    for child in &node.children {
        collect(child, by, out);
    }
}

fn resolve<'n>(root: &'n Node, locator: &Locator) -> Vec<&'n Node> {
    let scopes = match &locator.parent {
        Some(parent) => resolve(root, parent),
        None => vec![root],
    };

    let mut found: Vec<&Node> = Vec::new();
    let mut seen = HashSet::new();
    for scope in scopes {
        let mut matches = Vec::new();
        for child in &scope.children {
            collect(child, &locator.by, &mut matches);
        }
        for node in matches {
            if seen.insert(node as *const Node) {
                found.push(node);
            }
        }
    }

    if let Some(text) = &locator.has_text {
        found.retain(|n| text_matches(&n.full_text(), text, false));
    }
    if let Some(index) = locator.nth {
        found = found.get(index).copied().into_iter().collect();
    }
    found
}

fn strict<'n>(found: Vec<&'n Node>, locator: &Locator) -> E2eResult<Option<&'n Node>> {
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.into_iter().next()),
        n => Err(E2eError::Playwright(format!(
            "strict mode violation: {} resolved to {} elements",
            locator, n
        ))),
    }
}

#[derive(Default)]
struct UiState {
    logged_in: Option<String>,
    login_form: bool,
    blog_form: bool,
    fields: HashMap<String, String>,
    expanded: HashSet<BlogId>,
    notification: Option<String>,
    dialog: DialogPolicy,
    network: Vec<(String, String, Result<Value, String>)>,
    closed: bool,
}

/// Knobs for exercising failure paths
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Like clicks are ignored by the backend
    pub likes_ignored: bool,
    /// Extra likes counted on top of each click
    pub extra_likes_per_click: u64,
    /// Clearing the dialog policy fails
    pub dialog_reset_fails: bool,
}

pub struct FakePage {
    store: Store,
    faults: Faults,
    ui: Mutex<UiState>,
}

impl FakePage {
    pub fn new(store: Store, faults: Faults) -> Self {
        Self {
            store,
            faults,
            ui: Mutex::new(UiState::default()),
        }
    }

    fn render(&self, ui: &UiState) -> Node {
        let mut children = Vec::new();

        if let Some(message) = &ui.notification {
            children.push(Node::text(message.clone()));
        }

        let user = ui.logged_in.as_deref().and_then(|u| self.store.user(u));
        match user {
            None => {
                if ui.login_form {
                    children.push(Node::text("Log in to application"));
                    children.push(Node::input("username"));
                    children.push(Node::input("password"));
                    children.push(Node::button("login", Action::SubmitLogin));
                    children.push(Node::button("cancel", Action::CancelLogin));
                } else {
                    children.push(Node::button("login", Action::OpenLogin));
                }
            }
            Some(user) => {
                children.push(Node::text(format!("{} logged in", user.name)));
                children.push(Node::button("logout", Action::Logout));
                if ui.blog_form {
                    children.push(Node::text("create new"));
                    children.push(Node::input("title:"));
                    children.push(Node::input("author:"));
                    children.push(Node::input("url:"));
                    children.push(Node::button("create", Action::CreateBlog));
                    children.push(Node::button("cancel", Action::CancelBlog));
                } else {
                    children.push(Node::button("new blog", Action::OpenBlogForm));
                }
                for blog in self.store.blogs() {
                    children.push(Node::group(
                        Some("blog".to_string()),
                        vec![self.render_blog(ui, &blog, &user.username)],
                    ));
                }
            }
        }

        Node::group(None, children)
    }

    fn render_blog(&self, ui: &UiState, blog: &Blog, viewer: &str) -> Node {
        let id = &blog.id;
        let mut row = vec![Node::text(blog.heading())];
        if ui.expanded.contains(id) {
            row.push(Node::button("hide", Action::Hide(id.clone())));
            row.push(Node::text(blog.url.clone()));
            row.push(Node::text(format!("likes {}", blog.likes)).with_test_id(id.likes_test_id()));
            row.push(Node::button("like", Action::Like(id.clone())).with_test_id(id.like_test_id()));
            if let Some(BlogOwner::User { username, name, .. }) = &blog.user {
                row.push(Node::text(name.clone().unwrap_or_else(|| username.clone())));
                if username == viewer {
                    row.push(Node::button("remove", Action::Remove(id.clone())));
                }
            }
        } else {
            row.push(Node::button("view", Action::View(id.clone())));
        }
        Node::group(Some(id.test_id()), row)
    }

    fn perform(&self, ui: &mut UiState, action: Action) -> E2eResult<()> {
        match action {
            Action::OpenLogin => ui.login_form = true,
            Action::CancelLogin => ui.login_form = false,
            Action::SubmitLogin => {
                let credentials = Credentials::new(
                    ui.fields.remove("username").unwrap_or_default(),
                    ui.fields.remove("password").unwrap_or_default(),
                );
                match self.store.check_credentials(&credentials) {
                    Some(user) => {
                        ui.logged_in = Some(user.username);
                        ui.login_form = false;
                        ui.notification = None;
                    }
                    None => ui.notification = Some("wrong username or password".to_string()),
                }
            }
            Action::Logout => {
                ui.logged_in = None;
                ui.blog_form = false;
                ui.expanded.clear();
                ui.notification = None;
            }
            Action::OpenBlogForm => ui.blog_form = true,
            Action::CancelBlog => ui.blog_form = false,
            Action::CreateBlog => {
                let owner = ui
                    .logged_in
                    .as_deref()
                    .and_then(|u| self.store.user(u))
                    .ok_or_else(|| E2eError::Playwright("not logged in".to_string()))?;
                let blog = NewBlog::new(
                    ui.fields.remove("title:").unwrap_or_default(),
                    ui.fields.remove("author:").unwrap_or_default(),
                    ui.fields.remove("url:").unwrap_or_default(),
                );
                let result = self.store.create_blog(&owner, &blog);
                if let Ok(created) = &result {
                    ui.blog_form = false;
                    ui.notification =
                        Some(format!("a new blog {} by {} added", created.title, created.author));
                }
                ui.network.push((
                    "POST".to_string(),
                    format!("{}/api/blogs", FRONTEND_URL),
                    result.map(|b| json!(b)),
                ));
            }
            Action::View(id) => {
                ui.expanded.insert(id);
            }
            Action::Hide(id) => {
                ui.expanded.remove(&id);
            }
            Action::Like(id) => {
                if !self.faults.likes_ignored {
                    self.store.like(&id, 1 + self.faults.extra_likes_per_click);
                }
            }
            Action::Remove(id) => match ui.dialog {
                DialogPolicy::Unset => return Err(E2eError::UnhandledDialog("confirm".to_string())),
                DialogPolicy::Accept { expect: Some(kind) } if kind != DialogKind::Confirm => {
                    return Err(E2eError::AssertionFailed(format!(
                        "expected {:?} dialog, got confirm",
                        kind
                    )))
                }
                DialogPolicy::Accept { .. } => {
                    let viewer = ui.logged_in.clone().unwrap_or_default();
                    self.store.delete(&id, &viewer);
                    ui.expanded.remove(&id);
                }
                DialogPolicy::Dismiss => {}
            },
        }
        Ok(())
    }

    fn reset_view(&self) -> E2eResult<()> {
        let mut ui = self.ui.lock();
        if ui.closed {
            return Err(E2eError::Playwright("page closed".to_string()));
        }
        ui.login_form = false;
        ui.blog_form = false;
        ui.fields.clear();
        ui.expanded.clear();
        ui.notification = None;
        Ok(())
    }

    fn click_now(&self, locator: &Locator) -> E2eResult<()> {
        let mut ui = self.ui.lock();
        let root = self.render(&ui);
        let node = strict(resolve(&root, locator), locator)?
            .ok_or_else(|| E2eError::Timeout(format!("click {}", locator)))?;
        let action = node
            .action
            .clone()
            .ok_or_else(|| E2eError::Playwright(format!("{} is not clickable", locator)))?;
        self.perform(&mut ui, action)
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, _url: &str) -> E2eResult<()> {
        self.reset_view()
    }

    async fn reload(&self) -> E2eResult<()> {
        self.reset_view()
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.click_now(locator)
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        let mut ui = self.ui.lock();
        let root = self.render(&ui);
        let node = strict(resolve(&root, locator), locator)?
            .ok_or_else(|| E2eError::Timeout(format!("fill {}", locator)))?;
        let label = node
            .label
            .clone()
            .ok_or_else(|| E2eError::Playwright(format!("{} is not an input", locator)))?;
        ui.fields.insert(label, value.to_string());
        Ok(())
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        let ui = self.ui.lock();
        let root = self.render(&ui);
        Ok(strict(resolve(&root, locator), locator)?.is_some())
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        let ui = self.ui.lock();
        let root = self.render(&ui);
        Ok(resolve(&root, locator).len())
    }

    async fn inner_texts(&self, locator: &Locator) -> E2eResult<Vec<String>> {
        let ui = self.ui.lock();
        let root = self.render(&ui);
        Ok(resolve(&root, locator).iter().map(|n| n.full_text()).collect())
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        state: WaitState,
        _timeout: Duration,
    ) -> E2eResult<()> {
        let ui = self.ui.lock();
        let root = self.render(&ui);
        let present = strict(resolve(&root, locator), locator)?.is_some();
        match (state, present) {
            (WaitState::Visible, true) | (WaitState::Hidden, false) => Ok(()),
            _ => Err(E2eError::Timeout(format!("waiting for {} to be {}", locator, state))),
        }
    }

    async fn expect(
        &self,
        locator: &Locator,
        expectation: &Expectation,
        _timeout: Duration,
    ) -> E2eResult<()> {
        let ui = self.ui.lock();
        let root = self.render(&ui);
        let found = resolve(&root, locator);
        let failed = || E2eError::AssertionFailed(format!("{} {}", locator, expectation));

        let holds = match expectation {
            Expectation::Count(n) => found.len() == *n,
            Expectation::Hidden => strict(found, locator)?.is_none(),
            Expectation::Visible => strict(found, locator)?.is_some(),
            Expectation::Text(t) => strict(found, locator)?
                .map_or(false, |n| normalize(&n.full_text()) == normalize(t)),
            Expectation::ContainsText(t) => strict(found, locator)?
                .map_or(false, |n| text_matches(&n.full_text(), t, false)),
            Expectation::MatchesText(pattern) => {
                let re = Regex::new(pattern)
                    .map_err(|e| E2eError::Playwright(format!("bad pattern {}: {}", pattern, e)))?;
                strict(found, locator)?.map_or(false, |n| re.is_match(&n.full_text()))
            }
        };
        if holds {
            Ok(())
        } else {
            Err(failed())
        }
    }

    async fn click_and_wait_for_response(
        &self,
        locator: &Locator,
        matcher: &ResponseMatcher,
        _timeout: Duration,
    ) -> E2eResult<Value> {
        self.ui.lock().network.clear();
        self.click_now(locator)?;

        let network = std::mem::take(&mut self.ui.lock().network);
        let (_, url, result) = network
            .into_iter()
            .find(|(method, url, _)| matcher.matches(url, method))
            .ok_or_else(|| E2eError::Timeout(format!("response {}", matcher)))?;
        result.map_err(|e| E2eError::Playwright(format!("POST {} returned 400: {}", url, e)))
    }

    async fn set_dialog_policy(&self, policy: DialogPolicy) -> E2eResult<()> {
        if policy == DialogPolicy::Unset && self.faults.dialog_reset_fails {
            return Err(E2eError::Playwright("dialog handler could not be removed".to_string()));
        }
        self.ui.lock().dialog = policy;
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        self.ui.lock().closed = true;
        Ok(())
    }
}

pub struct FakeBrowser {
    store: Store,
    faults: Faults,
}

impl FakeBrowser {
    pub fn new(store: Store, faults: Faults) -> Self {
        Self { store, faults }
    }
}

#[async_trait]
impl PageFactory for FakeBrowser {
    async fn new_page(&self) -> E2eResult<Box<dyn Page>> {
        Ok(Box::new(FakePage::new(self.store.clone(), self.faults)))
    }
}

/// A running fake application with a fixture client pointed at it
pub struct TestEnv {
    pub store: Store,
    pub api_url: String,
    pub fixtures: FixtureClient,
}

impl TestEnv {
    pub async fn start() -> Self {
        let store = Store::default();
        let api_url = spawn_api(store.clone()).await;
        let fixtures =
            FixtureClient::new(api_url.clone(), Duration::from_secs(5)).expect("fixture client");
        Self {
            store,
            api_url,
            fixtures,
        }
    }

    /// Reset and register the root user, as the runner does
    pub async fn seeded() -> Self {
        let env = Self::start().await;
        env.fixtures.reset_environment().await.expect("reset");
        env.fixtures
            .register_user(&UserProfile::root())
            .await
            .expect("register root");
        env
    }

    pub fn page(&self) -> Box<dyn Page> {
        self.page_with(Faults::default())
    }

    pub fn page_with(&self, faults: Faults) -> Box<dyn Page> {
        Box::new(FakePage::new(self.store.clone(), faults))
    }

    pub fn config(&self) -> E2eConfig {
        let mut config = E2eConfig::default();
        config.app.frontend_url = FRONTEND_URL.to_string();
        config.app.api_url = self.api_url.clone();
        config
    }
}
