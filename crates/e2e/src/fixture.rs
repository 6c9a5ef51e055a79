//! Direct API calls that establish scenario preconditions without the UI

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use bloglist_common::{Blog, BearerToken, Credentials, LoginResponse, NewBlog, Session, UserProfile};

use crate::error::{E2eError, E2eResult};

/// `{"error": "..."}` bodies returned by the backend
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// HTTP client for the application's REST API
#[derive(Debug, Clone)]
pub struct FixtureClient {
    client: Client,
    api_url: String,
}

impl FixtureClient {
    pub fn new(api_url: impl Into<String>, request_timeout: Duration) -> E2eResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("{} {}", method, path);
        self.client.request(method, format!("{}{}", self.api_url, path))
    }

    /// Wipe all users and blogs
    pub async fn reset_environment(&self) -> E2eResult<()> {
        let resp = self.request(Method::POST, "/api/testing/reset").send().await?;
        check(resp, "POST /api/testing/reset").await?;
        Ok(())
    }

    pub async fn register_user(&self, profile: &UserProfile) -> E2eResult<()> {
        let resp = self
            .request(Method::POST, "/api/users")
            .json(profile)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            debug!("Registered user {}", profile.username);
            return Ok(());
        }

        let message = error_message(resp).await;
        if status == StatusCode::CONFLICT
            || (status == StatusCode::BAD_REQUEST && message.contains("unique"))
        {
            return Err(E2eError::Conflict {
                username: profile.username.clone(),
            });
        }
        Err(E2eError::Fixture {
            endpoint: "POST /api/users".to_string(),
            status: status.as_u16(),
            message,
        })
    }

    /// Log in through the API and return a session carrying the bearer token
    pub async fn authenticate(&self, credentials: &Credentials) -> E2eResult<Session> {
        let resp = self
            .request(Method::POST, "/api/login")
            .json(credentials)
            .send()
            .await?;
        let login: LoginResponse = check(resp, "POST /api/login").await?.json().await?;
        Ok(login.into())
    }

    /// Create a blog directly, optionally with a preset like count
    pub async fn create_blog_with_attributes(
        &self,
        blog: &NewBlog,
        token: Option<&BearerToken>,
    ) -> E2eResult<Blog> {
        blog.validate()?;

        let mut req = self.request(Method::POST, "/api/blogs").json(blog);
        if let Some(token) = token {
            req = req.header(reqwest::header::AUTHORIZATION, token.header_value());
        }
        let created: Blog = check(req.send().await?, "POST /api/blogs").await?.json().await?;
        debug!("Created blog {} with {} likes", created.id, created.likes);
        Ok(created)
    }

    pub async fn list_blogs(&self) -> E2eResult<Vec<Blog>> {
        let resp = self.request(Method::GET, "/api/blogs").send().await?;
        Ok(check(resp, "GET /api/blogs").await?.json().await?)
    }

    /// Whether the API answers at all
    pub async fn is_healthy(&self, path: &str) -> bool {
        match self.client.get(format!("{}{}", self.api_url, path)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

async fn check(resp: Response, endpoint: &str) -> E2eResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(E2eError::Fixture {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        message: error_message(resp).await,
    })
}

async fn error_message(resp: Response) -> String {
    let text = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(body) => body.error,
        Err(_) => text,
    }
}
