//! Core types for the bloglist application as seen through its API

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Registration payload for `POST /api/users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub username: String,
    pub password: String,
}

impl UserProfile {
    pub fn new(
        name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// The user every scenario registers after a reset
    pub fn root() -> Self {
        Self::new("Matti Luukkainen", "mluukkai", "salainen")
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self::root()
    }
}

/// Login payload for `POST /api/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Opaque credential returned by login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Response body of `POST /api/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: BearerToken,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// An authenticated session.
///
/// Sessions established through the UI live in browser storage and carry no
/// token; sessions established through the API carry the bearer token used
/// to authorize direct calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub name: Option<String>,
    pub token: Option<BearerToken>,
}

impl Session {
    pub fn ui(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            name: None,
            token: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Text the frontend shows next to the logout control
    pub fn logged_in_banner(&self) -> Option<String> {
        self.name.as_ref().map(|name| format!("{} logged in", name))
    }
}

impl From<LoginResponse> for Session {
    fn from(resp: LoginResponse) -> Self {
        Self {
            username: resp.username,
            name: resp.name,
            token: Some(resp.token),
        }
    }
}

/// Identifier of a blog resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BlogId(String);

impl BlogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Test id of the blog row
    pub fn test_id(&self) -> String {
        format!("blog-{}", self.0)
    }

    /// Test id of the like button
    pub fn like_test_id(&self) -> String {
        format!("like-{}", self.0)
    }

    /// Test id of the like counter
    pub fn likes_test_id(&self) -> String {
        format!("likes-{}", self.0)
    }
}

impl fmt::Display for BlogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Backends differ on whether ids are strings or integers.
impl<'de> Deserialize<'de> for BlogId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Str(s) => BlogId(s),
            Raw::Num(n) => BlogId(n.to_string()),
        })
    }
}

/// Creation payload for `POST /api/blogs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlog {
    pub title: String,
    pub author: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<u64>,
}

impl NewBlog {
    pub fn new(title: impl Into<String>, author: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            url: url.into(),
            likes: None,
        }
    }

    /// Preset the like count, bypassing UI likes
    pub fn with_likes(mut self, likes: u64) -> Self {
        self.likes = Some(likes);
        self
    }

    /// Title and url are required by the backend
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidField {
                field: "title",
                reason: "must not be empty".to_string(),
            });
        }
        if self.url.trim().is_empty() {
            return Err(Error::InvalidField {
                field: "url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Collapsed-row text of the blog once rendered
    pub fn heading(&self) -> String {
        format!("{} {}", self.title, self.author)
    }
}

/// Owner reference of a blog; populated or bare depending on the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlogOwner {
    User {
        id: String,
        username: String,
        #[serde(default)]
        name: Option<String>,
    },
    Id(String),
}

impl BlogOwner {
    pub fn username(&self) -> Option<&str> {
        match self {
            BlogOwner::User { username, .. } => Some(username),
            BlogOwner::Id(_) => None,
        }
    }
}

/// A blog resource as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blog {
    pub id: BlogId,
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub url: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<BlogOwner>,
}

impl Blog {
    pub fn heading(&self) -> String {
        format!("{} {}", self.title, self.author)
    }
}

/// Whether like counts appear in non-increasing order.
///
/// Equal counts may appear in any order.
pub fn ordered_by_likes(likes: &[u64]) -> bool {
    likes.windows(2).all(|w| w[0] >= w[1])
}
