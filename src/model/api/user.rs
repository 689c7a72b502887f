use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::{auth::Rights, ApiId},
    db::user::{NewUser, User, STARTING_REPUTATION},
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

const AVATAR_BASE_URL: &str = "https://api.dicebear.com/6.x/adventurer/svg?seed=";

/// Raw registration details, received from a user. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl TryFrom<Credentials> for NewUser {
    type Error = Error;

    /// Convert [`Credentials`] to a new [`User`] by hashing the password.
    /// This enforces that the username is non-empty, and the password meets minimum length.
    fn try_from(cred: Credentials) -> Result<Self, Self::Error> {
        let username = cred.username.trim().to_string();
        if username.is_empty() {
            return Err(Error::BadRequest("username must not be empty".to_string()));
        }
        if cred.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::BadRequest(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(cred.password.as_bytes(), &salt, &argon2::Config::default())?;

        let avatar = cred
            .avatar
            .filter(|avatar| !avatar.trim().is_empty())
            .unwrap_or_else(|| format!("{AVATAR_BASE_URL}{username}"));

        Ok(Self {
            username,
            password_hash,
            avatar,
            reputation: STARTING_REPUTATION,
            rights: Rights::User,
            answers_given: Vec::new(),
            created_at: Utc::now(),
        })
    }
}

/// A login attempt.
#[derive(Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// The public view of a user's own account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: ApiId,
    pub username: String,
    pub avatar: String,
    pub reputation: i64,
    pub role: String,
    pub answers_given: Vec<ApiId>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into(),
            role: user.rights.to_string(),
            answers_given: user.answers_given.iter().map(|&id| id.into()).collect(),
            username: user.user.username,
            avatar: user.user.avatar,
            reputation: user.user.reputation,
        }
    }
}

/// The response to a successful login or registration. The token is also set
/// as a cookie; clients that cannot keep cookies send it as a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

/// The author of a question or answer, as embedded in responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: ApiId,
    pub username: String,
    pub avatar: String,
    pub reputation: i64,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.into(),
            username: user.username.clone(),
            avatar: user.avatar.clone(),
            reputation: user.reputation,
        }
    }
}

/// The author of a comment, as embedded in responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: ApiId,
    pub username: String,
    pub avatar: String,
}

impl From<&User> for CommentAuthor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.into(),
            username: user.username.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl Credentials {
        pub fn example() -> Self {
            Self {
                username: "dev_guru".into(),
                password: "optimise-all-the-things".into(),
                avatar: None,
            }
        }

        pub fn example2() -> Self {
            Self {
                username: "pipeline_pro".into(),
                password: "green-builds-only".into(),
                avatar: Some("https://example.com/pipeline.png".into()),
            }
        }

        pub fn admin_example() -> Self {
            Self {
                username: "moderator".into(),
                password: "keep-it-civil".into(),
                avatar: None,
            }
        }

        pub fn login(&self) -> LoginRequest {
            LoginRequest {
                username: self.username.clone(),
                password: self.password.clone(),
            }
        }
    }
}
