use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::warn;
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    db::user::User,
    mongodb::{Coll, Id},
};

use super::user::Rights;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

const BEARER_PREFIX: &str = "Bearer ";

/// An authentication token representing a specific user with specific rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
}

impl AuthToken {
    /// Create a new [`AuthToken`] for the given user, with that user's rights.
    pub fn new(user: &User) -> Self {
        Self {
            id: user.id,
            rights: user.rights,
        }
    }

    /// Does this token carry administrator rights?
    pub fn is_admin(&self) -> bool {
        self.rights == Rights::Admin
    }

    /// Sign this token into a JWT that expires after the configured lifetime.
    pub fn encode(self, config: &Config) -> Result<String, Error> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(token)
    }

    /// Verify and decode a JWT produced by [`AuthToken::encode`].
    pub fn decode(jwt: &str, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            jwt,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)?;
        Ok(token)
    }

    /// Wrap an encoded token into the auth cookie.
    pub fn cookie(jwt: String, config: &Config) -> Cookie<'static> {
        Cookie::build(AUTH_TOKEN_COOKIE, jwt)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .path("/")
            .finish()
    }

    /// Find the raw JWT on a request: the auth cookie wins over a bearer header.
    fn raw_from_request(req: &Request<'_>) -> Option<String> {
        if let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) {
            return Some(cookie.value().to_string());
        }
        req.headers()
            .get_one("Authorization")
            .and_then(|header| header.strip_prefix(BEARER_PREFIX))
            .map(|jwt| jwt.trim().to_string())
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the request and check that its user still exists.
    /// The returned rights are those currently stored for the user.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let jwt = match Self::raw_from_request(req) {
            Some(jwt) => jwt,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("no auth token".to_string()),
                ))
            }
        };

        let token = match Self::decode(&jwt, config) {
            Ok(token) => token,
            Err(e) => {
                warn!("Rejected auth token: {e}");
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("invalid auth token".to_string()),
                ));
            }
        };

        // Check the user actually exists, and pick up any change in rights.
        let db = req.guard::<&State<mongodb::Database>>().await.unwrap();
        let user = Coll::<User>::from_db(db)
            .find_one(token.id.as_doc(), None)
            .await;
        match user {
            Ok(Some(user)) => Outcome::Success(Self::new(&user)),
            Ok(None) => Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized(format!("user {} no longer exists", token.id)),
            )),
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}
