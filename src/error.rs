use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{error, warn};
use mongodb::{bson::ser::Error as BsonError, error::Error as DbError};
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Catcher, Request,
};
use thiserror::Error;

use crate::model::api::Message;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error(transparent)]
    Bson(#[from] BsonError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not authenticated: {0}")]
    Unauthorized(String),
    #[error("Not authorized: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
}

impl Error {
    /// The given entity does not exist.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::Db(_) | Self::Argon2(_) | Self::Bson(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::InternalServerError,
            },
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => warn!("{self}"),
        }
        (status, Json(Message::new(self.to_string()))).respond_to(req)
    }
}

/// Render any error status Rocket produces itself (failed guards, unmatched
/// routes, malformed bodies) in the same JSON shape as [`Error`].
#[catch(default)]
fn json_catcher(status: Status, _req: &Request<'_>) -> (Status, Json<Message>) {
    let message = status.reason().unwrap_or("Unknown error");
    (status, Json(Message::new(message)))
}

pub fn catchers() -> Vec<Catcher> {
    catchers![json_catcher]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(Error::not_found("Answer").status(), Status::NotFound);
        assert_eq!(
            Error::Forbidden("not the author".into()).status(),
            Status::Forbidden
        );
        assert_eq!(
            Error::Unauthorized("no token".into()).status(),
            Status::Unauthorized
        );
        assert_eq!(
            Error::BadRequest("empty".into()).status(),
            Status::BadRequest
        );
        let expired: JwtError = JwtErrorKind::ExpiredSignature.into();
        assert_eq!(Error::from(expired).status(), Status::Unauthorized);
        let invalid: JwtError = JwtErrorKind::InvalidToken.into();
        assert_eq!(Error::from(invalid).status(), Status::InternalServerError);
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(Error::not_found("Question").to_string(), "Question not found");
    }
}
