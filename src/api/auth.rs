use log::info;
use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, AUTH_TOKEN_COOKIE},
            user::{Credentials, LoginRequest, Session, UserProfile},
        },
        db::user::{NewUser, User},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, login, logout, me]
}

/// Issue an auth token for the user, set it as a cookie, and describe the session.
fn start_session(user: User, cookies: &CookieJar<'_>, config: &Config) -> Result<Session> {
    let token = AuthToken::new(&user).encode(config)?;
    cookies.add(AuthToken::cookie(token.clone(), config));
    Ok(Session {
        token,
        user: user.into(),
    })
}

#[post("/api/auth/register", data = "<credentials>", format = "json")]
pub async fn register(
    cookies: &CookieJar<'_>,
    credentials: Json<Credentials>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<(Status, Json<Session>)> {
    let user = User {
        id: Id::new(),
        user: NewUser::try_from(credentials.into_inner())?,
    };

    // The unique index on usernames arbitrates concurrent registrations.
    if let Err(e) = users.insert_one(&user, None).await {
        return Err(if is_duplicate_key_error(&e) {
            Error::BadRequest(format!("Username already in use: {}", user.username))
        } else {
            e.into()
        });
    }
    info!("Registered user {} ({})", user.username, user.id);

    let session = start_session(user, cookies, config)?;
    Ok((Status::Created, Json(session)))
}

#[post("/api/auth/login", data = "<request>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    request: Json<LoginRequest>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<Session>> {
    let with_username = doc! {
        "username": &request.username,
    };

    let user = match users.find_one(with_username, None).await? {
        Some(user) if user.verify_password(&request.password)? => user,
        _ => {
            return Err(Error::Unauthorized(
                "No user found with the provided username and password combination".to_string(),
            ))
        }
    };

    Ok(Json(start_session(user, cookies, config)?))
}

#[delete("/api/auth")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[get("/api/auth/me")]
pub async fn me(token: AuthToken, users: Coll<User>) -> Result<Json<UserProfile>> {
    let user = users
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {}", token.id)))?;
    Ok(Json(user.into()))
}
