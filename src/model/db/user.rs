use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    options::FindOptions,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::{auth::Rights, user::Credentials},
    mongodb::{ids_filter, is_duplicate_key_error, Coll, Id},
};

/// Reputation every new account starts with.
pub const STARTING_REPUTATION: i64 = 1;

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub username: String,
    pub password_hash: String,
    pub avatar: String,
    pub reputation: i64,
    pub rights: Rights,
    /// Answers written by this user, oldest first.
    pub answers_given: Vec<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(
        &self,
        password: T,
    ) -> std::result::Result<bool, argon2::Error> {
        argon2::verify_encoded(&self.password_hash, password.as_ref())
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Fetch the given users, keyed by ID. Unknown IDs are silently absent
/// from the result.
pub async fn find_users(
    users: &Coll<User>,
    ids: impl IntoIterator<Item = &Id>,
) -> Result<HashMap<Id, User>> {
    let filter = ids_filter(ids);
    let found: Vec<User> = users.find(filter, None).await?.try_collect().await?;
    Ok(found.into_iter().map(|user| (user.id, user)).collect())
}

/// Ensure at least one admin exists, creating one from the configured
/// credentials if necessary.
///
/// This operation is idempotent.
pub async fn ensure_admin_exists(users: &Coll<NewUser>, config: &Config) -> Result<()> {
    let admin_filter = doc! { "rights": Rights::Admin as i32 };
    let options = FindOptions::builder().limit(1).build();
    let existing: Vec<NewUser> = users
        .find(admin_filter, options)
        .await?
        .try_collect()
        .await?;
    if !existing.is_empty() {
        debug!("An admin already exists");
        return Ok(());
    }

    let mut admin = NewUser::try_from(Credentials {
        username: config.admin_username().to_string(),
        password: config.admin_password().to_string(),
        avatar: None,
    })?;
    admin.rights = Rights::Admin;
    if let Err(e) = users.insert_one(&admin, None).await {
        if is_duplicate_key_error(&e) {
            error!(
                "Cannot create admin '{}': a regular user already has that username; \
                 set a different `admin_username`",
                admin.username
            );
        }
        return Err(e.into());
    }
    info!("Created initial admin '{}'", admin.username);
    Ok(())
}
