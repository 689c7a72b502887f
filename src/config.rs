use chrono::Duration;
use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    db::user::ensure_admin_exists,
    mongodb::{ensure_indexes_exist, Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    admin_username: String,
    // secrets
    jwt_secret: String,
    admin_password: String,
}

impl Config {
    /// Valid lifetime of auth tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Username of the admin created when the database has none.
    pub fn admin_username(&self) -> &str {
        &self.admin_username
    }

    /// Password of the admin created when the database has none.
    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// Connect to the database named in the config.
pub async fn connect(rocket: &Rocket<Build>) -> Option<MongoClient> {
    let config = match rocket.figment().extract::<DbConfig>() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load database config");
            rocket::config::pretty_print_error(e);
            return None;
        }
    };
    info!("Loaded database config, connecting...");
    match MongoClient::with_uri_str(config.db_uri).await {
        Ok(client) => Some(client),
        Err(e) => {
            error!("Failed to connect to database: {e}");
            None
        }
    }
}

/// A fairing that performs any database setup necessary, then places both
/// a `Client` and a `Database` into managed state.
///
/// Must be attached after [`ConfigFairing`].
pub struct DatabaseFairing {
    client: Option<MongoClient>,
    db_name: String,
}

impl DatabaseFairing {
    /// Connect using the config on ignition, to the default database.
    pub fn from_config() -> Self {
        Self {
            client: None,
            db_name: get_database_name(),
        }
    }

    /// Use an existing connection and the given database.
    pub fn with_client(client: MongoClient, db_name: &str) -> Self {
        Self {
            client: Some(client),
            db_name: db_name.to_string(),
        }
    }
}

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let client = match self.client.clone() {
            Some(client) => client,
            None => match connect(&rocket).await {
                Some(client) => client,
                None => return Err(rocket),
            },
        };
        let db = client.database(&self.db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to set up database indexes: {e}");
            return Err(rocket);
        }

        // Ensure there is at least one admin user.
        let config = match rocket.state::<Config>() {
            Some(config) => config,
            None => {
                error!("Application config must be loaded before the database");
                return Err(rocket);
            }
        };
        if let Err(e) = ensure_admin_exists(&Coll::from_db(&db), config).await {
            error!("Failed to ensure an admin exists: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
pub fn get_database_name() -> String {
    "qna".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}
