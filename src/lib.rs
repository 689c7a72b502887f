#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod listing;
pub mod logging;
pub mod model;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;

/// Assemble the server: configuration, database and logging fairings, all
/// routes, and the JSON error catchers.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build(), DatabaseFairing::from_config())
}

fn assemble(rocket: Rocket<Build>, database: DatabaseFairing) -> Rocket<Build> {
    rocket
        .attach(ConfigFairing)
        .attach(database)
        .attach(LoggerFairing)
        .mount("/", api::routes())
        .register("/", error::catchers())
}

/// A server using an existing database connection and the named database.
#[cfg(test)]
pub(crate) fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    assemble(
        rocket::build(),
        DatabaseFairing::with_client(client, db_name),
    )
}

/// Connect to the database named in the test config.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    log4rs_test_utils::test_logging::init_logging_once_for(["qna_backend"], None, None);
    config::connect(&rocket::build())
        .await
        .expect("test database must be reachable")
}

/// A fresh database name for one test.
#[cfg(test)]
pub(crate) fn database() -> String {
    config::get_database_name()
}
