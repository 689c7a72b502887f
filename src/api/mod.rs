use rocket::Route;

pub mod answers;
pub mod auth;
pub mod questions;

pub fn routes() -> Vec<Route> {
    let mut routes = routes![health];
    routes.extend(auth::routes());
    routes.extend(questions::routes());
    routes.extend(answers::routes());
    routes
}

#[get("/health")]
fn health() -> &'static str {
    "ok"
}
