#![doc = "The `taskdesk` library crate."]
#![doc = ""]
#![doc = "Domain models, authentication, media storage, routing and error handling for the"]
#![doc = "TaskDesk backend. The binary (`main.rs`) builds an `AppState` from configuration and"]
#![doc = "hands it to `HttpServer`; the integration tests do the same with `actix_web::test`."]

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod routes;

pub use app::AppState;
pub use error::AppError;
