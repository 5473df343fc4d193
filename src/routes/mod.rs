pub mod auth;
pub mod health;
pub mod profile;
pub mod tasks;

use actix_web::web;

/// Registers the API endpoints. Mounted under `/api` behind `AuthMiddleware`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::login)
            .service(auth::refresh)
            .service(auth::current_user),
    )
    .service(
        web::scope("/tasks")
            .service(tasks::list_tasks)
            .service(tasks::create_task)
            .service(tasks::get_task)
            .service(tasks::replace_task)
            .service(tasks::patch_task)
            .service(tasks::delete_task),
    )
    .service(web::scope("/profile").service(profile::update_picture));
}
