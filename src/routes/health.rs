use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

/// Health check endpoint
///
/// Reports liveness and whether the database answers. Unauthenticated.
#[get("/health")]
pub async fn health(pool: web::Data<PgPool>) -> impl Responder {
    let database_ok = sqlx::query("SELECT 1").execute(pool.get_ref()).await.is_ok();
    let body = json!({
        "status": if database_ok { "ok" } else { "degraded" },
        "database": if database_ok { "ok" } else { "unavailable" },
        "timestamp": Utc::now()
    });
    if database_ok {
        HttpResponse::Ok().json(body)
    } else {
        log::warn!("health check: database unavailable");
        HttpResponse::ServiceUnavailable().json(body)
    }
}
