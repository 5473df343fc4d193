use crate::{
    auth::AuthenticatedUserId,
    error::AppError,
    models::{Task, TaskPayload},
};
use actix_web::{delete, get, patch, post, put, web, HttpResponse, Responder};
use sqlx::PgPool;

fn not_found() -> AppError {
    AppError::NotFound("Not found.".into())
}

/// Lists the caller's tasks.
///
/// Only tasks owned by the authenticated user are returned, newest first.
///
/// ## Responses:
/// - `200 OK`: A JSON array of `Task` objects (possibly empty).
/// - `401 Unauthorized`: Missing or invalid access token.
#[get("/")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    user: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let tasks = Task::list_for_owner(&pool, user.0).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a task owned by the caller.
///
/// `title` and `description` are required. Any `owner`, `id` or `createdAt` in the body
/// is ignored; the owner is always the authenticated user.
///
/// ## Responses:
/// - `201 Created`: The stored `Task`.
/// - `400 Bad Request`: Validation failed; nothing is stored.
/// - `401 Unauthorized`: Missing or invalid access token.
#[post("/")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    user: AuthenticatedUserId,
    payload: web::Json<TaskPayload>,
) -> Result<impl Responder, AppError> {
    let fields = payload.into_inner().into_new()?;
    let task = Task::insert(&pool, user.0, &fields).await?;
    log::info!("user {} created task {}", user.0, task.id);
    Ok(HttpResponse::Created().json(task))
}

/// Retrieves one of the caller's tasks.
///
/// A task owned by someone else answers exactly like a task that does not exist.
///
/// ## Responses:
/// - `200 OK`: The `Task`.
/// - `401 Unauthorized`: Missing or invalid access token.
/// - `404 Not Found`: No such task among the caller's tasks.
#[get("/{id}/")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    user: AuthenticatedUserId,
    task_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let task = Task::find_owned(&pool, task_id.into_inner(), user.0)
        .await?
        .ok_or_else(not_found)?;
    Ok(HttpResponse::Ok().json(task))
}

/// Replaces the editable fields of one of the caller's tasks.
///
/// `title` and `description` are required; other absent fields keep their stored values.
///
/// ## Responses:
/// - `200 OK`: The updated `Task`.
/// - `400 Bad Request`: Validation failed; the task is unchanged.
/// - `401 Unauthorized`: Missing or invalid access token.
/// - `404 Not Found`: No such task among the caller's tasks.
#[put("/{id}/")]
pub async fn replace_task(
    pool: web::Data<PgPool>,
    user: AuthenticatedUserId,
    task_id: web::Path<i32>,
    payload: web::Json<TaskPayload>,
) -> Result<impl Responder, AppError> {
    update(&pool, user, task_id.into_inner(), payload.into_inner(), true).await
}

/// Updates only the fields present in the body. An explicit `null` clears
/// `startTime`, `endTime` or `assignedUsers`.
///
/// ## Responses:
/// - `200 OK`: The updated `Task`.
/// - `400 Bad Request`: Validation failed; the task is unchanged.
/// - `401 Unauthorized`: Missing or invalid access token.
/// - `404 Not Found`: No such task among the caller's tasks.
#[patch("/{id}/")]
pub async fn patch_task(
    pool: web::Data<PgPool>,
    user: AuthenticatedUserId,
    task_id: web::Path<i32>,
    payload: web::Json<TaskPayload>,
) -> Result<impl Responder, AppError> {
    update(&pool, user, task_id.into_inner(), payload.into_inner(), false).await
}

async fn update(
    pool: &PgPool,
    user: AuthenticatedUserId,
    id: i32,
    payload: TaskPayload,
    full: bool,
) -> Result<HttpResponse, AppError> {
    let current = Task::find_owned(pool, id, user.0).await?.ok_or_else(not_found)?;
    let fields = if full {
        payload.into_replacement(current.fields())?
    } else {
        payload.into_patch(current.fields())?
    };
    let task = Task::update_owned(pool, id, user.0, &fields)
        .await?
        .ok_or_else(not_found)?;
    Ok(HttpResponse::Ok().json(task))
}

/// Deletes one of the caller's tasks.
///
/// ## Responses:
/// - `204 No Content`: The task was removed.
/// - `401 Unauthorized`: Missing or invalid access token.
/// - `404 Not Found`: No such task among the caller's tasks.
#[delete("/{id}/")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    user: AuthenticatedUserId,
    task_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let id = task_id.into_inner();
    if !Task::delete_owned(&pool, id, user.0).await? {
        return Err(not_found());
    }
    log::info!("user {} deleted task {}", user.0, id);
    Ok(HttpResponse::NoContent().finish())
}
