use crate::{
    auth::AuthenticatedUserId,
    config::MediaConfig,
    error::AppError,
    media::{profile_picture_path, validate_image, MediaStorage},
    models::{PublicUser, User, UserProfile},
};
use actix_multipart::Multipart;
use actix_web::{patch, web, HttpResponse, Responder};
use futures::StreamExt;
use sqlx::PgPool;

/// Multipart field carrying the picture.
pub const PICTURE_FIELD: &str = "profile_picture";

/// Reads the picture field out of a multipart body, enforcing the upload size limit.
/// Other fields are drained and ignored.
async fn read_picture(mut payload: Multipart, max_bytes: usize) -> Result<Vec<u8>, AppError> {
    let mut picture = None;
    while let Some(item) = payload.next().await {
        let mut field = item?;
        let is_picture = field.content_disposition().get_name() == Some(PICTURE_FIELD);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if !is_picture {
                continue;
            }
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::field(
                    PICTURE_FIELD,
                    format!("File too large. Maximum size is {} bytes.", max_bytes),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        if is_picture {
            picture = Some(bytes);
        }
    }
    picture.ok_or_else(|| AppError::field(PICTURE_FIELD, "No file was submitted."))
}

/// Update profile picture
///
/// Accepts a multipart body with a `profile_picture` image, stores it, points the
/// caller's profile at it and returns the caller's public representation. The previous
/// picture, if any, is removed.
///
/// ## Responses:
/// - `200 OK`: The updated public user.
/// - `400 Bad Request`: No file, an empty file, a non-image, or an oversized upload.
/// - `401 Unauthorized`: Missing or invalid access token, or the account no longer exists.
#[patch("/picture/")]
pub async fn update_picture(
    pool: web::Data<PgPool>,
    storage: web::Data<dyn MediaStorage>,
    media: web::Data<MediaConfig>,
    user_id: AuthenticatedUserId,
    payload: Multipart,
) -> Result<impl Responder, AppError> {
    let bytes = read_picture(payload, media.max_upload_bytes).await?;
    let extension = validate_image(&bytes)?;

    User::find_by_id(&pool, user_id.0)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    let previous = UserProfile::get_or_create(&pool, user_id.0)
        .await?
        .profile_picture
        .filter(|path| !path.is_empty());

    let path = profile_picture_path(user_id.0, extension);
    storage.save(&path, &bytes).await?;
    if let Err(e) = UserProfile::set_picture(&pool, user_id.0, &path).await {
        if let Err(cleanup) = storage.delete(&path).await {
            log::warn!("could not remove orphaned upload {}: {}", path, cleanup);
        }
        return Err(e);
    }

    if let Some(old) = previous {
        if let Err(e) = storage.delete(&old).await {
            log::warn!("could not remove previous picture {}: {}", old, e);
        }
    }
    log::info!("user {} updated profile picture to {}", user_id.0, path);

    let user = User::find_by_id(&pool, user_id.0)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(HttpResponse::Ok().json(PublicUser::from_user(&user, storage.get_ref())))
}
