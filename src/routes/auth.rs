use crate::{
    auth::{
        password::verify_against_dummy, verify_password, AuthenticatedUserId, JwtKeys,
        LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, TokenKind,
    },
    error::AppError,
    media::MediaStorage,
    models::{PublicUser, User},
};
use actix_web::{get, post, web, HttpResponse, Responder};
use sqlx::PgPool;
use validator::Validate;

const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

/// Login user
///
/// Exchanges a username and password for an access/refresh token pair plus the user's
/// public profile. Unknown usernames, wrong passwords and deactivated accounts all get
/// the same 401 answer.
#[post("/login/")]
pub async fn login(
    pool: web::Data<PgPool>,
    keys: web::Data<JwtKeys>,
    storage: web::Data<dyn MediaStorage>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let user = User::find_by_username(&pool, &login_data.username).await?;
    let user = match user {
        Some(user) => {
            let matches = verify_password(&login_data.password, &user.password_hash)
                .unwrap_or_else(|e| {
                    log::error!("unusable password hash for user {}: {}", user.id, e);
                    false
                });
            if !matches || !user.is_active {
                None
            } else {
                Some(user)
            }
        }
        None => {
            verify_against_dummy(&login_data.password);
            None
        }
    };
    let user = user.ok_or_else(|| {
        log::info!("failed login for {:?}", login_data.username);
        AppError::Unauthorized(BAD_CREDENTIALS.into())
    })?;

    let response = LoginResponse {
        access: keys.issue_access(user.id)?,
        refresh: keys.issue_refresh(user.id)?,
        user: PublicUser::from_user(&user, storage.get_ref()),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Refresh access token
///
/// Issues a new access token for a valid, unexpired refresh token. The refresh token
/// itself is not rotated.
#[post("/refresh/")]
pub async fn refresh(
    keys: web::Data<JwtKeys>,
    refresh_data: web::Json<RefreshRequest>,
) -> Result<impl Responder, AppError> {
    refresh_data.validate()?;
    let claims = keys.verify(&refresh_data.refresh, TokenKind::Refresh)?;
    Ok(HttpResponse::Ok().json(RefreshResponse {
        access: keys.issue_access(claims.sub)?,
    }))
}

/// Current user
///
/// Returns the public profile of the token's subject.
#[get("/user/")]
pub async fn current_user(
    pool: web::Data<PgPool>,
    storage: web::Data<dyn MediaStorage>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let user = User::find_by_id(&pool, user_id.0)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(HttpResponse::Ok().json(PublicUser::from_user(&user, storage.get_ref())))
}
