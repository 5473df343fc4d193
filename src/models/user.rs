use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::auth::hash_password;
use crate::error::AppError;
use crate::media::MediaStorage;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
}

/// A stored account, joined with its profile picture when one exists.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    /// Storage-relative path of the profile picture, from `user_profiles`.
    pub profile_picture: Option<String>,
}

const USER_SELECT: &str = "SELECT u.id, u.username, u.email, u.password_hash, u.first_name, \
                           u.last_name, u.is_staff, u.is_active, u.date_joined, p.profile_picture \
                           FROM users u LEFT JOIN user_profiles p ON p.user_id = u.id";

impl User {
    /// First and last name joined by a space, trimmed.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("{} WHERE u.username = $1", USER_SELECT);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<User>, AppError> {
        let sql = format!("{} WHERE u.id = $1", USER_SELECT);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    /// Creates an account together with its (empty) profile in one transaction.
    pub async fn provision(pool: &PgPool, new_user: &NewUser) -> Result<User, AppError> {
        new_user.validate()?;
        let password_hash = hash_password(&new_user.password)?;

        let mut tx = pool.begin().await?;
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO users (username, email, password_hash, first_name, last_name, is_staff) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.is_staff)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict(format!("Username {:?} is already taken", new_user.username))
            }
            other => other,
        })?;

        sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!("provisioned user {} ({})", new_user.username, id);

        User::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::InternalServerError(format!("user {} vanished after insert", id)))
    }
}

/// Input for provisioning an account.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(
        length(min = 1, max = 150, message = "Ensure this field has 1 to 150 characters."),
        regex(
            path = "USERNAME_RE",
            message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
        )
    )]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub password: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub first_name: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: bool,
}

/// The outward representation of an account, used by login and the current-user and
/// profile-picture endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub name: String,
    pub profile_picture_url: Option<String>,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

impl PublicUser {
    pub fn from_user(user: &User, media: &dyn MediaStorage) -> Self {
        PublicUser {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.full_name(),
            profile_picture_url: user
                .profile_picture
                .as_deref()
                .filter(|path| !path.is_empty())
                .map(|path| media.url(path)),
            is_admin: user.is_staff,
        }
    }
}
