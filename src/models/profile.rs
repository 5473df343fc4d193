use sqlx::{FromRow, PgPool};

use crate::error::AppError;

/// One-to-one extension of a user holding the profile picture path.
#[derive(Debug, Clone, FromRow)]
pub struct UserProfile {
    pub id: i32,
    pub user_id: i32,
    pub profile_picture: Option<String>,
}

impl UserProfile {
    /// Returns the profile of `user_id`, creating an empty one if it is missing.
    pub async fn get_or_create(pool: &PgPool, user_id: i32) -> Result<UserProfile, AppError> {
        sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(pool)
            .await?;

        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT id, user_id, profile_picture FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(profile)
    }

    /// Points the profile at a newly stored picture.
    pub async fn set_picture(
        pool: &PgPool,
        user_id: i32,
        path: &str,
    ) -> Result<UserProfile, AppError> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "UPDATE user_profiles SET profile_picture = $1 WHERE user_id = $2 \
             RETURNING id, user_id, profile_picture",
        )
        .bind(path)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(profile)
    }
}
