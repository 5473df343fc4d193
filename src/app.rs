//! Shared application state and the service configuration used by both the server and
//! the integration tests.

use std::sync::Arc;

use actix_files::Files;
use actix_web::web;
use sqlx::PgPool;

use crate::auth::{AuthMiddleware, JwtKeys};
use crate::config::{Config, MediaConfig};
use crate::error::json_error_handler;
use crate::media::{LocalMediaStorage, MediaStorage};
use crate::routes;

/// Everything the handlers pull from `app_data`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub keys: web::Data<JwtKeys>,
    pub storage: web::Data<dyn MediaStorage>,
    pub media: web::Data<MediaConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let storage: Arc<dyn MediaStorage> = Arc::new(LocalMediaStorage::from_config(&config.media));
        Self::with_parts(pool, JwtKeys::from_config(&config.jwt), storage, config.media.clone())
    }

    pub fn with_parts(
        pool: PgPool,
        keys: JwtKeys,
        storage: Arc<dyn MediaStorage>,
        media: MediaConfig,
    ) -> Self {
        Self {
            pool,
            keys: web::Data::new(keys),
            storage: web::Data::from(storage),
            media: web::Data::new(media),
        }
    }

    /// Registers state, the health check, the media mount and the `/api` scope.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.pool.clone()))
            .app_data(self.keys.clone())
            .app_data(self.storage.clone())
            .app_data(self.media.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(routes::health::health);

        if let Some(mount) = media_mount_path(&self.media.url) {
            cfg.service(Files::new(&mount, self.media.root.clone()));
        }

        cfg.service(
            web::scope("/api")
                .wrap(AuthMiddleware)
                .configure(routes::config),
        );
    }
}

// Only a local path prefix can be served from here; absolute URLs point elsewhere.
fn media_mount_path(url: &str) -> Option<String> {
    if !url.starts_with('/') {
        return None;
    }
    let mount = url.trim_end_matches('/');
    if mount.is_empty() {
        None
    } else {
        Some(mount.to_string())
    }
}
