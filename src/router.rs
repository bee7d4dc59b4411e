use axum::extract::{DefaultBodyLimit, FromRef};
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use axum_extra::extract::cookie::Key;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::db::ExpoStorage;
use crate::error::ExpoError;
use crate::handlers::{contacts, exhibitions, files, health, ocr, session, users};
use crate::ocr::{OcrService, TextRecognizer};
use crate::service::{ExternalAuthClient, UploadStore};

const BUNDLED_QUESTIONNAIRE: &str = include_str!("../assets/questionnaire.json");

/// Shared handles cloned into every request.
#[derive(Clone)]
pub struct ExpoState {
    pub db: ExpoStorage,
    pub config: Arc<Config>,
    pub uploads: UploadStore,
    pub ocr: OcrService,
    pub auth: ExternalAuthClient,
    pub ocr_limiter: Arc<DefaultDirectRateLimiter>,
    pub questionnaire: Arc<Value>,
    cookie_key: Key,
}

impl ExpoState {
    pub fn new(
        db: ExpoStorage,
        config: Arc<Config>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Result<Self, ExpoError> {
        let cookie_key = cookie_key(&config.basic.cookie_secret)?;
        let per_minute =
            NonZeroU32::new(config.ocr.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            db,
            uploads: UploadStore::from_config(&config.uploads),
            ocr: OcrService::new(recognizer, config.ocr.clone()),
            auth: ExternalAuthClient::new(&config.auth)?,
            ocr_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
            questionnaire: Arc::new(load_questionnaire(&config)?),
            cookie_key,
            config,
        })
    }

    /// `Secure` on session cookies unless explicitly disabled.
    pub fn secure_cookies(&self) -> bool {
        !self.config.basic.insecure_cookie
    }
}

impl FromRef<ExpoState> for Key {
    fn from_ref(state: &ExpoState) -> Self {
        state.cookie_key.clone()
    }
}

fn cookie_key(secret: &str) -> Result<Key, ExpoError> {
    if secret.is_empty() {
        warn!("cookie_secret is empty; sessions will not survive a restart");
        return Ok(Key::generate());
    }
    Key::try_from(secret.as_bytes())
        .map_err(|_| ExpoError::Config("cookie_secret must be at least 64 bytes".into()))
}

fn load_questionnaire(config: &Config) -> Result<Value, ExpoError> {
    let raw = match config.questionnaire_path.as_ref() {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            ExpoError::Config(format!("cannot read questionnaire {}: {e}", path.display()))
        })?,
        None => BUNDLED_QUESTIONNAIRE.to_string(),
    };
    Ok(serde_json::from_str(&raw)?)
}

pub fn expo_router(state: ExpoState) -> Router {
    let body_limit = state.config.uploads.max_request_bytes;
    let uploads_dir = ServeDir::new(state.uploads.root().to_path_buf());
    let cors = state
        .config
        .basic
        .cors_allow_origin
        .as_deref()
        .and_then(|origin| origin.parse::<HeaderValue>().ok())
        .map(|origin| {
            CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE])
        });

    let router = Router::new()
        .route("/health", get(health))
        .route("/login", post(session::login))
        .route("/login_get", get(session::login_get))
        .route("/login/session", post(session::login_session))
        .route("/logout", post(session::logout))
        .route("/me", get(session::me))
        .route("/users", get(users::list_users))
        .route("/users/me", get(session::me))
        .route("/users/me_admin", get(users::me_admin))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/exhibitions",
            get(exhibitions::list_exhibitions).post(exhibitions::create_exhibition),
        )
        .route("/exhibitions/active", get(exhibitions::active_exhibition))
        .route(
            "/exhibitions/{id}",
            get(exhibitions::get_exhibition)
                .put(exhibitions::update_exhibition)
                .delete(exhibitions::delete_exhibition),
        )
        .route(
            "/exhibitions/{id}/activate",
            post(exhibitions::activate_exhibition),
        )
        .route("/exhibitions/{id}/preview", post(exhibitions::upload_preview))
        .route("/exhibitions/{id}/stats", get(exhibitions::export_contacts))
        .route(
            "/contacts",
            get(contacts::list_contacts).post(contacts::create_contact),
        )
        .route("/contacts/questionnaire", get(contacts::questionnaire))
        .route("/contacts/batch", post(contacts::create_batch))
        .route("/contacts/check-duplicate", post(contacts::check_duplicate))
        .route("/contacts/stats/overview", get(contacts::stats_overview))
        .route(
            "/contacts/{id}",
            get(contacts::get_contact)
                .put(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        .route("/contacts/{id}/admin", put(contacts::admin_update_contact))
        .route("/contacts/{id}/validate", patch(contacts::validate_contact))
        .route(
            "/contacts/{id}/files",
            get(contacts::list_contact_files).post(contacts::upload_contact_files),
        )
        .route(
            "/contacts/{id}/files/{file_id}",
            delete(contacts::delete_contact_file),
        )
        .route("/files", get(files::list_files))
        .route("/files/upload", post(files::upload_file))
        .route("/files/upload-multiple", post(files::upload_files))
        .route("/files/business-card", post(files::upload_business_card))
        .route("/files/{id}", get(files::get_file).delete(files::delete_file))
        .route("/ocr", post(ocr::recognize))
        .route("/ocr/enhanced", post(ocr::recognize_enhanced))
        .nest_service("/uploads", uploads_dir)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_cookie_secret_is_a_config_error() {
        assert!(matches!(
            cookie_key("too-short"),
            Err(ExpoError::Config(_))
        ));
        assert!(cookie_key(&"k".repeat(64)).is_ok());
        assert!(cookie_key("").is_ok());
    }

    #[test]
    fn bundled_questionnaire_is_an_object() {
        let q = load_questionnaire(&Config::default()).unwrap();
        assert!(q.get("passport").is_some_and(Value::is_array));
    }
}
