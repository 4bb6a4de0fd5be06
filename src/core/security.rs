use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";
const SESSION_TOKEN_ENV: &str = "EXEMPLAR_SESSION_TOKEN";
const SESSION_TOKEN_FILE: &str = ".session_token";

/// Shared secret required on routes that change configuration or stored examples.
#[derive(Debug, Clone)]
pub struct SessionToken {
    value: String,
}

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Uses `EXEMPLAR_SESSION_TOKEN` when set, otherwise mints a token and writes
/// it next to the user data so local clients can read it.
pub fn init_session_token(paths: &AppPaths) -> SessionToken {
    if let Ok(token) = env::var(SESSION_TOKEN_ENV) {
        if !token.trim().is_empty() {
            return SessionToken::new(token.trim());
        }
    }

    let token = SessionToken::new(format!("{}{}", Uuid::new_v4(), Uuid::new_v4()).replace('-', ""));
    let token_path = session_token_path(paths);
    match fs::write(&token_path, token.value()) {
        Ok(()) => {
            restrict_permissions(&token_path);
            tracing::info!("Session token written to {}", token_path.display());
        }
        Err(err) => tracing::warn!(
            "Failed to write session token to {}: {}",
            token_path.display(),
            err
        ),
    }
    token
}

pub fn session_token_path(paths: &AppPaths) -> PathBuf {
    paths.user_data_dir.join(SESSION_TOKEN_FILE)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to restrict session token permissions: {}", err);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

pub fn require_api_key(headers: &HeaderMap, expected: &SessionToken) -> Result<(), ApiError> {
    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() || header_value != expected.value() {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}
