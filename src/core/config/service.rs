use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::{ProviderKind, Settings};
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

/// Leaf keys stored in `secrets.yaml` instead of `config.yml` and masked on
/// read. Every provider section (`generation`, `comparator`, `embedding`)
/// carries its credential under this name.
const SECRET_KEYS: [&str; 1] = ["api_key"];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("EXEMPLAR_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn config_write_path(&self) -> PathBuf {
        if let Ok(path) = env::var("EXEMPLAR_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        self.paths.user_data_dir.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Merged file configuration (public config overlaid with secrets).
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.secrets_path());
        let merged = deep_merge(&public_config, &secrets_config);
        Ok(merged)
    }

    /// File configuration with process environment overrides applied, validated and typed.
    pub fn load_settings(&self) -> Result<Settings, ApiError> {
        let mut config = self.load_config()?;
        apply_env_overrides(&mut config, |key| env::var(key).ok());
        validate_config(&config)?;
        Settings::from_value(&config)
    }

    pub fn update_config(&self, config_data: Value, merge: bool) -> Result<(), ApiError> {
        let current = self.load_config()?;
        let restored = restore_redacted_values(&config_data, &current);
        let to_save = if merge {
            deep_merge(&current, &restored)
        } else {
            restored
        };

        validate_config(&to_save)?;
        save_config_files(self, &to_save)?;
        Ok(())
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

/// Maps the legacy environment variables onto config paths.
///
/// `lookup` is injected so overrides can be exercised without touching the process env.
pub fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(provider) = get("AI_PROVIDER") {
        set_path(config, &["generation", "provider"], Value::String(provider.to_lowercase()));
    }
    let provider = config
        .pointer("/generation/provider")
        .and_then(Value::as_str)
        .and_then(ProviderKind::parse)
        .unwrap_or_default();

    if let Some(key) = get("OPENAI_API_KEY") {
        if provider == ProviderKind::OpenAi {
            set_path(config, &["generation", "api_key"], Value::String(key.clone()));
        }
        set_path(config, &["embedding", "api_key"], Value::String(key));
    }

    match provider {
        ProviderKind::OpenAi => {
            if let Some(model) = get("OPENAI_MODEL") {
                set_path(config, &["generation", "model"], Value::String(model));
            }
            if let Some(url) = get("OPENAI_BASE_URL") {
                set_path(config, &["generation", "base_url"], Value::String(url));
            }
        }
        ProviderKind::Ollama => {
            if let Some(model) = get("OLLAMA_MODEL") {
                set_path(config, &["generation", "model"], Value::String(model));
            }
            if let Some(url) = get("OLLAMA_API_BASE_URL") {
                set_path(config, &["generation", "base_url"], Value::String(url));
            }
        }
    }

    if let Some(model) = get("EMBEDDING_MODEL") {
        set_path(config, &["embedding", "model"], Value::String(model));
    }
    if let Some(value) = get("MAX_RETRIEVAL_RESULTS").and_then(|v| v.parse::<u64>().ok()) {
        set_path(config, &["rag", "max_results"], Value::from(value));
    }
    if let Some(value) = get("CONFIDENCE_THRESHOLD").and_then(|v| v.parse::<f64>().ok()) {
        set_path(config, &["rag", "confidence_threshold"], Value::from(value));
    }
    if let Some(level) = get("LOG_LEVEL") {
        set_path(config, &["logging", "level"], Value::String(level.to_lowercase()));
    }
    if let Some(host) = get("HOST") {
        set_path(config, &["server", "host"], Value::String(host));
    }
    if let Some(port) = get("PORT").and_then(|v| v.parse::<u64>().ok()) {
        set_path(config, &["server", "port"], Value::from(port));
    }
}

fn set_path(config: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut cursor = config;
    for key in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        cursor = match cursor {
            Value::Object(map) => map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }

    if !cursor.is_object() {
        *cursor = Value::Object(Map::new());
    }
    if let Value::Object(map) = cursor {
        map.insert(last.to_string(), value);
    }
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    let parsed = fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|contents| {
            serde_yaml::from_str::<Value>(&contents).map_err(|err| err.to_string())
        });
    match parsed {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => Value::Object(Map::new()),
        Err(err) => {
            tracing::warn!("Ignoring unreadable config file {}: {}", path.display(), err);
            Value::Object(Map::new())
        }
    }
}

fn save_config_files(service: &ConfigService, config: &Value) -> Result<(), ApiError> {
    let mut public_config = config.clone();
    let secrets_config = take_secrets(&mut public_config);

    write_yaml(&service.config_write_path(), &public_config)?;
    write_yaml(&service.secrets_path(), &secrets_config)
}

fn write_yaml(path: &Path, value: &Value) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ApiError::internal)?;
    }
    let yaml = serde_yaml::to_string(value).map_err(ApiError::internal)?;
    fs::write(path, yaml).map_err(ApiError::internal)
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn is_secret_key(key: &str) -> bool {
    SECRET_KEYS.iter().any(|secret| key.eq_ignore_ascii_case(secret))
}

/// Moves every non-null secret out of `config`, returning them under the same
/// section paths. Sections left empty are dropped from both sides.
fn take_secrets(config: &mut Value) -> Value {
    let mut secrets = Map::new();
    if let Value::Object(map) = config {
        let keys: Vec<String> = map.keys().cloned().collect();
        for key in keys {
            let Some(value) = map.get_mut(&key) else {
                continue;
            };
            if value.is_object() {
                let nested = take_secrets(value);
                if !is_empty_object(&nested) {
                    secrets.insert(key.clone(), nested);
                }
                if is_empty_object(value) {
                    map.remove(&key);
                }
            } else if is_secret_key(&key) && !value.is_null() {
                if let Some(secret) = map.remove(&key) {
                    secrets.insert(key, secret);
                }
            }
        }
    }
    Value::Object(secrets)
}

fn redact_secrets(value: &mut Value) {
    if let Value::Object(map) = value {
        for (key, item) in map.iter_mut() {
            if is_secret_key(key) && !item.is_null() {
                *item = Value::String(REDACT_PLACEHOLDER.to_string());
            } else {
                redact_secrets(item);
            }
        }
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    let mut redacted = value.clone();
    redact_secrets(&mut redacted);
    redacted
}

/// Puts stored secrets back where a client echoed the placeholder.
/// A placeholder with nothing stored behind it is dropped.
fn restore_redacted_values(new_value: &Value, original: &Value) -> Value {
    let mut restored = new_value.clone();
    restore_secrets(&mut restored, original);
    restored
}

fn restore_secrets(value: &mut Value, original: &Value) {
    let Value::Object(map) = value else {
        return;
    };
    map.retain(|key, item| {
        item.as_str() != Some(REDACT_PLACEHOLDER) || original.get(key).is_some()
    });
    for (key, item) in map.iter_mut() {
        let stored = original.get(key);
        if item.as_str() == Some(REDACT_PLACEHOLDER) {
            if let Some(stored) = stored {
                *item = stored.clone();
            }
        } else if item.is_object() {
            restore_secrets(item, stored.unwrap_or(&Value::Null));
        }
    }
}

fn is_empty_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}
