use serde_json::{Map, Value};
use crate::core::errors::ApiError;

const PROVIDERS: [&str; 2] = ["openai", "ollama"];
const EMBEDDING_PROVIDERS: [&str; 2] = ["http", "hashing"];
const STORE_BACKENDS: [&str; 2] = ["sqlite", "memory"];

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_string_array_field(server, "server.cors_origins", "cors_origins")?;
    }

    if let Some(store) = expect_optional_object(root, "store")? {
        validate_choice_field(store, "store.backend", "backend", &STORE_BACKENDS)?;
        validate_optional_string_field(store, "store.path", "path")?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_choice_field(
            embedding,
            "embedding.provider",
            "provider",
            &EMBEDDING_PROVIDERS,
        )?;
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_u64_field(
            embedding,
            "embedding.dimensions",
            "dimensions",
            8,
            65_536,
        )?;
        validate_u64_field(
            embedding,
            "embedding.timeout_secs",
            "timeout_secs",
            1,
            86_400,
        )?;
    }

    validate_provider_section(root, "generation")?;
    validate_provider_section(root, "comparator")?;

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_u64_field(rag, "rag.max_results", "max_results", 1, 100)?;
        validate_f64_field(
            rag,
            "rag.confidence_threshold",
            "confidence_threshold",
            0.0,
            1.0,
        )?;
        validate_bool_field(rag, "rag.filter_fallback", "filter_fallback")?;
        validate_u64_field(
            rag,
            "rag.ingest_batch_size",
            "ingest_batch_size",
            1,
            10_000,
        )?;
    }

    if let Some(generation_loop) = expect_optional_object(root, "generation_loop")? {
        validate_u64_field(
            generation_loop,
            "generation_loop.attempt_timeout_secs",
            "attempt_timeout_secs",
            1,
            86_400,
        )?;
        validate_u64_field(
            generation_loop,
            "generation_loop.request_timeout_secs",
            "request_timeout_secs",
            1,
            86_400,
        )?;
    }

    if let Some(logging) = expect_optional_object(root, "logging")? {
        validate_optional_string_field(logging, "logging.level", "level")?;
    }

    Ok(())
}

fn validate_provider_section(root: &Map<String, Value>, name: &str) -> Result<(), ApiError> {
    let Some(section) = expect_optional_object(root, name)? else {
        return Ok(());
    };
    validate_choice_field(
        section,
        &format!("{}.provider", name),
        "provider",
        &PROVIDERS,
    )?;
    validate_optional_string_field(section, &format!("{}.base_url", name), "base_url")?;
    validate_optional_string_field(section, &format!("{}.model", name), "model")?;
    validate_optional_string_field(section, &format!("{}.api_key", name), "api_key")?;
    validate_f64_field(
        section,
        &format!("{}.temperature", name),
        "temperature",
        0.0,
        2.0,
    )?;
    validate_f64_field(section, &format!("{}.top_p", name), "top_p", 0.0, 1.0)?;
    validate_u64_field(
        section,
        &format!("{}.max_tokens", name),
        "max_tokens",
        1,
        1_000_000,
    )?;
    validate_u64_field(
        section,
        &format!("{}.timeout_secs", name),
        "timeout_secs",
        1,
        86_400,
    )?;
    validate_u64_field(
        section,
        &format!("{}.probe_timeout_secs", name),
        "probe_timeout_secs",
        1,
        600,
    )?;
    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if !number.is_finite() || number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_choice_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    choices: &[&str],
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !choices.contains(&text) {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': expected one of {}",
            path,
            choices.join(", ")
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_typical_config() {
        validate_config(&json!({})).unwrap();
        validate_config(&json!({
            "server": { "host": "0.0.0.0", "port": 8000 },
            "rag": { "max_results": 5, "confidence_threshold": 0.7, "filter_fallback": true },
            "generation": { "provider": "ollama", "temperature": 0.1 },
            "embedding": { "provider": "hashing", "dimensions": 384 }
        }))
        .unwrap();
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = validate_config(&json!({ "rag": { "confidence_threshold": 1.5 } })).unwrap_err();
        assert!(err.to_string().contains("rag.confidence_threshold"));
    }

    #[test]
    fn rejects_unknown_provider_and_wrong_types() {
        let err = validate_config(&json!({ "comparator": { "provider": "bard" } })).unwrap_err();
        assert!(err.to_string().contains("comparator.provider"));

        let err = validate_config(&json!({ "rag": { "max_results": "five" } })).unwrap_err();
        assert!(err.to_string().contains("expected integer"));

        let err = validate_config(&json!({ "store": [] })).unwrap_err();
        assert!(err.to_string().contains("expected object"));
    }
}
