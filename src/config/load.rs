use super::types::{EndpointConfig, BOOLEAN_KEYS};
use crate::error::ConfigError;
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

/// Merge declared defaults with application-supplied overrides and validate
/// the mandatory key families.
///
/// Loader failures are fatal at boot: the endpoint must not start with
/// invalid mandatory configuration. Unrecognized keys are kept verbatim so
/// applications can stash their own values alongside the framework's.
pub fn load(
    otp_app: &str,
    endpoint: &str,
    overrides: HashMap<String, Value>,
) -> Result<EndpointConfig, ConfigError> {
    let mut values = EndpointConfig::defaults();
    let override_count = overrides.len();
    for (key, value) in overrides {
        values.insert(key, value);
    }

    validate(&values)?;

    info!(
        otp_app = otp_app,
        endpoint = endpoint,
        overrides = override_count,
        keys = values.len(),
        "Endpoint configuration loaded"
    );
    Ok(EndpointConfig::new(otp_app, endpoint, values))
}

fn validate(values: &HashMap<String, Value>) -> Result<(), ConfigError> {
    for key in BOOLEAN_KEYS {
        match values.get(key) {
            None | Some(Value::Bool(_)) | Some(Value::Null) => {}
            Some(other) => {
                return Err(ConfigError::MalformedKey {
                    key: key.to_string(),
                    reason: format!("expected a boolean, got {other}"),
                })
            }
        }
    }

    match values.get("force_ssl") {
        None | Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(other) => {
            return Err(ConfigError::MalformedKey {
                key: "force_ssl".to_string(),
                reason: format!("expected an options map or null, got {other}"),
            })
        }
    }

    match values.get("check_origin") {
        None | Some(Value::Null) | Some(Value::Bool(_)) | Some(Value::Array(_)) => {}
        Some(other) => {
            return Err(ConfigError::MalformedKey {
                key: "check_origin".to_string(),
                reason: format!("expected a boolean or list of hosts, got {other}"),
            })
        }
    }

    // A pubsub adapter is only addressable through its name; catching the
    // omission here keeps broadcast calls infallible on the config side.
    if let Some(Value::Object(pubsub)) = values.get("pubsub") {
        if let Some(adapter) = pubsub.get("adapter").and_then(Value::as_str) {
            let has_name = matches!(pubsub.get("name"), Some(Value::String(_)));
            if !has_name {
                return Err(ConfigError::PubSubMissingName {
                    adapter: adapter.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Read an application config file, YAML or JSON by extension.
///
/// The file maps endpoint names to their override sections; use
/// [`endpoint_overrides`] to pick one out.
pub fn load_config_file(file_path: &str) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(file_path)?;
    let value: Value = if file_path.ends_with(".yaml") || file_path.ends_with(".yml") {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(value)
}

/// Extract the override section for one endpoint from a parsed config file.
/// Missing sections yield an empty override map.
pub fn endpoint_overrides(config: &Value, endpoint: &str) -> HashMap<String, Value> {
    match config.get(endpoint) {
        Some(Value::Object(section)) => section
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        _ => HashMap::new(),
    }
}
