// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Lookups in the environment endpoint payload.

use serde_json::Value;

/// Property source the embedded web server publishes its ports in.
const SERVER_PORTS: &str = "server.ports";

pub const LOCAL_SERVER_PORT: &str = "local.server.port";

/// Profiles listed in the environment, `activeProfiles` (2.x) taking
/// precedence over `profiles` (1.x). Non-string entries are skipped; any
/// other shape yields `None`.
pub fn active_profiles(env: &Value) -> Option<Vec<String>> {
    let profiles = env
        .get("activeProfiles")
        .filter(|v| !v.is_null())
        .or_else(|| env.get("profiles"))?
        .as_array()?;

    Some(
        profiles
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

/// The `local.server.port` published in the `server.ports` source, either
/// as a top-level entry (1.x) or inside `propertySources` (2.x).
pub fn server_port(env: &Value) -> Option<u16> {
    if let Some(port) = env
        .get(SERVER_PORTS)
        .and_then(|ports| ports.get(LOCAL_SERVER_PORT))
        .and_then(port_from_value)
    {
        return Some(port);
    }

    env.get("propertySources")?
        .as_array()?
        .iter()
        .filter(|source| source.get("name").and_then(Value::as_str) == Some(SERVER_PORTS))
        .find_map(|source| {
            source
                .get("properties")?
                .get(LOCAL_SERVER_PORT)?
                .get("value")
                .and_then(port_from_value)
        })
}

/// A port given as a JSON number or a numeric string.
pub fn port_from_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_active_profiles_preferred() {
        let env = json!({"activeProfiles": ["dev", "test"], "profiles": ["prod"]});
        assert_eq!(
            active_profiles(&env),
            Some(vec!["dev".to_string(), "test".to_string()])
        );
    }

    #[test]
    fn test_legacy_profiles() {
        let env = json!({"profiles": ["prod"]});
        assert_eq!(active_profiles(&env), Some(vec!["prod".to_string()]));
    }

    #[test]
    fn test_no_profiles() {
        assert_eq!(active_profiles(&json!({"propertySources": []})), None);
        assert_eq!(active_profiles(&json!({"activeProfiles": "dev"})), None);
        assert_eq!(active_profiles(&json!([])), None);
    }

    #[test]
    fn test_non_string_profiles_skipped() {
        let env = json!({"activeProfiles": ["dev", 3, null, "cloud"]});
        assert_eq!(
            active_profiles(&env),
            Some(vec!["dev".to_string(), "cloud".to_string()])
        );
    }

    #[test]
    fn test_server_port_top_level() {
        let env = json!({"server.ports": {"local.server.port": 8080}});
        assert_eq!(server_port(&env), Some(8080));
    }

    #[test]
    fn test_server_port_in_property_sources() {
        let env = json!({
            "activeProfiles": [],
            "propertySources": [
                {"name": "systemProperties", "properties": {"local.server.port": {"value": "1"}}},
                {"name": "server.ports", "properties": {"local.server.port": {"value": "9090"}}}
            ]
        });
        assert_eq!(server_port(&env), Some(9090));
    }

    #[test]
    fn test_server_port_missing() {
        assert_eq!(server_port(&json!({"propertySources": []})), None);
        assert_eq!(
            server_port(&json!({"server.ports": {"local.management.port": 8081}})),
            None
        );
    }

    #[test]
    fn test_port_from_value() {
        assert_eq!(port_from_value(&json!("8080")), Some(8080));
        assert_eq!(port_from_value(&json!(443)), Some(443));
        assert_eq!(port_from_value(&json!(70000)), None);
        assert_eq!(port_from_value(&json!("http")), None);
        assert_eq!(port_from_value(&Value::Null), None);
    }
}
