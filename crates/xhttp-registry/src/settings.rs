use std::collections::HashMap;

use xhttp_core::{SecurityType, StreamSettings, TunnelError};

/// Parse a persisted configuration blob into a normalized [`StreamSettings`]
/// (spec §3: "produced once per configuration from a persisted form").
///
/// The expected shape is intentionally loose — `{"protocol": "...",
/// "protocolSettings": {...}, "security": "none"|"tls"|"reality",
/// "securitySettings": {...}, "socketSettings": {...}}` — since the concrete
/// protocol/security collaborators (spec §1) own their own sub-schemas and
/// this function only needs to recognize the envelope.
///
/// # Errors
///
/// Returns [`TunnelError::Validation`] if `protocol` is missing or
/// `security` names an unrecognized value.
pub fn normalize(raw: &serde_json::Value) -> Result<StreamSettings, TunnelError> {
    let protocol_name = raw
        .get("protocol")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| TunnelError::Validation("missing `protocol` field".to_string()))?
        .to_string();

    let security_type = match raw.get("security").and_then(serde_json::Value::as_str) {
        None | Some("none") => SecurityType::None,
        Some("tls") => SecurityType::Tls,
        Some("reality") => SecurityType::Reality,
        Some(other) => {
            return Err(TunnelError::Validation(format!(
                "unrecognized security type '{other}'"
            )));
        }
    };

    Ok(StreamSettings {
        protocol_name,
        protocol_settings: object_field(raw, "protocolSettings"),
        security_type,
        security_settings: object_field(raw, "securitySettings"),
        socket_settings: object_field(raw, "socketSettings"),
    })
}

fn object_field(raw: &serde_json::Value, key: &str) -> HashMap<String, serde_json::Value> {
    raw.get(key)
        .and_then(serde_json::Value::as_object)
        .map(|m| m.clone().into_iter().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_minimal_config() {
        let raw = serde_json::json!({ "protocol": "xhttp" });
        let settings = normalize(&raw).unwrap();
        assert_eq!(settings.protocol_name, "xhttp");
        assert!(!settings.is_secure());
    }

    #[test]
    fn normalizes_full_config() {
        let raw = serde_json::json!({
            "protocol": "xhttp",
            "protocolSettings": {"path": "/tunnel/"},
            "security": "tls",
            "securitySettings": {"serverName": "example.com"},
            "socketSettings": {"mark": 255},
        });
        let settings = normalize(&raw).unwrap();
        assert!(settings.is_secure());
        assert_eq!(
            settings.protocol_settings.get("path").and_then(serde_json::Value::as_str),
            Some("/tunnel/")
        );
    }

    #[test]
    fn missing_protocol_is_rejected() {
        let raw = serde_json::json!({});
        assert!(normalize(&raw).is_err());
    }

    #[test]
    fn unknown_security_type_is_rejected() {
        let raw = serde_json::json!({ "protocol": "xhttp", "security": "quantum" });
        assert!(normalize(&raw).is_err());
    }
}
