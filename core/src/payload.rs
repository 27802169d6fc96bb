//! Request payload for the primary bootstrap request.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Ephemeral payload assembled once per resolution attempt.
///
/// Every field defaults to an empty string so the payload always encodes
/// cleanly even when a dependency (push token, attribution token) did not
/// resolve in time.
#[derive(Debug, Clone, Default)]
pub struct BootstrapPayload {
    pub device_id: String,
    pub session_id: String,
    pub push_token: String,
    pub os_version: String,
    pub device_model: String,
    pub bundle_id: String,
    pub att_token: String,
}

impl BootstrapPayload {
    /// Encodes as base64 over `key=value` pairs joined with `&`, values
    /// percent-encoded. Field order is fixed so the wire form is stable.
    pub fn encode(&self) -> String {
        let fields = [
            ("device_id", &self.device_id),
            ("uid", &self.session_id),
            ("fcm_token", &self.push_token),
            ("os_version", &self.os_version),
            ("dev_model", &self.device_model),
            ("bundle", &self.bundle_id),
            ("att_token", &self.att_token),
        ];
        let query = fields
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        BASE64.encode(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(encoded: &str) -> String {
        let bytes = BASE64.decode(encoded).unwrap_or_default();
        String::from_utf8(bytes).unwrap_or_default()
    }

    #[test]
    fn encodes_all_fields_in_order() {
        let payload = BootstrapPayload {
            device_id: "dev-1".to_string(),
            session_id: "sess-1".to_string(),
            push_token: "tok".to_string(),
            os_version: "17.2".to_string(),
            device_model: "phone".to_string(),
            bundle_id: "com.example.app".to_string(),
            att_token: "att".to_string(),
        };
        let expected = "device_id=dev-1&uid=sess-1&fcm_token=tok&os_version=17.2\
                        &dev_model=phone&bundle=com.example.app&att_token=att";
        assert_eq!(expected, decode(&payload.encode()));
    }

    #[test]
    fn empty_payload_is_still_well_formed() {
        let decoded = decode(&BootstrapPayload::default().encode());
        assert_eq!(7, decoded.split('&').count());
        assert!(decoded.starts_with("device_id="));
    }

    #[test]
    fn values_are_percent_encoded() {
        let payload = BootstrapPayload {
            device_model: "a b&c".to_string(),
            ..Default::default()
        };
        let decoded = decode(&payload.encode());
        assert!(decoded.contains("dev_model=a%20b%26c"));
    }
}
