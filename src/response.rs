use serde::Serialize;

/// Uniform response body used by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    /// Success without a payload; `data` is omitted from the JSON.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_includes_data() {
        let env = Envelope::success("Users found", vec![1, 2, 3]);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "Users found");
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn message_only_envelope_omits_data() {
        let env = Envelope::ok("User deleted");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["status"], "success");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn error_envelope_omits_data() {
        let env = Envelope::error("User not found");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "User not found");
        assert!(json.get("data").is_none());
    }
}
