//! Uniform response envelope crossing the process boundary.
//!
//! Wire shape:
//! - success: `{"success": true}` or `{"success": true, "data": ...}`
//! - failure: `{"success": false, "error": "..."}`

use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Result of one command. Exactly one branch carries meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    /// `data` is `None` for pure side-effect commands.
    Success { data: Option<T> },
    Failure { error: String },
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self::Success { data: Some(data) }
    }

    /// Success without data.
    pub fn done() -> Self {
        Self::Success { data: None }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data } => data.as_ref(),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error.as_str()),
        }
    }

    pub fn into_result(self) -> Result<Option<T>, String> {
        match self {
            Self::Success { data } => Ok(data),
            Self::Failure { error } => Err(error),
        }
    }
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success { data: Some(data) } => {
                let mut state = serializer.serialize_struct("Envelope", 2)?;
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
                state.end()
            }
            Self::Success { data: None } => {
                let mut state = serializer.serialize_struct("Envelope", 1)?;
                state.serialize_field("success", &true)?;
                state.end()
            }
            Self::Failure { error } => {
                let mut state = serializer.serialize_struct("Envelope", 2)?;
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
                state.end()
            }
        }
    }
}

#[derive(Deserialize)]
struct RawEnvelope<T> {
    success: bool,
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Envelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEnvelope::<T>::deserialize(deserializer)?;
        if raw.success {
            Ok(Self::Success { data: raw.data })
        } else {
            raw.error
                .map(|error| Self::Failure { error })
                .ok_or_else(|| D::Error::missing_field("error"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Envelope;
    use serde_json::{json, Value};

    #[test]
    fn success_with_data_serializes_both_fields() {
        let envelope = Envelope::ok(json!({"hasKey": true}));
        assert_eq!(
            serde_json::to_value(&envelope).expect("serialize"),
            json!({"success": true, "data": {"hasKey": true}})
        );
    }

    #[test]
    fn side_effect_success_omits_data() {
        let envelope: Envelope<Value> = Envelope::done();
        assert_eq!(
            serde_json::to_value(&envelope).expect("serialize"),
            json!({"success": true})
        );
    }

    #[test]
    fn failure_carries_only_error() {
        let envelope: Envelope<Value> = Envelope::err("service is required");
        assert_eq!(
            serde_json::to_value(&envelope).expect("serialize"),
            json!({"success": false, "error": "service is required"})
        );
        assert_eq!(envelope.data(), None);
    }

    #[test]
    fn deserializes_wire_shapes_and_rejects_failure_without_error() {
        let ok: Envelope<Value> =
            serde_json::from_value(json!({"success": true, "data": [1, 2]})).expect("ok");
        assert_eq!(ok.data(), Some(&json!([1, 2])));

        let failed: Envelope<Value> =
            serde_json::from_value(json!({"success": false, "error": "boom"})).expect("failure");
        assert_eq!(failed.error(), Some("boom"));

        let broken = serde_json::from_value::<Envelope<Value>>(json!({"success": false}));
        assert!(broken.is_err());
    }
}
