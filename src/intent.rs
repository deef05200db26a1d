use crate::ChatError;

/// What the user wants done.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Intent {
    /// List policies or fetch one.
    GetPolicy,
    /// Create a policy.
    CreatePolicy,
    /// Delete a policy.
    DeletePolicy,
    /// Change a policy.
    ModifyPolicy,
    /// Look up a user.
    GetUser,
    /// Delete a user.
    DeleteUser,
    /// The model needs more information before it can classify.
    Clarify,
}

impl Intent {
    /// Map the model's intent label to an intent.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "get_policy" => Some(Self::GetPolicy),
            "create_policy" => Some(Self::CreatePolicy),
            "delete_policy" => Some(Self::DeletePolicy),
            "modify_policy" => Some(Self::ModifyPolicy),
            "get_user" => Some(Self::GetUser),
            "delete_user" => Some(Self::DeleteUser),
            "clarify" => Some(Self::Clarify),
            _ => None,
        }
    }
}

/// A classified request: the intent label plus whatever details the model extracted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntentRecord {
    /// The raw intent label.
    pub intent: String,
    /// Field name to value.
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl IntentRecord {
    /// Best-effort parse of a model response into an intent record.
    ///
    /// Tolerates a ```json fenced block or prose around the object.  Anything that does not
    /// yield an object with a string `intent` is an invalid classification.
    pub fn parse(raw_response: &str) -> Result<Self, ChatError> {
        let json_content = if let Some(start) = raw_response.find("```json") {
            if let Some(end) = raw_response[start + 7..].find("```") {
                raw_response[start + 7..start + 7 + end].trim()
            } else {
                raw_response.trim()
            }
        } else if let Some(start) = raw_response.find('{') {
            match raw_response.rfind('}').filter(|&end| end > start) {
                Some(end) => &raw_response[start..=end],
                None => raw_response.trim(),
            }
        } else {
            raw_response.trim()
        };
        let value: serde_json::Value = serde_json::from_str(json_content)
            .map_err(|err| ChatError::invalid_classification(err.to_string()))?;
        let serde_json::Value::Object(mut object) = value else {
            return Err(ChatError::invalid_classification(
                "response is not a JSON object",
            ));
        };
        let intent = match object.remove("intent") {
            Some(serde_json::Value::String(intent)) => intent,
            Some(other) => {
                return Err(ChatError::invalid_classification(format!(
                    "intent must be a string, got {other}"
                )))
            }
            None => return Err(ChatError::invalid_classification("missing \"intent\"")),
        };
        let details = match object.remove("details") {
            None | Some(serde_json::Value::Null) => serde_json::Map::new(),
            Some(serde_json::Value::Object(details)) => details,
            Some(other) => {
                return Err(ChatError::invalid_classification(format!(
                    "details must be an object, got {other}"
                )))
            }
        };
        Ok(Self { intent, details })
    }

    /// The recognized intent, if any.
    pub fn kind(&self) -> Option<Intent> {
        Intent::from_label(&self.intent)
    }

    /// The detail `key` as a non-empty string.
    pub fn string(&self, key: &str) -> Option<&str> {
        self.details
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The detail `key` as a name, exactly as given.
    ///
    /// Names are matched exactly against the server, so surrounding whitespace is kept; only an
    /// all-blank value counts as absent.
    pub fn name(&self, key: &str) -> Option<&str> {
        self.details
            .get(key)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// The detail `key` as a policy id, accepting integers and numeric strings.
    pub fn id(&self, key: &str) -> Option<u64> {
        match self.details.get(key)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_object() {
        let record =
            IntentRecord::parse(r#"{"intent": "get_policy", "details": {"user": "alice"}}"#)
                .unwrap();
        assert_eq!(Some(Intent::GetPolicy), record.kind());
        assert_eq!(Some("alice"), record.string("user"));
    }

    #[test]
    fn parse_fenced_block() {
        let raw = "Here you go:\n```json\n{\"intent\": \"delete_policy\", \"details\": {\"policy_name\": \"p1\"}}\n```\n";
        let record = IntentRecord::parse(raw).unwrap();
        assert_eq!(Some(Intent::DeletePolicy), record.kind());
        assert_eq!(Some("p1"), record.string("policy_name"));
    }

    #[test]
    fn parse_object_surrounded_by_prose() {
        let raw = r#"Sure. {"intent": "create_policy", "details": {}} Let me know."#;
        let record = IntentRecord::parse(raw).unwrap();
        assert_eq!(Some(Intent::CreatePolicy), record.kind());
        assert!(record.details.is_empty());
    }

    #[test]
    fn missing_details_is_empty() {
        let record = IntentRecord::parse(r#"{"intent": "get_policy"}"#).unwrap();
        assert!(record.details.is_empty());
    }

    #[test]
    fn prose_is_invalid() {
        let err = IntentRecord::parse("Which policy would you like to delete?").unwrap_err();
        assert!(matches!(err, ChatError::InvalidClassification { .. }));
    }

    #[test]
    fn shape_errors_are_invalid() {
        for raw in [
            r#"["get_policy"]"#,
            r#"{"details": {}}"#,
            r#"{"intent": 3}"#,
            r#"{"intent": "get_policy", "details": "alice"}"#,
            "} {",
            "Sorry } I need more detail {",
        ] {
            let err = IntentRecord::parse(raw).unwrap_err();
            assert!(
                matches!(err, ChatError::InvalidClassification { .. }),
                "{raw} gave {err:?}"
            );
        }
    }

    #[test]
    fn user_labels_are_recognized() {
        assert_eq!(Some(Intent::GetUser), Intent::from_label("get_user"));
        assert_eq!(Some(Intent::DeleteUser), Intent::from_label(" delete_user "));
    }

    #[test]
    fn unknown_label_has_no_kind() {
        let record = IntentRecord::parse(r#"{"intent": "rename_policy"}"#).unwrap();
        assert_eq!(None, record.kind());
    }

    #[test]
    fn names_keep_surrounding_whitespace() {
        let record = IntentRecord::parse(
            r#"{"intent": "delete_policy", "details": {"policy_name": " p1 ", "blank": "  "}}"#,
        )
        .unwrap();
        assert_eq!(Some(" p1 "), record.name("policy_name"));
        assert_eq!(Some("p1"), record.string("policy_name"));
        assert_eq!(None, record.name("blank"));
        assert_eq!(None, record.name("missing"));
    }

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        let record = IntentRecord::parse(
            r#"{"intent": "modify_policy", "details": {"a": 12, "b": " 13 ", "c": "p1", "d": -1}}"#,
        )
        .unwrap();
        assert_eq!(Some(12), record.id("a"));
        assert_eq!(Some(13), record.id("b"));
        assert_eq!(None, record.id("c"));
        assert_eq!(None, record.id("d"));
        assert_eq!(None, record.id("missing"));
    }
}
