/// The user-facing message for requests that cannot be acted upon.
pub const INVALID_REQUEST: &str = "Invalid request. Please provide more details.";

/// The user-facing message when a named policy does not exist.
pub const POLICY_NOT_FOUND: &str = "Policy not found.";

///////////////////////////////////////////// ChatError ////////////////////////////////////////////

/// Errors that can occur while turning a request into a policy API call.
///
/// Every variant renders to a JSON error object via [`ChatError::to_json`]; none of them is
/// allowed to escape a conversational turn.
#[derive(Debug)]
pub enum ChatError {
    /// The policy API answered with a non-success status.
    Http {
        /// The status code.
        status: u16,
        /// The response body, verbatim.
        body: String,
    },
    /// The policy API could not be reached or the exchange failed mid-flight.
    Transport {
        /// What went wrong.
        message: String,
    },
    /// The policy API answered with success but the body was not what we expected.
    InvalidResponse {
        /// What was wrong with the body.
        message: String,
    },
    /// No policy with the given name exists on the server.
    PolicyNotFound {
        /// The name that was looked up.
        name: String,
    },
    /// An error occurred while communicating with the LLM.
    Classifier(claudius::Error),
    /// The LLM's response could not be parsed as an intent record.
    InvalidClassification {
        /// Why parsing failed.
        message: String,
    },
    /// The LLM asked for more information instead of classifying.
    ClarificationNeeded {
        /// The model's question for the user.
        question: String,
    },
    /// A policy document could not be built from the request's details.
    Template {
        /// Which value was unusable.
        message: String,
    },
    /// The intent was unrecognized or a required detail was missing.
    IncompleteRequest,
}

impl ChatError {
    /// Create an InvalidClassification error.
    pub fn invalid_classification(message: impl Into<String>) -> Self {
        Self::InvalidClassification {
            message: message.into(),
        }
    }

    /// Create a Template error.
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an InvalidResponse error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Render this error as the JSON object shown to the user.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ChatError::Http { body, .. } => serde_json::json! {{ "error": body }},
            ChatError::PolicyNotFound { .. } => serde_json::json! {{ "error": POLICY_NOT_FOUND }},
            ChatError::IncompleteRequest => serde_json::json! {{ "error": INVALID_REQUEST }},
            ChatError::ClarificationNeeded { question } => serde_json::json! {{
                "error": INVALID_REQUEST,
                "question": question,
            }},
            _ => serde_json::json! {{ "error": format!("Error processing request: {self}") }},
        }
    }
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::Http { status, body } => write!(f, "policy API returned {status}: {body}"),
            ChatError::Transport { message } => write!(f, "policy API unreachable: {message}"),
            ChatError::InvalidResponse { message } => {
                write!(f, "unexpected policy API response: {message}")
            }
            ChatError::PolicyNotFound { name } => write!(f, "no policy named '{name}'"),
            ChatError::Classifier(err) => write!(f, "LLM communication error: {err}"),
            ChatError::InvalidClassification { message } => {
                write!(f, "could not parse classification: {message}")
            }
            ChatError::ClarificationNeeded { question } => {
                write!(f, "clarification needed: {question}")
            }
            ChatError::Template { message } => write!(f, "could not render policy: {message}"),
            ChatError::IncompleteRequest => write!(f, "{INVALID_REQUEST}"),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChatError::Classifier(err) => Some(err),
            _ => None,
        }
    }
}

impl From<claudius::Error> for ChatError {
    fn from(err: claudius::Error) -> Self {
        Self::Classifier(err)
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

//////////////////////////////////////////// ConfigError ///////////////////////////////////////////

/// Errors that can occur while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    ReadFile {
        /// The file's path.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for our schema.
    ParseFile {
        /// The file's path.
        path: String,
        /// The parser's message.
        message: String,
    },
    /// An environment override could not be interpreted.
    InvalidOverride {
        /// The variable name.
        key: String,
        /// The rejected value.
        value: String,
    },
    /// A required setting has no value after all layers were applied.
    Missing {
        /// The dotted name of the setting.
        setting: String,
        /// Where the setting can be supplied.
        suggestion: String,
    },
}

impl ConfigError {
    /// Create a Missing error with a suggestion for where to set it.
    pub fn missing(setting: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Missing {
            setting: setting.into(),
            suggestion: suggestion.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadFile { path, source } => {
                write!(f, "could not read config file `{path}`: {source}")
            }
            ConfigError::ParseFile { path, message } => {
                write!(f, "could not parse config file `{path}`: {message}")
            }
            ConfigError::InvalidOverride { key, value } => {
                write!(f, "invalid value for `{key}`: `{value}`")
            }
            ConfigError::Missing {
                setting,
                suggestion,
            } => {
                write!(f, "missing required setting `{setting}`\nSuggestion: {suggestion}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFile { source, .. } => Some(source),
            _ => None,
        }
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_passes_body_through() {
        let err = ChatError::Http {
            status: 500,
            body: "internal <b>failure</b>".to_string(),
        };
        assert_eq!(
            serde_json::json! {{ "error": "internal <b>failure</b>" }},
            err.to_json()
        );
    }

    #[test]
    fn not_found_and_incomplete_use_fixed_messages() {
        let err = ChatError::PolicyNotFound {
            name: "p1".to_string(),
        };
        assert_eq!(serde_json::json! {{ "error": "Policy not found." }}, err.to_json());
        assert_eq!(
            serde_json::json! {{ "error": "Invalid request. Please provide more details." }},
            ChatError::IncompleteRequest.to_json()
        );
    }

    #[test]
    fn parse_failure_mentions_parse() {
        let err = ChatError::invalid_classification("expected value at line 1 column 1");
        let json = err.to_json();
        let message = json["error"].as_str().unwrap();
        assert!(message.starts_with("Error processing request:"));
        assert!(message.contains("could not parse classification"));
    }

    #[test]
    fn clarification_carries_question() {
        let err = ChatError::ClarificationNeeded {
            question: "Which policy should I delete?".to_string(),
        };
        let json = err.to_json();
        assert_eq!(json["error"], INVALID_REQUEST);
        assert_eq!(json["question"], "Which policy should I delete?");
    }

    #[test]
    fn missing_config_display() {
        let err = ConfigError::missing("ranger.password", "set POLICYCHAT_RANGER_PASSWORD");
        assert_eq!(
            "missing required setting `ranger.password`\nSuggestion: set POLICYCHAT_RANGER_PASSWORD",
            err.to_string()
        );
    }
}
