use claudius::{
    Anthropic, ContentBlock, KnownModel, MessageCreateParams, MessageParam, MessageRole, Model,
};

use crate::{generate_policy_name, ChatError};

/// The system instruction describing intents and the response shape.
pub const SYSTEM_PROMPT: &str = include_str!("../prompts/classify.md");

/// Turns free text into an unvalidated intent record.
#[allow(async_fn_in_trait)]
pub trait Classifier {
    /// Classify `user_text`, returning the model's raw response text.
    async fn classify(&self, user_text: &str) -> Result<String, ChatError>;
}

/// Build the per-request prompt embedding the user's text and a default policy name.
pub fn classification_prompt(user_text: &str, default_policy_name: &str) -> String {
    format!(
        r#"Classify the following user request into one of the intents: get_policy, create_policy, delete_policy, modify_policy, get_user, delete_user.
If the intent is create_policy and no policy name is given, the policy name is {default_policy_name}.

Request: "{user_text}"

Response format: {{"intent": "<intent>", "details": <json_details_if_needed>}}"#
    )
}

///////////////////////////////////////// ClaudeClassifier /////////////////////////////////////////

/// A [`Classifier`] backed by Anthropic's Messages API.
pub struct ClaudeClassifier {
    client: Anthropic,
    max_tokens: u32,
}

impl ClaudeClassifier {
    /// Create a classifier.  With no API key, `ANTHROPIC_API_KEY` is consulted.
    pub fn new(api_key: Option<String>, max_tokens: u32) -> Result<Self, ChatError> {
        let client = Anthropic::new(api_key)?;
        Ok(Self { client, max_tokens })
    }

    fn request_for(&self, user_text: &str) -> MessageCreateParams {
        let policy_name = generate_policy_name();
        MessageCreateParams {
            max_tokens: self.max_tokens,
            model: Model::Known(KnownModel::ClaudeSonnet40),
            messages: vec![MessageParam::new_with_string(
                classification_prompt(user_text, &policy_name),
                MessageRole::User,
            )],
            system: Some(SYSTEM_PROMPT.to_string().into()),
            ..Default::default()
        }
    }
}

impl Classifier for ClaudeClassifier {
    async fn classify(&self, user_text: &str) -> Result<String, ChatError> {
        let req = self.request_for(user_text);
        let resp = self.client.send(req).await?;
        tracing::debug!(
            input_tokens = resp.usage.input_tokens,
            output_tokens = resp.usage.output_tokens,
            "classification usage"
        );
        let raw_response = resp
            .content
            .iter()
            .flat_map(|c| {
                if let ContentBlock::Text(t) = c {
                    Some(t.text.clone())
                } else {
                    None
                }
            })
            .collect::<String>();
        tracing::debug!(%raw_response, "classification");
        Ok(raw_response)
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use claudius::MessageParamContent;

    use super::*;

    #[test]
    fn prompt_embeds_request_and_name() {
        let prompt = classification_prompt("show policies for alice", "test_policy_x");
        assert!(prompt.contains("Request: \"show policies for alice\""));
        assert!(prompt.contains("test_policy_x"));
        assert!(prompt.contains(r#"{"intent": "<intent>", "details": <json_details_if_needed>}"#));
    }

    #[test]
    fn system_prompt_names_every_intent() {
        for intent in [
            "get_policy",
            "create_policy",
            "delete_policy",
            "modify_policy",
            "get_user",
            "delete_user",
            "clarify",
        ] {
            assert!(SYSTEM_PROMPT.contains(intent), "missing {intent}");
        }
    }

    #[test]
    fn each_request_mints_a_new_name() {
        let classifier = ClaudeClassifier::new(Some("sk-test".to_string()), 1024).unwrap();
        let texts = [
            classifier.request_for("create a hive policy"),
            classifier.request_for("create a hive policy"),
        ]
        .map(|req| match &req.messages[0].content {
            MessageParamContent::String(s) => s.clone(),
            _ => panic!("expected a string message"),
        });
        assert_ne!(texts[0], texts[1]);
        assert!(texts.iter().all(|t| t.contains(crate::POLICY_NAME_PREFIX)));
    }

    #[tokio::test]
    #[ignore = "calls the Anthropic API"]
    async fn classify_live() {
        let classifier = ClaudeClassifier::new(None, 1024).unwrap();
        let raw = classifier
            .classify("list the policies for user alice")
            .await
            .unwrap();
        let record = crate::IntentRecord::parse(&raw).unwrap();
        assert_eq!("get_policy", record.intent);
    }
}
