use crate::{ChatError, Classifier, Intent, IntentRecord, PolicyClient, Templates, Transport};

/// Render a JSON value the way results are shown to the user: four-space indentation.
pub fn to_pretty_json(value: &serde_json::Value) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    match serde::Serialize::serialize(value, &mut ser) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => value.to_string(),
    }
}

/// Routes a classified request to the policy API.
///
/// The dispatcher owns one turn's worth of work: classify, parse, call the API.  It never
/// returns an error; every failure becomes a JSON error object.
pub struct Dispatcher<C: Classifier, T: Transport> {
    classifier: C,
    client: PolicyClient<T>,
    templates: Templates,
}

impl<C: Classifier, T: Transport> Dispatcher<C, T> {
    /// Create a dispatcher with the default templates.
    pub fn new(classifier: C, client: PolicyClient<T>) -> Self {
        Self::with_templates(classifier, client, Templates::default())
    }

    /// Create a dispatcher with a custom template registry.
    pub fn with_templates(classifier: C, client: PolicyClient<T>, templates: Templates) -> Self {
        Self {
            classifier,
            client,
            templates,
        }
    }

    /// The classifier.
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// The policy client.
    pub fn client(&self) -> &PolicyClient<T> {
        &self.client
    }

    /// Handle one request and return the JSON text to show.
    pub async fn handle(&self, user_text: &str) -> String {
        to_pretty_json(&self.handle_value(user_text).await)
    }

    /// Handle one request and return the JSON value to show.
    pub async fn handle_value(&self, user_text: &str) -> serde_json::Value {
        match self.try_handle(user_text).await {
            Ok(value) => value,
            Err(err) => {
                tracing::info!(error = %err, "request failed");
                err.to_json()
            }
        }
    }

    async fn try_handle(&self, user_text: &str) -> Result<serde_json::Value, ChatError> {
        let raw = self.classifier.classify(user_text).await?;
        let record = IntentRecord::parse(&raw)?;
        tracing::debug!(intent = %record.intent, details = ?record.details, "classified");
        self.dispatch(&record).await
    }

    /// Perform the API call an intent record asks for.
    pub async fn dispatch(&self, record: &IntentRecord) -> Result<serde_json::Value, ChatError> {
        match record.kind() {
            Some(Intent::GetPolicy) => match record.id("policy_id") {
                Some(id) => self.client.get_policy(id).await,
                None => self.client.list_policies(record.string("user")).await,
            },
            Some(Intent::DeletePolicy) => {
                if let Some(name) = record.name("policy_name") {
                    self.client.delete_policy(name).await
                } else if let Some(id) = record.id("policy_id") {
                    self.client.delete_policy_by_id(id).await
                } else {
                    Err(ChatError::IncompleteRequest)
                }
            }
            Some(Intent::ModifyPolicy) => {
                let Some(updated) = record
                    .details
                    .get("updated_data")
                    .filter(|data| data.is_object())
                else {
                    return Err(ChatError::IncompleteRequest);
                };
                let id = match record.id("policy_id") {
                    Some(id) => id,
                    None => {
                        let Some(name) = record
                            .name("policy_id")
                            .or_else(|| record.name("policy_name"))
                        else {
                            return Err(ChatError::IncompleteRequest);
                        };
                        self.client.resolve_policy_id(name).await?
                    }
                };
                self.client.update_policy(id, updated).await
            }
            Some(Intent::CreatePolicy) => {
                if let Some(component) = record.string("component") {
                    if let Some(payload) = self.templates.render(component, &record.details)? {
                        return self.client.create_policy(&payload).await;
                    }
                }
                if record.details.is_empty() {
                    return Err(ChatError::IncompleteRequest);
                }
                let payload = serde_json::Value::Object(record.details.clone());
                self.client.create_policy(&payload).await
            }
            Some(Intent::GetUser) => match record.name("user") {
                Some(user) => self.client.get_user(user).await,
                None => Err(ChatError::IncompleteRequest),
            },
            Some(Intent::DeleteUser) => match record.name("user") {
                Some(user) => self.client.delete_user(user).await,
                None => Err(ChatError::IncompleteRequest),
            },
            Some(Intent::Clarify) => match record.string("question") {
                Some(question) => Err(ChatError::ClarificationNeeded {
                    question: question.to_string(),
                }),
                None => Err(ChatError::IncompleteRequest),
            },
            None => Err(ChatError::IncompleteRequest),
        }
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
