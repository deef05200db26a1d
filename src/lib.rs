#![deny(missing_docs)]

//! policychat: manage Apache Ranger access policies in plain language.
//!
//! A request such as "let alice select from the sales database" is sent to a language model that
//! classifies it into an intent and extracts its details.  The classified request is
//! then turned into a call against Ranger's public policy API, and the result is shown as JSON.
//!
//! # Core Concepts
//!
//! - **Classifier**: turns free text into an unvalidated `{"intent", "details"}` record
//! - **IntentRecord**: the parsed classification
//! - **Templates**: build policy documents for known services (Hive)
//! - **PolicyClient**: list, get, create, update, and delete policies, and look up or delete
//!   users, over a **Transport**
//! - **Dispatcher**: routes an intent record to the client, turning every failure into JSON
//! - **ChatSession**: the conversational front end; keeps a transcript for display only
//!
//! # Example
//!
//! ```no_run
//! use policychat::{
//!     ChatSession, ClaudeClassifier, Config, Dispatcher, HttpTransport, LoadOptions, PolicyClient,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(&LoadOptions::default())?;
//! let classifier = ClaudeClassifier::new(None, config.classifier.max_tokens)?;
//! let client = PolicyClient::new(HttpTransport::new(&config.ranger)?);
//! let session = ChatSession::new(Dispatcher::new(classifier, client));
//! println!("{}", session.respond("list the policies for alice", &[]).await);
//! # Ok(())
//! # }
//! ```

mod classifier;
mod client;
mod config;
mod dispatcher;
mod errors;
mod intent;
mod policy;
mod session;
mod template;

#[cfg(test)]
mod testing;

pub use classifier::{classification_prompt, ClaudeClassifier, Classifier, SYSTEM_PROMPT};
pub use client::{
    ApiRequest, ApiResponse, HttpTransport, PolicyClient, Target, Transport, DEFAULT_USERS_PATH,
    NO_POLICIES_FOUND,
};
pub use config::{
    ClassifierConfig, Config, LoadOptions, LoggingConfig, Overrides, RangerConfig,
    DEFAULT_CONFIG_FILE,
};
pub use dispatcher::{to_pretty_json, Dispatcher};
pub use errors::{ChatError, ConfigError, INVALID_REQUEST, POLICY_NOT_FOUND};
pub use intent::{Intent, IntentRecord};
pub use policy::{
    find_policy_id, generate_policy_name, Access, Policy, PolicyItem, PolicyResource,
    POLICY_NAME_PREFIX,
};
pub use session::{ChatSession, Reply, Transcript, Turn};
pub use template::{ServiceTemplate, TemplateValues, Templates};
