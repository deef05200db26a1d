use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};

use crate::{find_policy_id, ChatError, RangerConfig};

/// The marker returned when a listing comes back empty.
pub const NO_POLICIES_FOUND: &str = "No relevant policies found.";

///////////////////////////////////////////// Transport ////////////////////////////////////////////

/// The path the users endpoint lives at when none is configured.
pub const DEFAULT_USERS_PATH: &str = "/service/xusers/users/userName";

/// What a request is addressed to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Target {
    /// The policy collection.
    Policies,
    /// One policy, by server-assigned id.
    Policy(u64),
    /// One user, by user name.
    User(String),
}

/// A request against the policy API.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    /// The HTTP method.
    pub method: Method,
    /// What the request is addressed to.
    pub target: Target,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// The JSON body, if any.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    fn new(method: Method, target: Target) -> Self {
        Self {
            method,
            target,
            query: vec![],
            body: None,
        }
    }
}

/// The status and raw body of a policy API response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The response body, verbatim.
    pub body: String,
}

/// Carries requests to the policy API.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Issue `request` and return the response.  Non-success statuses are not errors here.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ChatError>;
}

/// A [`Transport`] that speaks HTTP with basic authentication.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    policy_url: reqwest::Url,
    users_url: reqwest::Url,
    username: String,
    password: SecretString,
}

impl HttpTransport {
    /// Build a transport from configuration.
    ///
    /// Certificate verification is only disabled when the configuration explicitly asks for it.
    /// Without a configured users endpoint, users live at [`DEFAULT_USERS_PATH`] on the policy
    /// endpoint's host.
    pub fn new(config: &RangerConfig) -> Result<Self, ChatError> {
        let policy_url = parse_url(config.url.trim_end_matches('/'))?;
        let users_url = match &config.users_url {
            Some(url) => parse_url(url.trim_end_matches('/'))?,
            None => policy_url
                .join(DEFAULT_USERS_PATH)
                .map_err(|err| ChatError::Transport {
                    message: format!("cannot derive users endpoint from {policy_url}: {err}"),
                })?,
        };
        let mut builder = reqwest::Client::builder();
        if !config.verify_tls {
            tracing::warn!(
                url = %config.url,
                "TLS certificate verification is disabled for the policy API"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            policy_url,
            users_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url_for(&self, target: &Target) -> Result<reqwest::Url, ChatError> {
        let (base, segment) = match target {
            Target::Policies => return Ok(self.policy_url.clone()),
            Target::Policy(id) => (&self.policy_url, id.to_string()),
            Target::User(name) => (&self.users_url, name.clone()),
        };
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ChatError::Transport {
                message: format!("{base} cannot take a path segment"),
            })?
            .pop_if_empty()
            .push(&segment);
        Ok(url)
    }
}

fn parse_url(url: &str) -> Result<reqwest::Url, ChatError> {
    reqwest::Url::parse(url).map_err(|err| ChatError::Transport {
        message: format!("invalid URL {url}: {err}"),
    })
}

impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ChatError> {
        let url = self.url_for(&request.target)?;
        tracing::info!(method = %request.method, %url, "calling policy API");
        let mut builder = self
            .client
            .request(request.method, url)
            .basic_auth(&self.username, Some(self.password.expose_secret()));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(status, %body, "policy API responded");
        Ok(ApiResponse { status, body })
    }
}

//////////////////////////////////////////// PolicyClient //////////////////////////////////////////

/// Client for the Ranger policy API.
///
/// The client keeps no copy of any policy; every read goes to the server.  Every operation
/// returns the JSON shown to the user on success and a [`ChatError`] otherwise.
#[derive(Clone, Debug)]
pub struct PolicyClient<T: Transport> {
    transport: T,
}

impl<T: Transport> PolicyClient<T> {
    /// Wrap a transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// List policies, optionally only those that mention `filter_user`.
    pub async fn list_policies(
        &self,
        filter_user: Option<&str>,
    ) -> Result<serde_json::Value, ChatError> {
        let mut request = ApiRequest::new(Method::GET, Target::Policies);
        if let Some(user) = filter_user {
            request.query.push(("user".to_string(), user.to_string()));
        }
        let response = self.expect(request, 200).await?;
        let policies = parse_body(&response.body)?;
        if is_empty(&policies) {
            return Ok(serde_json::json! {{ "message": NO_POLICIES_FOUND }});
        }
        Ok(policies)
    }

    /// Fetch a single policy by id.
    pub async fn get_policy(&self, id: u64) -> Result<serde_json::Value, ChatError> {
        let response = self.expect(ApiRequest::new(Method::GET, Target::Policy(id)), 200).await?;
        parse_body(&response.body)
    }

    /// Resolve a policy name to its server-assigned id.
    pub async fn resolve_policy_id(&self, name: &str) -> Result<u64, ChatError> {
        let listing = self.list_policies(None).await?;
        match find_policy_id(&listing, name) {
            Some(id) => {
                tracing::debug!(name, id, "resolved policy name");
                Ok(id)
            }
            None => Err(ChatError::PolicyNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Delete the policy called `name`.
    ///
    /// The name is resolved first; when nothing matches, no DELETE is issued.
    pub async fn delete_policy(&self, name: &str) -> Result<serde_json::Value, ChatError> {
        let id = self.resolve_policy_id(name).await?;
        self.delete_policy_by_id(id).await
    }

    /// Delete the policy with the given id.
    pub async fn delete_policy_by_id(&self, id: u64) -> Result<serde_json::Value, ChatError> {
        self.expect(ApiRequest::new(Method::DELETE, Target::Policy(id)), 204)
            .await?;
        Ok(serde_json::json! {{ "status": "Policy deleted successfully." }})
    }

    /// Replace the policy with the given id.
    pub async fn update_policy(
        &self,
        id: u64,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ChatError> {
        let mut request = ApiRequest::new(Method::PUT, Target::Policy(id));
        request.body = Some(payload.clone());
        self.expect(request, 200).await?;
        Ok(serde_json::json! {{ "status": "Policy updated successfully." }})
    }

    /// Create a policy.
    pub async fn create_policy(
        &self,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ChatError> {
        let mut request = ApiRequest::new(Method::POST, Target::Policies);
        request.body = Some(payload.clone());
        let response = self.expect(request, 200).await?;
        let mut result = serde_json::json! {{ "status": "Policy created successfully." }};
        if let Some(id) = serde_json::from_str::<serde_json::Value>(&response.body)
            .ok()
            .and_then(|created| created.get("id").cloned())
        {
            result["id"] = id;
        }
        Ok(result)
    }

    /// Look up the user called `name`.
    pub async fn get_user(&self, name: &str) -> Result<serde_json::Value, ChatError> {
        let request = ApiRequest::new(Method::GET, Target::User(name.to_string()));
        let response = self.expect(request, 200).await?;
        parse_body(&response.body)
    }

    /// Delete the user called `name`.
    pub async fn delete_user(&self, name: &str) -> Result<serde_json::Value, ChatError> {
        let request = ApiRequest::new(Method::DELETE, Target::User(name.to_string()));
        self.expect(request, 204).await?;
        Ok(serde_json::json! {{ "status": "User deleted successfully." }})
    }

    async fn expect(&self, request: ApiRequest, success: u16) -> Result<ApiResponse, ChatError> {
        let response = self.transport.execute(request).await?;
        if response.status == success {
            Ok(response)
        } else {
            Err(ChatError::Http {
                status: response.status,
                body: response.body,
            })
        }
    }
}

fn parse_body(body: &str) -> Result<serde_json::Value, ChatError> {
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(body).map_err(|err| ChatError::invalid_response(err.to_string()))
}

fn is_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Array(values) => values.is_empty(),
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
