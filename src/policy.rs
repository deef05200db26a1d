use std::collections::BTreeMap;

/// The prefix of every generated policy name.
pub const POLICY_NAME_PREFIX: &str = "test_policy_";

/// Generate a fresh policy name token.
///
/// Tokens are built from a v4 UUID so two calls never hand out the same name.
pub fn generate_policy_name() -> String {
    format!("{POLICY_NAME_PREFIX}{}", uuid::Uuid::new_v4())
}

/// A Ranger access policy as exchanged with the policy API.
///
/// Policies are built this way for create and read this way when resolving names.  Fields the
/// server sends that we do not model are kept in `extra` so that a policy read from the server
/// can be written back without loss.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// The server-assigned identifier; absent until the policy is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// The service the policy applies to, e.g. "cm_hive".
    #[serde(default)]
    pub service: String,
    /// The client-chosen name.
    pub name: String,
    /// Ranger's policy type; 0 is an access policy.
    #[serde(default)]
    pub policy_type: u32,
    /// Resource category (database, table, column, ...) to the resources it covers.
    #[serde(default)]
    pub resources: BTreeMap<String, PolicyResource>,
    /// Who may do what.
    #[serde(default)]
    pub policy_items: Vec<PolicyItem>,
    /// Server fields we pass through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The values a policy covers within one resource category.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResource {
    /// Resource names; "*" matches everything.
    pub values: Vec<String>,
    /// Whether the policy applies below the named resources.
    #[serde(default)]
    pub is_recursive: bool,
}

impl PolicyResource {
    /// A non-recursive resource covering `values`.
    pub fn exact(values: Vec<String>) -> Self {
        Self {
            values,
            is_recursive: false,
        }
    }

    /// A non-recursive resource covering everything.
    pub fn wildcard() -> Self {
        Self::exact(vec!["*".to_string()])
    }
}

/// One grant within a policy.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyItem {
    /// Users this grant applies to.
    #[serde(default)]
    pub users: Vec<String>,
    /// Groups this grant applies to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// The permitted access types.
    #[serde(default)]
    pub accesses: Vec<Access>,
    /// Whether grantees may administer the policy.
    #[serde(default)]
    pub delegate_admin: bool,
}

/// A single access type and whether it is allowed.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    /// The access type, e.g. "select".
    pub r#type: String,
    /// Whether the access is allowed.
    pub is_allowed: bool,
}

impl Access {
    /// An allowed access of the given type.
    pub fn allow(r#type: impl Into<String>) -> Self {
        Self {
            r#type: r#type.into(),
            is_allowed: true,
        }
    }
}

/// Scan a policy listing for a policy with exactly `name` and return its id.
///
/// The listing is whatever the policy API returned; entries that do not read as a [`Policy`]
/// or lack an id are skipped.
pub fn find_policy_id(listing: &serde_json::Value, name: &str) -> Option<u64> {
    listing.as_array()?.iter().find_map(|entry| {
        let policy = <Policy as serde::Deserialize>::deserialize(entry).ok()?;
        if policy.name == name {
            policy.id
        } else {
            None
        }
    })
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
