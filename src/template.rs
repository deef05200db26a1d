use std::collections::BTreeMap;

use crate::{generate_policy_name, Access, ChatError, Policy, PolicyItem, PolicyResource};

/// A policy document shape for one kind of service.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServiceTemplate {
    /// Hive: one database list, the named tables (all by default), every column, and one grant
    /// to one user and any groups.
    Hive,
}

impl ServiceTemplate {
    /// Build the policy document for `service` from `values`.
    pub fn render(&self, service: &str, values: &TemplateValues) -> Policy {
        match self {
            ServiceTemplate::Hive => {
                let mut resources = BTreeMap::new();
                resources.insert(
                    "database".to_string(),
                    PolicyResource::exact(values.databases.clone()),
                );
                resources.insert(
                    "table".to_string(),
                    PolicyResource::exact(values.tables.clone()),
                );
                resources.insert("column".to_string(), PolicyResource::wildcard());
                Policy {
                    id: None,
                    service: service.to_string(),
                    name: values.policy_name.clone(),
                    policy_type: 0,
                    resources,
                    policy_items: vec![PolicyItem {
                        users: vec![values.user.clone()],
                        groups: values.groups.clone(),
                        accesses: values.permissions.iter().map(Access::allow).collect(),
                        delegate_admin: false,
                    }],
                    extra: serde_json::Map::new(),
                }
            }
        }
    }
}

/// The values substituted into a template.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TemplateValues {
    /// The name of the new policy.
    pub policy_name: String,
    /// Databases the policy covers.
    pub databases: Vec<String>,
    /// Tables the policy covers; `["*"]` unless the request names some.
    pub tables: Vec<String>,
    /// The user being granted access.
    pub user: String,
    /// Groups granted the same access.
    pub groups: Vec<String>,
    /// Access types to allow.
    pub permissions: Vec<String>,
}

impl TemplateValues {
    /// Pull template values out of an intent's details.
    ///
    /// `databases`, `permissions`, and the optional `tables` and `groups` may each be a list of
    /// strings or a single string.  A missing `user` is an incomplete request; a value of the
    /// wrong shape is a render error.
    pub fn from_details(
        details: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, ChatError> {
        let policy_name = match details.get("policy_name") {
            None | Some(serde_json::Value::Null) => generate_policy_name(),
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => generate_policy_name(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(ChatError::template(format!(
                    "policy_name must be a string, got {other}"
                )))
            }
        };
        let user = match details.get("user") {
            None | Some(serde_json::Value::Null) => return Err(ChatError::IncompleteRequest),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(ChatError::template(format!(
                    "user must be a string, got {other}"
                )))
            }
        };
        let databases = string_list(details, "databases")?.ok_or(ChatError::IncompleteRequest)?;
        let permissions =
            string_list(details, "permissions")?.ok_or(ChatError::IncompleteRequest)?;
        let tables = string_list(details, "tables")?
            .filter(|tables| !tables.is_empty())
            .unwrap_or_else(|| vec!["*".to_string()]);
        let groups = string_list(details, "groups")?.unwrap_or_default();
        Ok(Self {
            policy_name,
            databases,
            tables,
            user,
            groups,
            permissions,
        })
    }
}

fn string_list(
    details: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<Vec<String>>, ChatError> {
    match details.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(vec![s.clone()])),
        Some(serde_json::Value::Array(values)) => values
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => Ok(s.clone()),
                other => Err(ChatError::template(format!(
                    "{key} must contain only strings, got {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(ChatError::template(format!(
            "{key} must be a list of strings, got {other}"
        ))),
    }
}

///////////////////////////////////////////// Templates ////////////////////////////////////////////

/// Policy templates keyed by the component name the classifier produces.
#[derive(Clone, Debug)]
pub struct Templates {
    by_component: BTreeMap<String, ServiceTemplate>,
}

impl Templates {
    /// A registry with no templates.
    pub fn empty() -> Self {
        Self {
            by_component: BTreeMap::new(),
        }
    }

    /// Register `template` for `component`.
    pub fn register(&mut self, component: impl Into<String>, template: ServiceTemplate) {
        self.by_component.insert(component.into(), template);
    }

    /// The template for `component`, if any.
    pub fn lookup(&self, component: &str) -> Option<ServiceTemplate> {
        self.by_component.get(component).copied()
    }

    /// Render the template for `component` against `details` into a create payload.
    ///
    /// Returns `Ok(None)` when no template is registered for the component.
    pub fn render(
        &self,
        component: &str,
        details: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, ChatError> {
        let Some(template) = self.lookup(component) else {
            return Ok(None);
        };
        let values = TemplateValues::from_details(details)?;
        let policy = template.render(component, &values);
        let payload = serde_json::to_value(&policy)
            .map_err(|err| ChatError::template(err.to_string()))?;
        tracing::debug!(component, %payload, "rendered policy template");
        Ok(Some(payload))
    }
}

impl Default for Templates {
    fn default() -> Self {
        let mut templates = Self::empty();
        templates.register("cm_hive", ServiceTemplate::Hive);
        templates
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn details(json: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match json {
            serde_json::Value::Object(map) => map,
            _ => panic!("details must be an object"),
        }
    }

    #[test]
    fn hive_render_shape() {
        let templates = Templates::default();
        let payload = templates
            .render(
                "cm_hive",
                &details(serde_json::json! {{
                    "policy_name": "p1",
                    "databases": ["d1"],
                    "user": "alice",
                    "permissions": ["select"],
                }}),
            )
            .unwrap()
            .unwrap();
        assert_eq!(payload["service"], "cm_hive");
        assert_eq!(payload["name"], "p1");
        assert_eq!(payload["policyType"], 0);
        assert_eq!(payload["resources"]["database"]["values"], serde_json::json!(["d1"]));
        assert_eq!(payload["resources"]["database"]["isRecursive"], false);
        assert_eq!(payload["resources"]["table"]["values"], serde_json::json!(["*"]));
        assert_eq!(payload["resources"]["column"]["values"], serde_json::json!(["*"]));
        let items = payload["policyItems"].as_array().unwrap();
        assert_eq!(1, items.len());
        assert_eq!(items[0]["users"], serde_json::json!(["alice"]));
        assert_eq!(
            items[0]["accesses"],
            serde_json::json!([{"type": "select", "isAllowed": true}])
        );
        assert_eq!(items[0]["delegateAdmin"], false);
        assert!(items[0].get("groups").is_none());
    }

    #[test]
    fn tables_and_groups_are_optional() {
        let values = TemplateValues::from_details(&details(serde_json::json! {{
            "policy_name": "p1",
            "databases": ["d1"],
            "tables": ["orders", "refunds"],
            "user": "alice",
            "groups": "public",
            "permissions": ["select"],
        }}))
        .unwrap();
        let policy = ServiceTemplate::Hive.render("cm_hive", &values);
        assert_eq!(
            vec!["orders".to_string(), "refunds".to_string()],
            policy.resources["table"].values
        );
        assert_eq!(vec!["*".to_string()], policy.resources["column"].values);
        assert_eq!(vec!["public".to_string()], policy.policy_items[0].groups);

        let values = TemplateValues::from_details(&details(serde_json::json! {{
            "databases": ["d1"],
            "tables": [],
            "user": "alice",
            "permissions": ["select"],
        }}))
        .unwrap();
        assert_eq!(vec!["*".to_string()], values.tables);
        assert!(values.groups.is_empty());
    }

    #[test]
    fn wrong_shaped_groups_are_render_errors() {
        let err = TemplateValues::from_details(&details(serde_json::json! {{
            "databases": ["d1"],
            "user": "alice",
            "groups": {"name": "public"},
            "permissions": ["select"],
        }}))
        .unwrap_err();
        assert!(err.to_string().contains("groups"));
    }

    #[test]
    fn registered_components_render() {
        let mut templates = Templates::empty();
        assert!(templates
            .render("cm_hive", &serde_json::Map::new())
            .unwrap()
            .is_none());
        templates.register("cm_hive_staging", ServiceTemplate::Hive);
        let payload = templates
            .render(
                "cm_hive_staging",
                &details(serde_json::json! {{
                    "databases": "d1",
                    "user": "alice",
                    "permissions": "select",
                }}),
            )
            .unwrap()
            .unwrap();
        assert_eq!(payload["service"], "cm_hive_staging");
    }

    #[test]
    fn single_strings_are_accepted_as_lists() {
        let values = TemplateValues::from_details(&details(serde_json::json! {{
            "policy_name": "p1",
            "databases": "sales",
            "user": "bob",
            "permissions": "update",
        }}))
        .unwrap();
        assert_eq!(vec!["sales".to_string()], values.databases);
        assert_eq!(vec!["update".to_string()], values.permissions);
    }

    #[test]
    fn values_with_quotes_stay_intact() {
        let values = TemplateValues::from_details(&details(serde_json::json! {{
            "policy_name": "p\"1",
            "databases": ["d\",\"x"],
            "user": "alice",
            "permissions": ["select"],
        }}))
        .unwrap();
        let policy = ServiceTemplate::Hive.render("cm_hive", &values);
        assert_eq!("p\"1", policy.name);
        assert_eq!(vec!["d\",\"x".to_string()], policy.resources["database"].values);
    }

    #[test]
    fn missing_name_gets_fresh_token() {
        let input = details(serde_json::json! {{
            "databases": ["d1"],
            "user": "alice",
            "permissions": ["select"],
        }});
        let first = TemplateValues::from_details(&input).unwrap();
        let second = TemplateValues::from_details(&input).unwrap();
        assert!(first.policy_name.starts_with(crate::POLICY_NAME_PREFIX));
        assert_ne!(first.policy_name, second.policy_name);
    }

    #[test]
    fn missing_user_is_incomplete() {
        let err = TemplateValues::from_details(&details(serde_json::json! {{
            "databases": ["d1"],
            "permissions": ["select"],
        }}))
        .unwrap_err();
        assert!(matches!(err, ChatError::IncompleteRequest));
    }

    #[test]
    fn wrong_shape_is_render_error() {
        let err = TemplateValues::from_details(&details(serde_json::json! {{
            "databases": [1, 2],
            "user": "alice",
            "permissions": ["select"],
        }}))
        .unwrap_err();
        assert!(matches!(err, ChatError::Template { .. }));
        assert!(err.to_string().contains("databases"));
    }

    #[test]
    fn unknown_component_has_no_template() {
        let templates = Templates::default();
        assert_eq!(Some(ServiceTemplate::Hive), templates.lookup("cm_hive"));
        let rendered = templates
            .render("cm_hbase", &serde_json::Map::new())
            .unwrap();
        assert!(rendered.is_none());
    }
}
