use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::POLICY_VERSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// iam renders a single action/resource as a plain string rather than
/// a one element list. We do the same so templates read the way people expect.
#[allow(clippy::ptr_arg)]
fn one_or_many<S: Serializer, T: Serialize>(items: &Vec<T>, ser: S) -> Result<S::Ok, S::Error> {
    if items.len() == 1 {
        items[0].serialize(ser)
    } else {
        items.serialize(ser)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyStatement {
    #[serde(rename = "Action", serialize_with = "one_or_many")]
    pub actions: Vec<String>,
    #[serde(rename = "Condition", skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Principal", skip_serializing_if = "Option::is_none")]
    pub principal: Option<Value>,
    #[serde(rename = "Resource", serialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    pub fn new(effect: Effect) -> Self {
        Self {
            actions: vec![],
            conditions: BTreeMap::new(),
            effect,
            principal: None,
            resources: vec![],
        }
    }

    pub fn allow() -> Self {
        Self::new(Effect::Allow)
    }

    pub fn with_actions(mut self, actions: &[&str]) -> Self {
        self.actions.extend(actions.iter().map(|a| a.to_string()));
        self
    }

    /// `{ "Service": service }`, eg: `cloudfront.amazonaws.com`
    pub fn with_service_principal(mut self, service: &str) -> Self {
        let mut map = Map::new();
        map.insert("Service".to_string(), Value::String(service.to_string()));
        self.principal = Some(Value::Object(map));
        self
    }

    pub fn with_resource(mut self, resource: Value) -> Self {
        self.resources.push(resource);
        self
    }

    /// eg: `add_condition("StringEquals", "AWS:SourceArn", arn)`.
    /// Adding the same operator/key twice replaces the previous value.
    pub fn add_condition(&mut self, operator: &str, key: &str, value: Value) {
        self.conditions
            .entry(operator.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.actions.is_empty() {
            return Err("Policy statement must contain at least one action".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDocument {
    #[serde(rename = "Statement")]
    pub statements: Vec<PolicyStatement>,
    #[serde(rename = "Version")]
    pub version: String,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            statements: vec![],
            version: POLICY_VERSION.to_string(),
        }
    }
}

impl PolicyDocument {
    pub fn add_statement(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.statements.is_empty() {
            return Err("Policy document must contain at least one statement".to_string());
        }
        for (i, statement) in self.statements.iter().enumerate() {
            statement.validate().map_err(|e| format!("Statement {i}: {e}"))?;
        }
        Ok(())
    }
}

/// trust policy that lets `service` assume a role.
pub fn assume_role_policy_doc(service: &str) -> PolicyDocument {
    let mut doc = PolicyDocument::default();
    doc.add_statement(
        PolicyStatement::allow()
            .with_actions(&["sts:AssumeRole"])
            .with_service_principal(service),
    );
    doc
}
