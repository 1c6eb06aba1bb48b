use serde::Serialize;
use serde_json::Value;

use crate::policy::{assume_role_policy_doc, PolicyDocument};
use crate::CfnResource;

pub const LAMBDA_BASIC_EXECUTION_ROLE: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolePolicy {
    #[serde(rename = "PolicyDocument")]
    pub policy_document: PolicyDocument,
    #[serde(rename = "PolicyName")]
    pub policy_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnRole {
    #[serde(rename = "AssumeRolePolicyDocument")]
    pub assume_role_policy_document: PolicyDocument,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "ManagedPolicyArns", skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<Value>,
    #[serde(rename = "Policies", skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<RolePolicy>,
}

impl CfnRole {
    /// a role that lambda can assume, with basic execution (logging) permissions attached.
    pub fn for_lambda(description: &str) -> Self {
        Self {
            assume_role_policy_document: assume_role_policy_doc("lambda.amazonaws.com"),
            description: Some(description.to_string()),
            managed_policy_arns: vec![Value::String(LAMBDA_BASIC_EXECUTION_ROLE.to_string())],
            policies: vec![],
        }
    }
}

impl CfnResource for CfnRole {
    fn type_string(&self) -> &'static str {
        "AWS::IAM::Role"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn validate(&self) -> Result<(), String> {
        self.assume_role_policy_document.validate()?;
        for policy in self.policies.iter() {
            if policy.policy_name.is_empty() || policy.policy_name.len() > 128 {
                return Err(format!("Invalid policy name {:?}\nMust be between 1 and 128 characters", policy.policy_name));
            }
            policy
                .policy_document
                .validate()
                .map_err(|e| format!("Policy {}: {e}", policy.policy_name))?;
        }
        Ok(())
    }
}
