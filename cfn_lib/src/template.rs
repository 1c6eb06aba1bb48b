use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::intrinsics::{collect_references, is_pseudo_parameter};
use crate::{CfnError, TEMPLATE_FORMAT_VERSION};

/// a resource as it appears in the `Resources` section of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "UpdateReplacePolicy", default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(rename = "Metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// any other resource attribute, eg: `Condition`, `UpdatePolicy`, `CreationPolicy`.
    /// Only set through raw overrides.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Default", default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Parameter {
    pub fn string(description: &str) -> Self {
        Self {
            ty: "String".to_string(),
            description: Some(description.to_string()),
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Value")]
    pub value: Value,
}

/// every map is a BTreeMap so that rendering the same template twice
/// produces the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Parameters", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, TemplateResource>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            parameters: Default::default(),
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

impl Template {
    fn is_declared(&self, target: &str) -> bool {
        is_pseudo_parameter(target)
            || self.resources.contains_key(target)
            || self.parameters.contains_key(target)
    }

    /// every (resource or output name, target) pair where target is not a resource,
    /// parameter or pseudo parameter of this template.
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        let mut out = vec![];
        for (name, resource) in self.resources.iter() {
            let mut refs = vec![];
            collect_references(&resource.properties, &mut refs);
            refs.extend(resource.depends_on.iter().cloned());
            for target in refs {
                if !self.is_declared(&target) {
                    out.push((name.clone(), target));
                }
            }
        }
        for (name, output) in self.outputs.iter() {
            let mut refs = vec![];
            collect_references(&output.value, &mut refs);
            for target in refs {
                if !self.is_declared(&target) {
                    out.push((name.clone(), target));
                }
            }
        }
        out
    }

    pub fn validate_references(&self) -> Result<(), CfnError> {
        match self.dangling_references().into_iter().next() {
            Some((resource, target)) => Err(CfnError::DanglingReference { resource, target }),
            None => Ok(()),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, CfnError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
