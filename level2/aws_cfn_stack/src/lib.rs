use cfn_lib::overrides::apply_overrides;
use cfn_lib::{CfnError, CfnResource, Output, Override, Parameter, Template, TemplateResource};
use serde_json::{Map, Value};

pub const MAX_STACK_NAME_LEN: usize = 128;
pub const MAX_LOGICAL_ID_LEN: usize = 255;

/// what cloudformation does with the physical resource when it is removed
/// from the stack (or replaced during an update).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemovalPolicy {
    Destroy,
    #[default]
    Retain,
    Snapshot,
}

impl RemovalPolicy {
    pub fn as_cfn(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Snapshot => "Snapshot",
        }
    }
}

/// one logical resource of the stack, plus everything about it that lives
/// outside of its `Properties`.
pub struct Resource {
    pub name: String,
    pub properties: Box<dyn CfnResource>,
    pub depends_on: Vec<String>,
    pub removal_policy: Option<RemovalPolicy>,
    /// patches applied to the rendered node, in order, after the
    /// typed properties have been serialized.
    pub overrides: Vec<Override>,
}

impl Resource {
    pub fn new(name: &str, properties: impl CfnResource + 'static) -> Self {
        Self {
            name: name.to_string(),
            properties: Box::new(properties),
            depends_on: vec![],
            removal_policy: None,
            overrides: vec![],
        }
    }

    pub fn with_depends_on(mut self, logical_id: &str) -> Self {
        self.add_depends_on(logical_id);
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }

    pub fn add_depends_on(&mut self, logical_id: &str) {
        if !self.depends_on.iter().any(|d| d == logical_id) {
            self.depends_on.push(logical_id.to_string());
        }
    }

    /// `path` is relative to the resource node, eg: `Properties.A.B`
    pub fn add_override(&mut self, path: &str, value: impl Into<Value>) {
        self.overrides.push(Override::raw(path, value));
    }

    /// `path` is relative to `Properties`
    pub fn add_property_override(&mut self, path: &str, value: impl Into<Value>) {
        self.overrides.push(Override::property(path, value));
    }

    pub fn add_property_deletion_override(&mut self, path: &str) {
        self.overrides.push(Override::property_deletion(path));
    }

    pub fn properties_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        let props: &mut dyn CfnResource = &mut *self.properties;
        props.as_any_mut().downcast_mut::<T>()
    }

    fn render(&self) -> Result<TemplateResource, CfnError> {
        self.properties
            .validate()
            .map_err(|e| CfnError::validation(&self.name, e))?;
        let mut node = Map::new();
        node.insert("Type".to_string(), Value::String(self.properties.type_string().to_string()));
        node.insert("Properties".to_string(), self.properties.properties()?);
        if !self.depends_on.is_empty() {
            let deps = self.depends_on.iter().map(|d| Value::String(d.clone())).collect();
            node.insert("DependsOn".to_string(), Value::Array(deps));
        }
        if let Some(policy) = self.removal_policy {
            node.insert("UpdateReplacePolicy".to_string(), Value::String(policy.as_cfn().to_string()));
            node.insert("DeletionPolicy".to_string(), Value::String(policy.as_cfn().to_string()));
        }
        let mut node = Value::Object(node);
        apply_overrides(&mut node, &self.overrides)?;
        Ok(serde_json::from_value(node)?)
    }
}

#[derive(Default)]
pub struct Input {
    /// must be alphanumeric + hyphens, start with a letter, and be at most 128 characters.
    pub stack_name: String,
    pub description: Option<String>,
    /// rendered in the order they were pushed, but the template itself
    /// is keyed by logical id so the output order does not depend on it.
    pub resources: Vec<Resource>,
    pub parameters: Vec<(String, Parameter)>,
    pub outputs: Vec<(String, Output)>,
}

impl Input {
    pub fn new(stack_name: &str) -> Self {
        Self {
            stack_name: stack_name.to_string(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    pub fn has_resource(&self, logical_id: &str) -> bool {
        self.resources.iter().any(|r| r.name == logical_id)
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.name == logical_id)
    }

    /// the typed properties of a resource that was already pushed.
    pub fn properties_mut<T: 'static>(&mut self, logical_id: &str) -> Option<&mut T> {
        self.resource_mut(logical_id).and_then(|r| r.properties_as_mut::<T>())
    }

    /// adding a parameter that already exists is a no-op, so modules can
    /// share parameters (eg: the name of the assets bucket).
    pub fn add_parameter(&mut self, name: &str, parameter: Parameter) {
        if self.parameters.iter().any(|(n, _)| n == name) {
            return;
        }
        self.parameters.push((name.to_string(), parameter));
    }

    pub fn add_output(&mut self, name: &str, description: &str, value: Value) {
        self.outputs.push((name.to_string(), Output {
            description: description.to_string(),
            value,
        }));
    }
}

pub fn verify_resource_name(resource_name: &str) -> Result<(), CfnError> {
    let invalid = |reason: &str| CfnError::InvalidName {
        name: resource_name.to_string(),
        reason: reason.to_string(),
    };
    if resource_name.len() > MAX_LOGICAL_ID_LEN {
        return Err(invalid("must be less than 255 characters"));
    }
    if resource_name.is_empty() {
        return Err(invalid("Must contain at least 1 character"));
    }
    if !resource_name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("Must contain only alphanumeric characters [A-Za-z0-9]"));
    }
    Ok(())
}

pub fn validate_stack_name(stack_name: &str) -> Result<String, CfnError> {
    // A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
    // It must start with an alphabetical character and can't be longer than 128 characters.
    let restriction = "Must only consist of alphanumeric characters and hyphens, Must start with an alphabetical character, and cannot be longer than 128 characters.";
    let invalid = || CfnError::InvalidName {
        name: stack_name.to_string(),
        reason: restriction.to_string(),
    };
    let first = stack_name.chars().next().ok_or_else(invalid)?;
    if !first.is_ascii_alphabetic() {
        return Err(invalid());
    }
    if !stack_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid());
    }
    if stack_name.len() > MAX_STACK_NAME_LEN {
        return Err(invalid());
    }
    Ok(stack_name.to_string())
}

/// renders every resource, applies its overrides, and checks that every
/// reference in the result points at something declared in the template.
pub fn synthesize(input: &Input) -> Result<Template, CfnError> {
    let stack_name = validate_stack_name(&input.stack_name)?;
    let _span = tracing::debug_span!("synthesize", stack = %stack_name).entered();

    let mut template = Template {
        description: input.description.clone(),
        ..Default::default()
    };
    for (name, parameter) in input.parameters.iter() {
        verify_resource_name(name)?;
        template.parameters.insert(name.clone(), parameter.clone());
    }
    for resource in input.resources.iter() {
        verify_resource_name(&resource.name)?;
        if template.resources.contains_key(&resource.name) || template.parameters.contains_key(&resource.name) {
            return Err(CfnError::DuplicateLogicalId(resource.name.clone()));
        }
        tracing::debug!(
            resource = %resource.name,
            ty = resource.properties.type_string(),
            overrides = resource.overrides.len(),
            "rendering resource"
        );
        let rendered = resource.render()?;
        template.resources.insert(resource.name.clone(), rendered);
    }
    for (name, output) in input.outputs.iter() {
        verify_resource_name(name)?;
        template.outputs.insert(name.clone(), output.clone());
    }
    template.validate_references()?;
    tracing::debug!(resources = template.resources.len(), "synthesized template");
    Ok(template)
}

/// pretty printed so that if a user needs to look at the stack
/// in the cloudformation console, it looks nice.
pub fn get_serialized_template_json(input: &Input) -> Result<String, CfnError> {
    synthesize(input)?.to_json_pretty()
}
