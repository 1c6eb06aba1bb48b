use thiserror::Error;

#[derive(Debug, Error)]
pub enum CfnError {
    #[error("Validation failed on resource '{resource}'\n{message}")]
    Validation { resource: String, message: String },

    #[error("Invalid name {name:?}\n{reason}")]
    InvalidName { name: String, reason: String },

    #[error("Duplicate logical id '{0}'. Every resource in a stack must have a unique logical id")]
    DuplicateLogicalId(String),

    #[error("Failed to apply override at '{path}': {reason}")]
    Override { path: String, reason: String },

    #[error("Resource '{resource}' references '{target}' which is not a resource or parameter of this stack")]
    DanglingReference { resource: String, target: String },

    #[error("Resource '{0}' not found in stack")]
    MissingResource(String),

    #[error("Failed to serialize template\n{0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CfnError {
    pub fn validation(resource: &str, message: impl Into<String>) -> Self {
        CfnError::Validation {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    pub fn override_failed(path: &str, reason: impl Into<String>) -> Self {
        CfnError::Override {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
