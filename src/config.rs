use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_STACK_NAME: &str = "FrontStack";
pub const DEFAULT_BUCKET_NAME: &str = "20240619-line-todo-app-bucket";
pub const DEFAULT_OAC_NAME: &str = "20240619-line-todo-app-oac";
pub const DEFAULT_ROOT_OBJECT: &str = "index.html";
pub const DEFAULT_ASSET_DIR: &str = "../front/dist";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}\n{source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse config file {path:?}\n{source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("Invalid config value for {field}\n{reason}")]
    Invalid { field: &'static str, reason: String },
}

/// everything that varies between deployments of the front stack.
/// Every key is optional in the toml file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrontStackConfig {
    pub stack_name: String,
    pub region: String,
    /// account id baked into the bucket policy condition. When unset the
    /// condition uses the `AWS::AccountId` of whichever account deploys the stack.
    pub account: Option<String>,
    pub bucket_name: String,
    pub oac_name: String,
    pub default_root_object: String,
    /// directory holding the built frontend.
    pub asset_dir: PathBuf,
    pub distribution_paths: Vec<String>,
}

impl Default for FrontStackConfig {
    fn default() -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            region: aws_regions::DEFAULT_REGION.to_string(),
            account: None,
            bucket_name: DEFAULT_BUCKET_NAME.to_string(),
            oac_name: DEFAULT_OAC_NAME.to_string(),
            default_root_object: DEFAULT_ROOT_OBJECT.to_string(),
            asset_dir: PathBuf::from(DEFAULT_ASSET_DIR),
            distribution_paths: vec!["/*".to_string()],
        }
    }
}

impl FrontStackConfig {
    pub fn from_toml_str(s: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config = Self::from_toml_str(&s, path)?;
        tracing::debug!(?path, "loaded config");
        Ok(config)
    }

    /// the account as it appears inside an `Fn::Sub` string.
    pub fn account_for_sub(&self) -> String {
        match &self.account {
            Some(account) => account.clone(),
            None => format!("${{{}}}", cfn_lib::pseudo::ACCOUNT_ID),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        aws_regions::verify_region(&self.region)
            .map_err(|reason| ConfigError::Invalid { field: "region", reason })?;
        aws_s3::verify_bucket_name(&self.bucket_name)
            .map_err(|reason| ConfigError::Invalid { field: "bucket_name", reason })?;
        aws_cfn_stack::validate_stack_name(&self.stack_name)
            .map_err(|e| ConfigError::Invalid { field: "stack_name", reason: e.to_string() })?;
        if let Some(account) = &self.account {
            if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::Invalid {
                    field: "account",
                    reason: format!("Invalid account id {account:?}\nMust be exactly 12 digits"),
                });
            }
        }
        if self.oac_name.is_empty() || self.oac_name.len() > 64 {
            return Err(ConfigError::Invalid {
                field: "oac_name",
                reason: format!("Invalid origin access control name {:?}\nMust be between 1 and 64 characters", self.oac_name),
            });
        }
        Ok(())
    }
}
