//! copies a zipped asset bundle into a destination bucket when the stack is deployed,
//! then invalidates paths of a distribution so viewers get the new content.
//!
//! The copy itself happens in a handler lambda at deploy time. The bundle and the
//! handler code are uploaded to an assets bucket before the stack is deployed, and
//! their locations are passed in as stack parameters. That keeps the template the
//! same no matter what the assets contain.
//!
//! # Handler contract
//!
//! Nothing in this crate builds the handler. The zip uploaded under
//! `DeploymentHandlerObjectKey` must hold an `index.py` whose `handler(event, context)`
//! runs on `python3.11` and serves `Custom::CDKBucketDeployment` events, which is what
//! the aws-cdk `BucketDeployment` handler does. On Create and Update it must:
//! - download every `SourceObjectKeys[i]` from `SourceBucketNames[i]` and unzip it
//! - sync the result into `DestinationBucketName`, deleting extra objects when `Prune` is true
//! - invalidate `DistributionPaths` on `DistributionId` when both are present
//!
//! On Delete it empties the destination unless `RetainOnDelete` is true. It must
//! always report back to the cloudformation response url. Custom resource properties
//! arrive as strings, so `Prune` and `RetainOnDelete` are `"true"` or `"false"`.
//! The lambda gets 900 seconds and `memory_limit` MB.

use std::path::{Path, PathBuf};

use aws_cfn_stack::{RemovalPolicy, Resource};
use cfn_lib::iam::{CfnRole, RolePolicy};
use cfn_lib::lambda::{CfnFunction, Code};
use cfn_lib::{get_att, get_ref, pseudo, sub, CfnError, CfnResource, Parameter, PolicyDocument, PolicyStatement};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_LOGICAL_ID: &str = "DeployReactApp";
pub const ASSETS_BUCKET_PARAM: &str = "AssetsBucketName";
pub const SITE_ASSET_KEY_PARAM: &str = "SiteAssetObjectKey";
pub const HANDLER_KEY_PARAM: &str = "DeploymentHandlerObjectKey";
pub const HANDLER_RUNTIME: &str = "python3.11";
pub const DEFAULT_MEMORY_LIMIT: u32 = 128;

/// the deployment job, as seen by the handler lambda.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnBucketDeployment {
    #[serde(rename = "ServiceToken")]
    pub service_token: Value,
    #[serde(rename = "SourceBucketNames")]
    pub source_bucket_names: Vec<Value>,
    #[serde(rename = "SourceObjectKeys")]
    pub source_object_keys: Vec<Value>,
    #[serde(rename = "DestinationBucketName")]
    pub destination_bucket_name: Value,
    #[serde(rename = "DistributionId", skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<Value>,
    #[serde(rename = "DistributionPaths", skip_serializing_if = "Vec::is_empty")]
    pub distribution_paths: Vec<String>,
    /// delete destination objects that are not in the bundle.
    #[serde(rename = "Prune")]
    pub prune: bool,
    #[serde(rename = "RetainOnDelete")]
    pub retain_on_delete: bool,
}

impl CfnResource for CfnBucketDeployment {
    fn type_string(&self) -> &'static str {
        "Custom::CDKBucketDeployment"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn validate(&self) -> Result<(), String> {
        if self.source_bucket_names.len() != self.source_object_keys.len() {
            return Err(format!(
                "Deployment has {} source buckets but {} source object keys",
                self.source_bucket_names.len(),
                self.source_object_keys.len()
            ));
        }
        if !self.distribution_paths.is_empty() && self.distribution_id.is_none() {
            return Err("Distribution paths can only be invalidated when a distribution is given".to_string());
        }
        for path in self.distribution_paths.iter() {
            if !path.starts_with('/') {
                return Err(format!("Invalid distribution path {path:?}\nMust start with '/'"));
            }
        }
        Ok(())
    }
}

pub struct Input {
    pub logical_id: String,
    /// logical id of the bucket the assets are copied into.
    pub destination_bucket: String,
    /// logical id of a distribution to invalidate after the copy. When None
    /// nothing is invalidated and `distribution_paths` must be empty.
    pub distribution: Option<String>,
    /// eg: `/*` to invalidate everything.
    pub distribution_paths: Vec<String>,
    pub prune: bool,
    /// by default the destination objects are deleted together with the deployment.
    pub retain_on_delete: bool,
    /// memory of the handler lambda in MB.
    pub memory_limit: u32,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            logical_id: DEFAULT_LOGICAL_ID.to_string(),
            destination_bucket: String::new(),
            distribution: None,
            distribution_paths: vec![],
            prune: true,
            retain_on_delete: false,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

/// handle to a deployment that was added to a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub logical_id: String,
    pub role_logical_id: String,
    pub handler_logical_id: String,
}

impl Deployment {
    /// the stack parameters the deployer has to fill in, with a description of each.
    pub fn parameters() -> [(&'static str, &'static str); 3] {
        [
            (ASSETS_BUCKET_PARAM, "bucket holding the uploaded site bundle and deployment handler"),
            (SITE_ASSET_KEY_PARAM, "object key of the zipped site bundle"),
            (HANDLER_KEY_PARAM, "object key of the zipped deployment handler"),
        ]
    }
}

fn bucket_arn_sub(bucket_logical_id: &str, suffix: &str) -> Value {
    sub(&format!("arn:${{{}}}:s3:::${{{bucket_logical_id}}}{suffix}", pseudo::PARTITION))
}

fn handler_role(input: &Input) -> CfnRole {
    let mut policy_document = PolicyDocument::default();
    policy_document.add_statement(
        PolicyStatement::allow()
            .with_actions(&["s3:GetObject*", "s3:GetBucket*", "s3:List*"])
            .with_resource(bucket_arn_sub(ASSETS_BUCKET_PARAM, ""))
            .with_resource(bucket_arn_sub(ASSETS_BUCKET_PARAM, "/*")),
    );
    policy_document.add_statement(
        PolicyStatement::allow()
            .with_actions(&[
                "s3:GetObject*",
                "s3:GetBucket*",
                "s3:List*",
                "s3:DeleteObject*",
                "s3:PutObject",
                "s3:PutObjectLegalHold",
                "s3:PutObjectRetention",
                "s3:PutObjectTagging",
                "s3:PutObjectVersionTagging",
                "s3:Abort*",
            ])
            .with_resource(get_att(&input.destination_bucket, "Arn"))
            .with_resource(bucket_arn_sub(&input.destination_bucket, "/*")),
    );
    if input.distribution.is_some() {
        policy_document.add_statement(
            PolicyStatement::allow()
                .with_actions(&["cloudfront:CreateInvalidation", "cloudfront:GetInvalidation"])
                .with_resource(Value::String("*".to_string())),
        );
    }
    let mut role = CfnRole::for_lambda(&format!("auto generated deployment handler role for {}", input.logical_id));
    role.policies.push(RolePolicy {
        policy_document,
        policy_name: format!("{}-deployment-handler", input.logical_id),
    });
    role
}

pub fn config(input: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<Deployment, CfnError> {
    if !stackinp.has_resource(&input.destination_bucket) {
        return Err(CfnError::MissingResource(input.destination_bucket.clone()));
    }
    if let Some(distribution) = &input.distribution {
        if !stackinp.has_resource(distribution) {
            return Err(CfnError::MissingResource(distribution.clone()));
        }
    }
    for (name, description) in Deployment::parameters() {
        stackinp.add_parameter(name, Parameter::string(description));
    }

    let handle = Deployment {
        logical_id: input.logical_id.clone(),
        role_logical_id: format!("{}HandlerRole", input.logical_id),
        handler_logical_id: format!("{}Handler", input.logical_id),
    };
    let handler = CfnFunction {
        code: Code {
            s3_bucket: Some(get_ref(ASSETS_BUCKET_PARAM)),
            s3_key: Some(get_ref(HANDLER_KEY_PARAM)),
            zip_file: None,
        },
        description: Some(format!("Copies the site bundle into {}", input.destination_bucket)),
        handler: "index.handler".to_string(),
        memory_size: Some(input.memory_limit),
        role: get_att(&handle.role_logical_id, "Arn"),
        runtime: HANDLER_RUNTIME.to_string(),
        timeout: Some(900),
    };
    let deployment = CfnBucketDeployment {
        service_token: get_att(&handle.handler_logical_id, "Arn"),
        source_bucket_names: vec![get_ref(ASSETS_BUCKET_PARAM)],
        source_object_keys: vec![get_ref(SITE_ASSET_KEY_PARAM)],
        destination_bucket_name: get_ref(&input.destination_bucket),
        distribution_id: input.distribution.as_deref().map(get_ref),
        distribution_paths: input.distribution_paths.clone(),
        prune: input.prune,
        retain_on_delete: input.retain_on_delete,
    };
    tracing::debug!(
        deployment = %input.logical_id,
        bucket = %input.destination_bucket,
        paths = ?input.distribution_paths,
        "adding bucket deployment"
    );
    stackinp.push(Resource::new(&handle.role_logical_id, handler_role(input)));
    stackinp.push(Resource::new(&handle.handler_logical_id, handler));
    stackinp.push(Resource::new(&handle.logical_id, deployment).with_removal_policy(RemovalPolicy::Destroy));
    Ok(handle)
}

fn iter_files_recursively<P: AsRef<Path>>(
    start_dir: P,
    callback: &mut impl FnMut(PathBuf) -> Result<(), CfnError>,
) -> Result<(), CfnError> {
    let readdir = std::fs::read_dir(start_dir.as_ref())?;
    for entry in readdir {
        let direntry = entry?;
        let path = direntry.path();
        if direntry.file_type()?.is_dir() {
            iter_files_recursively(&path, callback)?;
        } else {
            callback(path)?;
        }
    }
    Ok(())
}

/// adler32 over every file under `dir`: its path relative to `dir` (with `/`
/// separators), then its contents. Files are visited in path order so the
/// result only depends on what is in the directory. Returns 8 lowercase hex chars.
pub fn fingerprint_dir<P: AsRef<Path>>(dir: P) -> Result<String, CfnError> {
    let dir = dir.as_ref();
    let mut files = vec![];
    iter_files_recursively(dir, &mut |p| {
        let relative = p.strip_prefix(dir).unwrap_or(p.as_path());
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((name, p));
        Ok(())
    })?;
    files.sort();

    let mut hasher = adler::Adler32::new();
    for (name, path) in files.iter() {
        let contents = std::fs::read(path)?;
        hasher.write_slice(name.as_bytes());
        hasher.write_slice(&[0]);
        hasher.write_slice(&contents);
        hasher.write_slice(&[0]);
    }
    tracing::debug!(dir = ?dir, files = files.len(), "fingerprinted asset directory");
    Ok(format!("{:08x}", hasher.checksum()))
}

/// object key of the site bundle for a given fingerprint.
pub fn site_asset_key(fingerprint: &str) -> String {
    format!("site_{fingerprint}.zip")
}
