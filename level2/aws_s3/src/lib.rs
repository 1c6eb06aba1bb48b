//! this is a higher level module for creating S3 buckets easily. In addition to the
//! bucket itself it can create:
//! - a bucket policy, created lazily the first time a statement is added to it.
//! - cleanup resources (a custom resource, a lambda function that performs the
//!   cleanup, and a role for that function) that delete the contents of the bucket
//!   when the stack is deleted. Without these, deleting a stack with a non empty
//!   bucket fails.

use aws_cfn_stack::{RemovalPolicy, Resource};
use cfn_lib::iam::{CfnRole, RolePolicy};
use cfn_lib::lambda::{CfnFunction, Code};
use cfn_lib::{get_att, get_ref, join, CfnError, CfnResource, PolicyDocument, PolicyStatement};
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_LOGICAL_ID: &str = "S3Bucket";
pub const AUTO_DELETE_TAG: &str = "auto-delete-objects";

const CLEANUP_FUNCTION_CODE: &str = r#"
const { S3Client, ListObjectVersionsCommand, DeleteObjectsCommand } = require('@aws-sdk/client-s3');
const response = require('cfn-response');
const s3 = new S3Client({});
async function emptyBucket(bucketName) {
    let keyMarker = undefined;
    let versionIdMarker = undefined;
    let truncated = true;
    while (truncated) {
        const page = await s3.send(new ListObjectVersionsCommand({
            Bucket: bucketName, KeyMarker: keyMarker, VersionIdMarker: versionIdMarker,
        }));
        const objects = [...(page.Versions || []), ...(page.DeleteMarkers || [])]
            .map(o => ({ Key: o.Key, VersionId: o.VersionId }));
        if (objects.length > 0) {
            await s3.send(new DeleteObjectsCommand({ Bucket: bucketName, Delete: { Objects: objects } }));
        }
        truncated = page.IsTruncated;
        keyMarker = page.NextKeyMarker;
        versionIdMarker = page.NextVersionIdMarker;
    }
}
exports.handler = async function(event, context) {
    let responseType = response.SUCCESS;
    if (event.RequestType == 'Delete') {
        try {
            await emptyBucket(event.ResourceProperties.BucketName);
        } catch (err) {
            console.log(`Error deleting objects from S3 bucket: ${err}`);
            responseType = response.FAILED;
        }
    }
    await response.send(event, context, responseType);
}
"#;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicAccessBlockConfiguration {
    #[serde(rename = "BlockPublicAcls")]
    pub block_public_acls: bool,
    #[serde(rename = "BlockPublicPolicy")]
    pub block_public_policy: bool,
    #[serde(rename = "IgnorePublicAcls")]
    pub ignore_public_acls: bool,
    #[serde(rename = "RestrictPublicBuckets")]
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlockConfiguration {
    pub fn block_all() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }

    pub fn blocks_everything(&self) -> bool {
        self.block_public_acls && self.block_public_policy && self.ignore_public_acls && self.restrict_public_buckets
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CfnBucket {
    /// left empty, cloudformation generates a name from the logical id.
    #[serde(rename = "BucketName", skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(rename = "PublicAccessBlockConfiguration", skip_serializing_if = "Option::is_none")]
    pub public_access_block_configuration: Option<PublicAccessBlockConfiguration>,
    #[serde(rename = "Tags", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

pub fn verify_bucket_name(bucket_name: &str) -> Result<(), String> {
    if bucket_name.len() > 63 || bucket_name.len() < 3 {
        return Err(format!("Invalid bucket name {:?}\nMust be between 3 and 63 characters", bucket_name));
    }
    let valid_char_check = |c: char| -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-'
    };
    if !bucket_name.chars().all(valid_char_check) {
        return Err(format!("Invalid bucket name {:?}\nMay only contain lowercase letters, numbers, dots, and dashes", bucket_name));
    }
    let first_ok = bucket_name.chars().next().map(|c| c.is_ascii_alphanumeric()).unwrap_or(false);
    let last_ok = bucket_name.chars().last().map(|c| c.is_ascii_alphanumeric()).unwrap_or(false);
    if !first_ok || !last_ok {
        return Err(format!("Invalid bucket name {:?}\nFirst and last character mut be either lowercase letter, or number", bucket_name));
    }
    if bucket_name.contains("..") {
        return Err(format!("Invalid bucket name {:?}\nMay not contain two consecutive dots", bucket_name));
    }
    Ok(())
}

impl CfnResource for CfnBucket {
    fn type_string(&self) -> &'static str {
        "AWS::S3::Bucket"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn validate(&self) -> Result<(), String> {
        match &self.bucket_name {
            Some(name) => verify_bucket_name(name),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnBucketPolicy {
    #[serde(rename = "Bucket")]
    pub bucket: Value,
    #[serde(rename = "PolicyDocument")]
    pub policy_document: PolicyDocument,
}

impl CfnResource for CfnBucketPolicy {
    fn type_string(&self) -> &'static str {
        "AWS::S3::BucketPolicy"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn validate(&self) -> Result<(), String> {
        self.policy_document.validate()
    }
}

/// custom resource whose only job is to call the cleanup function
/// with the bucket name when the stack is deleted.
pub struct CleanupResource {
    pub lambda_logical_id: String,
    pub bucket_logical_id: String,
}

impl CfnResource for CleanupResource {
    fn type_string(&self) -> &'static str {
        "Custom::S3AutoDeleteObjects"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        let mut map = Map::new();
        map.insert("ServiceToken".to_string(), get_att(&self.lambda_logical_id, "Arn"));
        map.insert("BucketName".to_string(), get_ref(&self.bucket_logical_id));
        Ok(Value::Object(map))
    }
}

pub struct Input {
    /// logical id of the bucket in the template. Every other resource
    /// this module creates derives its logical id from this one.
    pub logical_id: String,
    /// physical name of the bucket. Must be globally unique.
    /// Leave as None to let cloudformation pick a name.
    pub bucket_name: Option<String>,
    /// By default buckets are retained when removed from the stack.
    pub removal_policy: RemovalPolicy,
    /// create cleanup resources that empty the bucket before cloudformation deletes it.
    /// Only valid together with `RemovalPolicy::Destroy`.
    pub auto_delete_objects: bool,
    /// by default all public access is blocked. Set to None to leave the
    /// bucket's public access block unset.
    pub block_public_access: Option<PublicAccessBlockConfiguration>,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            logical_id: DEFAULT_LOGICAL_ID.to_string(),
            bucket_name: None,
            removal_policy: RemovalPolicy::Retain,
            auto_delete_objects: false,
            block_public_access: Some(PublicAccessBlockConfiguration::block_all()),
        }
    }
}

/// handle to a bucket that was added to a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub logical_id: String,
    pub policy_logical_id: String,
    pub cleanup_logical_id: Option<String>,
}

impl Bucket {
    /// Ref of a bucket is its name
    pub fn name_ref(&self) -> Value {
        get_ref(&self.logical_id)
    }

    pub fn arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    /// `<bucket>.s3.<region>.amazonaws.com`
    pub fn regional_domain_name(&self) -> Value {
        get_att(&self.logical_id, "RegionalDomainName")
    }

    /// `<bucket arn>/<pattern>`, eg: `arn_for_objects("*")` for every object in the bucket
    pub fn arn_for_objects(&self, pattern: &str) -> Value {
        join("", vec![self.arn(), Value::String(format!("/{pattern}"))])
    }

    /// appends a statement to this bucket's resource policy, creating the policy
    /// resource the first time this is called.
    pub fn add_to_resource_policy(
        &self,
        stackinp: &mut aws_cfn_stack::Input,
        statement: PolicyStatement,
    ) -> Result<(), CfnError> {
        if !stackinp.has_resource(&self.logical_id) {
            return Err(CfnError::MissingResource(self.logical_id.clone()));
        }
        if let Some(policy) = stackinp.properties_mut::<CfnBucketPolicy>(&self.policy_logical_id) {
            policy.policy_document.add_statement(statement);
            return Ok(());
        }
        let mut policy_document = PolicyDocument::default();
        policy_document.add_statement(statement);
        let policy = CfnBucketPolicy {
            bucket: self.name_ref(),
            policy_document,
        };
        tracing::debug!(policy = %self.policy_logical_id, "creating bucket policy");
        stackinp.push(Resource::new(&self.policy_logical_id, policy));
        // the cleanup has to run while the policy still exists.
        if let Some(cleanup) = &self.cleanup_logical_id {
            if let Some(resource) = stackinp.resource_mut(cleanup) {
                resource.add_depends_on(&self.policy_logical_id);
            }
        }
        Ok(())
    }
}

fn cleanup_role(bucket: &Bucket) -> CfnRole {
    let mut policy_document = PolicyDocument::default();
    policy_document.add_statement(
        PolicyStatement::allow()
            .with_actions(&["s3:ListBucket", "s3:ListBucketVersions", "s3:GetBucket*"])
            .with_resource(bucket.arn()),
    );
    policy_document.add_statement(
        PolicyStatement::allow()
            .with_actions(&["s3:DeleteObject*"])
            .with_resource(bucket.arn_for_objects("*")),
    );
    let mut role = CfnRole::for_lambda(&format!("auto generated cleanup resource for {}", bucket.logical_id));
    role.policies.push(RolePolicy {
        policy_document,
        policy_name: format!("{}-auto-delete-objects", bucket.logical_id),
    });
    role
}

pub fn config(input: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<Bucket, CfnError> {
    if input.auto_delete_objects && input.removal_policy != RemovalPolicy::Destroy {
        return Err(CfnError::validation(
            &input.logical_id,
            "Cannot auto delete objects of a bucket without setting its removal policy to Destroy",
        ));
    }
    let mut bucket = CfnBucket {
        bucket_name: input.bucket_name.clone(),
        public_access_block_configuration: input.block_public_access.clone(),
        tags: vec![],
    };
    if input.auto_delete_objects {
        bucket.tags.push(Tag { key: AUTO_DELETE_TAG.to_string(), value: "true".to_string() });
    }
    stackinp.push(Resource::new(&input.logical_id, bucket).with_removal_policy(input.removal_policy));

    let mut handle = Bucket {
        logical_id: input.logical_id.clone(),
        policy_logical_id: format!("{}Policy", input.logical_id),
        cleanup_logical_id: None,
    };
    if !input.auto_delete_objects {
        return Ok(handle);
    }

    let role_id = format!("{}AutoDeleteObjectsRole", input.logical_id);
    let function_id = format!("{}AutoDeleteObjectsFunction", input.logical_id);
    let cleanup_id = format!("{}AutoDeleteObjectsCustomResource", input.logical_id);
    let cleanup_function = CfnFunction {
        code: Code {
            zip_file: Some(CLEANUP_FUNCTION_CODE.to_string()),
            ..Default::default()
        },
        description: Some(format!("Deletes every object in {} when the stack is deleted", input.logical_id)),
        handler: "index.handler".to_string(),
        memory_size: None,
        role: get_att(&role_id, "Arn"),
        runtime: "nodejs18.x".to_string(),
        timeout: Some(900),
    };
    let cleanup = CleanupResource {
        lambda_logical_id: function_id.clone(),
        bucket_logical_id: input.logical_id.clone(),
    };
    stackinp.push(Resource::new(&role_id, cleanup_role(&handle)));
    stackinp.push(Resource::new(&function_id, cleanup_function));
    stackinp.push(Resource::new(&cleanup_id, cleanup).with_removal_policy(RemovalPolicy::Destroy));
    handle.cleanup_logical_id = Some(cleanup_id);
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn destroy_input(name: &str) -> Input {
        Input {
            bucket_name: Some(name.to_string()),
            removal_policy: RemovalPolicy::Destroy,
            auto_delete_objects: true,
            ..Default::default()
        }
    }

    #[test]
    fn public_access_is_blocked_by_default() {
        for name in ["example-bucket", "another.bucket.name", "abc"] {
            let mut stack = aws_cfn_stack::Input::new("Stack");
            config(&destroy_input(name), &mut stack).unwrap();
            let template = aws_cfn_stack::synthesize(&stack).unwrap();
            let block = &template.resources[DEFAULT_LOGICAL_ID].properties["PublicAccessBlockConfiguration"];
            assert_eq!(block, &json!({
                "BlockPublicAcls": true,
                "BlockPublicPolicy": true,
                "IgnorePublicAcls": true,
                "RestrictPublicBuckets": true,
            }));
        }
    }

    #[test]
    fn compile_error_on_invalid_name() {
        let mut stack = aws_cfn_stack::Input::new("Stack");
        config(&destroy_input("something..exact"), &mut stack).unwrap();
        let err = aws_cfn_stack::synthesize(&stack).unwrap_err();
        assert!(err.to_string().contains("May not contain two consecutive dots"));

        assert!(verify_bucket_name("ab").unwrap_err().contains("Must be between 3 and 63 characters"));
        assert!(verify_bucket_name("Upper").unwrap_err().contains("May only contain lowercase"));
        assert!(verify_bucket_name("-dash").unwrap_err().contains("First and last character"));
    }

    #[test]
    fn auto_delete_requires_destroy() {
        let mut stack = aws_cfn_stack::Input::new("Stack");
        let input = Input { auto_delete_objects: true, ..Default::default() };
        assert!(config(&input, &mut stack).is_err());
    }

    #[test]
    fn destroy_removal_creates_cleanup_resources() {
        let mut stack = aws_cfn_stack::Input::new("Stack");
        let bucket = config(&destroy_input("example-bucket"), &mut stack).unwrap();
        assert_eq!(bucket.cleanup_logical_id.as_deref(), Some("S3BucketAutoDeleteObjectsCustomResource"));
        let template = aws_cfn_stack::synthesize(&stack).unwrap();
        let b = &template.resources["S3Bucket"];
        assert_eq!(b.deletion_policy.as_deref(), Some("Delete"));
        assert_eq!(b.update_replace_policy.as_deref(), Some("Delete"));
        assert_eq!(b.properties["Tags"], json!([{"Key": AUTO_DELETE_TAG, "Value": "true"}]));
        let cleanup = &template.resources["S3BucketAutoDeleteObjectsCustomResource"];
        assert_eq!(cleanup.ty, "Custom::S3AutoDeleteObjects");
        assert_eq!(cleanup.properties["BucketName"], json!({"Ref": "S3Bucket"}));
        assert_eq!(
            cleanup.properties["ServiceToken"],
            json!({"Fn::GetAtt": ["S3BucketAutoDeleteObjectsFunction", "Arn"]})
        );
        assert_eq!(template.resources["S3BucketAutoDeleteObjectsRole"].ty, "AWS::IAM::Role");
    }

    #[test]
    fn retained_bucket_has_no_cleanup() {
        let mut stack = aws_cfn_stack::Input::new("Stack");
        let bucket = config(&Input::default(), &mut stack).unwrap();
        assert!(bucket.cleanup_logical_id.is_none());
        assert_eq!(stack.resources.len(), 1);
        let template = aws_cfn_stack::synthesize(&stack).unwrap();
        assert_eq!(template.resources["S3Bucket"].deletion_policy.as_deref(), Some("Retain"));
        assert!(template.resources["S3Bucket"].properties.get("BucketName").is_none());
    }

    #[test]
    fn policy_statements_are_appended() {
        let mut stack = aws_cfn_stack::Input::new("Stack");
        let bucket = config(&destroy_input("example-bucket"), &mut stack).unwrap();
        let read = PolicyStatement::allow()
            .with_actions(&["s3:GetObject"])
            .with_resource(bucket.arn_for_objects("*"));
        bucket.add_to_resource_policy(&mut stack, read.clone()).unwrap();
        bucket.add_to_resource_policy(&mut stack, read).unwrap();
        let template = aws_cfn_stack::synthesize(&stack).unwrap();
        let policy = &template.resources["S3BucketPolicy"];
        assert_eq!(policy.properties["Bucket"], json!({"Ref": "S3Bucket"}));
        assert_eq!(policy.properties["PolicyDocument"]["Statement"].as_array().unwrap().len(), 2);
        assert_eq!(
            policy.properties["PolicyDocument"]["Statement"][0]["Resource"],
            json!({"Fn::Join": ["", [{"Fn::GetAtt": ["S3Bucket", "Arn"]}, "/*"]]})
        );
        let cleanup = &template.resources["S3BucketAutoDeleteObjectsCustomResource"];
        assert_eq!(cleanup.depends_on, vec!["S3BucketPolicy".to_string()]);
    }

    #[test]
    fn policy_needs_its_bucket() {
        let mut stack = aws_cfn_stack::Input::new("Stack");
        let bucket = Bucket {
            logical_id: "Ghost".into(),
            policy_logical_id: "GhostPolicy".into(),
            cleanup_logical_id: None,
        };
        let err = bucket.add_to_resource_policy(&mut stack, PolicyStatement::allow()).unwrap_err();
        assert!(matches!(err, CfnError::MissingResource(_)));
    }
}
