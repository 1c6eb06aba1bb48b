//! the front stack: a private S3 bucket holding the built frontend, served
//! over https by a cloudfront distribution that reads the bucket through an
//! origin access control. A deployment job copies the assets in and
//! invalidates the distribution cache on every deploy.

use aws_cfn_stack::RemovalPolicy;
use aws_cloudfront_distribution::origin_access_control::{self, OriginAccessControl};
use aws_cloudfront_distribution::{s3_origin, Distribution, ViewerProtocolPolicy};
use aws_s3::{Bucket, PublicAccessBlockConfiguration};
use aws_s3_deployment::Deployment;
use cfn_lib::{CfnError, Template};

pub mod config;
pub mod deploy_script;

pub use config::{ConfigError, FrontStackConfig};

pub const BUCKET_LOGICAL_ID: &str = "S3Bucket";
pub const OAC_LOGICAL_ID: &str = "OriginAccessControl";
pub const DISTRIBUTION_LOGICAL_ID: &str = "Distribution";
pub const DEPLOYMENT_LOGICAL_ID: &str = "DeployReactApp";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cfn(#[from] CfnError),
}

/// the stack input together with handles to everything in it.
pub struct FrontStack {
    pub input: aws_cfn_stack::Input,
    pub bucket: Bucket,
    pub oac: OriginAccessControl,
    pub distribution: Distribution,
    pub deployment: Deployment,
}

impl FrontStack {
    pub fn synthesize(&self) -> Result<Template, CfnError> {
        let template = aws_cfn_stack::synthesize(&self.input)?;
        s3_origin::check_origin_configs(&template, &self.distribution.logical_id)?;
        Ok(template)
    }

    pub fn to_json(&self) -> Result<String, CfnError> {
        self.synthesize()?.to_json_pretty()
    }
}

pub fn build_front_stack(config: &FrontStackConfig) -> Result<FrontStack, Error> {
    config.validate()?;
    let _span = tracing::debug_span!("front_stack", stack = %config.stack_name).entered();
    let mut input = aws_cfn_stack::Input::new(&config.stack_name);
    input.description = Some(format!("static site {} served through cloudfront", config.bucket_name));

    let bucket = aws_s3::config(&aws_s3::Input {
        logical_id: BUCKET_LOGICAL_ID.to_string(),
        bucket_name: Some(config.bucket_name.clone()),
        removal_policy: RemovalPolicy::Destroy,
        auto_delete_objects: true,
        block_public_access: Some(PublicAccessBlockConfiguration::block_all()),
    }, &mut input)?;

    let oac = origin_access_control::config(&origin_access_control::Input {
        logical_id: OAC_LOGICAL_ID.to_string(),
        name: config.oac_name.clone(),
        ..Default::default()
    }, &mut input);

    let distribution = aws_cloudfront_distribution::config(&aws_cloudfront_distribution::Input {
        logical_id: DISTRIBUTION_LOGICAL_ID.to_string(),
        default_root_object: Some(config.default_root_object.clone()),
        viewer_protocol_policy: ViewerProtocolPolicy::HttpsOnly,
        default_origin_domain_name: bucket.regional_domain_name(),
        s3_origin: true,
        ..Default::default()
    }, &mut input)?;

    s3_origin::apply_oac_overrides(&mut input, &distribution, &oac, bucket.regional_domain_name())?;

    let partition = aws_regions::partition_of(&config.region);
    let distribution_arn = distribution.arn(partition, &config.account_for_sub());
    bucket.add_to_resource_policy(
        &mut input,
        s3_origin::read_only_statement(bucket.arn_for_objects("*"), distribution_arn),
    )?;

    let deployment = aws_s3_deployment::config(&aws_s3_deployment::Input {
        logical_id: DEPLOYMENT_LOGICAL_ID.to_string(),
        destination_bucket: bucket.logical_id.clone(),
        distribution: Some(distribution.logical_id.clone()),
        distribution_paths: config.distribution_paths.clone(),
        ..Default::default()
    }, &mut input)?;

    input.add_output("BucketName", "name of the bucket holding the site", bucket.name_ref());
    input.add_output("DistributionId", "id of the distribution serving the site", distribution.id());
    input.add_output("DistributionDomainName", "domain the site is served from", distribution.domain_name());
    tracing::debug!(resources = input.resources.len(), "built front stack");

    Ok(FrontStack { input, bucket, oac, distribution, deployment })
}
