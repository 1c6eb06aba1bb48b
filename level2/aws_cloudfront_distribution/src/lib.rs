use aws_cfn_stack::Resource;
use cfn_lib::{get_att, get_ref, sub, CfnError, CfnResource};
use serde::Serialize;
use serde_json::Value;

pub mod origin_access_control;
pub mod s3_origin;

/// caching optimized:
/// https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/using-managed-cache-policies.html#managed-cache-caching-optimized
pub const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";
pub const DEFAULT_LOGICAL_ID: &str = "Distribution";
pub const DEFAULT_ORIGIN_ID: &str = "origin0";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ViewerProtocolPolicy {
    #[default]
    #[serde(rename = "allow-all")]
    AllowAll,
    #[serde(rename = "https-only")]
    HttpsOnly,
    #[serde(rename = "redirect-to-https")]
    RedirectToHttps,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum OriginProtocolPolicy {
    #[default]
    #[serde(rename = "http-only")]
    HttpOnly,
    #[serde(rename = "https-only")]
    HttpsOnly,
    #[serde(rename = "match-viewer")]
    MatchViewer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomOriginConfig {
    #[serde(rename = "HTTPPort")]
    pub http_port: u16,
    #[serde(rename = "HTTPSPort")]
    pub https_port: u16,
    #[serde(rename = "OriginProtocolPolicy")]
    pub origin_protocol_policy: OriginProtocolPolicy,
}

impl Default for CustomOriginConfig {
    fn default() -> Self {
        Self {
            http_port: 80,
            https_port: 443,
            origin_protocol_policy: OriginProtocolPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct S3OriginConfig {
    /// legacy origin access identity, `origin-access-identity/cloudfront/<id>`.
    /// Must be present but empty when the origin uses an origin access control instead.
    #[serde(rename = "OriginAccessIdentity", skip_serializing_if = "Option::is_none")]
    pub origin_access_identity: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Origin {
    #[serde(rename = "CustomOriginConfig", skip_serializing_if = "Option::is_none")]
    pub custom_origin_config: Option<CustomOriginConfig>,
    #[serde(rename = "DomainName")]
    pub domain_name: Value,
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "OriginAccessControlId", skip_serializing_if = "Option::is_none")]
    pub origin_access_control_id: Option<Value>,
    #[serde(rename = "S3OriginConfig", skip_serializing_if = "Option::is_none")]
    pub s3_origin_config: Option<S3OriginConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultCacheBehavior {
    #[serde(rename = "CachePolicyId")]
    pub cache_policy_id: String,
    #[serde(rename = "Compress")]
    pub compress: bool,
    #[serde(rename = "TargetOriginId")]
    pub target_origin_id: String,
    #[serde(rename = "ViewerProtocolPolicy")]
    pub viewer_protocol_policy: ViewerProtocolPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionConfig {
    #[serde(rename = "Comment", skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "DefaultCacheBehavior")]
    pub default_cache_behavior: DefaultCacheBehavior,
    #[serde(rename = "DefaultRootObject", skip_serializing_if = "Option::is_none")]
    pub default_root_object: Option<String>,
    #[serde(rename = "Enabled")]
    pub enabled: bool,
    #[serde(rename = "HttpVersion")]
    pub http_version: String,
    #[serde(rename = "IPV6Enabled")]
    pub ipv6_enabled: bool,
    #[serde(rename = "Origins")]
    pub origins: Vec<Origin>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnDistribution {
    #[serde(rename = "DistributionConfig")]
    pub distribution_config: DistributionConfig,
}

impl CfnResource for CfnDistribution {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::Distribution"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn validate(&self) -> Result<(), String> {
        let config = &self.distribution_config;
        if config.origins.is_empty() {
            return Err("Distribution must have at least one origin".to_string());
        }
        for (i, origin) in config.origins.iter().enumerate() {
            if config.origins[..i].iter().any(|o| o.id == origin.id) {
                return Err(format!("Distribution received duplicate origin id {}. All origin ids in a distribution must be unique", origin.id));
            }
        }
        let target = &config.default_cache_behavior.target_origin_id;
        if !config.origins.iter().any(|o| &o.id == target) {
            return Err(format!("Default cache behavior targets origin {target} which is not an origin of this distribution"));
        }
        if let Some(root) = &config.default_root_object {
            if root.starts_with('/') {
                return Err(format!("Invalid default root object {root:?}\nMust not start with '/'"));
            }
        }
        Ok(())
    }
}

pub struct Input {
    /// logical id of the distribution in the template.
    pub logical_id: String,

    /// by default we create the distribution enabled and ready to use.
    /// optionally set this field to true to create the distribution
    /// but have it be disabled at first.
    pub disabled: bool,

    pub comment: Option<String>,

    /// object returned when a viewer requests the root url, eg: `index.html`
    pub default_root_object: Option<String>,

    /// By default set to allow-all.
    pub viewer_protocol_policy: ViewerProtocolPolicy,

    /// the domain name of your default origin.
    pub default_origin_domain_name: Value,

    /// the policy cloudfront should use when making requests to your origin.
    /// by default we set this to http-only.
    pub default_origin_protocol_policy: OriginProtocolPolicy,

    /// the default origin always gets a custom origin config. Set this when the
    /// origin is an S3 bucket to also give it an S3 origin config.
    /// A distribution origin may only have one of the two, so bucket origins
    /// must be finished with `s3_origin::apply_oac_overrides`.
    pub s3_origin: bool,

    pub cache_policy_id: String,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            logical_id: DEFAULT_LOGICAL_ID.to_string(),
            disabled: false,
            comment: None,
            default_root_object: None,
            viewer_protocol_policy: ViewerProtocolPolicy::AllowAll,
            default_origin_domain_name: Value::String(String::new()),
            default_origin_protocol_policy: OriginProtocolPolicy::HttpOnly,
            s3_origin: false,
            cache_policy_id: CACHING_OPTIMIZED_POLICY_ID.to_string(),
        }
    }
}

/// handle to a distribution that was added to a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub logical_id: String,
}

impl Distribution {
    /// Ref of a distribution is its id, eg: `E2QWRUHAPOMQZL`
    pub fn id(&self) -> Value {
        get_ref(&self.logical_id)
    }

    /// eg: `d111111abcdef8.cloudfront.net`
    pub fn domain_name(&self) -> Value {
        get_att(&self.logical_id, "DomainName")
    }

    /// `arn:<partition>:cloudfront::<account>:distribution/<id>`.
    /// `account` is substituted as is, so pass `${AWS::AccountId}` to resolve it at deploy time.
    pub fn arn(&self, partition: &str, account: &str) -> Value {
        sub(&format!(
            "arn:{partition}:cloudfront::{account}:distribution/${{{}}}",
            self.logical_id
        ))
    }
}

pub fn config(input: &Input, stackinp: &mut aws_cfn_stack::Input) -> Result<Distribution, CfnError> {
    if input.default_origin_domain_name == Value::String(String::new()) {
        return Err(CfnError::validation(&input.logical_id, "cloudfront distribution origin domain_name is required"));
    }
    let default_origin = Origin {
        custom_origin_config: Some(CustomOriginConfig {
            origin_protocol_policy: input.default_origin_protocol_policy,
            ..Default::default()
        }),
        domain_name: input.default_origin_domain_name.clone(),
        id: DEFAULT_ORIGIN_ID.to_string(),
        origin_access_control_id: None,
        s3_origin_config: input.s3_origin.then(S3OriginConfig::default),
    };
    let distribution = CfnDistribution {
        distribution_config: DistributionConfig {
            comment: input.comment.clone(),
            default_cache_behavior: DefaultCacheBehavior {
                cache_policy_id: input.cache_policy_id.clone(),
                compress: true,
                target_origin_id: DEFAULT_ORIGIN_ID.to_string(),
                viewer_protocol_policy: input.viewer_protocol_policy,
            },
            default_root_object: input.default_root_object.clone(),
            enabled: !input.disabled,
            http_version: "http2".to_string(),
            ipv6_enabled: true,
            origins: vec![default_origin],
        },
    };
    stackinp.push(Resource::new(&input.logical_id, distribution));
    Ok(Distribution { logical_id: input.logical_id.clone() })
}
