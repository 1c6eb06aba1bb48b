use aws_cfn_stack::Resource;
use cfn_lib::{get_att, CfnResource};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_LOGICAL_ID: &str = "OriginAccessControl";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum OriginType {
    #[default]
    #[serde(rename = "s3")]
    S3,
    #[serde(rename = "mediastore")]
    MediaStore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SigningBehavior {
    #[default]
    #[serde(rename = "always")]
    Always,
    #[serde(rename = "never")]
    Never,
    #[serde(rename = "no-override")]
    NoOverride,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SigningProtocol {
    #[default]
    #[serde(rename = "sigv4")]
    SigV4,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginAccessControlConfig {
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "OriginAccessControlOriginType")]
    pub origin_type: OriginType,
    #[serde(rename = "SigningBehavior")]
    pub signing_behavior: SigningBehavior,
    #[serde(rename = "SigningProtocol")]
    pub signing_protocol: SigningProtocol,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnOriginAccessControl {
    #[serde(rename = "OriginAccessControlConfig")]
    pub origin_access_control_config: OriginAccessControlConfig,
}

impl CfnResource for CfnOriginAccessControl {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::OriginAccessControl"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn validate(&self) -> Result<(), String> {
        let name = &self.origin_access_control_config.name;
        if name.is_empty() || name.len() > 64 {
            return Err(format!("Invalid origin access control name {:?}\nMust be between 1 and 64 characters", name));
        }
        Ok(())
    }
}

pub struct Input {
    pub logical_id: String,
    /// unique within the account.
    pub name: String,
    pub description: Option<String>,
    pub origin_type: OriginType,
    /// always sign origin requests unless told otherwise.
    pub signing_behavior: SigningBehavior,
    pub signing_protocol: SigningProtocol,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            logical_id: DEFAULT_LOGICAL_ID.to_string(),
            name: String::new(),
            description: Some("Access Control".to_string()),
            origin_type: OriginType::S3,
            signing_behavior: SigningBehavior::Always,
            signing_protocol: SigningProtocol::SigV4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OriginAccessControl {
    pub logical_id: String,
}

impl OriginAccessControl {
    /// the id an origin uses to reference this access control.
    pub fn id(&self) -> Value {
        get_att(&self.logical_id, "Id")
    }
}

pub fn config(input: &Input, stackinp: &mut aws_cfn_stack::Input) -> OriginAccessControl {
    let oac = CfnOriginAccessControl {
        origin_access_control_config: OriginAccessControlConfig {
            description: input.description.clone(),
            name: input.name.clone(),
            origin_type: input.origin_type,
            signing_behavior: input.signing_behavior,
            signing_protocol: input.signing_protocol,
        },
    };
    stackinp.push(Resource::new(&input.logical_id, oac));
    OriginAccessControl { logical_id: input.logical_id.clone() }
}
