use serde::Serialize;
use serde_json::Value;

use crate::CfnResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Code {
    #[serde(rename = "S3Bucket", skip_serializing_if = "Option::is_none")]
    pub s3_bucket: Option<Value>,
    #[serde(rename = "S3Key", skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<Value>,
    #[serde(rename = "ZipFile", skip_serializing_if = "Option::is_none")]
    pub zip_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnFunction {
    #[serde(rename = "Code")]
    pub code: Code,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Handler")]
    pub handler: String,
    #[serde(rename = "MemorySize", skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u32>,
    #[serde(rename = "Role")]
    pub role: Value,
    #[serde(rename = "Runtime")]
    pub runtime: String,
    #[serde(rename = "Timeout", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

impl CfnResource for CfnFunction {
    fn type_string(&self) -> &'static str {
        "AWS::Lambda::Function"
    }
    fn properties(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
    fn validate(&self) -> Result<(), String> {
        let inline = self.code.zip_file.is_some();
        let from_s3 = self.code.s3_bucket.is_some() || self.code.s3_key.is_some();
        if inline == from_s3 {
            return Err("Function code must be either an inline ZipFile or an S3Bucket/S3Key pair".to_string());
        }
        if from_s3 && (self.code.s3_bucket.is_none() || self.code.s3_key.is_none()) {
            return Err("Function code from S3 requires both S3Bucket and S3Key".to_string());
        }
        if let Some(memory_size) = self.memory_size {
            if !(128..=10240).contains(&memory_size) {
                return Err(format!("Invalid memory size {:?}\nMust be between 128 and 10240", memory_size));
            }
        }
        if let Some(timeout) = self.timeout {
            if !(1..=900).contains(&timeout) {
                return Err(format!("Invalid timeout {:?}\nMust be between 1 and 900", timeout));
            }
        }
        Ok(())
    }
}
