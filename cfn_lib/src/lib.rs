use std::any::Any;

use serde_json::Value;

pub mod error;
pub mod iam;
pub mod intrinsics;
pub mod lambda;
pub mod overrides;
pub mod policy;
pub mod template;

pub use error::CfnError;
pub use intrinsics::*;
pub use overrides::Override;
pub use policy::{Effect, PolicyDocument, PolicyStatement};
pub use template::{Output, Parameter, Template, TemplateResource};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
pub const POLICY_VERSION: &str = "2012-10-17";

/// lets the stack hand back a concrete resource type after it has been boxed,
/// eg: to append statements to a bucket policy that was already pushed.
pub trait AsAny {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// a single cloudformation resource type. Implementors are usually plain
/// serde structs whose field names are renamed to the cloudformation
/// property names, in which case `properties` is just `serde_json::to_value`.
pub trait CfnResource: AsAny {
    /// eg: `AWS::S3::Bucket`
    fn type_string(&self) -> &'static str;

    /// the `Properties` object of this resource.
    fn properties(&self) -> serde_json::Result<Value>;

    /// local checks that can be done before the template is handed to
    /// cloudformation. The message is wrapped with the logical id of the resource.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}
