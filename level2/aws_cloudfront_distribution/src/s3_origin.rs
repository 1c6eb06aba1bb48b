//! wiring an S3 bucket origin to an origin access control.
//!
//! The typed distribution always gives its default origin a custom origin config,
//! and cloudformation rejects an origin that has both that and an S3 origin config.
//! The fix is one patch set keyed by property path, applied to the rendered distribution node.

use cfn_lib::{CfnError, Override, PolicyStatement, Template};
use serde_json::Value;

use crate::origin_access_control::OriginAccessControl;
use crate::Distribution;

pub const FIRST_ORIGIN: &str = "DistributionConfig.Origins.0";
pub const CLOUDFRONT_SERVICE_PRINCIPAL: &str = "cloudfront.amazonaws.com";

/// the four patches that turn the first origin into an OAC backed S3 origin:
/// - attach the access control
/// - point the origin at the bucket's regional domain
/// - clear the legacy origin access identity. It has to stay present (as an empty string).
/// - delete the custom origin config
pub fn oac_overrides(oac: &OriginAccessControl, bucket_regional_domain_name: Value) -> Vec<Override> {
    vec![
        Override::property(&format!("{FIRST_ORIGIN}.OriginAccessControlId"), oac.id()),
        Override::property(&format!("{FIRST_ORIGIN}.DomainName"), bucket_regional_domain_name),
        Override::raw(&format!("Properties.{FIRST_ORIGIN}.S3OriginConfig.OriginAccessIdentity"), ""),
        Override::property_deletion(&format!("{FIRST_ORIGIN}.CustomOriginConfig")),
    ]
}

pub fn apply_oac_overrides(
    stackinp: &mut aws_cfn_stack::Input,
    distribution: &Distribution,
    oac: &OriginAccessControl,
    bucket_regional_domain_name: Value,
) -> Result<(), CfnError> {
    let resource = stackinp
        .resource_mut(&distribution.logical_id)
        .ok_or_else(|| CfnError::MissingResource(distribution.logical_id.clone()))?;
    tracing::debug!(
        distribution = %distribution.logical_id,
        oac = %oac.logical_id,
        "attaching origin access control"
    );
    resource.overrides.extend(oac_overrides(oac, bucket_regional_domain_name));
    Ok(())
}

/// lets only `distribution` read objects from the bucket.
/// `objects_arn` is usually `<bucket arn>/*` and `distribution_arn` comes from `Distribution::arn`.
pub fn read_only_statement(objects_arn: Value, distribution_arn: Value) -> PolicyStatement {
    let mut statement = PolicyStatement::allow()
        .with_actions(&["s3:GetObject"])
        .with_service_principal(CLOUDFRONT_SERVICE_PRINCIPAL)
        .with_resource(objects_arn);
    statement.add_condition("StringEquals", "AWS:SourceArn", distribution_arn);
    statement
}

/// checks the rendered distribution: every origin must carry exactly one of
/// S3OriginConfig / CustomOriginConfig.
pub fn check_origin_configs(template: &Template, distribution_logical_id: &str) -> Result<(), CfnError> {
    let resource = template
        .resources
        .get(distribution_logical_id)
        .ok_or_else(|| CfnError::MissingResource(distribution_logical_id.to_string()))?;
    let origins = resource.properties["DistributionConfig"]["Origins"]
        .as_array()
        .ok_or_else(|| CfnError::validation(distribution_logical_id, "Distribution has no origins"))?;
    for (i, origin) in origins.iter().enumerate() {
        let has_s3 = origin.get("S3OriginConfig").is_some();
        let has_custom = origin.get("CustomOriginConfig").is_some();
        if has_s3 == has_custom {
            return Err(CfnError::validation(
                distribution_logical_id,
                format!("Origin {i} must have exactly one of S3OriginConfig or CustomOriginConfig"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config, origin_access_control, Input, ViewerProtocolPolicy};
    use cfn_lib::get_att;
    use serde_json::json;

    fn stack_with_s3_origin() -> (aws_cfn_stack::Input, Distribution, OriginAccessControl) {
        let mut stack = aws_cfn_stack::Input::new("Stack");
        let oac = origin_access_control::config(
            &origin_access_control::Input { name: "oac".into(), ..Default::default() },
            &mut stack,
        );
        let distribution = config(&Input {
            default_root_object: Some("index.html".into()),
            viewer_protocol_policy: ViewerProtocolPolicy::HttpsOnly,
            default_origin_domain_name: json!("bucket.s3.amazonaws.com"),
            s3_origin: true,
            ..Default::default()
        }, &mut stack).unwrap();
        (stack, distribution, oac)
    }

    #[test]
    fn unpatched_s3_origin_fails_the_check() {
        let (stack, distribution, _) = stack_with_s3_origin();
        let template = aws_cfn_stack::synthesize(&stack).unwrap();
        let err = check_origin_configs(&template, &distribution.logical_id).unwrap_err();
        assert!(err.to_string().contains("exactly one of S3OriginConfig or CustomOriginConfig"));
    }

    #[test]
    fn overrides_leave_exactly_one_origin_config() {
        let (mut stack, distribution, oac) = stack_with_s3_origin();
        apply_oac_overrides(&mut stack, &distribution, &oac, json!("bucket.s3.us-east-1.amazonaws.com")).unwrap();
        let template = aws_cfn_stack::synthesize(&stack).unwrap();
        check_origin_configs(&template, &distribution.logical_id).unwrap();
        let origin = &template.resources["Distribution"].properties["DistributionConfig"]["Origins"][0];
        assert_eq!(origin, &json!({
            "DomainName": "bucket.s3.us-east-1.amazonaws.com",
            "Id": "origin0",
            "OriginAccessControlId": get_att("OriginAccessControl", "Id"),
            "S3OriginConfig": {"OriginAccessIdentity": ""},
        }));
    }

    #[test]
    fn origin_without_any_config_fails_the_check() {
        let (mut stack, distribution, _) = stack_with_s3_origin();
        let resource = stack.resource_mut(&distribution.logical_id).unwrap();
        resource.add_property_deletion_override(&format!("{FIRST_ORIGIN}.CustomOriginConfig"));
        resource.add_property_deletion_override(&format!("{FIRST_ORIGIN}.S3OriginConfig"));
        let template = aws_cfn_stack::synthesize(&stack).unwrap();
        let origin = &template.resources["Distribution"].properties["DistributionConfig"]["Origins"][0];
        assert!(origin.get("CustomOriginConfig").is_none());
        assert!(origin.get("S3OriginConfig").is_none());
        let err = check_origin_configs(&template, &distribution.logical_id).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed on resource 'Distribution'\nOrigin 0 must have exactly one of S3OriginConfig or CustomOriginConfig"
        );
    }

    #[test]
    fn overrides_target_exact_paths() {
        let oac = OriginAccessControl { logical_id: "Oac".into() };
        let paths: Vec<String> = oac_overrides(&oac, json!("d")).iter().map(|o| o.path().to_string()).collect();
        assert_eq!(paths, vec![
            "Properties.DistributionConfig.Origins.0.OriginAccessControlId",
            "Properties.DistributionConfig.Origins.0.DomainName",
            "Properties.DistributionConfig.Origins.0.S3OriginConfig.OriginAccessIdentity",
            "Properties.DistributionConfig.Origins.0.CustomOriginConfig",
        ]);
        assert!(matches!(oac_overrides(&oac, json!("d"))[3], Override::Delete { .. }));
    }

    #[test]
    fn overrides_need_the_distribution() {
        let mut stack = aws_cfn_stack::Input::new("Stack");
        let oac = OriginAccessControl { logical_id: "Oac".into() };
        let distribution = Distribution { logical_id: "Missing".into() };
        assert!(apply_oac_overrides(&mut stack, &distribution, &oac, json!("d")).is_err());
    }

    #[test]
    fn read_statement_is_scoped_to_one_distribution() {
        let distribution = Distribution { logical_id: "Distribution".into() };
        let st = read_only_statement(json!("arn:aws:s3:::b/*"), distribution.arn("aws", "123456789012"));
        let v = serde_json::to_value(&st).unwrap();
        assert_eq!(v, json!({
            "Action": "s3:GetObject",
            "Condition": {"StringEquals": {
                "AWS:SourceArn": {"Fn::Sub": "arn:aws:cloudfront::123456789012:distribution/${Distribution}"}
            }},
            "Effect": "Allow",
            "Principal": {"Service": "cloudfront.amazonaws.com"},
            "Resource": "arn:aws:s3:::b/*",
        }));
    }
}
