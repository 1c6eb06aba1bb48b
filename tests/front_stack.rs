use infla::{build_front_stack, FrontStackConfig};
use serde_json::{json, Value};

fn example_config() -> FrontStackConfig {
    FrontStackConfig {
        bucket_name: "example-bucket".to_string(),
        account: Some("123456789012".to_string()),
        ..Default::default()
    }
}

fn template_json(config: &FrontStackConfig) -> Value {
    let s = build_front_stack(config).unwrap().to_json().unwrap();
    serde_json::from_str(&s).unwrap()
}

fn resources_of_type<'a>(template: &'a Value, ty: &str) -> Vec<(&'a String, &'a Value)> {
    template["Resources"]
        .as_object()
        .unwrap()
        .iter()
        .filter(|(_, r)| r["Type"] == ty)
        .collect()
}

#[test]
fn bucket_blocks_all_public_access_for_any_name() {
    for name in ["example-bucket", "my.site.assets", "20240619-line-todo-app-bucket"] {
        let config = FrontStackConfig { bucket_name: name.to_string(), ..example_config() };
        let template = template_json(&config);
        let buckets = resources_of_type(&template, "AWS::S3::Bucket");
        assert_eq!(buckets.len(), 1);
        let props = &buckets[0].1["Properties"];
        assert_eq!(props["BucketName"], json!(name));
        assert_eq!(props["PublicAccessBlockConfiguration"], json!({
            "BlockPublicAcls": true,
            "BlockPublicPolicy": true,
            "IgnorePublicAcls": true,
            "RestrictPublicBuckets": true,
        }));
    }
}

#[test]
fn origin_has_exactly_one_origin_config() {
    let template = template_json(&example_config());
    let distributions = resources_of_type(&template, "AWS::CloudFront::Distribution");
    assert_eq!(distributions.len(), 1);
    let config = &distributions[0].1["Properties"]["DistributionConfig"];
    let origins = config["Origins"].as_array().unwrap();
    assert_eq!(origins.len(), 1);
    let origin = &origins[0];
    assert_eq!(origin["S3OriginConfig"], json!({"OriginAccessIdentity": ""}));
    assert!(origin.get("CustomOriginConfig").is_none());
    assert_eq!(origin["DomainName"], json!({"Fn::GetAtt": ["S3Bucket", "RegionalDomainName"]}));
    assert_eq!(config["DefaultRootObject"], json!("index.html"));
    assert_eq!(config["DefaultCacheBehavior"]["ViewerProtocolPolicy"], json!("https-only"));
}

#[test]
fn origin_references_the_declared_access_control() {
    let template = template_json(&example_config());
    let oacs = resources_of_type(&template, "AWS::CloudFront::OriginAccessControl");
    assert_eq!(oacs.len(), 1);
    let (oac_id, oac) = oacs[0];
    assert_eq!(oac["Properties"]["OriginAccessControlConfig"], json!({
        "Description": "Access Control",
        "Name": "20240619-line-todo-app-oac",
        "OriginAccessControlOriginType": "s3",
        "SigningBehavior": "always",
        "SigningProtocol": "sigv4",
    }));
    let origin = &template["Resources"]["Distribution"]["Properties"]["DistributionConfig"]["Origins"][0];
    assert_eq!(origin["OriginAccessControlId"], json!({"Fn::GetAtt": [oac_id, "Id"]}));
}

#[test]
fn bucket_policy_is_scoped_to_the_distribution() {
    let template = template_json(&example_config());
    let policies = resources_of_type(&template, "AWS::S3::BucketPolicy");
    assert_eq!(policies.len(), 1);
    let props = &policies[0].1["Properties"];
    assert_eq!(props["Bucket"], json!({"Ref": "S3Bucket"}));
    let statements = props["PolicyDocument"]["Statement"].as_array().unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0], json!({
        "Action": "s3:GetObject",
        "Condition": {"StringEquals": {
            "AWS:SourceArn": {"Fn::Sub": "arn:aws:cloudfront::123456789012:distribution/${Distribution}"}
        }},
        "Effect": "Allow",
        "Principal": {"Service": "cloudfront.amazonaws.com"},
        "Resource": {"Fn::Join": ["", [{"Fn::GetAtt": ["S3Bucket", "Arn"]}, "/*"]]},
    }));

    // resolving ${Distribution} the way cloudformation does gives exactly one arn
    let condition = statements[0]["Condition"]["StringEquals"]["AWS:SourceArn"]["Fn::Sub"].as_str().unwrap();
    assert_eq!(
        condition.replace("${Distribution}", "E2QWRUHAPOMQZL"),
        "arn:aws:cloudfront::123456789012:distribution/E2QWRUHAPOMQZL"
    );
}

#[test]
fn unset_account_resolves_at_deploy_time() {
    let config = FrontStackConfig { account: None, ..example_config() };
    let template = template_json(&config);
    let statement = &template["Resources"]["S3BucketPolicy"]["Properties"]["PolicyDocument"]["Statement"][0];
    assert_eq!(
        statement["Condition"]["StringEquals"]["AWS:SourceArn"],
        json!({"Fn::Sub": "arn:aws:cloudfront::${AWS::AccountId}:distribution/${Distribution}"})
    );
}

#[test]
fn stack_removal_tears_down_bucket_and_objects() {
    let template = template_json(&example_config());
    let bucket = &template["Resources"]["S3Bucket"];
    assert_eq!(bucket["DeletionPolicy"], json!("Delete"));
    assert_eq!(bucket["UpdateReplacePolicy"], json!("Delete"));

    let cleanups = resources_of_type(&template, "Custom::S3AutoDeleteObjects");
    assert_eq!(cleanups.len(), 1);
    let cleanup = cleanups[0].1;
    assert_eq!(cleanup["Properties"]["BucketName"], json!({"Ref": "S3Bucket"}));
    assert_eq!(cleanup["DependsOn"], json!(["S3BucketPolicy"]));
    let function_id = cleanup["Properties"]["ServiceToken"]["Fn::GetAtt"][0].as_str().unwrap();
    assert_eq!(template["Resources"][function_id]["Type"], json!("AWS::Lambda::Function"));
}

#[test]
fn deployment_copies_assets_and_invalidates_everything() {
    let template = template_json(&example_config());
    let deployments = resources_of_type(&template, "Custom::CDKBucketDeployment");
    assert_eq!(deployments.len(), 1);
    let props = &deployments[0].1["Properties"];
    assert_eq!(props["DestinationBucketName"], json!({"Ref": "S3Bucket"}));
    assert_eq!(props["DistributionId"], json!({"Ref": "Distribution"}));
    assert_eq!(props["DistributionPaths"], json!(["/*"]));
    let parameters = template["Parameters"].as_object().unwrap();
    assert!(parameters.contains_key("AssetsBucketName"));
    assert!(parameters.contains_key("SiteAssetObjectKey"));
    assert!(parameters.contains_key("DeploymentHandlerObjectKey"));
}

#[test]
fn synthesis_is_byte_identical() {
    let first = build_front_stack(&example_config()).unwrap().to_json().unwrap();
    let second = build_front_stack(&example_config()).unwrap().to_json().unwrap();
    assert_eq!(first, second);
    assert!(first.starts_with("{\n  \"AWSTemplateFormatVersion\": \"2010-09-09\""));
}

#[test]
fn bad_bucket_name_never_reaches_the_template() {
    let config = FrontStackConfig { bucket_name: "example..bucket".to_string(), ..example_config() };
    let err = build_front_stack(&config).err().unwrap();
    assert!(err.to_string().contains("bucket_name"));
}
