//! renders `deploy.sh`, which zips and uploads the site bundle then deploys the
//! synthesized template with the uploaded object keys as parameters.

use std::path::{Path, PathBuf};

use aws_s3_deployment::{ASSETS_BUCKET_PARAM, HANDLER_KEY_PARAM, SITE_ASSET_KEY_PARAM};
use cfn_lib::CfnError;

use crate::FrontStackConfig;

pub const DEPLOY_FILE: &str = "deploy.sh";
pub const STEP_PRE_BUILD: &str = "# 0. pre-build:";
pub const STEP_BUILD: &str = "# 1. build:";
pub const STEP_PACKAGE: &str = "# 2. package:";
pub const STEP_DEPLOY: &str = "# 3. deploy:";
pub const DEFAULT_HANDLER_ZIP: &str = "deployment_handler.zip";

/// a shell script made of ordered steps, each a list of commands.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployScript {
    steps: Vec<(&'static str, Vec<String>)>,
}

impl Default for DeployScript {
    fn default() -> Self {
        Self {
            steps: [STEP_PRE_BUILD, STEP_BUILD, STEP_PACKAGE, STEP_DEPLOY]
                .into_iter()
                .map(|s| (s, vec![]))
                .collect(),
        }
    }
}

impl DeployScript {
    pub fn append(&mut self, step: &'static str, command: String) {
        match self.steps.iter_mut().find(|(s, _)| *s == step) {
            Some((_, commands)) => commands.push(command),
            None => self.steps.push((step, vec![command])),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("#!/usr/bin/env bash\n\nset -e\n");
        for (step, commands) in self.steps.iter() {
            out.push('\n');
            out.push_str(step);
            out.push('\n');
            for command in commands {
                out.push_str(command);
                out.push('\n');
            }
        }
        out
    }
}

fn quoted(p: &Path) -> String {
    format!("'{}'", p.display().to_string().replace('\'', "'\\''"))
}

/// the script changes into its own directory first, so `template_file` and the
/// zipped bundle are relative to where the script is written. `asset_dir` should
/// be absolute since the script may be run from anywhere.
pub fn render(config: &FrontStackConfig, asset_dir: &Path, fingerprint: &str, template_file: &str) -> String {
    let region = &config.region;
    let site_key = aws_s3_deployment::site_asset_key(fingerprint);
    let mut script = DeployScript::default();

    script.append(STEP_PRE_BUILD, "assetsbucket=\"${ASSETS_BUCKET:?set ASSETS_BUCKET to a bucket that holds uploaded artifacts}\"".to_string());
    script.append(STEP_PRE_BUILD, "if [[ -n \"$DEPLOYMENT_HANDLER_ZIP\" && \"$DEPLOYMENT_HANDLER_ZIP\" != /* ]]; then DEPLOYMENT_HANDLER_ZIP=\"$(pwd)/$DEPLOYMENT_HANDLER_ZIP\"; fi".to_string());
    script.append(STEP_PRE_BUILD, "cd \"$(dirname \"$0\")\"".to_string());
    script.append(STEP_PRE_BUILD, format!("handlerzip=\"${{DEPLOYMENT_HANDLER_ZIP:-{DEFAULT_HANDLER_ZIP}}}\""));
    script.append(STEP_PRE_BUILD, "outdir=\"$(pwd)\"".to_string());
    script.append(STEP_BUILD, format!("(cd {} && zip -r -X \"$outdir/{site_key}\" .)", quoted(asset_dir)));
    script.append(STEP_PACKAGE, format!("aws s3 cp {site_key} \"s3://$assetsbucket/{site_key}\""));
    script.append(STEP_PACKAGE, format!("aws s3 cp \"$handlerzip\" \"s3://$assetsbucket/{DEFAULT_HANDLER_ZIP}\""));
    script.append(STEP_DEPLOY, format!(
        "AWS_REGION=\"{region}\" aws --region {region} cloudformation deploy --stack-name {} --template-file {template_file} --capabilities CAPABILITY_NAMED_IAM --parameter-overrides {ASSETS_BUCKET_PARAM}=\"$assetsbucket\" {SITE_ASSET_KEY_PARAM}={site_key} {HANDLER_KEY_PARAM}={DEFAULT_HANDLER_ZIP}",
        config.stack_name,
    ));
    script.render()
}

/// fingerprints the assets and writes `deploy.sh` into `out_dir`, next to `template_file`.
pub fn write(config: &FrontStackConfig, out_dir: &Path, template_file: &str) -> Result<PathBuf, CfnError> {
    let asset_dir = std::fs::canonicalize(&config.asset_dir)?;
    let fingerprint = aws_s3_deployment::fingerprint_dir(&asset_dir)?;
    tracing::info!(%fingerprint, asset_dir = %asset_dir.display(), "fingerprinted assets");
    let script = render(config, &asset_dir, &fingerprint, template_file);
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(DEPLOY_FILE);
    std::fs::write(&path, script)?;
    tracing::info!(path = %path.display(), "wrote deploy script");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_render_in_order() {
        let mut script = DeployScript::default();
        script.append(STEP_DEPLOY, "echo deploy".into());
        script.append(STEP_BUILD, "echo build".into());
        let out = script.render();
        assert!(out.starts_with("#!/usr/bin/env bash\n"));
        let build = out.find("echo build").unwrap();
        let deploy = out.find("echo deploy").unwrap();
        assert!(build < deploy);
        assert!(out.find(STEP_PACKAGE).unwrap() < deploy);
    }

    #[test]
    fn deploy_passes_every_parameter() {
        let config = FrontStackConfig::default();
        let out = render(&config, Path::new("/srv/front/dist"), "0123abcd", "FrontStack.template.json");
        let deploy_line = out.lines().find(|l| l.contains("cloudformation deploy")).unwrap();
        assert!(deploy_line.contains("--stack-name FrontStack"));
        assert!(deploy_line.contains("--template-file FrontStack.template.json"));
        assert!(deploy_line.contains("AssetsBucketName=\"$assetsbucket\""));
        assert!(deploy_line.contains("SiteAssetObjectKey=site_0123abcd.zip"));
        assert!(deploy_line.contains("DeploymentHandlerObjectKey=deployment_handler.zip"));
        assert!(out.contains("(cd '/srv/front/dist' && zip -r -X \"$outdir/site_0123abcd.zip\" .)"));
    }

    #[test]
    fn asset_dir_is_shell_quoted() {
        assert_eq!(quoted(Path::new("it's here")), "'it'\\''s here'");
    }

    #[test]
    fn script_runs_from_its_own_directory() {
        let out = render(&FrontStackConfig::default(), Path::new("/srv/dist"), "0123abcd", "FrontStack.template.json");
        let cd = out.find("cd \"$(dirname \"$0\")\"").unwrap();
        assert!(cd < out.find("outdir=").unwrap());
        assert!(cd < out.find("handlerzip=").unwrap());
        // a caller relative handler zip is made absolute before changing directory
        assert!(out.find("DEPLOYMENT_HANDLER_ZIP=\"$(pwd)/").unwrap() < cd);
    }

    #[test]
    fn asset_dir_is_absolute_when_out_dir_differs() {
        let root = std::env::temp_dir().join(format!("infla_deploy_script_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let site = root.join("site");
        std::fs::create_dir_all(&site).unwrap();
        std::fs::write(site.join("index.html"), "<html></html>").unwrap();
        let out_dir = root.join("build");

        // relative to the package root, which is the working directory of tests
        let config = FrontStackConfig { asset_dir: PathBuf::from("src"), ..Default::default() };
        let path = write(&config, &out_dir, "FrontStack.template.json").unwrap();
        assert_eq!(path, out_dir.join(DEPLOY_FILE));
        let script = std::fs::read_to_string(&path).unwrap();
        let src = std::fs::canonicalize("src").unwrap();
        assert!(src.is_absolute());
        assert!(script.contains(&format!("(cd {} && zip", quoted(&src))));
        assert!(!script.contains("(cd 'src'"));
        assert!(script.contains("--template-file FrontStack.template.json"));

        let config = FrontStackConfig { asset_dir: site.clone(), ..Default::default() };
        let script = std::fs::read_to_string(write(&config, &out_dir, "FrontStack.template.json").unwrap()).unwrap();
        let site = std::fs::canonicalize(&site).unwrap();
        assert!(script.contains(&format!("(cd {} && zip", quoted(&site))));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn missing_asset_dir_is_an_error() {
        let config = FrontStackConfig { asset_dir: PathBuf::from("/definitely/not/assets"), ..Default::default() };
        let out_dir = std::env::temp_dir().join(format!("infla_deploy_script_missing_{}", std::process::id()));
        assert!(matches!(write(&config, &out_dir, "t.json"), Err(CfnError::Io(_))));
    }
}
