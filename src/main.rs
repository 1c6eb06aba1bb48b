use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use infla::{build_front_stack, deploy_script, FrontStackConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Synthesize the static site stack into a cloudformation template")]
struct Args {
    /// toml file with stack settings. Flags below override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    stack_name: Option<String>,

    #[arg(long, global = true)]
    bucket_name: Option<String>,

    /// 12 digit account id used in the bucket policy condition
    #[arg(long, global = true)]
    account: Option<String>,

    #[arg(long, global = true)]
    region: Option<String>,

    /// directory holding the built frontend
    #[arg(long, global = true)]
    asset_dir: Option<PathBuf>,

    /// where generated files are written
    #[arg(long, global = true, default_value = ".")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// write <out-dir>/<stack>.template.json
    Synth,
    /// write the template and a deploy.sh that uploads the assets and deploys it
    DeployScript,
}

impl Args {
    fn stack_config(&self) -> Result<FrontStackConfig> {
        let mut config = match &self.config {
            Some(path) => FrontStackConfig::load(path)?,
            None => FrontStackConfig::default(),
        };
        if let Some(v) = &self.stack_name {
            config.stack_name = v.clone();
        }
        if let Some(v) = &self.bucket_name {
            config.bucket_name = v.clone();
        }
        if let Some(v) = &self.account {
            config.account = Some(v.clone());
        }
        if let Some(v) = &self.region {
            config.region = v.clone();
        }
        if let Some(v) = &self.asset_dir {
            config.asset_dir = v.clone();
        }
        Ok(config)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

fn write_template(config: &FrontStackConfig, out_dir: &Path) -> Result<String> {
    let stack = build_front_stack(config).context("building front stack")?;
    let json = stack.to_json().context("synthesizing front stack")?;
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let file_name = format!("{}.template.json", config.stack_name);
    write_file(&out_dir.join(&file_name), &json)?;
    Ok(file_name)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.stack_config()?;
    tracing::debug!(?config, "resolved config");

    match args.command {
        Command::Synth => {
            write_template(&config, &args.out_dir)?;
        }
        Command::DeployScript => {
            let template_file = write_template(&config, &args.out_dir)?;
            deploy_script::write(&config, &args.out_dir, &template_file)
                .with_context(|| format!("writing deploy script for assets in {}", config.asset_dir.display()))?;
        }
    }
    Ok(())
}
