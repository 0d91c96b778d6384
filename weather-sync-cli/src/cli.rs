use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inquire::{Password, Text};
use std::{path::PathBuf, process::ExitCode};
use weather_sync_core::{
    Config, ConfigError, ObjectStore, Pipeline, RecordWriter,
    config::{DEFAULT_REGION, parse_cities},
    provider::provider_from_settings,
    provision::{self, Provisioner, S3BucketAdmin},
    storage::S3ObjectStore,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weather-sync",
    version,
    about = "Fetch current weather for a list of cities and store it locally and in S3"
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every configured city and persist the observations.
    Run(RunArgs),

    /// Interactively write the config file.
    Configure,

    /// Create the bucket and open it for public read.
    Provision {
        /// Bucket name; defaults to the configured one.
        #[arg(long)]
        bucket: Option<String>,

        /// AWS region; defaults to the configured one.
        #[arg(long)]
        region: Option<String>,

        /// Print the steps without applying them.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Comma-separated cities, overriding CITIES.
    #[arg(long)]
    pub cities: Option<String>,

    /// Directory for the JSON files, overriding OUTPUT_DIR.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Skip the S3 upload even if a bucket is configured.
    #[arg(long)]
    pub no_upload: bool,

    /// Exit with status 2 when uploads failed but local files were written.
    #[arg(long)]
    pub fail_on_degraded: bool,
}

impl RunArgs {
    /// Flags take precedence over file and environment values.
    fn apply_to(&self, cfg: &mut Config) {
        if let Some(cities) = &self.cities {
            cfg.cities = parse_cities(cities);
        }
        if let Some(dir) = &self.output_dir {
            cfg.output_dir = Some(dir.clone());
        }
        if self.no_upload {
            cfg.bucket_name = None;
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<ExitCode> {
        match self.command {
            None => run_pipeline(load_config(self.config.as_ref())?, RunArgs::default()).await,
            Some(Command::Run(args)) => run_pipeline(load_config(self.config.as_ref())?, args).await,
            Some(Command::Configure) => {
                configure(self.config)?;
                Ok(ExitCode::SUCCESS)
            }
            Some(Command::Provision { bucket, region, dry_run }) => {
                let cfg = load_config(self.config.as_ref())?;
                provision_bucket(cfg, bucket, region, dry_run).await?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let mut cfg = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cfg.apply_process_env();
    Ok(cfg)
}

async fn run_pipeline(mut cfg: Config, args: RunArgs) -> Result<ExitCode> {
    args.apply_to(&mut cfg);
    let settings = cfg.resolve()?;

    let remote: Option<Box<dyn ObjectStore>> = match &settings.bucket_name {
        Some(bucket) => {
            Some(Box::new(S3ObjectStore::connect(&settings.region, bucket.clone()).await))
        }
        None => {
            tracing::info!("no bucket configured, remote upload disabled");
            None
        }
    };

    let pipeline = Pipeline::new(
        provider_from_settings(&settings),
        RecordWriter::new(settings.output_dir.clone(), remote),
    );

    let summary = pipeline.run(&settings.cities, |outcome| println!("{outcome}")).await;
    println!("{summary}");

    Ok(ExitCode::from(summary.exit_code(args.fail_on_degraded)))
}

fn configure(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::config_file_path()?,
    };
    let mut cfg = Config::load_from(&path)?;

    let api_key = Password::new("OpenWeather API key (empty keeps the current one):")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        cfg.api_key = Some(api_key.trim().to_string());
    }

    let current_cities = cfg.cities.join(",");
    let cities = Text::new("Cities (comma separated):")
        .with_default(&current_cities)
        .prompt()
        .context("Failed to read cities")?;
    cfg.cities = parse_cities(&cities);

    let bucket = Text::new("S3 bucket (empty disables uploads):")
        .with_default(cfg.bucket_name.as_deref().unwrap_or(""))
        .prompt()
        .context("Failed to read bucket name")?;
    cfg.bucket_name = Some(bucket.trim().to_string()).filter(|b| !b.is_empty());

    let region = Text::new("AWS region:")
        .with_default(cfg.region.as_deref().unwrap_or(DEFAULT_REGION))
        .prompt()
        .context("Failed to read region")?;
    cfg.region = Some(region.trim().to_string()).filter(|r| !r.is_empty());

    cfg.save_to(&path)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

async fn provision_bucket(
    cfg: Config,
    bucket: Option<String>,
    region: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let bucket = bucket
        .or(cfg.bucket_name)
        .filter(|b| !b.trim().is_empty())
        .ok_or(ConfigError::MissingBucket)?;
    let region = region
        .or(cfg.region)
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    if dry_run {
        println!("Provisioning plan for s3://{bucket} ({region}):");
        for line in provision::plan(&bucket) {
            println!("  {line}");
        }
        return Ok(());
    }

    let provisioner = Provisioner::new(S3BucketAdmin::connect(&region).await);
    let applied = provisioner.apply(&bucket).await?;

    println!("Provisioned s3://{bucket} ({region}): {} steps applied", applied.len());
    Ok(())
}
