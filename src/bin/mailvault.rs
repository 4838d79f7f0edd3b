#![allow(clippy::print_stdout)]

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use mailvault::config::{default_env_path, MailboxConfig};
use mailvault::mailbox::{
    FetchStatus, LocalEmailEntry, LocalEmailStatus, MailboxStore, MailboxStoreBuilder,
};
use mailvault::plugins::aws_v2::kms::AwsKmsBuilder;
use mailvault::plugins::aws_v2::s3::S3ObjectStoreBuilder;

#[derive(Parser)]
#[command(
    name = "mailvault",
    version,
    about = "Fetch envelope-encrypted mail from S3 and keep it encrypted on local disk"
)]
struct Cli {
    /// Dotenv file with MAILVAULT_* settings (default ~/.mailvault/.env)
    #[arg(short, long, global = true, env = "MAILVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// More log output; repeat for trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List remote mail objects, newest first
    List,

    /// Fetch one object into the local mailbox
    Fetch {
        /// Object key
        key: String,
    },

    /// Fetch every remote object not yet stored locally
    FetchAll {
        /// Objects fetched at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Show remote objects that have no local copy
    Check,

    /// List local mail
    Local,

    /// Search local mail by sender and subject
    Search {
        /// Text the sender must contain
        #[arg(long)]
        from: Option<String>,
        /// Text the subject must contain
        #[arg(long)]
        subject: Option<String>,
    },

    /// Print a local message
    Read {
        /// Object key
        key: String,
    },

    /// Show the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".repeat(16))
}

fn print_entry(entry: &LocalEmailEntry) {
    match &entry.status {
        LocalEmailStatus::Readable(summary) => println!(
            "{}  {:<40}  {:<30}  {}{}",
            format_date(summary.date),
            entry.object_key.as_deref().unwrap_or(&entry.name),
            summary.from.as_deref().unwrap_or(""),
            summary.subject.as_deref().unwrap_or(""),
            if summary.has_attachments { "  [+]" } else { "" }
        ),
        LocalEmailStatus::Unreadable(reason) => println!(
            "{}  {:<40}  unreadable: {}",
            format_date(None),
            entry.object_key.as_deref().unwrap_or(&entry.name),
            reason
        ),
    }
}

async fn build_store(config: MailboxConfig) -> Result<MailboxStore> {
    let mut kms = AwsKmsBuilder::new();
    let mut s3 = S3ObjectStoreBuilder::new(config.bucket.clone());
    if let Some(region) = &config.region {
        kms = kms.with_region(region.clone());
        s3 = s3.with_region(region.clone());
    }
    if let Some(endpoint) = &config.endpoint {
        kms = kms.with_endpoint(endpoint.clone());
        s3 = s3.with_endpoint(endpoint.clone());
    }

    let kms = kms.build().await.context("unable to create KMS client")?;
    let s3 = s3.build().await.context("unable to create S3 client")?;

    MailboxStoreBuilder::new()
        .with_config(config)
        .with_object_store(Arc::new(s3))
        .with_kms(Arc::new(kms))
        .build()
        .context("invalid mailbox configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config_path = match cli.config.or_else(default_env_path) {
        Some(path) => path,
        None => bail!("no home directory found; pass --config"),
    };
    let config = MailboxConfig::load(&config_path)
        .with_context(|| format!("unable to load configuration from {}", config_path.display()))?;

    match cli.command {
        Commands::Config { save } => {
            println!("{:#?}", config);
            if save {
                config.write_env_file(&config_path)?;
                println!("Saved to {}", config_path.display());
            }
        }
        Commands::List => {
            let store = build_store(config).await?;
            for object in store.list_remote_objects().await? {
                println!("{}  {}", format_date(object.last_modified), object.key);
            }
        }
        Commands::Fetch { key } => {
            let store = build_store(config).await?;
            let outcome = store
                .fetch_and_persist(&key)
                .await
                .with_context(|| format!("unable to fetch {}", key))?;
            match outcome.status {
                FetchStatus::Persisted => println!("Saved {}", outcome.path.display()),
                FetchStatus::AlreadyPresent => {
                    println!("Already present: {}", outcome.path.display())
                }
            }
        }
        Commands::FetchAll { concurrency } => {
            let config = match concurrency {
                Some(n) => config.with_fetch_concurrency(n),
                None => config,
            };
            let store = build_store(config).await?;
            let report = store.fetch_all().await?;

            println!(
                "{} fetched, {} already present, {} failed",
                report.persisted(),
                report.fetched.len() - report.persisted(),
                report.failed.len()
            );
            for failed in &report.failed {
                println!("  {}: {}", failed.key, failed.error);
            }
            if !report.failed.is_empty() {
                bail!("{} objects could not be fetched", report.failed.len());
            }
        }
        Commands::Check => {
            let store = build_store(config).await?;
            let new = store.check_new().await?;
            if new.is_empty() {
                println!("No new mail");
            }
            for object in new {
                println!("{}  {}", format_date(object.last_modified), object.key);
            }
        }
        Commands::Local => {
            let store = build_store(config).await?;
            for entry in store.list_local().await? {
                print_entry(&entry);
            }
        }
        Commands::Search { from, subject } => {
            let store = build_store(config).await?;
            let found = store
                .search_local(from.as_deref(), subject.as_deref())
                .await?;
            if found.is_empty() {
                println!("No matching mail");
            }
            for entry in &found {
                print_entry(entry);
            }
        }
        Commands::Read { key } => {
            let store = build_store(config).await?;
            let email = store
                .read_local(&key)
                .await
                .with_context(|| format!("unable to read {}", key))?;
            println!("{}", email.content);
        }
    }

    Ok(())
}
