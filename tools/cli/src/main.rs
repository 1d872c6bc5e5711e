//! GraphXfer CLI - upload a file to a user's drive and download it back.
//!
//! Run with no arguments to upload `files/example.txt` for the user named in
//! `appsettings.json` and save the copy as `downloaded_example.txt`.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use graphxfer_common::Result;
use graphxfer_storage::{ClientSecretCredential, GraphClient};
use graphxfer_transfer::config::DEFAULT_CONFIG_FILE;
use graphxfer_transfer::{execute, AppConfig, TransferService, DEFAULT_FILE_NAME};

#[derive(Parser)]
#[command(name = "graphxfer")]
#[command(about = "GraphXfer - OneDrive upload/download round trip")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// File to upload, relative to the configured source directory.
    #[arg(short, long, default_value = DEFAULT_FILE_NAME)]
    file: String,

    /// Directory the downloaded copy is written to.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("An error occurred during file transfer: {}", e);
            e.exit_code()
        }
    };

    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Setup logging.
fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")
}

/// Authenticate, upload, then download. Returns the process exit code.
async fn run(cli: &Cli) -> Result<i32> {
    let settings = AppConfig::load(&cli.config)?.validate()?;

    let credential = Arc::new(ClientSecretCredential::with_authority(
        &settings.authority,
        &settings.tenant_id,
        &settings.client_id,
        settings.client_secret.clone(),
    )?);
    let client = Arc::new(GraphClient::with_base_url(
        credential,
        &settings.graph_base_url,
        settings.timeout,
    )?);

    let service = TransferService::new(client.clone(), client, settings.transfer_settings());
    let outcome = execute(&service, &cli.file, output_dir(&cli.output_dir)).await;

    if outcome.is_success() {
        info!("Run finished");
    }
    Ok(outcome.exit_code())
}

fn output_dir(dir: &Path) -> &Path {
    if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    }
}
