use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

mod archive;
mod engine;
mod env;
mod error;
mod hasher;
mod manifest;
mod networking;
mod process;
mod progress;
mod storage;
mod util;

use engine::{ReconcileSummary, ReconciliationEngine};
use error::UpdateResult;
use networking::NetworkClient;
use process::HandOff;
use progress::{ConsoleProgress, ProgressObserver};
use storage::StorageManager;

#[derive(Parser, Debug)]
#[command(
    name = "Palia Launcher",
    author,
    version,
    about = "Keeps a local Palia installation in sync with the published patch manifest"
)]
struct Cli {
    /// Game installation directory.
    #[arg(long, env = "INSTALLATION_PATH", default_value_os_t = env::default_installation_dir())]
    installation_path: PathBuf,

    /// Patch manifest location.
    #[arg(long, env = "PATCH_MANIFEST_URL", default_value = env::DEFAULT_MANIFEST_URL)]
    manifest_url: String,

    /// Previously downloaded baseline archive to install instead of downloading it.
    #[arg(long, env = "LOCAL_ZIP_FILE")]
    local_zip: Option<PathBuf>,

    /// Do not start the game after updating.
    #[arg(long)]
    no_launch: bool,

    /// Exit immediately on failure instead of waiting for Enter.
    #[arg(long)]
    no_pause: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    println!("Starting Palia Launcher {}", env!("CARGO_PKG_VERSION"));
    println!("Installation Path: {}", cli.installation_path.display());
    println!("Patch Manifest Url: {}", cli.manifest_url);
    if let Some(local_zip) = &cli.local_zip {
        println!("Local Zip File: {}", local_zip.display());
    }

    let console = Arc::new(ConsoleProgress::new());
    let result = update(&cli, console.clone()).await;
    console.finish();

    let result = result.and_then(|summary| {
        println!(
            "Palia {} is up to date ({} downloaded, {} verified, {} skipped)",
            summary.marker.version, summary.fetches, summary.verified, summary.unsupported
        );
        let corrupted: usize = summary.extractions.iter().map(|r| r.failures.len()).sum();
        if corrupted > 0 {
            eprintln!("{corrupted} archive entries could not be extracted, see the log");
        }
        if cli.no_launch {
            return Ok(());
        }
        if process::hand_off(&cli.installation_path)? == HandOff::UnsupportedPlatform {
            println!("{}", process::UNSUPPORTED_PLATFORM_NOTICE);
        }
        Ok(())
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("launcher failed: {err:?}");
            eprintln!("Error: {err}");
            if !cli.no_pause {
                wait_for_acknowledgment();
            }
            ExitCode::FAILURE
        }
    }
}

async fn update(cli: &Cli, progress: Arc<dyn ProgressObserver>) -> UpdateResult<ReconcileSummary> {
    let storage = StorageManager::new(&cli.installation_path);
    let marker = storage.read_installed_version().await?;
    info!("launcher: installed version {}", marker.version);

    let client = NetworkClient::new();
    let raw = client.fetch_manifest(&cli.manifest_url).await?;
    let mut manifest = manifest::parse(&raw)?;
    if let Some(local_zip) = &cli.local_zip {
        manifest.set_archive_override(local_zip);
    }

    let mut engine =
        ReconciliationEngine::new(&cli.installation_path, Arc::new(client), storage, progress);
    let summary = engine.reconcile(&manifest, marker).await?;
    if engine.state.is_up_to_date() {
        info!("launcher: reconciliation finished at {}", summary.marker.version);
    }
    Ok(summary)
}

fn wait_for_acknowledgment() {
    eprintln!("Press Enter to exit");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}
