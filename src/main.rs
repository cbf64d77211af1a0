//! masterknx - KNX home automation device list
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use knx_app::Page;

/// masterknx - KNX home automation device list
#[derive(Parser, Debug)]
#[command(name = "masterknx")]
#[command(about = "Headless host for the KNX device list", long_about = None)]
struct Args {
    /// Directory holding .masterknx/config.toml
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Room to show (master_bedroom or lounge); overrides the config
    #[arg(long)]
    page: Option<Page>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    pmkit_core::logging::init()?;

    let args = Args::parse();
    let base_path = args
        .path
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    masterknx::run_headless(&base_path, args.page).await?;
    Ok(())
}
