#[macro_use]
extern crate tracing;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use directories::ProjectDirs;
use kmspipe::drm::Card;
use kmspipe::registry::{DeviceRegistry, PipelineInfo};
use kmspipe_config::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the config file (default: `$XDG_CONFIG_HOME/kmspipe/config.kdl`).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Device node to probe instead of the configured or discovered ones. Repeatable.
    #[arg(short, long)]
    device: Vec<PathBuf>,
    /// Print pipelines as JSON.
    #[arg(long)]
    json: bool,
}

fn default_config_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "kmspipe")?;
    Some(dirs.config_dir().join("config.kdl"))
}

fn load_config(cli: &Cli) -> Config {
    let explicit = cli.config.is_some();
    let Some(path) = cli.config.clone().or_else(default_config_path) else {
        debug!("no config directory, using the default config");
        return Config::default();
    };

    if !explicit && !path.exists() {
        debug!("{path:?} doesn't exist, using the default config");
        return Config::default();
    }

    match Config::load(&path) {
        Ok(config) => config,
        Err(err) => {
            warn!("{err:?}");
            Config::default()
        }
    }
}

fn print_text(pipelines: &[PipelineInfo]) {
    if pipelines.is_empty() {
        println!("no displays");
        return;
    }

    for info in pipelines {
        let state = if info.connected {
            "connected"
        } else {
            "disconnected"
        };
        let kind = if info.internal { "internal" } else { "external" };

        print!(
            "display {}: {} ({kind}, {state}) on {}: encoder {}, CRTC {} (index {})",
            info.display,
            info.connector,
            info.device.display(),
            info.encoder_id,
            info.crtc_id,
            info.crtc_index,
        );
        match info.mode_size {
            Some((w, h)) => println!(", {w}x{h}"),
            None => println!(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "kmspipe=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = load_config(&cli);
    if !cli.device.is_empty() {
        config.drm.devices = cli.device.clone();
    }

    let registry = DeviceRegistry::<Card>::init(&config.drm)?;
    let pipelines = registry.pipelines();
    info!(
        "{} devices, {} displays",
        registry.lock().len(),
        pipelines.len()
    );

    if cli.json {
        let json = serde_json::to_string_pretty(&pipelines).context("error serializing")?;
        println!("{json}");
    } else {
        print_text(&pipelines);
    }

    Ok(())
}
