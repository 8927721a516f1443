//! Command-line entry point for the memory bank walkthrough.

use anyhow::Context;
use clap::Parser;
use log::{debug, info};
use membank_rs_config::{LayeredConfigOptions, MembankConfig};
use membank_rs_demos::{Demo, Narrator, Step};
use std::path::PathBuf;

/// Command-line options for the walkthrough.
#[derive(Parser)]
#[command(name = "membank-demo", version)]
struct Cli {
    /// Optional path to a membank.json5 config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run against an in-process bank instead of the service
    #[arg(long)]
    offline: bool,
    /// Override the user id used as the memory scope
    #[arg(long)]
    user: Option<String>,
    #[command(subcommand)]
    step: Step,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();

    match dotenvy::dotenv() {
        Ok(path) => debug!("loaded environment file (path={})", path.display()),
        Err(err) if err.not_found() => debug!("no .env file found"),
        Err(err) => return Err(err).context("failed to load .env"),
    }

    let cli = Cli::parse();
    info!(
        "starting walkthrough (step={:?}, config_set={}, offline={})",
        cli.step,
        cli.config.is_some(),
        cli.offline
    );

    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    if let Some(path) = cli.config.as_ref() {
        info!("loading config from path: {}", path.display());
        options = options.with_runtime_path(path);
    }
    let layered =
        MembankConfig::load_layered_with_options(options).context("failed to load config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    let mut config = layered.config;
    if let Some(user) = cli.user {
        config.demo.user_id = user;
    }

    let mut demo = if cli.offline {
        Demo::offline(&config, Narrator::stdout())
    } else {
        Demo::online(&config, Narrator::stdout())?
    };
    membank_rs_demos::run(&mut demo, cli.step).await
}
