use std::path::PathBuf;

use clap::{Parser, Subcommand};
use recall::retrieval::RetrievalFilter;
use recall::{AppContext, Config, open_store};
use recall_cli::commands::{ChatCommand, HistoryCommand, VerifyCommand};
use recall_cli::error::CliResult;
use recall_cli::output::OutputFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Recall - A chat assistant that remembers past conversations")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'd', global = true, help = "Path to data directory")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Chat with the assistant")]
    Chat(ChatCommand),

    #[clap(about = "Browse and manage stored conversations")]
    History(HistoryCommand),

    #[clap(about = "Check that stored conversations can be read back")]
    Verify(VerifyCommand),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_logging();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,recall=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env_overrides();
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }

    match &cli.command {
        Command::Chat(cmd) => {
            let app = AppContext::from_config(config).await?;
            cmd.execute(&app, format).await
        }
        Command::History(cmd) => {
            let store = open_store(&config).await?;
            let filter = RetrievalFilter::from_config(&config.retrieval);
            cmd.execute(&store, &filter, format).await
        }
        Command::Verify(cmd) => {
            let store = open_store(&config).await?;
            cmd.execute(&store, format).await
        }
    }
}
