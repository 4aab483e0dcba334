use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use triage::config::TriageConfig;
use triage::seed;
use triage::server;
use triage::store::MemoryBackend;

#[derive(Parser)]
#[command(name = "triage")]
#[command(version, about = "Issue panel service for a code-quality product")]
pub struct Cli {
    /// Path to the config file
    #[arg(long, default_value = "triage.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the issue panel server
    Serve {
        /// Port to listen on (overrides config file and TRIAGE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind (overrides config file and TRIAGE_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Bind on all interfaces and allow cross-origin requests
        #[arg(long)]
        dev: bool,
        /// Load the demo fixture on startup
        #[arg(long)]
        seed: bool,
    },
    /// Print the keys of the demo fixture without starting a server
    SeedDemo,
}

#[tokio::main]
async fn main() -> Result<()> {
    server::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            dev,
            seed,
        } => {
            let config = TriageConfig::load(&cli.config)?.resolve(port, host, dev, seed);
            server::start_server(config).await?;
        }
        Commands::SeedDemo => {
            let backend = MemoryBackend::new();
            for key in seed::load_demo(&backend) {
                println!("{}", key);
            }
        }
    }

    Ok(())
}
