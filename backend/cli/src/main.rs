mod insight_cmd;
mod serve_cmd;
mod status_cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Server address used by `status` and `insight` when `--server` is not given.
const DEFAULT_SERVER: &str = "http://localhost:5000";

#[derive(Parser)]
#[command(name = "aquadash")]
#[command(about = "Aquadash: sales cockpit backend with streaming chart commentary")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Config file (defaults to $AQUADASH_CONFIG or ./aquadash.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show the health of a running server
    Status {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Stream commentary for one chart to stdout
    Insight {
        /// Chart key, e.g. risk, stagnant, industry
        #[arg(long)]
        chart: String,
        /// Chart data as JSON
        #[arg(long)]
        data: String,
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
        #[arg(long, default_value = "/api/ai-insight")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => serve_cmd::run(config, port).await,
        Commands::Status { server } => status_cmd::run(&server).await,
        Commands::Insight {
            chart,
            data,
            server,
            path,
        } => insight_cmd::run(&server, &path, chart, &data).await,
    }
}
