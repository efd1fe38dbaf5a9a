use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use hellafresh_cli::{init_tracing, open_database, run_server, Config};

#[derive(Parser)]
#[command(name = "hellafresh")]
#[command(about = "HellaFresh - community-reviewed slang registry")]
#[command(version)]
struct Cli {
    /// Database file (overrides HELLAFRESH_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server (default)
    Serve {
        /// Port to listen on (overrides HELLAFRESH_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Address to bind (overrides HELLAFRESH_HOST)
        #[arg(long)]
        host: Option<std::net::IpAddr>,
    },
    /// Create or upgrade the database schema and exit
    Migrate,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = handle_command(cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn handle_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        host: None,
    }) {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            run_server(config).await
        }
        Commands::Migrate => {
            let pool = open_database(&config).await?;
            pool.close().await;
            info!("Database ready at {}", config.database_path.display());
            Ok(())
        }
    }
}
