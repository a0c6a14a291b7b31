use clap::Parser;
use loilibre::cli::handle_ask;
use loilibre::cli::handle_config_command;
use loilibre::cli::handle_retrieve;
use loilibre::cli::handle_serve_api;
use loilibre::cli::print_error;
use loilibre::cli::Cli;
use loilibre::cli::Commands;
use loilibre::config::AppConfig;
use loilibre::logging::init_logging_with_config;
use loilibre::Result;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging_with_config(Some(&config))?;
    info!("Configuration loaded successfully");

    // Execute the requested command
    match cli.command {
        Commands::Ask {
            query,
            report_type,
            threshold,
            user_id,
        } => {
            handle_ask(&config, query, report_type, threshold, user_id).await?;
        }
        Commands::Retrieve {
            query,
            report_type,
            threshold,
            preview,
        } => {
            handle_retrieve(&config, query, report_type, threshold, preview).await?;
        }
        Commands::Serve { host, port, cors } => {
            handle_serve_api(&config, host, port, cors).await?;
        }
        Commands::Config => {
            handle_config_command(&config)?;
        }
    }

    Ok(())
}
