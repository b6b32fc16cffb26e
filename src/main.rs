//! sqlhub - runs SQL batches against a set of databases.

use sql_query_hub::cli::{Cli, Command};
use sql_query_hub::config::Config;
use sql_query_hub::error::{HubError, Result};
use sql_query_hub::{app, logging};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    match &cli.log_file {
        Some(Some(path)) => logging::init_file_logging(path),
        Some(None) => logging::init_file_logging(&logging::get_log_path()),
        None => logging::init_stderr_logging(),
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    match cli.command {
        Command::Run(args) => {
            let report = app::run(&config, &args).await?;
            app::write_report(&report, args.output.as_deref()).await?;
        }
        Command::Split { file } => {
            for statement in app::split_file(&file).await? {
                println!("{statement}");
            }
        }
        Command::Save { content } => {
            let content = match content {
                Some(content) => content,
                None => std::io::read_to_string(std::io::stdin())
                    .map_err(|e| HubError::config(format!("Failed to read stdin: {e}")))?,
            };
            let path = app::save_query(&config.storage.queries_dir(), &content).await?;
            println!("{}", path.display());
        }
    }

    Ok(())
}
