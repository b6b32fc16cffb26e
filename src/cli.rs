//! Command-line argument parsing for sqlhub.

use crate::config::{ConnectionConfig, DbConfigSet};
use crate::error::{HubError, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Runs SQL batches against every database of one engine family.
#[derive(Parser, Debug)]
#[command(name = "sqlhub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write logs to a file instead of stderr (default location if no PATH)
    #[arg(long, global = true, value_name = "PATH", num_args = 0..=1)]
    pub log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute statements on every configured database
    Run(RunArgs),

    /// Print the statements a SQL file splits into
    Split {
        /// SQL file to split
        #[arg(value_name = "PATH")]
        file: PathBuf,
    },

    /// Save SQL text to the queries directory
    Save {
        /// SQL text to save (read from stdin when omitted)
        #[arg(long, value_name = "SQL")]
        content: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// SQL file to split into statements
    #[arg(short = 'f', long, value_name = "PATH", conflicts_with_all = ["queries", "request"])]
    pub file: Option<PathBuf>,

    /// Statement to execute as written (repeatable)
    #[arg(short = 'q', long = "query", value_name = "SQL", conflicts_with = "request")]
    pub queries: Vec<String>,

    /// JSON run request with dbConfig and queries or sql
    #[arg(short = 'r', long, value_name = "PATH")]
    pub request: Option<PathBuf>,

    /// Database as NAME=URL, e.g. local=mysql://root@localhost/app (repeatable)
    #[arg(
        short = 'c',
        long = "connection",
        value_name = "NAME=URL",
        conflicts_with = "request"
    )]
    pub connections: Vec<String>,

    /// Export non-empty result sets to spreadsheets and zip the session folder
    #[arg(short = 'e', long)]
    pub export: bool,

    /// Keep the session folder after it has been zipped
    #[arg(long)]
    pub keep_folder: bool,

    /// Use the in-memory mock database
    #[arg(long)]
    pub mock_db: bool,

    /// Write the JSON report to a file instead of stdout
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::Config::default_path)
    }
}

impl RunArgs {
    /// Builds a config set from `--connection NAME=URL` arguments.
    ///
    /// Returns `None` when no connection was given. All URLs must use the
    /// same engine.
    pub fn connection_set(&self) -> Result<Option<DbConfigSet>> {
        let mut engine = None;
        let mut configs = Vec::with_capacity(self.connections.len());

        for spec in &self.connections {
            let (name, url) = spec.split_once('=').ok_or_else(|| {
                HubError::config(format!("Invalid connection '{spec}': expected NAME=URL"))
            })?;
            let (url_engine, config) = ConnectionConfig::from_url(name.trim(), url.trim())?;

            match engine {
                None => engine = Some(url_engine),
                Some(existing) if existing != url_engine => {
                    return Err(HubError::config(format!(
                        "Connection '{name}' is {url_engine} but earlier connections are {existing}"
                    )));
                }
                Some(_) => {}
            }
            configs.push(config);
        }

        Ok(engine.map(|engine| DbConfigSet::new(engine, configs)))
    }
}
