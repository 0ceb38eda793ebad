// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use modlingo::app_config::{self, Config};
use modlingo::database::DatabaseConnection;
use modlingo::deletion::{DeletionOptions, DeletionService, TriggerRegistry};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Delete a project and everything scoped to it
    DeleteProject {
        /// Project id
        #[arg(value_name = "PROJECT_ID")]
        project_id: String,
    },

    /// Delete one target language of a project
    #[command(alias = "delete-project-language")]
    DeleteLanguage {
        /// Project language id
        #[arg(value_name = "PROJECT_LANGUAGE_ID")]
        project_language_id: String,
    },

    /// Show row counts of the store
    Stats,

    /// Recreate maintenance triggers missing after a failed deletion
    RepairTriggers,

    /// Generate shell completions for modlingo
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// modlingo - bulk deletion for the mod localization store
///
/// Removes projects or project languages with all dependent rows while
/// keeping the view cache and search indexes consistent.
#[derive(Parser, Debug)]
#[command(name = "modlingo")]
#[command(version)]
#[command(about = "Bulk deletion engine for the mod localization store")]
#[command(long_about = "modlingo removes projects and project languages from the localization store,
including every dependent row, the view cache entries and the search index entries.

EXAMPLES:
    modlingo delete-project 3f2c...                # Delete a project
    modlingo delete-language 9a41...               # Delete one project language
    modlingo --batch-size 2000 delete-project 3f2c # Smaller purge batches
    modlingo stats                                 # Row counts
    modlingo repair-triggers                       # Recreate missing triggers
    modlingo completions bash > modlingo.bash      # Generate bash completions

CONFIGURATION:
    Configuration is read from conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Database file (defaults to the user data directory)
    #[arg(short, long, env = "MODLINGO_DATABASE")]
    database: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long = "config", default_value = "conf.json")]
    config_path: String,

    /// Rows per statement when purging large tables
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Color escape for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[0m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.level() <= self.level.max(log::max_level())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Load the config file, creating a default one when it is missing
fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        return Config::from_file(path);
    }

    warn!("Config file not found at '{}', creating default config.", path);
    let config = Config::default();
    config.save(path)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "modlingo", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_config(&cli.config_path)?;

    // Command line wins over the config file
    if let Some(database) = &cli.database {
        config.database.path = Some(database.clone());
    }
    if let Some(batch_size) = cli.batch_size {
        config.deletion.batch_size = batch_size;
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.into());

    let db = match &config.database.path {
        Some(path) => DatabaseConnection::new(path)?,
        None => DatabaseConnection::new_default()?,
    };

    match cli.command {
        Commands::DeleteProject { project_id } => {
            let service = DeletionService::with_options(db.clone(), DeletionOptions::from(&config.deletion));
            if let Err(e) = service.delete_project(&project_id).await {
                error!("{}", e);
                return Err(e).context(format!("Could not delete project {}", project_id));
            }
            info!("Project {} deleted", project_id);
            vacuum_if_configured(&db, &config)?;
        }
        Commands::DeleteLanguage { project_language_id } => {
            let service = DeletionService::with_options(db.clone(), DeletionOptions::from(&config.deletion));
            if let Err(e) = service.delete_project_language(&project_language_id).await {
                error!("{}", e);
                return Err(e).context(format!(
                    "Could not delete project language {}",
                    project_language_id
                ));
            }
            info!("Project language {} deleted", project_language_id);
            vacuum_if_configured(&db, &config)?;
        }
        Commands::Stats => {
            let stats = db.stats()?;
            println!("{}", stats);
            println!("Database: {}", db.path().display());
        }
        Commands::RepairTriggers => {
            let registry = TriggerRegistry::new();
            let repaired = db.execute(|conn| registry.repair(conn))?;
            if repaired.is_empty() {
                info!("All {} triggers are present", registry.definitions().len());
            } else {
                info!("Recreated {} triggers: {}", repaired.len(), repaired.join(", "));
            }
        }
        // Handled before the database is opened
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn vacuum_if_configured(db: &DatabaseConnection, config: &Config) -> Result<()> {
    if config.database.vacuum_after_delete {
        info!("Vacuuming database");
        db.vacuum()?;
    }
    Ok(())
}
