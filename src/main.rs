use clap::Parser;
use php_index_coordinator::index::{IndexOutcome, ProcessEngineConfigBuilder, ProcessIndexEngine};
use php_index_coordinator::logging::{LogConfig, init_logging};
use php_index_coordinator::project::{DetachedHost, Project, ProjectError};
use php_index_coordinator::{ProjectManager, SettingsResolver};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};

/// CLI arguments for the PHP project indexer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project descriptor: JSON object with `title`, `rootPaths` and `settings`
    #[arg(long, value_name = "FILE")]
    project: PathBuf,

    /// Print the project settings with indexing defaults added, then exit
    #[arg(long)]
    setup: bool,

    /// Run the indexer's initialization step before the full index
    #[arg(long, conflicts_with = "file")]
    initialize: bool,

    /// Index a single file instead of the whole project
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Read the source of `--file` from stdin instead of disk
    #[arg(long, requires = "file")]
    stdin: bool,

    /// PHP interpreter (overrides PHP_BINARY env var)
    #[arg(long, value_name = "PATH")]
    php: Option<String>,

    /// Indexer entry script run by the PHP interpreter
    #[arg(long, value_name = "FILE")]
    core_script: Option<PathBuf>,

    /// Directory holding the index databases
    #[arg(long, value_name = "DIR")]
    database_dir: Option<PathBuf>,

    /// Memory limit of the indexer process in megabytes
    #[arg(long, value_name = "MB")]
    memory_limit: Option<u32>,

    /// Log level (overrides RUST_LOG env var)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log file path (overrides PHPIDX_LOG_FILE env var)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

/// Resolve the PHP interpreter from CLI args and environment
fn resolve_php_binary(php_arg: Option<String>) -> Option<String> {
    // Priority: CLI arg > PHP_BINARY env var > builder default
    php_arg.or_else(|| std::env::var("PHP_BINARY").ok())
}

async fn read_project(path: &Path) -> Result<Project, Box<dyn std::error::Error>> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&contents)?)
}

fn report(outcome: Option<Result<IndexOutcome, ProjectError>>) -> bool {
    match outcome {
        None => {
            warn!("Project is not active; nothing was indexed");
            false
        }
        Some(Ok(IndexOutcome::Failed(e))) => {
            error!("Indexing failed: {}", e);
            false
        }
        Some(Ok(outcome)) => {
            info!("Indexing settled: {:?}", outcome);
            true
        }
        Some(Err(e)) => {
            error!("Invalid project configuration: {}", e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_config =
        LogConfig::from_env().with_overrides(args.log_level.clone(), args.log_file.clone());

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let project = match read_project(&args.project).await {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Failed to read project {}: {}", args.project.display(), e);
            std::process::exit(1);
        }
    };

    if args.setup {
        let payload = SettingsResolver::set_up(&project)?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let mut builder = ProcessEngineConfigBuilder::new();
    if let Some(php) = resolve_php_binary(args.php) {
        builder = builder.php_binary(php);
    }
    if let Some(core_script) = args.core_script {
        builder = builder.core_script(core_script);
    }
    if let Some(database_dir) = args.database_dir {
        builder = builder.database_dir(database_dir);
    }
    if let Some(memory_limit) = args.memory_limit {
        builder = builder.memory_limit_mb(memory_limit);
    }
    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid indexer configuration: {e}");
            std::process::exit(1);
        }
    };
    info!("Using PHP interpreter: {}", config.php_binary);

    let engine = Arc::new(ProcessIndexEngine::new(config));
    let manager = ProjectManager::new(engine, Arc::new(DetachedHost));

    let project = Arc::new(project);
    manager.load(&project)?;
    if !manager.has_active_project() {
        warn!("PHP tooling is disabled for project '{}'", project.title());
        return Ok(());
    }

    let outcome = match args.file {
        Some(file) => {
            let source = if args.stdin {
                let mut source = String::new();
                tokio::io::stdin().read_to_string(&mut source).await?;
                Some(source)
            } else {
                None
            };
            manager.attempt_current_file_index(&file, source).await
        }
        None if args.initialize => manager.initialize_current_project().await,
        None => manager.attempt_current_project_index().await,
    };

    if !report(outcome) {
        std::process::exit(2);
    }
    Ok(())
}
