use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter (e.g., "debug", "info", "warn", "error")
    pub level: String,
    /// Optional log file path. If None, logs only to stderr
    pub file_path: Option<PathBuf>,
    /// Whether to use structured JSON format for logs
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Create LogConfig from environment variables
    ///
    /// - `RUST_LOG`: level filter
    /// - `PHPIDX_LOG_FILE`: log to this file instead of stderr
    /// - `PHPIDX_LOG_UNIQUE=true`: suffix the log file name with the process id
    /// - `PHPIDX_LOG_JSON=true`: emit JSON lines
    pub fn from_env() -> Self {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let unique = env::var("PHPIDX_LOG_UNIQUE").unwrap_or_default() == "true";
        let file_path = env::var("PHPIDX_LOG_FILE").ok().map(|path| {
            let path = PathBuf::from(path);
            if unique {
                with_process_suffix(path, std::process::id())
            } else {
                path
            }
        });

        let json_format = env::var("PHPIDX_LOG_JSON").unwrap_or_default() == "true";

        Self {
            level,
            file_path,
            json_format,
        }
    }

    /// Override values from CLI arguments
    pub fn with_overrides(mut self, level: Option<String>, file_path: Option<PathBuf>) -> Self {
        if let Some(level) = level {
            self.level = level;
        }
        if let Some(file_path) = file_path {
            self.file_path = Some(file_path);
        }
        self
    }
}

/// `indexer.log` -> `indexer.<pid>.log`
fn with_process_suffix(mut path: PathBuf, pid: u32) -> PathBuf {
    let Some(stem) = path.file_stem().map(|stem| stem.to_string_lossy().to_string()) else {
        return path;
    };

    let unique = match path.extension().and_then(|ext| ext.to_str()) {
        Some(extension) if !extension.is_empty() => format!("{}.{}.{}", stem, pid, extension),
        _ => format!("{}.{}", stem, pid),
    };
    path.set_file_name(unique);
    path
}

/// Initialize the logging system based on configuration
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_new(&config.level).or_else(|_| EnvFilter::try_new("info"))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match (&config.file_path, config.json_format) {
        (Some(file_path), true) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            let file_layer = fmt::layer().json().with_writer(file).with_ansi(false);

            subscriber.with(file_layer).init();
        }
        (Some(file_path), false) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true);

            subscriber.with(file_layer).init();
        }
        (None, true) => {
            let stderr_layer = fmt::layer().json().with_writer(io::stderr).with_ansi(false);

            subscriber.with(stderr_layer).init();
        }
        (None, false) => {
            let stderr_layer = fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true)
                .with_target(true)
                .with_line_number(true);

            subscriber.with(stderr_layer).init();
        }
    }

    Ok(())
}

/// Log the duration of an operation as a structured event
#[macro_export]
macro_rules! log_timing {
    ($level:expr, $operation:expr, $duration:expr) => {
        tracing::event!(
            $level,
            operation = $operation,
            duration_ms = $duration.as_millis() as u64,
            pid = std::process::id(),
            "Performance timing"
        );
    };
}
