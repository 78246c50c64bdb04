//! CLI command implementations
//!
//! `run` follows a fixed startup order: load and validate config, build
//! the logger, resolve the transform, open the store, then drive the
//! batch. Anything that fails before the first page is fetched leaves the
//! store untouched.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::{
    CancellationFlag, MutationEngine, OperationMode, RunOptions, StrandedDocument,
};
use crate::observability::{Event, Logger, Severity};
use crate::store::DirectoryStore;
use crate::transform::{TransformError, TransformRegistry};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_json_file, write_response};

/// Exit status after a second Ctrl-C (128 + SIGINT)
const INTERRUPT_EXIT_CODE: i32 = 130;

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of the document store (required)
    pub store_path: String,

    /// Collection to page through (required)
    pub input_collection: String,

    /// Collection to write into (optional, defaults to the input collection)
    #[serde(default)]
    pub output_collection: Option<String>,

    /// Suppress every mutation (optional, default true)
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,

    /// Documents per page (optional, default 20)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Documents processed concurrently within a page (optional, default 1)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// "edit_documents" or "delete_documents" (optional, default edit)
    #[serde(default = "default_operation")]
    pub operation: String,

    /// Registered transform name (required)
    pub transform: String,

    /// Options handed to the transform factory
    #[serde(default)]
    pub transform_options: Value,

    /// Log one line per document (optional, default false)
    #[serde(default)]
    pub verbose: bool,

    /// Where to write documents lost mid-relocation (optional)
    #[serde(default)]
    pub stranded_output: Option<String>,
}

fn default_dry_run() -> bool {
    true
}
fn default_page_size() -> usize {
    20
}
fn default_max_concurrency() -> usize {
    1
}
fn default_operation() -> String {
    OperationMode::EditDocuments.as_str().to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    /// Parse and validate configuration JSON
    pub fn parse(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.store_path.trim().is_empty() {
            return Err(CliError::config_error("store_path must not be empty"));
        }

        if self.input_collection.trim().is_empty() {
            return Err(CliError::config_error("input_collection must not be empty"));
        }

        if self.page_size == 0 {
            return Err(CliError::config_error("page_size must be > 0"));
        }

        if self.max_concurrency == 0 {
            return Err(CliError::config_error("max_concurrency must be > 0"));
        }

        self.operation_mode()?;

        if !TransformRegistry::builtin().contains(&self.transform) {
            return Err(TransformError::UnknownTransform(self.transform.clone()).into());
        }

        if !(self.transform_options.is_null() || self.transform_options.is_object()) {
            return Err(CliError::config_error(
                "transform_options must be a JSON object",
            ));
        }

        Ok(())
    }

    /// Parsed operation mode
    pub fn operation_mode(&self) -> CliResult<OperationMode> {
        Ok(self.operation.parse::<OperationMode>()?)
    }

    /// Engine options, with an optional command-line dry-run override
    pub fn to_run_options(&self, dry_run_override: Option<bool>) -> CliResult<RunOptions> {
        let mut options = RunOptions::new(self.input_collection.clone());
        if let Some(output) = &self.output_collection {
            options.output_collection = output.clone();
        }
        options.dry_run = dry_run_override.unwrap_or(self.dry_run);
        options.page_size = self.page_size;
        options.max_concurrency = self.max_concurrency;
        options.mode = self.operation_mode()?;
        options.validate()?;
        Ok(options)
    }

    fn logger(&self) -> Logger {
        if self.verbose {
            Logger::stdio(Severity::Trace)
        } else {
            Logger::stdio(Severity::Info)
        }
    }
}

/// Entry point used by `main`
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let dry_run_override = cmd.dry_run_override();
    match cmd {
        Command::Run { config, .. } => run_batch(&config, dry_run_override),
        Command::Transforms => transforms(),
    }
}

/// Run one batch
pub fn run_batch(config_path: &Path, dry_run_override: Option<bool>) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let options = config.to_run_options(dry_run_override)?;
    let logger = config.logger();

    let transform = TransformRegistry::builtin()
        .create(&config.transform, &config.transform_options)?;

    let store_root = Path::new(&config.store_path);
    if !store_root.is_dir() {
        return Err(CliError::config_error(format!(
            "store_path {} is not a directory",
            store_root.display()
        )));
    }

    logger.info(
        Event::ConfigLoaded,
        &[
            ("config", &config_path.display().to_string()),
            ("store_path", &config.store_path),
            ("transform", &config.transform),
            ("mode", options.mode.as_str()),
            ("dry_run", if options.dry_run { "true" } else { "false" }),
        ],
    );

    let store = Arc::new(DirectoryStore::open(store_root));
    let cancellation = CancellationFlag::new();
    let engine = MutationEngine::new(store, transform, options, logger.clone())?
        .with_cancellation(cancellation.clone());

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime_error(format!("Failed to create tokio runtime: {}", e)))?;

    let interrupt_logger = logger.clone();
    let result = runtime.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            cancellation.cancel();
            interrupt_logger.warn(
                Event::InterruptReceived,
                &[("action", "finishing current page")],
            );
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt_logger.error(Event::InterruptReceived, &[("action", "exit")]);
                std::process::exit(INTERRUPT_EXIT_CODE);
            }
        });
        engine.run().await
    });

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            write_stranded(&config, &logger, e.stranded())?;
            return Err(e.into());
        }
    };

    write_stranded(&config, &logger, &summary.stranded)?;
    write_response(serde_json::to_value(&summary)?)
}

/// Persist documents lost mid-relocation, when an output path is configured
fn write_stranded(config: &Config, logger: &Logger, stranded: &[StrandedDocument]) -> CliResult<()> {
    let Some(path) = &config.stranded_output else {
        return Ok(());
    };
    if stranded.is_empty() {
        return Ok(());
    }

    write_json_file(Path::new(path), &stranded)?;
    logger.warn(
        Event::StrandedWritten,
        &[("path", path), ("documents", &stranded.len().to_string())],
    );
    Ok(())
}

/// List registered transforms
pub fn transforms() -> CliResult<()> {
    let registry = TransformRegistry::builtin();
    write_response(json!({ "transforms": registry.names() }))
}
