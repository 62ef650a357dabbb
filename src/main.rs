//! `triage` command-line entry point
//!
//! Modes: interactive prompt (default), single request (`ask`), batch file
//! (`batch`), direct knowledge lookup (`search`) and configuration check
//! (`config`).
//!
//! Exit status: 0 on success, 1 when a single request fails or a batch file
//! cannot be read, 2 when configuration or startup fails. A batch exits 0
//! whatever its individual items did, unless a configuration error halts it.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn, Level};
use triage_dispatch::bootstrap::Dispatcher;
use triage_dispatch::config::DispatchConfig;
use triage_dispatch::knowledge::Corpus;
use triage_dispatch::llm::provider::LlmProvider;
use triage_dispatch::observability::{init_logging, LogFormat, LoggingSettings};
use triage_dispatch::output::{
    render_batch_item, render_error, render_matches, render_result, render_summary, OutputFormat,
};

const EXIT_REQUEST_FAILED: u8 = 1;
const EXIT_STARTUP_FAILED: u8 = 2;

/// Classify free-form requests and dispatch them to specialist pipelines
#[derive(Parser)]
#[command(name = "triage")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "TRIAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Stop after classification; no pipeline steps run
    #[arg(long, global = true)]
    classify_only: bool,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read requests from the terminal until quit/exit/q or Ctrl-C
    Interactive,
    /// Process a single request and exit
    Ask {
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
    },
    /// Process a newline-delimited file of requests
    Batch {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Search the knowledge corpus directly
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        #[arg(short = 'n', long, default_value_t = 3)]
        max_results: usize,
    },
    /// Validate the configuration
    Config {
        /// Print the resolved configuration
        #[arg(long)]
        show: bool,
        /// Also check that the LLM provider is reachable with the configured key
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_cli_logging(cli.verbose);

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("error [ConfigurationError]: {e}");
            return ExitCode::from(EXIT_STARTUP_FAILED);
        }
    };

    let command = cli.command.unwrap_or(Commands::Interactive);
    if let Commands::Config { show, check } = command {
        return handle_config_command(&config, show, check).await;
    }

    let corpus = match Corpus::load(&config.knowledge).await {
        Ok(corpus) => Arc::new(corpus),
        Err(e) => {
            error!("Failed to load knowledge corpus: {}", e);
            eprintln!("error [ConfigurationError]: {e}");
            return ExitCode::from(EXIT_STARTUP_FAILED);
        }
    };

    if let Commands::Search { query, max_results } = &command {
        println!(
            "{}",
            render_matches(&corpus.find(&query.join(" "), *max_results), cli.format)
        );
        return ExitCode::SUCCESS;
    }

    let provider = match LlmProviderFactory::create_provider(&config) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to create LLM provider: {}", e);
            eprintln!("error [ConfigurationError]: {e}");
            return ExitCode::from(EXIT_STARTUP_FAILED);
        }
    };

    let dispatcher = match Dispatcher::build(&config, provider, corpus) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            eprintln!("{}", render_error(&e, OutputFormat::Text));
            return ExitCode::from(EXIT_STARTUP_FAILED);
        }
    };

    let code = match command {
        Commands::Ask { request } => {
            run_single(&dispatcher, &request.join(" "), cli.classify_only, cli.format).await
        }
        Commands::Batch { file } => {
            run_batch(&dispatcher, &file, cli.classify_only, cli.format).await
        }
        _ => run_interactive(&dispatcher, cli.classify_only, cli.format).await,
    };

    if let Err(e) = dispatcher.shutdown().await {
        warn!("Error during shutdown: {}", e);
    }
    info!("Shutdown complete");
    code
}

fn init_cli_logging(verbose: u8) {
    let mut settings = LoggingSettings::from_env(Level::WARN, LogFormat::Compact);
    settings.level = match verbose {
        0 => settings.level,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    init_logging(settings);
}

fn load_configuration(path: Option<&Path>) -> Result<DispatchConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(DispatchConfig::load_from_file(path)?)
        }
        None => {
            for candidate in ["triage.toml", "config/triage.toml"] {
                let path = PathBuf::from(candidate);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(DispatchConfig::load_from_file(&path)?);
                }
            }
            Err("no configuration file found; pass -c/--config or create triage.toml".into())
        }
    }
}

async fn handle_config_command(config: &DispatchConfig, show: bool, check: bool) -> ExitCode {
    if show {
        match toml::to_string_pretty(config) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("error: could not render configuration: {e}");
                return ExitCode::from(EXIT_STARTUP_FAILED);
            }
        }
    }
    eprintln!(
        "Configuration OK: {} categories, default '{}'",
        config.categories.len(),
        config.default_category
    );

    if check {
        let provider = match LlmProviderFactory::create_provider(config) {
            Ok(provider) => provider,
            Err(e) => {
                eprintln!("error [ConfigurationError]: {e}");
                return ExitCode::from(EXIT_STARTUP_FAILED);
            }
        };
        let outcome = provider.health_check().await;
        if let Err(e) = provider.shutdown().await {
            warn!("Error during shutdown: {}", e);
        }
        match outcome {
            Ok(()) => eprintln!("Provider '{}' reachable", provider.name()),
            Err(e) => {
                error!("Provider health check failed: {}", e);
                eprintln!("error: provider '{}' unreachable: {e}", provider.name());
                return ExitCode::from(EXIT_STARTUP_FAILED);
            }
        }
    }
    ExitCode::SUCCESS
}

/// Provider factory for creating LLM providers from configuration
struct LlmProviderFactory;

impl LlmProviderFactory {
    fn create_provider(
        config: &DispatchConfig,
    ) -> Result<Arc<dyn LlmProvider>, Box<dyn std::error::Error>> {
        use triage_dispatch::llm::providers::{
            AnthropicConfig, AnthropicProvider, OpenAiConfig, OpenAiProvider,
        };

        let api_key = config.get_llm_api_key()?;
        match config.llm.provider.as_str() {
            "openai" => {
                let defaults = OpenAiConfig::default();
                let provider = OpenAiProvider::new(OpenAiConfig {
                    api_key,
                    base_url: config.llm.base_url.clone().unwrap_or(defaults.base_url),
                    timeout: config.timeout(),
                    max_retries: config.llm.max_retries,
                })?;
                Ok(Arc::new(provider))
            }
            "anthropic" => {
                let defaults = AnthropicConfig::default();
                let provider = AnthropicProvider::new(AnthropicConfig {
                    api_key,
                    base_url: config.llm.base_url.clone().unwrap_or(defaults.base_url),
                    timeout: config.timeout(),
                    version: defaults.version,
                })?;
                Ok(Arc::new(provider))
            }
            provider => Err(format!("Unsupported LLM provider: {provider}").into()),
        }
    }
}

async fn run_single(
    dispatcher: &Dispatcher,
    request: &str,
    classify_only: bool,
    format: OutputFormat,
) -> ExitCode {
    match dispatcher.process(request, classify_only).await {
        Ok(result) => {
            println!("{}", render_result(&result, format));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", render_error(&e, format));
            ExitCode::from(EXIT_REQUEST_FAILED)
        }
    }
}

async fn run_batch(
    dispatcher: &Dispatcher,
    file: &Path,
    classify_only: bool,
    format: OutputFormat,
) -> ExitCode {
    let source = match tokio::fs::read_to_string(file).await {
        Ok(source) => source,
        Err(e) => {
            error!("Cannot read batch file {}: {}", file.display(), e);
            eprintln!("error: cannot read {}: {e}", file.display());
            return ExitCode::from(EXIT_REQUEST_FAILED);
        }
    };

    let batch = dispatcher.batch(classify_only);

    // Ctrl-C stops new items from starting; in-flight items finish
    let stop = batch.stop_handle();
    let watcher = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, not starting further batch items");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let report = batch.run_source(&source).await;
    watcher.abort();

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", render_error(&e, format));
            return ExitCode::from(EXIT_STARTUP_FAILED);
        }
    };

    for item in &report.items {
        println!("{}", render_batch_item(item, format));
    }
    match format {
        OutputFormat::Json => println!("{}", render_summary(&report.summary, format)),
        OutputFormat::Text => eprintln!("{}", render_summary(&report.summary, format)),
    }
    ExitCode::SUCCESS
}

async fn run_interactive(
    dispatcher: &Dispatcher,
    classify_only: bool,
    format: OutputFormat,
) -> ExitCode {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("Enter a request (quit, exit or q to leave).");

    loop {
        eprint!("> ");

        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = signal::ctrl_c() => {
                eprintln!();
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read from terminal: {}", e);
                break;
            }
        };

        let request = line.trim();
        if request.is_empty() {
            continue;
        }
        if matches!(request.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        match dispatcher.process(request, classify_only).await {
            Ok(result) => println!("{}", render_result(&result, format)),
            Err(e) => eprintln!("{}", render_error(&e, format)),
        }
    }

    ExitCode::SUCCESS
}
