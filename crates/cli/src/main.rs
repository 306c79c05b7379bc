mod config;
mod logging;

use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use gemini_adapter::GeminiGenerator;
use insight_core::ports::{AnswerGenerator, RecordRepository};
use insight_core::session::ChatSession;
use insight_core::utils::preview;
use insight_core::{Answer, InsightError, InsightService};
use sheets_adapter::{CommandToken, SheetsConfig, SheetsRecordRepository, StaticToken, TokenSource};
use sqlite_adapter::SqliteRecordRepository;
use tracing::info;

use crate::config::{AppConfig, Backend, ConfigError};

/// Stores LLM video analyses and answers questions about them
#[derive(Parser, Debug)]
#[command(name = "insight")]
#[command(about = "Stores YouTube video analyses and answers questions using the stored insights")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Save one analysis JSON object as a new row
    Ingest {
        /// Read the JSON from this file instead of stdin
        #[arg(short = 'f', long = "file")]
        file: Option<PathBuf>,
    },
    /// Ask a single question against the stored analyses
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive question loop; `/quit` or EOF ends it
    Chat,
    /// Print how many analyses are stored
    Count,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match AppConfig::load(cli.config.as_deref()).and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    // Instantiate concrete implementations of secondary adapters
    let service = match build_service(&config) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Startup error: {}", e);
            return ExitCode::from(2);
        }
    };
    info!(backend = ?config.store.backend, model = %config.model.name, "service ready");

    let outcome = match cli.command {
        Commands::Ingest { file } => run_ingest(&service, file),
        Commands::Ask { question } => run_ask(&service, &question.join(" ")),
        Commands::Chat => run_chat(&service),
        Commands::Count => run_count(&service),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Adapter(#[from] InsightError),
}

fn build_service(config: &AppConfig) -> Result<InsightService, StartupError> {
    let record_repository: Box<dyn RecordRepository> = match config.store.backend {
        Backend::Sqlite => Box::new(SqliteRecordRepository::new(config.store.sqlite_path.clone())),
        Backend::Sheets => Box::new(build_sheets(config)?),
    };

    let api_key = config
        .model
        .api_key
        .clone()
        .ok_or_else(|| ConfigError::MissingCredential("model API key".to_string()))?;
    let answer_generator: Box<dyn AnswerGenerator> = Box::new(GeminiGenerator::new(
        config.model.base_url.clone(),
        config.model.name.clone(),
        api_key,
        Duration::from_secs(config.model.timeout_secs),
    )?);

    // Instantiate the core business service with dependency injection
    Ok(InsightService::new(record_repository, answer_generator).with_top_k(config.retrieval.top_k))
}

fn build_sheets(config: &AppConfig) -> Result<SheetsRecordRepository, StartupError> {
    let store = &config.store;
    let spreadsheet_id = store
        .spreadsheet_id
        .clone()
        .ok_or_else(|| ConfigError::MissingCredential("store.spreadsheet_id".to_string()))?;

    let token_source: Box<dyn TokenSource> = match (&store.access_token, &store.access_token_command) {
        (Some(token), _) => Box::new(StaticToken(token.clone())),
        (None, Some(command)) => Box::new(CommandToken::new(command.clone())),
        (None, None) => {
            return Err(ConfigError::MissingCredential("sheets access token".to_string()).into())
        }
    };

    let mut sheets = SheetsConfig::new(spreadsheet_id, store.sheet_name.clone());
    sheets.base_url = store.base_url.clone();
    sheets.timeout = Duration::from_secs(store.timeout_secs);
    if let Some(headers) = &store.headers {
        sheets.headers = headers.clone();
    }

    Ok(SheetsRecordRepository::new(sheets, token_source)?)
}

/// Failure of a user-facing command
#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error("failed to read {origin}: {error}")]
    ReadInput {
        origin: String,
        #[source]
        error: io::Error,
    },
    #[error("terminal I/O failed: {0}")]
    Terminal(#[source] io::Error),
    #[error(transparent)]
    Insight(#[from] InsightError),
}

fn run_ingest(service: &InsightService, file: Option<PathBuf>) -> Result<(), CommandError> {
    let input = match file {
        Some(path) => fs::read_to_string(&path).map_err(|error| CommandError::ReadInput {
            origin: path.display().to_string(),
            error,
        })?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|error| CommandError::ReadInput {
                    origin: "stdin".to_string(),
                    error,
                })?;
            buf
        }
    };

    if input.trim().is_empty() {
        return Err(InsightError::MalformedInput("no JSON provided".to_string()).into());
    }

    let record = service.submit_analysis(&input)?;
    println!("Saved analysis: {}", record.title);
    Ok(())
}

fn run_ask(service: &InsightService, question: &str) -> Result<(), CommandError> {
    match service.ask(question)? {
        Answer::NotFound => println!("{}", insight_core::session::NOT_FOUND_REPLY),
        Answer::Generated { text, sources } => {
            println!("{}", text.trim_end());
            println!();
            println!("Sources:");
            for source in &sources {
                println!(
                    "- {} ({}) {}",
                    preview(&source.title, 60),
                    source.channel_name,
                    source.url
                );
            }
        }
    }
    Ok(())
}

fn run_chat(service: &InsightService) -> Result<(), CommandError> {
    chat_loop(service, io::stdin().lock(), io::stdout())
}

fn chat_loop<R: BufRead, W: Write>(
    service: &InsightService,
    mut input: R,
    mut output: W,
) -> Result<(), CommandError> {
    let count = service.record_count()?;
    writeln!(output, "{} analyses available.", count).map_err(CommandError::Terminal)?;

    let mut session = ChatSession::new();
    if let Some(greeting) = session.messages().first() {
        writeln!(output, "{}", greeting.content).map_err(CommandError::Terminal)?;
    }

    loop {
        write!(output, "> ")
            .and_then(|_| output.flush())
            .map_err(CommandError::Terminal)?;

        let mut line = String::new();
        let read = input.read_line(&mut line).map_err(CommandError::Terminal)?;
        if read == 0 {
            writeln!(output).map_err(CommandError::Terminal)?;
            break;
        }

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "/quit" {
            break;
        }

        let reply = session.handle(service, question);
        writeln!(output, "{}", reply).map_err(CommandError::Terminal)?;
    }
    Ok(())
}

fn run_count(service: &InsightService) -> Result<(), CommandError> {
    println!("{}", service.record_count()?);
    Ok(())
}
