use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use step_tutor::{
    AppState, AskRequest, HistoryStore, HttpTransport, ResilientExecutor, SqliteHistory,
    TutorConfig, TutorService, TutoringResponse, image_data_url,
};

#[derive(Parser)]
#[command(name = "step-tutor", version)]
#[command(about = "A step-by-step tutoring service backed by a language model", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,
    /// Ask a single question and print the steps
    Ask {
        /// The question to ask
        question: Option<String>,

        /// Image file with the problem (png, jpg, gif or webp)
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Manage answered questions
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List entries, newest first
    List,
    /// Show the full answer of an entry
    Show { id: String },
    /// Remove an entry
    Remove { id: String },
    /// Remove all entries
    Clear,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive("info".parse().expect("valid log directive"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_history(config: &TutorConfig) -> Result<SqliteHistory> {
    let path = config.history.resolve_path()?;
    SqliteHistory::new(path, config.history.capacity).context("failed to open history")
}

fn print_response(response: &TutoringResponse) {
    let topic = response.topic();
    if !topic.is_empty() {
        match response.difficulty() {
            Some(difficulty) => println!("{} ({})", topic, difficulty),
            None => println!("{}", topic),
        }
    }

    for (index, step) in response.steps.iter().enumerate() {
        println!();
        if let Value::String(text) = step.as_value() {
            println!("Step {}: {}", index + 1, text);
            continue;
        }

        let number = step.step_number().unwrap_or(index as u64 + 1);
        println!(
            "Step {}: {}",
            number,
            step.thinking_prompt().unwrap_or_default()
        );
        if let Some(answer) = step.answer() {
            println!("  Answer: {}", answer);
        }
        if let Some(explanation) = step.explanation() {
            println!("  Why: {}", explanation);
        }
    }

    let final_answer = response.final_answer();
    if !final_answer.is_empty() {
        println!();
        println!("Final answer: {}", final_answer);
    }
}

async fn ask(config: &TutorConfig, request: AskRequest) -> Result<()> {
    let transport =
        HttpTransport::from_env(&config.upstream.endpoint, &config.upstream.api_key_env)
            .context("failed to create upstream transport")?;
    let executor = ResilientExecutor::new(Arc::new(transport), config.retry);
    let service = TutorService::new(executor, config.upstream.clone());

    match service.ask(&request).await {
        Ok(response) => {
            print_response(&response);

            let recorded = match open_history(config) {
                Ok(history) => {
                    history
                        .add(
                            request.question().unwrap_or_default(),
                            request.image().is_some(),
                            &response,
                        )
                        .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = recorded {
                warn!(error = %e, "failed to record history entry");
            }
        }
        Err(e) => {
            let classification = e.classification();
            error!(code = %classification.code, error = %e, "question failed");
            eprintln!("{} [{}]", classification.message, classification.code);
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn history(config: &TutorConfig, action: HistoryAction) -> Result<()> {
    let history = open_history(config)?;

    match action {
        HistoryAction::List => {
            let entries = history.list().await?;
            if entries.is_empty() {
                println!("No history yet.");
            }
            for entry in entries {
                println!("{}", entry);
            }
        }
        HistoryAction::Show { id } => {
            let entry = history
                .get(&id)
                .await?
                .with_context(|| format!("history entry not found: {}", id))?;
            println!("{}", entry.question);
            println!("{}", entry.timestamp.to_rfc3339());
            println!();
            print_response(&entry.response);
        }
        HistoryAction::Remove { id } => {
            if !history.remove(&id).await? {
                anyhow::bail!("history entry not found: {}", id);
            }
            println!("Removed {}", id);
        }
        HistoryAction::Clear => {
            history.clear().await?;
            println!("History cleared.");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = TutorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            let state = AppState::from_config(&config)?;
            let addr = config.server.addr();
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {}", addr))?;
            info!(model = %config.upstream.text_model, "starting server");
            step_tutor::http::run(listener, state).await?;
        }
        Commands::Ask { question, image } => {
            let image = image.as_deref().map(image_data_url).transpose()?;
            ask(&config, AskRequest { question, image }).await?;
        }
        Commands::History { action } => {
            history(&config, action).await?;
        }
    }

    Ok(())
}
