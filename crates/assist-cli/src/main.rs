use anyhow::{bail, Context};
use assist_core::{
    AskPipeline, AssistConfig, HistoryRecorder, IdentityService, LlamaInvoker, NewIdentity, Role,
    SqliteStore,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Assist CLI - operate the corporate assistant from a terminal
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store and the default accounts
    InitDb,

    /// Create an account
    AddUser {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,

        /// `user` or `admin`
        #[arg(short, long, default_value = "user")]
        role: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        full_name: Option<String>,

        #[arg(long)]
        department: Option<String>,
    },

    /// Ask one question through the model, recorded under an existing account
    Ask {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        question: String,
    },

    /// Check the model executable and settings
    CheckModel,

    /// Show recorded exchanges, newest first
    History {
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let config = AssistConfig::from_env().context("reading configuration")?;
    init_logging(&config.logging.level, cli.verbose);

    match cli.command {
        Commands::InitDb => {
            let store = open_store(&config)?;
            let created = IdentityService::new(store.clone()).seed_defaults()?;
            println!("{} {:?}", "Store ready:".green().bold(), store.location());
            if created {
                println!(
                    "{} default accounts admin/admin123 and user/user123 created; change these passwords",
                    "Warning:".yellow().bold()
                );
            }
        }
        Commands::AddUser {
            username,
            password,
            role,
            email,
            full_name,
            department,
        } => {
            let identities = IdentityService::new(open_store(&config)?);
            let identity = identities.create(NewIdentity {
                username,
                password,
                role: Role::parse(Some(role.as_str()))?,
                email,
                full_name,
                department,
            })?;
            println!(
                "{} {} ({})",
                "Created".green().bold(),
                identity.username,
                identity.role
            );
        }
        Commands::Ask { user, question } => {
            let store = open_store(&config)?;
            if IdentityService::new(store.clone()).find(&user)?.is_none() {
                bail!("unknown user: {user}");
            }
            if let Err(e) = config.model.validate() {
                tracing::warn!("Model not ready: {}", e);
            }

            let pipeline = AskPipeline::new(
                Arc::new(LlamaInvoker::new(config.model.clone())),
                HistoryRecorder::new(store),
            );
            let exchange = pipeline.ask(&user, &question).await?;

            println!(
                "{} {}",
                exchange.timestamp().dimmed(),
                format!("[{}]", exchange.directive).cyan()
            );
            if exchange.failed() {
                println!("{}", exchange.answer().red());
            } else {
                println!("{}", exchange.answer());
            }
        }
        Commands::CheckModel => {
            let model = &config.model;
            println!("Executable: {}", model.executable.display());
            println!("Model:      {}", model.model_path.display());
            println!(
                "Settings:   ctx={} temp={} max_tokens={} timeout={}",
                model.context_size,
                model.temperature,
                model.max_tokens,
                model
                    .timeout_secs
                    .map(|s| format!("{s}s"))
                    .unwrap_or_else(|| "none".to_string())
            );
            if !model.executable.exists() {
                println!("{} executable not found", "Warning:".yellow().bold());
            }
            match model.validate() {
                Ok(()) => println!("{}", "Model configuration OK".green().bold()),
                Err(e) => {
                    println!("{}", "Model configuration invalid".red().bold());
                    return Err(e.into());
                }
            }
        }
        Commands::History { limit, json } => {
            let recorder = HistoryRecorder::new(open_store(&config)?);
            let records = recorder.recent(limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No exchanges recorded");
            } else {
                for record in records {
                    println!(
                        "{} {} {}",
                        record.timestamp().dimmed(),
                        record.username.bold(),
                        format!("[{}]", record.directive).cyan()
                    );
                    println!("  Q: {}", record.question);
                    println!("  A: {}", record.response);
                }
            }
        }
    }

    Ok(())
}

fn open_store(config: &AssistConfig) -> anyhow::Result<Arc<SqliteStore>> {
    let location = config.store_location()?;
    let store = SqliteStore::open(&location).with_context(|| format!("opening store {location:?}"))?;
    Ok(Arc::new(store))
}

fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
