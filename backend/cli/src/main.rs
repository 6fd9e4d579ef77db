mod bootstrap;
mod config;
mod output;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use concierge_core::ConversationKey;
use concierge_logging::{init_logger, LoggerOptions};

use bootstrap::App;
use config::Config;
use repl::{Console, ConsoleReviewer};

#[derive(Parser)]
#[command(name = "concierge")]
#[command(about = "Concierge: customer-service assistant for an electronics store")]
#[command(version)]
struct Cli {
    /// Model used by every stage
    #[arg(long, global = true)]
    model: Option<String>,
    /// Log level when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// SQLite order database
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Authenticated customer id
        #[arg(short, long, default_value = "customer")]
        user: String,
        /// Conversation id; a fresh one when omitted
        #[arg(short, long)]
        conversation: Option<String>,
    },
    /// Chat while confirming every predicted intent
    Dev {
        #[arg(short, long, default_value = "developer")]
        user: String,
        #[arg(short, long)]
        conversation: Option<String>,
    },
    /// Create the order database from the product catalog
    Seed,
    /// Load every startup resource and report what was found
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    init_logger(&LoggerOptions {
        level: config.log_level.clone(),
        log_dir: config.log_dir.clone(),
        json_console: false,
    });

    match cli.command {
        Commands::Chat { user, conversation } => {
            let app = App::load(&config).await?;
            let key = conversation_key(user, conversation);
            info!(key = %key, "Starting chat session");

            let console = Console::stdio();
            banner(&console);
            repl::run_chat(&console, &app.dispatcher, &key).await;
        }
        Commands::Dev { user, conversation } => {
            let app = App::load(&config).await?;
            let key = conversation_key(user, conversation);
            info!(key = %key, "Starting review session");

            let console = Arc::new(Console::stdio());
            let dev = app.dev_session(&config, Arc::new(ConsoleReviewer::new(console.clone())));
            banner(&console);
            repl::run_dev(&console, &dev, &key).await;
        }
        Commands::Seed => {
            let products = bootstrap::seed(&config).await?;
            output::note_success(&format!(
                "Seeded {} with {} products",
                config.db_path.display(),
                products
            ));
        }
        Commands::Check => check(&config).await?,
    }

    Ok(())
}

fn conversation_key(user: String, conversation: Option<String>) -> ConversationKey {
    let conversation = conversation.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    ConversationKey::new(user, conversation)
}

fn banner(console: &Console) {
    console.say("Welcome! Ask about our products or your orders. Type 'exit' or 'quit' to leave.");
}

async fn check(config: &Config) -> Result<()> {
    let app = match App::load(config).await {
        Ok(app) => app,
        Err(e) => {
            output::note_error(&format!("{e:#}"));
            return Err(e);
        }
    };

    let summary = output::render_summary(&[
        ("routes", app.intentions.join(", ")),
        ("handlers", app.dispatcher.registry().intents().join(", ")),
        ("products", app.products.to_string()),
        ("database", config.db_path.display().to_string()),
        ("model", config.model.clone()),
        ("transcripts", config.transcript_dir.display().to_string()),
    ]);
    print!("{summary}");
    output::note_info(&format!(
        "turn timeout: {}",
        config
            .turn_timeout()
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "disabled".to_string())
    ));
    output::note_success("All startup resources loaded");
    Ok(())
}
