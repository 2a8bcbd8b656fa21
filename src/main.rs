use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "schoolsync", version, about = "School email sync and event extraction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output structured JSON
    #[arg(long, global = true)]
    json: bool,

    /// Database path (defaults to ~/.schoolsync/schoolsync.db)
    #[arg(long, global = true, env = "SCHOOLSYNC_DB", value_name = "PATH")]
    db: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sync monitored school email and extract calendar events
    Sync(SyncArgs),
    /// Generate or refresh the summary for one ingested email
    Summarize(SummarizeArgs),
    /// List extracted events
    Events(EventsArgs),
    /// Show processing history
    History(HistoryArgs),
    /// Manage users
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage monitored sender addresses/domains
    Sources {
        #[command(subcommand)]
        command: SourceCommands,
    },
    /// Show store stats
    Stats,
}

#[derive(Debug, Args)]
struct SyncArgs {
    /// User to sync
    #[arg(long)]
    user: String,
    /// Lookback window in days
    #[arg(long, default_value_t = schoolsync::config::DEFAULT_LOOKBACK_DAYS)]
    lookback_days: u32,
    /// Maximum messages per run
    #[arg(long, default_value_t = schoolsync::config::DEFAULT_MAX_MESSAGES)]
    max_messages: usize,
    /// Re-run extraction for already-processed messages
    #[arg(long, default_value_t = false)]
    force: bool,
    /// Pause between extraction calls, in milliseconds
    #[arg(long, default_value_t = schoolsync::config::DEFAULT_MESSAGE_DELAY_MS)]
    delay_ms: u64,
}

#[derive(Debug, Args)]
struct SummarizeArgs {
    #[arg(long)]
    user: String,
    /// Provider message id of an ingested email
    message_id: String,
    /// Overwrite an existing summary
    #[arg(long, default_value_t = false)]
    refresh: bool,
}

#[derive(Debug, Args)]
struct EventsArgs {
    #[arg(long)]
    user: String,
    /// Include past events (default shows today onward)
    #[arg(long, default_value_t = false)]
    all: bool,
    #[arg(long, default_value_t = 50)]
    limit: usize,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[arg(long)]
    user: String,
    #[arg(long, default_value_t = 50)]
    limit: usize,
}

#[derive(Debug, Subcommand)]
enum UserCommands {
    /// List configured users
    List,
    /// Add or update a user
    Add {
        user_id: String,
        email: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Remove a user and their records
    Remove { user_id: String },
}

#[derive(Debug, Subcommand)]
enum SourceCommands {
    /// List monitored senders for a user
    List {
        #[arg(long)]
        user: String,
    },
    /// Add a monitored address or domain
    Add {
        #[arg(long)]
        user: String,
        /// Full address ("office@school.edu") or domain ("school.edu")
        pattern: String,
        #[arg(long)]
        label: Option<String>,
    },
    /// Remove a monitored address or domain
    Remove {
        #[arg(long)]
        user: String,
        pattern: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::dispatch(cli).await
}

mod commands {
    use std::path::PathBuf;

    use anyhow::{anyhow, Context, Result};
    use chrono::Utc;
    use uuid::Uuid;

    use schoolsync::config::{self, ProviderSettings, SyncOptions};
    use schoolsync::db::models::{MonitoredSender, User};
    use schoolsync::db::Database;
    use schoolsync::mail::GmailSource;
    use schoolsync::output::{self, OutputFormat};
    use schoolsync::pipeline::{self, IngestionPipeline, SummaryAction};

    use super::{Cli, Commands, SourceCommands, UserCommands};

    pub async fn dispatch(cli: Cli) -> Result<()> {
        let db = open_database(cli.db.clone())?;
        match cli.command {
            Commands::Sync(args) => handle_sync(&db, args, cli.json).await,
            Commands::Summarize(args) => handle_summarize(&db, args, cli.json).await,
            Commands::Events(args) => handle_events(&db, args, cli.json),
            Commands::History(args) => handle_history(&db, args, cli.json),
            Commands::Users { command } => handle_users(&db, command),
            Commands::Sources { command } => handle_sources(&db, command),
            Commands::Stats => handle_stats(&db, cli.json),
        }
    }

    fn open_database(path: Option<PathBuf>) -> Result<Database> {
        let db_path = match path {
            Some(path) => path,
            None => Database::default_db_path().context("resolve default database path")?,
        };
        Database::open(&db_path)
            .with_context(|| format!("open database at {}", db_path.display()))
    }

    fn load_user(db: &Database, user_id: &str) -> Result<User> {
        db.get_user(user_id)?
            .ok_or_else(|| anyhow!("user not found: {user_id}; use 'schoolsync users add' first"))
    }

    async fn handle_sync(db: &Database, args: super::SyncArgs, json: bool) -> Result<()> {
        let user = load_user(db, &args.user)?;
        let settings =
            ProviderSettings::resolve(&user).context("resolve extraction provider settings")?;
        let extractor = config::build_date_extractor(settings);
        let mail = GmailSource::new(db, &user);

        let options = SyncOptions {
            lookback_days: args.lookback_days,
            max_messages: args.max_messages,
            force: args.force,
            message_delay_ms: args.delay_ms,
        };
        let pipeline = IngestionPipeline::new(db, &mail, extractor.as_ref(), options);
        let outcome = pipeline
            .sync(&user)
            .await
            .with_context(|| format!("sync user {}", user.user_id))?;

        let formatted =
            output::format_sync_outcome(OutputFormat::from_json_flag(json), &outcome)?;
        println!("{formatted}");
        Ok(())
    }

    async fn handle_summarize(db: &Database, args: super::SummarizeArgs, json: bool) -> Result<()> {
        let user = load_user(db, &args.user)?;
        let settings =
            ProviderSettings::resolve(&user).context("resolve extraction provider settings")?;
        let summarizer = config::build_summarizer(settings);

        let action = pipeline::summarize_email(
            db,
            summarizer.as_ref(),
            &user,
            &args.message_id,
            args.refresh,
        )
        .await?;

        if action == SummaryAction::SkippedExisting {
            println!("Summary already exists; pass --refresh to regenerate.");
            return Ok(());
        }

        let record = db
            .get_processed_email(&user.user_id, &args.message_id)?
            .ok_or_else(|| anyhow!("record vanished for message {}", args.message_id))?;
        let summary = db
            .get_summary(&record.id)?
            .ok_or_else(|| anyhow!("summary missing after write for {}", args.message_id))?;

        let formatted = output::format_summary(OutputFormat::from_json_flag(json), &summary)?;
        println!("{formatted}");
        Ok(())
    }

    fn handle_events(db: &Database, args: super::EventsArgs, json: bool) -> Result<()> {
        let user = load_user(db, &args.user)?;
        let since = if args.all {
            None
        } else {
            Some(Utc::now().date_naive())
        };
        let events = db.list_events_for_user(&user.user_id, since, args.limit)?;
        let formatted = output::format_events(OutputFormat::from_json_flag(json), &events)?;
        println!("{formatted}");
        Ok(())
    }

    fn handle_history(db: &Database, args: super::HistoryArgs, json: bool) -> Result<()> {
        let user = load_user(db, &args.user)?;
        let entries = db.list_history(&user.user_id, args.limit)?;
        let formatted = output::format_history(OutputFormat::from_json_flag(json), &entries)?;
        println!("{formatted}");
        Ok(())
    }

    fn handle_users(db: &Database, command: UserCommands) -> Result<()> {
        match command {
            UserCommands::List => {
                let users = db.list_users()?;
                if users.is_empty() {
                    println!("No users configured.");
                } else {
                    println!("Users");
                    println!("=====");
                    for user in users {
                        println!(
                            "{}  {}  last_sync={}",
                            user.user_id,
                            user.email_address,
                            user.last_sync.as_deref().unwrap_or("never")
                        );
                    }
                }
            }
            UserCommands::Add {
                user_id,
                email,
                display_name,
            } => {
                let user = User {
                    user_id: user_id.trim().to_string(),
                    email_address: email,
                    display_name,
                    enabled: true,
                    last_sync: None,
                    config: None,
                };
                db.upsert_user(&user)?;
                println!("Added user: {}", user.user_id);
            }
            UserCommands::Remove { user_id } => {
                let removed = db.remove_user(&user_id)?;
                if removed == 0 {
                    println!("No user found: {user_id}");
                } else {
                    println!("Removed user: {user_id}");
                }
            }
        }
        Ok(())
    }

    fn handle_sources(db: &Database, command: SourceCommands) -> Result<()> {
        match command {
            SourceCommands::List { user } => {
                let user = load_user(db, &user)?;
                let senders = db.list_monitored_senders(&user.user_id)?;
                if senders.is_empty() {
                    println!("No monitored senders for {}.", user.user_id);
                } else {
                    println!("Monitored senders for {}", user.user_id);
                    println!("==========================");
                    for sender in senders {
                        println!(
                            "{}  {}",
                            sender.pattern,
                            sender.label.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
            SourceCommands::Add {
                user,
                pattern,
                label,
            } => {
                let user = load_user(db, &user)?;
                let sender = MonitoredSender {
                    id: Uuid::new_v4().to_string(),
                    user_id: user.user_id.clone(),
                    pattern,
                    label,
                    created_at: None,
                };
                db.add_monitored_sender(&sender)?;
                println!("Monitoring: {}", sender.pattern.trim().to_lowercase());
            }
            SourceCommands::Remove { user, pattern } => {
                let user = load_user(db, &user)?;
                let removed = db.remove_monitored_sender(&user.user_id, &pattern)?;
                if removed == 0 {
                    println!("Not monitored: {pattern}");
                } else {
                    println!("Stopped monitoring: {pattern}");
                }
            }
        }
        Ok(())
    }

    fn handle_stats(db: &Database, json: bool) -> Result<()> {
        let stats = db.get_stats()?;
        let formatted = output::format_stats(OutputFormat::from_json_flag(json), &stats)?;
        println!("{formatted}");
        Ok(())
    }
}
