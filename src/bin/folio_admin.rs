//! Management command for a Folio installation.
//!
//! Usage: `folio-admin [--config config.yml] <command>`

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio::{
    api::AppState,
    app,
    config::Config,
    db,
    models::{CreatePostInput, CreateToolInput, CreateUserInput, PostStatus, UserRole},
};

#[derive(Parser)]
#[command(name = "folio-admin", author, version, about = "Manage a Folio site", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, short, default_value = "config.yml", env = "FOLIO_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Create an administrator account
    CreateAdmin {
        username: String,
        email: String,
        #[arg(long, env = "FOLIO_ADMIN_PASSWORD")]
        password: String,
    },

    /// Create a post from a markdown file
    CreatePost {
        #[arg(long)]
        title: String,
        /// Markdown body
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        publish: bool,
        /// Username of the author
        #[arg(long, default_value = "admin")]
        author: String,
    },

    /// Add a tool to the showcase
    CreateTool {
        #[arg(long)]
        title: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        featured: bool,
    },

    /// Delete chat messages older than the retention window
    PruneChat,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load_with_env(&cli.config)?;
    app::ensure_form_secret(&mut config)?;

    match cli.command {
        Command::Migrate => {
            let pool = db::create_pool(&config.database).await?;
            let applied = db::migrations::run_migrations(&pool).await?;
            println!("Applied {applied} migration(s)");
            Ok(())
        }
        command => run(app::build_state(config).await?, command).await,
    }
}

/// Commands that need the full application state. Building the state runs
/// pending migrations.
async fn run(state: AppState, command: Command) -> Result<()> {
    match command {
        Command::Migrate => println!("Database is up to date"),
        Command::CreateAdmin {
            username,
            email,
            password,
        } => {
            let user = state
                .user_service
                .create_user(CreateUserInput {
                    username,
                    email,
                    password,
                    role: UserRole::Admin,
                })
                .await?;
            println!("Created admin '{}' (id {})", user.username, user.id);
        }
        Command::CreatePost {
            title,
            file,
            publish,
            author,
        } => {
            let body = std::fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let Some(author) = state.user_service.get_by_username(&author).await? else {
                bail!("No user named '{author}'");
            };
            let post = state
                .post_service
                .create(
                    author.id,
                    CreatePostInput {
                        title,
                        body,
                        status: Some(if publish { PostStatus::Published } else { PostStatus::Draft }),
                        ..CreatePostInput::default()
                    },
                )
                .await?;
            println!("Created post '{}' ({}) /blog/{}/", post.title, post.status, post.slug);
        }
        Command::CreateTool {
            title,
            category,
            url,
            summary,
            featured,
        } => {
            let tool = state
                .tool_service
                .create(CreateToolInput {
                    title,
                    slug: String::new(),
                    category,
                    summary: summary.unwrap_or_default(),
                    description: String::new(),
                    url,
                    repo_url: None,
                    metadata: serde_json::json!({}),
                    featured,
                    sort_order: 0,
                })
                .await?;
            println!("Created tool '{}' /tools/{}/", tool.title, tool.slug);
        }
        Command::PruneChat => {
            let removed = state.chat_service.prune().await?;
            println!("Removed {removed} chat message(s)");
        }
    }

    Ok(())
}
