use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sink::app::{ai_client, open_store};
use sink::config::Config;
use sink::models::{CreateLinkRequest, ListQuery};
use sink::Sink;

#[derive(Parser)]
#[command(name = "sink-admin")]
#[command(about = "Sink link management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a link
    Create {
        /// Target URL
        url: String,
        /// Slug to use; generated when omitted
        #[arg(long)]
        slug: Option<String>,
        /// Expiry as unix seconds
        #[arg(long)]
        expires_at: Option<i64>,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Show a link
    Get { slug: String },
    /// Delete a link
    Delete { slug: String },
    /// List links
    List {
        #[arg(long)]
        limit: Option<usize>,
        /// Cursor printed by a previous `list`
        #[arg(long)]
        cursor: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store = open_store(&config).await?;
    let ai = ai_client(&config)?;
    let app = Sink::build(&config, store.kv, ai, None)?;
    let service = &app.service;

    match cli.command {
        Commands::Create {
            url,
            slug,
            expires_at,
            comment,
        } => {
            let link = service
                .create(CreateLinkRequest {
                    slug,
                    url,
                    expires_at,
                    comment,
                    ..Default::default()
                })
                .await
                .context("failed to create link")?;
            println!("✓ Created '{}' -> {}", link.slug, link.url);
        }
        Commands::Get { slug } => {
            let link = service.get(&slug).await.context("failed to read link")?;
            println!("{}", serde_json::to_string_pretty(&link)?);
        }
        Commands::Delete { slug } => {
            service.delete(&slug).await.context("failed to delete link")?;
            println!("✓ Deleted '{}'", slug);
        }
        Commands::List { limit, cursor } => {
            let page = service
                .list(ListQuery { cursor, limit })
                .await
                .context("failed to list links")?;
            if page.links.is_empty() {
                println!("No links found.");
            } else {
                println!("{:<24} {}", "Slug", "URL");
                println!("{}", "-".repeat(80));
                for link in &page.links {
                    println!("{:<24} {}", link.slug, link.url);
                }
            }
            if let Some(cursor) = page.cursor {
                println!("\nMore links available, continue with --cursor {}", cursor);
            }
        }
    }

    Ok(())
}
