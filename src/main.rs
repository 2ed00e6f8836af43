use clap::{Parser, Subcommand};
use pagewatch::{
    CheckStore, FetchConfig, Fetcher, LinkType, LlmSummarizer, PageMonitor, ProviderConfig,
};
use std::env;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "pagewatch", about = "Track competitor web pages for changes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a competitor to monitor
    AddCompetitor {
        #[arg(long)]
        name: String,
    },
    /// Track a URL for a competitor
    AddLink {
        #[arg(long)]
        competitor: Uuid,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "other")]
        link_type: LinkType,
    },
    /// Check a single link now
    Check {
        #[arg(long)]
        link: Uuid,
    },
    /// Check every link of a competitor
    CheckAll {
        #[arg(long)]
        competitor: Uuid,
    },
    /// Show recent changes for a link
    History {
        #[arg(long)]
        link: Uuid,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Report database and LLM backend health
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://pagewatch.db?mode=rwc".to_string());
    let store = Arc::new(CheckStore::new(&database_url).await?);

    let provider = ProviderConfig::from_env();
    if provider.is_none() {
        info!("No LLM credential configured; summaries will be skipped");
    }

    let monitor = PageMonitor::new(
        store.clone(),
        Arc::new(Fetcher::new(FetchConfig::default())),
        Arc::new(LlmSummarizer::new(provider)),
    );

    match cli.command {
        Command::AddCompetitor { name } => {
            let id = store.add_competitor(&name).await?;
            println!("{id}");
        }
        Command::AddLink {
            competitor,
            url,
            link_type,
        } => {
            let id = store.add_link(competitor, &url, link_type).await?;
            println!("{id}");
        }
        Command::Check { link } => {
            let outcome = monitor.run_check(link).await?;
            println!("{} {} {}", outcome.link_id, outcome.check_id, outcome.status);
        }
        Command::CheckAll { competitor } => {
            let outcomes = monitor.run_competitor_checks(competitor).await?;
            for outcome in outcomes {
                println!("{} {} {}", outcome.link_id, outcome.check_id, outcome.status);
            }
        }
        Command::History { link, limit } => {
            let changes = store.changes_for_link(link, limit).await?;
            if changes.is_empty() {
                println!("No changes recorded");
            }
            for change in changes {
                println!(
                    "{} significant={} summary={}",
                    change.created_at,
                    change.has_significant,
                    change.summary.as_deref().unwrap_or("-")
                );
                println!("{}", change.diff_text);
            }
        }
        Command::Status => {
            let status = monitor.service_status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
