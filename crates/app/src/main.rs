mod server;

use chrono::Utc;
use clap::{Parser, Subcommand};
use repo_search_core::{
    normalize_language, GitHubClientConfig, GitHubSearchClient, QueryEngine, RecordStore,
    SearchOrchestrator, SearchParams, SqliteRecordStore, DEFAULT_GITHUB_API_URL,
    DEFAULT_GITHUB_API_VERSION, DEFAULT_TIMEOUT_SECONDS,
};
use server::{AppState, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "repo-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite file holding persisted repositories
    #[arg(long, env = "REPO_SEARCH_DATABASE", default_value = "repo-search.db")]
    database: PathBuf,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_BASE_URL", default_value = DEFAULT_GITHUB_API_URL)]
    github_url: String,

    /// Value for the X-GitHub-Api-Version header
    #[arg(long, env = "GITHUB_API_VERSION", default_value = DEFAULT_GITHUB_API_VERSION)]
    github_api_version: String,

    /// Optional token for authenticated (higher quota) requests
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Remote request timeout in seconds
    #[arg(long, env = "REPO_SEARCH_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    timeout_secs: u64,
}

impl Cli {
    fn client_config(&self) -> GitHubClientConfig {
        GitHubClientConfig {
            base_url: self.github_url.clone(),
            api_version: self.github_api_version.clone(),
            timeout_seconds: self.timeout_secs,
            token: self.github_token.clone(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Serve the search and stored-repository HTTP API.
    Serve {
        #[arg(long, env = "REPO_SEARCH_BIND", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
        /// Requests allowed per client within one window.
        #[arg(long, default_value_t = 10)]
        rate_limit: u32,
        /// Rate-limit window length in seconds.
        #[arg(long, default_value_t = 60)]
        rate_window_secs: u64,
    },
    /// Search GitHub once and persist new repositories locally.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long)]
        language: Option<String>,
        /// stars, forks or updated
        #[arg(long)]
        sort: Option<String>,
        /// asc or desc
        #[arg(long)]
        order: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
    },
    /// List stored repositories.
    List {
        #[arg(long)]
        language: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        min_stars: Option<i64>,
        /// popularity|stars, secondary|forks, recency|updated or name
        #[arg(long)]
        sort_by: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        database = %cli.database.display(),
        "repo-search boot"
    );

    let store = Arc::new(SqliteRecordStore::open(&cli.database)?);

    match cli.command {
        Command::Serve {
            bind,
            rate_limit,
            rate_window_secs,
        } => {
            let config = ServerConfig {
                bind,
                rate_limit,
                rate_window: Duration::from_secs(rate_window_secs),
            };
            config.validate()?;

            let client = Arc::new(GitHubSearchClient::new(&cli.client_config())?);
            let state = AppState::new(client, store, config.limiter());
            server::serve(&config, state).await?;
        }
        Command::Search {
            ref query,
            ref language,
            ref sort,
            ref order,
            page,
            per_page,
        } => {
            let request = SearchParams {
                query: Some(query.clone()),
                language: language.clone(),
                sort: sort.clone(),
                order: order.clone(),
                page: page.map(|value| value.to_string()),
                per_page: per_page.map(|value| value.to_string()),
            }
            .validate()?;

            let client = Arc::new(GitHubSearchClient::new(&cli.client_config())?);
            let orchestrator = SearchOrchestrator::new(client, Arc::clone(&store));
            let dispatch = orchestrator.search(&request).await?;
            let page = &dispatch.page;

            println!(
                "query: {} total_count={} incomplete_results={}",
                request.remote_query(),
                page.total_count,
                page.incomplete_results
            );
            for item in &page.items {
                println!(
                    "[{}] {} stars={} forks={} language={}",
                    item.id.map_or_else(|| "-".to_string(), |id| id.to_string()),
                    item.full_name.as_deref().unwrap_or(&item.name),
                    item.stargazers_count,
                    item.forks_count,
                    item.language.as_deref().unwrap_or("-")
                );
                if let Some(url) = &item.html_url {
                    println!("  url={url}");
                }
            }

            // A one-shot process must not exit before the detached merge finishes.
            if let Err(error) = dispatch.ingestion.await {
                warn!(error = %error, "ingestion task did not complete");
            }
            println!("{} repositories stored locally", store.count().await?);
        }
        Command::List {
            language,
            min_stars,
            sort_by,
        } => {
            let engine = QueryEngine::new(store);
            let language = normalize_language(language.as_deref());
            let records = engine
                .get_filtered_records(language.as_deref(), min_stars, sort_by.as_deref())
                .await?;

            for record in &records {
                println!(
                    "#{} {} stars={} forks={} language={} updated={}",
                    record.id,
                    record.name,
                    record.popularity,
                    record.secondary,
                    record.language.as_deref().unwrap_or("-"),
                    record
                        .last_activity
                        .map_or_else(|| "-".to_string(), |at| at.to_rfc3339())
                );
                if let Some(url) = record.html_url() {
                    println!("  url={url}");
                }
            }
            println!("{} repositories", records.len());
        }
    }

    Ok(())
}
