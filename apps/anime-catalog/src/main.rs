//! Anime Catalog worker
//!
//! Fills the catalog from AniList and answers recommendation and chat
//! queries against it. Runs one command per invocation; `chat` keeps a
//! single session alive for the lifetime of the process.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use core_config::Environment;
use core_config::tracing::{init_tracing, install_color_eyre};
use database::mongodb::{Database, check_health, connect_from_config_with_retry};
use domain_catalog::anilist::DEFAULT_ANILIST_TIMEOUT;
use domain_catalog::chat::{GeminiChatProvider, OpenRouterProvider, available_models};
use domain_catalog::{
    AniListClient, CatalogService, ConversationService, CursorRepository, HistoryStore,
    IngestionCoordinator, ModelIdentifier, MongoCatalogRepository, MongoCursorRepository,
    PageOutcome, QueryMode, RecommendationRequest, RecommendationResolver, SimilarityRanker,
};
use eyre::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

mod config;

use config::Config;

const CHAT_SESSION: &str = "cli";

#[derive(Parser)]
#[command(name = "anime-catalog")]
#[command(about = "Ingest, query and chat over the anime catalog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the chat models
    Models,

    #[command(flatten)]
    Catalog(CatalogCommand),
}

/// Commands that need the database
#[derive(Subcommand)]
enum CatalogCommand {
    /// Ingest pages from AniList starting at the stored cursor
    Ingest {
        /// Items per page (1-50). Defaults to INGEST_PER_PAGE.
        #[arg(short, long)]
        per_page: Option<u32>,

        /// Stop after this many pages. Defaults to INGEST_MAX_PAGES or unbounded.
        #[arg(short, long)]
        max_pages: Option<u32>,

        /// Seconds to wait between pages. Defaults to INGEST_INTERVAL_SECS.
        #[arg(short, long)]
        interval_secs: Option<u64>,

        /// Ingest exactly one page and print its outcome
        #[arg(long)]
        once: bool,
    },

    /// Add a single title by name
    Suggest {
        name: String,
    },

    /// Recommend titles similar to a name, genre list or description
    Recommend {
        query: String,

        /// anime_name, genre or description
        #[arg(short, long, default_value = "description")]
        mode: QueryMode,

        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
    },

    /// Interactive grounded chat on stdin
    Chat {
        /// Model id; unknown ids fall back to the default model
        #[arg(short, long, default_value = "")]
        model: String,
    },

    /// Look up one stored title
    Show {
        name: String,
    },

    /// List stored genres, or the titles of one genre
    Genres {
        genre: Option<String>,

        #[arg(short, long, default_value_t = 1)]
        page: u64,

        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// Search stored titles by substring
    Search {
        term: String,

        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// Show catalog size, ingestion cursor and database health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    match Cli::parse().command {
        Commands::Models => {
            println!("{}", serde_json::to_string_pretty(&available_models())?);
            Ok(())
        }
        Commands::Catalog(command) => run(command).await,
    }
}

async fn run(command: CatalogCommand) -> Result<()> {
    let config = Config::from_env()?;

    info!("Connecting to database...");
    let client = connect_from_config_with_retry(&config.mongo, None)
        .await
        .map_err(|e| eyre::eyre!("Database connection failed: {}", e))?;
    let db = client.database(config.mongo.database());

    let repository = Arc::new(
        MongoCatalogRepository::new(&db).with_vector_index(config.engine.vector_index_name.clone()),
    );

    match command {
        CatalogCommand::Ingest {
            per_page,
            max_pages,
            interval_secs,
            once,
        } => {
            repository.init_indexes().await?;
            let coordinator = IngestionCoordinator::new(
                Arc::new(AniListClient::new(
                    config.engine.anilist_url.clone(),
                    DEFAULT_ANILIST_TIMEOUT,
                )?),
                repository,
                Arc::new(MongoCursorRepository::new(&db)),
                config.engine.embedding_gateway()?,
            );
            let per_page = per_page.unwrap_or(config.ingest.per_page);

            if once {
                let outcome = coordinator.ingest_next_page(per_page).await?;
                if let PageOutcome::Exhausted { page } = outcome {
                    info!(page, "Catalog source exhausted");
                }
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                let interval = interval_secs
                    .map(Duration::from_secs)
                    .unwrap_or(config.ingest.interval);
                let summary = coordinator
                    .run_pages(per_page, max_pages.or(config.ingest.max_pages), interval)
                    .await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
                if let Some(page) = summary.failed_page {
                    eyre::bail!("Ingestion stopped at page {}", page);
                }
            }
        }

        CatalogCommand::Suggest { name } => {
            repository.init_indexes().await?;
            let coordinator = IngestionCoordinator::new(
                Arc::new(AniListClient::new(
                    config.engine.anilist_url.clone(),
                    DEFAULT_ANILIST_TIMEOUT,
                )?),
                repository,
                Arc::new(MongoCursorRepository::new(&db)),
                config.engine.embedding_gateway()?,
            );
            let entry = coordinator.ingest_by_name(&name).await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }

        CatalogCommand::Recommend {
            query,
            mode,
            top_k,
        } => {
            let ranker = ranker(&config, repository.clone());
            let resolver =
                RecommendationResolver::new(repository, config.engine.embedding_gateway()?, ranker);
            let picks = resolver
                .recommend(RecommendationRequest::new(query, mode, top_k))
                .await?;
            println!("{}", serde_json::to_string_pretty(&picks)?);
        }

        CatalogCommand::Chat { model } => {
            let service = conversation_service(&config, repository)?;
            chat_loop(&service, ModelIdentifier::parse_or_default(&model)).await?;
        }

        CatalogCommand::Show { name } => {
            let entry = CatalogService::new(repository).get_by_name(&name).await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }

        CatalogCommand::Genres { genre, page, limit } => {
            let catalog = CatalogService::new(repository);
            match genre {
                Some(genre) => {
                    let entries = catalog.filter_by_genre(&genre, page, limit).await?;
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                }
                None => {
                    println!("{}", serde_json::to_string_pretty(&catalog.list_genres().await?)?);
                }
            }
        }

        CatalogCommand::Search { term, limit } => {
            let entries = CatalogService::new(repository).search(&term, limit).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }

        CatalogCommand::Status => {
            print_status(&db, repository).await?;
        }
    }

    Ok(())
}

fn ranker(config: &Config, repository: Arc<MongoCatalogRepository>) -> SimilarityRanker {
    SimilarityRanker::new(repository, config.engine.ranking_strategy)
        .with_num_candidates(config.engine.vector_num_candidates)
}

/// Chat service with every completion backend that has credentials configured
fn conversation_service(
    config: &Config,
    repository: Arc<MongoCatalogRepository>,
) -> Result<ConversationService> {
    let mut service = ConversationService::new(
        HistoryStore::new(),
        config.engine.embedding_gateway()?,
        ranker(config, repository),
        config.engine.provider_timeout,
    )
    .with_context_size(config.engine.chat_context_size);

    match OpenRouterProvider::from_env() {
        Ok(provider) => service = service.with_provider(Arc::new(provider)),
        Err(e) => warn!(error = %e, "OpenRouter models disabled"),
    }
    match GeminiChatProvider::from_env() {
        Ok(provider) => service = service.with_provider(Arc::new(provider)),
        Err(e) => warn!(error = %e, "Gemini chat disabled"),
    }

    Ok(service)
}

async fn chat_loop(service: &ConversationService, model: ModelIdentifier) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!(model = %model, "Chat session started; /reset clears history, /quit exits");

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                service.history().clear(CHAT_SESSION).await;
                stdout.write_all(b"(history cleared)\n").await?;
            }
            message => match service.reply(CHAT_SESSION, message, model).await {
                Ok(reply) => stdout.write_all(format!("{}\n\n", reply).as_bytes()).await?,
                Err(e) => stdout.write_all(format!("error: {}\n", e).as_bytes()).await?,
            },
        }
    }

    service.history().remove(CHAT_SESSION).await;
    Ok(())
}

async fn print_status(db: &Database, repository: Arc<MongoCatalogRepository>) -> Result<()> {
    let health = check_health(db).await;
    let count = CatalogService::new(repository).count().await?;
    let cursor = MongoCursorRepository::new(db).load().await?;

    let status = serde_json::json!({
        "database": {
            "healthy": health.healthy,
            "message": health.message,
            "response_time_ms": health.response_time_ms,
        },
        "catalog_items": count,
        "next_page": cursor.map(|c| c.current_page),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
