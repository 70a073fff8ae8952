//! # PiriChat CLI (`piri`)
//!
//! The `piri` binary is the primary interface for the PiriChat core. It
//! provides commands for database initialization, client management,
//! document ingestion, retrieval, persona routing, chat, embedding
//! maintenance, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! piri --config ./config/piri.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `piri init` | Create the SQLite database and run schema migrations |
//! | `piri agents` | List personas and the routing default |
//! | `piri clients add\|list` | Manage clients |
//! | `piri ingest kb <file>` | Ingest a document into the shared knowledge base |
//! | `piri ingest client <id> <file>` | Ingest a document for one client |
//! | `piri query "<text>"` | Retrieval only: ranked sources + context |
//! | `piri route "<text>"` | Show which persona would answer |
//! | `piri chat "<text>"` | Run a full chat turn |
//! | `piri embed pending\|rebuild` | Backfill or regenerate embeddings |
//! | `piri serve` | Start the HTTP JSON API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pirichat::models::DocumentScope;
use pirichat::store::SqliteStore;
use pirichat::{
    agents, chat, clients, config, db, embed_cmd, ingest, migrate, retrieval, router, server,
};

/// PiriChat — retrieval-grounded assistants for health-insurance brokers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/piri.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "piri",
    about = "PiriChat — retrieval-grounded assistants for health-insurance brokers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/piri.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (clients,
    /// documents, chunks, embeddings, chunk_vectors). Idempotent.
    Init,

    /// List personas and the routing default.
    Agents,

    /// Manage clients.
    Clients {
        #[command(subcommand)]
        action: ClientAction,
    },

    /// Ingest a document: extract text, chunk, embed, and store.
    ///
    /// Re-ingesting a document with the same name replaces its chunks.
    Ingest {
        #[command(subcommand)]
        target: IngestTarget,
    },

    /// Retrieval only: print ranked sources and the assembled context.
    Query {
        /// The query text.
        query: String,

        /// Also search this client's private documents.
        #[arg(long)]
        client: Option<String>,
    },

    /// Show which persona the router would pick for a query.
    Route {
        /// The query text.
        query: String,
    },

    /// Run a full chat turn (persona + retrieval + completion).
    Chat {
        /// The user message.
        message: String,

        /// Ground the answer in this client's documents as well.
        #[arg(long)]
        client: Option<String>,

        /// Persona name or `auto` (default: routed).
        #[arg(long)]
        agent: Option<String>,
    },

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Start the HTTP JSON API server.
    Serve,
}

/// Client management subcommands.
#[derive(Subcommand)]
enum ClientAction {
    /// Add a client.
    Add {
        /// Client display name.
        name: String,
    },
    /// List clients and their document counts.
    List,
}

/// Ingestion targets.
#[derive(Subcommand)]
enum IngestTarget {
    /// Ingest into the shared knowledge base.
    Kb {
        /// Path to a PDF, DOCX, or plain-text file.
        path: PathBuf,

        /// Document display name (defaults to the file stem).
        #[arg(long)]
        name: Option<String>,
    },
    /// Ingest into one client's private store.
    Client {
        /// Client ID (see `piri clients list`).
        client_id: String,

        /// Path to a PDF, DOCX, or plain-text file.
        path: PathBuf,

        /// Document display name (defaults to the file stem).
        #[arg(long)]
        name: Option<String>,
    },
}

/// Embedding management subcommands.
#[derive(Subcommand)]
enum EmbedAction {
    /// Embed chunks that are missing or have stale embeddings.
    Pending {
        /// Maximum number of chunks to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete and regenerate all embeddings.
    ///
    /// Useful when switching embedding providers or dimensions.
    Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Agents => {
            let default = agents::default_persona(cfg.router.default_agent.as_deref());
            for persona in agents::personas() {
                let marker = if persona.name == default.name {
                    " (default)"
                } else {
                    ""
                };
                println!(
                    "{:<12} {} — {}{}",
                    persona.name, persona.title, persona.description, marker
                );
            }
        }
        Commands::Clients { action } => {
            let store = open_store(&cfg).await?;
            match action {
                ClientAction::Add { name } => clients::run_add(&store, &name).await?,
                ClientAction::List => clients::run_list(&store).await?,
            }
            store.close().await;
        }
        Commands::Ingest { target } => {
            let store = open_store(&cfg).await?;
            match target {
                IngestTarget::Kb { path, name } => {
                    ingest::run_ingest(&store, &cfg, DocumentScope::KnowledgeBase, &path, name)
                        .await?;
                }
                IngestTarget::Client {
                    client_id,
                    path,
                    name,
                } => {
                    ingest::run_ingest(
                        &store,
                        &cfg,
                        DocumentScope::Client(client_id),
                        &path,
                        name,
                    )
                    .await?;
                }
            }
            store.close().await;
        }
        Commands::Query { query, client } => {
            let store = open_store(&cfg).await?;
            retrieval::run_query(&store, &cfg, &query, client.as_deref()).await?;
            store.close().await;
        }
        Commands::Route { query } => {
            let default = agents::default_persona(cfg.router.default_agent.as_deref());
            let persona = router::route(&query, default);
            println!("{} — {}", persona.name, persona.title);
        }
        Commands::Chat {
            message,
            client,
            agent,
        } => {
            let store = open_store(&cfg).await?;
            chat::run_chat(&store, &cfg, &message, client.as_deref(), agent.as_deref()).await?;
            store.close().await;
        }
        Commands::Embed { action } => {
            let store = open_store(&cfg).await?;
            match action {
                EmbedAction::Pending { limit, dry_run } => {
                    embed_cmd::run_embed_pending(&store, &cfg, limit, dry_run).await?;
                }
                EmbedAction::Rebuild => {
                    embed_cmd::run_embed_rebuild(&store, &cfg).await?;
                }
            }
            store.close().await;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn open_store(cfg: &config::Config) -> anyhow::Result<SqliteStore> {
    let pool = db::connect(cfg).await?;
    Ok(SqliteStore::new(pool))
}
