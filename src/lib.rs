//! # PiriChat Core
//!
//! Retrieval-grounded assistants for health-insurance brokers.
//!
//! PiriChat ingests regulation texts and client contracts into a two-tier
//! store — a shared knowledge base plus isolated per-client documents —
//! chunking and embedding them for similarity search. Each chat turn routes
//! the query to a specialist persona, assembles a ranked context string from
//! both tiers, and calls an LLM completion provider with the persona prompt,
//! recent history, and the injected context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │   Uploads    │──▶│   Pipeline   │──▶│  SQLite   │
//! │ PDF/DOCX/txt │   │ Chunk+Embed  │   │  2 tiers  │
//! └──────────────┘   └──────────────┘   └─────┬─────┘
//!                                             │
//!              ┌────────┐   ┌───────────┐     │
//!   query ────▶│ Router │──▶│ Retrieval │◀────┘
//!              └───┬────┘   └─────┬─────┘
//!                  ▼              ▼
//!            persona prompt + context ──▶ LLM ──▶ reply + citations
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! piri init                              # create database
//! piri clients add "Empresa Exemplo"     # register a client
//! piri ingest kb docs/rn-465.pdf         # shared knowledge base
//! piri ingest client <id> contrato.docx  # client-private document
//! piri query "prazo de carência" --client <id>
//! piri chat "quais os gaps deste contrato?" --client <id>
//! piri serve                             # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Sentence-boundary text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Two-tier document/chunk store |
//! | [`extract`] | PDF/DOCX/plain-text extraction |
//! | [`ingest`] | Chunk-and-embed pipeline |
//! | [`retrieval`] | Similarity search and context assembly |
//! | [`agents`] | Specialist personas |
//! | [`router`] | Keyword-weight persona routing |
//! | [`llm`] | Completion providers and citation extraction |
//! | [`chat`] | Chat turn orchestration |
//! | [`server`] | HTTP JSON API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod agents;
pub mod chat;
pub mod chunk;
pub mod clients;
pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod retrieval;
pub mod router;
pub mod server;
pub mod store;
