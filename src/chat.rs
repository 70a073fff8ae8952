//! Chat turn orchestration.
//!
//! One turn: pick the persona (explicit or routed), assemble the grounding
//! context, build the message list, call the completion provider, and
//! return the reply with its sources and citations.
//!
//! Retrieval failures degrade to an ungrounded turn — the assistant still
//! answers. A completion failure fails the turn.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::agents::{self, AgentPersona};
use crate::config::Config;
use crate::embedding;
use crate::llm::{self, ChatMessage};
use crate::models::RagContext;
use crate::retrieval;
use crate::router;
use crate::store::DocumentStore;

/// The reply for one chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    /// Persona that answered, e.g. `"legal"`.
    pub agent: String,
    /// Display labels of the grounding sources, e.g. `KB: RN 465`.
    pub sources: Vec<String>,
    /// Regulation-style references found in the reply.
    pub citations: Vec<String>,
}

/// Resolve which persona answers this turn.
///
/// `agent` may be a persona name, `"auto"` to invoke the router, or absent
/// (also routed). Unknown names are rejected.
pub fn resolve_persona(config: &Config, query: &str, agent: Option<&str>) -> Result<&'static AgentPersona> {
    let default = agents::default_persona(config.router.default_agent.as_deref());
    match agent {
        None | Some("auto") => Ok(router::route(query, default)),
        Some(name) => match agents::find(name) {
            Some(p) => Ok(p),
            None => bail!(
                "Unknown agent: '{}'. Available: auto, {}",
                name,
                agents::personas()
                    .iter()
                    .map(|p| p.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        },
    }
}

/// Run one chat turn.
pub async fn run_chat_turn(
    store: &dyn DocumentStore,
    config: &Config,
    message: &str,
    client_id: Option<&str>,
    agent: Option<&str>,
    history: &[ChatMessage],
) -> Result<ChatReply> {
    if message.trim().is_empty() {
        bail!("message must not be empty");
    }

    if let Some(id) = client_id {
        if store.get_client(id).await?.is_none() {
            bail!("unknown client: {}", id);
        }
    }

    let persona = resolve_persona(config, message, agent)?;

    // Grounding is best-effort: a retrieval failure must not fail the turn.
    let rag = match build_context(store, config, message, client_id).await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::warn!("retrieval failed, answering without grounding: {e:#}");
            RagContext::empty()
        }
    };

    let messages = assemble_messages(persona, &rag, history, message, config.llm.history_limit);

    let response = llm::complete(&config.llm, &messages).await?;
    let citations = llm::extract_citations(&response);

    Ok(ChatReply {
        response,
        agent: persona.name.to_string(),
        sources: rag.display_sources(),
        citations,
    })
}

/// CLI entry point: run a single turn with no prior history and print the reply.
pub async fn run_chat(
    store: &dyn DocumentStore,
    config: &Config,
    message: &str,
    client_id: Option<&str>,
    agent: Option<&str>,
) -> Result<()> {
    let reply = run_chat_turn(store, config, message, client_id, agent, &[]).await?;

    println!("[{}]", reply.agent);
    println!("{}", reply.response);
    if !reply.sources.is_empty() {
        println!();
        println!("sources:");
        for s in &reply.sources {
            println!("  {}", s);
        }
    }
    if !reply.citations.is_empty() {
        println!("citations: {}", reply.citations.join(", "));
    }
    Ok(())
}

async fn build_context(
    store: &dyn DocumentStore,
    config: &Config,
    message: &str,
    client_id: Option<&str>,
) -> Result<RagContext> {
    let provider = embedding::create_provider(&config.embedding)?;
    retrieval::search_full_context(store, provider.as_ref(), config, message, client_id).await
}

/// Build the completion message list: persona prompt, grounding block (when
/// non-empty), the most recent history turns, then the user message.
fn assemble_messages(
    persona: &AgentPersona,
    rag: &RagContext,
    history: &[ChatMessage],
    message: &str,
    history_limit: usize,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(ChatMessage::system(persona.system_prompt));

    if !rag.context.is_empty() {
        messages.push(ChatMessage::system(format!(
            "Contexto dos documentos:\n\n{}",
            rag.context
        )));
    }

    let start = history.len().saturating_sub(history_limit);
    messages.extend(history[start..].iter().cloned());

    messages.push(ChatMessage::user(message));
    messages
}
