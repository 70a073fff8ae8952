//! Client management commands.

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::models::{Client, DocumentScope};
use crate::store::DocumentStore;

pub async fn run_add(store: &dyn DocumentStore, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("client name must not be empty");
    }

    let client = Client {
        id: Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        created_at: chrono::Utc::now().timestamp(),
    };
    store.upsert_client(&client).await?;

    println!("client added");
    println!("  id: {}", client.id);
    println!("  name: {}", client.name);
    Ok(())
}

pub async fn run_list(store: &dyn DocumentStore) -> Result<()> {
    let clients = store.list_clients().await?;

    if clients.is_empty() {
        println!("No clients.");
        return Ok(());
    }

    for client in &clients {
        let docs = store
            .list_documents(&DocumentScope::Client(client.id.clone()))
            .await?;
        println!("{}  {} ({} documents)", client.id, client.name, docs.len());
    }
    Ok(())
}
