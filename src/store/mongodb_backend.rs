//! MongoDB store providers.
//!
//! Networked persistence for run state and conversations, useful when runs
//! must survive process restarts or move between hosts.
//!
//! ## Usage
//!
//! Enable the `store-mongodb` feature in Cargo.toml:
//!
//! ```toml
//! ace = { version = "0.4", features = ["store", "store-mongodb"] }
//! ```
//!
//! Both stores live in one database (the config's `table`, default `ace`),
//! one collection per logical store, documents keyed by id with the record
//! serialized into a `payload` field and a top-level `updated_at` used for
//! ttl filtering.

use crate::store::models::{Conversation, RunState};
use crate::store::traits::{ConversationStore, StateStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use mongodb::{
    bson::{doc, from_bson, to_bson, Document},
    options::{ClientOptions, FindOptions},
    Client, Collection,
};
use std::time::Duration;

const STATE_COLLECTION: &str = "run_state";
const CONVERSATIONS_COLLECTION: &str = "conversations";

// Bound the startup probe so an unreachable server degrades quickly
const SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) async fn open_collection(
    url: &str,
    database: &str,
    collection: &str,
) -> StoreResult<(Client, Collection<Document>)> {
    let mut client_options = ClientOptions::parse(url)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;
    client_options.server_selection_timeout = Some(SELECTION_TIMEOUT);

    let client =
        Client::with_options(client_options).map_err(|e| StoreError::Connection(e.to_string()))?;
    let coll = client.database(database).collection::<Document>(collection);

    Ok((client, coll))
}

pub(crate) async fn ping(client: &Client, database: &str) -> bool {
    client
        .database(database)
        .run_command(doc! { "ping": 1 })
        .await
        .is_ok()
}

fn ttl_cutoff(ttl: Option<u64>) -> Option<i64> {
    ttl.map(|seconds| Utc::now().timestamp() - seconds as i64)
}

pub(crate) fn fresh(doc: &Document, ttl: Option<u64>) -> bool {
    match ttl_cutoff(ttl) {
        Some(cutoff) => doc.get_i64("updated_at").unwrap_or(0) >= cutoff,
        None => true,
    }
}

/// MongoDB-backed run-state store.
pub struct MongoStateStore {
    client: Client,
    database_name: String,
    collection: Collection<Document>,
    ttl: Option<u64>,
}

impl MongoStateStore {
    /// Connect to the given server and database.
    ///
    /// Connecting is lazy in the driver; use
    /// [`is_available`](StateStore::is_available) to probe reachability.
    pub async fn connect(url: &str, database: &str, ttl: Option<u64>) -> StoreResult<Self> {
        let (client, collection) = open_collection(url, database, STATE_COLLECTION).await?;
        Ok(Self {
            client,
            database_name: database.to_string(),
            collection,
            ttl,
        })
    }
}

#[async_trait]
impl StateStore for MongoStateStore {
    fn provider_name(&self) -> &'static str {
        "mongodb"
    }

    async fn is_available(&self) -> bool {
        ping(&self.client, &self.database_name).await
    }

    async fn get(&self, run_id: &str) -> StoreResult<RunState> {
        let doc = self
            .collection
            .find_one(doc! { "_id": run_id })
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(run_id.to_string()))?;

        if !fresh(&doc, self.ttl) {
            return Err(StoreError::NotFound(run_id.to_string()));
        }

        let payload = doc
            .get("payload")
            .ok_or_else(|| StoreError::Serialization("missing payload field".to_string()))?;
        from_bson(payload.clone()).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn set(&self, mut state: RunState) -> StoreResult<()> {
        state.updated_at = Utc::now();
        let payload =
            to_bson(&state).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let doc = doc! {
            "_id": &state.run_id,
            "updated_at": state.updated_at.timestamp(),
            "payload": payload,
        };

        self.collection
            .replace_one(doc! { "_id": &state.run_id }, doc)
            .upsert(true)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, run_id: &str) -> StoreResult<()> {
        self.collection
            .delete_one(doc! { "_id": run_id })
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }
}

/// MongoDB-backed conversation store.
pub struct MongoConversationStore {
    client: Client,
    database_name: String,
    collection: Collection<Document>,
    ttl: Option<u64>,
}

impl MongoConversationStore {
    /// Connect to the given server and database.
    pub async fn connect(url: &str, database: &str, ttl: Option<u64>) -> StoreResult<Self> {
        let (client, collection) = open_collection(url, database, CONVERSATIONS_COLLECTION).await?;
        Ok(Self {
            client,
            database_name: database.to_string(),
            collection,
            ttl,
        })
    }

    async fn write_record(&self, conversation: &Conversation) -> StoreResult<()> {
        let payload =
            to_bson(conversation).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let doc = doc! {
            "_id": &conversation.id,
            "owner_id": &conversation.owner_id,
            "updated_at": conversation.updated_at.timestamp(),
            "payload": payload,
        };

        self.collection
            .replace_one(doc! { "_id": &conversation.id }, doc)
            .upsert(true)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MongoConversationStore {
    fn provider_name(&self) -> &'static str {
        "mongodb"
    }

    async fn is_available(&self) -> bool {
        ping(&self.client, &self.database_name).await
    }

    async fn list(&self, owner_id: &str) -> StoreResult<Vec<Conversation>> {
        use futures_util::TryStreamExt;

        let mut filter = doc! { "owner_id": owner_id };
        if let Some(cutoff) = ttl_cutoff(self.ttl) {
            filter.insert("updated_at", doc! { "$gte": cutoff });
        }

        let find_options = FindOptions::builder()
            .sort(doc! { "updated_at": -1 })
            .build();

        let mut cursor = self
            .collection
            .find(filter)
            .with_options(find_options)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut conversations = Vec::new();
        while let Some(doc) = cursor
            .try_next()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
        {
            let payload = doc
                .get("payload")
                .ok_or_else(|| StoreError::Serialization("missing payload field".to_string()))?;
            let conversation: Conversation =
                from_bson(payload.clone()).map_err(|e| StoreError::Serialization(e.to_string()))?;
            conversations.push(conversation);
        }

        Ok(conversations)
    }

    async fn get(&self, id: &str) -> StoreResult<Conversation> {
        let doc = self
            .collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !fresh(&doc, self.ttl) {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let payload = doc
            .get("payload")
            .ok_or_else(|| StoreError::Serialization("missing payload field".to_string()))?;
        from_bson(payload.clone()).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn create(&self, owner_id: &str, title: Option<&str>) -> StoreResult<Conversation> {
        let conversation = Conversation::new(owner_id, title);
        self.write_record(&conversation).await?;
        Ok(conversation)
    }

    async fn update(&self, conversation: &Conversation) -> StoreResult<()> {
        let mut stored = conversation.clone();
        stored.updated_at = Utc::now();
        self.write_record(&stored).await
    }

    async fn rename(&self, id: &str, title: &str) -> StoreResult<()> {
        let mut conversation = self.get(id).await?;
        conversation.title = title.to_string();
        self.write_record(&conversation).await
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.collection
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }
}
