//! MongoDB memory backend (feature `store-mongodb`).

use super::store::{MainMemory, MemoryBackend};
use crate::store::mongodb_backend::{fresh, open_collection, ping};
use crate::store::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use mongodb::{
    bson::{doc, from_bson, to_bson, Document},
    Client, Collection,
};

const MEMORY_COLLECTION: &str = "agent_memory";

/// MongoDB-backed agent memory, one document per agent id.
pub struct MongoMemoryBackend {
    client: Client,
    database_name: String,
    collection: Collection<Document>,
    ttl: Option<u64>,
}

impl MongoMemoryBackend {
    /// Connect to the given server and database.
    pub async fn connect(url: &str, database: &str, ttl: Option<u64>) -> StoreResult<Self> {
        let (client, collection) = open_collection(url, database, MEMORY_COLLECTION).await?;
        if !ping(&client, database).await {
            return Err(StoreError::Connection(format!(
                "mongodb at {} not reachable",
                url
            )));
        }
        Ok(Self {
            client,
            database_name: database.to_string(),
            collection,
            ttl,
        })
    }

    /// Probe server reachability.
    pub async fn is_available(&self) -> bool {
        ping(&self.client, &self.database_name).await
    }
}

#[async_trait]
impl MemoryBackend for MongoMemoryBackend {
    fn provider_name(&self) -> &'static str {
        "mongodb"
    }

    async fn load(&self, agent_id: &str) -> StoreResult<MainMemory> {
        let doc = self
            .collection
            .find_one(doc! { "_id": agent_id })
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match doc {
            Some(doc) if fresh(&doc, self.ttl) => {
                let payload = doc.get("payload").ok_or_else(|| {
                    StoreError::Serialization("missing payload field".to_string())
                })?;
                from_bson(payload.clone()).map_err(|e| StoreError::Serialization(e.to_string()))
            }
            _ => Ok(MainMemory::new(agent_id)),
        }
    }

    async fn save(&self, memory: &MainMemory) -> StoreResult<()> {
        let mut stored = memory.clone();
        stored.updated_at = Utc::now();
        let payload = to_bson(&stored).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let doc = doc! {
            "_id": &stored.agent_id,
            "updated_at": stored.updated_at.timestamp(),
            "payload": payload,
        };

        self.collection
            .replace_one(doc! { "_id": &stored.agent_id }, doc)
            .upsert(true)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }
}
