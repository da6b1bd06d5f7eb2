use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::AppResult;
use crate::types::RoomSnapshot;

/// Key-value abstraction over room codes. Only whole-snapshot replacement is
/// assumed; per-room serialization lives in the engine, not here.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn get(&self, code: &str) -> AppResult<Option<RoomSnapshot>>;
    async fn put(&self, snapshot: RoomSnapshot) -> AppResult<()>;
    async fn delete(&self, code: &str) -> AppResult<()>;
}

/// Default single-process store.
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<String, RoomSnapshot>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn get(&self, code: &str) -> AppResult<Option<RoomSnapshot>> {
        Ok(self.rooms.read().await.get(code).cloned())
    }

    async fn put(&self, snapshot: RoomSnapshot) -> AppResult<()> {
        self.rooms
            .write()
            .await
            .insert(snapshot.code.clone(), snapshot);
        Ok(())
    }

    async fn delete(&self, code: &str) -> AppResult<()> {
        self.rooms.write().await.remove(code);
        Ok(())
    }
}
