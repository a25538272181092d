use super::PriceWriter;
use crate::error::{AppError, AppResult};
use crate::models::PriceUpdate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// One submitted batch as written to the outbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub upload_id: String,
    pub submitted_at: i64,
    pub updates: Vec<PriceUpdate>,
}

/// Price writer that appends each batch as a JSON line for a separate
/// uploader to forward to the marketplace
pub struct OutboxWriter {
    file_handle: Arc<Mutex<std::fs::File>>,
}

impl OutboxWriter {
    pub fn new(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Message(format!("Failed to create outbox directory: {}", e)))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AppError::Message(format!("Failed to open outbox file: {}", e)))?;

        info!("Price outbox initialized: {:?}", path);

        Ok(Self {
            file_handle: Arc::new(Mutex::new(file)),
        })
    }
}

#[async_trait]
impl PriceWriter for OutboxWriter {
    async fn submit_batch(&self, updates: &[PriceUpdate]) -> AppResult<Option<String>> {
        let entry = OutboxEntry {
            upload_id: Uuid::new_v4().to_string(),
            submitted_at: chrono::Utc::now().timestamp(),
            updates: updates.to_vec(),
        };
        let json = serde_json::to_string(&entry)?;

        let mut file = self.file_handle.lock().await;
        writeln!(file, "{}", json)
            .map_err(|e| AppError::ExternalService(format!("Failed to write outbox: {}", e)))?;
        file.flush()
            .map_err(|e| AppError::ExternalService(format!("Failed to flush outbox: {}", e)))?;

        Ok(Some(entry.upload_id))
    }
}
