//! Artwork uploads from a screen. The uploading screen proves itself with the same
//! session credential used for wallet linking.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::session::Verifier;
use crate::storage::{ObjectStore, RecordStore, ARTWORKS_TABLE};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtworkMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub short_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artwork {
    pub id: String,
    pub screen_id: String,
    pub created_date: DateTime<Utc>,
    pub object_key: String,
    #[serde(flatten)]
    pub metadata: ArtworkMetadata,
}

pub struct ArtworkService {
    verifier: Arc<Verifier>,
    objects: Arc<dyn ObjectStore>,
    records: RecordStore,
    clock: Arc<dyn Clock>,
}

impl ArtworkService {
    pub fn new(verifier: Arc<Verifier>, objects: Arc<dyn ObjectStore>, records: RecordStore, clock: Arc<dyn Clock>) -> Self {
        Self { verifier, objects, records, clock }
    }

    /// Store the image under `<uuid>_<file_name>` and record the artwork row.
    pub fn add_artwork(
        &self,
        screen_id: &str,
        credential: &str,
        file_name: &str,
        bytes: &[u8],
        metadata: ArtworkMetadata,
    ) -> ServiceResult<Artwork> {
        let screen_id = screen_id.trim();
        if screen_id.is_empty() {
            return Err(ServiceError::InvalidRequest("Invalid screen ID".into()));
        }
        self.verifier.verify(screen_id, credential.trim())?.into_result()?;
        if bytes.is_empty() {
            return Err(ServiceError::InvalidRequest("Empty file".into()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let name = if file_name.trim().is_empty() { "upload" } else { file_name.trim() };
        let object_key = self.objects.put(&format!("{}_{}", id, name), bytes)?;
        let artwork = Artwork { id, screen_id: screen_id.to_string(), created_date: self.clock.now(), object_key, metadata };
        self.records.put(ARTWORKS_TABLE, &artwork.id, &artwork)?;
        info!(target: "artwork", screen_id = %screen_id, artwork_id = %artwork.id, size = bytes.len(), "artwork stored");
        Ok(artwork)
    }

    pub fn get(&self, id: &str) -> ServiceResult<Option<Artwork>> { Ok(self.records.get(ARTWORKS_TABLE, id)?) }
}
