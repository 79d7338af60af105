//! Encrypted on-disk prompt store.
//!
//! The whole table set lives in one sealed JSON snapshot. Every write
//! reloads the snapshot under the lock, applies the change and replaces the
//! file atomically, so writers in other processes are not overwritten with
//! a stale copy.

use aes_gcm::Aes256Gcm;
use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::StoreError;
use super::model::{DefinitionDraft, FewShotDraft, FewShotExample, PromptDefinition, Upserted};
use super::store::{PromptStore, StoreTables};
use crate::core::storage::{open, seal};

pub struct FileStore {
    path: PathBuf,
    cipher: Aes256Gcm,
    tables: Mutex<StoreTables>,
}

impl FileStore {
    /// Opens the snapshot at `path`, starting empty when it does not exist.
    pub async fn open(path: impl AsRef<Path>, cipher: Aes256Gcm) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let tables = load(&path, &cipher)?;
        debug!(path = %path.display(), "opened prompt store");

        Ok(Self {
            path,
            cipher,
            tables: Mutex::new(tables),
        })
    }

    /// Applies `change` to the current on-disk tables and persists the
    /// result. Memory is only updated once the new snapshot is in place.
    async fn write<T>(
        &self,
        change: impl FnOnce(&mut StoreTables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut next = load(&self.path, &self.cipher)?;
        let out = change(&mut next)?;
        self.persist(&next)?;
        *tables = next;
        Ok(out)
    }

    fn persist(&self, tables: &StoreTables) -> Result<(), StoreError> {
        let json = serde_json::to_vec(tables)?;
        let encoded = seal(&self.cipher, &json).map_err(StoreError::Crypto)?;
        write_atomic(&self.path, encoded.as_bytes())
    }
}

fn load(path: &Path, cipher: &Aes256Gcm) -> Result<StoreTables, StoreError> {
    if !path.exists() {
        return Ok(StoreTables::default());
    }
    let encoded = fs::read_to_string(path)?;
    let plaintext = open(cipher, &encoded).map_err(StoreError::Crypto)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Writes through a synced temp file in the same directory, then renames it
/// over `path`. The temp file is created 0600.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::Init(format!("{} has no parent directory", path.display())))?;
    let mut temp = Builder::new().prefix(".store").tempfile_in(parent)?;
    temp.write_all(contents)?;
    temp.as_file_mut().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl PromptStore for FileStore {
    async fn find_definition(
        &self,
        tag: &str,
        version: u32,
    ) -> Result<Option<PromptDefinition>, StoreError> {
        Ok(self.tables.lock().await.find_active_definition(tag, version))
    }

    async fn list_few_shots(
        &self,
        definition_id: u64,
        active_only: bool,
    ) -> Result<Vec<FewShotExample>, StoreError> {
        Ok(self.tables.lock().await.list_few_shots(definition_id, active_only))
    }

    async fn upsert_definition(
        &self,
        draft: DefinitionDraft,
    ) -> Result<PromptDefinition, StoreError> {
        self.write(|tables| Ok(tables.upsert_definition(draft))).await
    }

    async fn upsert_few_shot(
        &self,
        draft: FewShotDraft,
    ) -> Result<Upserted<FewShotExample>, StoreError> {
        self.write(|tables| tables.upsert_few_shot(draft)).await
    }

    async fn deactivate_few_shot(&self, id: u64) -> Result<FewShotExample, StoreError> {
        self.write(|tables| tables.deactivate_few_shot(id)).await
    }
}
