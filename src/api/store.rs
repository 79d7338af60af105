//! The prompt store contract and its in-memory implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

use super::error::StoreError;
use super::model::{DefinitionDraft, FewShotDraft, FewShotExample, PromptDefinition, Upserted};

/// Durable storage of prompt definitions and their few-shot examples.
///
/// Reads only ever return active rows unless asked otherwise. Writes are
/// upserts: definitions by `(tag, version)`, few-shots by optional id.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Active definition for the natural key, if any.
    async fn find_definition(
        &self,
        tag: &str,
        version: u32,
    ) -> Result<Option<PromptDefinition>, StoreError>;

    /// Few-shots of a definition ordered by `(sort_order, id)`.
    async fn list_few_shots(
        &self,
        definition_id: u64,
        active_only: bool,
    ) -> Result<Vec<FewShotExample>, StoreError>;

    async fn upsert_definition(&self, draft: DefinitionDraft)
        -> Result<PromptDefinition, StoreError>;

    async fn upsert_few_shot(
        &self,
        draft: FewShotDraft,
    ) -> Result<Upserted<FewShotExample>, StoreError>;

    /// Soft-deletes a few-shot row.
    async fn deactivate_few_shot(&self, id: u64) -> Result<FewShotExample, StoreError>;
}

/// Row storage shared by every store backend.
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub(crate) struct StoreTables {
    next_definition_id: u64,
    next_few_shot_id: u64,
    definitions: Vec<PromptDefinition>,
    few_shots: Vec<FewShotExample>,
}

impl StoreTables {
    pub(crate) fn find_active_definition(&self, tag: &str, version: u32) -> Option<PromptDefinition> {
        self.definitions
            .iter()
            .find(|d| d.tag == tag && d.version == version && d.is_active)
            .cloned()
    }

    pub(crate) fn list_few_shots(&self, definition_id: u64, active_only: bool) -> Vec<FewShotExample> {
        let mut rows: Vec<FewShotExample> = self
            .few_shots
            .iter()
            .filter(|s| s.definition_id == definition_id && (!active_only || s.is_active))
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.sort_order, s.id));
        rows
    }

    pub(crate) fn upsert_definition(&mut self, draft: DefinitionDraft) -> PromptDefinition {
        if let Some(existing) = self
            .definitions
            .iter_mut()
            .find(|d| d.tag == draft.tag && d.version == draft.version)
        {
            existing.persona = draft.persona;
            existing.system_guardrails = draft.system_guardrails;
            existing.output_guideline = draft.output_guideline;
            existing.llm_config = draft.llm_config;
            existing.output_schema = draft.output_schema;
            existing.is_active = draft.is_active;
            return existing.clone();
        }

        self.next_definition_id += 1;
        let definition = PromptDefinition {
            id: self.next_definition_id,
            tag: draft.tag,
            version: draft.version,
            persona: draft.persona,
            system_guardrails: draft.system_guardrails,
            output_guideline: draft.output_guideline,
            llm_config: draft.llm_config,
            output_schema: draft.output_schema,
            is_active: draft.is_active,
        };
        self.definitions.push(definition.clone());
        definition
    }

    pub(crate) fn upsert_few_shot(
        &mut self,
        draft: FewShotDraft,
    ) -> Result<Upserted<FewShotExample>, StoreError> {
        if !self.definitions.iter().any(|d| d.id == draft.definition_id) {
            return Err(StoreError::NotFound(format!(
                "Prompt definition {}",
                draft.definition_id
            )));
        }

        if let Some(id) = draft.id {
            if let Some(row) = self.few_shots.iter_mut().find(|s| s.id == id) {
                row.definition_id = draft.definition_id;
                row.input_text = draft.input_text;
                row.output_text = draft.output_text;
                row.label = draft.label;
                if let Some(order) = draft.sort_order {
                    row.sort_order = order;
                }
                row.is_active = draft.is_active;
                return Ok(Upserted::Updated(row.clone()));
            }
        }

        let sort_order = match draft.sort_order {
            Some(order) => order,
            None => self.next_sort_order(draft.definition_id),
        };
        self.next_few_shot_id += 1;
        let row = FewShotExample {
            id: self.next_few_shot_id,
            definition_id: draft.definition_id,
            input_text: draft.input_text,
            output_text: draft.output_text,
            label: draft.label,
            sort_order,
            is_active: draft.is_active,
        };
        self.few_shots.push(row.clone());
        Ok(Upserted::Inserted(row))
    }

    pub(crate) fn deactivate_few_shot(&mut self, id: u64) -> Result<FewShotExample, StoreError> {
        let row = self
            .few_shots
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Few-shot {}", id)))?;
        row.is_active = false;
        Ok(row.clone())
    }

    /// `max(sort_order) + 1` over every row of the definition, active or not.
    fn next_sort_order(&self, definition_id: u64) -> i64 {
        self.few_shots
            .iter()
            .filter(|s| s.definition_id == definition_id)
            .map(|s| s.sort_order)
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// A process-local store, mostly useful for tests and the mock backend.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<StoreTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, StoreTables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Init("store lock poisoned".to_string()))
    }
}

#[async_trait]
impl PromptStore for MemoryStore {
    async fn find_definition(
        &self,
        tag: &str,
        version: u32,
    ) -> Result<Option<PromptDefinition>, StoreError> {
        Ok(self.tables()?.find_active_definition(tag, version))
    }

    async fn list_few_shots(
        &self,
        definition_id: u64,
        active_only: bool,
    ) -> Result<Vec<FewShotExample>, StoreError> {
        Ok(self.tables()?.list_few_shots(definition_id, active_only))
    }

    async fn upsert_definition(
        &self,
        draft: DefinitionDraft,
    ) -> Result<PromptDefinition, StoreError> {
        Ok(self.tables()?.upsert_definition(draft))
    }

    async fn upsert_few_shot(
        &self,
        draft: FewShotDraft,
    ) -> Result<Upserted<FewShotExample>, StoreError> {
        self.tables()?.upsert_few_shot(draft)
    }

    async fn deactivate_few_shot(&self, id: u64) -> Result<FewShotExample, StoreError> {
        self.tables()?.deactivate_few_shot(id)
    }
}
