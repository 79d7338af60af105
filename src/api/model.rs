//! Prompt definitions, few-shot examples and chat messages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A versioned prompt configuration, unique by `(tag, version)`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PromptDefinition {
    pub id: u64,
    pub tag: String,
    pub version: u32,
    pub persona: String,
    #[serde(default)]
    pub system_guardrails: Option<String>,
    #[serde(default)]
    pub output_guideline: Option<String>,
    #[serde(default)]
    pub llm_config: Map<String, Value>,
    #[serde(default)]
    pub output_schema: Option<Value>,
    pub is_active: bool,
}

/// An input/output pair injected ahead of the caller's prompt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FewShotExample {
    pub id: u64,
    pub definition_id: u64,
    pub input_text: String,
    pub output_text: String,
    #[serde(default)]
    pub label: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
}

/// Fields written by a definition upsert.
#[derive(Clone, Debug, Default)]
pub struct DefinitionDraft {
    pub tag: String,
    pub version: u32,
    pub persona: String,
    pub system_guardrails: Option<String>,
    pub output_guideline: Option<String>,
    pub llm_config: Map<String, Value>,
    pub output_schema: Option<Value>,
    pub is_active: bool,
}

/// Fields written by a few-shot upsert. `id` selects the row to update.
#[derive(Clone, Debug, Default)]
pub struct FewShotDraft {
    pub id: Option<u64>,
    pub definition_id: u64,
    pub input_text: String,
    pub output_text: String,
    pub label: Option<String>,
    pub sort_order: Option<i64>,
    pub is_active: bool,
}

/// Outcome of an insert-or-update write.
#[derive(Clone, Debug, PartialEq)]
pub enum Upserted<T> {
    Inserted(T),
    Updated(T),
}

impl<T> Upserted<T> {
    pub fn into_inner(self) -> T {
        match self {
            Upserted::Inserted(v) | Upserted::Updated(v) => v,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, Upserted::Inserted(_))
    }
}

/// Snapshot returned by the resolver and stored in the cache.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ResolvedPrompt {
    pub definition: PromptDefinition,
    pub few_shots: Vec<FewShotExample>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        })
    }
}

/// One entry of the conversation handed to a provider.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
