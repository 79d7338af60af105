use crate::api::{FewShotDraft, PromptRelay, Upserted};
use console::style;

use super::describe;

pub struct ShotArgs {
    pub id: Option<u64>,
    pub input: String,
    pub output: String,
    pub label: Option<String>,
    pub sort_order: Option<i64>,
    pub active: bool,
}

/// Add or update a few-shot example on the active `(tag, version)` definition.
pub async fn upsert(
    relay: &PromptRelay,
    tag: &str,
    version: u32,
    args: ShotArgs,
) -> Result<(), String> {
    let prompts = relay.prompts();
    let resolved = prompts
        .resolve(tag, version)
        .await
        .map_err(|e| describe(&e))?;

    let draft = FewShotDraft {
        id: args.id,
        definition_id: resolved.definition.id,
        input_text: args.input,
        output_text: args.output,
        label: args.label,
        sort_order: args.sort_order,
        is_active: args.active,
    };
    match prompts
        .upsert_few_shot(tag, version, draft)
        .await
        .map_err(|e| describe(&e))?
    {
        Upserted::Inserted(row) => println!(
            "{} few-shot {} at position {}",
            style("✔ Added").green().bold(),
            row.id,
            row.sort_order
        ),
        Upserted::Updated(row) => println!(
            "{} few-shot {}",
            style("✔ Updated").green().bold(),
            row.id
        ),
    }
    Ok(())
}

/// Soft-delete a few-shot example.
pub async fn deactivate(relay: &PromptRelay, tag: &str, version: u32, id: u64) -> Result<(), String> {
    let row = relay
        .prompts()
        .deactivate_few_shot(id, tag, version)
        .await
        .map_err(|e| describe(&e))?;
    println!("{} few-shot {}", style("✔ Deactivated").green().bold(), row.id);
    Ok(())
}
