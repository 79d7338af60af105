use crate::api::{DefinitionDraft, PromptRelay};
use console::style;
use serde_json::{Map, Value};

use super::describe;

pub struct DefineArgs {
    pub tag: String,
    pub version: u32,
    pub persona: String,
    pub guardrails: Option<String>,
    pub guideline: Option<String>,
    pub llm_config: Option<String>,
    pub schema: Option<String>,
    pub active: bool,
}

/// Create or overwrite the definition for `(tag, version)`.
pub async fn run(relay: &PromptRelay, args: DefineArgs) -> Result<(), String> {
    let llm_config = match args.llm_config.as_deref() {
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err("--llm-config must be a JSON object".to_string()),
            Err(e) => return Err(format!("Invalid --llm-config: {}", e)),
        },
        None => Map::new(),
    };
    let output_schema = args
        .schema
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|e| format!("Invalid --schema: {}", e))?;

    let draft = DefinitionDraft {
        tag: args.tag,
        version: args.version,
        persona: args.persona,
        system_guardrails: args.guardrails,
        output_guideline: args.guideline,
        llm_config,
        output_schema,
        is_active: args.active,
    };
    let definition = relay
        .prompts()
        .upsert_definition(draft)
        .await
        .map_err(|e| describe(&e))?;

    println!(
        "{} {} v{} (id {})",
        style("✔ Saved").green().bold(),
        definition.tag,
        definition.version,
        definition.id
    );
    if !definition.is_active {
        println!("{}", style("Definition is inactive and will not resolve.").yellow());
    }
    Ok(())
}
