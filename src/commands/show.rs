use crate::api::PromptRelay;
use console::style;

use super::describe;

/// Display a resolved definition and its active few-shot examples.
pub async fn run(relay: &PromptRelay, tag: &str, version: u32) -> Result<(), String> {
    let resolved = relay
        .prompts()
        .resolve(tag, version)
        .await
        .map_err(|e| describe(&e))?;
    let def = &resolved.definition;

    println!(
        "{} {} v{} (id {})",
        style("Prompt:").green().bold(),
        def.tag,
        def.version,
        def.id
    );
    println!("{} {}", style("Persona:").green().bold(), def.persona);
    if let Some(guardrails) = &def.system_guardrails {
        println!("{} {}", style("Guardrails:").green().bold(), guardrails);
    }
    if let Some(guideline) = &def.output_guideline {
        println!("{} {}", style("Guideline:").green().bold(), guideline);
    }
    if !def.llm_config.is_empty() {
        let config = serde_json::to_string(&def.llm_config).map_err(|e| e.to_string())?;
        println!("{} {}", style("LLM config:").green().bold(), config);
    }
    if let Some(schema) = &def.output_schema {
        let schema = serde_json::to_string_pretty(schema).map_err(|e| e.to_string())?;
        println!("{}\n{}", style("Output schema:").green().bold(), schema);
    }

    if resolved.few_shots.is_empty() {
        println!("{}", style("No active few-shot examples.").dim());
        return Ok(());
    }
    println!("{}", style("Few-shots:").green().bold());
    for shot in &resolved.few_shots {
        let label = shot.label.as_deref().unwrap_or("-");
        println!(
            "  {} {} {}",
            style(format!("#{}", shot.id)).cyan(),
            style(format!("[{}]", shot.sort_order)).dim(),
            style(label).yellow()
        );
        println!("    in:  {}", shot.input_text);
        println!("    out: {}", shot.output_text);
    }
    Ok(())
}
