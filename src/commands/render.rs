use crate::api::PromptRelay;
use crate::cli::ChatArgs;
use console::style;

use super::{describe, runner};

/// Print the assembled conversation without contacting the provider.
pub async fn run(relay: &PromptRelay, args: &ChatArgs) -> Result<(), String> {
    let assembled = runner(relay, args)
        .messages()
        .await
        .map_err(|e| describe(&e))?;

    for message in &assembled.messages {
        println!("{}", style(format!("[{}]", message.role)).cyan().bold());
        println!("{}\n", message.content);
    }
    Ok(())
}
