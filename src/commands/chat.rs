use crate::api::PromptRelay;
use crate::cli::ChatArgs;
use spinners::{Spinner, Spinners};

use super::{describe, runner};

/// Send a prompt through the configured provider and print the reply.
pub async fn run(relay: &PromptRelay, args: &ChatArgs) -> Result<(), String> {
    let mut sp = Spinner::new(
        Spinners::Dots9,
        format!("Waiting for {} response...", relay.provider_name()),
    );

    match runner(relay, args).send().await {
        Ok(reply) => {
            sp.stop_with_message("✔ Response received.".into());
            println!("\n{}", reply.reply);
            Ok(())
        }
        Err(e) => {
            sp.stop_with_message("✘ Request failed.".into());
            Err(describe(&e))
        }
    }
}
