use crate::api::PromptRelay;
use crate::cli::ChatArgs;
use console::style;
use futures::StreamExt;
use std::io::Write;

use super::{describe, runner};

/// Stream the reply as event frames on stdout. Ctrl-C drops the stream,
/// which cancels the upstream request.
pub async fn run(relay: &PromptRelay, args: &ChatArgs) -> Result<(), String> {
    let chat = runner(relay, args)
        .stream()
        .await
        .map_err(|e| describe(&e))?;
    let mut frames = chat.frames();
    let mut out = std::io::stdout();

    loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(frame) => {
                    out.write_all(frame.as_bytes()).map_err(|e| e.to_string())?;
                    out.flush().map_err(|e| e.to_string())?;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("{}", style("Cancelled.").yellow());
                break;
            }
        }
    }
    Ok(())
}
