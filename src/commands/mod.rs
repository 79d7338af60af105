use crate::api::{AppError, ChatRunner, PromptRelay};
use crate::cli::{ChatArgs, Cmd};
use crate::core::utils::parse_vars;

pub mod chat;
pub mod define;
pub mod render;
pub mod shot;
pub mod show;
pub mod stream;

/// Dispatches the parsed command to the appropriate handler.
pub async fn dispatch(command: Cmd, relay: &PromptRelay) -> Result<(), String> {
    match command {
        Cmd::Define {
            tag,
            version,
            persona,
            guardrails,
            guideline,
            llm_config,
            schema,
            inactive,
        } => {
            define::run(
                relay,
                define::DefineArgs {
                    tag,
                    version,
                    persona,
                    guardrails,
                    guideline,
                    llm_config,
                    schema,
                    active: !inactive,
                },
            )
            .await
        }
        Cmd::Shot {
            tag,
            version,
            id,
            input,
            output,
            label,
            sort_order,
            inactive,
        } => {
            shot::upsert(
                relay,
                &tag,
                version,
                shot::ShotArgs {
                    id,
                    input,
                    output,
                    label,
                    sort_order,
                    active: !inactive,
                },
            )
            .await
        }
        Cmd::ShotOff { tag, version, id } => shot::deactivate(relay, &tag, version, id).await,
        Cmd::Show { tag, version } => show::run(relay, &tag, version).await,
        Cmd::Render(args) => render::run(relay, &args).await,
        Cmd::Chat(args) => chat::run(relay, &args).await,
        Cmd::Stream(args) => stream::run(relay, &args).await,
    }
}

/// Applies the shared chat flags to a runner.
pub(crate) fn runner<'a>(relay: &'a PromptRelay, args: &ChatArgs) -> ChatRunner<'a> {
    let mut runner = relay.chat(args.prompt.as_str()).vars(parse_vars(&args.vars));
    if let Some(tag) = &args.tag {
        runner = runner.tag(tag.as_str());
    }
    if let Some(version) = args.version {
        runner = runner.version(version);
    }
    if let Some(system) = &args.system {
        runner = runner.system(system.as_str());
    }
    runner
}

/// `STATUS CODE: message` followed by the details when there are any.
pub(crate) fn describe(err: &AppError) -> String {
    let mut out = format!("{} {}: {}", err.status(), err.code, err.message);
    if !err.details.is_empty() {
        if let Ok(details) = serde_json::to_string_pretty(&err.details) {
            out.push('\n');
            out.push_str(&details);
        }
    }
    out
}
