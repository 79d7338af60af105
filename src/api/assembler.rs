//! Turns a resolved prompt and a caller request into chat messages.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

use super::error::AppError;
use super::model::{Message, ResolvedPrompt};
use super::resolver::PromptResolver;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern compiles"));

/// What the caller asked for.
#[derive(Clone, Debug, Default)]
pub struct ChatInput {
    pub prompt: String,
    pub tag: Option<String>,
    pub version: Option<u32>,
    pub system: Option<String>,
    pub vars: HashMap<String, String>,
}

/// Assembled conversation plus the prompt key it was built from.
#[derive(Clone, Debug, PartialEq)]
pub struct Assembled {
    pub messages: Vec<Message>,
    pub tag: Option<String>,
    pub version: Option<u32>,
}

/// Builds message sequences, resolving templates through a resolver.
pub struct MessageAssembler<'a> {
    resolver: &'a PromptResolver,
}

impl<'a> MessageAssembler<'a> {
    pub fn new(resolver: &'a PromptResolver) -> Self {
        Self { resolver }
    }

    /// Resolves the template named by `input.tag` (version 1 when omitted)
    /// and assembles the conversation. Without a tag nothing is resolved.
    pub async fn build(&self, input: &ChatInput) -> Result<Assembled, AppError> {
        match &input.tag {
            Some(tag) => {
                let version = input.version.unwrap_or(1);
                let resolved = self.resolver.resolve(tag, version).await?;
                Ok(Assembled {
                    messages: compose(
                        Some(&resolved),
                        &input.prompt,
                        input.system.as_deref(),
                        &input.vars,
                    ),
                    tag: Some(tag.clone()),
                    version: Some(version),
                })
            }
            None => Ok(Assembled {
                messages: compose(None, &input.prompt, input.system.as_deref(), &input.vars),
                tag: None,
                version: None,
            }),
        }
    }
}

/// Pure message assembly.
///
/// With a template: system text (override, else persona / guardrails /
/// guideline joined by a blank line), then alternating few-shot user and
/// assistant turns, then the prompt with `{key}` placeholders substituted.
/// Without one: optional override system message and the raw prompt.
pub fn compose(
    resolved: Option<&ResolvedPrompt>,
    prompt: &str,
    system_override: Option<&str>,
    vars: &HashMap<String, String>,
) -> Vec<Message> {
    let override_text = system_override.filter(|s| !s.is_empty());
    let mut messages = Vec::new();

    let Some(resolved) = resolved else {
        if let Some(system) = override_text {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));
        return messages;
    };

    let system_text = match override_text {
        Some(system) => system.to_string(),
        None => {
            let def = &resolved.definition;
            [
                Some(def.persona.as_str()),
                def.system_guardrails.as_deref(),
                def.output_guideline.as_deref(),
            ]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
        }
    };
    if !system_text.is_empty() {
        messages.push(Message::system(system_text));
    }

    for shot in &resolved.few_shots {
        messages.push(Message::user(shot.input_text.as_str()));
        messages.push(Message::assistant(shot.output_text.as_str()));
    }

    messages.push(Message::user(render_vars(prompt, vars)));
    messages
}

/// Replaces `{key}` with `vars[key]`; unknown keys stay as written.
///
/// Once any vars are given, `{prompt}` also expands to the raw `text`
/// unless `vars` defines `prompt` itself.
pub fn render_vars(text: &str, vars: &HashMap<String, String>) -> String {
    if vars.is_empty() {
        return text.to_string();
    }
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None if &caps[1] == "prompt" => text.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
