//! Defines the command-line interface structure using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prompt-relay", version, about = "Versioned prompts relayed to LLM backends")]
pub struct Cli {
    /// Base directory for the key, store and config.toml
    #[arg(long, global = true, env = "PROMPT_RELAY_HOME")]
    pub home: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Create or overwrite a prompt definition
    Define {
        #[arg(long)]
        tag: String,
        #[arg(long, default_value_t = 1)]
        version: u32,
        #[arg(long)]
        persona: String,
        #[arg(long)]
        guardrails: Option<String>,
        #[arg(long)]
        guideline: Option<String>,
        #[arg(long = "llm-config", help = "JSON object of backend parameters")]
        llm_config: Option<String>,
        #[arg(long, help = "JSON schema for strict output")]
        schema: Option<String>,
        #[arg(long, help = "Store the definition hidden from resolution")]
        inactive: bool,
    },
    /// Add a few-shot example, or update one by ID
    Shot {
        #[arg(long)]
        tag: String,
        #[arg(long, default_value_t = 1)]
        version: u32,
        #[arg(long, help = "Existing few-shot ID to update")]
        id: Option<u64>,
        #[arg(long)]
        input: String,
        #[arg(long)]
        output: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long = "sort-order", help = "Defaults to after the last example")]
        sort_order: Option<i64>,
        #[arg(long)]
        inactive: bool,
    },
    /// Deactivate a few-shot example
    ShotOff {
        #[arg(long)]
        tag: String,
        #[arg(long, default_value_t = 1)]
        version: u32,
        #[arg(long)]
        id: u64,
    },
    /// Show a definition and its active few-shot examples
    Show {
        #[arg(long)]
        tag: String,
        #[arg(long, default_value_t = 1)]
        version: u32,
    },
    /// Print the messages that would be sent, without calling the provider
    Render(ChatArgs),
    /// Send a prompt and print the reply
    Chat(ChatArgs),
    /// Send a prompt and print the reply as server-sent event frames
    Stream(ChatArgs),
}

#[derive(Args)]
pub struct ChatArgs {
    /// The prompt text
    pub prompt: String,
    /// Prompt definition tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Prompt definition version (1 when omitted)
    #[arg(long)]
    pub version: Option<u32>,
    /// Override the system text
    #[arg(long)]
    pub system: Option<String>,
    /// Variable assignments in key=value format
    #[arg(long = "var")]
    pub vars: Vec<String>,
}
