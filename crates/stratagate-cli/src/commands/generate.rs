//! `sgate generate` -- send a prompt through the provider fallback chain.
//!
//! Prints the generated text on success, followed by a token usage line on
//! stderr. On failure, prints the error and a table of every attempt made,
//! then exits non-zero. Ctrl-C cancels any backoff or rate-limit wait in
//! progress.
//!
//! # Example
//!
//! ```text
//! sgate generate "Summarise the attached report" --json
//! sgate generate --file report.txt --chunk --caller user-42
//! ```

use std::path::PathBuf;

use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use stratagate_llm::Gateway;
use stratagate_types::config::GatewayConfig;
use stratagate_types::{GenerationConfig, ProviderAttempt, ProviderResult, RequestMetadata};

use super::read_text_file;

/// Arguments for the `sgate generate` subcommand.
#[derive(Args)]
pub struct GenerateArgs {
    /// Prompt text. Read from `--file` when omitted.
    pub prompt: Option<String>,

    /// Read the prompt from this file.
    #[arg(short, long, conflicts_with = "prompt")]
    pub file: Option<PathBuf>,

    /// Caller identity used for key resolution.
    #[arg(long)]
    pub caller: Option<String>,

    /// Sampling temperature.
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f64,

    /// Maximum output tokens.
    #[arg(long, default_value_t = 4096)]
    pub max_tokens: u32,

    /// Ask the provider for a JSON response.
    #[arg(long)]
    pub json: bool,

    /// Override the system prompt.
    #[arg(long)]
    pub system: Option<String>,

    /// Split oversized prompts and generate each chunk in turn.
    #[arg(long)]
    pub chunk: bool,
}

impl GenerateArgs {
    fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_tokens,
            response_mime_type: self.json.then(|| "application/json".to_string()),
        }
    }

    fn metadata(&self) -> Option<RequestMetadata> {
        self.system.as_ref().map(|system| RequestMetadata {
            system_prompt: Some(system.clone()),
            ..Default::default()
        })
    }

    fn prompt_text(&self) -> anyhow::Result<String> {
        match (&self.prompt, &self.file) {
            (Some(prompt), _) => Ok(prompt.clone()),
            (None, Some(path)) => read_text_file(path),
            (None, None) => anyhow::bail!("provide a prompt or --file"),
        }
    }
}

/// Run the generate command.
pub async fn run(args: GenerateArgs, config: &GatewayConfig) -> anyhow::Result<()> {
    let prompt = args.prompt_text()?;
    if prompt.trim().is_empty() {
        anyhow::bail!("prompt is empty");
    }

    let gateway = Gateway::from_config(config)?;
    let generation = args.generation_config();
    let metadata = args.metadata();
    let caller = args.caller.as_deref();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling request");
            on_interrupt.cancel();
        }
    });

    let results = if args.chunk {
        gateway
            .generate_chunked(caller, &prompt, &generation, metadata.as_ref(), &cancel)
            .await
    } else {
        let manager = gateway.manager(caller);
        vec![
            manager
                .generate_with_cancel(&prompt, &generation, metadata.as_ref(), &cancel)
                .await,
        ]
    };

    let total = results.len();
    for (index, result) in results.iter().enumerate() {
        if total > 1 {
            println!("--- chunk {}/{} ---", index + 1, total);
        }
        if result.success {
            println!("{}", result.text);
        } else {
            print_failure(result);
            anyhow::bail!("generation failed");
        }
    }
    eprintln!("{}", usage_line(&gateway));
    Ok(())
}

/// Running totals of the gateway's token monitor.
fn usage_line(gateway: &Gateway) -> String {
    let monitor = gateway.token_monitor();
    let requests = monitor.request_count();
    format!(
        "usage: {} tokens over {} request{}",
        monitor.total_tokens(),
        requests,
        if requests == 1 { "" } else { "s" }
    )
}

fn print_failure(result: &ProviderResult) {
    eprintln!(
        "error: {}",
        result.error.as_deref().unwrap_or("generation failed")
    );
    if !result.attempts.is_empty() {
        eprintln!("{}", attempts_table(&result.attempts));
    }
}

/// Render attempts as a table, one row per attempt.
fn attempts_table(attempts: &[ProviderAttempt]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["#", "PROVIDER", "OK", "STATUS", "LATENCY", "TOKENS", "ERROR"]);
    for (index, attempt) in attempts.iter().enumerate() {
        table.add_row([
            (index + 1).to_string(),
            attempt.provider.to_string(),
            if attempt.success { "yes" } else { "no" }.to_string(),
            attempt
                .status_code
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".into()),
            attempt
                .latency_ms
                .map(|ms| format!("{ms:.0} ms"))
                .unwrap_or_else(|| "-".into()),
            attempt
                .tokens_used
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".into()),
            attempt.error.clone().unwrap_or_default(),
        ]);
    }
    table
}
