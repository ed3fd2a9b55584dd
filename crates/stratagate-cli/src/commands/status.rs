//! `sgate status` -- show configuration status and diagnostics.
//!
//! Shows which config file is active, the rate-limit and retry settings,
//! and for each provider the model in use and whether a usable key was
//! found. With `--detailed`, also shows endpoints, fallback models and the
//! current TPM window.
//!
//! # Example
//!
//! ```text
//! sgate status
//! sgate status --detailed
//! ```

use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};

use stratagate_llm::{CallContext, Gateway, ProviderSpec};
use stratagate_types::config::GatewayConfig;

use super::{CONFIG_ENV, discover_config_path};

/// Arguments for the `sgate status` subcommand.
#[derive(Args)]
pub struct StatusArgs {
    /// Show endpoints, fallback models and TPM usage.
    #[arg(long)]
    pub detailed: bool,
}

/// Run the status command.
pub fn run(
    args: StatusArgs,
    config: &GatewayConfig,
    config_override: Option<&str>,
) -> anyhow::Result<()> {
    println!("sgate status");
    println!("============");
    println!();

    let config_path = config_override
        .map(std::path::PathBuf::from)
        .or_else(discover_config_path);
    match config_path {
        Some(ref path) => println!("Config: {}", path.display()),
        None => {
            println!("Config: not found");
            println!("  Searched: ~/.stratagate/config.json");
            println!("  Set {CONFIG_ENV} env var to override");
            println!();
            println!("Using defaults:");
        }
    }

    let gateway = Gateway::from_config(config)?;
    let manager = gateway.manager(None);

    println!();
    println!("Rate limit:");
    println!("  Max TPM:         {}", config.rate_limit.max_tpm);
    println!("  Acquire timeout: {}s", config.rate_limit.acquire_timeout_secs);
    println!("  429 backoff:     {}s base", config.rate_limit.backoff_base_secs);
    println!("Retry:");
    println!("  Attempts:        {}", config.retry.attempts);
    println!("  Backoff:         {:?}s", config.retry.backoff_schedule_secs);
    println!("Chunking:");
    println!("  Tokens/chunk:    {}", config.chunking.max_tokens_per_chunk);

    let order: Vec<String> = manager.priority_list().iter().map(|id| id.to_string()).collect();
    println!();
    match &config.pinned_provider {
        Some(pin) => println!("Pinned provider: {pin}"),
        None => println!("Priority: {}", order.join(" -> ")),
    }

    println!();
    println!("{}", provider_table(&gateway, args.detailed));

    if !manager.has_available_provider() {
        println!();
        println!("No provider in the priority list has a usable API key.");
    }

    if args.detailed {
        let usage = gateway.rate_limiter().get_current_usage();
        println!();
        println!("TPM window:");
        println!("  Current:   {}", usage.current_tpm);
        println!("  Available: {}", usage.available_tpm);
        println!("  Usage:     {:.1}%", usage.usage_percent);
    }

    println!();
    Ok(())
}

/// One row per registered provider with its key status.
fn provider_table(gateway: &Gateway, detailed: bool) -> Table {
    let ctx = CallContext::new();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    if detailed {
        table.set_header(["PROVIDER", "MODEL", "KEY", "STATUS", "ENDPOINT", "FALLBACK MODELS"]);
    } else {
        table.set_header(["PROVIDER", "MODEL", "KEY", "STATUS"]);
    }

    for id in gateway.registry().ids() {
        let Some(provider) = gateway.registry().get(id) else {
            continue;
        };
        let key = provider
            .api_key(&ctx)
            .filter(|k| !k.is_blank())
            .map(|k| k.masked())
            .unwrap_or_else(|| "-".into());
        let status = provider
            .availability(&ctx)
            .reason(id)
            .unwrap_or_else(|| "ready".into());

        let mut row = vec![
            id.display_name().to_string(),
            provider.model().to_string(),
            key,
            status,
        ];
        if detailed {
            let spec = ProviderSpec::from_config(id, gateway.config());
            row.push(spec.api_base);
            row.push(if spec.fallback_models.is_empty() {
                "-".into()
            } else {
                spec.fallback_models.join(", ")
            });
        }
        table.add_row(row);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_args_defaults() {
        let args = StatusArgs { detailed: false };
        assert!(!args.detailed);
    }

    #[test]
    fn table_masks_configured_keys() {
        let mut config = GatewayConfig::default();
        config.providers.openai.api_key = "sk-live-abcdefghijklmnopqrstuvwxyz".into();
        let gateway = Gateway::from_config(&config).unwrap();

        let rendered = provider_table(&gateway, false).to_string();
        assert!(rendered.contains("OpenAI"));
        assert!(rendered.contains("sk-l"));
        assert!(!rendered.contains("abcdefghijklmnop"));
        assert!(rendered.contains("ready"));
    }

    #[test]
    fn detailed_table_shows_endpoints() {
        let gateway = Gateway::from_config(&GatewayConfig::default()).unwrap();
        let rendered = provider_table(&gateway, true).to_string();
        assert!(rendered.contains("ENDPOINT"));
        assert!(rendered.contains("generativelanguage.googleapis.com"));
    }
}
