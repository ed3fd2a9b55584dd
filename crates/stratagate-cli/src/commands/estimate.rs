//! `sgate estimate` -- token estimate for a file.

use std::path::PathBuf;

use clap::Args;

use stratagate_llm::{TextChunker, estimate_tokens};
use stratagate_types::config::GatewayConfig;

use super::read_text_file;

/// Arguments for the `sgate estimate` subcommand.
#[derive(Args)]
pub struct EstimateArgs {
    /// File to estimate.
    pub file: PathBuf,
}

pub fn run(args: EstimateArgs, config: &GatewayConfig) -> anyhow::Result<()> {
    let text = read_text_file(&args.file)?;
    let chunker = TextChunker::from_config(&config.chunking);
    println!("{}", summary(&chunker, &text));
    Ok(())
}

fn summary(chunker: &TextChunker, text: &str) -> String {
    let tokens = estimate_tokens(text);
    let mut out = format!(
        "Characters:       {}\nEstimated tokens: {}\nChunk budget:     {}",
        text.chars().count(),
        tokens,
        chunker.max_tokens_per_chunk()
    );
    if chunker.should_chunk(text) {
        let chunks = chunker.chunk_text(text).len();
        out.push_str(&format!("\nChunks:           {chunks}"));
    } else {
        out.push_str("\nChunks:           1 (fits in one request)");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_chars_and_tokens() {
        let text = "a".repeat(40);
        let out = summary(&TextChunker::new(100), &text);
        assert!(out.contains("Characters:       40"));
        assert!(out.contains("Estimated tokens: 10"));
        assert!(out.contains("fits in one request"));
    }

    #[test]
    fn summary_reports_chunk_count() {
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let out = summary(&TextChunker::new(5), text);
        assert!(out.contains("Chunks:           2"));
    }
}
