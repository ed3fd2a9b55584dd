//! `sgate chunk` -- preview how a file is split into chunks.

use std::path::PathBuf;

use clap::Args;

use stratagate_llm::{TextChunker, estimate_tokens};
use stratagate_types::config::GatewayConfig;

use super::read_text_file;

/// Arguments for the `sgate chunk` subcommand.
#[derive(Args)]
pub struct ChunkArgs {
    /// File to split.
    pub file: PathBuf,

    /// Token budget per chunk (defaults to the configured value).
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

pub fn run(args: ChunkArgs, config: &GatewayConfig) -> anyhow::Result<()> {
    let text = read_text_file(&args.file)?;
    let chunker = match args.max_tokens {
        Some(max) => TextChunker::new(max),
        None => TextChunker::from_config(&config.chunking),
    };
    print!("{}", render_chunks(&chunker, &text));
    Ok(())
}

fn render_chunks(chunker: &TextChunker, text: &str) -> String {
    let chunks = chunker.chunk_text(text);
    let total = chunks.len();
    let mut out = String::new();
    for (index, chunk) in chunks.iter().enumerate() {
        out.push_str(&format!(
            "--- chunk {}/{} (~{} tokens, {} chars) ---\n",
            index + 1,
            total,
            estimate_tokens(chunk),
            chunk.chars().count()
        ));
        out.push_str(chunk);
        out.push('\n');
    }
    out
}
