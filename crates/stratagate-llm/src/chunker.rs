//! Splits oversized prompts into provider-sized chunks.
//!
//! Packing is greedy and hierarchical: paragraphs first, then sentences for
//! paragraphs that are too big on their own, then fixed-size character
//! slices for sentences that are still too big. Every size decision goes
//! through [`estimate_tokens`], the same heuristic the rate limiter uses.

use std::sync::LazyLock;

use regex::Regex;

use stratagate_types::config::ChunkingConfig;

use crate::tokens::{CHARS_PER_TOKEN, estimate_tokens};

/// A blank line, possibly containing other whitespace.
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r\f\v]*\n\s*").expect("paragraph pattern is valid"));

/// Characters that end a sentence. Includes the Arabic-script question mark.
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '؟'];

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const SENTENCE_SEPARATOR: &str = " ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    max_tokens_per_chunk: u32,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(1500)
    }
}

impl TextChunker {
    pub fn new(max_tokens_per_chunk: u32) -> Self {
        Self {
            max_tokens_per_chunk: max_tokens_per_chunk.max(1),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.max_tokens_per_chunk)
    }

    pub fn max_tokens_per_chunk(&self) -> u32 {
        self.max_tokens_per_chunk
    }

    /// Whether `text` exceeds the chunk budget.
    pub fn should_chunk(&self, text: &str) -> bool {
        estimate_tokens(text) > self.max_tokens_per_chunk
    }

    fn fits(&self, text: &str) -> bool {
        !self.should_chunk(text)
    }

    /// Split `text` into chunks in reading order.
    ///
    /// Text within budget (including the empty string) comes back as a
    /// single unchanged chunk. Whitespace is only dropped between units.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        if !self.should_chunk(text) {
            return vec![text.to_string()];
        }
        let paragraphs = PARAGRAPH_BREAK
            .split(text)
            .map(str::trim)
            .filter(|p| !p.is_empty());
        self.pack(paragraphs, PARAGRAPH_SEPARATOR, |p| self.split_paragraph(p))
    }

    fn split_paragraph(&self, paragraph: &str) -> Vec<String> {
        let sentences = split_sentences(paragraph);
        self.pack(sentences.into_iter(), SENTENCE_SEPARATOR, |s| {
            self.hard_split(s)
        })
    }

    /// Last resort: slices of `max_tokens_per_chunk * 4` characters.
    fn hard_split(&self, sentence: &str) -> Vec<String> {
        let slice_len = self.max_tokens_per_chunk as usize * CHARS_PER_TOKEN;
        let chars: Vec<char> = sentence.chars().collect();
        chars
            .chunks(slice_len)
            .map(|c| c.iter().collect())
            .collect()
    }

    /// Greedily join `units` with `separator` while the result fits.
    /// A unit that cannot fit even alone is handed to `split_oversized`.
    fn pack<'a>(
        &self,
        units: impl Iterator<Item = &'a str>,
        separator: &str,
        split_oversized: impl Fn(&str) -> Vec<String>,
    ) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for unit in units {
            if !self.fits(unit) {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                chunks.extend(split_oversized(unit));
                continue;
            }

            if current.is_empty() {
                current.push_str(unit);
                continue;
            }

            let candidate_len = current.chars().count()
                + separator.chars().count()
                + unit.chars().count();
            if candidate_len / CHARS_PER_TOKEN <= self.max_tokens_per_chunk as usize {
                current.push_str(separator);
                current.push_str(unit);
            } else {
                chunks.push(std::mem::replace(&mut current, unit.to_string()));
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

/// Split on whitespace that follows a sentence terminator. Terminators stay
/// with their sentence.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut in_break = false;

    for (idx, c) in paragraph.char_indices() {
        if in_break {
            if c.is_whitespace() {
                continue;
            }
            start = idx;
            in_break = false;
        } else if c.is_whitespace() && prev.is_some_and(|p| SENTENCE_TERMINATORS.contains(&p)) {
            let sentence = paragraph[start..idx].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            in_break = true;
        }
        prev = Some(c);
    }

    if !in_break {
        let tail = paragraph[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail);
        }
    }
    sentences
}
