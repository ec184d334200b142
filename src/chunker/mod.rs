//! Sentence-aware text chunker
//!
//! Splits document text into overlapping token-bounded segments for
//! embedding and retrieval:
//! - Prefers sentence and paragraph boundaries
//! - Hard-cuts only when a single sentence exceeds the target size
//! - Trailing tokens of chunk i reappear at the head of chunk i+1
//!
//! A token is a whitespace-delimited word. Spans are byte offsets into the
//! source text, always on UTF-8 boundaries.

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};

/// Chunker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Target chunk size in tokens
    pub target_tokens: usize,
    /// Tokens of overlap between consecutive chunks
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_tokens: 200,
            overlap_tokens: 20,
        }
    }
}

impl ChunkerConfig {
    /// Validate the configuration: overlap must leave room for progress.
    pub fn validate(&self) -> Result<()> {
        if self.target_tokens == 0 {
            return Err(EngineError::Config(
                "target_tokens must be positive".to_string(),
            ));
        }
        if self.overlap_tokens >= self.target_tokens {
            return Err(EngineError::Config(format!(
                "overlap_tokens ({}) must be smaller than target_tokens ({})",
                self.overlap_tokens, self.target_tokens
            )));
        }
        Ok(())
    }
}

/// One produced segment, ordered by `index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// 0-based position in the output sequence
    pub index: usize,
    /// Byte span [start, end) into the source text
    pub start: usize,
    pub end: usize,
    /// Text payload (source[start..end])
    pub text: String,
}

/// Sentence-aware chunker
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

/// A token with its byte span and whether a sentence ends after it
#[derive(Debug, Clone, Copy)]
struct Token {
    start: usize,
    end: usize,
    sentence_end: bool,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split text into ordered, overlapping, token-bounded chunks.
    ///
    /// Guarantees:
    /// - chunks are non-empty and ordered by index
    /// - consecutive chunks share ~`overlap_tokens` tokens (exact except
    ///   when clamped at the start of the text)
    /// - dropping the first `overlap_tokens` tokens of every chunk after
    ///   the first reconstructs the source token order
    /// - empty or whitespace-only input yields an empty sequence
    pub fn chunk(&self, text: &str) -> Vec<ChunkSpan> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Vec::new();
        }

        let target = self.config.target_tokens;
        let overlap = self.config.overlap_tokens;

        let mut chunks = Vec::new();
        let mut chunk_start = 0usize; // token index

        loop {
            let remaining = tokens.len() - chunk_start;

            if remaining <= target {
                chunks.push(self.make_span(text, &tokens, chunk_start, tokens.len(), chunks.len()));
                break;
            }

            // Prefer the last sentence boundary inside the target window;
            // hard-cut at the window edge when the sentence runs past it.
            let window_end = chunk_start + target;
            let cut = tokens[chunk_start..window_end]
                .iter()
                .rposition(|t| t.sentence_end)
                .map(|rel| chunk_start + rel + 1)
                .filter(|&cut| cut > chunk_start + overlap)
                .unwrap_or(window_end);

            chunks.push(self.make_span(text, &tokens, chunk_start, cut, chunks.len()));

            // Overlap: step back from the cut, clamped so we always advance.
            chunk_start = cut.saturating_sub(overlap).max(chunk_start + 1);
        }

        chunks
    }

    fn make_span(
        &self,
        text: &str,
        tokens: &[Token],
        from: usize,
        to: usize,
        index: usize,
    ) -> ChunkSpan {
        let start = tokens[from].start;
        let end = tokens[to - 1].end;
        ChunkSpan {
            index,
            start,
            end,
            text: text[start..end].to_string(),
        }
    }
}

/// Estimate token count with the chars/4 heuristic.
///
/// Used for context budgeting where the exact whitespace tokenization is
/// not worth computing.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

/// Tokenize into whitespace-delimited words with byte spans.
///
/// A token ends a sentence when it terminates with `.`, `!`, or `?`
/// (optionally followed by closing quotes/brackets) or when the following
/// gap contains a blank line.
fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut start: Option<usize> = None;

    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(Token {
                    start: s,
                    end: i,
                    sentence_end: false,
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(Token {
            start: s,
            end: text.len(),
            sentence_end: false,
        });
    }

    for idx in 0..tokens.len() {
        let word = &text[tokens[idx].start..tokens[idx].end];
        let ends_sentence = word
            .trim_end_matches(|c| matches!(c, '"' | '\'' | ')' | ']'))
            .ends_with(['.', '!', '?']);

        let gap_end = tokens
            .get(idx + 1)
            .map(|t| t.start)
            .unwrap_or_else(|| text.len());
        let gap = &text[tokens[idx].end..gap_end];
        let paragraph_break = gap.matches('\n').count() >= 2;

        tokens[idx].sentence_end = ends_sentence || paragraph_break;
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn words(s: &str) -> Vec<&str> {
        s.split_whitespace().collect()
    }

    #[test]
    fn test_empty_input_empty_output() {
        let chunker = Chunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\t  ").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = Chunker::with_defaults();
        let text = "One small paragraph. Nothing to split here.";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].end, text.len());
    }

    #[test]
    fn test_chunks_ordered_and_nonempty() {
        let chunker = Chunker::new(ChunkerConfig {
            target_tokens: 8,
            overlap_tokens: 2,
        })
        .unwrap();

        let text = "The first sentence is here. The second sentence follows it. \
                    The third sentence is a bit longer than the others. A fourth \
                    one closes the paragraph. And a fifth for good measure.";
        let chunks = chunker.chunk(text);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(!chunk.text.trim().is_empty());
            assert!(chunk.start < chunk.end);
        }
        for pair in chunks.windows(2) {
            assert!(pair[0].start < pair[1].start);
        }
    }

    #[test]
    fn test_overlap_tokens_reappear() {
        let chunker = Chunker::new(ChunkerConfig {
            target_tokens: 10,
            overlap_tokens: 3,
        })
        .unwrap();

        let text = "alpha bravo charlie delta echo foxtrot golf hotel india juliett \
                    kilo lima mike november oscar papa quebec romeo sierra tango \
                    uniform victor whiskey xray yankee zulu";
        let chunks = chunker.chunk(text);
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let prev = words(&pair[0].text);
            let next = words(&pair[1].text);
            let tail = &prev[prev.len() - 3..];
            assert_eq!(tail, &next[..3], "trailing tokens must lead the next chunk");
        }
    }

    #[test]
    fn test_sentence_boundary_preferred() {
        let chunker = Chunker::new(ChunkerConfig {
            target_tokens: 10,
            overlap_tokens: 0,
        })
        .unwrap();

        // First sentence is 6 tokens, second is 6 tokens: the cut should
        // land after the first sentence, not mid-sentence at token 10.
        let text = "one two three four five six. seven eight nine ten eleven twelve.";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.ends_with("six."));
        assert!(chunks[1].text.starts_with("seven"));
    }

    #[test]
    fn test_hard_cut_for_oversized_sentence() {
        let chunker = Chunker::new(ChunkerConfig {
            target_tokens: 5,
            overlap_tokens: 0,
        })
        .unwrap();

        // One 12-token sentence with no internal boundary: must hard-cut.
        let text = "w1 w2 w3 w4 w5 w6 w7 w8 w9 w10 w11 w12";
        let chunks = chunker.chunk(text);

        assert!(chunks.len() >= 2);
        assert_eq!(words(&chunks[0].text).len(), 5);
    }

    #[test]
    fn test_reconstruction_minus_overlap() {
        let chunker = Chunker::new(ChunkerConfig {
            target_tokens: 7,
            overlap_tokens: 2,
        })
        .unwrap();

        let text = "Rust gives you control. It also gives you safety. The borrow \
                    checker enforces both at compile time. Most people learn to \
                    like it eventually. Some take longer than others.";
        let chunks = chunker.chunk(text);

        let mut rebuilt: Vec<&str> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let mut toks = words(&chunk.text);
            if i > 0 {
                toks.drain(..2);
            }
            rebuilt.extend(toks);
        }
        assert_eq!(rebuilt, words(text));
    }

    #[quickcheck]
    fn prop_reconstruction_holds(raw: String) -> bool {
        let chunker = Chunker::new(ChunkerConfig {
            target_tokens: 6,
            overlap_tokens: 2,
        })
        .unwrap();

        let chunks = chunker.chunk(&raw);
        let source_tokens = words(&raw);

        if source_tokens.is_empty() {
            return chunks.is_empty();
        }

        let mut rebuilt: Vec<String> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let toks: Vec<String> = chunk.text.split_whitespace().map(String::from).collect();
            let skip = if i == 0 { 0 } else { 2 };
            rebuilt.extend(toks.into_iter().skip(skip));
        }

        rebuilt == source_tokens
    }

    #[test]
    fn test_config_validation() {
        assert!(Chunker::new(ChunkerConfig {
            target_tokens: 0,
            overlap_tokens: 0,
        })
        .is_err());
        assert!(Chunker::new(ChunkerConfig {
            target_tokens: 5,
            overlap_tokens: 5,
        })
        .is_err());
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        let est = estimate_tokens(&"a".repeat(100));
        assert!(est >= 20 && est <= 30);
    }
}
