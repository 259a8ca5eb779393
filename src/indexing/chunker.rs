//! Token-bounded chunking with fixed overlap.
//!
//! Text is split in token space, not bytes: encode once, slide a window of
//! `window` tokens forward by `window - overlap` each step, and decode each
//! slice back to text. Inputs at or under the window pass through as a
//! single unchanged chunk.

use crate::error::ChunkError;

/// Reversible text/token codec used by the chunker.
pub trait TokenCodec: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;
    fn decode(&self, tokens: &[u32]) -> Result<String, ChunkError>;
}

impl<T: TokenCodec + ?Sized> TokenCodec for Box<T> {
    fn encode(&self, text: &str) -> Vec<u32> {
        (**self).encode(text)
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, ChunkError> {
        (**self).decode(tokens)
    }
}

/// BPE codec backed by the `cl100k_base` vocabulary. Decoding is lossy at
/// chunk edges that split a multibyte sequence, same as [`ByteCodec`].
#[cfg(feature = "tokenizer-tiktoken")]
pub struct TiktokenCodec {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tokenizer-tiktoken")]
impl TiktokenCodec {
    pub fn new() -> Result<Self, ChunkError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| ChunkError::TokenDecode(e.to_string()))?;
        Ok(Self { bpe })
    }
}

#[cfg(feature = "tokenizer-tiktoken")]
impl TokenCodec for TiktokenCodec {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, ChunkError> {
        // A window boundary can split a multibyte character, so decode at
        // the byte level and substitute replacement characters at torn
        // edges instead of failing the slice.
        let bytes: Vec<u8> = self
            .bpe
            ._decode_native_and_split(tokens.to_vec())
            .flatten()
            .collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Fallback codec treating each UTF-8 byte as one token. Always available;
/// decode is lossy at chunk edges that split a multibyte sequence.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByteCodec;

impl TokenCodec for ByteCodec {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.bytes().map(u32::from).collect()
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, ChunkError> {
        let bytes: Vec<u8> = tokens.iter().map(|t| *t as u8).collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Best codec available at build time: BPE when the `tokenizer-tiktoken`
/// feature is enabled, bytes otherwise.
pub fn default_codec() -> Box<dyn TokenCodec> {
    #[cfg(feature = "tokenizer-tiktoken")]
    {
        if let Ok(codec) = TiktokenCodec::new() {
            return Box::new(codec);
        }
    }
    Box::new(ByteCodec)
}

/// Sliding-window chunker over a token codec.
pub struct TokenChunker<C: TokenCodec> {
    codec: C,
    window: usize,
    overlap: usize,
}

impl<C: TokenCodec> TokenChunker<C> {
    /// Construct a chunker, rejecting configurations where the window would
    /// never advance.
    pub fn new(codec: C, window: usize, overlap: usize) -> Result<Self, ChunkError> {
        if window == 0 {
            return Err(ChunkError::ZeroWindow);
        }
        if overlap >= window {
            return Err(ChunkError::OverlapTooLarge { window, overlap });
        }
        Ok(Self {
            codec,
            window,
            overlap,
        })
    }

    /// Split `text` into overlapping chunks.
    ///
    /// Empty or whitespace-only input yields no chunks. Consecutive chunks
    /// share exactly `overlap` tokens except possibly the final chunk,
    /// which may be shorter.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>, ChunkError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let tokens = self.codec.encode(text);
        if tokens.len() <= self.window {
            return Ok(vec![text.to_string()]);
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let end = (start + self.window).min(tokens.len());
            chunks.push(self.codec.decode(&tokens[start..end])?);
            if end >= tokens.len() {
                break;
            }
            start = end - self.overlap;
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chunker(window: usize, overlap: usize) -> TokenChunker<ByteCodec> {
        TokenChunker::new(ByteCodec, window, overlap).unwrap()
    }

    #[test]
    fn short_input_passes_through_unchanged() {
        let text = "short text";
        let chunks = chunker(64, 8).chunk(text).unwrap();
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunker(64, 8).chunk("").unwrap().is_empty());
        assert!(chunker(64, 8).chunk("   \n ").unwrap().is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        assert!(matches!(
            TokenChunker::new(ByteCodec, 10, 10),
            Err(ChunkError::OverlapTooLarge { .. })
        ));
        assert!(matches!(
            TokenChunker::new(ByteCodec, 0, 0),
            Err(ChunkError::ZeroWindow)
        ));
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        // 26 ASCII letters, window 10, overlap 3: starts at 0, 7, 14, 21.
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunker(10, 3).chunk(text).unwrap();
        assert_eq!(
            chunks,
            vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxyz"]
        );
        for pair in chunks.windows(2) {
            let tail = &pair[0][pair[0].len() - 3..];
            assert!(pair[1].starts_with(tail));
        }
    }

    #[cfg(feature = "tokenizer-tiktoken")]
    #[test]
    fn multibyte_text_survives_window_boundaries() {
        // 500 emoji encode to well over one window, and the boundaries land
        // mid-character. Every slice must still decode to usable text.
        let codec = TiktokenCodec::new().unwrap();
        let text = "\u{1f916}".repeat(500);
        let chunks = TokenChunker::new(codec, 350, 70).unwrap().chunk(&text).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.contains('\u{1f916}'));
        }
    }

    #[test]
    fn final_chunk_may_be_short() {
        let text = "abcdefghijk"; // 11 tokens, window 10, overlap 3
        let chunks = chunker(10, 3).chunk(text).unwrap();
        assert_eq!(chunks, vec!["abcdefghij", "hijk"]);
    }

    proptest! {
        #[test]
        fn chunks_reconstruct_input(text in "[ -~]{1,500}", window in 4usize..64, overlap in 0usize..4) {
            prop_assume!(overlap < window);
            let chunks = chunker(window, overlap).chunk(&text).unwrap();
            if text.trim().is_empty() {
                prop_assert!(chunks.is_empty());
            } else {
                // Strip each chunk's leading overlap and the concatenation
                // reproduces the original text exactly.
                let mut rebuilt = chunks[0].clone();
                for chunk in &chunks[1..] {
                    rebuilt.push_str(&chunk[overlap.min(chunk.len())..]);
                }
                prop_assert_eq!(rebuilt, text);
            }
        }

        #[test]
        fn no_chunk_exceeds_window(text in "[ -~]{1,500}", window in 4usize..64) {
            let chunks = chunker(window, 2).chunk(&text).unwrap();
            for chunk in chunks {
                prop_assert!(chunk.len() <= window);
            }
        }
    }
}
