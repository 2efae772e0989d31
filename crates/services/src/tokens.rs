use tiktoken_rs::CoreBPE;

/// Counts tokens in a piece of text for per-chat accounting
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Byte-pair-encoding counter over the GPT-3 `r50k_base` vocabulary
pub struct BpeTokenCounter {
    bpe: CoreBPE,
}

impl BpeTokenCounter {
    /// Loading the vocabulary is expensive; build one counter at start-up and share it.
    pub fn r50k() -> anyhow::Result<Self> {
        Ok(Self {
            bpe: tiktoken_rs::r50k_base()?,
        })
    }
}

impl TokenCounter for BpeTokenCounter {
    /// Special-token strings such as `<|endoftext|>` are counted as plain text
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}
