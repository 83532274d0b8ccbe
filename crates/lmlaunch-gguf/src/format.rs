//! GGUF format constants.

/// GGUF magic number (4 bytes): "GGUF".
pub const GGUF_MAGIC: [u8; 4] = *b"GGUF";

/// Oldest and newest header versions this reader understands.
pub const SUPPORTED_VERSIONS: std::ops::RangeInclusive<u32> = 2..=3;

/// Upper bound on a single string's length. Chat templates are the longest
/// strings in practice and stay far below this.
pub const MAX_STRING_LEN: u64 = 16 * 1024 * 1024;

/// Upper bound on array element counts (vocabularies are ~250k entries).
pub const MAX_ARRAY_LEN: u64 = 1 << 24;

/// Upper bound on tensor dimensions.
pub const MAX_DIMS: u32 = 8;
