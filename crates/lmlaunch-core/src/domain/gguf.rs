//! GGUF header types.
//!
//! Only the header is modelled: metadata key/values and the tensor
//! directory. Reading them lives in `lmlaunch-gguf`.

use std::collections::HashMap;
use std::fmt;

/// A metadata value as stored in a GGUF header.
#[derive(Debug, Clone, PartialEq)]
pub enum GgufValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    Bool(bool),
    String(String),
    Array(Vec<GgufValue>),
    U64(u64),
    I64(i64),
    F64(f64),
}

impl fmt::Display for GgufValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            // Vocabularies run to 100k+ entries
            Self::Array(items) => write!(f, "[{} items]", items.len()),
        }
    }
}

impl GgufValue {
    /// Non-negative integer value, if this is an integer type.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::U8(v) => Some(u64::from(v)),
            Self::U16(v) => Some(u64::from(v)),
            Self::U32(v) => Some(u64::from(v)),
            Self::U64(v) => Some(v),
            Self::I8(v) if v >= 0 => Some(v as u64),
            Self::I16(v) if v >= 0 => Some(v as u64),
            Self::I32(v) if v >= 0 => Some(v as u64),
            Self::I64(v) if v >= 0 => Some(v as u64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Raw metadata key/value map from a GGUF header.
pub type RawMetadata = HashMap<String, GgufValue>;

/// One entry of the GGUF tensor directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GgufTensorInfo {
    pub name: String,
    pub dims: Vec<u64>,
    /// `ggml_type` code.
    pub type_code: u32,
    pub offset: u64,
}

impl GgufTensorInfo {
    /// Storage type name, e.g. `Q4_K`; unknown codes render as `type 42`.
    #[must_use]
    pub fn type_name(&self) -> String {
        ggml_type_name(self.type_code)
            .map_or_else(|| format!("type {}", self.type_code), str::to_string)
    }
}

/// Name of a `ggml_type` code as printed by llama.cpp.
#[must_use]
pub const fn ggml_type_name(code: u32) -> Option<&'static str> {
    Some(match code {
        0 => "F32",
        1 => "F16",
        2 => "Q4_0",
        3 => "Q4_1",
        6 => "Q5_0",
        7 => "Q5_1",
        8 => "Q8_0",
        9 => "Q8_1",
        10 => "Q2_K",
        11 => "Q3_K",
        12 => "Q4_K",
        13 => "Q5_K",
        14 => "Q6_K",
        15 => "Q8_K",
        16 => "IQ2_XXS",
        17 => "IQ2_XS",
        18 => "IQ3_XXS",
        19 => "IQ1_S",
        20 => "IQ4_NL",
        21 => "IQ3_S",
        22 => "IQ2_S",
        23 => "IQ4_XS",
        24 => "I8",
        25 => "I16",
        26 => "I32",
        27 => "I64",
        28 => "F64",
        29 => "IQ1_M",
        30 => "BF16",
        34 => "TQ1_0",
        35 => "TQ2_0",
        39 => "MXFP4",
        _ => return None,
    })
}

/// Parsed GGUF header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GgufHeader {
    pub version: u32,
    pub metadata: RawMetadata,
    pub tensors: Vec<GgufTensorInfo>,
}

impl GgufHeader {
    /// String metadata value by key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(GgufValue::as_str)
    }

    /// Resolve a special token id key (e.g. `tokenizer.ggml.bos_token_id`)
    /// to its text through the `tokenizer.ggml.tokens` vocabulary.
    #[must_use]
    pub fn token_text(&self, id_key: &str) -> Option<String> {
        let id = self.metadata.get(id_key)?.as_u64()?;
        let vocab = self.metadata.get("tokenizer.ggml.tokens")?.as_array()?;
        let index = usize::try_from(id).ok()?;
        vocab.get(index)?.as_str().map(str::to_string)
    }

    /// Total parameter count: sum over tensors of the product of dimensions.
    ///
    /// `None` when the dimensions read from the file overflow a `u64`.
    #[must_use]
    pub fn param_count(&self) -> Option<u64> {
        self.tensors.iter().try_fold(0u64, |total, tensor| {
            let elements = tensor
                .dims
                .iter()
                .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))?;
            total.checked_add(elements)
        })
    }
}
