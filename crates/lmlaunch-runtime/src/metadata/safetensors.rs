//! Safetensors header reading and EXL2/EXL3 tensor repacking.
//!
//! A safetensors file starts with a little-endian `u64` header length
//! followed by a JSON object mapping tensor names to
//! `{dtype, shape, data_offsets}`, plus an optional `__metadata__` entry.
//! Tensor data is never read.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::LazyLock;

use lmlaunch_core::TensorRow;
use regex::Regex;
use serde::Deserialize;

use super::MetadataError;

/// Headers larger than this are rejected.
const MAX_HEADER_LEN: u64 = 100 * 1024 * 1024;

static QUANT_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*)\.(q_[a-z]+|suh|svh|trellis)$").expect("quantized part pattern is valid")
});

static TYPE_BITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("type size pattern is valid"));

/// One tensor entry of a safetensors header.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SafetensorsTensor {
    pub dtype: String,
    pub shape: Vec<u64>,
}

/// Tensor entries of one file, by name.
pub fn read_safetensors_header(
    path: &Path,
) -> Result<BTreeMap<String, SafetensorsTensor>, MetadataError> {
    let invalid = |reason: String| MetadataError::Safetensors {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| MetadataError::io(path, e))?;
    let mut reader = BufReader::new(file);

    let mut len_bytes = [0u8; 8];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| MetadataError::io(path, e))?;
    let len = u64::from_le_bytes(len_bytes);
    if len > MAX_HEADER_LEN {
        return Err(invalid(format!("header length {len} exceeds limit")));
    }

    let mut json = Vec::new();
    reader
        .take(len)
        .read_to_end(&mut json)
        .map_err(|e| MetadataError::io(path, e))?;
    if json.len() as u64 != len {
        return Err(invalid("truncated header".to_string()));
    }

    let entries: BTreeMap<String, serde_json::Value> =
        serde_json::from_slice(&json).map_err(|e| invalid(e.to_string()))?;

    entries
        .into_iter()
        .filter(|(name, _)| name != "__metadata__")
        .map(|(name, value)| {
            serde_json::from_value(value)
                .map(|tensor| (name.clone(), tensor))
                .map_err(|e| invalid(format!("{name}: {e}")))
        })
        .collect()
}

/// Bit width encoded in a dtype name: `I32` -> 32, `BF16` -> 16.
fn type_bits(dtype: &str) -> Option<u64> {
    TYPE_BITS.find(dtype)?.as_str().parse().ok()
}

enum Slot {
    Plain(SafetensorsTensor),
    Quantized(HashMap<String, SafetensorsTensor>),
}

/// Turn a tensor map into table rows, folding the sub-tensors of each
/// EXL2 (`q_invperm`, `q_weight`, ...) or EXL3 (`suh`, `svh`, `trellis`)
/// layer into one row typed by its bits per weight.
///
/// A quantized layer whose parts are incomplete is shown as `quantized`
/// with no dimensions.
#[must_use]
pub fn repack_quantized(tensors: BTreeMap<String, SafetensorsTensor>) -> Vec<TensorRow> {
    let mut slots: BTreeMap<String, Slot> = BTreeMap::new();

    for (name, tensor) in tensors {
        match QUANT_PART.captures(&name) {
            Some(caps) => {
                let slot = slots
                    .entry(caps[1].to_string())
                    .or_insert_with(|| Slot::Quantized(HashMap::new()));
                if let Slot::Quantized(parts) = slot {
                    parts.insert(caps[2].to_string(), tensor);
                }
            }
            None => {
                slots.insert(name, Slot::Plain(tensor));
            }
        }
    }

    slots
        .into_iter()
        .map(|(name, slot)| match slot {
            Slot::Plain(t) => TensorRow {
                name,
                kind: t.dtype,
                dims: t.shape,
            },
            Slot::Quantized(parts) => repack_layer(name, &parts),
        })
        .collect()
}

fn repack_layer(name: String, parts: &HashMap<String, SafetensorsTensor>) -> TensorRow {
    let exl2 = parts.get("q_invperm").zip(parts.get("q_weight"));
    let exl3 = match (parts.get("suh"), parts.get("svh"), parts.get("trellis")) {
        (Some(suh), Some(svh), Some(trellis)) => Some((suh, svh, trellis)),
        _ => None,
    };

    let packed = if let Some((invperm, weight)) = exl2 {
        invperm.shape.first().map(|&rows| {
            let mut dims = weight.shape.clone();
            if let Some(first) = dims.first_mut() {
                *first = rows;
            }
            (dims, weight)
        })
    } else if let Some((suh, svh, trellis)) = exl3 {
        suh.shape
            .first()
            .zip(svh.shape.first())
            .map(|(&rows, &cols)| (vec![rows, cols], trellis))
    } else {
        None
    };

    let Some((dims, storage)) = packed else {
        return TensorRow {
            name,
            kind: "quantized".to_string(),
            dims: Vec::new(),
        };
    };

    let kind = bits_per_weight(storage, &dims).map_or_else(
        || "quantized".to_string(),
        |bpw| format!("{bpw:.1}bpw"),
    );
    TensorRow { name, kind, dims }
}

#[allow(clippy::cast_precision_loss)]
fn bits_per_weight(storage: &SafetensorsTensor, dims: &[u64]) -> Option<f64> {
    let params: u64 = dims.iter().product();
    if params == 0 {
        return None;
    }
    let stored: u64 = storage.shape.iter().product();
    let bits = type_bits(&storage.dtype)? * stored;
    Some(bits as f64 / params as f64)
}
