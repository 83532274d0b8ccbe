//! GGUF header parser implementing `GgufReaderPort`.

use std::io::Read;
use std::path::Path;

use lmlaunch_core::{GgufHeader, GgufParseError, GgufReaderPort, RawMetadata};
use tracing::debug;

use crate::error::GgufResult;
use crate::reader::GgufReader;

/// Reads the metadata and tensor directory of a GGUF file.
///
/// Tensor data is never touched; only the header at the start of the file
/// is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct GgufHeaderParser;

impl GgufHeaderParser {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Parse a header from any byte source.
pub(crate) fn parse_header<R: Read>(reader: &mut GgufReader<R>) -> GgufResult<GgufHeader> {
    reader.read_magic()?;
    let version = reader.read_version()?;
    let tensor_count = reader.read_u64()?;
    let metadata_count = reader.read_u64()?;

    let mut metadata = RawMetadata::new();
    for _ in 0..metadata_count {
        let key = reader.read_string()?;
        let value_type = reader.read_u32()?;
        let value = reader.read_value(value_type)?;
        metadata.insert(key, value);
    }

    let mut tensors = Vec::new();
    for _ in 0..tensor_count {
        tensors.push(reader.read_tensor_info()?);
    }

    Ok(GgufHeader {
        version,
        metadata,
        tensors,
    })
}

impl GgufReaderPort for GgufHeaderParser {
    fn read_header(&self, file_path: &Path) -> Result<GgufHeader, GgufParseError> {
        let mut reader = GgufReader::open(file_path)?;
        let header = parse_header(&mut reader)?;
        debug!(
            path = %file_path.display(),
            version = header.version,
            keys = header.metadata.len(),
            tensors = header.tensors.len(),
            "Read GGUF header"
        );
        Ok(header)
    }
}
