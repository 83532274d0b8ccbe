//! Little-endian primitive reader for GGUF headers.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use lmlaunch_core::{GgufTensorInfo, GgufValue};

use crate::error::{GgufInternalError, GgufResult};
use crate::format::{GGUF_MAGIC, MAX_ARRAY_LEN, MAX_DIMS, MAX_STRING_LEN, SUPPORTED_VERSIONS};

pub struct GgufReader<R: Read> {
    reader: R,
}

impl GgufReader<BufReader<File>> {
    pub fn open(path: &Path) -> GgufResult<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GgufInternalError::FileNotFound(path.display().to_string())
            } else {
                GgufInternalError::Io(e)
            }
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> GgufReader<R> {
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }

    fn bytes<const N: usize>(&mut self) -> GgufResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_magic(&mut self) -> GgufResult<()> {
        if self.bytes::<4>()? != GGUF_MAGIC {
            return Err(GgufInternalError::InvalidMagic);
        }
        Ok(())
    }

    pub fn read_version(&mut self) -> GgufResult<u32> {
        let version = self.read_u32()?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(GgufInternalError::UnsupportedVersion(version));
        }
        Ok(version)
    }

    pub fn read_u32(&mut self) -> GgufResult<u32> {
        Ok(u32::from_le_bytes(self.bytes()?))
    }

    pub fn read_u64(&mut self) -> GgufResult<u64> {
        Ok(u64::from_le_bytes(self.bytes()?))
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn read_string(&mut self) -> GgufResult<String> {
        let len = self.read_u64()?;
        if len > MAX_STRING_LEN {
            return Err(GgufInternalError::TooLarge {
                what: "string length",
                value: len,
            });
        }
        let mut buf = vec![0u8; len as usize];
        self.reader.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|_| GgufInternalError::Utf8Error)
    }

    /// Read a metadata value of the given type code.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_value(&mut self, value_type: u32) -> GgufResult<GgufValue> {
        Ok(match value_type {
            0 => GgufValue::U8(u8::from_le_bytes(self.bytes()?)),
            1 => GgufValue::I8(i8::from_le_bytes(self.bytes()?)),
            2 => GgufValue::U16(u16::from_le_bytes(self.bytes()?)),
            3 => GgufValue::I16(i16::from_le_bytes(self.bytes()?)),
            4 => GgufValue::U32(self.read_u32()?),
            5 => GgufValue::I32(i32::from_le_bytes(self.bytes()?)),
            6 => GgufValue::F32(f32::from_le_bytes(self.bytes()?)),
            7 => GgufValue::Bool(self.bytes::<1>()?[0] != 0),
            8 => GgufValue::String(self.read_string()?),
            9 => {
                let element_type = self.read_u32()?;
                let count = self.read_u64()?;
                if count > MAX_ARRAY_LEN {
                    return Err(GgufInternalError::TooLarge {
                        what: "array length",
                        value: count,
                    });
                }
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(self.read_value(element_type)?);
                }
                GgufValue::Array(items)
            }
            10 => GgufValue::U64(self.read_u64()?),
            11 => GgufValue::I64(i64::from_le_bytes(self.bytes()?)),
            12 => GgufValue::F64(f64::from_le_bytes(self.bytes()?)),
            _ => return Err(GgufInternalError::InvalidValueType(value_type)),
        })
    }

    /// Read one tensor directory entry.
    pub fn read_tensor_info(&mut self) -> GgufResult<GgufTensorInfo> {
        let name = self.read_string()?;
        let n_dims = self.read_u32()?;
        if n_dims > MAX_DIMS {
            return Err(GgufInternalError::TooLarge {
                what: "dimension count",
                value: u64::from(n_dims),
            });
        }
        let dims = (0..n_dims)
            .map(|_| self.read_u64())
            .collect::<GgufResult<Vec<_>>>()?;
        let type_code = self.read_u32()?;
        let offset = self.read_u64()?;
        Ok(GgufTensorInfo {
            name,
            dims,
            type_code,
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn string_bytes(s: &str) -> Vec<u8> {
        let mut out = (s.len() as u64).to_le_bytes().to_vec();
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn test_read_string() {
        let mut reader = GgufReader::new(Cursor::new(string_bytes("hello")));
        assert_eq!(reader.read_string().unwrap(), "hello");
    }

    #[test]
    fn test_read_magic() {
        assert!(GgufReader::new(Cursor::new(*b"GGUF")).read_magic().is_ok());
        assert!(matches!(
            GgufReader::new(Cursor::new([0u8; 4])).read_magic(),
            Err(GgufInternalError::InvalidMagic)
        ));
    }

    #[test]
    fn test_version_one_is_rejected() {
        let mut reader = GgufReader::new(Cursor::new(1u32.to_le_bytes()));
        assert!(matches!(
            reader.read_version(),
            Err(GgufInternalError::UnsupportedVersion(1))
        ));
    }

    #[test]
    fn test_read_string_array() {
        let mut data = 8u32.to_le_bytes().to_vec();
        data.extend_from_slice(&2u64.to_le_bytes());
        data.extend(string_bytes("<s>"));
        data.extend(string_bytes("</s>"));
        let value = GgufReader::new(Cursor::new(data)).read_value(9).unwrap();
        assert_eq!(
            value,
            GgufValue::Array(vec![
                GgufValue::String("<s>".into()),
                GgufValue::String("</s>".into())
            ])
        );
    }

    #[test]
    fn test_read_tensor_info() {
        let mut data = string_bytes("blk.0.attn_q.weight");
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&4096u64.to_le_bytes());
        data.extend_from_slice(&4096u64.to_le_bytes());
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());

        let info = GgufReader::new(Cursor::new(data)).read_tensor_info().unwrap();
        assert_eq!(info.name, "blk.0.attn_q.weight");
        assert_eq!(info.dims, vec![4096, 4096]);
        assert_eq!(info.type_code, 12);
    }

    #[test]
    fn test_oversized_string_is_rejected() {
        let data = u64::MAX.to_le_bytes();
        assert!(matches!(
            GgufReader::new(Cursor::new(data)).read_string(),
            Err(GgufInternalError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_truncated_input_is_io_error() {
        let mut reader = GgufReader::new(Cursor::new([0x01, 0x02]));
        assert!(matches!(reader.read_u32(), Err(GgufInternalError::Io(_))));
    }
}
