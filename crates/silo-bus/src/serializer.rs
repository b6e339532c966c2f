//! # Serializer
//!
//! The codec capability every actor carries. Objects go through `serde` in one
//! of two formats; text frames (addresses, message types, type tags) use the
//! configured character encoding.

use crate::error::CodecError;
use crate::message::{
    Arg, MethodHandle, BOOL_TAG, BYTES_TAG, FLOAT_TAG, INT_TAG, TEXT_TAG,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Object encoding used for payload and value frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Bincode,
}

/// Character encoding used for text frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Serializer {
    format: Format,
    text: TextEncoding,
}

impl Serializer {
    pub fn new(format: Format, text: TextEncoding) -> Self {
        Self { format, text }
    }

    pub fn json() -> Self {
        Self::new(Format::Json, TextEncoding::Utf8)
    }

    pub fn bincode() -> Self {
        Self::new(Format::Bincode, TextEncoding::Utf8)
    }

    pub fn with_text_encoding(mut self, text: TextEncoding) -> Self {
        self.text = text;
        self
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn text_encoding(&self) -> TextEncoding {
        self.text
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes, CodecError> {
        let raw = match self.format {
            Format::Json => serde_json::to_vec(value)?,
            Format::Bincode => bincode::serialize(value)?,
        };
        Ok(Bytes::from(raw))
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        match self.format {
            Format::Json => Ok(serde_json::from_slice(bytes)?),
            Format::Bincode => Ok(bincode::deserialize(bytes)?),
        }
    }

    pub fn encode_string(&self, text: &str) -> Bytes {
        match self.text {
            TextEncoding::Utf8 => Bytes::copy_from_slice(text.as_bytes()),
            TextEncoding::Utf16Le => text
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect::<Vec<u8>>()
                .into(),
        }
    }

    pub fn decode_string(&self, bytes: &[u8]) -> Result<String, CodecError> {
        match self.text {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| CodecError::InvalidText(e.to_string())),
            TextEncoding::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(CodecError::InvalidText(format!(
                        "odd UTF-16 byte length {}",
                        bytes.len()
                    )));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|e| CodecError::InvalidText(e.to_string()))
            }
        }
    }

    pub fn encode_method_handle(&self, handle: &MethodHandle) -> Result<Bytes, CodecError> {
        self.encode(handle)
    }

    pub fn decode_method_handle(&self, bytes: &[u8]) -> Result<MethodHandle, CodecError> {
        self.decode(bytes)
    }

    /// Encodes an argument as its `(type tag, value)` frame pair.
    pub fn encode_arg(&self, arg: &Arg) -> Result<(Bytes, Bytes), CodecError> {
        let tag = self.encode_string(arg.type_tag());
        let value = match arg {
            Arg::Bool(v) => self.encode(v)?,
            Arg::Int(v) => self.encode(v)?,
            Arg::Float(v) => self.encode(v)?,
            Arg::Text(v) => self.encode(v)?,
            Arg::Bytes(v) => v.clone(),
            Arg::Record { data, .. } => data.clone(),
        };
        Ok((tag, value))
    }

    /// Decodes a value frame using the type tag that preceded it.
    ///
    /// Tags that are not primitive are records; their bytes are kept as-is and
    /// decoded later by whoever knows the concrete type.
    pub fn decode_tagged(&self, tag: &str, bytes: &[u8]) -> Result<Arg, CodecError> {
        Ok(match tag {
            BOOL_TAG => Arg::Bool(self.decode(bytes)?),
            INT_TAG => Arg::Int(self.decode(bytes)?),
            FLOAT_TAG => Arg::Float(self.decode(bytes)?),
            TEXT_TAG => Arg::Text(self.decode(bytes)?),
            BYTES_TAG => Arg::Bytes(Bytes::copy_from_slice(bytes)),
            _ => Arg::Record {
                tag: tag.to_string(),
                data: Bytes::copy_from_slice(bytes),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Customer {
        firstname: String,
        lastname: String,
    }

    #[test]
    fn test_object_round_trip_both_formats() {
        let customer = Customer {
            firstname: "John".into(),
            lastname: "Wilson".into(),
        };
        for serializer in [Serializer::json(), Serializer::bincode()] {
            let bytes = serializer.encode(&customer).unwrap();
            let back: Customer = serializer.decode(&bytes).unwrap();
            assert_eq!(back, customer);
        }
    }

    #[test]
    fn test_utf16_text_encoding() {
        let serializer = Serializer::json().with_text_encoding(TextEncoding::Utf16Le);
        let bytes = serializer.encode_string("héllo");
        assert_eq!(bytes.len(), 10);
        assert_eq!(serializer.decode_string(&bytes).unwrap(), "héllo");

        let err = serializer.decode_string(&[0x68]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidText(_)));
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let err = Serializer::json().decode_string(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidText(_)));
    }

    #[test]
    fn test_tagged_values() {
        let serializer = Serializer::bincode();
        let args = vec![
            Arg::Bool(true),
            Arg::Int(-42),
            Arg::Float(2.5),
            Arg::Text("abc".into()),
            Arg::Bytes(Bytes::from_static(b"\x00\x01")),
            Arg::Record {
                tag: "Customer".into(),
                data: Bytes::from_static(b"opaque"),
            },
        ];
        for arg in args {
            let (tag, value) = serializer.encode_arg(&arg).unwrap();
            let tag = serializer.decode_string(&tag).unwrap();
            assert_eq!(serializer.decode_tagged(&tag, &value).unwrap(), arg);
        }
    }

    #[test]
    fn test_method_handle_round_trip() {
        let serializer = Serializer::json();
        let handle = MethodHandle::new("CustomerStore", "save");
        let bytes = serializer.encode_method_handle(&handle).unwrap();
        assert_eq!(serializer.decode_method_handle(&bytes).unwrap(), handle);
    }
}
