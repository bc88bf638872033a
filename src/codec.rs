//! Artifact compression codec
//!
//! Artifacts are stored as zlib-wrapped deflate streams of JSON text.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use thiserror::Error;

/// Document returned when a stream decompresses to nothing
pub const EMPTY_DOCUMENT: &str = "{}";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression failed: {0}")]
    Compress(std::io::Error),

    #[error("Decompression failed: {0}")]
    Decompress(std::io::Error),
}

/// Pluggable text <-> bytes codec used for every artifact
pub trait Codec: Send + Sync {
    fn compress(&self, text: &str) -> Result<Vec<u8>, CodecError>;

    /// Inverse of `compress`. An empty payload yields [`EMPTY_DOCUMENT`].
    fn decompress(&self, bytes: &[u8]) -> Result<String, CodecError>;
}

/// Deflate codec backed by flate2
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: Compression,
}

impl DeflateCodec {
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for DeflateCodec {
    fn compress(&self, text: &str) -> Result<Vec<u8>, CodecError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder
            .write_all(text.as_bytes())
            .map_err(CodecError::Compress)?;
        encoder.finish().map_err(CodecError::Compress)
    }

    fn decompress(&self, bytes: &[u8]) -> Result<String, CodecError> {
        if bytes.is_empty() {
            return Ok(EMPTY_DOCUMENT.to_string());
        }

        let mut decoder = ZlibDecoder::new(bytes);
        let mut text = String::new();
        decoder
            .read_to_string(&mut text)
            .map_err(CodecError::Decompress)?;

        if text.is_empty() {
            Ok(EMPTY_DOCUMENT.to_string())
        } else {
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_round_trip_any_text(text in "\\PC{1,512}") {
            let codec = DeflateCodec::new();
            let packed = codec.compress(&text).unwrap();
            prop_assert_eq!(codec.decompress(&packed).unwrap(), text);
        }
    }

    #[test]
    fn test_round_trip_preserves_text() {
        let codec = DeflateCodec::new();
        let text = r#"[{"id":"abc","state":2,"name":"Fund the grants program ✓"}]"#;
        let packed = codec.compress(text).unwrap();
        assert_eq!(codec.decompress(&packed).unwrap(), text);
    }

    #[test]
    fn test_empty_text_decompresses_to_empty_object() {
        let codec = DeflateCodec::new();
        let packed = codec.compress("").unwrap();
        assert_eq!(codec.decompress(&packed).unwrap(), EMPTY_DOCUMENT);
        assert_eq!(codec.decompress(&[]).unwrap(), EMPTY_DOCUMENT);
    }

    #[test]
    fn test_repetitive_json_shrinks() {
        let codec = DeflateCodec::new();
        let text = "{\"voter\":\"x\",\"weight\":1}".repeat(200);
        let packed = codec.compress(&text).unwrap();
        assert!(packed.len() < text.len());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let codec = DeflateCodec::new();
        let err = codec.decompress(b"definitely not zlib").unwrap_err();
        assert!(matches!(err, CodecError::Decompress(_)));
    }
}
