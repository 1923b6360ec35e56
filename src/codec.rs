//! Decoding of `<data>` payloads into raw 32-bit tile values.
//!
//! A tile layer's data comes in one of three encodings:
//!
//! * plain XML: one `<tile gid=".."/>` child per cell
//! * `csv`: comma separated decimal values
//! * `base64`: little-endian `u32`s, optionally `zlib` or `gzip` compressed
//!
//! Whatever the source, the output is one raw value per cell in row-major order.
//! Flag bits are left intact; see [`crate::gid`] for splitting them off.

use std::io::Read;
use std::str::FromStr;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use flate2::read::{GzDecoder, ZlibDecoder};

use crate::error::DecodeError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The `encoding` attribute of a `<data>` element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Encoding {
    /// No attribute: tiles are `<tile>` child elements
    #[default]
    Xml,
    Csv,
    Base64,
}

impl Encoding {
    /// Parse the attribute value; an absent attribute means [`Encoding::Xml`].
    pub fn from_attr(value: Option<&str>) -> Result<Self, DecodeError> {
        match value {
            None | Some("") => Ok(Encoding::Xml),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for Encoding {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Encoding::Csv),
            "base64" => Ok(Encoding::Base64),
            other => Err(DecodeError::UnknownEncoding(other.to_string())),
        }
    }
}

/// The `compression` attribute of a `<data>` element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Compression {
    #[default]
    None,
    Zlib,
    Gzip,
}

impl Compression {
    /// Parse the attribute value; an absent attribute means [`Compression::None`].
    pub fn from_attr(value: Option<&str>) -> Result<Self, DecodeError> {
        match value {
            None | Some("") => Ok(Compression::None),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for Compression {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zlib" => Ok(Compression::Zlib),
            "gzip" => Ok(Compression::Gzip),
            other => Err(DecodeError::UnknownCompression(other.to_string())),
        }
    }
}

/// Everything needed to decode one layer's tiles, already pulled out of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerData {
    /// `encoding` attribute of `<data>`
    pub encoding: Encoding,
    /// `compression` attribute of `<data>`
    pub compression: Compression,
    /// Text content of the `<data>` element
    pub text: String,
    /// `gid` attributes of `<tile>` children, in document order
    pub tile_gids: Vec<u32>,
}

impl LayerData {
    pub fn csv(text: impl Into<String>) -> Self {
        Self {
            encoding: Encoding::Csv,
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn base64(text: impl Into<String>, compression: Compression) -> Self {
        Self {
            encoding: Encoding::Base64,
            compression,
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn xml(tile_gids: Vec<u32>) -> Self {
        Self {
            tile_gids,
            ..Default::default()
        }
    }
}

/// Decode a layer's data into exactly `expected` raw tile values.
pub fn decode_tile_data(data: &LayerData, expected: usize) -> Result<Vec<u32>, DecodeError> {
    let values = match (data.encoding, data.compression) {
        (Encoding::Xml, Compression::None) => data.tile_gids.clone(),
        (Encoding::Csv, Compression::None) => parse_csv(&data.text)?,
        (Encoding::Xml | Encoding::Csv, _) => return Err(DecodeError::CompressedText),
        (Encoding::Base64, compression) => {
            let bytes = decode_base64(&data.text)?;
            let bytes = decompress(bytes, compression)?;
            bytes_to_u32s(&bytes)?
        }
    };

    if values.len() != expected {
        return Err(DecodeError::LengthMismatch {
            expected,
            actual: values.len(),
        });
    }

    Ok(values)
}

fn parse_csv(text: &str) -> Result<Vec<u32>, DecodeError> {
    let joined: String = text.chars().filter(|c| *c != '\n').collect();
    let joined = joined.trim();
    if joined.is_empty() {
        return Ok(Vec::new());
    }

    joined
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<u32>()
                .map_err(|_| DecodeError::InvalidNumber(token.to_string()))
        })
        .collect()
}

fn decode_base64(text: &str) -> Result<Vec<u8>, DecodeError> {
    // Tiled indents the payload; whitespace is not part of the alphabet
    let compact: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(BASE64_STANDARD.decode(compact)?)
}

fn decompress(bytes: Vec<u8>, compression: Compression) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    match compression {
        Compression::None => return Ok(bytes),
        Compression::Zlib => ZlibDecoder::new(bytes.as_slice())
            .read_to_end(&mut out)
            .map_err(DecodeError::Decompress)?,
        Compression::Gzip => GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut out)
            .map_err(DecodeError::Decompress)?,
    };
    Ok(out)
}

fn bytes_to_u32s(bytes: &[u8]) -> Result<Vec<u32>, DecodeError> {
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::Misaligned(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
