//! Error types for map loading, layer decoding and tile resolution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A map or external tileset file does not exist
    #[error("Input file not found: {}", .0.display())]
    InputMissing(PathBuf),

    /// The file exists but could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that failed to read
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// The document is not well-formed XML
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A required element or attribute is missing, or an attribute has the wrong type
    #[error("Malformed map: {0}")]
    Structure(String),

    /// A tile layer's data could not be decoded; no grid is published for it
    #[error("Failed to decode data of layer '{layer}': {source}")]
    Decode {
        /// Name of the layer whose data failed
        layer: String,
        /// What went wrong
        source: DecodeError,
    },

    /// A global tile id could not be turned into a tileset + source rectangle
    #[error("Tile resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// A traversal region extends past the grid
    #[error(
        "Region ({x}, {y}) {width}x{height} lies outside the {grid_width}x{grid_height} grid"
    )]
    OutOfRange {
        /// Region column offset in tiles
        x: u32,
        /// Region row offset in tiles
        y: u32,
        /// Region width in tiles
        width: u32,
        /// Region height in tiles
        height: u32,
        /// Grid width in tiles
        grid_width: u32,
        /// Grid height in tiles
        grid_height: u32,
    },
}

/// Failure while turning a `<data>` payload into raw 32-bit tile values.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid compressed stream: {0}")]
    Decompress(#[source] io::Error),

    #[error("decoded buffer is {0} bytes, not a multiple of 4")]
    Misaligned(usize),

    #[error("invalid tile id '{0}'")]
    InvalidNumber(String),

    #[error("unsupported encoding '{0}'")]
    UnknownEncoding(String),

    #[error("unsupported compression '{0}'")]
    UnknownCompression(String),

    #[error("compression is only valid with base64 encoding")]
    CompressedText,

    #[error("expected {expected} tiles, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Failure while resolving a global tile id against the map's tilesets.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("gid {0} is not covered by any tileset")]
    UnknownGid(u32),

    #[error("tileset '{tileset}' image is {image_width}px wide, narrower than one {tile_width}px tile")]
    ImageTooNarrow {
        tileset: String,
        image_width: u32,
        tile_width: u32,
    },

    #[error("tileset '{tileset}' declares a zero tile size")]
    ZeroTileSize { tileset: String },

    #[error("tile {local_id} of tileset '{tileset}' lies beyond the addressable atlas")]
    RectOverflow { tileset: String, local_id: u32 },
}

impl Error {
    pub(crate) fn structure(msg: impl Into<String>) -> Self {
        Error::Structure(msg.into())
    }
}
