//! Decode Tiled TMX maps into resolved tile grids.
//!
//! This library reads TMX documents and turns every tile layer into a grid of cells,
//! each carrying its global tile id, flip flags and the source rectangle of the tile
//! inside its tileset's atlas image. Tilesets, object groups, image layers and custom
//! properties are exposed alongside. Nothing is rendered and no image is opened.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tmx_grid::Map;
//!
//! let map = Map::load("assets/level1.tmx")?;
//! let ground = map.layer("ground").expect("map has a ground layer");
//!
//! ground.for_each_tile(map.tilesets(), |tile| {
//!     let src = tile.cell.rect.expect("resolved cells have a rectangle");
//!     println!(
//!         "({}, {}) <- '{}' image {} at {}x{}",
//!         tile.column, tile.row, tile.tileset.name, tile.tileset.image.source, src.x, src.y
//!     );
//! })?;
//! # Ok::<(), tmx_grid::Error>(())
//! ```
//!
//! # Partial traversal
//!
//! Renderers usually only need what the camera sees:
//!
//! ```rust,no_run
//! # let map = tmx_grid::Map::load("assets/level1.tmx")?;
//! # let ground = map.layer("ground").unwrap();
//! // camera at (100, 40) showing 320x240 pixels
//! ground.for_each_tile_in_pixels(map.tilesets(), 100, 40, 320, 240, |tile| {
//!     let _ = (tile.column, tile.row, tile.cell.flip);
//! })?;
//! # Ok::<(), tmx_grid::Error>(())
//! ```
//!
//! # Without XML
//!
//! The decode pipeline works on already-extracted values too: build a
//! [`TilesetIndex`], describe the payload with [`LayerData`], and call [`Layer::decode`].

// ============================================================================
// Modules
// ============================================================================

mod codec;
mod error;
pub mod gid;
mod layer;
mod map;
mod object;
mod properties;
mod tileset;
mod xml;

// ============================================================================
// Public API
// ============================================================================

pub use codec::{decode_tile_data, Compression, Encoding, LayerData};
pub use error::{DecodeError, Error, ResolutionError, Result};
pub use gid::{FlipFlags, TileGid};
pub use layer::{Cell, Layer, LayerAttributes, LayerGrid, TileRegion, TileVisit};
pub use map::{Loader, Map, Orientation};
pub use object::{parse_points, ImageLayer, Object, ObjectGroup, Point};
pub use properties::Properties;
pub use tileset::{Image, Rect, Tile, Tileset, TilesetIndex};
