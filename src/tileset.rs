//! Tilesets, their atlas geometry, and the firstgid-ordered index used to resolve gids.

use std::collections::BTreeMap;

use crate::error::{Error, ResolutionError, Result};
use crate::layer::Cell;
use crate::properties::Properties;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pixel rectangle inside a tileset image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rect {
    /// Left edge in pixels
    pub x: u32,
    /// Top edge in pixels
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// An `<image>` reference. Pixels are never loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Image {
    /// Path of the image file, as written or joined with an external tileset's directory
    pub source: String,

    /// Color treated as transparent, e.g. `"FF00FF"`
    pub trans: Option<String>,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,
}

/// Per-tile metadata. Only tiles declared with a `<tile>` element exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tile {
    /// Local id inside the owning tileset
    pub id: u32,

    /// Custom properties of this tile
    pub properties: Properties,
}

/// A tileset whose tiles are cut from a single atlas image.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tileset {
    /// Global id of local tile 0
    pub first_gid: u32,

    /// External `.tsx` file this tileset was read from, if any
    pub source: Option<String>,

    /// Tileset name as given in the document
    pub name: String,

    /// Width of each tile in pixels
    pub tile_width: u32,

    /// Height of each tile in pixels
    pub tile_height: u32,

    /// Pixels between neighbouring tiles in the atlas
    pub spacing: u32,

    /// Pixels between the atlas border and the first tile
    pub margin: u32,

    /// Atlas image the tiles are cut from
    pub image: Image,

    /// Sparse per-tile metadata keyed by local id
    pub tiles: BTreeMap<u32, Tile>,

    /// Custom properties of the tileset
    pub properties: Properties,
}

impl Tileset {
    /// A tileset with no spacing, margin, tile metadata or properties.
    pub fn new(
        first_gid: u32,
        name: impl Into<String>,
        tile_width: u32,
        tile_height: u32,
        image: Image,
    ) -> Self {
        Self {
            first_gid,
            source: None,
            name: name.into(),
            tile_width,
            tile_height,
            spacing: 0,
            margin: 0,
            image,
            tiles: BTreeMap::new(),
            properties: Properties::new(),
        }
    }

    pub fn with_spacing(mut self, spacing: u32) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }

    /// Number of tile columns in the atlas, `floor(image.width / tile_width)`.
    pub fn columns(&self) -> Result<u32, ResolutionError> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(ResolutionError::ZeroTileSize {
                tileset: self.name.clone(),
            });
        }
        match self.image.width / self.tile_width {
            0 => Err(ResolutionError::ImageTooNarrow {
                tileset: self.name.clone(),
                image_width: self.image.width,
                tile_width: self.tile_width,
            }),
            columns => Ok(columns),
        }
    }

    /// Source rectangle of `local_id` in the atlas image.
    pub fn tile_rect(&self, local_id: u32) -> Result<Rect, ResolutionError> {
        let columns = self.columns()?;
        let column = local_id % columns;
        let row = local_id / columns;

        let offset = |tile: u32, index: u32| {
            let pitch = u64::from(tile) + u64::from(self.spacing);
            let px = pitch
                .checked_mul(u64::from(index))?
                .checked_add(u64::from(self.margin))?;
            u32::try_from(px).ok()
        };
        let overflow = || ResolutionError::RectOverflow {
            tileset: self.name.clone(),
            local_id,
        };
        let x = offset(self.tile_width, column).ok_or_else(overflow)?;
        let y = offset(self.tile_height, row).ok_or_else(overflow)?;

        Ok(Rect::new(x, y, self.tile_width, self.tile_height))
    }

    /// Metadata for a local tile id.
    pub fn tile(&self, local_id: u32) -> Option<&Tile> {
        self.tiles.get(&local_id)
    }

    /// Metadata for the tile a resolved cell shows, if this tileset owns it.
    pub fn tile_for_cell(&self, cell: &Cell) -> Option<&Tile> {
        if cell.is_empty() || cell.first_gid != self.first_gid {
            return None;
        }
        cell.gid
            .checked_sub(self.first_gid)
            .and_then(|local_id| self.tile(local_id))
    }

    /// Declared tiles in ascending local id order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }
}

/// The tilesets of a map, kept sorted ascending by `first_gid`.
///
/// Sorting happens on every insert so that [`TilesetIndex::resolve`] can rely on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TilesetIndex {
    tilesets: Vec<Tileset>,
}

impl TilesetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from tilesets in any order.
    pub fn from_tilesets(tilesets: impl IntoIterator<Item = Tileset>) -> Result<Self> {
        let mut index = Self::new();
        for tileset in tilesets {
            index.insert(tileset)?;
        }
        Ok(index)
    }

    /// Add a tileset at its sorted position.
    ///
    /// Fails if `first_gid` is 0 or already taken.
    pub fn insert(&mut self, tileset: Tileset) -> Result<()> {
        if tileset.first_gid == 0 {
            return Err(Error::structure(format!(
                "tileset '{}' has firstgid 0",
                tileset.name
            )));
        }
        match self
            .tilesets
            .binary_search_by_key(&tileset.first_gid, |t| t.first_gid)
        {
            Ok(_) => Err(Error::structure(format!(
                "tileset '{}' reuses firstgid {}",
                tileset.name, tileset.first_gid
            ))),
            Err(pos) => {
                self.tilesets.insert(pos, tileset);
                Ok(())
            }
        }
    }

    /// Owning tileset of `gid` and the tile's local id inside it.
    ///
    /// Picks the tileset with the largest `first_gid <= gid`. `gid` must already have its
    /// flag bits cleared. Returns `None` for gid 0 or when every tileset starts above `gid`.
    pub fn resolve(&self, gid: u32) -> Option<(&Tileset, u32)> {
        if gid == 0 {
            return None;
        }
        // maps rarely carry more than a handful of tilesets
        self.tilesets
            .iter()
            .rev()
            .find(|t| t.first_gid <= gid)
            .map(|t| (t, gid - t.first_gid))
    }

    /// Tileset that starts at exactly `first_gid`.
    pub fn get(&self, first_gid: u32) -> Option<&Tileset> {
        self.tilesets
            .binary_search_by_key(&first_gid, |t| t.first_gid)
            .ok()
            .map(|i| &self.tilesets[i])
    }

    pub fn by_name(&self, name: &str) -> Option<&Tileset> {
        self.tilesets.iter().find(|t| t.name == name)
    }

    /// Tilesets in ascending `first_gid` order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tileset> {
        self.tilesets.iter()
    }

    pub fn len(&self) -> usize {
        self.tilesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tilesets.is_empty()
    }
}

impl<'a> IntoIterator for &'a TilesetIndex {
    type Item = &'a Tileset;
    type IntoIter = std::slice::Iter<'a, Tileset>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gid::FlipFlags;

    fn image(width: u32, height: u32) -> Image {
        Image {
            source: "tiles.png".into(),
            trans: None,
            width,
            height,
        }
    }

    fn tileset(first_gid: u32) -> Tileset {
        Tileset::new(first_gid, format!("ts{first_gid}"), 32, 32, image(320, 320))
    }

    #[test]
    fn rects_follow_atlas_rows() {
        let ts = tileset(1);
        assert_eq!(ts.columns().unwrap(), 10);
        assert_eq!(ts.tile_rect(0).unwrap(), Rect::new(0, 0, 32, 32));
        assert_eq!(ts.tile_rect(9).unwrap(), Rect::new(288, 0, 32, 32));
        assert_eq!(ts.tile_rect(10).unwrap(), Rect::new(0, 32, 32, 32));
    }

    #[test]
    fn rects_account_for_margin_and_spacing() {
        let ts = Tileset::new(1, "spaced", 16, 16, image(100, 100))
            .with_margin(2)
            .with_spacing(1);
        // 100 / 16 = 6 columns
        assert_eq!(ts.tile_rect(0).unwrap(), Rect::new(2, 2, 16, 16));
        assert_eq!(ts.tile_rect(1).unwrap(), Rect::new(19, 2, 16, 16));
        assert_eq!(ts.tile_rect(7).unwrap(), Rect::new(19, 19, 16, 16));
    }

    #[test]
    fn narrow_image_is_an_error() {
        let ts = Tileset::new(1, "tiny", 32, 32, image(16, 64));
        assert_eq!(
            ts.tile_rect(0),
            Err(ResolutionError::ImageTooNarrow {
                tileset: "tiny".into(),
                image_width: 16,
                tile_width: 32,
            })
        );

        let zero = Tileset::new(1, "zero", 0, 32, image(64, 64));
        assert!(matches!(
            zero.columns(),
            Err(ResolutionError::ZeroTileSize { .. })
        ));
    }

    #[test]
    fn resolve_picks_largest_first_gid_not_above() {
        let index =
            TilesetIndex::from_tilesets([tileset(120), tileset(1), tileset(50)]).unwrap();

        assert!(index.resolve(0).is_none());

        let (ts, local) = index.resolve(49).unwrap();
        assert_eq!((ts.first_gid, local), (1, 48));

        let (ts, local) = index.resolve(50).unwrap();
        assert_eq!((ts.first_gid, local), (50, 0));

        let (ts, local) = index.resolve(200).unwrap();
        assert_eq!((ts.first_gid, local), (120, 80));
    }

    #[test]
    fn gid_below_every_tileset_is_unresolved() {
        let index = TilesetIndex::from_tilesets([tileset(10)]).unwrap();
        assert!(index.resolve(9).is_none());
        assert!(index.resolve(10).is_some());
    }

    #[test]
    fn index_stays_sorted_after_inserts() {
        let mut index = TilesetIndex::new();
        for gid in [300, 7, 120, 1, 50] {
            index.insert(tileset(gid)).unwrap();
        }
        let order: Vec<u32> = index.iter().map(|t| t.first_gid).collect();
        assert_eq!(order, vec![1, 7, 50, 120, 300]);
        assert_eq!(index.get(120).map(|t| t.name.as_str()), Some("ts120"));
        assert!(index.get(121).is_none());
    }

    #[test]
    fn duplicate_and_zero_first_gid_are_rejected() {
        let mut index = TilesetIndex::new();
        index.insert(tileset(1)).unwrap();
        assert!(matches!(index.insert(tileset(1)), Err(Error::Structure(_))));
        assert!(matches!(index.insert(tileset(0)), Err(Error::Structure(_))));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn tile_lookup_by_id_and_by_cell() {
        let mut ts = tileset(10);
        let mut properties = Properties::new();
        properties.insert("color", "azul");
        ts.tiles.insert(
            1,
            Tile {
                id: 1,
                properties,
            },
        );

        assert_eq!(ts.tile(1).unwrap().properties.get("color"), Some("azul"));
        assert!(ts.tile(2).is_none());

        let cell = Cell {
            gid: 11,
            flip: FlipFlags::default(),
            first_gid: 10,
            rect: ts.tile_rect(1).ok(),
        };
        assert_eq!(ts.tile_for_cell(&cell).map(|t| t.id), Some(1));

        let foreign = Cell {
            gid: 3,
            first_gid: 1,
            ..cell
        };
        assert!(ts.tile_for_cell(&foreign).is_none());
        assert!(ts.tile_for_cell(&Cell::EMPTY).is_none());
    }

    #[test]
    fn rect_past_u32_is_an_error() {
        // one column, so local id 2^28 sits 2^28 rows down: 16 * 2^28 = 2^32
        let ts = Tileset::new(1, "tall", 16, 16, image(16, 16));
        assert_eq!(
            ts.tile_rect(1 << 28),
            Err(ResolutionError::RectOverflow {
                tileset: "tall".into(),
                local_id: 1 << 28,
            })
        );
        assert_eq!(
            ts.tile_rect((1 << 28) - 1).unwrap().y,
            u32::MAX - 15
        );

        let spaced = Tileset::new(1, "wide", 16, 16, image(u32::MAX, 16)).with_spacing(u32::MAX);
        assert_eq!(spaced.tile_rect(0).unwrap(), Rect::new(0, 0, 16, 16));
        assert!(matches!(
            spaced.tile_rect(1),
            Err(ResolutionError::RectOverflow { local_id: 1, .. })
        ));
    }
}
