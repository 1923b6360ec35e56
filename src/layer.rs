//! Tile layers: decoded, resolved grids of cells and the traversals over them.

use crate::codec::{decode_tile_data, LayerData};
use crate::error::{Error, ResolutionError, Result};
use crate::gid::{FlipFlags, TileGid};
use crate::properties::Properties;
use crate::tileset::{Rect, Tileset, TilesetIndex};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One resolved grid position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cell {
    /// Global tile id with flag bits cleared; 0 for an empty cell
    pub gid: u32,

    /// Mirroring and rotation applied when drawing the tile
    pub flip: FlipFlags,

    /// `first_gid` of the owning tileset; 0 for an empty cell
    pub first_gid: u32,

    /// Source rectangle in the owning tileset's image; `None` for empty cells
    pub rect: Option<Rect>,
}

impl Cell {
    pub const EMPTY: Cell = Cell {
        gid: 0,
        flip: TileGid::EMPTY.flip,
        first_gid: 0,
        rect: None,
    };

    /// Split a raw tile value and resolve it to a source rectangle.
    ///
    /// Gid 0 yields an empty cell without consulting `tilesets`.
    pub fn resolve(raw: u32, tilesets: &TilesetIndex) -> Result<Cell, ResolutionError> {
        let TileGid { gid, flip } = TileGid::from_raw(raw);
        if gid == 0 {
            return Ok(Cell {
                flip,
                ..Cell::EMPTY
            });
        }

        let (tileset, local_id) = tilesets
            .resolve(gid)
            .ok_or(ResolutionError::UnknownGid(gid))?;

        Ok(Cell {
            gid,
            flip,
            first_gid: tileset.first_gid,
            rect: Some(tileset.tile_rect(local_id)?),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.gid == 0
    }

    pub fn tile_gid(&self) -> TileGid {
        TileGid {
            gid: self.gid,
            flip: self.flip,
        }
    }
}

/// Rectangle of a grid in tile units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TileRegion {
    /// First column
    pub x: u32,
    /// First row
    pub y: u32,
    /// Number of columns
    pub width: u32,
    /// Number of rows
    pub height: u32,
}

impl TileRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest tile region covering a pixel rectangle.
    ///
    /// The start is rounded down and the end up, so a span that touches a tile at all
    /// includes it.
    pub fn from_pixels(
        px: u32,
        py: u32,
        pw: u32,
        ph: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self> {
        if tile_width == 0 || tile_height == 0 {
            return Err(Error::structure("tile size is zero"));
        }
        let (x0, x1) = cover(px, pw, tile_width);
        let (y0, y1) = cover(py, ph, tile_height);
        Ok(Self::new(x0, y0, x1 - x0, y1 - y0))
    }
}

fn cover(start: u32, len: u32, tile: u32) -> (u32, u32) {
    let first = start / tile;
    if len == 0 {
        return (first, first);
    }
    let end = (u64::from(start) + u64::from(len)).div_ceil(u64::from(tile));
    // an end past u32::MAX is out of range for any grid
    (first, u32::try_from(end).unwrap_or(u32::MAX))
}

/// A non-empty cell handed to traversal callbacks.
#[derive(Debug, Clone, Copy)]
pub struct TileVisit<'a> {
    /// Grid column of the cell
    pub column: u32,

    /// Grid row of the cell
    pub row: u32,

    /// Tileset owning the cell's gid
    pub tileset: &'a Tileset,

    /// Cell's tile id inside `tileset`
    pub local_id: u32,

    /// The resolved cell itself
    pub cell: &'a Cell,
}

/// `width * height` resolved cells in row-major order.
///
/// Immutable once built; read it through the traversal methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerGrid {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    cells: Vec<Cell>,
}

impl LayerGrid {
    /// Resolve `width * height` raw tile values, row 0 first.
    pub fn from_raw(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        raw: &[u32],
        tilesets: &TilesetIndex,
    ) -> Result<Self> {
        let expected = width as usize * height as usize;
        if raw.len() != expected {
            return Err(Error::structure(format!(
                "grid of {width}x{height} needs {expected} tiles, got {}",
                raw.len()
            )));
        }

        let cells = raw
            .iter()
            .map(|&value| Cell::resolve(value, tilesets))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
            cells,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells that show a tile.
    pub fn tile_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }

    /// Every non-empty cell in row-major order.
    ///
    /// A cell whose tileset is missing from `tilesets` yields an error item.
    pub fn tiles<'a>(
        &'a self,
        tilesets: &'a TilesetIndex,
    ) -> impl Iterator<Item = Result<TileVisit<'a>, ResolutionError>> + 'a {
        self.region_cells(self.bounds())
            .filter_map(move |(column, row, cell)| visit(column, row, cell, tilesets).transpose())
    }

    /// Visit every non-empty cell in row-major order.
    ///
    /// `tilesets` must hold every tileset the grid was resolved against; otherwise
    /// nothing is visited and the missing gid is reported.
    pub fn for_each_tile<'a>(
        &'a self,
        tilesets: &'a TilesetIndex,
        f: impl FnMut(TileVisit<'a>),
    ) -> Result<()> {
        self.for_each_tile_in(tilesets, self.bounds(), f)
    }

    /// Visit the non-empty cells of `region`, row by row.
    ///
    /// Visits carry absolute grid coordinates. A region reaching past the grid, or a
    /// cell whose tileset is not in `tilesets`, is an error; nothing is visited in
    /// either case.
    pub fn for_each_tile_in<'a>(
        &'a self,
        tilesets: &'a TilesetIndex,
        region: TileRegion,
        mut f: impl FnMut(TileVisit<'a>),
    ) -> Result<()> {
        self.check_region(region)?;

        for (column, row, cell) in self.region_cells(region) {
            visit(column, row, cell, tilesets)?;
        }
        for (column, row, cell) in self.region_cells(region) {
            if let Some(tile) = visit(column, row, cell, tilesets)? {
                f(tile);
            }
        }
        Ok(())
    }

    /// Visit every cell touched by a pixel rectangle.
    pub fn for_each_tile_in_pixels<'a>(
        &'a self,
        tilesets: &'a TilesetIndex,
        px: u32,
        py: u32,
        pw: u32,
        ph: u32,
        f: impl FnMut(TileVisit<'a>),
    ) -> Result<()> {
        let region = TileRegion::from_pixels(px, py, pw, ph, self.tile_width, self.tile_height)?;
        self.for_each_tile_in(tilesets, region, f)
    }

    fn bounds(&self) -> TileRegion {
        TileRegion::new(0, 0, self.width, self.height)
    }

    /// Cells of an already checked region with their absolute coordinates.
    fn region_cells(&self, region: TileRegion) -> impl Iterator<Item = (u32, u32, &Cell)> + '_ {
        let stride = self.width as usize;
        (region.y..region.y + region.height).flat_map(move |row| {
            let start = row as usize * stride + region.x as usize;
            (region.x..)
                .zip(&self.cells[start..start + region.width as usize])
                .map(move |(column, cell)| (column, row, cell))
        })
    }

    fn check_region(&self, region: TileRegion) -> Result<()> {
        let fits = |offset: u32, len: u32, limit: u32| {
            offset
                .checked_add(len)
                .is_some_and(|end| end <= limit)
        };
        if fits(region.x, region.width, self.width) && fits(region.y, region.height, self.height) {
            Ok(())
        } else {
            Err(Error::OutOfRange {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                grid_width: self.width,
                grid_height: self.height,
            })
        }
    }
}

fn visit<'a>(
    column: u32,
    row: u32,
    cell: &'a Cell,
    tilesets: &'a TilesetIndex,
) -> Result<Option<TileVisit<'a>>, ResolutionError> {
    if cell.is_empty() {
        return Ok(None);
    }
    let tileset = tilesets
        .get(cell.first_gid)
        .ok_or(ResolutionError::UnknownGid(cell.gid))?;
    let local_id = cell
        .gid
        .checked_sub(tileset.first_gid)
        .ok_or(ResolutionError::UnknownGid(cell.gid))?;
    Ok(Some(TileVisit {
        column,
        row,
        tileset,
        local_id,
        cell,
    }))
}

/// Attributes of a `<layer>` element; the same meaning as the fields of [`Layer`].
#[derive(Debug, Clone, PartialEq)]
pub struct LayerAttributes {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub opacity: f32,
    pub visible: bool,
    pub properties: Properties,
}

impl LayerAttributes {
    /// A visible, opaque layer at the origin.
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            x: 0,
            y: 0,
            width,
            height,
            opacity: 1.0,
            visible: true,
            properties: Properties::new(),
        }
    }
}

/// A tile layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Layer {
    /// Layer name, unique within a map
    pub name: String,

    /// Horizontal offset in tiles (informational)
    pub x: i32,

    /// Vertical offset in tiles (informational)
    pub y: i32,

    /// Width in tiles
    pub width: u32,

    /// Height in tiles
    pub height: u32,

    /// Opacity from 0 to 1
    pub opacity: f32,

    /// `false` when the layer is hidden in the editor
    pub visible: bool,

    /// Custom properties of the layer
    pub properties: Properties,

    grid: LayerGrid,
}

impl Layer {
    /// Decode and resolve a layer's data in one pass.
    ///
    /// On failure no layer is produced; decode errors carry the layer name.
    pub fn decode(
        attrs: LayerAttributes,
        data: &LayerData,
        tile_width: u32,
        tile_height: u32,
        tilesets: &TilesetIndex,
    ) -> Result<Self> {
        let LayerAttributes {
            name,
            x,
            y,
            width,
            height,
            opacity,
            visible,
            properties,
        } = attrs;

        let expected = width as usize * height as usize;
        let raw = decode_tile_data(data, expected).map_err(|source| Error::Decode {
            layer: name.clone(),
            source,
        })?;
        let grid = LayerGrid::from_raw(width, height, tile_width, tile_height, &raw, tilesets)?;

        log::debug!(
            "Decoded layer '{}' ({}x{}, {} tiles, {:?}/{:?})",
            name,
            width,
            height,
            grid.tile_count(),
            data.encoding,
            data.compression
        );

        Ok(Self {
            name,
            x,
            y,
            width,
            height,
            opacity,
            visible,
            properties,
            grid,
        })
    }

    pub fn grid(&self) -> &LayerGrid {
        &self.grid
    }

    pub fn tiles<'a>(
        &'a self,
        tilesets: &'a TilesetIndex,
    ) -> impl Iterator<Item = Result<TileVisit<'a>, ResolutionError>> + 'a {
        self.grid.tiles(tilesets)
    }

    pub fn for_each_tile<'a>(
        &'a self,
        tilesets: &'a TilesetIndex,
        f: impl FnMut(TileVisit<'a>),
    ) -> Result<()> {
        self.grid.for_each_tile(tilesets, f)
    }

    pub fn for_each_tile_in<'a>(
        &'a self,
        tilesets: &'a TilesetIndex,
        region: TileRegion,
        f: impl FnMut(TileVisit<'a>),
    ) -> Result<()> {
        self.grid.for_each_tile_in(tilesets, region, f)
    }

    pub fn for_each_tile_in_pixels<'a>(
        &'a self,
        tilesets: &'a TilesetIndex,
        px: u32,
        py: u32,
        pw: u32,
        ph: u32,
        f: impl FnMut(TileVisit<'a>),
    ) -> Result<()> {
        self.grid
            .for_each_tile_in_pixels(tilesets, px, py, pw, ph, f)
    }
}
