//! Object groups, their objects, and image layers.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::layer::Cell;
use crate::properties::Properties;
use crate::tileset::{Image, Rect, Tileset, TilesetIndex};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A polygon/polyline vertex in map pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// X in map pixels
    pub x: f32,
    /// Y in map pixels
    pub y: f32,
}

/// Parse a `points` attribute (`"0,0 16,0 16,16"`) into points offset by an anchor.
pub fn parse_points(points: &str, anchor_x: f32, anchor_y: f32) -> Result<Vec<Point>> {
    points
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| Error::structure(format!("'{pair}' is not a valid point")))?;
            let coord = |v: &str| {
                v.trim()
                    .parse::<f32>()
                    .map_err(|_| Error::structure(format!("'{pair}' is not a valid point")))
            };
            Ok(Point {
                x: anchor_x + coord(x)?,
                y: anchor_y + coord(y)?,
            })
        })
        .collect()
}

/// A free-form object inside an object group.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Object {
    /// Object name, if one was given
    pub name: Option<String>,

    /// User defined type
    pub object_type: Option<String>,

    /// X position in pixels
    pub x: f32,

    /// Y position in pixels
    pub y: f32,

    /// Width in pixels
    pub width: f32,

    /// Height in pixels
    pub height: f32,

    /// Rotation in degrees, clockwise
    pub rotation: f32,

    /// `false` when the object is hidden in the editor
    pub visible: bool,

    /// Tile shown by this object, resolved the same way as layer cells
    pub tile: Option<Cell>,

    /// Polyline or polygon vertices in absolute map pixels
    pub points: Option<Vec<Point>>,

    /// Custom properties of the object
    pub properties: Properties,
}

impl Object {
    /// Tileset and source rectangle of the object's tile, if it has one.
    pub fn tile_source<'a>(&self, tilesets: &'a TilesetIndex) -> Option<(&'a Tileset, Rect)> {
        let cell = self.tile.as_ref()?;
        let tileset = tilesets.get(cell.first_gid)?;
        Some((tileset, cell.rect?))
    }
}

/// An `<objectgroup>`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectGroup {
    /// Group name, unique within a map
    pub name: String,

    /// X coordinate in tiles (informational)
    pub x: i32,

    /// Y coordinate in tiles (informational)
    pub y: i32,

    /// Width in tiles (informational)
    pub width: u32,

    /// Height in tiles (informational)
    pub height: u32,

    /// Opacity from 0 to 1
    pub opacity: f32,

    /// `false` when the group is hidden in the editor
    pub visible: bool,

    /// Objects in document order
    pub objects: Vec<Object>,

    /// Custom properties of the group
    pub properties: Properties,
}

impl ObjectGroup {
    /// Objects whose `type` equals `object_type`.
    pub fn objects_of_type<'a>(&'a self, object_type: &'a str) -> impl Iterator<Item = &'a Object> {
        self.objects
            .iter()
            .filter(move |o| o.object_type.as_deref() == Some(object_type))
    }

    /// Distinct object types present in the group.
    pub fn object_types(&self) -> BTreeSet<&str> {
        self.objects
            .iter()
            .filter_map(|o| o.object_type.as_deref())
            .collect()
    }
}

/// An `<imagelayer>`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageLayer {
    /// Layer name, unique within a map
    pub name: String,

    /// Width in tiles (informational)
    pub width: u32,

    /// Height in tiles (informational)
    pub height: u32,

    /// Opacity from 0 to 1
    pub opacity: f32,

    /// `false` when the layer is hidden in the editor
    pub visible: bool,

    /// Image shown by the layer, source kept as written
    pub image: Image,

    /// Custom properties of the layer
    pub properties: Properties,
}
