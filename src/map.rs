//! The [`Map`] model and the [`Loader`] that builds it from TMX documents.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::codec::{Compression, Encoding, LayerData};
use crate::error::{Error, Result};
use crate::gid::TileGid;
use crate::layer::{Cell, Layer, LayerAttributes};
use crate::object::{parse_points, ImageLayer, Object, ObjectGroup};
use crate::properties::Properties;
use crate::tileset::{Image, Tile, Tileset, TilesetIndex};
use crate::xml::Element;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Map orientation. Only changes how consumers place tiles, never how data decodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Orientation {
    #[default]
    Orthogonal,
    Isometric,
    /// Any other orientation (staggered, hexagonal, ...) kept verbatim
    Other(String),
}

impl From<&str> for Orientation {
    fn from(s: &str) -> Self {
        match s {
            "orthogonal" => Orientation::Orthogonal,
            "isometric" => Orientation::Isometric,
            other => Orientation::Other(other.to_string()),
        }
    }
}

impl FromStr for Orientation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Orientation::from(s))
    }
}

/// A fully decoded TMX map.
///
/// Built in one pass by [`Loader`]; read-only afterwards, so a `&Map` can be shared
/// freely between threads.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Map {
    /// TMX format version, e.g. `"1.0"`
    pub version: String,

    /// Grid projection consumers should draw with
    pub orientation: Orientation,

    /// Map width in tiles
    pub width: u32,

    /// Map height in tiles
    pub height: u32,

    /// Width of a grid cell in pixels
    pub tile_width: u32,

    /// Height of a grid cell in pixels
    pub tile_height: u32,

    /// Background color in hex format (e.g., "#aaff00")
    pub background_color: Option<String>,

    tilesets: TilesetIndex,
    layers: HashMap<String, Layer>,
    object_groups: HashMap<String, ObjectGroup>,
    image_layers: HashMap<String, ImageLayer>,
    properties: Properties,
}

impl Map {
    /// Load a `.tmx` file, resolving external tilesets next to it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Loader::new().load_tmx_map(path)
    }

    /// Parse TMX content held in memory. External tilesets resolve against the
    /// current directory; use [`Loader::with_base_dir`] to change that.
    pub fn from_tmx_str(tmx: &str) -> Result<Self> {
        Loader::new().load_tmx_map_from_str(tmx)
    }

    /// Tilesets in ascending `first_gid` order.
    pub fn tilesets(&self) -> &TilesetIndex {
        &self.tilesets
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// Tile layers in no particular order.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    pub fn object_group(&self, name: &str) -> Option<&ObjectGroup> {
        self.object_groups.get(name)
    }

    pub fn object_groups(&self) -> impl Iterator<Item = &ObjectGroup> {
        self.object_groups.values()
    }

    pub fn image_layer(&self, name: &str) -> Option<&ImageLayer> {
        self.image_layers.get(name)
    }

    pub fn image_layers(&self) -> impl Iterator<Item = &ImageLayer> {
        self.image_layers.values()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Owning tileset and local id of a raw tile value; flag bits are ignored.
    pub fn tile_for_gid(&self, raw: u32) -> Option<(&Tileset, u32)> {
        self.tilesets.resolve(TileGid::from_raw(raw).gid)
    }

    /// Owning tileset and per-tile metadata for a resolved cell.
    pub fn tile_for_cell(&self, cell: &Cell) -> Option<(&Tileset, Option<&Tile>)> {
        let tileset = self.tilesets.get(cell.first_gid)?;
        Some((tileset, tileset.tile_for_cell(cell)))
    }
}

/// Load-time settings for reading TMX maps.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    base_dir: Option<PathBuf>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory external tileset references resolve against for
    /// [`Loader::load_tmx_map_from_str`]. Files loaded from disk always use their own
    /// directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Load and decode a `.tmx` file.
    pub fn load_tmx_map(&self, path: impl AsRef<Path>) -> Result<Map> {
        let path = path.as_ref();
        log::info!("Loading TMX map from {}", path.display());

        let content = read_file(path)?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        parse_map(&content, base_dir)
    }

    /// Decode TMX content from a string.
    pub fn load_tmx_map_from_str(&self, tmx: &str) -> Result<Map> {
        log::info!("Parsing TMX map from string");
        let base_dir = self.base_dir.as_deref().unwrap_or_else(|| Path::new("."));
        parse_map(tmx, base_dir)
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            Error::InputMissing(path.to_path_buf())
        } else {
            Error::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn parse_map(tmx: &str, base_dir: &Path) -> Result<Map> {
    let root = Element::parse_document(tmx)?;
    if root.name != "map" {
        return Err(Error::structure(format!(
            "root element is <{}>, expected <map>",
            root.name
        )));
    }

    let width: u32 = root.required_attr("width")?;
    let height: u32 = root.required_attr("height")?;
    let tile_width: u32 = root.required_attr("tilewidth")?;
    let tile_height: u32 = root.required_attr("tileheight")?;

    // every layer resolves against the complete index, so tilesets go first
    let mut tilesets = TilesetIndex::new();
    for element in root.children_named("tileset") {
        let tileset = read_tileset(element, base_dir)?;
        log::debug!(
            "Added tileset '{}' at firstgid {}",
            tileset.name,
            tileset.first_gid
        );
        tilesets.insert(tileset)?;
    }

    let mut layers = HashMap::new();
    for element in root.children_named("layer") {
        let layer = read_layer(element, width, height, tile_width, tile_height, &tilesets)?;
        insert_named(&mut layers, layer.name.clone(), layer, "layer");
    }

    let mut image_layers = HashMap::new();
    for element in root.children_named("imagelayer") {
        let image_layer = read_image_layer(element)?;
        log::debug!("Added image layer '{}'", image_layer.name);
        insert_named(
            &mut image_layers,
            image_layer.name.clone(),
            image_layer,
            "image layer",
        );
    }

    let mut object_groups = HashMap::new();
    for element in root.children_named("objectgroup") {
        let group = read_object_group(element, &tilesets)?;
        log::debug!(
            "Added object group '{}' with {} objects",
            group.name,
            group.objects.len()
        );
        insert_named(&mut object_groups, group.name.clone(), group, "object group");
    }

    for child in &root.children {
        if !matches!(
            child.name.as_str(),
            "tileset" | "layer" | "imagelayer" | "objectgroup" | "properties"
        ) {
            log::debug!("Skipping unsupported <{}> element", child.name);
        }
    }

    let map = Map {
        version: root.string_attr("version").unwrap_or_default(),
        orientation: root
            .attr("orientation")
            .map(Orientation::from)
            .unwrap_or_default(),
        width,
        height,
        tile_width,
        tile_height,
        background_color: root.string_attr("backgroundcolor"),
        tilesets,
        layers,
        object_groups,
        image_layers,
        properties: root.properties(),
    };

    log::info!(
        "Loaded map ({}x{} tiles, {} tilesets, {} layers, {} object groups, {} image layers)",
        map.width,
        map.height,
        map.tilesets.len(),
        map.layers.len(),
        map.object_groups.len(),
        map.image_layers.len()
    );
    Ok(map)
}

fn insert_named<T>(into: &mut HashMap<String, T>, name: String, value: T, kind: &str) {
    match into.entry(name) {
        Entry::Occupied(mut slot) => {
            log::warn!("Duplicate {kind} name '{}', keeping the last one", slot.key());
            slot.insert(value);
        }
        Entry::Vacant(slot) => {
            slot.insert(value);
        }
    }
}

fn read_tileset(element: &Element, base_dir: &Path) -> Result<Tileset> {
    let first_gid: u32 = element.required_attr("firstgid")?;
    let source = element.string_attr("source");

    let external: Element;
    let (def, image_dir) = match &source {
        Some(src) => {
            let path = base_dir.join(src);
            log::debug!("Reading external tileset {}", path.display());
            external = Element::parse_document(&read_file(&path)?)?;
            if external.name != "tileset" {
                return Err(Error::structure(format!(
                    "{} has root <{}>, expected <tileset>",
                    path.display(),
                    external.name
                )));
            }
            (&external, Path::new(src).parent())
        }
        None => (element, None),
    };

    let name = def.string_attr("name").unwrap_or_default();
    let image_element = def
        .child("image")
        .ok_or_else(|| Error::structure(format!("tileset '{name}' has no <image>")))?;

    let image = read_image(image_element, image_dir)?;

    let mut tiles = BTreeMap::new();
    for tile in def.children_named("tile") {
        let id: u32 = tile.required_attr("id")?;
        tiles.insert(
            id,
            Tile {
                id,
                properties: tile.properties(),
            },
        );
    }

    Ok(Tileset {
        first_gid,
        source,
        tile_width: def.required_attr("tilewidth")?,
        tile_height: def.required_attr("tileheight")?,
        spacing: def.attr_or("spacing", 0)?,
        margin: def.attr_or("margin", 0)?,
        image,
        tiles,
        properties: def.properties(),
        name,
    })
}

fn read_image(element: &Element, relative_to: Option<&Path>) -> Result<Image> {
    let source = element.string_attr("source").unwrap_or_default();
    let source = match relative_to.filter(|dir| !dir.as_os_str().is_empty()) {
        Some(dir) => dir.join(&source).to_string_lossy().into_owned(),
        None => source,
    };
    Ok(Image {
        source,
        trans: element.string_attr("trans"),
        width: element.attr_or("width", 0)?,
        height: element.attr_or("height", 0)?,
    })
}

fn read_layer(
    element: &Element,
    map_width: u32,
    map_height: u32,
    tile_width: u32,
    tile_height: u32,
    tilesets: &TilesetIndex,
) -> Result<Layer> {
    let attrs = LayerAttributes {
        name: element.string_attr("name").unwrap_or_default(),
        x: element.attr_or("x", 0)?,
        y: element.attr_or("y", 0)?,
        width: element.attr_or("width", map_width)?,
        height: element.attr_or("height", map_height)?,
        opacity: element.attr_or("opacity", 1.0)?,
        visible: element.flag_or("visible", true)?,
        properties: element.properties(),
    };

    let data = element
        .child("data")
        .ok_or_else(|| Error::structure(format!("layer '{}' has no <data>", attrs.name)))?;
    if data.child("chunk").is_some() {
        return Err(Error::structure(format!(
            "layer '{}' uses chunked (infinite) data, which is not supported",
            attrs.name
        )));
    }

    let decode_err = |source| Error::Decode {
        layer: attrs.name.clone(),
        source,
    };
    let layer_data = LayerData {
        encoding: Encoding::from_attr(data.attr("encoding")).map_err(decode_err)?,
        compression: Compression::from_attr(data.attr("compression")).map_err(decode_err)?,
        text: data.text.clone(),
        tile_gids: data
            .children_named("tile")
            .map(|tile| tile.attr_or("gid", 0u32))
            .collect::<Result<_>>()?,
    };

    Layer::decode(attrs, &layer_data, tile_width, tile_height, tilesets)
}

fn read_image_layer(element: &Element) -> Result<ImageLayer> {
    let name = element.string_attr("name").unwrap_or_default();
    let image = element
        .child("image")
        .ok_or_else(|| Error::structure(format!("image layer '{name}' has no <image>")))?;

    Ok(ImageLayer {
        width: element.attr_or("width", 0)?,
        height: element.attr_or("height", 0)?,
        opacity: element.attr_or("opacity", 1.0)?,
        visible: element.flag_or("visible", true)?,
        image: read_image(image, None)?,
        properties: element.properties(),
        name,
    })
}

fn read_object_group(element: &Element, tilesets: &TilesetIndex) -> Result<ObjectGroup> {
    Ok(ObjectGroup {
        name: element.string_attr("name").unwrap_or_default(),
        x: element.attr_or("x", 0)?,
        y: element.attr_or("y", 0)?,
        width: element.attr_or("width", 0)?,
        height: element.attr_or("height", 0)?,
        opacity: element.attr_or("opacity", 1.0)?,
        visible: element.flag_or("visible", true)?,
        objects: element
            .children_named("object")
            .map(|o| read_object(o, tilesets))
            .collect::<Result<_>>()?,
        properties: element.properties(),
    })
}

fn read_object(element: &Element, tilesets: &TilesetIndex) -> Result<Object> {
    let x = element.attr_or("x", 0.0)?;
    let y = element.attr_or("y", 0.0)?;

    let tile = element
        .parse_attr::<u32>("gid")?
        .map(|raw| Cell::resolve(raw, tilesets))
        .transpose()?;

    let points = match element.child("polyline").or_else(|| element.child("polygon")) {
        Some(shape) => {
            let raw: String = shape.required_attr("points")?;
            Some(parse_points(&raw, x, y)?)
        }
        None => None,
    };

    Ok(Object {
        name: element.string_attr("name"),
        object_type: element
            .string_attr("type")
            .or_else(|| element.string_attr("class")),
        x,
        y,
        width: element.attr_or("width", 0.0)?,
        height: element.attr_or("height", 0.0)?,
        rotation: element.attr_or("rotation", 0.0)?,
        visible: element.flag_or("visible", true)?,
        tile,
        points,
        properties: element.properties(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_from_attribute() {
        assert_eq!(Orientation::from("orthogonal"), Orientation::Orthogonal);
        assert_eq!(Orientation::from("isometric"), Orientation::Isometric);
        assert_eq!(
            "hexagonal".parse::<Orientation>().unwrap(),
            Orientation::Other("hexagonal".into())
        );
    }

    #[test]
    fn missing_file_is_input_missing() {
        let err = Map::load("definitely/not/here.tmx").unwrap_err();
        assert!(matches!(err, Error::InputMissing(p) if p.ends_with("here.tmx")));
    }

    #[test]
    fn root_must_be_map() {
        let err = Map::from_tmx_str(r#"<tileset name="x"/>"#).unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn map_attributes_are_required() {
        let err = Map::from_tmx_str(r#"<map width="2" height="2" tilewidth="8"/>"#).unwrap_err();
        assert!(matches!(err, Error::Structure(msg) if msg.contains("tileheight")));
    }

    #[test]
    fn minimal_map() {
        let map = Map::from_tmx_str(
            r#"<map version="1.0" width="3" height="2" tilewidth="16" tileheight="8"/>"#,
        )
        .unwrap();
        assert_eq!(map.version, "1.0");
        assert_eq!(map.orientation, Orientation::Orthogonal);
        assert_eq!((map.width, map.height), (3, 2));
        assert_eq!((map.tile_width, map.tile_height), (16, 8));
        assert!(map.background_color.is_none());
        assert!(map.tilesets().is_empty());
        assert_eq!(map.layers().count(), 0);
        assert!(map.properties().is_empty());
    }
}
