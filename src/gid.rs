//! Splitting raw 32-bit tile values into a global id and flip flags.
//!
//! Tiled stores three transform bits in the top of every tile value:
//!
//! | bit | meaning              |
//! |-----|----------------------|
//! | 31  | flipped horizontally |
//! | 30  | flipped vertically   |
//! | 29  | flipped diagonally   |
//!
//! The remaining 29 bits are the global tile id (gid). A gid of 0 is an empty cell.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bit 31: tile is mirrored left-to-right
pub const FLIPPED_HORIZONTALLY: u32 = 0x8000_0000;
/// Bit 30: tile is mirrored top-to-bottom
pub const FLIPPED_VERTICALLY: u32 = 0x4000_0000;
/// Bit 29: tile is mirrored along its top-left/bottom-right diagonal
pub const FLIPPED_DIAGONALLY: u32 = 0x2000_0000;

/// All transform bits
pub const FLIP_MASK: u32 = FLIPPED_HORIZONTALLY | FLIPPED_VERTICALLY | FLIPPED_DIAGONALLY;
/// Bits that make up the global id
pub const GID_MASK: u32 = !FLIP_MASK;

/// Transform flags of a single cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlipFlags {
    /// Mirrored left to right (bit 31)
    pub horizontal: bool,
    /// Mirrored top to bottom (bit 30)
    pub vertical: bool,
    /// Mirrored across the top-left to bottom-right diagonal (bit 29)
    pub diagonal: bool,
}

impl FlipFlags {
    /// Extract the flags from a raw tile value, ignoring the gid bits.
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            horizontal: raw & FLIPPED_HORIZONTALLY != 0,
            vertical: raw & FLIPPED_VERTICALLY != 0,
            diagonal: raw & FLIPPED_DIAGONALLY != 0,
        }
    }

    /// The flags as they are laid out in a raw tile value.
    pub const fn bits(self) -> u32 {
        let mut bits = 0;
        if self.horizontal {
            bits |= FLIPPED_HORIZONTALLY;
        }
        if self.vertical {
            bits |= FLIPPED_VERTICALLY;
        }
        if self.diagonal {
            bits |= FLIPPED_DIAGONALLY;
        }
        bits
    }

    pub const fn is_empty(self) -> bool {
        !(self.horizontal || self.vertical || self.diagonal)
    }

    /// Legacy additive code: +1 horizontal, +2 vertical, +3 diagonal.
    ///
    /// Several combinations collapse onto the same number (diagonal alone and
    /// horizontal+vertical are both 3), so only use this where a consumer expects
    /// that exact encoding.
    pub const fn additive_code(self) -> u8 {
        self.horizontal as u8 + 2 * self.vertical as u8 + 3 * self.diagonal as u8
    }
}

/// A raw tile value split into its global id and flip flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileGid {
    /// Global tile id with the flag bits cleared
    pub gid: u32,
    /// Flags taken from the top three bits
    pub flip: FlipFlags,
}

impl TileGid {
    pub const EMPTY: TileGid = TileGid {
        gid: 0,
        flip: FlipFlags {
            horizontal: false,
            vertical: false,
            diagonal: false,
        },
    };

    pub const fn from_raw(raw: u32) -> Self {
        Self {
            gid: raw & GID_MASK,
            flip: FlipFlags::from_raw(raw),
        }
    }

    /// Recombine into the raw value this was decoded from.
    pub const fn to_raw(self) -> u32 {
        self.gid | self.flip.bits()
    }

    /// `true` for gid 0, which never resolves to a tileset.
    pub const fn is_empty(self) -> bool {
        self.gid == 0
    }
}

impl From<u32> for TileGid {
    fn from(raw: u32) -> Self {
        TileGid::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_gid_has_no_flags() {
        let t = TileGid::from_raw(42);
        assert_eq!(t.gid, 42);
        assert!(t.flip.is_empty());
        assert_eq!(t.flip.additive_code(), 0);
    }

    #[test]
    fn flag_bits_are_stripped_from_gid() {
        let gid = 0x0123_4567 & GID_MASK;
        for bits in [
            0,
            FLIPPED_HORIZONTALLY,
            FLIPPED_VERTICALLY,
            FLIPPED_DIAGONALLY,
            FLIPPED_HORIZONTALLY | FLIPPED_DIAGONALLY,
            FLIP_MASK,
        ] {
            let t = TileGid::from_raw(gid | bits);
            assert_eq!(t.gid, gid);
            assert_eq!(t.flip.bits(), bits);
            assert_eq!(t.to_raw(), gid | bits);
        }
    }

    #[test]
    fn individual_flags_map_to_their_bits() {
        let h = FlipFlags::from_raw(FLIPPED_HORIZONTALLY | 7);
        assert!(h.horizontal && !h.vertical && !h.diagonal);

        let v = FlipFlags::from_raw(FLIPPED_VERTICALLY);
        assert!(!v.horizontal && v.vertical && !v.diagonal);

        let d = FlipFlags::from_raw(FLIPPED_DIAGONALLY);
        assert!(!d.horizontal && !d.vertical && d.diagonal);
    }

    #[test]
    fn additive_code_matches_legacy_values() {
        assert_eq!(FlipFlags::from_raw(FLIPPED_HORIZONTALLY).additive_code(), 1);
        assert_eq!(FlipFlags::from_raw(FLIPPED_VERTICALLY).additive_code(), 2);
        assert_eq!(FlipFlags::from_raw(FLIPPED_DIAGONALLY).additive_code(), 3);
        // the ambiguity the booleans avoid
        assert_eq!(
            FlipFlags::from_raw(FLIPPED_HORIZONTALLY | FLIPPED_VERTICALLY).additive_code(),
            3
        );
        assert_eq!(FlipFlags::from_raw(FLIP_MASK).additive_code(), 6);
    }

    #[test]
    fn zero_is_empty_even_with_flags() {
        assert!(TileGid::from_raw(0).is_empty());
        assert!(TileGid::from_raw(FLIPPED_HORIZONTALLY).is_empty());
        assert!(!TileGid::from_raw(1).is_empty());
    }
}
