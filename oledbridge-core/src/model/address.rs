//! Linear address ↔ (row, col) mapping
//!
//! The emulated controller exposes a single 7-bit address space. Each row
//! starts at a configured base; an address belongs to the row with the
//! greatest base not above it, and the column is the distance from that base
//! clamped to the last column. Addresses below every base fall back to (0,0).

use oledbridge_protocol::bus::ADDRESS_MASK;
use oledbridge_protocol::{COLS, ROWS};

use super::display::Cursor;

/// Four row-base addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RowTable([u8; ROWS]);

impl Default for RowTable {
    fn default() -> Self {
        Self::SEQUENTIAL
    }
}

impl RowTable {
    /// Strict 20-column rows, 0x20 apart
    pub const SEQUENTIAL: Self = Self([0x00, 0x20, 0x40, 0x60]);

    /// Common HD44780-style 20x4 layout
    pub const STANDARD: Self = Self([0x00, 0x40, 0x14, 0x54]);

    /// Layout used by some OLED vendors
    pub const ALTERNATIVE: Self = Self([0x00, 0x20, 0x14, 0x34]);

    /// Build a table from explicit bases
    ///
    /// Returns `None` if any base lies outside the 7-bit address space.
    pub fn new(bases: [u8; ROWS]) -> Option<Self> {
        if bases.iter().all(|&b| b <= ADDRESS_MASK) {
            Some(Self(bases))
        } else {
            None
        }
    }

    /// Look up a named profile
    ///
    /// `emulator` is accepted as an alias for `sequential`.
    pub fn from_profile(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::STANDARD),
            "sequential" | "emulator" => Some(Self::SEQUENTIAL),
            "alternative" => Some(Self::ALTERNATIVE),
            _ => None,
        }
    }

    /// All four bases
    pub fn bases(&self) -> [u8; ROWS] {
        self.0
    }

    /// Base address of a row (clamped to the last row)
    pub fn base(&self, row: usize) -> u8 {
        self.0[row.min(ROWS - 1)]
    }

    /// Map a linear address to the cell it selects
    pub fn locate(&self, address: u8) -> Cursor {
        let owner = self
            .0
            .iter()
            .enumerate()
            .filter(|(_, &base)| base <= address)
            .max_by_key(|(_, &base)| base);

        match owner {
            Some((row, &base)) => Cursor::new(row, usize::from(address - base)),
            None => Cursor::HOME,
        }
    }

    /// Linear address of a cell
    ///
    /// May exceed 0x7F for custom tables with high bases; callers resolve
    /// that through the overflow policy.
    pub fn address_of(&self, cursor: Cursor) -> u16 {
        u16::from(self.base(cursor.row as usize)) + u16::from(cursor.col)
    }
}

/// What to do with an address beyond the 7-bit space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverflowPolicy {
    /// Reset to address 0, cell (0,0)
    #[default]
    Wrap,
    /// Saturate to 0x7F
    Clamp,
    /// Discard the operation
    Ignore,
}

impl OverflowPolicy {
    /// Parse a policy name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "wrap" => Some(Self::Wrap),
            "clamp" => Some(Self::Clamp),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}

/// Row table plus overflow policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressMap {
    pub table: RowTable,
    pub overflow: OverflowPolicy,
}

impl AddressMap {
    pub const fn new(table: RowTable, overflow: OverflowPolicy) -> Self {
        Self { table, overflow }
    }

    /// Resolve an address into `(address, cursor)`
    ///
    /// Returns `None` when the address overflows and the policy is
    /// [`OverflowPolicy::Ignore`].
    pub fn resolve(&self, address: u16) -> Option<(u8, Cursor)> {
        if address <= u16::from(ADDRESS_MASK) {
            let address = address as u8;
            return Some((address, self.table.locate(address)));
        }
        match self.overflow {
            OverflowPolicy::Wrap => Some((0, Cursor::HOME)),
            OverflowPolicy::Clamp => Some((ADDRESS_MASK, self.table.locate(ADDRESS_MASK))),
            OverflowPolicy::Ignore => None,
        }
    }

    /// Linear address that keeps `cursor` and address consistent
    ///
    /// The cursor is returned unchanged unless the encoded address overflows
    /// and the policy moves it.
    pub fn settle(&self, cursor: Cursor) -> Option<(u8, Cursor)> {
        let address = self.table.address_of(cursor);
        if address <= u16::from(ADDRESS_MASK) {
            Some((address as u8, cursor))
        } else {
            self.resolve(address)
        }
    }
}
