//! Display fingerprint
//!
//! FNV-1a (32-bit) over every cell, the three flags, the cursor and the
//! linear address. Not cryptographic; a collision only costs one skipped
//! change-triggered send, which the next heartbeat covers.

use crate::model::DisplayModel;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Content hash of a [`DisplayModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fingerprint(pub u32);

#[derive(Clone, Copy)]
struct Fnv1a(u32);

impl Fnv1a {
    const fn new() -> Self {
        Self(FNV_OFFSET_BASIS)
    }

    fn mix(&mut self, byte: u8) {
        self.0 ^= u32::from(byte);
        self.0 = self.0.wrapping_mul(FNV_PRIME);
    }
}

impl Fingerprint {
    /// Fingerprint the model; field order is fixed
    pub fn of(model: &DisplayModel) -> Self {
        let mut h = Fnv1a::new();
        for row in model.rows() {
            for &cell in row {
                h.mix(cell);
            }
        }
        let flags = model.flags();
        h.mix(flags.display_on as u8);
        h.mix(flags.cursor_on as u8);
        h.mix(flags.blink_on as u8);
        let cursor = model.cursor();
        h.mix(cursor.row);
        h.mix(cursor.col);
        h.mix(model.address());
        Self(h.0)
    }
}
