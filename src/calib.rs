//! Factory calibration: two register blocks, one 33-byte image, 18 coefficients.

/// Memory addresses and sizes of the two calibration blocks.
///
/// Block 0 is `calib00..calib25` (0x88..0xA1), block 1 is `calib26..calib32`
/// (0xE1..0xE7). They are not contiguous in register space.
pub(crate) mod calib_mem {
    pub const ADDR: [u8; 2] = [0x88, 0xE1];
    pub const SIZES: [usize; 2] = [26, 7];
    /// Where each block lands in the combined image.
    pub const OFFSETS: [usize; 2] = [0, 26];
    pub const TOTAL_SIZE: usize = 26 + 7;
}

pub use calib_mem::TOTAL_SIZE as CALIB_SIZE;

/// Factory-fused compensation coefficients, unique to every chip.
///
/// Names follow the datasheet (`dig_T1` .. `dig_H6`).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibData {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl CalibData {
    /// Decodes the 33-byte calibration image (block 0 followed by block 1).
    ///
    /// 16-bit words are little-endian. `dig_H4` and `dig_H5` are 12-bit values
    /// sharing the nibbles of 0xE5; they are assembled without sign extension.
    pub fn from_bytes(buffer: &[u8; calib_mem::TOTAL_SIZE]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([buffer[i], buffer[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([buffer[i], buffer[i + 1]]);

        // buffer[24] (0xA0) is unused
        let (e4, e5, e6) = (buffer[29], buffer[30], buffer[31]);

        CalibData {
            dig_t1: u16_at(0),
            dig_t2: i16_at(2),
            dig_t3: i16_at(4),
            dig_p1: u16_at(6),
            dig_p2: i16_at(8),
            dig_p3: i16_at(10),
            dig_p4: i16_at(12),
            dig_p5: i16_at(14),
            dig_p6: i16_at(16),
            dig_p7: i16_at(18),
            dig_p8: i16_at(20),
            dig_p9: i16_at(22),
            dig_h1: buffer[25],
            dig_h2: i16_at(26),
            dig_h3: buffer[28],
            dig_h4: split_h4(e4, e5),
            dig_h5: split_h5(e5, e6),
            dig_h6: buffer[32] as i8,
        }
    }
}

/// `dig_H4` = 0xE4[7:0] / 0xE5[3:0]
fn split_h4(e4: u8, e5: u8) -> i16 {
    (((e4 as u16) << 4) | (e5 & 0x0F) as u16) as i16
}

/// `dig_H5` = 0xE6[7:0] / 0xE5[7:4]
fn split_h5(e5: u8, e6: u8) -> i16 {
    (((e6 as u16) << 4) | (e5 >> 4) as u16) as i16
}
