//! RIFF/WAVE header encoding for the bundled PCM file encoder.

/// Size of the canonical PCM WAV header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Largest PCM payload a RIFF size field can describe.
pub const MAX_DATA_SIZE: u32 = u32::MAX - 36;

/// PCM stream layout described by a WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl WavSpec {
    /// `None` when the layout does not fit the header's 32-bit field.
    pub fn byte_rate(&self) -> Option<u32> {
        self.sample_rate.checked_mul(self.block_align()? as u32)
    }

    pub fn block_align(&self) -> Option<u16> {
        Some(self.channels.checked_mul(self.bit_depth)? / 8)
    }

    /// Encode the 44-byte header for `data_size` bytes of PCM payload.
    ///
    /// ```text
    /// [0-3]   "RIFF"        [4-7]   36 + data_size
    /// [8-11]  "WAVE"        [12-15] "fmt "
    /// [16-19] 16            [20-21] 1 (PCM)
    /// [22-23] channels      [24-27] sample_rate
    /// [28-31] byte_rate     [32-33] block_align
    /// [34-35] bit_depth     [36-39] "data"
    /// [40-43] data_size
    /// ```
    ///
    /// Returns `None` if `data_size` exceeds [`MAX_DATA_SIZE`] or the
    /// derived rates overflow.
    pub fn header(&self, data_size: u32) -> Option<[u8; WAV_HEADER_SIZE]> {
        let riff_size = data_size.checked_add(36)?;
        let byte_rate = self.byte_rate()?;
        let block_align = self.block_align()?;

        let mut out = [0u8; WAV_HEADER_SIZE];
        put(&mut out, 0, b"RIFF");
        put(&mut out, 4, &riff_size.to_le_bytes());
        put(&mut out, 8, b"WAVE");
        put(&mut out, 12, b"fmt ");
        put(&mut out, 16, &16u32.to_le_bytes());
        put(&mut out, 20, &1u16.to_le_bytes());
        put(&mut out, 22, &self.channels.to_le_bytes());
        put(&mut out, 24, &self.sample_rate.to_le_bytes());
        put(&mut out, 28, &byte_rate.to_le_bytes());
        put(&mut out, 32, &block_align.to_le_bytes());
        put(&mut out, 34, &self.bit_depth.to_le_bytes());
        put(&mut out, 36, b"data");
        put(&mut out, 40, &data_size.to_le_bytes());
        Some(out)
    }

    /// Decode a PCM header, returning the layout and the declared data size.
    pub fn parse(header: &[u8]) -> Option<(Self, u32)> {
        if header.len() < WAV_HEADER_SIZE
            || &header[0..4] != b"RIFF"
            || &header[8..12] != b"WAVE"
            || &header[36..40] != b"data"
        {
            return None;
        }
        let u16_at = |at: usize| u16::from_le_bytes([header[at], header[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]])
        };
        if u16_at(20) != 1 {
            return None;
        }
        let spec = Self {
            sample_rate: u32_at(24),
            channels: u16_at(22),
            bit_depth: u16_at(34),
        };
        Some((spec, u32_at(40)))
    }
}

fn put(out: &mut [u8], offset: usize, bytes: &[u8]) {
    out[offset..offset + bytes.len()].copy_from_slice(bytes);
}
