use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::warn;

pub const IMAGE_WIDTH: usize = 640;
pub const MAX_IMAGE_HEIGHT: usize = 480;

/// A per-pixel mask: 0 means masked, nonzero means passthrough.
#[derive(Debug, Clone)]
pub struct PixelMask {
    pub width: usize,
    pub height: usize,
    data: Vec<u16>,
}

impl PixelMask {
    pub fn full_passthrough(width: usize, height: usize) -> Self {
        PixelMask {
            width,
            height,
            data: vec![1u16; width * height],
        }
    }

    pub fn is_passthrough(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] != 0
    }
}

fn try_load(path: &Path) -> std::io::Result<PixelMask> {
    let bytes = std::fs::read(path)?;
    let expected_len = IMAGE_WIDTH * MAX_IMAGE_HEIGHT * 2;
    if bytes.len() != expected_len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "pixel mask has wrong size: expected {expected_len} bytes, got {}",
                bytes.len()
            ),
        ));
    }
    let mut cursor = std::io::Cursor::new(bytes);
    let mut data = Vec::with_capacity(IMAGE_WIDTH * MAX_IMAGE_HEIGHT);
    for _ in 0..IMAGE_WIDTH * MAX_IMAGE_HEIGHT {
        data.push(cursor.read_u16::<LittleEndian>()?);
    }
    Ok(PixelMask {
        width: IMAGE_WIDTH,
        height: MAX_IMAGE_HEIGHT,
        data,
    })
}

/// Load a pixel mask file. Any failure (missing file, wrong size, I/O
/// error) degrades to a full-passthrough mask rather than propagating an
/// error, per the calibration-unavailable recovery policy.
pub fn load_pixel_mask(path: &Path) -> PixelMask {
    match try_load(path) {
        Ok(mask) => mask,
        Err(e) => {
            warn!("failed to load pixel mask from {:?}: {e}; using full passthrough", path);
            PixelMask::full_passthrough(IMAGE_WIDTH, MAX_IMAGE_HEIGHT)
        }
    }
}
